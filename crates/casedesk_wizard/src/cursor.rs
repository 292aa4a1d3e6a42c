use crate::validator::Step;

/// Position within a variant's linear step list. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardCursor {
    steps: &'static [Step],
    index: usize,
}

impl WizardCursor {
    pub fn new(steps: &'static [Step]) -> Self {
        Self { steps, index: 0 }
    }

    /// Cursor placed at `position`, clamped into range.
    pub fn at(steps: &'static [Step], position: usize) -> Self {
        let mut cursor = Self::new(steps);
        cursor.index = position.saturating_sub(1).min(cursor.last_index());
        cursor
    }

    pub fn step(&self) -> Step {
        self.steps.get(self.index).copied().unwrap_or(Step::Category)
    }

    pub fn position(&self) -> usize {
        self.index + 1
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index == self.last_index()
    }

    /// Returns `false` when already on the last step.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn retreat(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.index -= 1;
        true
    }

    fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::WizardCursor;
    use crate::validator::{Step, ValidationRules};

    #[test]
    fn clamps_at_both_ends() {
        let mut cursor = WizardCursor::new(ValidationRules::loose().steps());
        assert!(!cursor.retreat());
        assert_eq!(cursor.position(), 1);

        while cursor.advance() {}
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.step(), Step::Evidence);
        assert!(cursor.is_last());
    }

    #[test]
    fn restored_position_is_clamped() {
        let steps = ValidationRules::strict().steps();
        assert_eq!(WizardCursor::at(steps, 0).position(), 1);
        assert_eq!(WizardCursor::at(steps, 3).step(), Step::Narrative);
        assert_eq!(WizardCursor::at(steps, 42).position(), 5);
    }
}
