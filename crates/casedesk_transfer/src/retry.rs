use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times a single upload is attempted. `None` is one shot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    #[default]
    None,
    Backoff {
        max_attempts: u32,
        base_delay_ms: u64,
    },
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Backoff { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Delay before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Backoff { base_delay_ms, .. } => {
                if attempt <= 1 {
                    return Duration::ZERO;
                }
                let factor = 1u64 << (attempt - 2).min(16);
                Duration::from_millis(base_delay_ms.saturating_mul(factor))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::Backoff {
            max_attempts: 4,
            base_delay_ms: 100,
        };
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(400));
    }

    #[test]
    fn none_is_single_shot() {
        assert_eq!(RetryPolicy::default().max_attempts(), 1);
        let zero = RetryPolicy::Backoff {
            max_attempts: 0,
            base_delay_ms: 5,
        };
        assert_eq!(zero.max_attempts(), 1);
    }

    #[test]
    fn parses_from_toml_shaped_json() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"mode":"backoff","max_attempts":3,"base_delay_ms":50}"#)
                .expect("parse");
        assert_eq!(
            policy,
            RetryPolicy::Backoff {
                max_attempts: 3,
                base_delay_ms: 50
            }
        );
    }
}
