use std::sync::Arc;

use casedesk_bridge::{DraftStore, Identity, IdentityProvider};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::WizardConfig;
use crate::error::WizardError;
use crate::wizard::{SubmissionReport, Wizard, WizardServices};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardUpdate {
    pub event_type: String,
    pub data: Value,
}

/// Application state passed down to whatever drives the wizard. The draft
/// only leaves memory at explicit save points.
#[derive(Clone)]
pub struct AppState {
    pub services: WizardServices,
    pub identity: Arc<dyn IdentityProvider>,
    pub drafts: Arc<dyn DraftStore>,
    pub config: Arc<WizardConfig>,
    pub update_bus: broadcast::Sender<WizardUpdate>,
}

impl AppState {
    pub fn new(
        services: WizardServices,
        identity: Arc<dyn IdentityProvider>,
        drafts: Arc<dyn DraftStore>,
        config: WizardConfig,
    ) -> Self {
        let (update_bus, _) = broadcast::channel(256);
        Self {
            services,
            identity,
            drafts,
            config: Arc::new(config),
            update_bus,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardUpdate> {
        self.update_bus.subscribe()
    }

    /// Resumes the signed-in user's saved draft, or starts a new one when there
    /// is none or it belongs to another variant.
    pub async fn open_wizard(&self) -> Result<Wizard, WizardError> {
        let identity = self
            .identity
            .current_identity()
            .await
            .map_err(WizardError::Identity)?;
        let saved = self
            .drafts
            .load_draft(&identity.user_id)
            .await
            .map_err(WizardError::DraftStore)?;

        let (wizard, restored) = match saved {
            Some(snapshot) => {
                match Wizard::restore(snapshot, (*self.config).clone(), self.services.clone()) {
                    Ok(wizard) => (wizard, true),
                    Err(error) => {
                        warn!(reporter_id = %identity.user_id, error = %error, "ignoring saved draft");
                        (self.fresh(&identity), false)
                    }
                }
            }
            None => (self.fresh(&identity), false),
        };

        emit(
            self,
            "wizard.opened",
            json!({
                "reporter_id": identity.user_id,
                "restored": restored,
                "step": wizard.position(),
            }),
        );
        Ok(wizard)
    }

    pub async fn save_point(&self, wizard: &Wizard) -> Result<(), WizardError> {
        let snapshot = wizard.snapshot();
        let reporter_id = snapshot.draft.fields().reporter_id.clone();
        self.drafts
            .save_draft(&reporter_id, &snapshot)
            .await
            .map_err(WizardError::DraftStore)?;

        emit(
            self,
            "draft.saved",
            json!({
                "reporter_id": reporter_id,
                "step": snapshot.step,
                "started_at": snapshot.draft.created_at().to_rfc3339(),
            }),
        );
        Ok(())
    }

    /// Submits and settles the save point: discarded on success, refreshed on
    /// failure so a retry starts from the preserved draft.
    pub async fn submit(&self, wizard: &mut Wizard) -> Result<SubmissionReport, WizardError> {
        let reporter_id = wizard.fields().reporter_id.clone();
        match wizard.submit().await {
            Ok(report) => {
                let dropped: Vec<&str> = report.dropped.iter().map(|dead| dead.file_name()).collect();
                if let Err(error) = self.drafts.discard_draft(&reporter_id).await {
                    warn!(reporter_id = %reporter_id, error = %error, "stale draft left behind");
                }
                emit(
                    self,
                    "case.submitted",
                    json!({
                        "reporter_id": reporter_id,
                        "record_id": report.record_id,
                        "attached": report.attached.len(),
                        "dropped": dropped,
                        "submitted_at": Utc::now().to_rfc3339(),
                    }),
                );
                Ok(report)
            }
            Err(error) => {
                if matches!(error, WizardError::Submission(_)) {
                    if let Err(save_error) = self.save_point(wizard).await {
                        warn!(reporter_id = %reporter_id, error = %save_error, "draft not saved after failed submission");
                    }
                }
                emit(
                    self,
                    "case.submission_failed",
                    json!({ "reporter_id": reporter_id, "reason": error.user_message() }),
                );
                Err(error)
            }
        }
    }

    /// Closes the wizard and forgets its save point.
    pub async fn abandon(&self, wizard: Wizard) -> Result<bool, WizardError> {
        let reporter_id = wizard.fields().reporter_id.clone();
        wizard.close();
        let discarded = self
            .drafts
            .discard_draft(&reporter_id)
            .await
            .map_err(WizardError::DraftStore)?;
        info!(reporter_id = %reporter_id, discarded, "wizard abandoned");
        emit(self, "wizard.abandoned", json!({ "reporter_id": reporter_id }));
        Ok(discarded)
    }

    fn fresh(&self, identity: &Identity) -> Wizard {
        Wizard::open(identity, (*self.config).clone(), self.services.clone())
    }
}

fn emit(state: &AppState, event_type: &str, data: Value) {
    let _ = state.update_bus.send(WizardUpdate {
        event_type: event_type.to_string(),
        data,
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use casedesk_bridge::{
        DraftStore, Identity, InMemoryBlobStore, InMemoryDraftStore, InMemoryRecordService,
        StaticIdentity,
    };
    use casedesk_capture::SimulatedMicrophone;
    use casedesk_contract::{CaseCategory, DraftStatus};

    use super::AppState;
    use crate::config::WizardConfig;
    use crate::error::WizardError;
    use crate::wizard::{Wizard, WizardServices};

    async fn loose_wizard_at_last_step(app: &AppState) -> Wizard {
        let mut wizard = app.open_wizard().await.expect("open");
        wizard
            .edit(|fields| {
                fields.category = Some(CaseCategory::WaitingTime);
                fields.title = "Four hour wait".to_string();
                fields.description = "Waited four hours in triage without an update.".to_string();
            })
            .expect("edit");
        while wizard.position() < wizard.total_steps() {
            assert!(wizard.next().valid);
        }
        wizard
    }

    fn state(drafts: Arc<InMemoryDraftStore>, config: WizardConfig) -> AppState {
        state_with_records(drafts, Arc::new(InMemoryRecordService::new()), config)
    }

    fn state_with_records(
        drafts: Arc<InMemoryDraftStore>,
        records: Arc<InMemoryRecordService>,
        config: WizardConfig,
    ) -> AppState {
        AppState::new(
            WizardServices {
                records,
                blobs: Arc::new(InMemoryBlobStore::default()),
                microphone: Arc::new(SimulatedMicrophone::granted(4)),
            },
            Arc::new(StaticIdentity(Identity {
                user_id: "user-3".to_string(),
                full_name: "Lin Reporter".to_string(),
                email: "lin@example.org".to_string(),
                phone: "5550100".to_string(),
            })),
            drafts,
            config,
        )
    }

    #[tokio::test]
    async fn save_point_survives_reopening() {
        let drafts = Arc::new(InMemoryDraftStore::new());
        let app = state(drafts.clone(), WizardConfig::loose());
        let mut updates = app.subscribe();

        let mut wizard = app.open_wizard().await.expect("open");
        wizard
            .edit(|fields| {
                fields.category = Some(CaseCategory::StaffConduct);
                fields.title = "Rude reception".to_string();
            })
            .expect("edit");
        assert!(wizard.next().valid);
        app.save_point(&wizard).await.expect("save");
        wizard.close();

        let reopened = app.open_wizard().await.expect("reopen");
        assert_eq!(reopened.position(), 2);
        assert_eq!(reopened.fields().title, "Rude reception");

        let first = updates.recv().await.expect("opened");
        assert_eq!(first.event_type, "wizard.opened");
        assert_eq!(first.data["restored"], false);
        assert_eq!(updates.recv().await.expect("saved").event_type, "draft.saved");
        let reopened_event = updates.recv().await.expect("reopened");
        assert_eq!(reopened_event.data["restored"], true);
    }

    #[tokio::test]
    async fn saved_draft_of_another_variant_is_ignored() {
        let drafts = Arc::new(InMemoryDraftStore::new());
        let loose = state(drafts.clone(), WizardConfig::loose());
        let wizard = loose.open_wizard().await.expect("open");
        loose.save_point(&wizard).await.expect("save");

        let strict = state(drafts, WizardConfig::strict());
        let fresh = strict.open_wizard().await.expect("open strict");
        assert_eq!(fresh.position(), 1);
        assert_eq!(fresh.total_steps(), 5);
    }

    #[tokio::test]
    async fn abandon_discards_the_save_point() {
        let drafts = Arc::new(InMemoryDraftStore::new());
        let app = state(drafts.clone(), WizardConfig::loose());
        let wizard = app.open_wizard().await.expect("open");
        app.save_point(&wizard).await.expect("save");
        assert_eq!(drafts.len().await, 1);

        assert!(app.abandon(wizard).await.expect("abandon"));
        assert!(drafts.load_draft("user-3").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn successful_submit_discards_the_save_point() {
        let drafts = Arc::new(InMemoryDraftStore::new());
        let records = Arc::new(InMemoryRecordService::new());
        let app = state_with_records(drafts.clone(), records.clone(), WizardConfig::loose());
        let mut updates = app.subscribe();

        let mut wizard = loose_wizard_at_last_step(&app).await;
        app.save_point(&wizard).await.expect("save");
        assert_eq!(drafts.len().await, 1);

        let report = app.submit(&mut wizard).await.expect("submit");
        assert!(drafts.load_draft("user-3").await.expect("load").is_none());
        assert_eq!(records.records().await.len(), 1);

        let mut last = None;
        while let Ok(update) = updates.try_recv() {
            last = Some(update);
        }
        let last = last.expect("submitted event");
        assert_eq!(last.event_type, "case.submitted");
        assert_eq!(last.data["record_id"], report.record_id.as_str());
    }

    #[tokio::test]
    async fn rolled_back_submit_refreshes_the_save_point() {
        let drafts = Arc::new(InMemoryDraftStore::new());
        let records = Arc::new(InMemoryRecordService::new());
        records.set_reject_creation(true);
        let app = state_with_records(drafts.clone(), records.clone(), WizardConfig::loose());

        let mut wizard = loose_wizard_at_last_step(&app).await;
        let error = app.submit(&mut wizard).await.expect_err("creation rejected");
        assert!(matches!(error, WizardError::Submission(_)));

        let saved = drafts
            .load_draft("user-3")
            .await
            .expect("load")
            .expect("draft kept for retry");
        assert_eq!(saved.draft.status(), DraftStatus::Draft);
        assert_eq!(saved.step, wizard.total_steps());
        assert_eq!(saved.draft.fields().title, "Four hour wait");

        records.set_reject_creation(false);
        let mut retried = app.open_wizard().await.expect("reopen");
        app.submit(&mut retried).await.expect("retry succeeds");
        assert!(drafts.is_empty().await);
    }
}
