use std::{path::Path, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use casedesk_bridge::{FixedGeolocation, Identity, StaticIdentity};
use casedesk_capture::{CaptureConfig, RecordingStatus, SimulatedMicrophone};
use casedesk_contract::{CaseCategory, FileHandle, GeoPoint, PatientDetails, RequestKind};
use casedesk_storage::{CaseStore, LocalBlobStore, StorageConfig};
use casedesk_transfer::{RetryPolicy, SequencerConfig};
use casedesk_wizard::{AppState, LocationOutcome, Wizard, WizardConfig, WizardServices};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Case submission wizard driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs one draft through every wizard step and submits it.
    Submit {
        #[arg(long, default_value = "config/casedesk.toml")]
        config: PathBuf,
        #[arg(long)]
        draft: PathBuf,
        /// Seconds of simulated voice recording to capture before submitting.
        #[arg(long, default_value_t = 0)]
        record_seconds: u32,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    Records {
        #[arg(long, default_value = "config/casedesk.toml")]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    DeadLetters {
        #[arg(long, default_value = "config/casedesk.toml")]
        config: PathBuf,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    PurgeDrafts {
        #[arg(long, default_value = "config/casedesk.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct RuntimeConfig {
    wizard: WizardSection,
    recording: RecordingSection,
    uploads: UploadsSection,
    storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize)]
struct WizardSection {
    kind: RequestKind,
    min_description_chars: Option<usize>,
    #[serde(default)]
    check_contact_format: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RecordingSection {
    max_duration_secs: u32,
    chunk_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct UploadsSection {
    base_path: PathBuf,
    base_url: String,
    #[serde(default)]
    retry: RetryPolicy,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageSection {
    sqlite_path: String,
    draft_retention_days: i64,
}

/// What a reporter would have typed into the wizard.
#[derive(Debug, Clone, Deserialize)]
struct DraftInput {
    reporter: ReporterInput,
    category: CaseCategory,
    title: String,
    description: String,
    #[serde(default)]
    patient: PatientDetails,
    location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReporterInput {
    user_id: String,
    full_name: String,
    email: String,
    phone: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Submit {
            config,
            draft,
            record_seconds,
            attachments,
        } => submit(config, draft, record_seconds, attachments).await,
        Command::Records { config, limit } => records(config, limit).await,
        Command::DeadLetters { config, limit } => dead_letters(config, limit).await,
        Command::PurgeDrafts { config } => purge_drafts(config).await,
    }
}

fn load_config(config_path: &Path) -> Result<RuntimeConfig> {
    let config_source = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file {}", config_path.display()))?;
    toml::from_str(&config_source)
        .with_context(|| format!("invalid config TOML at {}", config_path.display()))
}

async fn open_store(config: &RuntimeConfig) -> Result<CaseStore> {
    CaseStore::connect(&StorageConfig {
        sqlite_path: config.storage.sqlite_path.clone(),
    })
    .await
}

fn wizard_config(config: &RuntimeConfig) -> WizardConfig {
    let mut wizard = WizardConfig::for_kind(config.wizard.kind);
    if let Some(min_chars) = config.wizard.min_description_chars {
        wizard.rules.min_description_chars = min_chars;
    }
    wizard.rules.check_contact_format = config.wizard.check_contact_format;
    wizard.capture = CaptureConfig {
        max_duration_secs: config.recording.max_duration_secs,
        ..CaptureConfig::default()
    };
    wizard.sequencer = SequencerConfig {
        retry: config.uploads.retry,
    };
    wizard
}

async fn submit(
    config_path: PathBuf,
    draft_path: PathBuf,
    record_seconds: u32,
    attachments: Vec<PathBuf>,
) -> Result<()> {
    let config = load_config(&config_path)?;
    let draft_source = std::fs::read_to_string(&draft_path)
        .with_context(|| format!("failed to read draft file {}", draft_path.display()))?;
    let input: DraftInput = serde_json::from_str(&draft_source)
        .with_context(|| format!("invalid draft JSON at {}", draft_path.display()))?;

    let store = Arc::new(open_store(&config).await?);
    let blobs = Arc::new(
        LocalBlobStore::new(&config.uploads.base_path, config.uploads.base_url.clone()).await?,
    );
    let identity = Identity {
        user_id: input.reporter.user_id.clone(),
        full_name: input.reporter.full_name.clone(),
        email: input.reporter.email.clone(),
        phone: input.reporter.phone.clone(),
    };

    let app = AppState::new(
        WizardServices {
            records: store.clone(),
            blobs,
            microphone: Arc::new(SimulatedMicrophone::granted(config.recording.chunk_bytes)),
        },
        Arc::new(StaticIdentity(identity)),
        store.clone(),
        wizard_config(&config),
    );

    let mut wizard = app
        .open_wizard()
        .await
        .map_err(|error| anyhow!(error).context("failed to open wizard"))?;
    fill_draft(&mut wizard, &input, record_seconds, &attachments).await?;

    while wizard.position() < wizard.total_steps() {
        let step = wizard.step();
        let validation = wizard.next();
        if !validation.valid {
            app.save_point(&wizard)
                .await
                .map_err(|error| anyhow!(error).context("failed to save draft"))?;
            bail!(
                "step {} ({}) rejected: {}",
                wizard.position(),
                step.title(),
                validation.reason.unwrap_or_default()
            );
        }
    }

    let report = match app.submit(&mut wizard).await {
        Ok(report) => report,
        Err(error) => {
            let message = error.user_message();
            return Err(anyhow!(error).context(message));
        }
    };

    for dead in &report.dropped {
        store
            .record_dead_letter(
                &report.record_id,
                dead.file_name(),
                dead.category.as_str(),
                &dead.reason,
                dead.attempts,
            )
            .await?;
    }

    info!(record_id = %report.record_id, "submission finished");
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "record_id": report.record_id,
            "voice_note": report.voice_note,
            "attached": report.attached,
            "dropped": report
                .dropped
                .iter()
                .map(|dead| json!({ "file_name": dead.file_name(), "reason": dead.reason }))
                .collect::<Vec<_>>(),
        }))?
    );
    Ok(())
}

async fn fill_draft(
    wizard: &mut Wizard,
    input: &DraftInput,
    record_seconds: u32,
    attachments: &[PathBuf],
) -> Result<()> {
    // A resumed draft keeps its earlier attachments; this run's --attach list replaces them.
    wizard
        .edit(|fields| {
            fields.category = Some(input.category);
            fields.title = input.title.clone();
            fields.description = input.description.clone();
            fields.patient = input.patient.clone();
            fields.attachments.clear();
        })
        .map_err(|error| anyhow!(error))?;

    let outcome = wizard
        .capture_location(&FixedGeolocation(input.location))
        .await
        .map_err(|error| anyhow!(error))?;
    if let LocationOutcome::Unavailable(reason) = outcome {
        info!(reason = %reason, "submitting without a location");
    }

    for path in attachments {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("attachment path {} has no file name", path.display()))?;
        wizard
            .attach(FileHandle::on_disk(file_name, content_type_for(path), path))
            .map_err(|error| anyhow!(error))?;
    }

    if record_seconds > 0 {
        if wizard.fields().voice_note.is_some() {
            wizard.delete_recording().map_err(|error| anyhow!(error))?;
        }
        wizard
            .start_recording()
            .await
            .map_err(|error| anyhow!(error).context("failed to start recording"))?;
        for _ in 0..record_seconds {
            if wizard.tick_recording() != RecordingStatus::Recording {
                warn!(
                    max_duration_secs = wizard.recorder().max_duration_secs(),
                    "recording ceiling reached before requested duration"
                );
                break;
            }
        }
        if wizard.recorder().status() == RecordingStatus::Recording {
            wizard.stop_recording().map_err(|error| anyhow!(error))?;
        }
    }
    Ok(())
}

fn content_type_for(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let mime = match extension.as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("txt") => mime::TEXT_PLAIN,
        Some("json") => mime::APPLICATION_JSON,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    mime.to_string()
}

async fn records(config_path: PathBuf, limit: i64) -> Result<()> {
    let config = load_config(&config_path)?;
    let store = open_store(&config).await?;
    for record in store.list_cases(limit).await? {
        let documents = store.list_documents(&record.record_id).await?;
        println!(
            "{}",
            serde_json::to_string(&json!({
                "record_id": record.record_id,
                "kind": record.kind,
                "title": record.title,
                "reporter_id": record.reporter_id,
                "voice_note_url": record.voice_note_url,
                "documents": documents.iter().map(|doc| doc.name.as_str()).collect::<Vec<_>>(),
                "created_at": record.created_at,
            }))?
        );
    }
    Ok(())
}

async fn dead_letters(config_path: PathBuf, limit: i64) -> Result<()> {
    let config = load_config(&config_path)?;
    let store = open_store(&config).await?;
    for letter in store.list_dead_letters(limit).await? {
        println!("{}", serde_json::to_string(&letter)?);
    }
    Ok(())
}

async fn purge_drafts(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let store = open_store(&config).await?;
    let purged = store
        .purge_stale_drafts(config.storage.draft_retention_days)
        .await?;
    info!(
        purged,
        retention_days = config.storage.draft_retention_days,
        "stale drafts purged"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{content_type_for, fill_draft, wizard_config, DraftInput, RuntimeConfig};
    use casedesk_bridge::{
        Identity, InMemoryBlobStore, InMemoryDraftStore, InMemoryRecordService, StaticIdentity,
    };
    use casedesk_capture::SimulatedMicrophone;
    use casedesk_contract::RequestKind;
    use casedesk_transfer::RetryPolicy;
    use casedesk_wizard::{AppState, WizardConfig, WizardServices};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    const SAMPLE_CONFIG: &str = include_str!("../../../config/casedesk.toml");
    const SAMPLE_DRAFT: &str = include_str!("../../../config/sample_draft.json");

    #[test]
    fn sample_config_parses_into_wizard_settings() {
        let config: RuntimeConfig = toml::from_str(SAMPLE_CONFIG).expect("config");
        let wizard = wizard_config(&config);
        assert_eq!(wizard.kind(), RequestKind::PatientComplaint);
        assert_eq!(wizard.capture.max_duration_secs, 300);
        assert!(matches!(wizard.sequencer.retry, RetryPolicy::Backoff { .. }));
        assert!(!wizard.rules.check_contact_format);
    }

    #[tokio::test]
    async fn resumed_draft_does_not_duplicate_attachments() {
        let input: DraftInput = serde_json::from_str(SAMPLE_DRAFT).expect("draft");
        let app = AppState::new(
            WizardServices {
                records: Arc::new(InMemoryRecordService::new()),
                blobs: Arc::new(InMemoryBlobStore::default()),
                microphone: Arc::new(SimulatedMicrophone::granted(64)),
            },
            Arc::new(StaticIdentity(Identity {
                user_id: input.reporter.user_id.clone(),
                full_name: input.reporter.full_name.clone(),
                email: input.reporter.email.clone(),
                phone: input.reporter.phone.clone(),
            })),
            Arc::new(InMemoryDraftStore::new()),
            WizardConfig::strict(),
        );
        let attachments = vec![PathBuf::from("scan.pdf")];

        let mut first = app.open_wizard().await.expect("open");
        fill_draft(&mut first, &input, 0, &attachments)
            .await
            .expect("fill");
        app.save_point(&first).await.expect("save");
        first.close();

        let mut resumed = app.open_wizard().await.expect("reopen");
        assert_eq!(resumed.fields().attachments.len(), 1);
        fill_draft(&mut resumed, &input, 3, &attachments)
            .await
            .expect("fill again");

        let names: Vec<&str> = resumed
            .fields()
            .attachments
            .iter()
            .map(|file| file.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["scan.pdf"]);
        assert!(resumed.fields().voice_note.is_some());
    }

    #[test]
    fn sample_draft_parses() {
        let draft: DraftInput = serde_json::from_str(SAMPLE_DRAFT).expect("draft");
        assert!(draft.description.trim().chars().count() >= 100);
        assert!(draft.patient.patient_age > 0);
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type_for(Path::new("scan.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(
            content_type_for(Path::new("blob")),
            "application/octet-stream"
        );
    }
}
