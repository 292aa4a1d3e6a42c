use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use casedesk_bridge::{BridgeError, DraftStore, RecordService};
use casedesk_contract::{
    decode_snapshot, encode_snapshot, CaseRequest, RecordId, UploadedFile, VoiceNoteRef,
    WizardSnapshot,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub sqlite_path: String,
}

/// Local case database: records, their documents, dropped attachments and
/// wizard save points.
#[derive(Debug, Clone)]
pub struct CaseStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseRecord {
    pub record_id: String,
    pub kind: String,
    pub reporter_id: String,
    pub title: String,
    pub request_json: String,
    pub voice_note_url: Option<String>,
    pub voice_note_duration_secs: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseDocumentRecord {
    pub document_id: i64,
    pub record_id: String,
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub size: i64,
    pub storage_path: String,
    pub category: String,
    pub attached_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeadLetterRecord {
    pub dead_letter_id: i64,
    pub record_id: String,
    pub file_name: String,
    pub category: String,
    pub reason: String,
    pub attempts: i64,
    pub recorded_at: String,
}

impl CaseStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let uri = normalize_sqlite_uri(&config.sqlite_path);
        let options = SqliteConnectOptions::from_str(&uri)
            .with_context(|| format!("invalid sqlite URI: {}", uri))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect sqlite pool")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let sql = statement.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("migration failed for statement: {sql}"))?;
        }
        info!("casedesk sqlite schema ready");
        Ok(())
    }

    pub async fn insert_case(
        &self,
        request: &CaseRequest,
        voice_note: Option<&VoiceNoteRef>,
    ) -> Result<String> {
        let record_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let request_json = serde_json::to_string(request).context("serialize case request")?;
        let kind = serde_json::to_value(request.kind())
            .ok()
            .and_then(|value| value.as_str().map(str::to_owned))
            .context("case kind is not a string")?;

        sqlx::query(
            "INSERT INTO case_records(record_id, kind, reporter_id, title, request_json, voice_note_url, voice_note_duration_secs, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record_id)
        .bind(&kind)
        .bind(&request.common().reporter_id)
        .bind(&request.common().title)
        .bind(&request_json)
        .bind(voice_note.map(|note| note.url.as_str()))
        .bind(voice_note.map(|note| i64::from(note.duration_secs)))
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("insert case record")?;

        Ok(record_id)
    }

    pub async fn add_documents(&self, record_id: &str, documents: &[UploadedFile]) -> Result<()> {
        if self.get_case(record_id).await?.is_none() {
            bail!("case record {record_id} does not exist");
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.context("begin document transaction")?;
        for document in documents {
            sqlx::query(
                "INSERT INTO case_documents(record_id, name, url, content_type, size, storage_path, category, attached_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record_id)
            .bind(&document.name)
            .bind(&document.url)
            .bind(&document.content_type)
            .bind(i64::try_from(document.size).unwrap_or(i64::MAX))
            .bind(&document.storage_path)
            .bind(document.category.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert document {} for {record_id}", document.name))?;
        }
        tx.commit().await.context("commit document transaction")?;
        Ok(())
    }

    pub async fn get_case(&self, record_id: &str) -> Result<Option<CaseRecord>> {
        sqlx::query_as::<_, CaseRecord>(
            "SELECT record_id, kind, reporter_id, title, request_json, voice_note_url, voice_note_duration_secs, created_at FROM case_records WHERE record_id = ?",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("query case record {record_id}"))
    }

    pub async fn list_cases(&self, limit: i64) -> Result<Vec<CaseRecord>> {
        sqlx::query_as::<_, CaseRecord>(
            "SELECT record_id, kind, reporter_id, title, request_json, voice_note_url, voice_note_duration_secs, created_at FROM case_records ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("query case records")
    }

    pub async fn list_documents(&self, record_id: &str) -> Result<Vec<CaseDocumentRecord>> {
        sqlx::query_as::<_, CaseDocumentRecord>(
            "SELECT document_id, record_id, name, url, content_type, size, storage_path, category, attached_at FROM case_documents WHERE record_id = ? ORDER BY document_id ASC",
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("query documents for {record_id}"))
    }

    pub async fn record_dead_letter(
        &self,
        record_id: &str,
        file_name: &str,
        category: &str,
        reason: &str,
        attempts: u32,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO dead_letters(record_id, file_name, category, reason, attempts, recorded_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record_id)
        .bind(file_name)
        .bind(category)
        .bind(reason)
        .bind(i64::from(attempts))
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert dead letter {file_name} for {record_id}"))?;
        warn!(record_id = %record_id, file_name = %file_name, "attachment recorded as dead letter");
        Ok(())
    }

    pub async fn list_dead_letters(&self, limit: i64) -> Result<Vec<DeadLetterRecord>> {
        sqlx::query_as::<_, DeadLetterRecord>(
            "SELECT dead_letter_id, record_id, file_name, category, reason, attempts, recorded_at FROM dead_letters ORDER BY dead_letter_id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("query dead letters")
    }

    pub async fn save_snapshot(&self, reporter_id: &str, snapshot: &WizardSnapshot) -> Result<()> {
        let encoded = encode_snapshot(snapshot).context("encode wizard snapshot")?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO drafts(reporter_id, snapshot, saved_at) VALUES (?, ?, ?) ON CONFLICT(reporter_id) DO UPDATE SET snapshot = excluded.snapshot, saved_at = excluded.saved_at",
        )
        .bind(reporter_id)
        .bind(encoded)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("save draft for {reporter_id}"))?;
        Ok(())
    }

    pub async fn load_snapshot(&self, reporter_id: &str) -> Result<Option<WizardSnapshot>> {
        let row = sqlx::query_scalar::<_, Vec<u8>>("SELECT snapshot FROM drafts WHERE reporter_id = ?")
            .bind(reporter_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("query draft for {reporter_id}"))?;

        row.map(|bytes| {
            decode_snapshot::<WizardSnapshot>(&bytes)
                .with_context(|| format!("decode draft for {reporter_id}"))
        })
        .transpose()
    }

    pub async fn discard_snapshot(&self, reporter_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE reporter_id = ?")
            .bind(reporter_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("delete draft for {reporter_id}"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn purge_stale_drafts(&self, retention_days: i64) -> Result<u64> {
        let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).to_rfc3339();
        let result = sqlx::query("DELETE FROM drafts WHERE saved_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("purge stale drafts")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordService for CaseStore {
    async fn create_record(
        &self,
        request: CaseRequest,
        voice_note: Option<VoiceNoteRef>,
    ) -> Result<RecordId, BridgeError> {
        let record_id = self
            .insert_case(&request, voice_note.as_ref())
            .await
            .map_err(|error| BridgeError::CreationFailed(format!("{error:#}")))?;
        info!(record_id = %record_id, kind = ?request.kind(), "case record stored");
        Ok(record_id)
    }

    async fn attach_documents(
        &self,
        record_id: &str,
        documents: &[UploadedFile],
    ) -> Result<(), BridgeError> {
        self.add_documents(record_id, documents)
            .await
            .map_err(|error| BridgeError::Storage(format!("{error:#}")))
    }
}

#[async_trait]
impl DraftStore for CaseStore {
    async fn save_draft(
        &self,
        reporter_id: &str,
        snapshot: &WizardSnapshot,
    ) -> Result<(), BridgeError> {
        self.save_snapshot(reporter_id, snapshot)
            .await
            .map_err(|error| BridgeError::Storage(format!("{error:#}")))
    }

    async fn load_draft(&self, reporter_id: &str) -> Result<Option<WizardSnapshot>, BridgeError> {
        self.load_snapshot(reporter_id)
            .await
            .map_err(|error| BridgeError::Storage(format!("{error:#}")))
    }

    async fn discard_draft(&self, reporter_id: &str) -> Result<bool, BridgeError> {
        self.discard_snapshot(reporter_id)
            .await
            .map_err(|error| BridgeError::Storage(format!("{error:#}")))
    }
}

fn normalize_sqlite_uri(raw: &str) -> String {
    if raw.starts_with("sqlite:") {
        raw.to_string()
    } else {
        format!("sqlite://{raw}")
    }
}
