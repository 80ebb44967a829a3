use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

use guardian_db::Database;
use guardian_db::models::ImageRow;
use guardian_types::models::{ModerationRecord, ModerationStatus};
use uuid::Uuid;

/// Run a blocking store call off the async runtime.
pub async fn blocking<F, T>(db: &Arc<Database>, f: F) -> Result<T>
where
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .context("spawn_blocking join error")?
}

pub fn record_from_row(row: ImageRow) -> Result<ModerationRecord> {
    let id = row
        .id
        .parse::<Uuid>()
        .with_context(|| format!("corrupt image id '{}'", row.id))?;
    let status = row
        .status
        .parse::<ModerationStatus>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("corrupt status on image '{}'", row.id))?;
    let created_at = parse_timestamp(&row.created_at)
        .with_context(|| format!("corrupt created_at '{}' on image '{}'", row.created_at, row.id))?;

    Ok(ModerationRecord {
        id,
        owner_id: row.owner_id,
        status,
        confidence: row.confidence,
        file_name: row.file_name,
        content_type: row.content_type,
        size: row.size.max(0) as u64,
        sha256: row.sha256,
        created_at,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
        return Ok(ts);
    }
    // SQLite's datetime('now') has no timezone; treat it as UTC.
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")?;
    Ok(naive.and_utc())
}
