use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ModerationRecord, ModerationStatus};

// -- Moderation --

#[derive(Debug, Serialize, Deserialize)]
pub struct ModerationResponse {
    pub status: ModerationStatus,
    pub confidence: f64,
}

// -- Images --

/// Serialized view of a record. `owner_id`, `status` and `confidence` are
/// read-only; only `file_name` can be changed through the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub image: String,
    pub status: ModerationStatus,
    pub confidence: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub file_name: Option<String>,
    pub owner_id: String,
}

impl From<ModerationRecord> for ImageResponse {
    fn from(record: ModerationRecord) -> Self {
        Self {
            image: record.image_ref(),
            id: record.id,
            status: record.status,
            confidence: record.confidence,
            created_at: record.created_at,
            file_name: record.file_name,
            owner_id: record.owner_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImagePage {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateImageRequest {
    pub file_name: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
