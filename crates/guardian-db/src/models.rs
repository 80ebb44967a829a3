//! Row types, mapped straight from SQLite. Kept separate from the
//! guardian-types models so the store has no serde or chrono dependency.

pub struct ImageRow {
    pub id: String,
    pub owner_id: String,
    pub status: String,
    pub confidence: Option<f64>,
    pub file_name: Option<String>,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

pub struct ImageContentRow {
    pub content: Vec<u8>,
    pub content_type: String,
    pub sha256: String,
}

/// Values needed to create a pending placeholder.
pub struct NewImage<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub content: &'a [u8],
    pub content_type: &'a str,
    pub file_name: Option<&'a str>,
    pub sha256: &'a str,
    pub created_at: &'a str,
}
