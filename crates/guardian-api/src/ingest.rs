use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use guardian_classifier::{Classifier, ClassifierError, ModerationPolicy};
use guardian_db::Database;
use guardian_db::models::NewImage;
use guardian_types::models::{ModerationRecord, Principal};

use crate::store::{blocking, record_from_row};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error("caller is not authenticated")]
    Unauthenticated,

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        IngestError::Store(format!("{:#}", err))
    }
}

/// A fully buffered upload. The same immutable bytes are persisted and sent
/// to the classifier.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl ImageUpload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: None,
            content_type: None,
        }
    }
}

/// Create placeholder, classify, apply verdict; on failure, remove the
/// placeholder so no `pending` row outlives the request.
#[derive(Clone)]
pub struct IngestWorkflow {
    db: Arc<Database>,
    classifier: Arc<dyn Classifier>,
    policy: Arc<ModerationPolicy>,
}

impl IngestWorkflow {
    pub fn new(db: Arc<Database>, classifier: Arc<dyn Classifier>, policy: ModerationPolicy) -> Self {
        Self {
            db,
            classifier,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &ModerationPolicy {
        &self.policy
    }

    pub async fn ingest(
        &self,
        owner: &Principal,
        upload: Option<ImageUpload>,
    ) -> Result<ModerationRecord, IngestError> {
        if !owner.is_authenticated || owner.subject_id.is_empty() {
            return Err(IngestError::Unauthenticated);
        }

        let upload = upload
            .filter(|u| !u.bytes.is_empty())
            .ok_or_else(|| IngestError::Validation("Image file is required.".into()))?;

        // The unit of work runs on its own task. Dropping the caller's future
        // stops the wait, not the work: the placeholder is always finalized
        // or discarded.
        let id = Uuid::new_v4().to_string();
        let workflow = self.clone();
        let owner_id = owner.subject_id.clone();
        let task_id = id.clone();
        let joined = tokio::spawn(async move { workflow.run(&task_id, &owner_id, upload).await }).await;

        match joined {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(image_id = %id, "Moderation task aborted: {}", join_err);
                self.discard(&id).await;
                Err(IngestError::Store(format!("moderation task aborted: {}", join_err)))
            }
        }
    }

    async fn run(
        &self,
        id: &str,
        owner_id: &str,
        upload: ImageUpload,
    ) -> Result<ModerationRecord, IngestError> {
        self.create_placeholder(id, owner_id, &upload).await?;
        info!(image_id = %id, owner = %owner_id, size = upload.bytes.len(), "Created pending image");

        match self.classify_and_finalize(id, owner_id, &upload.bytes).await {
            Ok(record) => {
                info!(
                    image_id = %id,
                    status = %record.status,
                    confidence = record.confidence,
                    "Image moderated"
                );
                Ok(record)
            }
            Err(err) => {
                warn!(image_id = %id, "Moderation failed, discarding placeholder: {}", err);
                self.discard(id).await;
                Err(err)
            }
        }
    }

    async fn create_placeholder(
        &self,
        id: &str,
        owner_id: &str,
        upload: &ImageUpload,
    ) -> Result<(), IngestError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let bytes = upload.bytes.clone();
        let file_name = upload.file_name.clone();
        let content_type = upload
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        blocking(&self.db, move |db| {
            db.create_image(&NewImage {
                id: &id,
                owner_id: &owner_id,
                content: &bytes,
                content_type: &content_type,
                file_name: file_name.as_deref(),
                sha256: &sha256,
                created_at: &created_at,
            })
        })
        .await?;
        Ok(())
    }

    async fn classify_and_finalize(
        &self,
        id: &str,
        owner_id: &str,
        bytes: &Bytes,
    ) -> Result<ModerationRecord, IngestError> {
        let concepts = self.classifier.classify(bytes).await?;
        let verdict = self.policy.evaluate(&concepts);

        let id = id.to_string();
        let owner_id = owner_id.to_string();
        let row = blocking(&self.db, move |db| {
            db.finalize_image(&id, verdict.status().as_str(), verdict.confidence)?;
            db.get_image(&id, &owner_id)?
                .ok_or_else(|| anyhow::anyhow!("Image {} missing after finalize", id))
        })
        .await?;

        Ok(record_from_row(row)?)
    }

    /// Compensating delete. A failure here is logged; the caller still sees
    /// the error that caused the rollback.
    async fn discard(&self, id: &str) {
        let image_id = id.to_string();
        match blocking(&self.db, move |db| db.discard_image(&image_id)).await {
            Ok(true) => info!(image_id = %id, "Discarded pending image"),
            Ok(false) => warn!(image_id = %id, "Pending image already gone"),
            Err(e) => error!(image_id = %id, "Failed to discard pending image: {:#}", e),
        }
    }
}
