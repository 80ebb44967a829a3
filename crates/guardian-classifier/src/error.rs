use thiserror::Error;

/// Failure of a single classification call. Never retried.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request timed out")]
    Timeout,

    #[error("classifier request failed: {0}")]
    Transport(String),

    #[error("classifier returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("malformed classifier response: {reason}")]
    Malformed { reason: String, body: String },
}

impl ClassifierError {
    /// Text to show the caller: the classifier's own response body when there
    /// is one, otherwise our description of what went wrong.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Status { body, .. } | Self::Malformed { body, .. } if !body.trim().is_empty() => {
                body.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifierError::Timeout
        } else {
            ClassifierError::Transport(err.to_string())
        }
    }
}
