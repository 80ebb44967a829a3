use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use guardian_classifier::ClarifaiConfig;
use guardian_classifier::ModerationPolicy;
use guardian_classifier::policy::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_UNSAFE_LABELS};

/// Auth secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub max_upload_bytes: usize,
    pub auth: AuthConfig,
    pub classifier: ClarifaiConfig,
    pub unsafe_labels: Vec<String>,
    pub confidence_threshold: f64,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secret = get("GUARDIAN_AUTH_SECRET").unwrap_or_default();
        if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
            bail!("GUARDIAN_AUTH_SECRET is unset or still a placeholder");
        }

        let api_key = get("GUARDIAN_CLASSIFIER_API_KEY")
            .context("GUARDIAN_CLASSIFIER_API_KEY must be set")?;

        let mut classifier = ClarifaiConfig::new(api_key);
        if let Some(url) = get("GUARDIAN_CLASSIFIER_URL") {
            classifier.base_url = url;
        }
        if let Some(workflow) = get("GUARDIAN_CLASSIFIER_WORKFLOW") {
            classifier.workflow_id = workflow;
        }
        if let Some(user_id) = get("GUARDIAN_CLASSIFIER_USER_ID") {
            classifier.user_id = user_id;
        }
        if let Some(app_id) = get("GUARDIAN_CLASSIFIER_APP_ID") {
            classifier.app_id = app_id;
        }
        let timeout_secs: u64 = parse_or(&get, "GUARDIAN_CLASSIFIER_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            bail!("GUARDIAN_CLASSIFIER_TIMEOUT_SECS must be greater than zero");
        }
        classifier.timeout = Duration::from_secs(timeout_secs);

        let unsafe_labels: Vec<String> = match get("GUARDIAN_UNSAFE_LABELS") {
            Some(raw) => raw
                .split(',')
                .map(|label| label.trim().to_lowercase())
                .filter(|label| !label.is_empty())
                .collect(),
            None => DEFAULT_UNSAFE_LABELS.iter().map(|l| l.to_string()).collect(),
        };
        if unsafe_labels.is_empty() {
            bail!("GUARDIAN_UNSAFE_LABELS must name at least one label");
        }

        let confidence_threshold: f64 = parse_or(
            &get,
            "GUARDIAN_CONFIDENCE_THRESHOLD",
            DEFAULT_CONFIDENCE_THRESHOLD,
        )?;
        if !(0.0..=1.0).contains(&confidence_threshold) {
            bail!(
                "GUARDIAN_CONFIDENCE_THRESHOLD must lie in [0, 1], got {}",
                confidence_threshold
            );
        }

        Ok(Self {
            host: get("GUARDIAN_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "GUARDIAN_PORT", 8000)?,
            db_path: get("GUARDIAN_DB_PATH").unwrap_or_else(|| "guardian.db".into()).into(),
            max_upload_bytes: parse_or(&get, "GUARDIAN_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            auth: AuthConfig {
                secret,
                issuer: get("GUARDIAN_AUTH_ISSUER"),
                audience: get("GUARDIAN_AUTH_AUDIENCE"),
            },
            classifier,
            unsafe_labels,
            confidence_threshold,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn policy(&self) -> ModerationPolicy {
        ModerationPolicy::new(&self.unsafe_labels, self.confidence_threshold)
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
