use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use guardian_types::models::LabelScore;

use crate::error::ClassifierError;

/// Anything that can score an image against a set of concepts.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>, ClassifierError>;
}

/// Connection settings for the Clarifai workflow API.
#[derive(Clone)]
pub struct ClarifaiConfig {
    pub base_url: String,
    pub workflow_id: String,
    pub user_id: String,
    pub app_id: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl ClarifaiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.clarifai.com/v2".into(),
            workflow_id: "Moderation".into(),
            user_id: "clarifai".into(),
            app_id: "main".into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/workflows/{}/results",
            self.base_url.trim_end_matches('/'),
            self.workflow_id
        )
    }
}

impl fmt::Debug for ClarifaiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClarifaiConfig")
            .field("base_url", &self.base_url)
            .field("workflow_id", &self.workflow_id)
            .field("user_id", &self.user_id)
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WorkflowRequest<'a> {
    user_app_id: UserAppId<'a>,
    inputs: Vec<Input>,
}

#[derive(Serialize)]
struct UserAppId<'a> {
    user_id: &'a str,
    app_id: &'a str,
}

#[derive(Serialize)]
struct Input {
    data: InputData,
}

#[derive(Serialize)]
struct InputData {
    image: InputImage,
}

#[derive(Serialize)]
struct InputImage {
    base64: String,
}

#[derive(Deserialize)]
struct WorkflowResponse {
    #[serde(default)]
    results: Vec<WorkflowResult>,
}

#[derive(Deserialize)]
struct WorkflowResult {
    #[serde(default)]
    outputs: Vec<Output>,
}

#[derive(Deserialize)]
struct Output {
    #[serde(default)]
    data: Option<OutputData>,
}

#[derive(Deserialize)]
struct OutputData {
    #[serde(default)]
    concepts: Vec<Concept>,
}

#[derive(Deserialize)]
struct Concept {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<f64>,
}

// ── Client ──────────────────────────────────────────────────────────────

/// Calls a Clarifai moderation workflow once per image. No retries.
pub struct ClarifaiClient {
    http: reqwest::Client,
    config: ClarifaiConfig,
}

impl ClarifaiClient {
    pub fn new(config: ClarifaiConfig) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClarifaiConfig {
        &self.config
    }
}

#[async_trait]
impl Classifier for ClarifaiClient {
    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>, ClassifierError> {
        let payload = WorkflowRequest {
            user_app_id: UserAppId {
                user_id: &self.config.user_id,
                app_id: &self.config.app_id,
            },
            inputs: vec![Input {
                data: InputData {
                    image: InputImage {
                        base64: B64.encode(image),
                    },
                },
            }],
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| ClassifierError::Transport(format!("failed to encode request: {}", e)))?;

        let response = self
            .http
            .post(self.config.endpoint())
            .header(AUTHORIZATION, format!("Key {}", self.config.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Classifier request failed: {}", e);
                ClassifierError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Classifier returned {}: {}", status, text);
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let concepts = parse_concepts(&text)?;
        debug!(count = concepts.len(), "Classifier returned concepts");
        Ok(concepts)
    }
}

/// Flatten every concept of every output of the first result, in order.
///
/// A missing `name` becomes an empty label and a missing `value` a zero
/// score. A body without any result, or a score outside `[0, 1]`, is
/// malformed.
pub fn parse_concepts(body: &str) -> Result<Vec<LabelScore>, ClassifierError> {
    let parsed: WorkflowResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::Malformed {
            reason: e.to_string(),
            body: body.to_string(),
        })?;

    let result = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ClassifierError::Malformed {
            reason: "response has no results".into(),
            body: body.to_string(),
        })?;

    let concepts = result
        .outputs
        .into_iter()
        .filter_map(|output| output.data)
        .flat_map(|data| data.concepts)
        .map(|concept| {
            let label = concept.name.unwrap_or_default();
            let score = concept.value.unwrap_or(0.0);
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(ClassifierError::Malformed {
                    reason: format!("score {} for concept '{}' is outside [0, 1]", score, label),
                    body: body.to_string(),
                });
            }
            Ok(LabelScore { label, score })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(concepts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_concepts_across_outputs_in_order() {
        let body = r#"{
            "status": {"code": 10000},
            "results": [{
                "outputs": [
                    {"data": {"concepts": [{"name": "safe", "value": 0.9}, {"name": "drug", "value": 0.05}]}},
                    {"data": {"concepts": [{"name": "weapons", "value": 0.8}]}}
                ]
            }]
        }"#;

        let concepts = parse_concepts(body).unwrap();
        assert_eq!(
            concepts,
            vec![
                LabelScore::new("safe", 0.9),
                LabelScore::new("drug", 0.05),
                LabelScore::new("weapons", 0.8),
            ]
        );
    }

    #[test]
    fn missing_name_and_value_default() {
        let body = r#"{"results": [{"outputs": [{"data": {"concepts": [{"id": "x"}, {"name": null, "value": null}]}}]}]}"#;
        let concepts = parse_concepts(body).unwrap();
        assert_eq!(concepts, vec![LabelScore::new("", 0.0), LabelScore::new("", 0.0)]);
    }

    #[test]
    fn outputs_without_data_contribute_nothing() {
        let body = r#"{"results": [{"outputs": [{"id": "o1"}, {"data": {}}]}]}"#;
        assert!(parse_concepts(body).unwrap().is_empty());

        let body = r#"{"results": [{}]}"#;
        assert!(parse_concepts(body).unwrap().is_empty());
    }

    #[test]
    fn only_the_first_result_is_read() {
        let body = r#"{"results": [
            {"outputs": [{"data": {"concepts": [{"name": "cat", "value": 0.9}]}}]},
            {"outputs": [{"data": {"concepts": [{"name": "gore", "value": 0.9}]}}]}
        ]}"#;
        assert_eq!(parse_concepts(body).unwrap(), vec![LabelScore::new("cat", 0.9)]);
    }

    #[test]
    fn empty_results_are_malformed() {
        for body in [r#"{"results": []}"#, r#"{"status": {"code": 10000}}"#] {
            match parse_concepts(body) {
                Err(ClassifierError::Malformed { body: raw, .. }) => assert_eq!(raw, body),
                other => panic!("expected malformed error, got {:?}", other),
            }
        }
    }

    #[test]
    fn scores_outside_unit_range_are_malformed() {
        for value in ["1.5", "-0.1"] {
            let body = format!(
                r#"{{"results": [{{"outputs": [{{"data": {{"concepts": [{{"name": "cat", "value": 0.2}}, {{"name": "gore", "value": {}}}]}}}}]}}]}}"#,
                value
            );
            match parse_concepts(&body) {
                Err(ClassifierError::Malformed { reason, .. }) => assert!(reason.contains("gore")),
                other => panic!("expected malformed error for {}, got {:?}", value, other),
            }
        }
    }

    #[test]
    fn unit_range_bounds_are_accepted() {
        let body = r#"{"results": [{"outputs": [{"data": {"concepts": [{"name": "nsfw", "value": 1.0}, {"name": "cat", "value": 0}]}}]}]}"#;
        assert_eq!(
            parse_concepts(body).unwrap(),
            vec![LabelScore::new("nsfw", 1.0), LabelScore::new("cat", 0.0)]
        );
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_concepts("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed { .. }));
        assert_eq!(err.diagnostic(), "<html>bad gateway</html>");
    }

    #[test]
    fn endpoint_joins_base_url_and_workflow() {
        let mut config = ClarifaiConfig::new("key");
        config.base_url = "http://localhost:9000/v2/".into();
        config.workflow_id = "Moderation".into();
        assert_eq!(config.endpoint(), "http://localhost:9000/v2/workflows/Moderation/results");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = ClarifaiConfig::new("super-secret-pat");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-pat"));
        assert!(rendered.contains("<redacted>"));
    }
}
