use std::collections::HashSet;

use guardian_types::models::{LabelScore, Verdict};

pub const DEFAULT_UNSAFE_LABELS: [&str; 12] = [
    "explicit",
    "gore",
    "drug",
    "suggestive",
    "violence",
    "weapons",
    "nsfw",
    "graphic",
    "obscene",
    "gruesome",
    "erotica",
    "sexual",
];

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Turns classifier label scores into a verdict.
///
/// A label flags the image when it is in the unsafe set (case-insensitive)
/// and its score is strictly above the threshold. The first flagging label
/// in input order decides the confidence; there is no search for the highest
/// score. Safe verdicts always carry confidence `1.0`.
#[derive(Debug, Clone)]
pub struct ModerationPolicy {
    unsafe_labels: HashSet<String>,
    threshold: f64,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_UNSAFE_LABELS, DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl ModerationPolicy {
    pub fn new<I, S>(unsafe_labels: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unsafe_labels = unsafe_labels
            .into_iter()
            .map(|label| label.as_ref().trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect();

        Self {
            unsafe_labels,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn unsafe_labels(&self) -> &HashSet<String> {
        &self.unsafe_labels
    }

    pub fn is_flagging(&self, pair: &LabelScore) -> bool {
        pair.score > self.threshold && self.unsafe_labels.contains(&pair.label.to_lowercase())
    }

    pub fn evaluate(&self, scores: &[LabelScore]) -> Verdict {
        let flagged = scores.iter().find(|pair| self.is_flagging(pair));

        match flagged {
            Some(pair) => Verdict {
                is_unsafe: true,
                confidence: pair.score,
            },
            // Safe confidence is the complement of the flagged confidence,
            // which is zero here. It does not reflect the top safe score.
            None => {
                let flagged_confidence = 0.0;
                Verdict {
                    is_unsafe: false,
                    confidence: 1.0 - flagged_confidence,
                }
            }
        }
    }
}
