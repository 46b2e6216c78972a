use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;

use super::domain::ImageFormat;
use crate::config::OracleConfig;

/// Hunt-provided context the oracle may use to calibrate its judgement.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictHints {
    pub description: String,
    pub difficulty: Option<f32>,
    pub hint: String,
}

/// Structured judgement returned by the validation oracle.
///
/// `prompt` and `raw_response` are opaque diagnostic artifacts kept verbatim
/// for audit; the coordinator stores them and never interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_valid: bool,
    pub similarity_score: f64,
    pub confidence_score: f64,
    pub notes: String,
    pub prompt: String,
    pub raw_response: String,
}

/// Failure modes of an oracle invocation. Every variant maps to a
/// `ValidationUnavailable` workflow outcome; none of them is ever folded
/// into an "invalid" verdict.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle call timed out")]
    Timeout,
    #[error("oracle transport failed: {0}")]
    Transport(String),
    #[error("oracle returned a malformed response: {0}")]
    Malformed(String),
    #[error("oracle cannot judge the supplied input: {0}")]
    UnsupportedInput(String),
}

/// Scoring oracle judging a submitted photo against a hunt's reference photo.
pub trait ValidationOracle: Send + Sync {
    fn judge(
        &self,
        reference: &[u8],
        submission: &[u8],
        hints: &VerdictHints,
    ) -> Result<Verdict, OracleError>;
}

/// Oracle adapter speaking the vision-capable chat-completions wire format.
///
/// Wraps the async HTTP client behind the synchronous trait with an owned
/// runtime so the coordinator never deals with async plumbing. Both images
/// travel inline as base64 data URLs.
pub struct VisionChatOracle {
    client: reqwest::Client,
    runtime: Runtime,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl VisionChatOracle {
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let runtime = Runtime::new().map_err(|err| OracleError::Transport(err.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            runtime,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

impl std::fmt::Debug for VisionChatOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionChatOracle")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ValidationOracle for VisionChatOracle {
    fn judge(
        &self,
        reference: &[u8],
        submission: &[u8],
        hints: &VerdictHints,
    ) -> Result<Verdict, OracleError> {
        if reference.is_empty() || submission.is_empty() {
            return Err(OracleError::UnsupportedInput(
                "empty image stream".to_string(),
            ));
        }

        let prompt = build_comparison_prompt(hints);
        let body = json!({
            "model": self.model,
            "temperature": 0.1,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url(reference) } },
                    { "type": "image_url", "image_url": { "url": data_url(submission) } },
                    { "type": "text", "text": RESPONSE_FORMAT_INSTRUCTIONS },
                ],
            }],
        });

        let response = self.runtime.block_on(async {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await
        });

        let response = response.map_err(|err| {
            if err.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Transport(err.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = self
                .runtime
                .block_on(response.text())
                .unwrap_or_default();
            return Err(OracleError::Transport(format!(
                "status {status}: {message}"
            )));
        }

        let chat: ChatResponse = self
            .runtime
            .block_on(response.json())
            .map_err(|err| OracleError::Malformed(err.to_string()))?;

        let raw = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Malformed("response carried no choices".to_string()))?;

        let parsed = extract_verdict(&raw)?;
        Ok(Verdict {
            is_valid: parsed.is_valid,
            similarity_score: normalize_score(parsed.similarity_score),
            confidence_score: normalize_score(parsed.confidence_score),
            notes: parsed.notes,
            prompt,
            raw_response: raw,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    similarity_score: f64,
    #[serde(default)]
    confidence_score: f64,
    #[serde(default)]
    is_valid: bool,
    #[serde(default)]
    notes: String,
}

const RESPONSE_FORMAT_INSTRUCTIONS: &str = r#"Respond with a single JSON object:
{
    "similarity_score": 0.85,
    "confidence_score": 0.92,
    "is_valid": true,
    "notes": "Why the photos do or do not show the same subject."
}
Scores range from 0.0 to 1.0. Be strict but fair: the submitted photo must clearly show the same subject or location as the reference image."#;

fn build_comparison_prompt(hints: &VerdictHints) -> String {
    let mut prompt = String::from(
        "You are an expert photo validation judge. Compare the reference image \
         (first) with the submitted image (second) and decide whether they show \
         the same subject or location. Consider landmarks, architectural \
         features, and whether the angle and perspective plausibly match.\n\n",
    );
    prompt.push_str(&format!("HUNT DESCRIPTION: {}\n", hints.description));
    if let Some(difficulty) = hints.difficulty {
        prompt.push_str(&format!("HUNT DIFFICULTY: {difficulty:.1} out of 5\n"));
    }
    if !hints.hint.is_empty() {
        prompt.push_str(&format!("HUNT HINT: {}\n", hints.hint));
    }
    prompt
}

fn data_url(bytes: &[u8]) -> String {
    let content_type = ImageFormat::sniff(bytes)
        .map(ImageFormat::content_type)
        .unwrap_or("image/jpeg");
    format!(
        "data:{content_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Pull the first JSON object out of the model text. Vision models tend to
/// wrap the payload in prose or code fences, so the parse is positional.
fn extract_verdict(text: &str) -> Result<RawVerdict, OracleError> {
    let start = text
        .find('{')
        .ok_or_else(|| OracleError::Malformed("no JSON object in oracle text".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| OracleError::Malformed("unterminated JSON object".to_string()))?;

    serde_json::from_str(&text[start..=end])
        .map_err(|err| OracleError::Malformed(err.to_string()))
}

/// Fold percentage-style scores back into the unit interval and clamp.
fn normalize_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let value = if value > 1.0 { value / 100.0 } else { value };
    value.clamp(0.0, 1.0)
}
