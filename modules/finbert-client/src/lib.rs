pub mod error;
pub mod types;

pub use error::{FinbertError, Result};
pub use types::{Distribution, LabelScore};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;
use types::{ClassifyParameters, ClassifyRequest, ClassifyResponse, ErrorBody, InferenceOptions};

const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

/// Finance-tuned BERT, three classes.
pub const DEFAULT_MODEL: &str = "yiyanghkust/finbert-tone";

/// Inputs longer than this are cut before sending; the model only sees
/// its first 128 tokens anyway.
const MAX_INPUT_BYTES: usize = 2_000;

pub struct FinbertClient {
    token: String,
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl FinbertClient {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            http: reqwest::Client::new(),
            base_url: HF_INFERENCE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| FinbertError::Parse(format!("invalid API token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Classify a batch of texts. Returns one distribution per input, in input order.
    pub async fn classify(&self, texts: &[String]) -> Result<Vec<Distribution>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<String> = texts
            .iter()
            .map(|t| truncate_to_char_boundary(t, MAX_INPUT_BYTES).to_string())
            .collect();
        let request = ClassifyRequest {
            inputs: &inputs,
            parameters: ClassifyParameters {
                top_k: 3,
                truncation: true,
                max_length: 128,
            },
            options: InferenceOptions {
                wait_for_model: true,
                use_cache: false,
            },
        };

        let url = format!("{}/{}", self.base_url, self.model);
        debug!(model = %self.model, batch = inputs.len(), "FinBERT classify request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(self.api_error(status.as_u16(), body));
        }

        parse_classifications(&body, texts.len())
    }

    fn api_error(&self, status: u16, body: String) -> FinbertError {
        if status == 503 {
            if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
                if err.estimated_time.is_some() || err.error.contains("loading") {
                    return FinbertError::ModelLoading {
                        model: self.model.clone(),
                    };
                }
            }
        }
        FinbertError::Api {
            status,
            message: body,
        }
    }
}

/// Parse a classification response body, checking it covers every input.
pub fn parse_classifications(body: &str, expected: usize) -> Result<Vec<Distribution>> {
    let rows = serde_json::from_str::<ClassifyResponse>(body)?.into_batch();
    if rows.len() != expected {
        return Err(FinbertError::CountMismatch {
            expected,
            got: rows.len(),
        });
    }
    rows.iter()
        .map(|row| Distribution::from_label_scores(row))
        .collect()
}

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_checks_row_count() {
        let body = r#"[[{"label": "Positive", "score": 1.0}]]"#;
        assert!(matches!(
            parse_classifications(body, 2),
            Err(FinbertError::CountMismatch { expected: 2, got: 1 })
        ));
        assert_eq!(parse_classifications(body, 1).unwrap()[0].positive, 1.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_classifications(r#"{"oops": true}"#, 1),
            Err(FinbertError::Parse(_))
        ));
    }

    #[test]
    fn loading_model_is_distinguished() {
        let client = FinbertClient::new("hf_test");
        let err = client.api_error(
            503,
            r#"{"error": "Model yiyanghkust/finbert-tone is currently loading", "estimated_time": 20.0}"#
                .to_string(),
        );
        assert!(matches!(err, FinbertError::ModelLoading { .. }));

        let err = client.api_error(503, "upstream down".to_string());
        assert!(matches!(err, FinbertError::Api { status: 503, .. }));
    }

    #[test]
    fn input_errors() {
        assert!(FinbertError::Api { status: 400, message: String::new() }.is_input_error());
        assert!(!FinbertError::Api { status: 500, message: String::new() }.is_input_error());
        assert!(!FinbertError::Network("timeout".into()).is_input_error());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "Gewinn 世界";
        let cut = truncate_to_char_boundary(text, 9);
        assert!(cut.len() <= 9);
        assert!(text.starts_with(cut));
        assert_eq!(truncate_to_char_boundary("short", 100), "short");
    }

    #[test]
    fn builder_overrides() {
        let client = FinbertClient::new("t")
            .with_model("ProsusAI/finbert")
            .with_base_url("http://localhost:8080/models/");
        assert_eq!(client.model(), "ProsusAI/finbert");
        assert_eq!(client.base_url, "http://localhost:8080/models");
    }
}
