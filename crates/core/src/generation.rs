use crate::models::GenerationOptions;
use crate::traits::Generator;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Client for an Ollama-compatible `/api/generate` endpoint. Non-streaming,
/// no retry; the request timeout bounds a hung backend.
pub struct OllamaGenerator {
    endpoint: Url,
    model: String,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(options: &GenerationOptions) -> Result<Self, SearchError> {
        let base = if options.base_url.ends_with('/') {
            Url::parse(&options.base_url)?
        } else {
            Url::parse(&format!("{}/", options.base_url))?
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: base.join("api/generate")?,
            model: options.model.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&GenerateRequest {
                model: &self.model,
                system,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let body = response.text().await?;
        let parsed: Value = serde_json::from_str(&body)?;
        response_text(&parsed)
    }
}

fn response_text(parsed: &Value) -> Result<String, SearchError> {
    if let Some(error) = parsed.pointer("/error").and_then(Value::as_str) {
        return Err(SearchError::BackendResponse {
            backend: "ollama".to_string(),
            details: error.to_string(),
        });
    }

    parsed
        .pointer("/response")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "ollama".to_string(),
            details: "response field missing".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_is_joined_onto_base_url() {
        for base in ["http://localhost:11434", "http://localhost:11434/"] {
            let generator = OllamaGenerator::new(&GenerationOptions {
                base_url: base.to_string(),
                ..GenerationOptions::default()
            })
            .expect("generator should build");
            assert_eq!(generator.endpoint().as_str(), "http://localhost:11434/api/generate");
        }
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let result = OllamaGenerator::new(&GenerationOptions {
            base_url: "not a url".to_string(),
            ..GenerationOptions::default()
        });
        assert!(matches!(result, Err(SearchError::Url(_))));
    }

    #[test]
    fn request_body_matches_backend_contract() {
        let body = serde_json::to_value(GenerateRequest {
            model: "mistral:7b-instruct-q4_K_M",
            system: "sys",
            prompt: "Context:\n\nQ: q\nA:",
            stream: false,
        })
        .expect("request should serialize");

        assert_eq!(
            body,
            json!({
                "model": "mistral:7b-instruct-q4_K_M",
                "system": "sys",
                "prompt": "Context:\n\nQ: q\nA:",
                "stream": false,
            })
        );
    }

    #[test]
    fn response_text_is_extracted() {
        let parsed = json!({"model": "m", "response": "500 kilograms (page 2)", "done": true});
        assert_eq!(response_text(&parsed).unwrap(), "500 kilograms (page 2)");
    }

    #[test]
    fn malformed_or_error_responses_fail_the_answer() {
        assert!(matches!(
            response_text(&json!({"done": true})),
            Err(SearchError::BackendResponse { .. })
        ));
        assert!(matches!(
            response_text(&json!({"error": "model not found"})),
            Err(SearchError::BackendResponse { details, .. }) if details == "model not found"
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_http_error() {
        let generator = OllamaGenerator::new(&GenerationOptions {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..GenerationOptions::default()
        })
        .expect("generator should build");

        let result = generator.generate("sys", "prompt").await;
        assert!(matches!(result, Err(SearchError::Http(_))));
    }
}
