use super::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Ollama provider implementation
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider with the given base URL and model
    pub fn new(base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            base_url,
            model,
            client,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    /// Prompt + completion token counts, when Ollama reports them.
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl GenProvider for OllamaProvider {
    async fn generate(&self, request: GenerateRequest) -> GenResult<GenerateResponse> {
        let start = Instant::now();

        let ollama_request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: request.prompt,
            stream: false,
            options: Some(OllamaOptions {
                num_predict: request.max_tokens,
            }),
        };

        let url = format!("{}/api/generate", self.base_url);

        // Execute with timeout
        let response = tokio::time::timeout(
            request.timeout,
            self.client.post(&url).json(&ollama_request).send(),
        )
        .await
        .map_err(|_| GenerateError::Timeout(request.timeout))?
        .map_err(|e| GenerateError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerateError::Api(format!(
                "Ollama API returned status: {}",
                response.status()
            )));
        }

        let ollama_response: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Parse(e.to_string()))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let tokens_used = match (
            ollama_response.prompt_eval_count,
            ollama_response.eval_count,
        ) {
            (None, None) => None,
            (prompt, eval) => Some(prompt.unwrap_or(0) + eval.unwrap_or(0)),
        };

        Ok(GenerateResponse {
            text: ollama_response.response.trim().to_string(),
            metadata: ResponseMetadata {
                provider: "ollama".to_string(),
                model: self.model.clone(),
                tokens_used,
                latency_ms,
            },
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
