use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Instant;

/// System prompt shared by every card generation request.
const SYSTEM_PROMPT: &str =
    "You write content for a party game played in one room. Respond with exactly \
     what the instruction asks for and nothing else: no preamble, no explanation, \
     no numbering. When JSON is requested, output raw JSON with no markdown fences.";

/// OpenAI provider implementation
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider with the given API key and model
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        Self { client, model }
    }
}

#[async_trait]
impl GenProvider for OpenAiProvider {
    async fn generate(&self, request: GenerateRequest) -> GenResult<GenerateResponse> {
        let start = Instant::now();

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(request.max_tokens)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| GenerateError::Api(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.prompt.as_str())
                    .build()
                    .map_err(|e| GenerateError::Api(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| GenerateError::Api(e.to_string()))?;

        // Execute with timeout
        let response =
            tokio::time::timeout(request.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| GenerateError::Timeout(request.timeout))?
                .map_err(|e| GenerateError::Api(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(GenerateError::Empty)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let tokens_used = response.usage.map(|u| u.total_tokens);

        Ok(GenerateResponse {
            text: text.trim().to_string(),
            metadata: ResponseMetadata {
                provider: "openai".to_string(),
                model: self.model.clone(),
                tokens_used,
                latency_ms,
            },
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
