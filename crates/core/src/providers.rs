use crate::http::ServiceError;
#[cfg(any(feature = "provider-cohere", feature = "provider-openai-compat"))]
use crate::http::{default_client, send_json};
use crate::types::Completion;
use async_trait::async_trait;
#[cfg(any(feature = "provider-cohere", feature = "provider-openai-compat"))]
use reqwest::Client;
#[cfg(any(feature = "provider-cohere", feature = "provider-openai-compat"))]
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[cfg(feature = "provider-cohere")]
pub const COHERE_GENERATE_ENDPOINT: &str = "https://api.cohere.ai/v1/generate";
#[cfg(feature = "provider-openai-compat")]
pub const OPENAI_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Prompt-in, generated-text-out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, ServiceError>;
}

#[async_trait]
impl<T> CompletionProvider for Box<T>
where
    T: CompletionProvider + ?Sized,
{
    async fn complete(&self, prompt: &str) -> Result<Completion, ServiceError> {
        (**self).complete(prompt).await
    }
}

#[cfg(feature = "provider-cohere")]
#[derive(Clone)]
pub struct CohereProvider {
    pub endpoint: String,
    api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    client: Client,
}

#[cfg(feature = "provider-cohere")]
impl CohereProvider {
    pub fn new(
        endpoint: String,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            temperature,
            max_tokens,
            client: default_client(),
        }
    }

    /// Cohere `command` with the endpoint defaults the assistant was tuned for.
    pub fn with_api_key(api_key: String) -> Self {
        Self::new(
            COHERE_GENERATE_ENDPOINT.to_string(),
            api_key,
            "command".to_string(),
            0.7,
            500,
        )
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[cfg(feature = "provider-cohere")]
impl std::fmt::Debug for CohereProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "provider-cohere")]
#[derive(Debug, Serialize)]
struct CohereGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    k: u32,
    stop_sequences: Vec<String>,
    return_likelihoods: &'static str,
}

#[cfg(feature = "provider-cohere")]
#[async_trait]
impl CompletionProvider for CohereProvider {
    async fn complete(&self, prompt: &str) -> Result<Completion, ServiceError> {
        let payload = CohereGenerateRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            k: 0,
            stop_sequences: Vec::new(),
            return_likelihoods: "NONE",
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "requesting cohere generation"
        );
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload);
        let value: Value = send_json(request).await?;

        let text = value
            .get("generations")
            .and_then(Value::as_array)
            .and_then(|generations| generations.first())
            .and_then(|first| first.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::InvalidResponse(
                    "missing generations[0].text in Cohere response".to_string(),
                )
            })?
            .trim()
            .to_string();

        let mut meta = BTreeMap::new();
        meta.insert("raw".to_string(), value);
        Ok(Completion {
            text,
            raw_provider_meta: meta,
        })
    }
}

#[cfg(feature = "provider-openai-compat")]
#[derive(Clone)]
pub struct OpenAICompatProvider {
    pub endpoint: String,
    api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    client: Client,
}

#[cfg(feature = "provider-openai-compat")]
impl OpenAICompatProvider {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        model: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            temperature,
            max_tokens,
            client: default_client(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[cfg(feature = "provider-openai-compat")]
impl std::fmt::Debug for OpenAICompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAICompatProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "provider-openai-compat")]
#[derive(Debug, Serialize)]
struct OpenAICompatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[cfg(feature = "provider-openai-compat")]
#[derive(Debug, Serialize)]
struct OpenAICompatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAICompatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[cfg(feature = "provider-openai-compat")]
#[async_trait]
impl CompletionProvider for OpenAICompatProvider {
    async fn complete(&self, prompt: &str) -> Result<Completion, ServiceError> {
        let payload = OpenAICompatRequest {
            model: &self.model,
            messages: vec![OpenAICompatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "requesting chat completion"
        );
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let value: Value = send_json(request).await?;
        let text = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|first| first.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::InvalidResponse(
                    "missing choices[0].message.content in OpenAI-compatible response".to_string(),
                )
            })?
            .trim()
            .to_string();

        let mut meta = BTreeMap::new();
        meta.insert("raw".to_string(), value);
        Ok(Completion {
            text,
            raw_provider_meta: meta,
        })
    }
}

/// Offline provider whose output depends only on the prompt.
#[derive(Debug, Clone)]
pub struct MockProvider;

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, prompt: &str) -> Result<Completion, ServiceError> {
        let mut meta = BTreeMap::new();
        meta.insert("provider".to_string(), json!("mock"));

        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or("(none)");
        let books = prompt.lines().filter(|line| line.starts_with("Book: ")).count();

        Ok(Completion {
            text: format!("mock analysis of {books} book(s) for question: {question}"),
            raw_provider_meta: meta,
        })
    }
}
