//! OpenAI provider for C1.
//!
//! Wraps `openai-rust2` the way `src/cloudllm/clients/openai.rs`'s
//! `OpenAIClient` does: one shared pooled HTTP client, model identifiers
//! passed through opaquely (no alias table), and usage captured from the
//! response when present.

use async_trait::async_trait;
use openai_rust2 as openai_rust;
use openai_rust2::chat;
use std::collections::HashMap;

use crate::error::{ErrorKind, FlipSyncError, Result};
use crate::llm::client::{estimate_tokens, LLMProvider, LLMRequest, LLMResponse};
use crate::llm::common::get_shared_http_client;

/// Talks to `https://api.openai.com/v1` (or a compatible base URL).
pub struct OpenAiProvider {
    client: openai_rust::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: &str) -> Self {
        Self { client: openai_rust::Client::new_with_client(api_key, get_shared_http_client().clone()) }
    }

    pub fn new_with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: openai_rust::Client::new_with_client_and_base_url(
                api_key,
                get_shared_http_client().clone(),
                base_url,
            ),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &request.system_prompt {
            messages.push(chat::Message { role: "system".to_string(), content: system_prompt.clone() });
        }
        messages.push(chat::Message { role: "user".to_string(), content: request.prompt.clone() });

        let mut args = chat::ChatArguments::new(&request.model, messages);
        args.temperature = Some(request.temperature);
        args.max_tokens = request.max_tokens;

        let response = self
            .client
            .create_chat(args, Some("/v1/chat/completions".to_string()))
            .await
            .map_err(|err| classify_openai_error(&err.to_string()))?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| FlipSyncError::new(ErrorKind::Protocol, "OpenAI response had no choices"))?;

        let tokens_used = if response.usage.total_tokens > 0 {
            response.usage.total_tokens as usize
        } else {
            estimate_tokens(&content)
        };

        Ok(LLMResponse {
            content,
            provider: "openai".to_string(),
            model: request.model.clone(),
            response_time_sec: 0.0,
            tokens_used,
            metadata: HashMap::new(),
            confidence: 1.0,
        })
    }
}

fn classify_openai_error(message: &str) -> FlipSyncError {
    let lower = message.to_lowercase();
    let kind = if lower.contains("429") || lower.contains("rate limit") {
        ErrorKind::RateLimited
    } else if lower.contains("401") || lower.contains("403") || lower.contains("unauthorized") {
        ErrorKind::Auth
    } else if lower.contains("timeout") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Transport
    };
    FlipSyncError::new(kind, format!("OpenAI API error: {message}"))
}
