//! Local LLM provider for C1 — development/testing only, permitted only in
//! non-production configurations.
//!
//! Speaks plain OpenAI-compatible JSON over HTTP to `LOCAL_LLM_BASE_URL`,
//! the same wire shape `original_source/.../simple_llm_client.py`'s
//! local-model path uses, generalized away from that file's
//! provider-specific `/api/chat` envelope (no aliasing, opaque model
//! identifiers, plain HTTP/JSON transport).

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ErrorKind, FlipSyncError, Result};
use crate::llm::client::{estimate_tokens, LLMProvider, LLMRequest, LLMResponse};
use crate::llm::common::get_shared_http_client;

pub struct LocalProvider {
    base_url: String,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl LLMProvider for LocalProvider {
    fn provider_name(&self) -> &str {
        "local"
    }

    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &request.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        let body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let http_response = get_shared_http_client()
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    FlipSyncError::timeout(format!("local LLM request to {url} timed out"))
                } else {
                    FlipSyncError::new(ErrorKind::Transport, format!("local LLM request failed: {err}"))
                }
            })?;

        if !http_response.status().is_success() {
            return Err(FlipSyncError::new(
                ErrorKind::Transport,
                format!("local LLM returned HTTP {}", http_response.status()),
            ));
        }

        let parsed: serde_json::Value = http_response
            .json()
            .await
            .map_err(|err| FlipSyncError::new(ErrorKind::Protocol, format!("malformed local LLM response: {err}")))?;

        let content = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| FlipSyncError::new(ErrorKind::Protocol, "local LLM response missing choices[0].message.content"))?
            .to_string();

        let tokens_used = parsed
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or_else(|| estimate_tokens(&content));

        Ok(LLMResponse {
            content,
            provider: "local".to_string(),
            model: request.model.clone(),
            response_time_sec: 0.0,
            tokens_used,
            metadata: HashMap::new(),
            confidence: 1.0,
        })
    }
}
