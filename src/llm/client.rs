//! Provider-agnostic LLM client (C1).
//!
//! [`LLMClient`] wraps a single [`LLMProvider`] and enforces the contract
//! common to every provider: end-to-end timeout, exactly-one [`PerfSample`]
//! per call, and best-effort cost recording. It does not retry — retries
//! are the caller's responsibility, as is cache lookup (see
//! [`crate::cache::ResponseCache`]).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cost::{CostEntry, CostTracker};
use crate::error::{ErrorKind, FlipSyncError, Result};
use crate::perf::{PerfSample, PerformanceMonitor};

/// A single LLM completion request.
#[derive(Debug, Clone)]
pub struct LLMRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl LLMRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The normalized result of an [`LLMRequest`].
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub response_time_sec: f64,
    pub tokens_used: usize,
    pub metadata: HashMap<String, serde_json::Value>,
    pub confidence: f32,
}

/// A concrete LLM backend. `openai` (production) and `local` (development
/// only) are the two providers this crate ships.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Perform the raw provider call. Implementations must not themselves
    /// enforce the timeout — [`LLMClient::generate_response`] does that —
    /// but should classify their own failures into an [`ErrorKind`].
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse>;
}

/// The C1 LLM Client: one configured provider plus the ambient perf/cost
/// side effects every call must produce.
pub struct LLMClient {
    provider: Arc<dyn LLMProvider>,
    perf: Arc<PerformanceMonitor>,
    cost: Option<Arc<CostTracker>>,
}

impl LLMClient {
    pub fn new(provider: Arc<dyn LLMProvider>, perf: Arc<PerformanceMonitor>) -> Self {
        Self { provider, perf, cost: None }
    }

    pub fn with_cost_tracker(mut self, cost: Arc<CostTracker>) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Invoke the configured provider under the request's timeout,
    /// recording exactly one [`PerfSample`] regardless of outcome.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use flipsync::llm::client::{LLMClient, LLMRequest};
    /// # use flipsync::perf::PerformanceMonitor;
    /// # async fn demo(client: LLMClient) -> flipsync::error::Result<()> {
    /// let req = LLMRequest::new("hello", "gpt-4o-mini");
    /// let resp = client.generate_response(req).await?;
    /// println!("{}", resp.content);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn generate_response(&self, request: LLMRequest) -> Result<LLMResponse> {
        let start = Instant::now();
        let prompt_len = request.prompt.len();
        let model = request.model.clone();
        let timeout = request.timeout;

        let outcome = tokio::time::timeout(timeout, self.provider.generate(&request)).await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Err(_) => {
                self.perf.record(PerfSample::failure(
                    model.clone(),
                    elapsed,
                    prompt_len,
                    ErrorKind::Timeout,
                ));
                Err(FlipSyncError::timeout(format!(
                    "LLM call to model {} exceeded {:?}",
                    model, timeout
                )))
            }
            Ok(Err(err)) => {
                self.perf.record(PerfSample::failure(model, elapsed, prompt_len, err.kind));
                Err(err)
            }
            Ok(Ok(response)) => {
                self.perf.record(PerfSample::success(
                    response.model.clone(),
                    elapsed,
                    prompt_len,
                    response.content.len(),
                ));
                if let Some(cost) = &self.cost {
                    if let Some(cost_usd) = response
                        .metadata
                        .get("cost_usd")
                        .and_then(|v| v.as_f64())
                    {
                        cost.record(CostEntry::new(
                            crate::cost::CostCategory::TextGeneration,
                            response.model.clone(),
                            "generate_response",
                            cost_usd,
                        ));
                    }
                }
                Ok(response)
            }
        }
    }
}

/// Estimate token usage as a word count, used when a provider does not
/// report usage itself.
pub fn estimate_tokens(content: &str) -> usize {
    content.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.model == "slow" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(LLMResponse {
                content: "hi there".into(),
                provider: "flaky".into(),
                model: request.model.clone(),
                response_time_sec: 0.0,
                tokens_used: estimate_tokens("hi there"),
                metadata: HashMap::new(),
                confidence: 1.0,
            })
        }
    }

    #[tokio::test]
    async fn enforces_timeout() {
        let provider = Arc::new(FlakyProvider { calls: AtomicUsize::new(0) });
        let perf = Arc::new(PerformanceMonitor::new(100));
        let client = LLMClient::new(provider, perf.clone());

        let req = LLMRequest::new("hi", "slow").with_timeout(Duration::from_millis(5));
        let err = client.generate_response(req).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(perf.summary(10).total_samples, 1);
    }

    #[tokio::test]
    async fn records_one_perf_sample_on_success() {
        let provider = Arc::new(FlakyProvider { calls: AtomicUsize::new(0) });
        let perf = Arc::new(PerformanceMonitor::new(100));
        let client = LLMClient::new(provider, perf.clone());

        let req = LLMRequest::new("hi", "fast");
        let resp = client.generate_response(req).await.unwrap();
        assert_eq!(resp.content, "hi there");
        assert_eq!(perf.summary(10).total_samples, 1);
    }
}
