//! Conversational Agent (C7): one role-bound agent that turns a user
//! message into an [`AgentResponse`] via the LLM client, with its own
//! `IDLE → PROCESSING → (IDLE | ERROR)` state machine and a graceful
//! shutdown drain.
//!
//! Grounded in `original_source/fs_agt_clean/agents/base_conversational_agent.py`'s
//! `handle_message` (the ten-step algorithm below mirrors its structure);
//! the pluggable post-processing hook is modeled as a stored `fn` the way
//! `src/cloudllm/agent.rs`'s builder-style `.with_x()` methods attach
//! per-instance behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::cache::ResponseCache;
use crate::error::{ErrorKind, FlipSyncError, Result};
use crate::external::AgentRepository;
use crate::llm::client::{LLMClient, LLMRequest};
use crate::prompts::{AgentRegistry, AgentRole};

const MAX_CONTEXT_TAIL: usize = 20;
const LLM_PRIMING_WINDOW: usize = 10;
const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    pub timestamp: chrono::DateTime<Utc>,
}

/// `{conversationId, userId?, messages, metadata}` — mutable, append-only,
/// truncated to a bounded tail for LLM priming.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub user_id: Option<String>,
    pub messages: Vec<ConversationMessage>,
    pub metadata: HashMap<String, Value>,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self { conversation_id: conversation_id.into(), ..Default::default() }
    }

    fn append(&mut self, role: ConversationRole, content: impl Into<String>) {
        self.messages.push(ConversationMessage { role, content: content.into(), timestamp: Utc::now() });
        if self.messages.len() > MAX_CONTEXT_TAIL {
            let excess = self.messages.len() - MAX_CONTEXT_TAIL;
            self.messages.drain(0..excess);
        }
    }

    fn priming_window(&self) -> &[ConversationMessage] {
        let start = self.messages.len().saturating_sub(LLM_PRIMING_WINDOW);
        &self.messages[start..]
    }
}

/// `{content, agentType, confidence, responseTimeSec, metadata,
/// requiresFollowup, suggestedActions, handoffSuggestion?}`.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub content: String,
    pub agent_type: AgentRole,
    pub confidence: f32,
    pub response_time_sec: f64,
    pub metadata: HashMap<String, Value>,
    pub requires_followup: bool,
    pub suggested_actions: Vec<String>,
    pub handoff_suggestion: Option<AgentRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentState {
    Idle,
    Processing,
    Error,
    Offline,
}

const FOLLOWUP_CUES: &[&str] = &["would you like", "do you want", "shall i", "more information"];
const UNCERTAINTY_MARKERS: &[&str] = &["not sure", "might be", "possibly", "perhaps"];

fn market_advisory_hook(content: &str) -> String {
    format!("{content}\n\nNote: prices and market conditions change, so treat this as a point-in-time estimate.")
}

fn identity_hook(content: &str) -> String {
    content.to_string()
}

/// C7: a single role-bound agent instance.
pub struct ConversationalAgent {
    pub agent_id: String,
    pub role: AgentRole,
    llm: Arc<LLMClient>,
    cache: Option<Arc<ResponseCache>>,
    registry: Arc<AgentRegistry>,
    repository: Option<Arc<dyn AgentRepository>>,
    post_process: fn(&str) -> String,
    state: Mutex<AgentState>,
    context: Mutex<ConversationContext>,
    shutting_down: AtomicBool,
    in_flight: AtomicUsize,
}

impl ConversationalAgent {
    pub fn new(agent_id: impl Into<String>, role: AgentRole, llm: Arc<LLMClient>, registry: Arc<AgentRegistry>) -> Self {
        let post_process = match role {
            AgentRole::Market => market_advisory_hook as fn(&str) -> String,
            _ => identity_hook as fn(&str) -> String,
        };
        Self {
            agent_id: agent_id.into(),
            role,
            llm,
            cache: None,
            registry,
            repository: None,
            post_process,
            state: Mutex::new(AgentState::Idle),
            context: Mutex::new(ConversationContext::default()),
            shutting_down: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn AgentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_post_process(mut self, hook: fn(&str) -> String) -> Self {
        self.post_process = hook;
        self
    }

    /// Handle one user message end to end. See the module docs for the
    /// step-by-step algorithm this follows.
    pub async fn handle(
        &self,
        message: &str,
        conversation_id: &str,
        history: Option<&[ConversationMessage]>,
    ) -> Result<AgentResponse> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(FlipSyncError::new(ErrorKind::Shutdown, "agent is draining and accepts no new work"));
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard { counter: &self.in_flight };

        *self.state.lock().await = AgentState::Processing;
        let start = Instant::now();

        // Step 2: append to internal context, truncated to last 20.
        {
            let mut ctx = self.context.lock().await;
            if ctx.conversation_id.is_empty() {
                ctx.conversation_id = conversation_id.to_string();
            }
            ctx.append(ConversationRole::User, message);
        }

        // Step 3: compose system prompt.
        let system_prompt = self.registry.system_prompt_for(self.role);

        // Step 4: build priming window from supplied history if present, else internal context.
        let primed_prompt = match history {
            Some(msgs) => render_prompt(msgs.iter().rev().take(LLM_PRIMING_WINDOW).rev(), message),
            None => {
                let ctx = self.context.lock().await;
                render_prompt(ctx.priming_window().iter(), message)
            }
        };

        // Step 5: call C1, optionally through C2.
        let request = LLMRequest::new(primed_prompt, "gpt-4o-mini").with_system_prompt(system_prompt);
        let llm_result = match &self.cache {
            Some(cache) => cache.get_or_generate(&self.llm, request, 3600).await,
            None => self.llm.generate_response(request).await,
        };

        let response = match llm_result {
            Ok(resp) => resp,
            Err(err) => {
                *self.state.lock().await = AgentState::Error;
                return Err(err);
            }
        };

        // Step 6: role-specific post-processing.
        let content = (self.post_process)(&response.content);

        // Step 7: heuristic confidence.
        let confidence = heuristic_confidence(&content);

        // Step 8: followup detection.
        let requires_followup = detect_followup(&content);

        // Step 9: best-effort persistence.
        if let Some(repository) = &self.repository {
            if let Err(err) = repository
                .log_agent_decision(
                    &self.agent_id,
                    self.role.as_str(),
                    "conversational_response",
                    &serde_json::json!({ "conversation_id": conversation_id }),
                    confidence,
                    "conversational agent response",
                    false,
                )
                .await
            {
                log::warn!("agent {}: failed to log decision: {}", self.agent_id, err);
            }
        }

        {
            let mut ctx = self.context.lock().await;
            ctx.append(ConversationRole::Assistant, &content);
        }

        *self.state.lock().await = AgentState::Idle;

        Ok(AgentResponse {
            content,
            agent_type: self.role,
            confidence,
            response_time_sec: start.elapsed().as_secs_f64(),
            metadata: HashMap::new(),
            requires_followup,
            suggested_actions: Vec::new(),
            handoff_suggestion: None,
        })
    }

    /// Stop accepting new `handle` calls and wait up to `drain_window` for
    /// in-flight calls to finish, then mark the agent `OFFLINE`.
    pub async fn shutdown(&self, drain_window: Option<Duration>) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + drain_window.unwrap_or(DEFAULT_DRAIN_WINDOW);
        while self.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        *self.state.lock().await = AgentState::Offline;
    }
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> Drop for InFlightGuard<'a> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn render_prompt<'a>(messages: impl Iterator<Item = &'a ConversationMessage>, latest: &str) -> String {
    let mut rendered = String::new();
    for msg in messages {
        let tag = match msg.role {
            ConversationRole::User => "user",
            ConversationRole::Assistant => "assistant",
            ConversationRole::System => "system",
        };
        rendered.push_str(&format!("[{tag}] {}\n", msg.content));
    }
    if rendered.is_empty() {
        latest.to_string()
    } else {
        rendered
    }
}

fn heuristic_confidence(content: &str) -> f32 {
    let mut confidence: f32 = 0.8;
    if content.len() < 20 {
        confidence -= 0.2;
    }
    if content.len() > 500 {
        confidence += 0.1;
    }
    let lower = content.to_lowercase();
    if UNCERTAINTY_MARKERS.iter().any(|m| lower.contains(m)) {
        confidence -= 0.2;
    }
    confidence.clamp(0.1, 1.0)
}

fn detect_followup(content: &str) -> bool {
    let lower = content.to_lowercase();
    FOLLOWUP_CUES.iter().any(|cue| lower.contains(cue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perf::PerformanceMonitor;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl crate::llm::client::LLMProvider for EchoProvider {
        fn provider_name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &LLMRequest) -> Result<crate::llm::client::LLMResponse> {
            Ok(crate::llm::client::LLMResponse {
                content: format!("echo: {}", request.prompt),
                provider: "echo".into(),
                model: request.model.clone(),
                response_time_sec: 0.0,
                tokens_used: 2,
                metadata: HashMap::new(),
                confidence: 1.0,
            })
        }
    }

    fn build_agent(role: AgentRole) -> ConversationalAgent {
        let perf = Arc::new(PerformanceMonitor::new(100));
        let llm = Arc::new(LLMClient::new(Arc::new(EchoProvider), perf));
        let registry = Arc::new(AgentRegistry::new());
        ConversationalAgent::new("market_01", role, llm, registry)
    }

    #[tokio::test]
    async fn handle_returns_response_with_role() {
        let agent = build_agent(AgentRole::Market);
        let response = agent.handle("what should I price this at?", "conv1", None).await.unwrap();
        assert!(matches!(response.agent_type, AgentRole::Market));
        assert!(response.content.contains("market conditions change"));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_calls() {
        let agent = build_agent(AgentRole::Liaison);
        agent.shutdown(Some(Duration::from_millis(50))).await;
        let err = agent.handle("hi", "conv1", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Shutdown);
    }

    #[test]
    fn confidence_penalizes_short_and_uncertain_content() {
        assert!(heuristic_confidence("ok") < 0.8);
        assert!(heuristic_confidence("this might be correct but I'm not totally certain about it at all") < 0.8);
    }
}
