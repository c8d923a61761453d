//! Communication Manager (C8): routes a user message to the right
//! conversational agent and queues outbound inter-agent messages for the
//! orchestrator's fan-out.
//!
//! Grounded in `original_source/fs_agt_clean/core/agents/agent_communication.py`'s
//! `AgentCommunicationHub.route_message` — classification plus delegation,
//! with a non-raising fallback to the liaison agent. The lazy per-role
//! construction mirrors `src/cloudllm/clients/common.rs`'s `LLMSession`
//! on-first-use client setup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent::{AgentResponse, ConversationalAgent};
use crate::cache::ResponseCache;
use crate::external::AgentRepository;
use crate::intent::classify;
use crate::llm::client::LLMClient;
use crate::prompts::{AgentRegistry, AgentRole};

/// One inter-agent message queued for the orchestrator's fan-out.
#[derive(Debug, Clone)]
pub struct AgentMessage {
    pub from_role: AgentRole,
    pub to_role: Option<AgentRole>,
    pub content: String,
}

fn fallback_response() -> AgentResponse {
    AgentResponse {
        content: "I apologize, but I'm unable to help with that right now.".to_string(),
        agent_type: AgentRole::Liaison,
        confidence: 0.0,
        response_time_sec: 0.0,
        metadata: HashMap::new(),
        requires_followup: false,
        suggested_actions: Vec::new(),
        handoff_suggestion: None,
    }
}

/// C8: a single entry point that classifies an inbound message, delegates
/// to the matching [`ConversationalAgent`] (constructing it lazily on
/// first use), and queues outbound agent-to-agent traffic.
pub struct CommunicationManager {
    llm: Arc<LLMClient>,
    registry: Arc<AgentRegistry>,
    cache: Option<Arc<ResponseCache>>,
    repository: Option<Arc<dyn AgentRepository>>,
    agents: Mutex<HashMap<AgentRole, Arc<ConversationalAgent>>>,
    outbound: Mutex<Vec<AgentMessage>>,
}

impl CommunicationManager {
    pub fn new(llm: Arc<LLMClient>, registry: Arc<AgentRegistry>) -> Self {
        Self {
            llm,
            registry,
            cache: None,
            repository: None,
            agents: Mutex::new(HashMap::new()),
            outbound: Mutex::new(Vec::new()),
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

    async fn agent_for(&self, role: AgentRole) -> Arc<ConversationalAgent> {
        let mut agents = self.agents.lock().await;
        if let Some(agent) = agents.get(&role) {
            return Arc::clone(agent);
        }
        let mut built = ConversationalAgent::new(
            format!("{}_01", role.as_str()),
            role,
            Arc::clone(&self.llm),
            Arc::clone(&self.registry),
        );
        if let Some(cache) = &self.cache {
            built = built.with_cache(Arc::clone(cache));
        }
        if let Some(repository) = &self.repository {
            built = built.with_repository(Arc::clone(repository));
        }
        let built = Arc::new(built);
        agents.insert(role, Arc::clone(&built));
        built
    }

    /// Classify `message`, delegate to the matching agent, and never raise:
    /// any classification or agent failure returns the fallback response.
    pub async fn route_user_message(&self, message: &str, conversation_id: &str) -> AgentResponse {
        let intent = classify(message, None);
        let agent = self.agent_for(intent.target_role).await;

        match agent.handle(message, conversation_id, None).await {
            Ok(response) => response,
            Err(_) => fallback_response(),
        }
    }

    /// Enqueue an inter-agent message for the orchestrator's fan-out.
    /// Returns `false` only if the outbound queue's lock is poisoned.
    pub async fn send_agent_message(&self, message: AgentMessage) -> bool {
        self.outbound.lock().await.push(message);
        true
    }

    /// Drain and return every message queued since the last drain.
    pub async fn drain_outbound(&self) -> Vec<AgentMessage> {
        std::mem::take(&mut *self.outbound.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{LLMRequest, LLMResponse};
    use crate::perf::PerformanceMonitor;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl crate::llm::client::LLMProvider for EchoProvider {
        fn provider_name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &LLMRequest) -> crate::error::Result<LLMResponse> {
            Ok(LLMResponse {
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

    fn build_manager() -> CommunicationManager {
        let perf = Arc::new(PerformanceMonitor::new(100));
        let llm = Arc::new(LLMClient::new(Arc::new(EchoProvider), perf));
        let registry = Arc::new(AgentRegistry::new());
        CommunicationManager::new(llm, registry)
    }

    #[tokio::test]
    async fn routes_pricing_message_to_market_agent() {
        let manager = build_manager();
        let response = manager.route_user_message("what should I price this camera at?", "conv1").await;
        assert!(matches!(response.agent_type, AgentRole::Market));
        assert!(response.confidence > 0.0);
    }

    #[tokio::test]
    async fn reuses_the_same_agent_instance_across_calls() {
        let manager = build_manager();
        manager.route_user_message("what should I price this at?", "conv1").await;
        manager.route_user_message("what about competitor pricing?", "conv1").await;
        assert_eq!(manager.agents.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn send_agent_message_is_queued_and_drained() {
        let manager = build_manager();
        let queued = manager
            .send_agent_message(AgentMessage { from_role: AgentRole::Market, to_role: Some(AgentRole::Executive), content: "heads up".into() })
            .await;
        assert!(queued);
        let drained = manager.drain_outbound().await;
        assert_eq!(drained.len(), 1);
        assert!(manager.drain_outbound().await.is_empty());
    }
}
