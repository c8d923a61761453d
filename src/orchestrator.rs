//! Orchestrator (C9): workflow lifecycle, agent registry, and event
//! fan-out to the agents assigned to each workflow.
//!
//! Grounded in `original_source/fs_agt_clean/core/agent_coordination/orchestrator.py`'s
//! `Orchestrator` class: the `PENDING → RUNNING → {COMPLETED, FAILED,
//! CANCELLED}` state machine, the prefix-based agent-assignment rule in
//! `start_workflow`, and the `DecisionEngine`/pending-decisions bookkeeping
//! in `process_context`/`record_execution` are carried over in semantics.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ErrorKind, FlipSyncError, Result};

/// Closed states for a [`Workflow`]; see the module docs for the
/// transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl WorkflowState {
    fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Cancelled)
    }

    fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Paused)
                | (Paused, Running)
                | (Paused, Cancelled)
        )
    }
}

/// One registered event delivered to every agent assigned to a workflow.
#[derive(Debug, Clone)]
pub struct WorkflowEvent {
    pub name: String,
    pub payload: Value,
}

/// A single long-running, multi-agent operation tracked by the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: String,
    pub state: WorkflowState,
    pub assigned_agents: HashSet<String>,
    pub events: Vec<WorkflowEvent>,
}

/// Anything the orchestrator can dispatch a [`WorkflowEvent`] to.
#[async_trait]
pub trait OrchestratedAgent: Send + Sync {
    fn agent_id(&self) -> &str;
    async fn process_event(&self, workflow_id: &str, event: &WorkflowEvent);
}

/// A completed unit of work fed back for learning/bookkeeping.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub decision_id: String,
    pub success: bool,
    pub outcome: Value,
}

/// One decision produced by [`Orchestrator::process_context`].
#[derive(Debug, Clone)]
pub struct Decision {
    pub decision_id: String,
    pub action: String,
    pub confidence: f32,
}

/// Point-in-time orchestrator metrics.
#[derive(Debug, Clone)]
pub struct OrchestratorMetrics {
    pub registered_agents: usize,
    pub active_workflows: usize,
    pub pending_decisions: usize,
}

struct Registry {
    agents: HashMap<String, Arc<dyn OrchestratedAgent>>,
    workflows: HashMap<String, Workflow>,
    pending_decisions: HashSet<String>,
}

/// C9: the single process-wide coordinator of agents and workflows.
pub struct Orchestrator {
    state: Mutex<Registry>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            state: Mutex::new(Registry { agents: HashMap::new(), workflows: HashMap::new(), pending_decisions: HashSet::new() }),
        }
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_agent(&self, agent: Arc<dyn OrchestratedAgent>) -> Result<()> {
        let mut state = self.state.lock().await;
        let id = agent.agent_id().to_string();
        if state.agents.contains_key(&id) {
            return Err(FlipSyncError::new(ErrorKind::Duplicate, format!("agent '{id}' is already registered")));
        }
        state.agents.insert(id, agent);
        Ok(())
    }

    /// Unregister an agent, removing it from every workflow's assigned
    /// set. Returns `false` if the agent was never registered.
    pub async fn unregister_agent(&self, agent_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.agents.remove(agent_id).is_none() {
            return false;
        }
        for workflow in state.workflows.values_mut() {
            workflow.assigned_agents.remove(agent_id);
        }
        true
    }

    /// `config` carries `"<agentTypePrefix>": true` flags; for each flag an
    /// agent whose id starts with that prefix is assigned. A missing prefix
    /// is skipped (the workflow still starts, with fewer assigned agents).
    pub async fn start_workflow(&self, config: &HashMap<String, bool>, workflow_id: Option<String>) -> Result<String> {
        let mut state = self.state.lock().await;
        let id = workflow_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if state.workflows.contains_key(&id) {
            return Err(FlipSyncError::new(ErrorKind::Duplicate, format!("workflow '{id}' already exists")));
        }

        let mut assigned = HashSet::new();
        for (prefix, enabled) in config {
            if !enabled {
                continue;
            }
            match state.agents.keys().find(|agent_id| agent_id.starts_with(prefix.as_str())).cloned() {
                Some(agent_id) => {
                    assigned.insert(agent_id);
                }
                None => {
                    log::warn!("start_workflow: no agent with prefix '{prefix}' is registered; skipping");
                }
            }
        }

        for agent_id in &assigned {
            // workflow membership is tracked on the Workflow record itself;
            // agents don't need a reverse index for this contract.
            let _ = agent_id;
        }

        state.workflows.insert(
            id.clone(),
            Workflow { id: id.clone(), state: WorkflowState::Running, assigned_agents: assigned, events: Vec::new() },
        );
        Ok(id)
    }

    pub async fn update_workflow_state(&self, workflow_id: &str, new_state: WorkflowState) -> Result<()> {
        let mut state = self.state.lock().await;
        let workflow = state
            .workflows
            .get_mut(workflow_id)
            .ok_or_else(|| FlipSyncError::not_found(format!("workflow '{workflow_id}' not found")))?;

        if !workflow.state.can_transition_to(new_state) {
            return Err(FlipSyncError::new(
                ErrorKind::Validation,
                format!("cannot transition workflow '{workflow_id}' from {:?} to {:?}", workflow.state, new_state),
            ));
        }
        workflow.state = new_state;
        Ok(())
    }

    pub async fn cancel_workflow(&self, workflow_id: &str) -> Result<()> {
        self.update_workflow_state(workflow_id, WorkflowState::Cancelled).await
    }

    /// Remove a workflow's record. Requires a terminal state.
    pub async fn cleanup_workflow(&self, workflow_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let workflow = state
            .workflows
            .get(workflow_id)
            .ok_or_else(|| FlipSyncError::not_found(format!("workflow '{workflow_id}' not found")))?;
        if !workflow.state.is_terminal() {
            return Err(FlipSyncError::new(
                ErrorKind::Validation,
                format!("workflow '{workflow_id}' must reach a terminal state before cleanup"),
            ));
        }
        state.workflows.remove(workflow_id);
        Ok(())
    }

    /// Append `event` to the workflow and dispatch it to every assigned
    /// agent. Requires `state == RUNNING`. Dispatch order across agents is
    /// unspecified; a participant error is logged and does not abort the
    /// fan-out or auto-transition the workflow.
    pub async fn process_event(&self, workflow_id: &str, event: WorkflowEvent) -> Result<()> {
        let (agents, assigned_ids) = {
            let mut state = self.state.lock().await;
            let workflow = state
                .workflows
                .get_mut(workflow_id)
                .ok_or_else(|| FlipSyncError::not_found(format!("workflow '{workflow_id}' not found")))?;
            if workflow.state != WorkflowState::Running {
                return Err(FlipSyncError::new(ErrorKind::Validation, format!("workflow '{workflow_id}' is not RUNNING")));
            }
            workflow.events.push(event.clone());
            let assigned_ids: Vec<String> = workflow.assigned_agents.iter().cloned().collect();
            let agents: Vec<Arc<dyn OrchestratedAgent>> =
                assigned_ids.iter().filter_map(|id| state.agents.get(id).cloned()).collect();
            (agents, assigned_ids)
        };

        let _ = assigned_ids;
        for agent in agents {
            agent.process_event(workflow_id, &event).await;
        }
        Ok(())
    }

    /// Select/derive a decision for `available_actions` given `context`,
    /// track it as pending, and return it. No concrete `DecisionEngine`
    /// ships in this crate; this stub always picks the first available
    /// action with a neutral confidence, which callers needing real
    /// decision logic are expected to replace via their own collaborator.
    pub async fn process_context(&self, _context: &Value, available_actions: &[String]) -> Decision {
        let decision = Decision {
            decision_id: Uuid::new_v4().to_string(),
            action: available_actions.first().cloned().unwrap_or_default(),
            confidence: 0.5,
        };
        self.state.lock().await.pending_decisions.insert(decision.decision_id.clone());
        decision
    }

    /// Remove `result.decision_id` from the pending set. The learning hook
    /// itself is an external collaborator out of scope for this crate.
    pub async fn record_execution(&self, result: ExecutionResult) {
        self.state.lock().await.pending_decisions.remove(&result.decision_id);
    }

    pub async fn get_metrics(&self) -> OrchestratorMetrics {
        let state = self.state.lock().await;
        OrchestratorMetrics {
            registered_agents: state.agents.len(),
            active_workflows: state.workflows.len(),
            pending_decisions: state.pending_decisions.len(),
        }
    }

    pub async fn workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.state.lock().await.workflows.get(workflow_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingAgent {
        id: String,
        received: AtomicUsize,
    }

    #[async_trait]
    impl OrchestratedAgent for RecordingAgent {
        fn agent_id(&self) -> &str {
            &self.id
        }

        async fn process_event(&self, _workflow_id: &str, _event: &WorkflowEvent) {
            self.received.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn scenario_6_workflow_lifecycle() {
        let orchestrator = Orchestrator::new();
        let market_agent = Arc::new(RecordingAgent { id: "market_01".into(), received: AtomicUsize::new(0) });
        let content_agent = Arc::new(RecordingAgent { id: "content_01".into(), received: AtomicUsize::new(0) });
        orchestrator.register_agent(market_agent.clone()).await.unwrap();
        orchestrator.register_agent(content_agent.clone()).await.unwrap();

        let mut config = HashMap::new();
        config.insert("market".to_string(), true);
        config.insert("content".to_string(), true);
        let workflow_id = orchestrator.start_workflow(&config, Some("wf1".to_string())).await.unwrap();
        assert_eq!(workflow_id, "wf1");

        let workflow = orchestrator.workflow("wf1").await.unwrap();
        assert!(workflow.assigned_agents.contains("market_01"));
        assert!(workflow.assigned_agents.contains("content_01"));

        orchestrator
            .process_event("wf1", WorkflowEvent { name: "progress".into(), payload: Value::Null })
            .await
            .unwrap();
        assert_eq!(market_agent.received.load(Ordering::SeqCst), 1);
        assert_eq!(content_agent.received.load(Ordering::SeqCst), 1);

        orchestrator.update_workflow_state("wf1", WorkflowState::Completed).await.unwrap();
        orchestrator.cleanup_workflow("wf1").await.unwrap();
        assert!(orchestrator.workflow("wf1").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_agent_registration_fails() {
        let orchestrator = Orchestrator::new();
        let agent = Arc::new(RecordingAgent { id: "market_01".into(), received: AtomicUsize::new(0) });
        orchestrator.register_agent(agent.clone()).await.unwrap();
        let err = orchestrator.register_agent(agent).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn cleanup_before_terminal_state_is_rejected() {
        let orchestrator = Orchestrator::new();
        let workflow_id = orchestrator.start_workflow(&HashMap::new(), None).await.unwrap();
        let err = orchestrator.cleanup_workflow(&workflow_id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn transition_from_terminal_state_is_rejected() {
        let orchestrator = Orchestrator::new();
        let workflow_id = orchestrator.start_workflow(&HashMap::new(), None).await.unwrap();
        orchestrator.update_workflow_state(&workflow_id, WorkflowState::Completed).await.unwrap();
        let err = orchestrator.update_workflow_state(&workflow_id, WorkflowState::Running).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
