//! Agent Registry & Prompts (C6): the catalog of agent roles and their
//! system prompts / starter prompts.
//!
//! Role prompts are re-expressed in this crate's own words from the
//! descriptions in `original_source/fs_agt_clean/core/agents/agent_prompts.py`'s
//! `AGENT_SYSTEM_PROMPTS` — each role keeps its area of expertise and tone,
//! not its original wording.

use std::collections::HashMap;
use std::sync::RwLock;

/// Closed enumeration of agent roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Market,
    Content,
    Logistics,
    Executive,
    Liaison,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Market => "market",
            AgentRole::Content => "content",
            AgentRole::Logistics => "logistics",
            AgentRole::Executive => "executive",
            AgentRole::Liaison => "liaison",
        }
    }
}

fn default_system_prompt(role: AgentRole) -> String {
    match role {
        AgentRole::Market => {
            "You are FlipSync's market agent. You analyze competitor pricing, market trends, \
             and demand signals to help sellers price and position their listings. Be specific \
             and quantify your reasoning whenever you can."
                .to_string()
        }
        AgentRole::Content => {
            "You are FlipSync's content agent. You write and refine listing titles, \
             descriptions, and item specifics to maximize clarity and discoverability. Favor \
             concrete, keyword-rich language over generic marketing copy."
                .to_string()
        }
        AgentRole::Logistics => {
            "You are FlipSync's logistics agent. You advise on shipping options, carriers, \
             fulfillment timing, and inventory levels. Weigh cost against delivery speed \
             explicitly in your recommendations."
                .to_string()
        }
        AgentRole::Executive => {
            "You are FlipSync's executive agent. You help sellers with higher-level strategy: \
             growth decisions, business planning, and trade-offs between competing priorities. \
             Give a clear recommendation, not just options."
                .to_string()
        }
        AgentRole::Liaison => {
            "You are FlipSync's general liaison. You help sellers with questions that don't fit \
             a specialist area, and point them to the right specialist agent when one applies."
                .to_string()
        }
    }
}

fn default_starters(role: AgentRole) -> Vec<String> {
    match role {
        AgentRole::Market => vec![
            "What should I price this item at?".to_string(),
            "How does my price compare to competitors?".to_string(),
        ],
        AgentRole::Content => vec![
            "Can you improve this listing title?".to_string(),
            "What keywords am I missing from my description?".to_string(),
        ],
        AgentRole::Logistics => vec![
            "Which shipping carrier should I use for this item?".to_string(),
            "How much inventory should I keep on hand?".to_string(),
        ],
        AgentRole::Executive => vec![
            "Should I expand into a new category?".to_string(),
            "What's the best growth strategy for my store?".to_string(),
        ],
        AgentRole::Liaison => vec![
            "What can FlipSync help me with?".to_string(),
            "I'm not sure where to start.".to_string(),
        ],
    }
}

/// C6: process-local catalog of role → (system prompt, starter prompts).
///
/// Updates made with [`AgentRegistry::set_prompt_for`] are process-local and
/// are not persisted by this component.
pub struct AgentRegistry {
    prompts: RwLock<HashMap<AgentRole, String>>,
    starters: HashMap<AgentRole, Vec<String>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        let roles = [
            AgentRole::Market,
            AgentRole::Content,
            AgentRole::Logistics,
            AgentRole::Executive,
            AgentRole::Liaison,
        ];
        let mut prompts = HashMap::new();
        let mut starters = HashMap::new();
        for role in roles {
            prompts.insert(role, default_system_prompt(role));
            starters.insert(role, default_starters(role));
        }
        Self { prompts: RwLock::new(prompts), starters }
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup for an unknown role returns the LIAISON prompt; since
    /// [`AgentRole`] is a closed enum every value is "known" here, so this
    /// simply falls back to LIAISON on a missing registry entry.
    pub fn system_prompt_for(&self, role: AgentRole) -> String {
        self.prompts
            .read()
            .expect("agent registry lock poisoned")
            .get(&role)
            .cloned()
            .unwrap_or_else(|| default_system_prompt(AgentRole::Liaison))
    }

    pub fn starters_for(&self, role: AgentRole) -> Vec<String> {
        self.starters.get(&role).cloned().unwrap_or_default()
    }

    pub fn set_prompt_for(&self, role: AgentRole, text: impl Into<String>) {
        self.prompts.write().expect("agent registry lock poisoned").insert(role, text.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_a_prompt_and_starters() {
        let registry = AgentRegistry::new();
        for role in [AgentRole::Market, AgentRole::Content, AgentRole::Logistics, AgentRole::Executive, AgentRole::Liaison] {
            assert!(!registry.system_prompt_for(role).is_empty());
            assert!(!registry.starters_for(role).is_empty());
        }
    }

    #[test]
    fn set_prompt_for_overrides_lookup() {
        let registry = AgentRegistry::new();
        registry.set_prompt_for(AgentRole::Market, "custom prompt");
        assert_eq!(registry.system_prompt_for(AgentRole::Market), "custom prompt");
    }
}
