//! Intent Recognizer (C5): classifies a free-form seller message into an
//! intent, a target agent role, and a confidence score.
//!
//! Keyword tables and enum declaration order are grounded in
//! `original_source/fs_agt_clean/core/agents/agent_communication.py`'s
//! `IntentType`/`_build_intent_patterns`. This is a pure function — no I/O,
//! no shared state — matching that module's `recognize_intent` contract.

use crate::prompts::AgentRole;

/// Closed set of recognizable intents, declared in the order used for
/// tie-breaking when two intents score equally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Pricing,
    Competition,
    Listing,
    Seo,
    Shipping,
    Inventory,
    Strategy,
    Decision,
    General,
}

impl IntentKind {
    pub fn target_role(&self) -> AgentRole {
        match self {
            IntentKind::Pricing | IntentKind::Competition => AgentRole::Market,
            IntentKind::Listing | IntentKind::Seo => AgentRole::Content,
            IntentKind::Shipping | IntentKind::Inventory => AgentRole::Logistics,
            IntentKind::Strategy | IntentKind::Decision => AgentRole::Executive,
            IntentKind::General => AgentRole::Liaison,
        }
    }
}

struct IntentPattern {
    intent: IntentKind,
    keywords: &'static [&'static str],
    confidence_boost: f32,
}

// The source's DECISION bag also carries "should i" / "what should", generic
// question openers that collide with every other intent's phrasing (e.g.
// "what should I price this at?"); dropped here so DECISION only fires on
// its more specific vocabulary.
const PATTERNS: &[IntentPattern] = &[
    IntentPattern {
        intent: IntentKind::Pricing,
        keywords: &[
            "price", "pricing", "cost", "expensive", "cheap", "value", "competitor price",
            "market price", "pricing strategy", "how much", "what price", "price point",
            "underpriced", "overpriced",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Competition,
        keywords: &[
            "competitor", "competition", "rival", "compare", "versus", "market analysis",
            "competitive", "benchmark", "outperform", "market share", "competitor analysis",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Listing,
        keywords: &[
            "listing", "title", "description", "content", "write", "optimize listing",
            "product description", "bullet points", "features", "benefits",
            "listing optimization",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Seo,
        keywords: &[
            "seo", "search", "keywords", "visibility", "ranking", "search optimization",
            "findable", "discoverable", "search terms", "keyword research",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Shipping,
        keywords: &[
            "shipping", "delivery", "fulfillment", "carrier", "freight", "shipping cost",
            "delivery time", "logistics", "warehouse", "ship", "send", "mail",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Inventory,
        keywords: &[
            "inventory", "stock", "quantity", "reorder", "supply", "out of stock",
            "low stock", "inventory management", "stock level", "replenish",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Strategy,
        keywords: &[
            "strategy", "plan", "business", "growth", "expansion", "strategic", "roadmap",
            "vision", "goals", "objectives", "business plan", "market strategy",
        ],
        confidence_boost: 0.2,
    },
    IntentPattern {
        intent: IntentKind::Decision,
        keywords: &[
            "decision", "choose", "recommend", "suggest", "advice", "best option",
            "recommendation", "guidance", "help me decide",
        ],
        confidence_boost: 0.2,
    },
];

/// The outcome of classifying one message.
#[derive(Debug, Clone)]
pub struct IntentResult {
    pub intent: IntentKind,
    pub confidence: f32,
    pub target_role: AgentRole,
    pub matched_keywords: Vec<String>,
    pub rationale: String,
}

fn fallback(rationale: impl Into<String>) -> IntentResult {
    IntentResult {
        intent: IntentKind::General,
        confidence: 0.5,
        target_role: AgentRole::Liaison,
        matched_keywords: Vec::new(),
        rationale: rationale.into(),
    }
}

/// Classify `message` into an intent. Pure function of its inputs and the
/// static keyword table; `context` is accepted for interface symmetry with
/// callers but unused by this deterministic algorithm.
pub fn classify(message: &str, _context: Option<&std::collections::HashMap<String, serde_json::Value>>) -> IntentResult {
    let normalized = message.to_lowercase();

    let mut best: Option<(&IntentPattern, f32, Vec<String>)> = None;

    for pattern in PATTERNS {
        let matches: Vec<String> = pattern
            .keywords
            .iter()
            .filter(|kw| normalized.contains(*kw))
            .map(|kw| kw.to_string())
            .collect();

        if matches.is_empty() {
            continue;
        }

        let raw_score = matches.len() as f32 / pattern.keywords.len() as f32 + pattern.confidence_boost;

        match &best {
            Some((_, best_score, _)) if *best_score >= raw_score => {}
            _ => best = Some((pattern, raw_score, matches)),
        }
    }

    match best {
        Some((pattern, score, matches)) if score >= 0.1 => IntentResult {
            intent: pattern.intent,
            confidence: score.min(1.0),
            target_role: pattern.intent.target_role(),
            matched_keywords: matches,
            rationale: format!("intent '{:?}' detected with confidence {:.2}", pattern.intent, score.min(1.0)),
        },
        _ => fallback("no specific intent detected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_scenario() {
        let result = classify("what should I price this camera at?", None);
        assert!(matches!(result.intent, IntentKind::Pricing));
        assert!(matches!(result.target_role, AgentRole::Market));
        assert!(result.matched_keywords.iter().any(|k| k == "price"));
        assert!(result.confidence >= 0.1);
    }

    #[test]
    fn general_scenario() {
        let result = classify("hello there", None);
        assert!(matches!(result.intent, IntentKind::General));
        assert!(matches!(result.target_role, AgentRole::Liaison));
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn classify_is_pure() {
        let a = classify("what about shipping costs to texas?", None);
        let b = classify("what about shipping costs to texas?", None);
        assert!(matches!(a.intent, IntentKind::Shipping));
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.matched_keywords, b.matched_keywords);
    }
}
