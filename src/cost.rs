//! Cost Tracker (C3): per-call cost accounting with daily/monthly budgets
//! and re-arming threshold alerts.
//!
//! Grounded in `original_source/fs_agt_clean/core/monitoring/cost_tracker.py`:
//! the category enum, the `alertsFired` key convention (`"daily_{t}"` /
//! `"monthly_{t}"`), and the optimization-recommendation heuristics are
//! carried over from there. Uses `chrono` for the local-midnight/
//! month-boundary reset logic, the same crate already depended on
//! elsewhere in this crate for timestamps.

use chrono::{Datelike, Local, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Category a cost entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostCategory {
    VisionAnalysis,
    TextGeneration,
    Conversation,
    MarketResearch,
    ContentCreation,
    ShippingServices,
    PaymentProcessing,
    InventoryManagement,
    Embeddings,
}

impl CostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::VisionAnalysis => "vision_analysis",
            CostCategory::TextGeneration => "text_generation",
            CostCategory::Conversation => "conversation",
            CostCategory::MarketResearch => "market_research",
            CostCategory::ContentCreation => "content_creation",
            CostCategory::ShippingServices => "shipping_services",
            CostCategory::PaymentProcessing => "payment_processing",
            CostCategory::InventoryManagement => "inventory_management",
            CostCategory::Embeddings => "embeddings",
        }
    }
}

/// One recorded cost event. Append-only.
#[derive(Debug, Clone)]
pub struct CostEntry {
    pub timestamp: chrono::DateTime<Local>,
    pub category: CostCategory,
    pub model: String,
    pub operation: String,
    pub cost_usd: f64,
    pub agent_id: Option<String>,
    pub workflow_id: Option<String>,
    pub tokens_used: Option<usize>,
    pub response_time_sec: Option<f64>,
}

impl CostEntry {
    pub fn new(category: CostCategory, model: impl Into<String>, operation: impl Into<String>, cost_usd: f64) -> Self {
        Self {
            timestamp: Local::now(),
            category,
            model: model.into(),
            operation: operation.into(),
            cost_usd: cost_usd.max(0.0),
            agent_id: None,
            workflow_id: None,
            tokens_used: None,
            response_time_sec: None,
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_tokens_used(mut self, tokens: usize) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

/// Which rolling window a threshold alert concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertWindow {
    Daily,
    Monthly,
}

/// A budget-threshold crossing, fired at most once per window per threshold.
#[derive(Debug, Clone)]
pub struct BudgetAlert {
    pub window: AlertWindow,
    pub threshold: f64,
    pub spent: f64,
    pub limit: f64,
}

/// A cost-optimization suggestion derived from recorded spend.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub category: CostCategory,
    pub priority: &'static str,
    pub suggestion: String,
    pub potential_savings_usd: f64,
    pub impact: &'static str,
}

/// Point-in-time view of tracked spend.
#[derive(Debug, Clone)]
pub struct CostSnapshot {
    pub spent_day: f64,
    pub spent_month: f64,
    pub daily_limit: f64,
    pub monthly_limit: f64,
    pub by_category: HashMap<&'static str, f64>,
    pub by_model: HashMap<String, f64>,
    pub entries_recorded: u64,
}

struct BudgetState {
    current_day: NaiveDate,
    current_month: (i32, u32),
    spent_day: f64,
    spent_month: f64,
    alerts_fired: HashSet<String>,
    by_category: HashMap<CostCategory, f64>,
    by_model: HashMap<String, f64>,
    entries_recorded: u64,
}

/// C3: shared, process-wide budget tracker.
pub struct CostTracker {
    daily_limit: f64,
    monthly_limit: f64,
    alert_thresholds: Vec<f64>,
    state: Mutex<BudgetState>,
}

impl CostTracker {
    pub fn new(daily_limit: f64, monthly_limit: f64) -> Self {
        let now = Local::now();
        Self {
            daily_limit,
            monthly_limit,
            alert_thresholds: vec![0.5, 0.8, 0.9, 1.0],
            state: Mutex::new(BudgetState {
                current_day: now.date_naive(),
                current_month: (now.year(), now.month()),
                spent_day: 0.0,
                spent_month: 0.0,
                alerts_fired: HashSet::new(),
                by_category: HashMap::new(),
                by_model: HashMap::new(),
                entries_recorded: 0,
            }),
        }
    }

    pub fn with_alert_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.alert_thresholds = thresholds;
        self
    }

    /// Record one cost entry. Atomic: rolls budget windows forward if
    /// needed, updates aggregates, and returns any thresholds that newly
    /// fired as a result. Never rejects — pre-call viability checks are
    /// the caller's responsibility via [`CostTracker::get_stats`].
    pub fn record(&self, entry: CostEntry) -> Vec<BudgetAlert> {
        let mut state = self.state.lock().expect("cost tracker lock poisoned");
        let today = entry.timestamp.date_naive();
        let this_month = (entry.timestamp.year(), entry.timestamp.month());

        if today != state.current_day {
            state.current_day = today;
            state.spent_day = 0.0;
            state.alerts_fired.retain(|k| !k.starts_with("daily_"));
        }
        if this_month != state.current_month {
            state.current_month = this_month;
            state.spent_month = 0.0;
            state.alerts_fired.retain(|k| !k.starts_with("monthly_"));
        }

        state.spent_day += entry.cost_usd;
        state.spent_month += entry.cost_usd;
        *state.by_category.entry(entry.category).or_insert(0.0) += entry.cost_usd;
        *state.by_model.entry(entry.model.clone()).or_insert(0.0) += entry.cost_usd;
        state.entries_recorded += 1;

        let mut fired = Vec::new();
        for &t in &self.alert_thresholds {
            let key = format!("daily_{t}");
            if state.spent_day / self.daily_limit >= t && !state.alerts_fired.contains(&key) {
                state.alerts_fired.insert(key);
                fired.push(BudgetAlert { window: AlertWindow::Daily, threshold: t, spent: state.spent_day, limit: self.daily_limit });
            }
            let key = format!("monthly_{t}");
            if state.spent_month / self.monthly_limit >= t && !state.alerts_fired.contains(&key) {
                state.alerts_fired.insert(key);
                fired.push(BudgetAlert { window: AlertWindow::Monthly, threshold: t, spent: state.spent_month, limit: self.monthly_limit });
            }
        }
        fired
    }

    pub fn get_stats(&self) -> CostSnapshot {
        let state = self.state.lock().expect("cost tracker lock poisoned");
        CostSnapshot {
            spent_day: state.spent_day,
            spent_month: state.spent_month,
            daily_limit: self.daily_limit,
            monthly_limit: self.monthly_limit,
            by_category: state.by_category.iter().map(|(k, v)| (k.as_str(), *v)).collect(),
            by_model: state.by_model.clone(),
            entries_recorded: state.entries_recorded,
        }
    }

    /// Heuristic cost-optimization suggestions derived from current spend
    /// distribution. Not prescribed by the core contract but supplements
    /// it the way the original cost tracker's recommendation engine does.
    pub fn get_recommendations(&self) -> Vec<Recommendation> {
        let snapshot = self.get_stats();
        let mut recs = Vec::new();

        if snapshot.monthly_limit > 0.0 && snapshot.spent_month / snapshot.monthly_limit >= 0.8 {
            recs.push(Recommendation {
                category: CostCategory::TextGeneration,
                priority: "high",
                suggestion: "Monthly spend is at or above 80% of budget; consider a cheaper default model or raising the cache TTL".to_string(),
                potential_savings_usd: snapshot.spent_month * 0.2,
                impact: "high",
            });
        }

        if let Some(&vision_spend) = snapshot.by_category.get(CostCategory::VisionAnalysis.as_str()) {
            if snapshot.spent_month > 0.0 && vision_spend / snapshot.spent_month >= 0.4 {
                recs.push(Recommendation {
                    category: CostCategory::VisionAnalysis,
                    priority: "medium",
                    suggestion: "Vision analysis accounts for a large share of spend; batch or downsample images before analysis".to_string(),
                    potential_savings_usd: vision_spend * 0.15,
                    impact: "medium",
                });
            }
        }

        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_alert_scenario() {
        let tracker = CostTracker::new(2.00, 60.00);

        let fired1 = tracker.record(CostEntry::new(CostCategory::TextGeneration, "gpt-4o-mini", "chat", 1.00));
        assert_eq!(fired1.len(), 1);
        assert_eq!(fired1[0].threshold, 0.5);

        let fired2 = tracker.record(CostEntry::new(CostCategory::TextGeneration, "gpt-4o-mini", "chat", 0.60));
        assert_eq!(fired2.iter().filter(|a| a.window == AlertWindow::Daily).count(), 1);
        assert_eq!(fired2.iter().find(|a| a.window == AlertWindow::Daily).unwrap().threshold, 0.8);

        let fired3 = tracker.record(CostEntry::new(CostCategory::TextGeneration, "gpt-4o-mini", "chat", 0.41));
        assert!(fired3.iter().any(|a| a.threshold == 1.0));

        let fired4 = tracker.record(CostEntry::new(CostCategory::TextGeneration, "gpt-4o-mini", "chat", 0.01));
        assert!(fired4.is_empty(), "no duplicate alerts once a threshold has fired this window");
    }

    #[test]
    fn spent_never_exceeds_sum_of_entries() {
        let tracker = CostTracker::new(100.0, 1000.0);
        tracker.record(CostEntry::new(CostCategory::Conversation, "m", "op", 3.0));
        tracker.record(CostEntry::new(CostCategory::Conversation, "m", "op", 4.0));
        let snapshot = tracker.get_stats();
        assert_eq!(snapshot.spent_day, 7.0);
    }
}
