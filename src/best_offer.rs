//! Best-Offer Manager (C11): evaluates buyer offers against a seller's
//! configured policy and decides accept/counter/decline.
//!
//! Grounded in `original_source/fs_agt_clean/services/marketplace/best_offer_manager.py`:
//! the settings struct, the three preset factories, and the acceptance
//! threshold formula (time decay, inventory, engagement factors) are
//! carried over verbatim in semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ErrorKind, FlipSyncError, Result};

/// `{profitVsSpeed, minProfitMargin, maxDiscountPct, autoAccept, autoCounter,
/// timeDecayEnabled, initialThreshold, timeDecayDays, finalThreshold,
/// highInventoryThreshold, highInventoryDiscountBonus}`.
#[derive(Debug, Clone)]
pub struct BestOfferSettings {
    pub profit_vs_speed: f64,
    pub min_profit_margin: f64,
    pub max_discount_pct: f64,
    pub auto_accept: bool,
    pub auto_counter: bool,
    pub time_decay_enabled: bool,
    pub initial_threshold: f64,
    pub time_decay_days: f64,
    pub final_threshold: f64,
    pub high_inventory_threshold: f64,
    pub high_inventory_discount_bonus: f64,
}

impl BestOfferSettings {
    /// Favors speed over margin: wider discount tolerance, faster decay.
    pub fn fast_sale_preset() -> Self {
        Self {
            profit_vs_speed: 0.2,
            min_profit_margin: 0.10,
            max_discount_pct: 0.35,
            auto_accept: true,
            auto_counter: true,
            time_decay_enabled: true,
            initial_threshold: 0.85,
            time_decay_days: 7.0,
            final_threshold: 0.65,
            high_inventory_threshold: 5.0,
            high_inventory_discount_bonus: 0.10,
        }
    }

    /// Even split between margin and turnover speed.
    pub fn balanced_preset() -> Self {
        Self {
            profit_vs_speed: 0.5,
            min_profit_margin: 0.15,
            max_discount_pct: 0.25,
            auto_accept: true,
            auto_counter: true,
            time_decay_enabled: true,
            initial_threshold: 0.90,
            time_decay_days: 14.0,
            final_threshold: 0.75,
            high_inventory_threshold: 10.0,
            high_inventory_discount_bonus: 0.05,
        }
    }

    /// Favors margin over speed: narrow discount tolerance, slow decay.
    pub fn max_profit_preset() -> Self {
        Self {
            profit_vs_speed: 0.8,
            min_profit_margin: 0.25,
            max_discount_pct: 0.15,
            auto_accept: true,
            auto_counter: false,
            time_decay_enabled: false,
            initial_threshold: 0.95,
            time_decay_days: 30.0,
            final_threshold: 0.85,
            high_inventory_threshold: 20.0,
            high_inventory_discount_bonus: 0.03,
        }
    }

    fn validate(&self) -> Result<()> {
        let pct_fields = [
            self.profit_vs_speed,
            self.min_profit_margin,
            self.max_discount_pct,
            self.initial_threshold,
            self.final_threshold,
            self.high_inventory_discount_bonus,
        ];
        for v in pct_fields {
            if !(0.0..=1.0).contains(&v) {
                return Err(FlipSyncError::new(ErrorKind::Validation, "all percentages must be in [0,1]"));
            }
        }
        if self.initial_threshold < self.final_threshold {
            return Err(FlipSyncError::new(
                ErrorKind::Validation,
                "initialThreshold must be >= finalThreshold",
            ));
        }
        Ok(())
    }
}

/// `{offerId, listingId, buyerId, offerAmount, listingPrice, offeredAt,
/// message?, buyerFeedbackScore, buyerFeedbackPct}`.
#[derive(Debug, Clone)]
pub struct Offer {
    pub offer_id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub offer_amount: f64,
    pub listing_price: f64,
    pub buyer_feedback_score: u32,
    pub buyer_feedback_pct: f64,
}

/// Listing facts needed to compute the acceptance threshold.
#[derive(Debug, Clone)]
pub struct ListingContext {
    pub cost_basis: f64,
    pub current_inventory: f64,
    pub days_listed: f64,
    pub views_per_day: f64,
    pub watchers_per_day: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Accept,
    Decline,
    Counter,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct OfferResponse {
    pub action: OfferAction,
    pub counter_amount: Option<f64>,
    pub rationale: String,
    pub confidence: f64,
}

fn engagement_factor(ctx: &ListingContext) -> f64 {
    if ctx.views_per_day >= 10.0 && ctx.watchers_per_day >= 2.0 {
        1.05
    } else if ctx.views_per_day < 2.0 {
        0.95
    } else {
        1.0
    }
}

/// Round a counter offer: nearest $0.50 below $100, nearest $1 otherwise;
/// never above `listing_price`.
fn round_increment(amount: f64, listing_price: f64) -> f64 {
    let rounded = if amount < 100.0 {
        (amount * 2.0).round() / 2.0
    } else {
        amount.round()
    };
    rounded.min(listing_price)
}

fn acceptance_threshold(settings: &BestOfferSettings, ctx: &ListingContext, offer: &Offer) -> f64 {
    let mut base = settings.final_threshold
        + settings.profit_vs_speed * (settings.initial_threshold - settings.final_threshold);

    if settings.time_decay_enabled && ctx.days_listed > settings.time_decay_days {
        let excess = (ctx.days_listed - settings.time_decay_days).min(settings.time_decay_days);
        base *= (1.0 - 0.15 * (excess / settings.time_decay_days)).max(0.85);
    }

    if ctx.current_inventory >= settings.high_inventory_threshold {
        base *= 1.0 - settings.high_inventory_discount_bonus;
    }

    base *= engagement_factor(ctx);

    let min_for_profit = (ctx.cost_basis * (1.0 + settings.min_profit_margin)) / offer.listing_price;
    let threshold = base.max(min_for_profit).max(1.0 - settings.max_discount_pct);
    threshold.min(1.0)
}

/// C11: per-seller offer settings plus the offer-decision algorithm.
pub struct BestOfferManager {
    settings: Mutex<HashMap<String, BestOfferSettings>>,
}

impl Default for BestOfferManager {
    fn default() -> Self {
        Self { settings: Mutex::new(HashMap::new()) }
    }
}

impl BestOfferManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure_user_settings(&self, user_id: &str, settings: BestOfferSettings) -> Result<()> {
        settings.validate()?;
        self.settings.lock().expect("best-offer settings lock poisoned").insert(user_id.to_string(), settings);
        Ok(())
    }

    pub fn settings_for(&self, user_id: &str) -> Option<BestOfferSettings> {
        self.settings.lock().expect("best-offer settings lock poisoned").get(user_id).cloned()
    }

    pub fn process_incoming_offer(&self, user_id: &str, offer: &Offer, ctx: &ListingContext) -> OfferResponse {
        let settings = match self.settings_for(user_id) {
            Some(s) => s,
            None => {
                return OfferResponse {
                    action: OfferAction::Ignore,
                    counter_amount: None,
                    rationale: "no best-offer settings configured for this seller".to_string(),
                    confidence: 0.0,
                }
            }
        };

        if offer.listing_price <= 0.0 {
            return OfferResponse {
                action: OfferAction::Ignore,
                counter_amount: None,
                rationale: "listing price must be positive".to_string(),
                confidence: 0.0,
            };
        }

        let threshold = acceptance_threshold(&settings, ctx, offer);
        let pct = offer.offer_amount / offer.listing_price;

        if pct >= threshold {
            OfferResponse {
                action: OfferAction::Accept,
                counter_amount: None,
                rationale: format!("offer at {:.0}% of listing price meets the {:.1}% threshold", pct * 100.0, threshold * 100.0),
                confidence: 0.9,
            }
        } else if settings.auto_counter && pct >= 0.70 {
            let counter = round_increment(offer.listing_price * threshold, offer.listing_price);
            OfferResponse {
                action: OfferAction::Counter,
                counter_amount: Some(counter),
                rationale: format!("offer below threshold but within counter range; countering at {counter:.2}"),
                confidence: 0.8,
            }
        } else {
            OfferResponse {
                action: OfferAction::Decline,
                counter_amount: None,
                rationale: "offer is too far below the acceptance threshold".to_string(),
                confidence: 0.7,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_settings() -> BestOfferSettings {
        BestOfferSettings {
            profit_vs_speed: 0.5,
            min_profit_margin: 0.15,
            max_discount_pct: 0.25,
            auto_accept: true,
            auto_counter: true,
            time_decay_enabled: false,
            initial_threshold: 0.90,
            time_decay_days: 14.0,
            final_threshold: 0.75,
            high_inventory_threshold: 999.0,
            high_inventory_discount_bonus: 0.0,
        }
    }

    fn scenario_listing() -> ListingContext {
        ListingContext { cost_basis: 50.0, current_inventory: 1.0, days_listed: 1.0, views_per_day: 10.0, watchers_per_day: 1.0 }
    }

    #[test]
    fn scenario_3_best_offer_acceptance() {
        let manager = BestOfferManager::new();
        manager.configure_user_settings("seller1", scenario_settings()).unwrap();
        let offer = Offer {
            offer_id: "o1".into(),
            listing_id: "l1".into(),
            buyer_id: "b1".into(),
            offer_amount: 84.0,
            listing_price: 100.0,
            buyer_feedback_score: 10,
            buyer_feedback_pct: 0.98,
        };
        let response = manager.process_incoming_offer("seller1", &offer, &scenario_listing());
        assert_eq!(response.action, OfferAction::Accept);
    }

    #[test]
    fn scenario_4_best_offer_counter() {
        let manager = BestOfferManager::new();
        manager.configure_user_settings("seller1", scenario_settings()).unwrap();
        let offer = Offer {
            offer_id: "o2".into(),
            listing_id: "l1".into(),
            buyer_id: "b1".into(),
            offer_amount: 78.0,
            listing_price: 100.0,
            buyer_feedback_score: 10,
            buyer_feedback_pct: 0.98,
        };
        let response = manager.process_incoming_offer("seller1", &offer, &scenario_listing());
        assert_eq!(response.action, OfferAction::Counter);
        assert_eq!(response.counter_amount, Some(82.5));
    }

    #[test]
    fn validation_rejects_inverted_thresholds() {
        let mut settings = scenario_settings();
        settings.initial_threshold = 0.5;
        settings.final_threshold = 0.9;
        let manager = BestOfferManager::new();
        let err = manager.configure_user_settings("seller1", settings).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn counter_amount_is_on_correct_increment_grid() {
        assert_eq!(round_increment(82.53, 100.0), 82.5);
        assert_eq!(round_increment(142.3, 200.0), 142.0);
        assert_eq!(round_increment(250.0, 200.0), 200.0);
    }
}
