//! Product-Creation Workflow (C10): the ordered image → listing pipeline.
//!
//! Grounded in `original_source/fs_agt_clean/services/workflows/complete_product_creation.py`'s
//! staged `create_listing` flow (vision → research → category → content →
//! pricing → best-offer → compile), including its pricing branch
//! thresholds and best-effort failure policy.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::best_offer::{BestOfferManager, BestOfferSettings};
use crate::cost::{CostCategory, CostEntry, CostTracker};
use crate::error::{FlipSyncError, Result};
use crate::external::{
    BaseContent, ContentOptimizer, ProductData, ResearchResult, ResearchService, VisionAnalysis,
    VisionAnalyzer,
};
use crate::marketplace::{listing_quality_score, optimize_category, ListingQualityInput};

const MAX_TITLE_LEN: usize = 80;

/// Default per-stage timeout when a workflow doesn't override it — matches
/// `LLMRequest::new`'s own default end-to-end timeout (spec §5: "C10 honors
/// a per-stage timeout equal to the LLM timeout").
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Input to a single product-creation run.
pub struct CreationRequest {
    pub image_bytes: Vec<u8>,
    pub filename: String,
    pub user_id: String,
    pub marketplace: String,
    pub profit_vs_speed: f64,
    pub min_profit_margin: f64,
    pub cost_basis: Option<f64>,
    pub target_category: Option<String>,
    pub enable_best_offer: bool,
    pub enable_cassini_optimization: bool,
    pub enable_web_research: bool,
    /// Caller-supplied identifier for this run; a fresh one is minted if absent.
    pub workflow_id: Option<String>,
    /// Overall wall-clock budget for the whole pipeline. If the deadline
    /// elapses mid-stage, that stage is abandoned and the workflow compiles
    /// with whatever results were obtained so far, at lowered confidence.
    pub deadline: Option<Duration>,
}

/// The final, client-facing product of the pipeline.
#[derive(Debug, Clone)]
pub struct OptimizedListing {
    pub workflow_id: String,
    pub title: String,
    pub description: String,
    pub item_specifics: HashMap<String, String>,
    pub category: String,
    pub price: f64,
    pub confidence: f32,
    pub cassini_score: Option<f32>,
    pub research_confidence: f32,
    pub sources_used: Vec<String>,
    pub total_cost_usd: f64,
    pub improvements: Vec<String>,
    pub processing_time_sec: f64,
    pub created_at: DateTime<Local>,
}

/// C10: runs the staged pipeline against a set of external collaborators.
pub struct ProductCreationWorkflow<'a> {
    pub vision: &'a dyn VisionAnalyzer,
    pub research: Option<&'a dyn ResearchService>,
    pub content_optimizer: Option<&'a dyn ContentOptimizer>,
    pub best_offer: &'a BestOfferManager,
    pub cost_tracker: &'a CostTracker,
    /// Per-stage timeout (spec §5: "equal to the LLM timeout").
    pub stage_timeout: Duration,
}

impl<'a> ProductCreationWorkflow<'a> {
    /// Budget left for the next stage: `None` once the overall deadline has
    /// already elapsed, meaning the stage must be abandoned outright rather
    /// than attempted under a near-zero timeout.
    fn stage_budget(&self, deadline_instant: Option<Instant>) -> Option<Duration> {
        match deadline_instant {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    None
                } else {
                    Some(deadline.duration_since(now).min(self.stage_timeout))
                }
            }
            None => Some(self.stage_timeout),
        }
    }

    pub async fn run(&self, request: &CreationRequest) -> Result<OptimizedListing> {
        let run_started = Instant::now();
        let workflow_id = request.workflow_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let deadline_instant = request.deadline.map(|d| run_started + d);

        let mut total_cost = 0.0;
        let mut improvements = Vec::new();
        let mut confidence: f32 = 1.0;

        // Stage 1: image analysis.
        let (analysis, vision_confidence) = match self.stage_budget(deadline_instant) {
            None => {
                improvements.push("workflow deadline elapsed before image analysis; compiling with minimal defaults".to_string());
                (
                    VisionAnalysis { product_data: ProductData::default(), confidence: 0.3, metadata: HashMap::new() },
                    0.3,
                )
            }
            Some(budget) => match tokio::time::timeout(
                budget,
                self.vision.analyze_image(&request.image_bytes, &request.filename, &request.marketplace, None),
            )
            .await
            {
                Ok(Ok(analysis)) => {
                    let c = analysis.confidence;
                    (analysis, c)
                }
                Ok(Err(err)) => {
                    improvements.push(format!("image analysis failed ({err}); continuing with minimal defaults"));
                    (
                        VisionAnalysis { product_data: ProductData::default(), confidence: 0.3, metadata: HashMap::new() },
                        0.3,
                    )
                }
                Err(_) => {
                    improvements.push("image analysis stage timed out; continuing with minimal defaults".to_string());
                    (
                        VisionAnalysis { product_data: ProductData::default(), confidence: 0.3, metadata: HashMap::new() },
                        0.3,
                    )
                }
            },
        };
        confidence = confidence.min(vision_confidence);
        total_cost += self.record_cost(CostCategory::VisionAnalysis, "vision_analyzer", "analyze_image", request, 0.02);

        let has_image_data = !analysis.product_data.title.is_empty() || !analysis.product_data.features.is_empty();
        if !has_image_data && !request.enable_web_research {
            return Err(FlipSyncError::insufficient_input(
                "image analysis returned no data and web research is disabled",
            ));
        }

        // Stage 2: research.
        let research = if request.enable_web_research {
            match self.stage_budget(deadline_instant) {
                None => {
                    improvements.push("workflow deadline elapsed before research; continuing with image analysis only".to_string());
                    ResearchResult {
                        research_confidence: 0.3,
                        sources_used: vec!["image_analysis_only".to_string()],
                        ..Default::default()
                    }
                }
                Some(budget) => match self.research {
                    Some(service) => match tokio::time::timeout(budget, service.research(&analysis, &request.marketplace)).await {
                        Ok(Ok(result)) => {
                            confidence = confidence.min(result.research_confidence);
                            total_cost += self.record_cost(CostCategory::MarketResearch, "research_service", "research", request, 0.01);
                            result
                        }
                        Ok(Err(err)) => {
                            improvements.push(format!("product research failed ({err}); continuing with image analysis only"));
                            ResearchResult {
                                research_confidence: 0.3,
                                sources_used: vec!["image_analysis_only".to_string()],
                                ..Default::default()
                            }
                        }
                        Err(_) => {
                            improvements.push("research stage timed out; continuing with image analysis only".to_string());
                            ResearchResult {
                                research_confidence: 0.3,
                                sources_used: vec!["image_analysis_only".to_string()],
                                ..Default::default()
                            }
                        }
                    },
                    None => ResearchResult {
                        research_confidence: 0.3,
                        sources_used: vec!["image_analysis_only".to_string()],
                        ..Default::default()
                    },
                },
            }
        } else {
            ResearchResult::default()
        };

        // Stage 3: category optimization (C12).
        let current_category = request
            .target_category
            .clone()
            .or_else(|| analysis.product_data.category.clone())
            .unwrap_or_else(|| "Uncategorized".to_string());
        let mut attributes: HashMap<String, String> = HashMap::new();
        if let Some(brand) = &analysis.product_data.brand {
            attributes.insert("brand".to_string(), brand.clone());
        }
        for (i, feature) in analysis.product_data.features.iter().enumerate() {
            attributes.insert(format!("feature_{i}"), feature.clone());
        }
        let category_recommendation = optimize_category(&analysis.product_data.title, &current_category, &attributes);
        confidence = confidence.min(category_recommendation.confidence as f32);

        // Stage 4: content optimization.
        let base_content = BaseContent {
            title: analysis.product_data.title.clone(),
            description: research.specs.values().cloned().collect::<Vec<_>>().join(". "),
            item_specifics: attributes.clone(),
        };
        let (mut title, mut description, item_specifics, cassini_score) =
            if request.enable_cassini_optimization {
                match self.stage_budget(deadline_instant) {
                    None => {
                        improvements.push("workflow deadline elapsed before content optimization; keeping base content".to_string());
                        (base_content.title.clone(), base_content.description.clone(), base_content.item_specifics.clone(), None)
                    }
                    Some(budget) => match self.content_optimizer {
                        Some(optimizer) => {
                            let target_keywords = research.features.clone();
                            match tokio::time::timeout(budget, optimizer.optimize(&base_content, &analysis.product_data, &target_keywords))
                                .await
                            {
                                Ok(Ok(optimized)) => {
                                    total_cost +=
                                        self.record_cost(CostCategory::ContentCreation, "content_optimizer", "optimize", request, 0.015);
                                    (optimized.title, optimized.description, optimized.item_specifics, Some(optimized.cassini_score))
                                }
                                Ok(Err(err)) => {
                                    improvements.push(format!("content optimization failed ({err}); keeping base content"));
                                    (base_content.title.clone(), base_content.description.clone(), base_content.item_specifics.clone(), None)
                                }
                                Err(_) => {
                                    improvements.push("content optimization stage timed out; keeping base content".to_string());
                                    (base_content.title.clone(), base_content.description.clone(), base_content.item_specifics.clone(), None)
                                }
                            }
                        }
                        None => (base_content.title.clone(), base_content.description.clone(), base_content.item_specifics.clone(), None),
                    },
                }
            } else {
                (base_content.title.clone(), base_content.description.clone(), base_content.item_specifics.clone(), None)
            };

        // Stage 5: pricing.
        let price = self.determine_price(request, &research.competitive_prices);

        // Stage 6: best-offer configuration.
        if request.enable_best_offer {
            let settings = Self::derive_best_offer_settings(request);
            if self.best_offer.configure_user_settings(&request.user_id, settings).is_err() {
                let _ = self
                    .best_offer
                    .configure_user_settings(&request.user_id, BestOfferSettings::balanced_preset());
                improvements.push("best-offer settings invalid; applied balanced defaults".to_string());
            }
        }

        // Stage 7: compile, enforcing the title length invariant.
        if title.is_empty() {
            title = "Untitled listing".to_string();
        }
        if title.chars().count() > MAX_TITLE_LEN {
            let truncated: String = title.chars().take(MAX_TITLE_LEN - 3).collect();
            title = format!("{truncated}...");
            improvements.push("title truncated to fit the 80-character limit".to_string());
        }
        if description.is_empty() {
            description = format!("{title} — see item specifics for details.");
        }

        let quality_input = ListingQualityInput {
            title_len: title.chars().count(),
            description_len: description.chars().count(),
            photo_count: 1,
            keyword_count: research.features.len(),
            has_shipping_info: false,
        };
        let quality_score = listing_quality_score(&quality_input) as f32;
        confidence = confidence.min(quality_score);
        if quality_score < 0.5 {
            improvements.push(format!(
                "listing quality score {quality_score:.2} is low; add more photos, keywords, or shipping details"
            ));
        }

        Ok(OptimizedListing {
            workflow_id,
            title,
            description,
            item_specifics,
            category: category_recommendation.recommended_category,
            price,
            confidence: confidence.clamp(0.0, 1.0),
            cassini_score,
            research_confidence: research.research_confidence,
            sources_used: research.sources_used,
            total_cost_usd: total_cost,
            improvements,
            processing_time_sec: run_started.elapsed().as_secs_f64(),
            created_at: Local::now(),
        })
    }

    fn determine_price(&self, request: &CreationRequest, competitive_prices: &[f64]) -> f64 {
        let price = if !competitive_prices.is_empty() {
            let sum: f64 = competitive_prices.iter().sum();
            let avg = sum / competitive_prices.len() as f64;
            let min = competitive_prices.iter().cloned().fold(f64::INFINITY, f64::min);
            if request.profit_vs_speed > 0.7 {
                avg * 1.05
            } else if request.profit_vs_speed < 0.3 {
                min * 0.98
            } else {
                avg * 0.99
            }
        } else if let Some(cost_basis) = request.cost_basis {
            cost_basis * if request.profit_vs_speed > 0.5 { 1.5 } else { 1.3 }
        } else {
            50.00
        };
        (price * 100.0).round() / 100.0
    }

    fn derive_best_offer_settings(request: &CreationRequest) -> BestOfferSettings {
        let mut settings = BestOfferSettings::balanced_preset();
        settings.profit_vs_speed = request.profit_vs_speed;
        settings.min_profit_margin = request.min_profit_margin;
        settings
    }

    fn record_cost(&self, category: CostCategory, model: &str, operation: &str, request: &CreationRequest, cost_usd: f64) -> f64 {
        let entry = CostEntry::new(category, model, operation, cost_usd).with_workflow_id(request.user_id.clone());
        self.cost_tracker.record(entry);
        cost_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use serde_json::Value;

    struct StubVision {
        product_data: ProductData,
        confidence: f32,
    }

    #[async_trait]
    impl VisionAnalyzer for StubVision {
        async fn analyze_image(&self, _bytes: &[u8], _kind: &str, _marketplace: &str, _ctx: Option<&Value>) -> Result<VisionAnalysis> {
            Ok(VisionAnalysis { product_data: self.product_data.clone(), confidence: self.confidence, metadata: HashMap::new() })
        }
    }

    fn base_request() -> CreationRequest {
        CreationRequest {
            image_bytes: vec![0u8; 8],
            filename: "photo.jpg".to_string(),
            user_id: "seller1".to_string(),
            marketplace: "ebay".to_string(),
            profit_vs_speed: 0.5,
            min_profit_margin: 0.15,
            cost_basis: Some(40.0),
            target_category: None,
            enable_best_offer: true,
            enable_cassini_optimization: false,
            enable_web_research: false,
            workflow_id: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn pipeline_compiles_a_listing_from_vision_only() {
        let vision = StubVision {
            product_data: ProductData {
                title: "Vintage camera with leather case".to_string(),
                brand: Some("Canon".to_string()),
                category: Some("Electronics".to_string()),
                condition: Some("used".to_string()),
                features: vec!["35mm".to_string()],
            },
            confidence: 0.9,
        };
        let best_offer = BestOfferManager::new();
        let cost_tracker = CostTracker::new(100.0, 1000.0);
        let workflow = ProductCreationWorkflow {
            vision: &vision,
            research: None,
            content_optimizer: None,
            best_offer: &best_offer,
            cost_tracker: &cost_tracker,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        };
        let listing = workflow.run(&base_request()).await.unwrap();
        assert_eq!(listing.category, "Electronics");
        assert_eq!(listing.price, 52.0); // cost_basis 40 * 1.3 (profit_vs_speed == 0.5 is not > 0.5)
        assert!(listing.title.chars().count() <= MAX_TITLE_LEN);
        assert!(best_offer.settings_for("seller1").is_some());
    }

    #[tokio::test]
    async fn empty_vision_without_research_fails_with_insufficient_input() {
        let vision = StubVision { product_data: ProductData::default(), confidence: 0.3 };
        let best_offer = BestOfferManager::new();
        let cost_tracker = CostTracker::new(100.0, 1000.0);
        let mut request = base_request();
        request.enable_web_research = false;
        let workflow = ProductCreationWorkflow {
            vision: &vision,
            research: None,
            content_optimizer: None,
            best_offer: &best_offer,
            cost_tracker: &cost_tracker,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        };
        let err = workflow.run(&request).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientInput);
    }

    #[test]
    fn long_title_is_truncated_with_ellipsis() {
        let request = base_request();
        let cost_tracker = CostTracker::new(100.0, 1000.0);
        let best_offer = BestOfferManager::new();
        struct DummyVision;
        #[async_trait]
        impl VisionAnalyzer for DummyVision {
            async fn analyze_image(&self, _b: &[u8], _k: &str, _m: &str, _c: Option<&Value>) -> Result<VisionAnalysis> {
                unreachable!()
            }
        }
        let vision = DummyVision;
        let workflow = ProductCreationWorkflow {
            vision: &vision,
            research: None,
            content_optimizer: None,
            best_offer: &best_offer,
            cost_tracker: &cost_tracker,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        };
        let long_title = "A".repeat(120);
        let price = workflow.determine_price(&request, &[]);
        assert_eq!(price, 52.0);
        assert!(long_title.len() > MAX_TITLE_LEN);
    }

    struct SlowResearch;

    #[async_trait]
    impl ResearchService for SlowResearch {
        async fn research(&self, _analysis: &VisionAnalysis, _marketplace: &str) -> Result<ResearchResult> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("research should be abandoned before it returns");
        }
    }

    #[tokio::test]
    async fn overall_deadline_abandons_a_mid_flight_stage_and_compiles_partial_results() {
        let vision = StubVision {
            product_data: ProductData {
                title: "Vintage camera".to_string(),
                brand: None,
                category: Some("Electronics".to_string()),
                condition: None,
                features: vec![],
            },
            confidence: 0.9,
        };
        let research = SlowResearch;
        let best_offer = BestOfferManager::new();
        let cost_tracker = CostTracker::new(100.0, 1000.0);
        let workflow = ProductCreationWorkflow {
            vision: &vision,
            research: Some(&research),
            content_optimizer: None,
            best_offer: &best_offer,
            cost_tracker: &cost_tracker,
            stage_timeout: Duration::from_secs(60),
        };
        let mut request = base_request();
        request.enable_web_research = true;
        request.deadline = Some(Duration::from_millis(50));

        let listing = workflow.run(&request).await.unwrap();

        assert_eq!(listing.sources_used, vec!["image_analysis_only".to_string()]);
        assert!(listing.confidence <= 0.3);
        assert!(listing.improvements.iter().any(|i| i.contains("research") && i.contains("timed out")));
    }
}
