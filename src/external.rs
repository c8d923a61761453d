//! External collaborator interfaces.
//!
//! Everything in this module is a named interface only — no concrete
//! production implementation ships in this crate (persistent stores,
//! marketplace API clients, vision/research services, and the HTTP/REST
//! surface are all explicitly out of scope). Integration tests provide
//! their own in-memory doubles, the way `tests/orchestration_tests.rs`'s
//! `MockClient` stands in for a real LLM provider.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

/// A vector similarity store (e.g. for product/image embeddings).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, collection: &str, id: &str, vector: Vec<f32>, payload: Value) -> Result<()>;
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        min_score: f32,
        filter: Option<Value>,
    ) -> Result<Vec<VectorHit>>;
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

/// A marketplace listing as returned by [`MarketplaceClient::search_products`].
#[derive(Debug, Clone)]
pub struct Listing {
    pub item_id: String,
    pub title: String,
    pub price: f64,
    pub category_id: String,
}

#[derive(Debug, Clone)]
pub struct InventoryStatus {
    pub sku: String,
    pub quantity_available: u32,
}

#[derive(Debug, Clone)]
pub struct SalesMetrics {
    pub views: u64,
    pub watchers: u64,
    pub sales: u64,
    pub window_days: u32,
}

/// Access to a marketplace's product search, inventory, and sales data.
/// Implementations own rate limiting (>=1 request/sec per host) and token
/// refresh internally.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    async fn search_products(&self, query: &str, limit: usize) -> Result<Vec<Listing>>;
    async fn get_inventory(&self, sku: &str) -> Result<Option<InventoryStatus>>;
    async fn get_sales_metrics(&self, item_id: &str, days: u32) -> Result<Option<SalesMetrics>>;
}

/// Raw product facts extracted from a product image.
#[derive(Debug, Clone, Default)]
pub struct ProductData {
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VisionAnalysis {
    pub product_data: ProductData,
    pub confidence: f32,
    pub metadata: HashMap<String, Value>,
}

/// Analyzes a product image into structured facts (C10 stage 1).
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze_image(
        &self,
        image_bytes: &[u8],
        kind: &str,
        marketplace: &str,
        context: Option<&Value>,
    ) -> Result<VisionAnalysis>;
}

#[derive(Debug, Clone, Default)]
pub struct ResearchResult {
    pub specs: HashMap<String, String>,
    pub features: Vec<String>,
    pub competitive_prices: Vec<f64>,
    pub market_position: Option<String>,
    pub research_confidence: f32,
    pub sources_used: Vec<String>,
}

/// Product research against competitive listings (C10 stage 2).
#[async_trait]
pub trait ResearchService: Send + Sync {
    async fn research(&self, analysis: &VisionAnalysis, marketplace: &str) -> Result<ResearchResult>;
}

#[derive(Debug, Clone)]
pub struct BaseContent {
    pub title: String,
    pub description: String,
    pub item_specifics: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct OptimizedContent {
    pub title: String,
    pub description: String,
    pub item_specifics: HashMap<String, String>,
    pub cassini_score: f32,
    pub improvements: Vec<String>,
}

/// Listing-copy optimization against target keywords (C10 stage 4).
#[async_trait]
pub trait ContentOptimizer: Send + Sync {
    async fn optimize(
        &self,
        base: &BaseContent,
        product_data: &ProductData,
        target_keywords: &[String],
    ) -> Result<OptimizedContent>;
}

/// Records an agent's decision for audit/learning purposes. Failures here
/// are logged and swallowed by C7 — they never fail the primary request.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn log_agent_decision(
        &self,
        agent_id: &str,
        agent_type: &str,
        decision_type: &str,
        params: &Value,
        confidence: f32,
        rationale: &str,
        requires_approval: bool,
    ) -> Result<()>;
}
