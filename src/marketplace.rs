//! Marketplace Optimization (C12): category-fit scoring and listing-quality
//! scoring, consumed by the product-creation workflow (C10).
//!
//! Grounded in `original_source/fs_agt_clean/services/marketplace/ebay_optimization.py`'s
//! category-signal tables and the quality-score weighting scheme.

use std::collections::HashMap;

/// A category and the keyword signals that suggest a listing belongs in it.
struct CategorySignal {
    category: &'static str,
    keywords: &'static [&'static str],
}

const CATEGORY_SIGNALS: &[CategorySignal] = &[
    CategorySignal { category: "Electronics", keywords: &["camera", "lens", "battery", "charger", "electronic", "digital", "device"] },
    CategorySignal { category: "Clothing", keywords: &["shirt", "dress", "jacket", "pants", "size", "fabric", "fit"] },
    CategorySignal { category: "Home & Garden", keywords: &["furniture", "decor", "garden", "kitchen", "home", "plant"] },
    CategorySignal { category: "Collectibles", keywords: &["vintage", "rare", "collectible", "antique", "limited edition"] },
    CategorySignal { category: "Sporting Goods", keywords: &["sport", "fitness", "outdoor", "gym", "bike", "ball"] },
];

/// `{primaryCategory, alternatives[], confidence, reasoning}`.
#[derive(Debug, Clone)]
pub struct CategoryRecommendation {
    pub recommended_category: String,
    pub confidence: f64,
    pub rationale: String,
    pub alternatives: Vec<String>,
}

fn category_fit_score(product_name: &str, attributes: &HashMap<String, String>, signal: &CategorySignal) -> f64 {
    let haystack = {
        let mut s = product_name.to_lowercase();
        for v in attributes.values() {
            s.push(' ');
            s.push_str(&v.to_lowercase());
        }
        s
    };

    let mut score: f64 = 0.5;
    let matched = signal.keywords.iter().filter(|kw| haystack.contains(**kw)).count();
    if matched > 0 {
        score += 0.3;
    }
    score += (matched as f64 * 0.05).min(0.2);
    score.min(1.0)
}

/// C12: suggest the best category for a product, scored against the
/// seller's currently-assigned category.
pub fn optimize_category(
    product_name: &str,
    current_category: &str,
    attributes: &HashMap<String, String>,
) -> CategoryRecommendation {
    let mut scored: Vec<(&'static str, f64)> = CATEGORY_SIGNALS
        .iter()
        .map(|signal| (signal.category, category_fit_score(product_name, attributes, signal)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let (primary_category, primary_score) = scored[0];
    let secondary_score = scored.get(1).map(|(_, s)| *s).unwrap_or(0.0);
    let confidence = (primary_score + (primary_score - secondary_score) * 0.5).min(0.95);
    let alternatives: Vec<String> = scored.iter().skip(1).take(2).map(|(c, _)| c.to_string()).collect();

    if primary_category.eq_ignore_ascii_case(current_category) {
        return CategoryRecommendation {
            recommended_category: current_category.to_string(),
            confidence,
            rationale: "current category is already the best fit".to_string(),
            alternatives,
        };
    }

    CategoryRecommendation {
        recommended_category: primary_category.to_string(),
        confidence,
        rationale: format!("product attributes score higher for {primary_category} than {current_category}"),
        alternatives,
    }
}

/// Inputs to the listing-quality score; all are derived from an
/// [`crate::workflow::OptimizedListing`] draft before it's returned.
#[derive(Debug, Clone)]
pub struct ListingQualityInput {
    pub title_len: usize,
    pub description_len: usize,
    pub photo_count: usize,
    pub keyword_count: usize,
    pub has_shipping_info: bool,
}

/// Weighted [0,1] score: title length (optimum 40-80 chars), description
/// length, photo count (>=5 ideal), keyword count (>=5 ideal), and the
/// presence of shipping information.
pub fn listing_quality_score(input: &ListingQualityInput) -> f64 {
    let title_score = if (40..=80).contains(&input.title_len) {
        1.0
    } else if input.title_len < 40 {
        input.title_len as f64 / 40.0
    } else {
        (80.0 / input.title_len as f64).min(1.0)
    };

    let description_score = (input.description_len as f64 / 300.0).min(1.0);
    let photo_score = (input.photo_count as f64 / 5.0).min(1.0);
    let keyword_score = (input.keyword_count as f64 / 5.0).min(1.0);
    let shipping_score = if input.has_shipping_info { 1.0 } else { 0.0 };

    title_score * 0.30 + description_score * 0.25 + photo_score * 0.20 + keyword_score * 0.15 + shipping_score * 0.10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_product_scores_electronics() {
        let mut attrs = HashMap::new();
        attrs.insert("color".to_string(), "black".to_string());
        let recommendation = optimize_category("Vintage DSLR Camera with lens", "Collectibles", &attrs);
        assert_eq!(recommendation.recommended_category, "Electronics");
        assert!(recommendation.confidence > 0.0 && recommendation.confidence <= 0.95);
    }

    #[test]
    fn matching_current_category_keeps_it_and_drops_alternative() {
        let attrs = HashMap::new();
        let recommendation = optimize_category("a plain widget", "Electronics", &attrs);
        // no keyword match for any category: all tie at 0.5, first signal (Electronics) wins
        assert_eq!(recommendation.recommended_category, "Electronics");
    }

    #[test]
    fn quality_score_rewards_complete_listings() {
        let full = ListingQualityInput { title_len: 60, description_len: 400, photo_count: 8, keyword_count: 6, has_shipping_info: true };
        let sparse = ListingQualityInput { title_len: 10, description_len: 20, photo_count: 1, keyword_count: 0, has_shipping_info: false };
        assert!(listing_quality_score(&full) > listing_quality_score(&sparse));
        assert!(listing_quality_score(&full) > 0.9);
    }
}
