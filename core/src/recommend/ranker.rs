//! Ranking and summary in one combined call. A single call halves latency
//! and key consumption versus separate ranking and summary prompts.

use serde::Deserialize;

use crate::catalog::Product;
use crate::error::LlmError;
use crate::llm::LlmRouter;
use crate::prompts::{PromptRegistry, PRODUCT_RANKING};

use super::types::{IntentAnalysis, ProductMatch};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RankedEnvelope {
    recommendations: Vec<RankedItem>,
    summary: String,
}

impl Default for RankedEnvelope {
    fn default() -> Self {
        Self {
            recommendations: Vec::new(),
            summary: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RankedItem {
    product_id: String,
    score: f64,
    highlights: Vec<String>,
    reason: String,
}

pub struct RankedResult {
    pub matches: Vec<ProductMatch>,
    pub summary: String,
}

/// Rank a bounded candidate set. The caller applies the candidate cap
/// before invoking this; an empty candidate list must never reach here
/// (short-circuit to the missing-item handler instead).
pub async fn rank_products(
    router: &LlmRouter,
    prompts: &PromptRegistry,
    query: &str,
    candidates: &[Product],
    intent: &IntentAnalysis,
) -> Result<RankedResult, LlmError> {
    debug_assert!(!candidates.is_empty());

    let prompt = prompts
        .get_prompt(
            PRODUCT_RANKING,
            &[
                ("query", query.to_string()),
                ("intent", render_intent(intent)),
                ("candidates", render_candidates(candidates)),
            ],
        )
        .await?;

    let envelope: RankedEnvelope = router.complete_json(&prompt, None).await?;

    // The model may rank a subset; it must not invent ids. Unknown ids are
    // dropped rather than failing the whole request.
    let mut matches = Vec::new();
    for item in envelope.recommendations {
        let Some(product) = candidates.iter().find(|p| p.id == item.product_id) else {
            tracing::debug!(
                target: "prorab.reco",
                stage = "rank.unknown_id",
                product_id = %item.product_id,
            );
            continue;
        };
        matches.push(ProductMatch {
            product: product.clone(),
            score: item.score.clamp(0.0, 100.0).round() as u8,
            highlights: item.highlights,
            reason: item.reason,
        });
    }

    if matches.is_empty() {
        return Err(LlmError::ParseFailed(
            "ranking response contained no usable product ids".to_string(),
        ));
    }

    Ok(RankedResult {
        matches,
        summary: envelope.summary,
    })
}

fn render_intent(intent: &IntentAnalysis) -> String {
    serde_json::to_string_pretty(intent).unwrap_or_else(|_| "{}".to_string())
}

fn render_candidates(candidates: &[Product]) -> String {
    candidates
        .iter()
        .map(|p| {
            let mut line = format!("- id: {} | {} | {:.2}", p.id, p.name, p.price);
            if !p.tags.is_empty() {
                line.push_str(&format!(" | tags: {}", p.tags.join(", ")));
            }
            if !p.description.is_empty() {
                let short: String = p.description.chars().take(160).collect();
                line.push_str(&format!(" | {}", short));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {id}"),
            description: "A sturdy tool for serious work on any site".into(),
            price,
            tags: vec!["pro".into()],
            available: true,
            category_id: Some("c1".into()),
            subcategory_id: None,
        }
    }

    #[test]
    fn candidate_rendering_is_compact() {
        let out = render_candidates(&[product("p1", 99.5)]);
        assert!(out.contains("id: p1"));
        assert!(out.contains("99.50"));
        assert!(out.contains("tags: pro"));
    }

    #[test]
    fn envelope_tolerates_partial_items() {
        let env: RankedEnvelope = serde_json::from_str(
            r#"{"recommendations":[{"productId":"p1","score":88}],"summary":"ok"}"#,
        )
        .unwrap();
        assert_eq!(env.recommendations[0].product_id, "p1");
        assert!(env.recommendations[0].highlights.is_empty());
    }
}
