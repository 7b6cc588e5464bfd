//! Shared wiring between the `serve` and `ask` commands.

use std::sync::Arc;

use prorab_core::api::{
    AppContext, EngineError, KeySource, LlmRouter, PromptRegistry, RecommendRequest,
    RecommendationEngine, RequestContext, SettingsCache,
};

use crate::commands::cli::AskArgs;

pub struct EngineHandle {
    pub engine: Arc<RecommendationEngine>,
    pub keys: Option<Arc<dyn KeySource>>,
}

/// Build the full pipeline from the context: providers from the factory,
/// one router over the shared key pool, prompt/settings caches backed by
/// the storefront.
pub async fn build_engine(ctx: &AppContext) -> Result<EngineHandle, EngineError> {
    let services = ctx.build_services().await?;

    let router = Arc::new(LlmRouter::new(ctx.pool().clone(), services.callers.clone()));
    let prompts = Arc::new(PromptRegistry::new(services.prompts.clone()));
    let settings = Arc::new(SettingsCache::new(services.settings.clone()));

    let engine = Arc::new(RecommendationEngine::new(
        router,
        services.catalog.clone(),
        services.requests.clone(),
        prompts,
        settings,
        ctx.cfg().engine.clone(),
    ));

    Ok(EngineHandle {
        engine,
        keys: services.keys.clone(),
    })
}

/// One-shot pipeline run for smoke testing from a shell.
pub async fn run_ask(args: AskArgs, ctx: &AppContext) -> Result<i32, EngineError> {
    let handle = build_engine(ctx).await?;
    if let Some(keys) = handle.keys.as_ref() {
        ctx.refresh_dynamic_keys(keys).await;
    }

    let request = RecommendRequest {
        query: args.query,
        max_results: args.max_results,
        context: args.category.map(|category_id| RequestContext {
            category_id: Some(category_id),
            ..Default::default()
        }),
        ..Default::default()
    };

    let response = handle.engine.recommend(request).await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .map_err(|e| EngineError::Internal(e.into()))?
        );
    } else {
        println!("{}", response.summary);
        for m in &response.recommendations {
            println!(
                "  [{:>3}] {} ({:.2}) - {}",
                m.score, m.product.name, m.product.price, m.reason
            );
        }
        println!("({} ms)", response.processing_time_ms);
    }

    Ok(if response.success { 0 } else { 1 })
}

/// Masked key-pool snapshot printout.
pub fn run_keys(ctx: &AppContext) -> i32 {
    let snapshot = ctx.pool().snapshot();
    println!("keys total: {}", snapshot.total);
    for provider in &snapshot.providers {
        println!(
            "{}: {}/{} healthy",
            provider.provider, provider.healthy, provider.total
        );
        for key in &provider.keys {
            println!(
                "  {} {} calls={} errors={} consecutive={}{}",
                key.id,
                key.secret,
                key.calls,
                key.errors,
                key.consecutive_errors,
                if key.cooldown_remaining_secs > 0 {
                    format!(" cooldown={}s", key.cooldown_remaining_secs)
                } else {
                    String::new()
                }
            );
        }
    }
    0
}
