//! Top-level recommendation pipeline. Stateless per request; the only
//! shared mutable state is the response cache and the key pool behind the
//! router.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::catalog::{CatalogPlugin, Category, Product, ProductQuery, RequestSink};
use crate::config::EngineConfig;
use crate::llm::LlmRouter;
use crate::prompts::PromptRegistry;
use crate::settings::SettingsCache;

use super::chitchat::respond_chitchat;
use super::intent::analyze_intent;
use super::missing::{resolve_missing_item, MissingItemAction};
use super::ranker::rank_products;
use super::types::{
    Budget, ChatMessage, IntentAnalysis, ProductMatch, RecommendRequest, RecommendationResponse,
    RequestContext,
};

/// Final responses are reused for identical queries inside this window.
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(120);
const RESPONSE_CACHE_CAPACITY: usize = 256;

/// Hard ceiling on candidates handed to the ranking call. Keeps the prompt
/// bounded no matter how broad the catalog filter was.
pub const ANALYSIS_CANDIDATE_CAP: usize = 20;

/// Neutral score used when the ranking call fails and we fall back to the
/// filtered candidate order.
const FALLBACK_SCORE: u8 = 50;

struct CachedResponse {
    stored_at: Instant,
    response: RecommendationResponse,
}

pub struct RecommendationEngine {
    router: Arc<LlmRouter>,
    catalog: Arc<dyn CatalogPlugin>,
    requests: Arc<dyn RequestSink>,
    prompts: Arc<PromptRegistry>,
    settings: Arc<SettingsCache>,
    config: EngineConfig,
    cache: Mutex<LruCache<String, CachedResponse>>,
}

impl RecommendationEngine {
    pub fn new(
        router: Arc<LlmRouter>,
        catalog: Arc<dyn CatalogPlugin>,
        requests: Arc<dyn RequestSink>,
        prompts: Arc<PromptRegistry>,
        settings: Arc<SettingsCache>,
        config: EngineConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(RESPONSE_CACHE_CAPACITY).unwrap();
        Self {
            router,
            catalog,
            requests,
            prompts,
            settings,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn router(&self) -> &Arc<LlmRouter> {
        &self.router
    }

    pub fn prompts(&self) -> &Arc<PromptRegistry> {
        &self.prompts
    }

    pub fn settings(&self) -> &Arc<SettingsCache> {
        &self.settings
    }

    /// The single entry point. Never returns Err; every failure mode maps
    /// to a `RecommendationResponse` the widget can render.
    pub async fn recommend(&self, request: RecommendRequest) -> RecommendationResponse {
        let started = Instant::now();
        let query = request.query.trim().to_string();
        if query.is_empty() {
            let mut resp = RecommendationResponse::failure("query must not be empty");
            resp.processing_time_ms = started.elapsed().as_millis() as u64;
            return resp;
        }

        let fingerprint = fingerprint(&query, request.context.as_ref());
        if let Some(mut hit) = self.cache_lookup(&fingerprint) {
            tracing::debug!(target: "prorab.reco", stage = "cache.hit", fingerprint = %fingerprint);
            hit.processing_time_ms = started.elapsed().as_millis() as u64;
            return hit;
        }

        let settings = self.settings.current().await;
        if !settings.enabled {
            let mut resp =
                RecommendationResponse::failure("the shopping assistant is currently disabled");
            resp.processing_time_ms = started.elapsed().as_millis() as u64;
            return resp;
        }

        let mut response = self
            .run_pipeline(&query, &request, settings.max_recommendations)
            .await;
        response.processing_time_ms = started.elapsed().as_millis() as u64;

        if response.success {
            self.cache_store(fingerprint, &response);
        }
        response
    }

    async fn run_pipeline(
        &self,
        query: &str,
        request: &RecommendRequest,
        settings_max: usize,
    ) -> RecommendationResponse {
        let categories = match self.catalog.get_categories().await {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(target: "prorab.reco", stage = "catalog.categories_error", error = %err);
                return RecommendationResponse::failure("catalog is unavailable, try again later");
            }
        };

        let intent = match analyze_intent(
            &self.router,
            &self.prompts,
            query,
            &categories,
            &request.messages,
        )
        .await
        {
            Ok(i) => i,
            Err(err) => {
                tracing::error!(target: "prorab.reco", stage = "intent.error", error = %err);
                return RecommendationResponse::failure(format!(
                    "could not interpret the request: {err}"
                ));
            }
        };
        tracing::debug!(
            target: "prorab.reco",
            stage = "intent.done",
            general_chat = intent.is_general_chat,
            category = intent.category_id.as_deref().unwrap_or("-"),
            confidence = intent.confidence,
        );

        if intent.is_general_chat {
            let settings = self.settings.current().await;
            let reply = respond_chitchat(
                &self.router,
                &self.prompts,
                &settings,
                query,
                &request.messages,
            )
            .await;
            return RecommendationResponse::answered(intent, Vec::new(), reply);
        }

        let in_missing_flow = mid_missing_flow(request);
        if intent.unavailable_item.is_some() {
            return self.handle_missing(query, &intent, &request.messages).await;
        }

        let resolved = resolve_category(&intent, request.context.as_ref(), &categories);
        if resolved.is_none() && in_missing_flow {
            // Mid-way through a missing-item clarification the shopper is
            // still talking about the unstocked item; falling back to "all
            // products" here would surface unrelated goods.
            tracing::debug!(target: "prorab.reco", stage = "catalog.prevent_fallback");
            return self.handle_missing(query, &intent, &request.messages).await;
        }

        let candidates = match self.fetch_candidates(&intent, request.context.as_ref(), resolved).await {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(target: "prorab.reco", stage = "catalog.products_error", error = %err);
                return RecommendationResponse::failure("catalog is unavailable, try again later");
            }
        };

        if candidates.is_empty() {
            // Evidence of an unstocked item even without an explicit
            // unavailable-item payload from intent analysis.
            return self.handle_missing(query, &intent, &request.messages).await;
        }

        let max_results = request
            .max_results
            .unwrap_or(settings_max)
            .clamp(1, ANALYSIS_CANDIDATE_CAP);
        let capped: Vec<Product> = candidates
            .into_iter()
            .take(ANALYSIS_CANDIDATE_CAP)
            .collect();

        match rank_products(&self.router, &self.prompts, query, &capped, &intent).await {
            Ok(mut ranked) => {
                ranked.matches.truncate(max_results);
                RecommendationResponse::answered(intent, ranked.matches, ranked.summary)
            }
            Err(err) => {
                tracing::warn!(target: "prorab.reco", stage = "rank.degraded", error = %err);
                let matches = fallback_ranking(&capped, max_results);
                let summary = format!(
                    "Here are {} items matching your request.",
                    matches.len()
                );
                RecommendationResponse::answered(intent, matches, summary)
            }
        }
    }

    async fn handle_missing(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        history: &[ChatMessage],
    ) -> RecommendationResponse {
        let action =
            resolve_missing_item(&self.router, &self.prompts, query, intent, history).await;
        let summary = match action {
            MissingItemAction::Request { payload, message } => {
                tracing::info!(
                    target: "prorab.reco",
                    stage = "missing.request",
                    product = %payload.product_name,
                );
                if let Err(err) = self.requests.create_product_request(payload).await {
                    tracing::error!(target: "prorab.reco", stage = "missing.sink_error", error = %err);
                    // The shopper still gets an answer; the record is lost,
                    // not the conversation.
                }
                message
            }
            MissingItemAction::AskDetails { question } => question,
        };
        RecommendationResponse::answered(intent.clone(), Vec::new(), summary)
    }

    async fn fetch_candidates(
        &self,
        intent: &IntentAnalysis,
        context: Option<&RequestContext>,
        resolved: Option<ResolvedCategory>,
    ) -> anyhow::Result<Vec<Product>> {
        let mut query = ProductQuery {
            available_only: true,
            limit: Some(self.config.catalog_limit),
            ..Default::default()
        };
        match resolved {
            Some(ResolvedCategory::Sub(id)) => query.subcategory_id = Some(id),
            Some(ResolvedCategory::Top(id)) => query.category_id = Some(id),
            None => {}
        }

        let products = self.catalog.get_products(query).await?;

        let budget = effective_budget(intent, context);
        let excluded: &[String] = context
            .map(|c| c.exclude_product_ids.as_slice())
            .unwrap_or(&[]);

        Ok(products
            .into_iter()
            .filter(|p| p.available)
            .filter(|p| !excluded.contains(&p.id))
            .filter(|p| within_budget(p.price, &budget))
            .collect())
    }

    fn cache_lookup(&self, fingerprint: &str) -> Option<RecommendationResponse> {
        let mut cache = self.cache.lock().unwrap();
        let expired = match cache.get(fingerprint) {
            Some(entry) if entry.stored_at.elapsed() < RESPONSE_CACHE_TTL => {
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(fingerprint);
        }
        None
    }

    fn cache_store(&self, fingerprint: String, response: &RecommendationResponse) {
        let mut cache = self.cache.lock().unwrap();
        cache.put(
            fingerprint,
            CachedResponse {
                stored_at: Instant::now(),
                response: response.clone(),
            },
        );
    }

    /// Drops every cached response. Used when prompts or settings change.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

enum ResolvedCategory {
    Top(String),
    Sub(String),
}

/// Pick the catalog filter from intent first, request context second, and
/// verify the id actually exists before using it. Subcategory wins when
/// both are present.
fn resolve_category(
    intent: &IntentAnalysis,
    context: Option<&RequestContext>,
    categories: &[Category],
) -> Option<ResolvedCategory> {
    let known = |id: &String| categories.iter().any(|c| &c.id == id);

    if let Some(sub) = intent.subcategory_id.as_ref().filter(|id| known(id)) {
        return Some(ResolvedCategory::Sub(sub.clone()));
    }
    if let Some(cat) = intent.category_id.as_ref().filter(|id| known(id)) {
        return Some(ResolvedCategory::Top(cat.clone()));
    }
    context
        .and_then(|c| c.category_id.as_ref())
        .filter(|id| known(id))
        .map(|id| ResolvedCategory::Top(id.clone()))
}

fn effective_budget(intent: &IntentAnalysis, context: Option<&RequestContext>) -> Budget {
    let ctx = context.and_then(|c| c.budget.clone()).unwrap_or_default();
    Budget {
        min: intent.budget.min.or(ctx.min),
        max: intent.budget.max.or(ctx.max),
    }
}

/// Budget bounds are inclusive on both ends.
fn within_budget(price: f64, budget: &Budget) -> bool {
    if let Some(min) = budget.min {
        if price < min {
            return false;
        }
    }
    if let Some(max) = budget.max {
        if price > max {
            return false;
        }
    }
    true
}

/// Are we mid-way through a missing-item clarification? The explicit
/// context flag wins; absent it, scan the last assistant turn. The text
/// scan is a legacy heuristic kept for callers that do not pass the flag.
fn mid_missing_flow(request: &RecommendRequest) -> bool {
    if let Some(flag) = request.context.as_ref().and_then(|c| c.awaiting_missing_item) {
        return flag;
    }
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "assistant")
        .map(|m| {
            let text = m.content.to_lowercase();
            text.contains("don't have") || text.contains("request")
        })
        .unwrap_or(false)
}

fn fallback_ranking(candidates: &[Product], max_results: usize) -> Vec<ProductMatch> {
    candidates
        .iter()
        .take(max_results)
        .map(|p| ProductMatch {
            product: p.clone(),
            score: FALLBACK_SCORE,
            highlights: vec!["Matches your search".to_string()],
            reason: format!("{} fits the request you described.", p.name),
        })
        .collect()
}

/// Cache key: the normalized query plus the context fields that change the
/// answer. Two shoppers typing the same thing on the same category page hit
/// the same entry.
fn fingerprint(query: &str, context: Option<&RequestContext>) -> String {
    let normalized = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut key = normalized;
    if let Some(ctx) = context {
        if let Some(cat) = &ctx.category_id {
            key.push_str("|cat=");
            key.push_str(cat);
        }
        if let Some(budget) = &ctx.budget {
            key.push_str(&format!(
                "|b={}..{}",
                budget.min.unwrap_or(0.0),
                budget.max.unwrap_or(f64::MAX)
            ));
        }
        if !ctx.exclude_product_ids.is_empty() {
            key.push_str("|ex=");
            key.push_str(&ctx.exclude_product_ids.join(","));
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::keypool::{KeyPool, Provider};
    use crate::llm::ProviderCaller;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedCaller {
        calls: AtomicUsize,
        script: Mutex<Vec<Result<String, LlmError>>>,
    }

    impl ScriptedCaller {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderCaller for ScriptedCaller {
        fn provider(&self) -> Provider {
            Provider::Fast
        }

        async fn complete(&self, _prompt: &str, _model: Option<&str>) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(LlmError::EmptyResponse);
            }
            script.remove(0)
        }
    }

    struct SpyCatalog {
        categories: Vec<Category>,
        products: Vec<Product>,
        category_calls: AtomicUsize,
        product_calls: AtomicUsize,
    }

    impl SpyCatalog {
        fn new(products: Vec<Product>) -> Arc<Self> {
            Arc::new(Self {
                categories: vec![Category {
                    id: "c1".into(),
                    name: "Power tools".into(),
                    parent_id: None,
                }],
                products,
                category_calls: AtomicUsize::new(0),
                product_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CatalogPlugin for SpyCatalog {
        fn name(&self) -> &str {
            "spy"
        }

        async fn get_categories(&self) -> anyhow::Result<Vec<Category>> {
            self.category_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.categories.clone())
        }

        async fn get_products(&self, _query: ProductQuery) -> anyhow::Result<Vec<Product>> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.products.clone())
        }
    }

    struct SpySink {
        requests: AtomicUsize,
    }

    #[async_trait]
    impl RequestSink for SpySink {
        async fn create_product_request(
            &self,
            _payload: crate::catalog::ProductRequestPayload,
        ) -> anyhow::Result<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.into(),
            name: format!("Tool {id}"),
            description: "Solid and dependable".into(),
            price,
            tags: Vec::new(),
            available: true,
            category_id: Some("c1".into()),
            subcategory_id: None,
        }
    }

    fn engine_with(
        caller: Arc<ScriptedCaller>,
        catalog: Arc<SpyCatalog>,
    ) -> (RecommendationEngine, Arc<SpySink>) {
        let pool = Arc::new(KeyPool::new());
        pool.initialize_with(vec![(Provider::Fast, "sk-test-000000000001".into())]);
        let router = Arc::new(LlmRouter::new(pool, vec![caller]));
        let sink = Arc::new(SpySink {
            requests: AtomicUsize::new(0),
        });
        let engine = RecommendationEngine::new(
            router,
            catalog,
            sink.clone(),
            Arc::new(PromptRegistry::new(None)),
            Arc::new(SettingsCache::new(None)),
            EngineConfig::default(),
        );
        (engine, sink)
    }

    fn intent_json(category: Option<&str>) -> String {
        match category {
            Some(c) => format!(r#"{{"categoryId":"{c}","confidence":0.9}}"#),
            None => r#"{"confidence":0.2}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_query_fails_fast() {
        let caller = ScriptedCaller::new(vec![]);
        let (engine, _) = engine_with(caller.clone(), SpyCatalog::new(vec![]));
        let resp = engine
            .recommend(RecommendRequest {
                query: "   ".into(),
                ..Default::default()
            })
            .await;
        assert!(!resp.success);
        assert_eq!(caller.calls(), 0);
    }

    #[tokio::test]
    async fn general_chat_skips_catalog_reads() {
        let caller = ScriptedCaller::new(vec![
            Ok(r#"{"isGeneralChat":true,"confidence":0.95}"#.into()),
            Ok("Hi there! I'm here to help you pick the right gear.".into()),
        ]);
        let catalog = SpyCatalog::new(vec![product("p1", 100.0)]);
        let (engine, _) = engine_with(caller, catalog.clone());

        let resp = engine
            .recommend(RecommendRequest {
                query: "hello!".into(),
                ..Default::default()
            })
            .await;

        assert!(resp.success);
        assert!(resp.recommendations.is_empty());
        assert!(resp.summary.contains("help"));
        assert_eq!(catalog.product_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_catalog_answers_with_clarifying_question() {
        let caller = ScriptedCaller::new(vec![
            Ok(intent_json(Some("c1"))),
            Ok(r#"{"action":"ask_details","message":"Which brand do you prefer?"}"#.into()),
        ]);
        let (engine, sink) = engine_with(caller, SpyCatalog::new(vec![]));

        let resp = engine
            .recommend(RecommendRequest {
                query: "need a plasma cutter".into(),
                ..Default::default()
            })
            .await;

        assert!(resp.success);
        assert!(resp.recommendations.is_empty());
        assert!(!resp.summary.is_empty());
        assert_eq!(sink.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_item_request_reaches_the_sink() {
        let caller = ScriptedCaller::new(vec![
            Ok(
                r#"{"confidence":0.8,"unavailableItem":{"name":"laser level","maxBudget":"3000"}}"#
                    .into(),
            ),
            Ok(
                r#"{"action":"request","name":"laser level","maxBudget":3000,"message":"Request filed!"}"#
                    .into(),
            ),
        ]);
        let (engine, sink) = engine_with(caller, SpyCatalog::new(vec![product("p1", 50.0)]));

        let resp = engine
            .recommend(RecommendRequest {
                query: "I want a laser level for 3000".into(),
                ..Default::default()
            })
            .await;

        assert!(resp.success);
        assert_eq!(resp.summary, "Request filed!");
        assert_eq!(sink.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn identical_query_inside_ttl_hits_the_cache() {
        let caller = ScriptedCaller::new(vec![
            Ok(intent_json(Some("c1"))),
            Ok(
                r#"{"recommendations":[{"productId":"p1","score":90,"highlights":["light"],"reason":"Fits well"}],"summary":"One solid pick."}"#
                    .into(),
            ),
        ]);
        let catalog = SpyCatalog::new(vec![product("p1", 100.0)]);
        let (engine, _) = engine_with(caller.clone(), catalog.clone());

        let request = RecommendRequest {
            query: "light cordless drill".into(),
            ..Default::default()
        };
        let first = engine.recommend(request.clone()).await;
        let llm_calls_after_first = caller.calls();
        let second = engine.recommend(request).await;

        assert!(first.success && second.success);
        assert_eq!(caller.calls(), llm_calls_after_first);
        assert_eq!(catalog.category_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.summary, first.summary);
        assert_eq!(second.recommendations.len(), first.recommendations.len());
    }

    #[tokio::test]
    async fn ranking_failure_degrades_to_candidate_order() {
        let caller = ScriptedCaller::new(vec![
            Ok(intent_json(Some("c1"))),
            Err(LlmError::EmptyResponse),
            // Strict-JSON retry also fails.
            Err(LlmError::EmptyResponse),
        ]);
        let catalog = SpyCatalog::new(vec![
            product("p1", 100.0),
            product("p2", 200.0),
            product("p3", 300.0),
        ]);
        let (engine, _) = engine_with(caller, catalog);

        let resp = engine
            .recommend(RecommendRequest {
                query: "angle grinder".into(),
                max_results: Some(2),
                ..Default::default()
            })
            .await;

        assert!(resp.success);
        assert_eq!(resp.recommendations.len(), 2);
        assert_eq!(resp.recommendations[0].product.id, "p1");
        assert_eq!(resp.recommendations[0].score, FALLBACK_SCORE);
        assert!(!resp.recommendations[0].highlights[0].is_empty());
        assert!(!resp.recommendations[0].reason.is_empty());
        assert!(!resp.summary.is_empty());
    }

    #[tokio::test]
    async fn lowered_settings_cap_trims_the_results() {
        struct CappedSettings;

        #[async_trait]
        impl crate::settings::SettingsStore for CappedSettings {
            async fn get_ai_settings(&self) -> anyhow::Result<crate::settings::AiSettings> {
                Ok(crate::settings::AiSettings {
                    max_recommendations: 2,
                    ..Default::default()
                })
            }
        }

        let caller = ScriptedCaller::new(vec![
            Ok(intent_json(Some("c1"))),
            Ok(
                r#"{"recommendations":[
                    {"productId":"p1","score":95,"reason":"Best fit"},
                    {"productId":"p2","score":80,"reason":"Good fit"},
                    {"productId":"p3","score":60,"reason":"Workable"}
                ],"summary":"Three picks."}"#
                    .into(),
            ),
        ]);
        let catalog = SpyCatalog::new(vec![
            product("p1", 100.0),
            product("p2", 200.0),
            product("p3", 300.0),
        ]);

        let pool = Arc::new(KeyPool::new());
        pool.initialize_with(vec![(Provider::Fast, "sk-test-000000000001".into())]);
        let router = Arc::new(LlmRouter::new(pool, vec![caller]));
        let sink = Arc::new(SpySink {
            requests: AtomicUsize::new(0),
        });
        let engine = RecommendationEngine::new(
            router,
            catalog,
            sink,
            Arc::new(PromptRegistry::new(None)),
            Arc::new(SettingsCache::new(Some(Arc::new(CappedSettings)))),
            EngineConfig::default(),
        );

        // No per-request override, so the operator-set cap applies.
        let resp = engine
            .recommend(RecommendRequest {
                query: "impact driver".into(),
                ..Default::default()
            })
            .await;

        assert!(resp.success);
        assert_eq!(resp.recommendations.len(), 2);
        assert_eq!(resp.recommendations[0].product.id, "p1");
    }

    #[tokio::test]
    async fn budget_filter_is_inclusive_on_the_boundary() {
        let intent = IntentAnalysis {
            budget: Budget {
                min: None,
                max: Some(1000.0),
            },
            ..Default::default()
        };
        let budget = effective_budget(&intent, None);
        let prices = [100.0, 500.0, 1000.0, 5000.0];
        let kept: Vec<f64> = prices
            .iter()
            .copied()
            .filter(|p| within_budget(*p, &budget))
            .collect();
        assert_eq!(kept, vec![100.0, 500.0, 1000.0]);
    }

    #[tokio::test]
    async fn missing_flow_without_category_never_queries_all_products() {
        let caller = ScriptedCaller::new(vec![
            Ok(intent_json(None)),
            Ok(r#"{"action":"ask_details","message":"What budget did you have in mind?"}"#.into()),
        ]);
        let catalog = SpyCatalog::new(vec![product("p1", 100.0)]);
        let (engine, _) = engine_with(caller, catalog.clone());

        let resp = engine
            .recommend(RecommendRequest {
                query: "a cheaper one".into(),
                messages: vec![
                    ChatMessage::user("do you have laser levels?"),
                    ChatMessage::assistant("We don't have that yet, I can file a request."),
                ],
                context: Some(RequestContext {
                    awaiting_missing_item: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await;

        assert!(resp.success);
        assert!(resp.recommendations.is_empty());
        assert_eq!(catalog.product_calls.load(Ordering::SeqCst), 0);
        assert!(resp.summary.contains("budget"));
    }

    #[test]
    fn fingerprint_normalizes_whitespace_and_case() {
        assert_eq!(
            fingerprint("  Cordless   DRILL ", None),
            fingerprint("cordless drill", None)
        );
        assert_ne!(
            fingerprint("cordless drill", None),
            fingerprint(
                "cordless drill",
                Some(&RequestContext {
                    category_id: Some("c1".into()),
                    ..Default::default()
                })
            )
        );
    }

    #[test]
    fn text_heuristic_detects_missing_flow() {
        let request = RecommendRequest {
            query: "makita, around 2000".into(),
            messages: vec![ChatMessage::assistant(
                "We don't have that item, want me to file a request?",
            )],
            ..Default::default()
        };
        assert!(mid_missing_flow(&request));

        let explicit_off = RecommendRequest {
            context: Some(RequestContext {
                awaiting_missing_item: Some(false),
                ..Default::default()
            }),
            ..request
        };
        assert!(!mid_missing_flow(&explicit_off));
    }
}
