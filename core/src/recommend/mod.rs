//! Conversational recommendation pipeline: intent analysis, catalog
//! filtering, ranking, missing-item handling, and small talk.

pub mod chitchat;
pub mod engine;
pub mod intent;
pub mod missing;
pub mod ranker;
pub mod types;

pub use engine::{RecommendationEngine, ANALYSIS_CANDIDATE_CAP, RESPONSE_CACHE_TTL};
pub use intent::analyze_intent;
pub use missing::MissingItemAction;
pub use types::{
    Budget, ChatMessage, IntentAnalysis, ProductMatch, RecommendRequest, RecommendationResponse,
    RequestContext, UnavailableItem,
};
