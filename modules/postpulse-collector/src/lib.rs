pub mod analysis;
mod latch;
pub mod orchestrator;
pub mod rate_limit;
pub mod resilient;
pub mod services;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use analysis::{
    analyze_posts, AnalysisSummary, AnalysisTotals, AnalyzedPost, ScoreError, Sentiment,
    SentimentScore, SentimentScorer,
};
pub use orchestrator::{CollectStats, Collected, Orchestrator, OrchestratorBuilder, PostStream};
pub use rate_limit::RateLimiter;
pub use services::{BlueskyCollector, TwitterCollector};
pub use store::{AnalysisStore, StoreError};
pub use traits::{CollectQuery, FeedTarget, Page, PostCollector, QueryKind};
