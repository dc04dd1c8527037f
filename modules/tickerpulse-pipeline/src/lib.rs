pub mod collector;
pub mod enricher;
pub mod run_log;
pub mod scoring;
pub mod summary;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use collector::{CollectStats, Collector};
pub use enricher::{EnrichStats, Enricher};
pub use run_log::{EventKind, RunLog, RunTotals};
pub use scoring::{ScoreOutcome, ScoringAdapter};
pub use summary::{EntityError, EntityOutcome, RunSummary};
pub use traits::{PostFetcher, SentimentModel};
