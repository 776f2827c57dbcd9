pub mod discovery;
pub mod engine;
pub mod insights;

pub use discovery::DiscoveryFeed;
pub use engine::{DecisionEngine, SwipeOutcome};
pub use insights::InsightFeeds;
