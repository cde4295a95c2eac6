//! Trend-to-poll generation pipeline.
//!
//! Collector → Quota Guard → Synthesizer → Persistence & Audit Writer,
//! orchestrated by [`PollGenerator`]. Each run is stateless: settings,
//! signals and the quota count are read fresh from the store.

pub mod collector;
pub mod generator;
pub mod quota;
pub mod synthesizer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod writer;


pub use generator::{GenerationReport, PollGenerator, RunOutcome};
pub use traits::{GenerationRequest, GenerationStore, TextGenerator};
