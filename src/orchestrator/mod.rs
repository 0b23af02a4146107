//! Assessment orchestration: adapters, retry policy and the per-answer fan-out.

mod adapter;
mod constants;
mod engine;
mod retry;

pub mod config;
pub mod traits;
pub mod types;

pub use adapter::{ContentGradingAdapter, SpeechAssessmentAdapter};
pub use config::{AdapterConfig, OrchestratorConfig};
pub use engine::{AssessmentOrchestrator, OrchestratorProfile};
pub use traits::{ContentAssessor, ContentGrader, SessionNarrator, SpeechAssessor, SpeechProvider};
pub use types::{AdapterReport, NarrationEntry, NarrationRequest};

pub(crate) use retry::call_with_retry;
