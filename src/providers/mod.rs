//! Concrete assessment sources.

mod http;

pub mod azure;
pub mod heuristic;
pub mod ollama;

pub use azure::AzureSpeechProvider;
pub use heuristic::HeuristicContentGrader;
pub use ollama::OllamaGrader;
