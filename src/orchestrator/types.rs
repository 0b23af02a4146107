use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::assessment::{Dimension, SourceError};

/// What an adapter produced for one answer, with how hard it tried.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterReport<T> {
    pub outcome: Result<T, SourceError>,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl<T> AdapterReport<T> {
    pub fn succeeded(value: T, attempts: u32, elapsed: Duration) -> Self {
        Self {
            outcome: Ok(value),
            attempts,
            elapsed,
        }
    }

    pub fn failed(error: SourceError, attempts: u32, elapsed: Duration) -> Self {
        Self {
            outcome: Err(error),
            attempts,
            elapsed,
        }
    }

    /// Chains a fallible step (such as normalisation) onto a successful call.
    pub fn and_then<U, F>(self, f: F) -> AdapterReport<U>
    where
        F: FnOnce(T) -> Result<U, SourceError>,
    {
        AdapterReport {
            outcome: self.outcome.and_then(f),
            attempts: self.attempts,
            elapsed: self.elapsed,
        }
    }
}

/// Material handed to a narrator to write session-level coaching feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub entries: Vec<NarrationEntry>,
    pub aggregate_score: Option<f64>,
    pub averages: Vec<(Dimension, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationEntry {
    pub question: String,
    pub transcript: String,
    pub feedback: Option<String>,
}
