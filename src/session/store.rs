//! Append-only storage for one learner's practice run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::assessment::{AssessmentResult, SessionError};

/// Ordered results of one practice run.
///
/// Submissions are serialised through `turn`: the holder of the turn owns the
/// next sequence number until it commits or drops the turn. Readers never
/// wait on a submission in flight.
#[derive(Debug)]
pub struct PracticeSession {
    id: String,
    started_at: SystemTime,
    turn: Mutex<u64>,
    results: RwLock<Vec<AssessmentResult>>,
    abandoned: AtomicBool,
}

/// Exclusive right to append the next result.
pub(crate) struct Turn<'a> {
    session: &'a PracticeSession,
    committed: MutexGuard<'a, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub started_at: SystemTime,
    pub results: usize,
    pub abandoned: bool,
}

impl PracticeSession {
    pub fn new() -> Self {
        Self::with_results(Uuid::new_v4().to_string(), Vec::new())
    }

    /// Rebuilds a session from results held by an outer storage layer. The
    /// results must be numbered 1..=n in order.
    pub fn restore<S: Into<String>>(
        id: S,
        results: Vec<AssessmentResult>,
    ) -> Result<Self, SessionError> {
        for (index, result) in results.iter().enumerate() {
            let expected = index as u64 + 1;
            if result.sequence() != expected {
                return Err(SessionError::OrderingViolation {
                    expected,
                    actual: result.sequence(),
                });
            }
        }
        Ok(Self::with_results(id.into(), results))
    }

    fn with_results(id: String, results: Vec<AssessmentResult>) -> Self {
        Self {
            id,
            started_at: SystemTime::now(),
            turn: Mutex::new(results.len() as u64),
            results: RwLock::new(results),
            abandoned: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Snapshot of the results in submission order.
    pub fn results(&self) -> Vec<AssessmentResult> {
        self.results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting answers. Assessments already in flight finish on their
    /// own but their results are dropped.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            started_at: self.started_at,
            results: self.len(),
            abandoned: self.is_abandoned(),
        }
    }

    /// Waits for earlier submissions to finish, then hands out the next slot.
    pub(crate) async fn begin_turn(&self) -> Result<Turn<'_>, SessionError> {
        self.ensure_active()?;
        let committed = self.turn.lock().await;
        self.ensure_active()?;
        Ok(Turn {
            session: self,
            committed,
        })
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_abandoned() {
            return Err(SessionError::Abandoned {
                session_id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn append(&self, result: AssessmentResult) -> Result<(), SessionError> {
        let mut results = self
            .results
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let committed = results.len() as u64;
        let sequence = result.sequence();
        if sequence <= committed {
            return Err(SessionError::ResultAlreadyFinalized { sequence });
        }
        if sequence != committed + 1 {
            return Err(SessionError::OrderingViolation {
                expected: committed + 1,
                actual: sequence,
            });
        }
        results.push(result);
        Ok(())
    }
}

impl Default for PracticeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Turn<'_> {
    pub(crate) fn sequence(&self) -> u64 {
        *self.committed + 1
    }

    /// Appends `result` unless the session was abandoned while it was being
    /// assessed.
    pub(crate) fn commit(mut self, result: AssessmentResult) -> Result<(), SessionError> {
        self.session.ensure_active()?;
        self.session.append(result)?;
        *self.committed += 1;
        Ok(())
    }
}
