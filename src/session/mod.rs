//! Practice sessions and the service surface exposed to applications.

pub mod aggregator;
pub mod store;

pub use aggregator::{
    narration_request, summarize, DimensionAverage, OverallFeedback, SessionSummary, Trend,
};
pub use store::{PracticeSession, SessionInfo};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assessment::{
    AssessmentResult, AudioRef, Answer, Provenance, Question, SessionError, SourceKind,
};
use crate::orchestrator::{
    call_with_retry, AdapterConfig, AssessmentOrchestrator, OrchestratorProfile, SessionNarrator,
};
use crate::telemetry::events::{duration_to_ms, record_feedback_generated, record_narration_failure};

const TARGET: &str = "practice_session";

/// Entry point for applications: submits answers, reads results and builds
/// feedback. One service can drive any number of sessions.
pub struct PracticeService {
    orchestrator: Arc<AssessmentOrchestrator>,
    narrator: Option<Arc<dyn SessionNarrator>>,
    narration: AdapterConfig,
}

/// Session feedback with a free-text coaching narrative attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachingFeedback {
    pub overall: OverallFeedback,
    pub narrative: Option<String>,
    /// `Live` when written by the narrator, `Fallback` when the deterministic
    /// summary text was used, `Missing` when there was nothing to narrate.
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceProfile {
    pub orchestrator: OrchestratorProfile,
    pub narrator: bool,
    pub narration: AdapterConfig,
}

impl PracticeService {
    pub fn new(orchestrator: AssessmentOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            narrator: None,
            narration: AdapterConfig::grader(),
        }
    }

    pub fn with_narrator(
        mut self,
        narrator: Arc<dyn SessionNarrator>,
        config: AdapterConfig,
    ) -> Self {
        self.narrator = Some(narrator);
        self.narration = config;
        self
    }

    pub fn start_session(&self) -> Arc<PracticeSession> {
        let session = Arc::new(PracticeSession::new());
        info!(target: TARGET, session_id = session.id(), "practice session started");
        session
    }

    /// Assesses one answer and appends the result to `session`.
    ///
    /// Submissions to the same session are processed one at a time in the
    /// order they arrive. Source failures never surface here; they show up as
    /// provenance on the returned result.
    pub async fn submit_answer<T: Into<String>>(
        &self,
        session: &PracticeSession,
        question: &Question,
        transcript: T,
        audio: AudioRef,
    ) -> Result<AssessmentResult, SessionError> {
        let answer = Answer::new(question, transcript, audio);
        let turn = session.begin_turn().await?;
        let sequence = turn.sequence();

        debug!(
            target: TARGET,
            session_id = session.id(),
            answer_id = %answer.id,
            sequence,
            question_id = %question.id,
            "assessing answer"
        );

        let result = self.orchestrator.assess(sequence, question, answer).await;

        if let Err(err) = turn.commit(result.clone()) {
            warn!(
                target: TARGET,
                session_id = session.id(),
                sequence,
                %err,
                "assessment result discarded"
            );
            return Err(err);
        }
        Ok(result)
    }

    /// Deterministic summary of the session so far. Safe to call at any time.
    pub fn overall_feedback(&self, session: &PracticeSession) -> OverallFeedback {
        summarize(&session.results())
    }

    pub fn session_results(&self, session: &PracticeSession) -> Vec<AssessmentResult> {
        session.results()
    }

    /// Summary plus a narrative from the configured narrator, falling back to
    /// the summary's own text when the narrator is absent or fails.
    pub async fn coaching_feedback(&self, session: &PracticeSession) -> CoachingFeedback {
        let results = session.results();
        let overall = summarize(&results);

        let Some(summary) = overall.summary() else {
            record_feedback_generated(session.id(), 0, 0, Provenance::Missing);
            return CoachingFeedback {
                overall,
                narrative: None,
                provenance: Provenance::Missing,
            };
        };

        let (narrative, provenance) = match &self.narrator {
            Some(narrator) if summary.answers_assessed > 0 => {
                let request = narration_request(&results, summary);
                let report = call_with_retry(SourceKind::Content, &self.narration, || {
                    narrator.narrate(&request)
                })
                .await;
                match report.outcome {
                    Ok(text) => {
                        debug!(
                            target: TARGET,
                            session_id = session.id(),
                            elapsed_ms = duration_to_ms(report.elapsed),
                            "narrative generated"
                        );
                        (text, Provenance::Live)
                    }
                    Err(err) => {
                        record_narration_failure(
                            session.id(),
                            err.kind(),
                            report.attempts,
                            &err.to_string(),
                        );
                        (summary.narrative.clone(), Provenance::Fallback)
                    }
                }
            }
            _ => (summary.narrative.clone(), Provenance::Fallback),
        };

        record_feedback_generated(
            session.id(),
            summary.answers_total,
            summary.answers_assessed,
            provenance,
        );

        CoachingFeedback {
            overall: overall.clone(),
            narrative: Some(narrative),
            provenance,
        }
    }

    pub fn describe(&self) -> ServiceProfile {
        ServiceProfile {
            orchestrator: self.orchestrator.profile(),
            narrator: self.narrator.is_some(),
            narration: self.narration.clone(),
        }
    }
}
