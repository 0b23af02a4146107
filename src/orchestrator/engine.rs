use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::assessment::{
    Answer, AssessmentResult, ContentAssessment, FailureKind, Question, SourceFailure, SourceKind,
    SourceOutcome, SpeechAssessment,
};
use crate::config::ConfigError;
use crate::orchestrator::adapter::{ContentGradingAdapter, SpeechAssessmentAdapter};
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::constants::TARGET;
use crate::orchestrator::traits::{ContentAssessor, ContentGrader, SpeechAssessor, SpeechProvider};
use crate::orchestrator::types::AdapterReport;
use crate::telemetry::events::{record_assessment_completed, record_source_failure};

/// Drives both assessment sources for one answer and merges their outcomes.
pub struct AssessmentOrchestrator {
    config: OrchestratorConfig,
    speech: Arc<dyn SpeechAssessor>,
    content: Arc<dyn ContentAssessor>,
    speech_fallback: Option<Arc<dyn SpeechAssessor>>,
    content_fallback: Option<Arc<dyn ContentAssessor>>,
}

/// Read-only description of how the orchestrator is wired.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorProfile {
    pub config: OrchestratorConfig,
    pub speech_fallback: bool,
    pub content_fallback: bool,
}

impl AssessmentOrchestrator {
    /// Builds live adapters around the given providers.
    pub fn new(
        config: OrchestratorConfig,
        speech_provider: Arc<dyn SpeechProvider>,
        grader: Arc<dyn ContentGrader>,
    ) -> Result<Self, ConfigError> {
        let speech = SpeechAssessmentAdapter::new(speech_provider, config.speech.clone());
        let content = ContentGradingAdapter::new(grader, config.content.clone());
        Self::with_assessors(config, Arc::new(speech), Arc::new(content))
    }

    pub fn with_assessors(
        config: OrchestratorConfig,
        speech: Arc<dyn SpeechAssessor>,
        content: Arc<dyn ContentAssessor>,
    ) -> Result<Self, ConfigError> {
        if !config.weights.is_valid() {
            return Err(ConfigError::InvalidWeights);
        }

        Ok(Self {
            config,
            speech,
            content,
            speech_fallback: None,
            content_fallback: None,
        })
    }

    /// Consulted only after the live speech source fails terminally.
    pub fn with_speech_fallback(mut self, fallback: Arc<dyn SpeechAssessor>) -> Self {
        self.speech_fallback = Some(fallback);
        self
    }

    /// Consulted only after the live content source fails terminally.
    pub fn with_content_fallback(mut self, fallback: Arc<dyn ContentAssessor>) -> Self {
        self.content_fallback = Some(fallback);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn profile(&self) -> OrchestratorProfile {
        OrchestratorProfile {
            config: self.config.clone(),
            speech_fallback: self.speech_fallback.is_some(),
            content_fallback: self.content_fallback.is_some(),
        }
    }

    /// Produces exactly one result for `answer`. Both sources run as separate
    /// tasks; if the caller stops waiting, the tasks still run to completion
    /// or timeout and their output is dropped.
    pub async fn assess(
        &self,
        sequence: u64,
        question: &Question,
        answer: Answer,
    ) -> AssessmentResult {
        let started = Instant::now();
        let answer = Arc::new(answer);
        let question = Arc::new(question.clone());

        let speech_task = {
            let live = Arc::clone(&self.speech);
            let fallback = self.speech_fallback.clone();
            let answer = Arc::clone(&answer);
            tokio::spawn(async move {
                resolve_side(
                    SourceKind::Speech,
                    &answer.id,
                    live.assess(&answer),
                    fallback.as_ref().map(|fallback| {
                        let answer = Arc::clone(&answer);
                        let fallback = Arc::clone(fallback);
                        move || async move { fallback.assess(&answer).await }
                    }),
                )
                .await
            })
        };

        let content_task = {
            let live = Arc::clone(&self.content);
            let fallback = self.content_fallback.clone();
            let answer = Arc::clone(&answer);
            let question = Arc::clone(&question);
            tokio::spawn(async move {
                resolve_side(
                    SourceKind::Content,
                    &answer.id,
                    live.assess(&answer, &question),
                    fallback.as_ref().map(|fallback| {
                        let answer = Arc::clone(&answer);
                        let question = Arc::clone(&question);
                        let fallback = Arc::clone(fallback);
                        move || async move { fallback.assess(&answer, &question).await }
                    }),
                )
                .await
            })
        };

        let (speech, content) = tokio::join!(speech_task, content_task);
        let speech: SourceOutcome<SpeechAssessment> =
            settle(SourceKind::Speech, &answer.id, speech);
        let content: SourceOutcome<ContentAssessment> =
            settle(SourceKind::Content, &answer.id, content);

        let answer = Arc::unwrap_or_clone(answer);
        let question = Arc::unwrap_or_clone(question);
        let result = AssessmentResult::combine(
            sequence,
            question,
            answer,
            speech,
            content,
            &self.config.weights,
        );

        record_assessment_completed(
            &result.answer().id,
            sequence,
            result.speech().provenance,
            result.content().provenance,
            result.combined_score(),
            started.elapsed(),
        );

        result
    }
}

async fn resolve_side<T, L, F, FFut>(
    source: SourceKind,
    answer_id: &str,
    live: L,
    fallback: Option<F>,
) -> SourceOutcome<T>
where
    L: Future<Output = AdapterReport<T>>,
    F: FnOnce() -> FFut,
    FFut: Future<Output = AdapterReport<T>>,
{
    let report = live.await;
    let error = match report.outcome {
        Ok(assessment) => return SourceOutcome::live(assessment),
        Err(error) => error,
    };

    let failure = SourceFailure::from_error(&error, report.attempts);
    record_source_failure(
        answer_id,
        source,
        failure.kind,
        failure.attempts,
        &failure.message,
    );

    let Some(fallback) = fallback else {
        return SourceOutcome::missing(failure);
    };

    let fallback_report = fallback().await;
    match fallback_report.outcome {
        Ok(assessment) => {
            info!(
                target: TARGET,
                source = source.as_str(),
                answer_id,
                "using fallback assessment"
            );
            SourceOutcome::fallback(assessment, failure)
        }
        Err(fallback_error) => {
            record_source_failure(
                answer_id,
                source,
                fallback_error.kind(),
                fallback_report.attempts,
                &fallback_error.to_string(),
            );
            SourceOutcome::missing(failure)
        }
    }
}

fn settle<T>(
    source: SourceKind,
    answer_id: &str,
    joined: Result<SourceOutcome<T>, JoinError>,
) -> SourceOutcome<T> {
    match joined {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                target: TARGET,
                source = source.as_str(),
                answer_id,
                %err,
                "assessment task terminated abnormally"
            );
            SourceOutcome::missing(SourceFailure {
                kind: FailureKind::SourceUnavailable,
                message: format!("assessment task terminated: {err}"),
                attempts: 0,
            })
        }
    }
}
