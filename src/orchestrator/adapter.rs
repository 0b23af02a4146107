use std::sync::Arc;

use async_trait::async_trait;

use crate::assessment::{
    normalize_content, normalize_speech, Answer, ClampRecord, ContentAssessment, Question,
    SourceKind, SpeechAssessment,
};
use crate::orchestrator::config::AdapterConfig;
use crate::orchestrator::retry::call_with_retry;
use crate::orchestrator::traits::{ContentAssessor, ContentGrader, SpeechAssessor, SpeechProvider};
use crate::orchestrator::types::AdapterReport;
use crate::telemetry::events::record_score_clamped;

/// Wraps a [`SpeechProvider`] with timeout, retry and normalisation.
///
/// Stateless apart from read-only configuration, so one instance can serve
/// any number of sessions concurrently.
#[derive(Clone)]
pub struct SpeechAssessmentAdapter {
    provider: Arc<dyn SpeechProvider>,
    config: AdapterConfig,
}

impl SpeechAssessmentAdapter {
    pub fn new(provider: Arc<dyn SpeechProvider>, config: AdapterConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }
}

#[async_trait]
impl SpeechAssessor for SpeechAssessmentAdapter {
    async fn assess(&self, answer: &Answer) -> AdapterReport<SpeechAssessment> {
        let report = call_with_retry(SourceKind::Speech, &self.config, || {
            self.provider
                .analyze_pronunciation(&answer.audio, &answer.transcript)
        })
        .await
        .and_then(normalize_speech);

        if let Ok(assessment) = &report.outcome {
            emit_clamps(SourceKind::Speech, &assessment.clamped);
        }
        report
    }
}

/// Wraps a [`ContentGrader`] with timeout, retry and normalisation.
#[derive(Clone)]
pub struct ContentGradingAdapter {
    grader: Arc<dyn ContentGrader>,
    config: AdapterConfig,
}

impl ContentGradingAdapter {
    pub fn new(grader: Arc<dyn ContentGrader>, config: AdapterConfig) -> Self {
        Self { grader, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }
}

#[async_trait]
impl ContentAssessor for ContentGradingAdapter {
    async fn assess(
        &self,
        answer: &Answer,
        question: &Question,
    ) -> AdapterReport<ContentAssessment> {
        let report = call_with_retry(SourceKind::Content, &self.config, || {
            self.grader.grade_content(question, &answer.transcript)
        })
        .await
        .and_then(normalize_content);

        if let Ok(assessment) = &report.outcome {
            emit_clamps(SourceKind::Content, &assessment.clamped);
        }
        report
    }
}

fn emit_clamps(source: SourceKind, clamped: &[ClampRecord]) {
    for record in clamped {
        record_score_clamped(source, record);
    }
}
