use async_trait::async_trait;

use crate::assessment::{
    Answer, AudioRef, ContentAssessment, Question, RawContentPayload, RawSpeechPayload,
    SourceError, SpeechAssessment,
};
use crate::orchestrator::types::{AdapterReport, NarrationRequest};

/// External pronunciation-analysis service.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn analyze_pronunciation(
        &self,
        audio: &AudioRef,
        expected_text: &str,
    ) -> Result<RawSpeechPayload, SourceError>;
}

/// External language-model grader.
#[async_trait]
pub trait ContentGrader: Send + Sync {
    async fn grade_content(
        &self,
        question: &Question,
        transcript: &str,
    ) -> Result<RawContentPayload, SourceError>;
}

/// Writes free-text coaching feedback for a whole session.
#[async_trait]
pub trait SessionNarrator: Send + Sync {
    async fn narrate(&self, request: &NarrationRequest) -> Result<String, SourceError>;
}

/// Produces a normalised pronunciation assessment for one answer.
#[async_trait]
pub trait SpeechAssessor: Send + Sync {
    async fn assess(&self, answer: &Answer) -> AdapterReport<SpeechAssessment>;
}

/// Produces a normalised content assessment for one answer.
#[async_trait]
pub trait ContentAssessor: Send + Sync {
    async fn assess(&self, answer: &Answer, question: &Question)
        -> AdapterReport<ContentAssessment>;
}
