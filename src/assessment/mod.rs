//! Assessment data model, error taxonomy and score normalisation.

pub mod error;
pub mod normalizer;
pub mod types;

pub use error::{FailureKind, SessionError, SourceError};
pub use normalizer::{
    normalize, normalize_content, normalize_speech, NormalizedAssessment, RawContentPayload,
    RawPayload, RawPhoneme, RawSpeechPayload,
};
pub use types::{
    Answer, AssessmentResult, AudioRef, ClampRecord, ContentAssessment, Dimension, PhonemeScore,
    Provenance, Question, QuestionKind, ScoreWeights, SourceFailure, SourceKind, SourceOutcome,
    SpeechAssessment,
};
