use std::path::PathBuf;
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{FailureKind, SourceError};

/// Kind of prompt presented to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    QuestionAnswering,
    ImageDescription,
}

impl Default for QuestionKind {
    fn default() -> Self {
        QuestionKind::QuestionAnswering
    }
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::QuestionAnswering => "question-answering",
            QuestionKind::ImageDescription => "image-description",
        }
    }
}

/// A prompt issued to the learner. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub topic_hints: Vec<String>,
    #[serde(default = "Question::default_difficulty")]
    pub difficulty: String,
}

impl Question {
    pub fn new<I: Into<String>, P: Into<String>>(id: I, prompt: P) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind: QuestionKind::QuestionAnswering,
            image_url: None,
            topic_hints: Vec::new(),
            difficulty: Self::default_difficulty(),
        }
    }

    pub fn image_description<I: Into<String>, P: Into<String>, U: Into<String>>(
        id: I,
        prompt: P,
        image_url: U,
    ) -> Self {
        Self {
            kind: QuestionKind::ImageDescription,
            image_url: Some(image_url.into()),
            ..Self::new(id, prompt)
        }
    }

    pub fn with_topic_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topic_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    fn default_difficulty() -> String {
        "intermediate".to_string()
    }
}

/// Where the recorded audio for an answer lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum AudioRef {
    Inline(Bytes),
    File(PathBuf),
}

impl Default for AudioRef {
    fn default() -> Self {
        AudioRef::Inline(Bytes::new())
    }
}

impl AudioRef {
    /// Resolves the payload bytes, reading from disk when needed.
    pub async fn load(&self) -> std::io::Result<Bytes> {
        match self {
            AudioRef::Inline(bytes) => Ok(bytes.clone()),
            AudioRef::File(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AudioRef::Inline(bytes) => format!("inline:{}B", bytes.len()),
            AudioRef::File(path) => format!("file:{}", path.display()),
        }
    }
}

/// One learner submission. Created at submission time and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub transcript: String,
    #[serde(skip_serializing, default)]
    pub audio: AudioRef,
    pub submitted_at: SystemTime,
}

impl Answer {
    pub fn new<S: Into<String>>(question: &Question, transcript: S, audio: AudioRef) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question_id: question.id.clone(),
            transcript: transcript.into(),
            audio,
            submitted_at: SystemTime::now(),
        }
    }
}

/// The two independent assessment sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Speech,
    Content,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Speech => "speech",
            SourceKind::Content => "content",
        }
    }
}

/// Scored dimensions, in the fixed order used to break ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Accuracy,
    Fluency,
    Prosody,
    Vocabulary,
    Grammar,
    Relevance,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Accuracy,
        Dimension::Fluency,
        Dimension::Prosody,
        Dimension::Vocabulary,
        Dimension::Grammar,
        Dimension::Relevance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Accuracy => "accuracy",
            Dimension::Fluency => "fluency",
            Dimension::Prosody => "prosody",
            Dimension::Vocabulary => "vocabulary",
            Dimension::Grammar => "grammar",
            Dimension::Relevance => "relevance",
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            Dimension::Accuracy | Dimension::Fluency | Dimension::Prosody => SourceKind::Speech,
            Dimension::Vocabulary | Dimension::Grammar | Dimension::Relevance => {
                SourceKind::Content
            }
        }
    }
}

/// Record of a raw value that was pulled back into the 0-100 range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampRecord {
    pub field: String,
    pub raw: f64,
    pub clamped_to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeScore {
    pub phoneme: String,
    pub score: f64,
}

/// Normalised pronunciation result for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechAssessment {
    pub overall: f64,
    pub accuracy: Option<f64>,
    pub fluency: Option<f64>,
    pub prosody: Option<f64>,
    #[serde(default)]
    pub phonemes: Vec<PhonemeScore>,
    #[serde(default)]
    pub clamped: Vec<ClampRecord>,
}

impl SpeechAssessment {
    pub fn dimension(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Accuracy => self.accuracy,
            Dimension::Fluency => self.fluency,
            Dimension::Prosody => self.prosody,
            _ => None,
        }
    }
}

/// Normalised content result for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAssessment {
    pub overall: f64,
    pub vocabulary: Option<f64>,
    pub grammar: Option<f64>,
    pub relevance: Option<f64>,
    pub feedback: String,
    /// Grader's own 0-5 grade, kept for display only.
    #[serde(default)]
    pub reported_grade: Option<f64>,
    #[serde(default)]
    pub clamped: Vec<ClampRecord>,
}

impl ContentAssessment {
    pub fn dimension(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Vocabulary => self.vocabulary,
            Dimension::Grammar => self.grammar,
            Dimension::Relevance => self.relevance,
            _ => None,
        }
    }
}

/// Where a sub-assessment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Fallback,
    Missing,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Live => "live",
            Provenance::Fallback => "fallback",
            Provenance::Missing => "missing",
        }
    }
}

/// Failure attached to a side that ended up without a live assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

impl SourceFailure {
    pub fn from_error(error: &SourceError, attempts: u32) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            attempts,
        }
    }
}

/// One side of an [`AssessmentResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome<T> {
    pub provenance: Provenance,
    pub assessment: Option<T>,
    /// Set whenever the live source failed, even if a fallback then succeeded.
    pub failure: Option<SourceFailure>,
}

impl<T> SourceOutcome<T> {
    pub fn live(assessment: T) -> Self {
        Self {
            provenance: Provenance::Live,
            assessment: Some(assessment),
            failure: None,
        }
    }

    pub fn fallback(assessment: T, failure: SourceFailure) -> Self {
        Self {
            provenance: Provenance::Fallback,
            assessment: Some(assessment),
            failure: Some(failure),
        }
    }

    pub fn missing(failure: SourceFailure) -> Self {
        Self {
            provenance: Provenance::Missing,
            assessment: None,
            failure: Some(failure),
        }
    }

    pub fn is_available(&self) -> bool {
        self.assessment.is_some()
    }
}

/// Relative weight of each source in the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub speech: f64,
    pub content: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            speech: 0.5,
            content: 0.5,
        }
    }
}

impl ScoreWeights {
    pub fn is_valid(&self) -> bool {
        self.speech.is_finite()
            && self.content.is_finite()
            && self.speech >= 0.0
            && self.content >= 0.0
            && self.speech + self.content > 0.0
    }

    /// Weighted average of both overall scores.
    pub fn blend(&self, speech: f64, content: f64) -> f64 {
        let total = self.speech + self.content;
        (speech * self.speech + content * self.content) / total
    }
}

/// Merged outcome for one answer, produced by the orchestrator.
///
/// Fields are private so the combined score can only ever be derived from the
/// two outcomes through [`AssessmentResult::combine`]. Deserialised results are
/// checked against their outcomes before they are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredResult")]
pub struct AssessmentResult {
    sequence: u64,
    question: Question,
    answer: Answer,
    speech: SourceOutcome<SpeechAssessment>,
    content: SourceOutcome<ContentAssessment>,
    combined_score: Option<f64>,
}

impl AssessmentResult {
    pub fn combine(
        sequence: u64,
        question: Question,
        answer: Answer,
        speech: SourceOutcome<SpeechAssessment>,
        content: SourceOutcome<ContentAssessment>,
        weights: &ScoreWeights,
    ) -> Self {
        let combined_score = combined_score(&speech, &content, weights);
        Self {
            sequence,
            question,
            answer,
            speech,
            content,
            combined_score,
        }
    }

    /// 1-based position of this result within its session.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn speech(&self) -> &SourceOutcome<SpeechAssessment> {
        &self.speech
    }

    pub fn content(&self) -> &SourceOutcome<ContentAssessment> {
        &self.content
    }

    /// `None` means the answer could not be assessed at all, which is not a zero.
    pub fn combined_score(&self) -> Option<f64> {
        self.combined_score
    }

    pub fn is_assessed(&self) -> bool {
        self.combined_score.is_some()
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<f64> {
        match dimension.source() {
            SourceKind::Speech => self
                .speech
                .assessment
                .as_ref()
                .and_then(|speech| speech.dimension(dimension)),
            SourceKind::Content => self
                .content
                .assessment
                .as_ref()
                .and_then(|content| content.dimension(dimension)),
        }
    }

    /// Learner-facing one-line status for this answer.
    pub fn status_message(&self) -> String {
        match (self.combined_score, self.speech.provenance, self.content.provenance) {
            (None, _, _) => "Assessment unavailable for this answer. Please try again.".to_string(),
            (Some(score), Provenance::Missing, _) => {
                format!("Score {score:.1} (content only; pronunciation could not be assessed)")
            }
            (Some(score), _, Provenance::Missing) => {
                format!("Score {score:.1} (pronunciation only; content could not be assessed)")
            }
            (Some(score), _, _) => format!("Score {score:.1}"),
        }
    }
}

const SCORE_TOLERANCE: f64 = 1e-6;

/// Serialised form of [`AssessmentResult`], validated on the way in.
#[derive(Deserialize)]
struct StoredResult {
    sequence: u64,
    question: Question,
    answer: Answer,
    speech: SourceOutcome<SpeechAssessment>,
    content: SourceOutcome<ContentAssessment>,
    combined_score: Option<f64>,
}

impl TryFrom<StoredResult> for AssessmentResult {
    type Error = String;

    fn try_from(stored: StoredResult) -> Result<Self, Self::Error> {
        let overalls: Vec<f64> = stored
            .speech
            .assessment
            .as_ref()
            .map(|speech| speech.overall)
            .into_iter()
            .chain(stored.content.assessment.as_ref().map(|content| content.overall))
            .collect();

        match (stored.combined_score, overalls.is_empty()) {
            (None, true) => {}
            (Some(score), true) => {
                return Err(format!(
                    "result {} has combined score {score} but no source assessment",
                    stored.sequence
                ))
            }
            (None, false) => {
                return Err(format!(
                    "result {} has a source assessment but no combined score",
                    stored.sequence
                ))
            }
            (Some(score), false) => {
                let low = overalls.iter().copied().fold(f64::INFINITY, f64::min);
                let high = overalls.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let in_range = score.is_finite()
                    && (0.0..=100.0).contains(&score)
                    && score >= low - SCORE_TOLERANCE
                    && score <= high + SCORE_TOLERANCE;
                if !in_range {
                    return Err(format!(
                        "result {} has combined score {score} outside its sources [{low}, {high}]",
                        stored.sequence
                    ));
                }
            }
        }

        Ok(Self {
            sequence: stored.sequence,
            question: stored.question,
            answer: stored.answer,
            speech: stored.speech,
            content: stored.content,
            combined_score: stored.combined_score,
        })
    }
}

fn combined_score(
    speech: &SourceOutcome<SpeechAssessment>,
    content: &SourceOutcome<ContentAssessment>,
    weights: &ScoreWeights,
) -> Option<f64> {
    match (&speech.assessment, &content.assessment) {
        (Some(speech), Some(content)) => Some(weights.blend(speech.overall, content.overall)),
        (Some(speech), None) => Some(speech.overall),
        (None, Some(content)) => Some(content.overall),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech(overall: f64) -> SpeechAssessment {
        SpeechAssessment {
            overall,
            accuracy: Some(overall),
            fluency: None,
            prosody: None,
            phonemes: Vec::new(),
            clamped: Vec::new(),
        }
    }

    fn content(overall: f64) -> ContentAssessment {
        ContentAssessment {
            overall,
            vocabulary: Some(overall),
            grammar: None,
            relevance: None,
            feedback: String::new(),
            reported_grade: None,
            clamped: Vec::new(),
        }
    }

    fn failure(kind: FailureKind) -> SourceFailure {
        SourceFailure {
            kind,
            message: "boom".into(),
            attempts: 3,
        }
    }

    fn result(
        speech: SourceOutcome<SpeechAssessment>,
        content: SourceOutcome<ContentAssessment>,
        weights: ScoreWeights,
    ) -> AssessmentResult {
        let question = Question::new("q1", "Describe your hometown.");
        let answer = Answer::new(&question, "It is small.", AudioRef::Inline(Bytes::new()));
        AssessmentResult::combine(1, question, answer, speech, content, &weights)
    }

    #[test]
    fn both_sources_blend_with_weights() {
        let merged = result(
            SourceOutcome::live(speech(80.0)),
            SourceOutcome::live(content(60.0)),
            ScoreWeights::default(),
        );
        assert_eq!(merged.combined_score(), Some(70.0));

        let skewed = result(
            SourceOutcome::live(speech(80.0)),
            SourceOutcome::live(content(60.0)),
            ScoreWeights {
                speech: 3.0,
                content: 1.0,
            },
        );
        assert_eq!(skewed.combined_score(), Some(75.0));
    }

    #[test]
    fn single_source_uses_its_score_alone() {
        let merged = result(
            SourceOutcome::live(speech(80.0)),
            SourceOutcome::missing(failure(FailureKind::SourceTimeout)),
            ScoreWeights::default(),
        );
        assert_eq!(merged.combined_score(), Some(80.0));
        assert_eq!(merged.content().provenance, Provenance::Missing);
        assert!(merged.status_message().contains("pronunciation only"));
    }

    #[test]
    fn no_sources_leaves_score_absent() {
        let merged = result(
            SourceOutcome::missing(failure(FailureKind::SourceUnavailable)),
            SourceOutcome::missing(failure(FailureKind::SourceRejected)),
            ScoreWeights::default(),
        );
        assert_eq!(merged.combined_score(), None);
        assert!(!merged.is_assessed());
        assert!(merged.status_message().contains("unavailable"));
    }

    #[test]
    fn dimensions_route_to_their_source() {
        let merged = result(
            SourceOutcome::live(speech(90.0)),
            SourceOutcome::missing(failure(FailureKind::MalformedSourceData)),
            ScoreWeights::default(),
        );
        assert_eq!(merged.dimension(Dimension::Accuracy), Some(90.0));
        assert_eq!(merged.dimension(Dimension::Fluency), None);
        assert_eq!(merged.dimension(Dimension::Vocabulary), None);
    }

    #[test]
    fn stored_results_must_match_their_sources() {
        let merged = result(
            SourceOutcome::live(speech(80.0)),
            SourceOutcome::live(content(60.0)),
            ScoreWeights::default(),
        );
        let stored = serde_json::to_value(&merged).expect("serialise");
        let restored: AssessmentResult = serde_json::from_value(stored).expect("consistent");
        assert_eq!(restored.combined_score(), Some(70.0));

        let unassessed = result(
            SourceOutcome::missing(failure(FailureKind::SourceUnavailable)),
            SourceOutcome::missing(failure(FailureKind::SourceTimeout)),
            ScoreWeights::default(),
        );
        let mut zeroed = serde_json::to_value(&unassessed).expect("serialise");
        zeroed["combined_score"] = serde_json::json!(0.0);
        let error = serde_json::from_value::<AssessmentResult>(zeroed).expect_err("no sources");
        assert!(error.to_string().contains("no source assessment"));

        let mut dropped = serde_json::to_value(&merged).expect("serialise");
        dropped["combined_score"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<AssessmentResult>(dropped).is_err());

        let mut inflated = serde_json::to_value(&merged).expect("serialise");
        inflated["combined_score"] = serde_json::json!(95.0);
        assert!(serde_json::from_value::<AssessmentResult>(inflated).is_err());
    }

    #[test]
    fn invalid_weights_are_detected() {
        assert!(ScoreWeights::default().is_valid());
        assert!(!ScoreWeights {
            speech: 0.0,
            content: 0.0
        }
        .is_valid());
        assert!(!ScoreWeights {
            speech: -1.0,
            content: 2.0
        }
        .is_valid());
        assert!(!ScoreWeights {
            speech: f64::NAN,
            content: 1.0
        }
        .is_valid());
    }
}
