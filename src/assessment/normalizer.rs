//! Maps provider payloads onto the common 0-100 scoring model.
//!
//! Everything here is pure: no I/O, no logging. Clamping is reported through
//! the `clamped` list on each assessment so callers can emit telemetry.

use serde::{Deserialize, Serialize};

use super::error::SourceError;
use super::types::{ClampRecord, ContentAssessment, PhonemeScore, SpeechAssessment};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;
pub const GRADE_MAX: f64 = 5.0;

const ACCURACY_WEIGHT: f64 = 0.4;
const FLUENCY_WEIGHT: f64 = 0.3;
const PROSODY_WEIGHT: f64 = 0.3;

/// Pronunciation payload as reported by the speech provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpeechPayload {
    pub overall: Option<f64>,
    pub accuracy: Option<f64>,
    pub fluency: Option<f64>,
    pub prosody: Option<f64>,
    #[serde(default)]
    pub phonemes: Vec<RawPhoneme>,
    /// Original response body, kept for diagnostics.
    #[serde(skip)]
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPhoneme {
    pub phoneme: String,
    pub score: f64,
}

/// Content grading payload as reported by the language-model grader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContentPayload {
    pub vocabulary: Option<f64>,
    pub grammar: Option<f64>,
    pub relevance: Option<f64>,
    pub grade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(skip)]
    pub raw: String,
}

/// A raw payload tagged with the source it claims to come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Speech(RawSpeechPayload),
    Content(RawContentPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedAssessment {
    Speech(SpeechAssessment),
    Content(ContentAssessment),
}

/// A single value after range checking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedScore {
    pub value: f64,
    pub clamped: bool,
}

pub fn normalize(payload: RawPayload) -> Result<NormalizedAssessment, SourceError> {
    match payload {
        RawPayload::Speech(raw) => normalize_speech(raw).map(NormalizedAssessment::Speech),
        RawPayload::Content(raw) => normalize_content(raw).map(NormalizedAssessment::Content),
    }
}

/// Rejects non-finite values and clamps everything else into `[min, max]`.
pub fn normalize_score(raw: f64, min: f64, max: f64) -> Option<NormalizedScore> {
    if !raw.is_finite() {
        return None;
    }
    let value = raw.clamp(min, max);
    Some(NormalizedScore {
        value,
        clamped: value != raw,
    })
}

pub fn normalize_speech(raw: RawSpeechPayload) -> Result<SpeechAssessment, SourceError> {
    let mut tracker = ClampTracker::new(&raw.raw);

    let accuracy = tracker.optional("accuracy", raw.accuracy, SCORE_MAX)?;
    let fluency = tracker.optional("fluency", raw.fluency, SCORE_MAX)?;
    let prosody = tracker.optional("prosody", raw.prosody, SCORE_MAX)?;

    let overall = match tracker.optional("overall", raw.overall, SCORE_MAX)? {
        Some(overall) => overall,
        None => derive_speech_overall(accuracy, fluency, prosody).ok_or_else(|| {
            SourceError::malformed("speech payload reported no scores", raw.raw.clone())
        })?,
    };

    let mut phonemes = Vec::with_capacity(raw.phonemes.len());
    for (index, phoneme) in raw.phonemes.into_iter().enumerate() {
        let field = format!("phonemes[{index}].{}", phoneme.phoneme);
        let score = tracker.required(&field, phoneme.score, SCORE_MAX)?;
        phonemes.push(PhonemeScore {
            phoneme: phoneme.phoneme,
            score,
        });
    }

    Ok(SpeechAssessment {
        overall,
        accuracy,
        fluency,
        prosody,
        phonemes,
        clamped: tracker.finish(),
    })
}

pub fn normalize_content(raw: RawContentPayload) -> Result<ContentAssessment, SourceError> {
    let mut tracker = ClampTracker::new(&raw.raw);

    let vocabulary = tracker.optional("vocabulary", raw.vocabulary, SCORE_MAX)?;
    let grammar = tracker.optional("grammar", raw.grammar, SCORE_MAX)?;
    let relevance = tracker.optional("relevance", raw.relevance, SCORE_MAX)?;
    let reported_grade = tracker.optional("grade", raw.grade, GRADE_MAX)?;

    let reported: Vec<f64> = [vocabulary, grammar, relevance]
        .into_iter()
        .flatten()
        .collect();
    if reported.is_empty() {
        return Err(SourceError::malformed(
            "content payload reported no sub-scores",
            raw.raw.clone(),
        ));
    }
    let overall = reported.iter().sum::<f64>() / reported.len() as f64;

    Ok(ContentAssessment {
        overall,
        vocabulary,
        grammar,
        relevance,
        feedback: raw.feedback.unwrap_or_default().trim().to_string(),
        reported_grade,
        clamped: tracker.finish(),
    })
}

fn derive_speech_overall(
    accuracy: Option<f64>,
    fluency: Option<f64>,
    prosody: Option<f64>,
) -> Option<f64> {
    let weighted = [
        (accuracy, ACCURACY_WEIGHT),
        (fluency, FLUENCY_WEIGHT),
        (prosody, PROSODY_WEIGHT),
    ];
    let (sum, weight) = weighted
        .iter()
        .filter_map(|(score, weight)| score.map(|score| (score * weight, *weight)))
        .fold((0.0, 0.0), |(sum, total), (score, weight)| {
            (sum + score, total + weight)
        });

    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

struct ClampTracker<'a> {
    raw: &'a str,
    clamped: Vec<ClampRecord>,
}

impl<'a> ClampTracker<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            clamped: Vec::new(),
        }
    }

    fn optional(
        &mut self,
        field: &str,
        value: Option<f64>,
        max: f64,
    ) -> Result<Option<f64>, SourceError> {
        value
            .map(|value| self.required(field, value, max))
            .transpose()
    }

    fn required(&mut self, field: &str, value: f64, max: f64) -> Result<f64, SourceError> {
        let score = normalize_score(value, SCORE_MIN, max).ok_or_else(|| {
            SourceError::malformed(format!("field `{field}` is not a finite number"), self.raw)
        })?;
        if score.clamped {
            self.clamped.push(ClampRecord {
                field: field.to_string(),
                raw: value,
                clamped_to: score.value,
            });
        }
        Ok(score.value)
    }

    fn finish(self) -> Vec<ClampRecord> {
        self.clamped
    }
}
