//! Session-level summary derived from the ordered assessment results.

use serde::{Deserialize, Serialize};

use crate::assessment::{AssessmentResult, Dimension};
use crate::orchestrator::{NarrationEntry, NarrationRequest};

/// Minimum change in mean score between session halves that counts as a trend.
pub const TREND_THRESHOLD: f64 = 5.0;
const MAX_HIGHLIGHTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OverallFeedback {
    /// The session has no results yet.
    NoData,
    Summary(SessionSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub answers_total: usize,
    pub answers_assessed: usize,
    /// Mean of the available combined scores; `None` when no answer could be
    /// assessed.
    pub aggregate_score: Option<f64>,
    pub dimensions: Vec<DimensionAverage>,
    pub strengths: Vec<Dimension>,
    pub areas_to_improve: Vec<Dimension>,
    pub trend: Trend,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionAverage {
    pub dimension: Dimension,
    pub average: Option<f64>,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Steady,
    Insufficient,
}

impl OverallFeedback {
    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            OverallFeedback::NoData => None,
            OverallFeedback::Summary(summary) => Some(summary),
        }
    }
}

/// Folds results into feedback. Pure: identical input gives identical output.
pub fn summarize(results: &[AssessmentResult]) -> OverallFeedback {
    if results.is_empty() {
        return OverallFeedback::NoData;
    }

    let scores: Vec<f64> = results
        .iter()
        .filter_map(AssessmentResult::combined_score)
        .collect();

    let dimensions: Vec<DimensionAverage> = Dimension::ALL
        .iter()
        .map(|&dimension| {
            let values: Vec<f64> = results
                .iter()
                .filter_map(|result| result.dimension(dimension))
                .collect();
            DimensionAverage {
                dimension,
                average: mean(&values),
                samples: values.len(),
            }
        })
        .collect();

    let (strengths, areas_to_improve) = highlights(&dimensions);
    let trend = trend(&scores);

    let mut summary = SessionSummary {
        answers_total: results.len(),
        answers_assessed: scores.len(),
        aggregate_score: mean(&scores),
        dimensions,
        strengths,
        areas_to_improve,
        trend,
        narrative: String::new(),
    };
    summary.narrative = narrative(&summary);
    OverallFeedback::Summary(summary)
}

/// Material for an external narrator, in submission order.
pub fn narration_request(
    results: &[AssessmentResult],
    summary: &SessionSummary,
) -> NarrationRequest {
    NarrationRequest {
        entries: results
            .iter()
            .map(|result| NarrationEntry {
                question: result.question().prompt.clone(),
                transcript: result.answer().transcript.clone(),
                feedback: result
                    .content()
                    .assessment
                    .as_ref()
                    .map(|content| content.feedback.clone())
                    .filter(|feedback| !feedback.is_empty()),
            })
            .collect(),
        aggregate_score: summary.aggregate_score,
        averages: summary
            .dimensions
            .iter()
            .map(|entry| (entry.dimension, entry.average))
            .collect(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Highest and lowest averaging dimensions, never overlapping. Sorting is
/// stable over `Dimension::ALL`, so ties resolve in declaration order. A single
/// reported dimension is a strength with nothing listed to improve.
fn highlights(dimensions: &[DimensionAverage]) -> (Vec<Dimension>, Vec<Dimension>) {
    let reported: Vec<(Dimension, f64)> = dimensions
        .iter()
        .filter_map(|entry| entry.average.map(|average| (entry.dimension, average)))
        .collect();

    match reported.len() {
        0 => (Vec::new(), Vec::new()),
        1 => (vec![reported[0].0], Vec::new()),
        count => {
            let take = MAX_HIGHLIGHTS.min(count / 2);

            let mut descending = reported.clone();
            descending.sort_by(|a, b| b.1.total_cmp(&a.1));
            let mut ascending = reported;
            ascending.sort_by(|a, b| a.1.total_cmp(&b.1));

            let strengths: Vec<Dimension> =
                descending.iter().take(take).map(|(d, _)| *d).collect();
            let areas = ascending
                .iter()
                .map(|(d, _)| *d)
                .filter(|d| !strengths.contains(d))
                .take(take)
                .collect();
            (strengths, areas)
        }
    }
}

fn trend(scores: &[f64]) -> Trend {
    if scores.len() < 2 {
        return Trend::Insufficient;
    }
    let (first, second) = scores.split_at(scores.len() / 2);
    let (Some(first), Some(second)) = (mean(first), mean(second)) else {
        return Trend::Insufficient;
    };

    let delta = second - first;
    if delta >= TREND_THRESHOLD {
        Trend::Improving
    } else if delta <= -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Steady
    }
}

fn label(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Accuracy => "pronunciation accuracy",
        Dimension::Fluency => "fluency",
        Dimension::Prosody => "rhythm and intonation",
        Dimension::Vocabulary => "vocabulary",
        Dimension::Grammar => "grammar",
        Dimension::Relevance => "staying on topic",
    }
}

fn listing(summary: &SessionSummary, dimensions: &[Dimension]) -> String {
    dimensions
        .iter()
        .map(|dimension| {
            let average = summary
                .dimensions
                .iter()
                .find(|entry| entry.dimension == *dimension)
                .and_then(|entry| entry.average)
                .unwrap_or_default();
            format!("{} ({average:.1})", label(*dimension))
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

fn narrative(summary: &SessionSummary) -> String {
    let Some(score) = summary.aggregate_score else {
        return format!(
            "You answered {} question(s), but none could be assessed. Please try again.",
            summary.answers_total
        );
    };

    let mut text = format!(
        "You answered {} question(s) with an overall score of {score:.1}.",
        summary.answers_total
    );
    if summary.answers_assessed < summary.answers_total {
        text.push_str(&format!(
            " {} answer(s) could not be assessed and are left out of the averages.",
            summary.answers_total - summary.answers_assessed
        ));
    }
    if !summary.strengths.is_empty() {
        text.push_str(&format!(
            " Your strongest area: {}.",
            listing(summary, &summary.strengths)
        ));
    }
    if !summary.areas_to_improve.is_empty() {
        text.push_str(&format!(
            " Focus next on {}.",
            listing(summary, &summary.areas_to_improve)
        ));
    }
    match summary.trend {
        Trend::Improving => text.push_str(" Your scores improved as the session went on."),
        Trend::Declining => {
            text.push_str(" Your scores dropped towards the end; a short break may help.")
        }
        Trend::Steady => text.push_str(" Your scores stayed consistent across the session."),
        Trend::Insufficient => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{
        Answer, AudioRef, ContentAssessment, FailureKind, Question, ScoreWeights, SourceFailure,
        SourceOutcome, SpeechAssessment,
    };

    fn speech(accuracy: f64, fluency: f64, prosody: Option<f64>) -> SpeechAssessment {
        SpeechAssessment {
            overall: accuracy,
            accuracy: Some(accuracy),
            fluency: Some(fluency),
            prosody,
            phonemes: Vec::new(),
            clamped: Vec::new(),
        }
    }

    fn content(vocabulary: f64, grammar: f64, relevance: f64) -> ContentAssessment {
        ContentAssessment {
            overall: (vocabulary + grammar + relevance) / 3.0,
            vocabulary: Some(vocabulary),
            grammar: Some(grammar),
            relevance: Some(relevance),
            feedback: "Nice work.".into(),
            reported_grade: Some(4.0),
            clamped: Vec::new(),
        }
    }

    fn failure() -> SourceFailure {
        SourceFailure {
            kind: FailureKind::SourceUnavailable,
            message: "down".into(),
            attempts: 3,
        }
    }

    fn result(
        sequence: u64,
        speech: Option<SpeechAssessment>,
        content: Option<ContentAssessment>,
    ) -> AssessmentResult {
        let question = Question::new(format!("q{sequence}"), "Tell me about your day.");
        let answer = Answer::new(&question, "I went to school", AudioRef::default());
        AssessmentResult::combine(
            sequence,
            question,
            answer,
            speech.map_or_else(|| SourceOutcome::missing(failure()), SourceOutcome::live),
            content.map_or_else(|| SourceOutcome::missing(failure()), SourceOutcome::live),
            &ScoreWeights::default(),
        )
    }

    fn average(summary: &SessionSummary, dimension: Dimension) -> Option<f64> {
        summary
            .dimensions
            .iter()
            .find(|entry| entry.dimension == dimension)
            .and_then(|entry| entry.average)
    }

    #[test]
    fn empty_session_has_no_data() {
        assert_eq!(summarize(&[]), OverallFeedback::NoData);
        assert!(summarize(&[]).summary().is_none());
    }

    #[test]
    fn unassessed_answers_are_excluded_from_means() {
        let results = vec![
            result(1, Some(speech(80.0, 80.0, None)), Some(content(60.0, 60.0, 60.0))),
            result(2, None, None),
        ];
        let feedback = summarize(&results);
        let summary = feedback.summary().expect("summary");

        assert_eq!(summary.answers_total, 2);
        assert_eq!(summary.answers_assessed, 1);
        assert_eq!(summary.aggregate_score, Some(70.0));
        assert_eq!(average(summary, Dimension::Accuracy), Some(80.0));
        assert_eq!(average(summary, Dimension::Prosody), None);
        assert!(summary.narrative.contains("could not be assessed"));
    }

    #[test]
    fn dimension_averages_count_only_reported_values() {
        let results = vec![
            result(1, Some(speech(90.0, 70.0, Some(50.0))), None),
            result(2, Some(speech(70.0, 70.0, None)), None),
        ];
        let feedback = summarize(&results);
        let summary = feedback.summary().expect("summary");
        let prosody = summary
            .dimensions
            .iter()
            .find(|entry| entry.dimension == Dimension::Prosody)
            .expect("listed");
        assert_eq!(prosody.average, Some(50.0));
        assert_eq!(prosody.samples, 1);
        assert_eq!(average(summary, Dimension::Accuracy), Some(80.0));
        assert_eq!(average(summary, Dimension::Grammar), None);
    }

    #[test]
    fn all_unassessed_reports_absent_score() {
        let feedback = summarize(&[result(1, None, None)]);
        let summary = feedback.summary().expect("summary");
        assert_eq!(summary.aggregate_score, None);
        assert!(summary.strengths.is_empty());
        assert!(summary.areas_to_improve.is_empty());
        assert_eq!(summary.trend, Trend::Insufficient);
        assert!(summary.narrative.contains("none could be assessed"));
    }

    #[test]
    fn strengths_and_areas_come_from_extremes() {
        let results = vec![result(
            1,
            Some(speech(95.0, 60.0, Some(85.0))),
            Some(content(40.0, 70.0, 90.0)),
        )];
        let feedback = summarize(&results);
        let summary = feedback.summary().expect("summary");
        assert_eq!(
            summary.strengths,
            vec![Dimension::Accuracy, Dimension::Relevance]
        );
        assert_eq!(
            summary.areas_to_improve,
            vec![Dimension::Vocabulary, Dimension::Fluency]
        );
    }

    #[test]
    fn ties_follow_declaration_order() {
        let results = vec![result(
            1,
            Some(speech(70.0, 70.0, Some(70.0))),
            Some(content(70.0, 70.0, 70.0)),
        )];
        let feedback = summarize(&results);
        let summary = feedback.summary().expect("summary");
        assert_eq!(summary.strengths, vec![Dimension::Accuracy, Dimension::Fluency]);
        assert_eq!(
            summary.areas_to_improve,
            vec![Dimension::Prosody, Dimension::Vocabulary]
        );
    }

    #[test]
    fn two_dimensions_give_one_each() {
        let results = vec![result(1, Some(speech(90.0, 60.0, None)), None)];
        let feedback = summarize(&results);
        let summary = feedback.summary().expect("summary");
        assert_eq!(summary.strengths, vec![Dimension::Accuracy]);
        assert_eq!(summary.areas_to_improve, vec![Dimension::Fluency]);
    }

    #[test]
    fn trend_compares_session_halves() {
        assert_eq!(trend(&[]), Trend::Insufficient);
        assert_eq!(trend(&[50.0]), Trend::Insufficient);
        assert_eq!(trend(&[50.0, 60.0]), Trend::Improving);
        assert_eq!(trend(&[60.0, 50.0, 52.0]), Trend::Declining);
        assert_eq!(trend(&[70.0, 72.0, 68.0, 74.0]), Trend::Steady);
        assert_eq!(trend(&[50.0, 55.0]), Trend::Improving);
    }

    #[test]
    fn summary_is_idempotent() {
        let results = vec![
            result(1, Some(speech(80.0, 70.0, None)), Some(content(60.0, 65.0, 70.0))),
            result(2, None, Some(content(75.0, 80.0, 85.0))),
        ];
        assert_eq!(summarize(&results), summarize(&results));
    }

    #[test]
    fn narration_request_carries_feedback_in_order() {
        let results = vec![
            result(1, Some(speech(80.0, 70.0, None)), Some(content(60.0, 65.0, 70.0))),
            result(2, Some(speech(80.0, 70.0, None)), None),
        ];
        let feedback = summarize(&results);
        let request = narration_request(&results, feedback.summary().expect("summary"));
        assert_eq!(request.entries.len(), 2);
        assert_eq!(request.entries[0].feedback.as_deref(), Some("Nice work."));
        assert_eq!(request.entries[1].feedback, None);
        assert_eq!(request.averages.len(), Dimension::ALL.len());
    }

    #[test]
    fn feedback_serialises_with_status_tag() {
        let json = serde_json::to_value(OverallFeedback::NoData).expect("serialises");
        assert_eq!(json["status"], "no_data");

        let feedback = summarize(&[result(1, Some(speech(80.0, 80.0, None)), None)]);
        let json = serde_json::to_value(&feedback).expect("serialises");
        assert_eq!(json["status"], "summary");
        assert_eq!(json["aggregate_score"], 80.0);
    }
}
