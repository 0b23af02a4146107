use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::assessment::{ClampRecord, FailureKind, Provenance, SourceKind};

pub(crate) const TARGET: &str = "telemetry::assessment";
pub(crate) const EVENT_COMPLETED: &str = "assessment_completed";
pub(crate) const EVENT_SOURCE_FAILURE: &str = "source_failure";
pub(crate) const EVENT_SCORE_CLAMPED: &str = "score_clamped";
pub(crate) const EVENT_FEEDBACK: &str = "feedback_generated";
pub(crate) const EVENT_NARRATION_FAILURE: &str = "narration_failure";

#[derive(Debug, Serialize)]
pub struct AssessmentCompletedEvent<'a> {
    pub answer_id: &'a str,
    pub sequence: u64,
    pub speech: &'static str,
    pub content: &'static str,
    pub combined_score: Option<f64>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SourceFailureEvent<'a> {
    pub answer_id: &'a str,
    pub source: &'static str,
    pub kind: &'static str,
    pub attempts: u32,
    pub message: &'a str,
}

/// The session narrator gave up; feedback falls back to the built-in summary.
#[derive(Debug, Serialize)]
pub struct NarrationFailureEvent<'a> {
    pub session_id: &'a str,
    pub kind: &'static str,
    pub attempts: u32,
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ScoreClampedEvent<'a> {
    pub source: &'static str,
    pub field: &'a str,
    pub raw: f64,
    pub clamped_to: f64,
}

#[derive(Debug, Serialize)]
pub struct FeedbackGeneratedEvent<'a> {
    pub session_id: &'a str,
    pub answers_total: usize,
    pub answers_assessed: usize,
    pub narrative: &'static str,
}

pub fn record_assessment_completed(
    answer_id: &str,
    sequence: u64,
    speech: Provenance,
    content: Provenance,
    combined_score: Option<f64>,
    latency: Duration,
) {
    let event = AssessmentCompletedEvent {
        answer_id,
        sequence,
        speech: speech.as_str(),
        content: content.as_str(),
        combined_score,
        latency_ms: duration_to_ms(latency),
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_COMPLETED,
            answer_id = event.answer_id,
            sequence = event.sequence,
            speech = event.speech,
            content = event.content,
            combined_score = ?event.combined_score,
            latency_ms = event.latency_ms,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_COMPLETED,
            %err,
            "failed to encode assessment completed event"
        ),
    }
}

pub fn record_source_failure(
    answer_id: &str,
    source: SourceKind,
    kind: FailureKind,
    attempts: u32,
    message: &str,
) {
    let event = SourceFailureEvent {
        answer_id,
        source: source.as_str(),
        kind: kind.as_str(),
        attempts,
        message,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => warn!(
            target: TARGET,
            event = EVENT_SOURCE_FAILURE,
            answer_id = event.answer_id,
            source = event.source,
            kind = event.kind,
            attempts = event.attempts,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_SOURCE_FAILURE,
            %err,
            "failed to encode source failure event"
        ),
    }
}

pub fn record_narration_failure(
    session_id: &str,
    kind: FailureKind,
    attempts: u32,
    message: &str,
) {
    let event = NarrationFailureEvent {
        session_id,
        kind: kind.as_str(),
        attempts,
        message,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => warn!(
            target: TARGET,
            event = EVENT_NARRATION_FAILURE,
            session_id = event.session_id,
            kind = event.kind,
            attempts = event.attempts,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_NARRATION_FAILURE,
            %err,
            "failed to encode narration failure event"
        ),
    }
}

pub fn record_score_clamped(source: SourceKind, record: &ClampRecord) {
    let event = ScoreClampedEvent {
        source: source.as_str(),
        field: &record.field,
        raw: record.raw,
        clamped_to: record.clamped_to,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_SCORE_CLAMPED,
            source = event.source,
            field = event.field,
            raw = event.raw,
            clamped_to = event.clamped_to,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_SCORE_CLAMPED,
            %err,
            "failed to encode score clamped event"
        ),
    }
}

pub fn record_feedback_generated(
    session_id: &str,
    answers_total: usize,
    answers_assessed: usize,
    narrative: Provenance,
) {
    let event = FeedbackGeneratedEvent {
        session_id,
        answers_total,
        answers_assessed,
        narrative: narrative.as_str(),
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_FEEDBACK,
            session_id = event.session_id,
            answers_total = event.answers_total,
            answers_assessed = event.answers_assessed,
            narrative = event.narrative,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_FEEDBACK,
            %err,
            "failed to encode feedback generated event"
        ),
    }
}

pub(crate) fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_clamps_to_u64() {
        let duration = Duration::new(u64::MAX, 0);
        assert_eq!(duration_to_ms(duration), u64::MAX);
    }

    #[test]
    fn completed_event_serialises_absent_score_as_null() {
        let event = AssessmentCompletedEvent {
            answer_id: "a1",
            sequence: 3,
            speech: Provenance::Missing.as_str(),
            content: Provenance::Missing.as_str(),
            combined_score: None,
            latency_ms: 12,
        };
        let payload = serde_json::to_string(&event).expect("serialises");
        assert!(payload.contains("\"combined_score\":null"));
        assert!(payload.contains("\"speech\":\"missing\""));
    }

    #[test]
    fn narration_failure_event_is_keyed_by_session() {
        let event = NarrationFailureEvent {
            session_id: "s1",
            kind: FailureKind::SourceTimeout.as_str(),
            attempts: 2,
            message: "narrator timed out",
        };
        let payload = serde_json::to_string(&event).expect("serialises");
        assert!(payload.contains("\"session_id\":\"s1\""));
        assert!(payload.contains("\"kind\":\"source_timeout\""));
        assert!(!payload.contains("answer_id"));
    }
}
