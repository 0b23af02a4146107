//! Pronunciation assessment over the Azure Speech short-audio REST endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assessment::{AudioRef, RawPhoneme, RawSpeechPayload, SourceError};
use crate::config::SpeechProviderConfig;
use crate::orchestrator::{AdapterConfig, SpeechProvider};
use crate::providers::http::{agent, classify, read_body, run_blocking};

const TARGET: &str = "speech_provider";
const AUDIO_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";

pub struct AzureSpeechProvider {
    agent: ureq::Agent,
    config: SpeechProviderConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssessmentParameters<'a> {
    reference_text: &'a str,
    grading_system: &'static str,
    granularity: &'static str,
    dimension: &'static str,
    enable_prosody_assessment: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default, rename = "NBest")]
    n_best: Vec<Hypothesis>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Hypothesis {
    #[serde(flatten)]
    scores: Scores,
    #[serde(default)]
    pronunciation_assessment: Option<Scores>,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Scores {
    pron_score: Option<f64>,
    accuracy_score: Option<f64>,
    fluency_score: Option<f64>,
    prosody_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Word {
    #[serde(default)]
    phonemes: Vec<Phoneme>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Phoneme {
    phoneme: String,
    #[serde(flatten)]
    scores: Scores,
    #[serde(default)]
    pronunciation_assessment: Option<Scores>,
}

impl AzureSpeechProvider {
    pub fn new(config: SpeechProviderConfig, adapter: &AdapterConfig) -> Self {
        Self {
            agent: agent(adapter.timeout),
            config,
        }
    }

    fn assessment_header(&self, reference_text: &str) -> Result<String, SourceError> {
        let parameters = AssessmentParameters {
            reference_text,
            grading_system: "HundredMark",
            granularity: "Phoneme",
            dimension: "Comprehensive",
            enable_prosody_assessment: true,
        };
        let json = serde_json::to_vec(&parameters).map_err(|err| {
            SourceError::rejected(format!("failed to encode assessment parameters: {err}"))
        })?;
        Ok(BASE64.encode(json))
    }
}

#[async_trait]
impl SpeechProvider for AzureSpeechProvider {
    async fn analyze_pronunciation(
        &self,
        audio: &AudioRef,
        expected_text: &str,
    ) -> Result<RawSpeechPayload, SourceError> {
        let bytes = audio.load().await.map_err(|err| {
            SourceError::rejected(format!("could not read audio {}: {err}", audio.describe()))
        })?;
        if bytes.is_empty() {
            return Err(SourceError::rejected("audio payload is empty"));
        }

        let header = self.assessment_header(expected_text)?;
        let request = self
            .agent
            .post(&self.config.endpoint())
            .query("language", &self.config.language)
            .query("format", "detailed")
            .set("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .set("Content-Type", AUDIO_CONTENT_TYPE)
            .set("Accept", "application/json")
            .set("Pronunciation-Assessment", &header);

        debug!(
            target: TARGET,
            audio = %audio.describe(),
            language = %self.config.language,
            "requesting pronunciation assessment"
        );

        let body = run_blocking(move || {
            let response = request.send_bytes(&bytes).map_err(classify)?;
            read_body(response)
        })
        .await?;

        parse_recognition(&body)
    }
}

/// Reads the detailed recognition payload. Scores may sit directly on the
/// hypothesis or inside a nested `PronunciationAssessment` object depending on
/// the service version.
pub(crate) fn parse_recognition(body: &str) -> Result<RawSpeechPayload, SourceError> {
    let response: RecognitionResponse = serde_json::from_str(body).map_err(|err| {
        SourceError::malformed(format!("unreadable recognition response: {err}"), body)
    })?;

    match response.recognition_status.as_str() {
        "Success" => {}
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => {
            return Err(SourceError::rejected(format!(
                "no speech recognised ({})",
                response.recognition_status
            )))
        }
        other => {
            return Err(SourceError::unavailable(format!(
                "recognition failed with status {other}"
            )))
        }
    }

    let best = response.n_best.into_iter().next().ok_or_else(|| {
        SourceError::malformed("recognition response has no hypotheses", body)
    })?;
    let scores = best.pronunciation_assessment.unwrap_or(best.scores);

    let phonemes = best
        .words
        .into_iter()
        .flat_map(|word| word.phonemes)
        .filter_map(|phoneme| {
            let scores = phoneme.pronunciation_assessment.unwrap_or(phoneme.scores);
            scores.accuracy_score.map(|score| RawPhoneme {
                phoneme: phoneme.phoneme,
                score,
            })
        })
        .collect();

    Ok(RawSpeechPayload {
        overall: scores.pron_score,
        accuracy: scores.accuracy_score,
        fluency: scores.fluency_score,
        prosody: scores.prosody_score,
        phonemes,
        raw: body.to_string(),
    })
}
