use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use speaking_coach_core::assessment::{AudioRef, Question};
use speaking_coach_core::config::AppConfig;
use speaking_coach_core::orchestrator::{
    AdapterConfig, AssessmentOrchestrator, ContentGradingAdapter,
};
use speaking_coach_core::providers::{AzureSpeechProvider, HeuristicContentGrader, OllamaGrader};
use speaking_coach_core::session::PracticeService;
use speaking_coach_core::telemetry::init_tracing;

#[derive(Debug, Deserialize)]
struct PracticeScript {
    questions: Vec<Question>,
    answers: Vec<ScriptedAnswer>,
}

#[derive(Debug, Deserialize)]
struct ScriptedAnswer {
    question_id: String,
    transcript: String,
    #[serde(default)]
    audio: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let script_path = std::env::args()
        .nth(1)
        .context("usage: speaking-coach <practice-script.json>")?;

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let _guard = init_tracing(&config.telemetry)?;

    let script = tokio::fs::read_to_string(&script_path)
        .await
        .with_context(|| format!("failed to read practice script {script_path}"))?;
    let script: PracticeScript = serde_json::from_str(&script)
        .with_context(|| format!("failed to parse practice script {script_path}"))?;

    let speech = Arc::new(AzureSpeechProvider::new(
        config.speech.clone(),
        &config.orchestrator.speech,
    ));
    let grader = Arc::new(OllamaGrader::new(
        config.grader.clone(),
        &config.orchestrator.content,
    ));
    let offline = ContentGradingAdapter::new(
        Arc::new(HeuristicContentGrader::new()),
        AdapterConfig {
            max_retries: 0,
            ..config.orchestrator.content.clone()
        },
    );

    let orchestrator =
        AssessmentOrchestrator::new(config.orchestrator.clone(), speech, grader.clone())?
            .with_content_fallback(Arc::new(offline));
    let service = PracticeService::new(orchestrator)
        .with_narrator(grader, config.orchestrator.content.clone());

    info!(
        target: "speaking_coach",
        profile = %serde_json::to_string(&service.describe())?,
        questions = script.questions.len(),
        answers = script.answers.len(),
        "practice service ready"
    );

    let questions: HashMap<&str, &Question> = script
        .questions
        .iter()
        .map(|question| (question.id.as_str(), question))
        .collect();

    let session = service.start_session();
    let mut results = Vec::with_capacity(script.answers.len());
    for answer in script.answers {
        let question = questions
            .get(answer.question_id.as_str())
            .with_context(|| format!("answer refers to unknown question `{}`", answer.question_id))?;
        let audio = answer.audio.map(AudioRef::File).unwrap_or_default();

        let result = service
            .submit_answer(&session, question, answer.transcript, audio)
            .await?;
        info!(
            target: "speaking_coach",
            sequence = result.sequence(),
            status = %result.status_message(),
            "answer assessed"
        );
        results.push(result);
    }

    let feedback = service.coaching_feedback(&session).await;
    let report = serde_json::json!({
        "session": session.info(),
        "results": results,
        "feedback": feedback,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
