//! Content grading and session narration through a local Ollama chat model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assessment::{Question, QuestionKind, RawContentPayload, SourceError};
use crate::config::GraderConfig;
use crate::orchestrator::{AdapterConfig, ContentGrader, NarrationRequest, SessionNarrator};
use crate::providers::http::{agent, classify, read_body, run_blocking};

const TARGET: &str = "content_grader";
const NARRATION_TEMPERATURE: f32 = 0.4;
const NARRATION_MAX_TOKENS: u32 = 1_500;

const GRADING_PROMPT: &str = "You assess spoken English answers from language learners.
Score the transcript on three criteria, each from 0 to 100:
- vocabulary: range and fit of word choice
- grammar: accuracy of sentence structure and tense
- relevance: how directly the answer addresses the question
Also give an overall grade from 0 to 5 and two or three sentences of feedback the learner can act on.
Reply with a single JSON object and nothing else:
{\"vocabulary\": <0-100>, \"grammar\": <0-100>, \"relevance\": <0-100>, \"grade\": <0-5>, \"feedback\": \"<text>\"}";

const IMAGE_GRADING_NOTE: &str = "This answer describes a picture you cannot see. \
Judge relevance by how concretely it describes visual details such as objects, people, colours and positions.";

const NARRATION_PROMPT: &str = "You coach a learner after a spoken English practice session.
Summarise how the session went, name what the learner did well and what to work on next, \
and suggest one or two concrete exercises. Quote their answers where it helps. \
Keep the tone encouraging and reply in plain prose.";

pub struct OllamaGrader {
    agent: ureq::Agent,
    config: GraderConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaGrader {
    pub fn new(config: GraderConfig, adapter: &AdapterConfig) -> Self {
        Self {
            agent: agent(adapter.timeout),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        format: Option<&'static str>,
        options: ChatOptions,
    ) -> Result<String, SourceError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            format,
            options,
        };
        let payload = serde_json::to_value(&request).map_err(|err| {
            SourceError::rejected(format!("failed to encode chat request: {err}"))
        })?;

        let url = format!("{}/api/chat", self.config.base_url);
        debug!(target: TARGET, %url, model = %self.config.model, "sending chat request");

        let agent = self.agent.clone();
        let body = run_blocking(move || {
            let response = agent.post(&url).send_json(payload).map_err(classify)?;
            read_body(response)
        })
        .await?;

        let response: ChatResponse = serde_json::from_str(&body).map_err(|err| {
            SourceError::malformed(format!("unreadable chat response: {err}"), body.as_str())
        })?;
        Ok(response.message.content)
    }
}

#[async_trait]
impl ContentGrader for OllamaGrader {
    async fn grade_content(
        &self,
        question: &Question,
        transcript: &str,
    ) -> Result<RawContentPayload, SourceError> {
        if transcript.trim().is_empty() {
            return Err(SourceError::rejected("transcript is empty"));
        }

        let content = self
            .chat(
                GRADING_PROMPT,
                &grading_message(question, transcript),
                Some("json"),
                ChatOptions {
                    temperature: self.config.temperature,
                    num_predict: self.config.max_tokens,
                },
            )
            .await?;

        parse_grading(&content)
    }
}

#[async_trait]
impl SessionNarrator for OllamaGrader {
    async fn narrate(&self, request: &NarrationRequest) -> Result<String, SourceError> {
        let content = self
            .chat(
                NARRATION_PROMPT,
                &narration_message(request),
                None,
                ChatOptions {
                    temperature: NARRATION_TEMPERATURE,
                    num_predict: NARRATION_MAX_TOKENS,
                },
            )
            .await?;

        let narrative = content.trim();
        if narrative.is_empty() {
            return Err(SourceError::malformed("narrator returned no text", content.as_str()));
        }
        Ok(narrative.to_string())
    }
}

fn grading_message(question: &Question, transcript: &str) -> String {
    let mut message = format!(
        "Question ({} level): {}\n\nLearner's answer: {}\n",
        question.difficulty, question.prompt, transcript
    );
    if question.kind == QuestionKind::ImageDescription {
        message.push('\n');
        message.push_str(IMAGE_GRADING_NOTE);
        message.push('\n');
    }
    if !question.topic_hints.is_empty() {
        message.push_str(&format!(
            "\nA relevant answer would touch on: {}\n",
            question.topic_hints.join(", ")
        ));
    }
    message
}

fn narration_message(request: &NarrationRequest) -> String {
    let mut message = String::from("Session answers:\n");
    for (index, entry) in request.entries.iter().enumerate() {
        message.push_str(&format!(
            "\n{}. Question: {}\n   Answer: {}\n",
            index + 1,
            entry.question,
            entry.transcript
        ));
        if let Some(feedback) = &entry.feedback {
            message.push_str(&format!("   Grader notes: {feedback}\n"));
        }
    }

    message.push_str("\nAverage scores (0-100):\n");
    for (dimension, average) in &request.averages {
        match average {
            Some(value) => message.push_str(&format!("- {}: {value:.1}\n", dimension.as_str())),
            None => message.push_str(&format!("- {}: not assessed\n", dimension.as_str())),
        }
    }
    if let Some(score) = request.aggregate_score {
        message.push_str(&format!("\nOverall session score: {score:.1}\n"));
    }
    message
}

/// Pulls the JSON object out of a model reply. Models sometimes wrap it in
/// prose or code fences.
pub(crate) fn parse_grading(content: &str) -> Result<RawContentPayload, SourceError> {
    let object = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(SourceError::malformed("grader reply contains no JSON object", content)),
    };

    let mut payload: RawContentPayload = serde_json::from_str(object).map_err(|err| {
        SourceError::malformed(format!("grader reply is not valid grading JSON: {err}"), content)
    })?;
    payload.raw = content.to_string();
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{Dimension, FailureKind};
    use crate::orchestrator::NarrationEntry;

    #[test]
    fn plain_json_reply_is_parsed() {
        let reply = r#"{"vocabulary": 70, "grammar": 65, "relevance": 80, "grade": 3.5, "feedback": "Good start."}"#;
        let payload = parse_grading(reply).expect("parses");
        assert_eq!(payload.vocabulary, Some(70.0));
        assert_eq!(payload.grammar, Some(65.0));
        assert_eq!(payload.relevance, Some(80.0));
        assert_eq!(payload.grade, Some(3.5));
        assert_eq!(payload.feedback.as_deref(), Some("Good start."));
        assert_eq!(payload.raw, reply);
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let reply = "Here is my assessment:\n```json\n{\"vocabulary\": 50, \"grammar\": 40, \"relevance\": 90, \"grade\": 2, \"feedback\": \"ok\"}\n```";
        let payload = parse_grading(reply).expect("parses");
        assert_eq!(payload.relevance, Some(90.0));
    }

    #[test]
    fn prose_reply_is_malformed() {
        let error = parse_grading("The answer is quite good overall.").expect_err("no json");
        assert_eq!(error.kind(), FailureKind::MalformedSourceData);
        assert_eq!(
            error.raw_payload(),
            Some("The answer is quite good overall.")
        );
    }

    #[test]
    fn wrongly_typed_scores_are_malformed() {
        let error = parse_grading(r#"{"vocabulary": "high"}"#).expect_err("bad type");
        assert_eq!(error.kind(), FailureKind::MalformedSourceData);
    }

    #[test]
    fn image_questions_get_the_picture_note() {
        let question = Question::image_description("q2", "Describe the picture.", "park.png")
            .with_topic_hints(["park", "dog"]);
        let message = grading_message(&question, "A dog runs in a park.");
        assert!(message.contains("picture you cannot see"));
        assert!(message.contains("park, dog"));
        assert!(message.contains("intermediate level"));

        let plain = grading_message(&Question::new("q1", "Why?"), "Because.");
        assert!(!plain.contains("picture"));
    }

    #[test]
    fn narration_message_lists_answers_and_averages() {
        let request = NarrationRequest {
            entries: vec![NarrationEntry {
                question: "Where did the cat sit?".into(),
                transcript: "The cat sat on the mat".into(),
                feedback: Some("Clear.".into()),
            }],
            aggregate_score: Some(81.8),
            averages: vec![
                (Dimension::Accuracy, Some(92.0)),
                (Dimension::Grammar, None),
            ],
        };
        let message = narration_message(&request);
        assert!(message.contains("1. Question: Where did the cat sit?"));
        assert!(message.contains("Grader notes: Clear."));
        assert!(message.contains("accuracy: 92.0"));
        assert!(message.contains("grammar: not assessed"));
        assert!(message.contains("Overall session score: 81.8"));
    }

    #[test]
    fn chat_request_matches_ollama_shape() {
        let request = ChatRequest {
            model: "phi4",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            stream: false,
            format: Some("json"),
            options: ChatOptions {
                temperature: 0.3,
                num_predict: 1_000,
            },
        };
        let json = serde_json::to_value(&request).expect("serialises");
        assert_eq!(json["model"], "phi4");
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 1_000);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn blank_transcripts_are_rejected_locally() {
        let grader = OllamaGrader::new(GraderConfig::default(), &AdapterConfig::grader());
        let error = grader
            .grade_content(&Question::new("q1", "Why?"), "   ")
            .await
            .expect_err("blank");
        assert_eq!(error.kind(), FailureKind::SourceRejected);
    }
}
