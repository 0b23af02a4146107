//! Offline content estimate used when the language-model grader is down.
//!
//! Only vocabulary and relevance can be approximated from the transcript
//! alone, so grammar is left unreported.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::assessment::{Question, RawContentPayload, SourceError};
use crate::orchestrator::ContentGrader;

/// Word count at which length stops limiting the vocabulary estimate.
const FULL_LENGTH_WORDS: usize = 20;
const DIVERSITY_SHARE: f64 = 0.6;
const MIN_KEYWORD_LEN: usize = 4;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "could", "describe", "does", "from", "have",
    "picture", "please", "should", "tell", "that", "their", "there", "these", "they", "this",
    "what", "when", "where", "which", "while", "with", "would", "your",
];

#[derive(Debug, Default, Clone)]
pub struct HeuristicContentGrader;

impl HeuristicContentGrader {
    pub fn new() -> Self {
        Self
    }

    fn estimate(
        &self,
        question: &Question,
        transcript: &str,
    ) -> Result<RawContentPayload, SourceError> {
        let words = tokenize(transcript);
        if words.is_empty() {
            return Err(SourceError::rejected("transcript has no words to grade"));
        }

        let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
        let diversity = unique.len() as f64 / words.len() as f64;
        let length = (words.len() as f64 / FULL_LENGTH_WORDS as f64).min(1.0);
        let vocabulary = 100.0 * (DIVERSITY_SHARE * diversity + (1.0 - DIVERSITY_SHARE) * length);

        let keywords = keywords(question);
        let relevance = if keywords.is_empty() {
            None
        } else {
            let matched = keywords
                .iter()
                .filter(|keyword| unique.iter().any(|word| related(word, keyword)))
                .count();
            Some(100.0 * matched as f64 / keywords.len() as f64)
        };

        let mut feedback = format!(
            "Estimated offline from your transcript ({} words, {} distinct).",
            words.len(),
            unique.len()
        );
        if length < 1.0 {
            feedback.push_str(" Try giving a longer answer with more detail.");
        }
        if relevance.is_some_and(|score| score < 50.0) {
            feedback.push_str(" Stay closer to what the question asks about.");
        }

        Ok(RawContentPayload {
            vocabulary: Some(vocabulary),
            grammar: None,
            relevance,
            grade: None,
            feedback: Some(feedback),
            raw: String::new(),
        })
    }
}

#[async_trait]
impl ContentGrader for HeuristicContentGrader {
    async fn grade_content(
        &self,
        question: &Question,
        transcript: &str,
    ) -> Result<RawContentPayload, SourceError> {
        self.estimate(question, transcript)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|word| word.trim_matches('\'').to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

/// Topic hints plus the content words of the prompt, deduplicated.
fn keywords(question: &Question) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .topic_hints
        .iter()
        .flat_map(|hint| tokenize(hint))
        .chain(
            tokenize(&question.prompt)
                .into_iter()
                .filter(|word| {
                    word.len() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(&word.as_str())
                }),
        )
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

/// Exact match, or a shared stem for longer words ("running" / "run" does not
/// count, "describing" / "describe" does).
fn related(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }
    let shared = word
        .chars()
        .zip(keyword.chars())
        .take_while(|(a, b)| a == b)
        .count();
    shared >= MIN_KEYWORD_LEN + 1 && shared + 3 >= word.len().max(keyword.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{normalize_content, FailureKind};

    #[test]
    fn on_topic_answer_scores_full_relevance() {
        let question = Question::new("q1", "Where did the cat sit?").with_topic_hints(["cat", "mat"]);
        let payload = HeuristicContentGrader::new()
            .estimate(&question, "The cat sat on the mat")
            .expect("estimates");

        // keywords: cat, mat (the prompt adds nothing of four letters or more)
        assert_eq!(payload.relevance, Some(100.0));
        assert_eq!(payload.grammar, None);
        assert_eq!(payload.grade, None);
        let vocabulary = payload.vocabulary.expect("vocabulary reported");
        assert!(vocabulary > 0.0 && vocabulary <= 100.0);
    }

    #[test]
    fn off_topic_answer_scores_low_relevance() {
        let question = Question::new("q1", "Describe your favourite holiday destination")
            .with_topic_hints(["beach", "travel"]);
        let payload = HeuristicContentGrader::new()
            .estimate(&question, "I like pizza and video games")
            .expect("estimates");
        assert_eq!(payload.relevance, Some(0.0));
        assert!(payload
            .feedback
            .as_deref()
            .is_some_and(|text| text.contains("Stay closer")));
    }

    #[test]
    fn repetition_lowers_vocabulary() {
        let question = Question::new("q1", "Why?");
        let grader = HeuristicContentGrader::new();
        let varied = grader
            .estimate(&question, "I enjoy reading novels because stories let me travel")
            .expect("estimates");
        let repetitive = grader
            .estimate(&question, "good good good good good good good good good")
            .expect("estimates");
        assert!(varied.vocabulary > repetitive.vocabulary);
    }

    #[test]
    fn no_keywords_leaves_relevance_unreported() {
        let payload = HeuristicContentGrader::new()
            .estimate(&Question::new("q1", "Why?"), "Because I said so")
            .expect("estimates");
        assert_eq!(payload.relevance, None);
    }

    #[test]
    fn empty_transcript_is_rejected() {
        let error = HeuristicContentGrader::new()
            .estimate(&Question::new("q1", "Why?"), " ... ")
            .expect_err("nothing to grade");
        assert_eq!(error.kind(), FailureKind::SourceRejected);
    }

    #[test]
    fn estimate_normalises_cleanly() {
        let question = Question::new("q1", "Tell me about your weekend").with_topic_hints(["weekend"]);
        let payload = HeuristicContentGrader::new()
            .estimate(&question, "Last weekend I visited my grandparents in the countryside")
            .expect("estimates");
        let assessment = normalize_content(payload).expect("normalises");
        assert!(assessment.clamped.is_empty());
        assert_eq!(assessment.relevance, Some(100.0));
    }

    #[test]
    fn stems_match_longer_words_only() {
        assert!(related("describing", "describe"));
        assert!(related("weekends", "weekend"));
        assert!(!related("cats", "cat"));
        assert!(!related("carpet", "cart"));
    }
}
