//! Quiz question translation.
//! Flattens every question stem and option value into one ordered batch, resolves
//! it through the translation service, and rebuilds the question set. Ids,
//! ordering and `correct_index` never change: scoring is positional.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metrics::metric_names;
use crate::translate::{LangCode, TranslationService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuizOption>,
    /// Passed through untouched; `-1` marks an unanswered question.
    pub correct_index: i64,
}

/// Where a flattened string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Stem { question: usize },
    Choice { question: usize, option: usize },
}

/// `a) `, `b) `, ... for option position `index`.
pub fn option_label(index: usize, value: &str) -> String {
    let letter = char::from_u32('a' as u32 + index as u32).unwrap_or('?');
    format!("{letter}) {value}")
}

fn flatten(questions: &[Question]) -> (Vec<String>, Vec<Slot>) {
    let mut texts = Vec::new();
    let mut slots = Vec::new();
    for (qi, q) in questions.iter().enumerate() {
        texts.push(q.text.clone());
        slots.push(Slot::Stem { question: qi });
        for (oi, o) in q.options.iter().enumerate() {
            texts.push(o.value.clone());
            slots.push(Slot::Choice {
                question: qi,
                option: oi,
            });
        }
    }
    (texts, slots)
}

fn rebuild(questions: &[Question], slots: &[Slot], translated: Vec<String>) -> Vec<Question> {
    let mut out = questions.to_vec();
    for (slot, text) in slots.iter().zip(translated) {
        match *slot {
            Slot::Stem { question } => out[question].text = text,
            Slot::Choice { question, option } => {
                let opt = &mut out[question].options[option];
                opt.label = option_label(option, &text);
                opt.value = text;
            }
        }
    }
    out
}

/// Translate a question set into `lang`. English and empty input come back unchanged.
pub async fn translate_questions(
    service: &TranslationService,
    questions: &[Question],
    lang: impl Into<LangCode>,
) -> Vec<Question> {
    translate_questions_with_cancel(service, questions, lang, &CancellationToken::new()).await
}

/// Cancellable variant; a cancelled load yields the questions untranslated.
pub async fn translate_questions_with_cancel(
    service: &TranslationService,
    questions: &[Question],
    lang: impl Into<LangCode>,
    cancel: &CancellationToken,
) -> Vec<Question> {
    let lang = lang.into();
    if questions.is_empty() || lang.is_english() {
        return questions.to_vec();
    }

    let span = service.metrics().span(metric_names::QUIZ_TRANSLATE);
    let (texts, slots) = flatten(questions);
    let translated = service
        .translate_batch_with_cancel(&texts, lang, cancel)
        .await;
    span.finish();

    if cancel.is_cancelled() {
        debug!(lang = %lang, "quiz translation cancelled");
        return questions.to_vec();
    }

    debug!(lang = %lang, questions = questions.len(), strings = texts.len(), "quiz translated");
    rebuild(questions, &slots, translated)
}
