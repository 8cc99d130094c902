#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use setu_translate::translate::remote::{RemoteDictionary, RemoteEntry, RemoteStore};
use setu_translate::translate::{LangCode, TranslateError, TranslationProvider};
use setu_translate::{Question, QuizOption};

/// How the scripted provider treats requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Batches and single strings both work.
    Full,
    /// Rejects array requests, accepts single strings.
    SingleOnly,
    /// Every request fails as a network error.
    Down,
}

/// Provider answering from a fixed dictionary; unknown text comes back unchanged.
pub struct ScriptedProvider {
    dict: HashMap<String, String>,
    mode: Mode,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(mode: Mode, pairs: &[(&str, &str)]) -> Self {
        Self {
            dict: pairs
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect(),
            mode,
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
        }
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.batch_calls() + self.single_calls()
    }

    fn lookup(&self, text: &str) -> String {
        self.dict.get(text).cloned().unwrap_or_else(|| text.to_string())
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    async fn translate_many(
        &self,
        texts: &[String],
        _target: LangCode,
    ) -> Result<Vec<String>, TranslateError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Full => Ok(texts.iter().map(|t| self.lookup(t)).collect()),
            Mode::SingleOnly => Err(TranslateError::Api("unexpected status 400".into())),
            Mode::Down => Err(TranslateError::Api("connection refused".into())),
        }
    }

    async fn translate_one(&self, text: &str, _target: LangCode) -> Result<String, TranslateError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Down => Err(TranslateError::Api("connection refused".into())),
            _ => Ok(self.lookup(text)),
        }
    }
}

/// Shared store that fails every call.
pub struct BrokenStore;

#[async_trait]
impl RemoteStore for BrokenStore {
    async fn fetch_dictionary(
        &self,
        _lang: LangCode,
    ) -> Result<Option<RemoteDictionary>, TranslateError> {
        Err(TranslateError::Api("permission denied".into()))
    }

    async fn update_entries(
        &self,
        _lang: LangCode,
        _entries: &[RemoteEntry],
    ) -> Result<(), TranslateError> {
        Err(TranslateError::Api("permission denied".into()))
    }

    async fn create_dictionary(&self, _lang: LangCode) -> Result<(), TranslateError> {
        Err(TranslateError::Api("permission denied".into()))
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn question(id: &str, text: &str, options: &[&str], correct_index: i64) -> Question {
    Question {
        id: id.to_string(),
        text: text.to_string(),
        options: options
            .iter()
            .enumerate()
            .map(|(i, v)| QuizOption {
                label: format!("{}) {}", (b'a' + i as u8) as char, v),
                value: v.to_string(),
            })
            .collect(),
        correct_index,
    }
}

/// The arithmetic quiz used across tests.
pub fn sample_quiz() -> Vec<Question> {
    vec![question("q1", "What is 2+2?", &["3", "4"], 1)]
}

pub fn hindi_pairs() -> Vec<(&'static str, &'static str)> {
    vec![("What is 2+2?", "2+2 क्या है?"), ("3", "३"), ("4", "४")]
}
