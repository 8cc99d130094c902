//! Firestore REST backend for the shared translation dictionary.
//! Document: `translations_cache/{lang}` with shape `{ dict: { k_xxx: { s, t } } }`.
//! Updates are field-level merges (`updateMask`) guarded by
//! `currentDocument.exists=true` so a missing document surfaces as `NotFound`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::remote::{RemoteDictionary, RemoteEntry, RemoteStore, COLLECTION, DICT_FIELD};
use super::{LangCode, TranslateError};

pub const API_BASE: &str = "https://firestore.googleapis.com/v1";

/// Firestore typed value. Only the variants this document uses are modelled;
/// anything else deserializes with both fields empty.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FsValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_value: Option<FsMap>,
}

impl FsValue {
    fn string(s: &str) -> Self {
        Self {
            string_value: Some(s.to_string()),
            map_value: None,
        }
    }

    fn map(fields: HashMap<String, FsValue>) -> Self {
        Self {
            string_value: None,
            map_value: Some(FsMap { fields }),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct FsMap {
    #[serde(default)]
    fields: HashMap<String, FsValue>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FsDocument {
    #[serde(default)]
    fields: HashMap<String, FsValue>,
}

pub struct FirestoreStore {
    http: reqwest::Client,
    documents_url: String,
    bearer_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(
        project_id: &str,
        database: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranslateError> {
        Self::with_api_base(API_BASE, project_id, database, bearer_token, timeout)
    }

    /// Same as [`FirestoreStore::new`] against another REST root, e.g. the
    /// emulator at `http://localhost:8080/v1`.
    pub fn with_api_base(
        api_base: &str,
        project_id: &str,
        database: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranslateError> {
        if project_id.trim().is_empty() {
            return Err(TranslateError::Config("Firestore project id is empty".into()));
        }
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Config(e.to_string()))?;

        Ok(Self {
            http,
            documents_url: format!(
                "{}/projects/{project_id}/databases/{database}/documents",
                api_base.trim_end_matches('/')
            ),
            bearer_token,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.documents_url, COLLECTION)
    }

    fn document_url(&self, lang: LangCode) -> String {
        format!("{}/{}", self.collection_url(), lang.as_str())
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl RemoteStore for FirestoreStore {
    async fn fetch_dictionary(
        &self,
        lang: LangCode,
    ) -> Result<Option<RemoteDictionary>, TranslateError> {
        let resp = self
            .authorize(self.http.get(self.document_url(lang)))
            .send()
            .await
            .map_err(request_error)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let doc: FsDocument = resp
                    .json()
                    .await
                    .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;
                let dict = decode_dictionary(lang, doc);
                debug!(lang = %lang, entries = dict.len(), "shared dictionary fetched");
                Ok(Some(dict))
            }
            status => Err(status_error(status, resp).await),
        }
    }

    async fn update_entries(
        &self,
        lang: LangCode,
        entries: &[RemoteEntry],
    ) -> Result<(), TranslateError> {
        let (field_paths, doc) = encode_patch(entries);
        let mut query: Vec<(&str, &str)> = field_paths
            .iter()
            .map(|p| ("updateMask.fieldPaths", p.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let resp = self
            .authorize(self.http.patch(self.document_url(lang)))
            .query(&query)
            .json(&doc)
            .send()
            .await
            .map_err(request_error)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(TranslateError::NotFound),
            status if status.is_success() => {
                debug!(lang = %lang, count = entries.len(), "shared dictionary merged");
                Ok(())
            }
            status => Err(status_error(status, resp).await),
        }
    }

    async fn create_dictionary(&self, lang: LangCode) -> Result<(), TranslateError> {
        let mut doc = FsDocument::default();
        doc.fields
            .insert(DICT_FIELD.to_string(), FsValue::map(HashMap::new()));

        let resp = self
            .authorize(self.http.post(self.collection_url()))
            .query(&[("documentId", lang.as_str())])
            .json(&doc)
            .send()
            .await
            .map_err(request_error)?;

        match resp.status() {
            // another client created it first
            StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => {
                info!(lang = %lang, "shared dictionary created");
                Ok(())
            }
            status => Err(status_error(status, resp).await),
        }
    }
}

fn request_error(e: reqwest::Error) -> TranslateError {
    if e.is_timeout() {
        TranslateError::Timeout
    } else {
        TranslateError::Api(e.to_string())
    }
}

async fn status_error(status: StatusCode, resp: reqwest::Response) -> TranslateError {
    let body_text = resp.text().await.unwrap_or_default();
    TranslateError::Api(format!(
        "firestore status {}: {}",
        status,
        body_text.chars().take(200).collect::<String>()
    ))
}

/// Build the update mask and patch body for a set of entries.
fn encode_patch(entries: &[RemoteEntry]) -> (Vec<String>, FsDocument) {
    let mut dict_fields = HashMap::with_capacity(entries.len());
    let mut field_paths = Vec::with_capacity(entries.len());

    for entry in entries {
        let key = entry.field_key();
        let mut pair = HashMap::with_capacity(2);
        pair.insert("s".to_string(), FsValue::string(&entry.source));
        pair.insert("t".to_string(), FsValue::string(&entry.translated));
        if dict_fields.insert(key.clone(), FsValue::map(pair)).is_none() {
            field_paths.push(format!("{DICT_FIELD}.{key}"));
        }
    }

    let mut doc = FsDocument::default();
    doc.fields
        .insert(DICT_FIELD.to_string(), FsValue::map(dict_fields));
    (field_paths, doc)
}

/// Decode a fetched document, dropping entries without a string `s` and `t`.
fn decode_dictionary(lang: LangCode, doc: FsDocument) -> RemoteDictionary {
    let mut dict = RemoteDictionary::new(lang);
    let Some(entries) = doc
        .fields
        .get(DICT_FIELD)
        .and_then(|v| v.map_value.as_ref())
    else {
        return dict;
    };

    for (key, value) in &entries.fields {
        let Some(pair) = value.map_value.as_ref() else {
            continue;
        };
        let source = pair.fields.get("s").and_then(|v| v.string_value.clone());
        let translated = pair.fields.get("t").and_then(|v| v.string_value.clone());
        if let (Some(source), Some(translated)) = (source, translated) {
            dict.entries
                .insert(key.clone(), RemoteEntry { source, translated });
        }
    }
    dict
}
