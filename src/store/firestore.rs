//! Firestore REST backend.
//!
//! Documents are stored as `{"fields": {"name": {"stringValue": ...}}}`.
//! Listing follows `nextPageToken` until the collection is exhausted.

use super::{DocumentStore, StoreError, StoreResult};
use crate::config::FirestoreConfig;
use crate::types::FileRecord;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use url::Url;

const PAGE_SIZE: &str = "300";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FirestoreValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreValue {
    #[serde(default)]
    string_value: Option<String>,
}

pub struct FirestoreStore {
    client: reqwest::Client,
    config: FirestoreConfig,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// `collection` is escaped as a single path segment.
    pub fn collection_url(&self, collection: &str) -> StoreResult<Url> {
        let invalid =
            || StoreError::Unavailable(format!("invalid Firestore URL {}", self.config.base_url));
        let mut url = Url::parse(&self.config.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend([
                "projects",
                self.config.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
            ]);
        Ok(url)
    }

    fn authorize(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<String> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<FileRecord>> {
        let url = self.collection_url(collection)?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(url.clone()).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let body = self.send(request).await?;
            let (page, next) = decode_page(&body)?;
            records.extend(page);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(collection, count = records.len(), "fetched collection");
        Ok(records)
    }

    async fn append(&self, collection: &str, record: &FileRecord) -> StoreResult<String> {
        let request = self
            .client
            .post(self.collection_url(collection)?)
            .json(&encode_document(record));
        let body = self.send(request).await?;
        let created: FirestoreDocument = serde_json::from_str(&body)?;
        Ok(document_id(&created.name).to_string())
    }
}

/// Decode one `documents.list` page. Documents without a string `name`
/// field are skipped.
fn decode_page(body: &str) -> StoreResult<(Vec<FileRecord>, Option<String>)> {
    let page: ListDocumentsResponse = serde_json::from_str(body)?;
    let records = page
        .documents
        .into_iter()
        .filter_map(|doc| {
            let name = doc
                .fields
                .get("name")
                .and_then(|value| value.string_value.clone());
            if name.is_none() {
                tracing::warn!(document = %doc.name, "skipping document without a name field");
            }
            name.map(|name| FileRecord::new(name, Default::default()))
        })
        .collect();
    Ok((records, page.next_page_token))
}

fn encode_document(record: &FileRecord) -> Value {
    json!({ "fields": { "name": { "stringValue": record.name } } })
}

fn document_id(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;

    fn store() -> FirestoreStore {
        FirestoreStore::new(FirestoreConfig {
            base_url: "http://127.0.0.1:8080/v1/".into(),
            project_id: "study-group".into(),
            api_key: None,
            token: None,
        })
    }

    #[test]
    fn test_collection_url() {
        assert_eq!(
            store().collection_url("files").unwrap().as_str(),
            "http://127.0.0.1:8080/v1/projects/study-group/databases/(default)/documents/files"
        );
    }

    #[test]
    fn test_collection_name_stays_one_segment() {
        let url = store().collection_url("files/../secrets?x=1#top").unwrap();
        assert_eq!(
            url.path(),
            "/v1/projects/study-group/databases/(default)/documents/files%2F..%2Fsecrets%3Fx=1%23top"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_invalid_base_url_is_an_error() {
        let store = FirestoreStore::new(FirestoreConfig {
            base_url: "not a url".into(),
            project_id: "study-group".into(),
            api_key: None,
            token: None,
        });
        assert!(matches!(
            store.collection_url("files"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_decode_page() {
        let body = r#"{
            "documents": [
                {
                    "name": "projects/study-group/databases/(default)/documents/files/a1",
                    "fields": { "name": { "stringValue": "syllabus.pdf" } },
                    "createTime": "2024-02-01T10:00:00Z"
                },
                {
                    "name": "projects/study-group/databases/(default)/documents/files/a2",
                    "fields": { "size": { "integerValue": "12" } }
                }
            ],
            "nextPageToken": "abc"
        }"#;
        let (records, next) = decode_page(body).unwrap();
        assert_eq!(records, vec![FileRecord::new("syllabus.pdf", Origin::Stored)]);
        assert_eq!(next.as_deref(), Some("abc"));
    }

    #[test]
    fn test_decode_empty_collection() {
        let (records, next) = decode_page("{}").unwrap();
        assert!(records.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_encode_document() {
        let doc = encode_document(&FileRecord::new("notes.pptx", Origin::Local));
        assert_eq!(doc, json!({"fields": {"name": {"stringValue": "notes.pptx"}}}));
    }

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/files/XyZ"),
            "XyZ"
        );
        assert_eq!(document_id("plain"), "plain");
    }
}
