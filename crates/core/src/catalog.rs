use crate::http::{default_client, send_json, ServiceError};
use crate::types::{BookRecord, IndustryIdentifier, SearchQuery};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

pub const GOOGLE_BOOKS_ENDPOINT: &str = "https://www.googleapis.com/books/v1/volumes";

/// Largest `maxResults` the volumes endpoint accepts.
pub const GOOGLE_BOOKS_MAX_RESULTS: u32 = 40;

/// Keyword search over a book metadata source.
#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<BookRecord>, ServiceError>;
}

#[async_trait]
impl<T> BookCatalog for Box<T>
where
    T: BookCatalog + ?Sized,
{
    async fn search(&self, query: &SearchQuery) -> Result<Vec<BookRecord>, ServiceError> {
        (**self).search(query).await
    }
}

#[derive(Clone)]
pub struct GoogleBooksCatalog {
    pub endpoint: String,
    api_key: String,
    client: Client,
}

impl GoogleBooksCatalog {
    /// Uses a client bounded by the default request timeout.
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            client: default_client(),
        }
    }

    /// Replaces the HTTP client, e.g. with one from [`crate::http::build_client`].
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

impl fmt::Debug for GoogleBooksCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleBooksCatalog")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VolumesPage {
    items: Option<Vec<Volume>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Volume {
    id: Option<String>,
    volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Option<Vec<String>>,
    description: Option<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    categories: Option<Vec<String>>,
    page_count: Option<u32>,
    language: Option<String>,
    preview_link: Option<String>,
    industry_identifiers: Option<Vec<RawIdentifier>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl From<Volume> for BookRecord {
    fn from(volume: Volume) -> Self {
        let info = volume.volume_info.unwrap_or_default();
        let mut record = BookRecord::new(info.title.unwrap_or_default());
        record.id = volume.id;
        record.subtitle = info.subtitle;
        record.authors = info.authors.unwrap_or_default();
        record.description = info.description.unwrap_or_default();
        record.publisher = info.publisher;
        record.published_date = info.published_date;
        record.categories = info.categories.unwrap_or_default();
        record.page_count = info.page_count;
        record.language = info.language;
        record.preview_link = info.preview_link;
        record.industry_identifiers = info
            .industry_identifiers
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !id.identifier.is_empty())
            .map(|id| IndustryIdentifier {
                kind: id.kind,
                identifier: id.identifier,
            })
            .collect();
        record
    }
}

fn records_from_page(page: VolumesPage, limit: usize) -> Vec<BookRecord> {
    page.items
        .unwrap_or_default()
        .into_iter()
        .take(limit)
        .map(BookRecord::from)
        .collect()
}

#[async_trait]
impl BookCatalog for GoogleBooksCatalog {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<BookRecord>, ServiceError> {
        let max_results = query.max_results.clamp(1, GOOGLE_BOOKS_MAX_RESULTS);
        let max_param = max_results.to_string();
        let mut params = vec![("q", query.text.as_str()), ("maxResults", max_param.as_str())];
        if !self.api_key.is_empty() {
            params.push(("key", self.api_key.as_str()));
        }

        tracing::debug!(query = %query.text, max_results, "searching google books");
        let page: VolumesPage = send_json(self.client.get(&self.endpoint).query(&params)).await?;
        Ok(records_from_page(page, max_results as usize))
    }
}

/// In-memory catalog answering exact query strings with canned records.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    results: HashMap<String, Vec<BookRecord>>,
    seen: Mutex<Vec<SearchQuery>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: impl Into<String>, records: Vec<BookRecord>) -> Self {
        self.results.insert(query.into(), records);
        self
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl BookCatalog for StaticCatalog {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<BookRecord>, ServiceError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        Ok(self
            .results
            .get(&query.text)
            .map(|records| {
                records
                    .iter()
                    .take(query.max_results as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
