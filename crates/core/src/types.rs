use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Title substituted when the metadata service omits one.
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryIdentifier {
    pub kind: String,
    pub identifier: String,
}

/// Normalized metadata for one book.
///
/// `title` is never empty and `authors`/`categories` are always present
/// (possibly empty); optional identifiers stay `None` when the service
/// does not provide them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub description: String,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub categories: Vec<String>,
    pub page_count: Option<u32>,
    pub language: Option<String>,
    pub preview_link: Option<String>,
    pub industry_identifiers: Vec<IndustryIdentifier>,
}

impl BookRecord {
    /// Creates a record with only a title; blank titles become [`UNTITLED`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bookwise_core::types::{BookRecord, UNTITLED};
    ///
    /// let book = BookRecord::new("Dune").with_authors(["Frank Herbert"]);
    /// assert_eq!(book.title, "Dune");
    /// assert_eq!(BookRecord::new("   ").title, UNTITLED);
    /// ```
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            title
        };
        Self {
            id: None,
            title,
            subtitle: None,
            authors: Vec::new(),
            description: String::new(),
            publisher: None,
            published_date: None,
            categories: Vec::new(),
            page_count: None,
            language: None,
            preview_link: None,
            industry_identifiers: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the ISBN-13 if present, otherwise the ISBN-10.
    pub fn isbn(&self) -> Option<&str> {
        ["ISBN_13", "ISBN_10"].iter().find_map(|kind| {
            self.industry_identifiers
                .iter()
                .find(|id| id.kind == *kind)
                .map(|id| id.identifier.as_str())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub max_results: u32,
}

impl SearchQuery {
    pub const DEFAULT_MAX_RESULTS: u32 = 5;

    pub fn new(text: impl Into<String>, max_results: u32) -> Self {
        Self {
            text: text.into(),
            max_results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub books: Vec<BookRecord>,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub title: String,
    pub max_recommendations: u32,
}

impl RecommendationRequest {
    pub const DEFAULT_MAX_RECOMMENDATIONS: u32 = 3;
}

/// Output of a completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub raw_provider_meta: BTreeMap<String, Value>,
}

/// How `recommend` derives its candidate search from the reference title.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendStrategy {
    /// Search with the reference title itself.
    Title,
    /// Look up the reference, then search its categories.
    #[default]
    Category,
}

impl std::str::FromStr for RecommendStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "category" | "categories" => Ok(Self::Category),
            other => Err(format!(
                "unknown recommend strategy `{other}` (expected `title` or `category`)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub status: String,
    pub phase: String,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooksConfig {
    pub endpoint: String,
    pub api_key_env_var: String,
}

impl Default for BooksConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::catalog::GOOGLE_BOOKS_ENDPOINT.to_string(),
            api_key_env_var: "GOOGLE_BOOKS_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub endpoint_env_var: String,
    pub api_key_env_var: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "cohere".to_string(),
            endpoint: None,
            model: "command".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            endpoint_env_var: "BOOKWISE_LLM_ENDPOINT".to_string(),
            api_key_env_var: "COHERE_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Per-book description budget, in characters.
    pub description_budget: usize,
    /// Upper bound on the assembled prompt, in characters.
    pub max_prompt_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            description_budget: 1_000,
            max_prompt_chars: 12_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub strategy: RecommendStrategy,
    pub max_categories: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            strategy: RecommendStrategy::Category,
            max_categories: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 15_000 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub books: BooksConfig,
    pub llm: LlmConfig,
    pub prompt: PromptConfig,
    pub recommend: RecommendConfig,
    pub timeouts: TimeoutConfig,
}
