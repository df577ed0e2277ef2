use crate::catalog::{BookCatalog, GOOGLE_BOOKS_MAX_RESULTS};
#[cfg(feature = "provider-cohere")]
use crate::catalog::{GoogleBooksCatalog, GOOGLE_BOOKS_ENDPOINT};
#[cfg(feature = "provider-cohere")]
use crate::http::build_client;
use crate::http::ServiceError;
use crate::prompt::build_prompt;
#[cfg(feature = "provider-cohere")]
use crate::providers::CohereProvider;
use crate::providers::CompletionProvider;
use crate::types::{
    AnalysisRequest, AppConfig, BookRecord, PromptConfig, RecommendConfig, RecommendStrategy,
    RecommendationRequest, SearchQuery,
};
#[cfg(feature = "provider-cohere")]
use crate::types::TimeoutConfig;
use futures::future::try_join_all;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// External service a failure originated from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Service {
    BookMetadata,
    TextCompletion,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BookMetadata => f.write_str("book metadata service"),
            Self::TextCompletion => f.write_str("text completion service"),
        }
    }
}

/// Errors surfaced by [`Assistant`] operations.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable { service: Service, reason: String },
    #[error("prompt of {size} characters is too large (limit {limit})")]
    ContentTooLarge { size: usize, limit: usize },
    #[error("no recommendations found for `{0}`")]
    NotFound(String),
    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse { service: Service, reason: String },
    #[error("missing credential: set {0}")]
    MissingCredential(String),
}

impl AssistantError {
    fn from_service(service: Service, err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidResponse(reason) => Self::InvalidResponse { service, reason },
            other => Self::ServiceUnavailable {
                service,
                reason: other.to_string(),
            },
        }
    }
}

/// The two credential values the assistant is built from.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    books_api_key: String,
    completion_api_key: String,
}

impl Credentials {
    pub const BOOKS_API_KEY_VAR: &'static str = "GOOGLE_BOOKS_API_KEY";
    pub const COMPLETION_API_KEY_VAR: &'static str = "COHERE_API_KEY";

    pub fn new(books_api_key: impl Into<String>, completion_api_key: impl Into<String>) -> Self {
        Self {
            books_api_key: books_api_key.into(),
            completion_api_key: completion_api_key.into(),
        }
    }

    /// Reads both keys from the process environment.
    pub fn from_env() -> Result<Self, AssistantError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(env_get: F) -> Result<Self, AssistantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| {
            env_get(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AssistantError::MissingCredential(var.to_string()))
        };
        Ok(Self {
            books_api_key: lookup(Self::BOOKS_API_KEY_VAR)?,
            completion_api_key: lookup(Self::COMPLETION_API_KEY_VAR)?,
        })
    }

    pub fn books_api_key(&self) -> &str {
        &self.books_api_key
    }

    pub fn completion_api_key(&self) -> &str {
        &self.completion_api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("books_api_key", &"<redacted>")
            .field("completion_api_key", &"<redacted>")
            .finish()
    }
}

/// Tunables for prompt shaping and recommendation derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSettings {
    pub description_budget: usize,
    pub max_prompt_chars: usize,
    pub strategy: RecommendStrategy,
    pub max_categories: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        let prompt = PromptConfig::default();
        let recommend = RecommendConfig::default();
        Self {
            description_budget: prompt.description_budget,
            max_prompt_chars: prompt.max_prompt_chars,
            strategy: recommend.strategy,
            max_categories: recommend.max_categories,
        }
    }
}

impl From<&AppConfig> for AssistantSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            description_budget: cfg.prompt.description_budget,
            max_prompt_chars: cfg.prompt.max_prompt_chars,
            strategy: cfg.recommend.strategy,
            max_categories: cfg.recommend.max_categories,
        }
    }
}

/// Facade over a [`BookCatalog`] and a [`CompletionProvider`].
///
/// Every operation is a stateless round trip; the assistant can be shared
/// across tasks when its collaborators can.
pub struct Assistant<C, P>
where
    C: BookCatalog,
    P: CompletionProvider,
{
    catalog: C,
    provider: P,
    settings: AssistantSettings,
}

#[cfg(feature = "provider-cohere")]
impl Assistant<GoogleBooksCatalog, CohereProvider> {
    /// Google Books plus Cohere `command`, using default endpoints and timeouts.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, AssistantError> {
        let timeout = TimeoutConfig::default().request_timeout();
        let client = build_client(timeout)
            .map_err(|e| AssistantError::from_service(Service::BookMetadata, e))?;
        let catalog = GoogleBooksCatalog::new(
            GOOGLE_BOOKS_ENDPOINT.to_string(),
            credentials.books_api_key().to_string(),
        )
        .with_client(client.clone());
        let provider = CohereProvider::with_api_key(credentials.completion_api_key().to_string())
            .with_client(client);
        Ok(Self::new(catalog, provider))
    }
}

impl<C, P> Assistant<C, P>
where
    C: BookCatalog,
    P: CompletionProvider,
{
    pub fn new(catalog: C, provider: P) -> Self {
        Self {
            catalog,
            provider,
            settings: AssistantSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AssistantSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    /// Keyword search returning at most `max_results` normalized records.
    ///
    /// # Examples
    ///
    /// ```
    /// use bookwise_core::assistant::Assistant;
    /// use bookwise_core::catalog::StaticCatalog;
    /// use bookwise_core::providers::MockProvider;
    /// use bookwise_core::types::BookRecord;
    ///
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// let catalog = StaticCatalog::new().with_results("dune", vec![BookRecord::new("Dune")]);
    /// let assistant = Assistant::new(catalog, MockProvider);
    /// let books = assistant.search("dune", 5).await?;
    /// assert_eq!(books[0].title, "Dune");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<BookRecord>, AssistantError> {
        if query.trim().is_empty() {
            return Err(AssistantError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        if max_results == 0 {
            return Err(AssistantError::InvalidQuery(
                "max results must be at least 1".to_string(),
            ));
        }
        self.run_search(&SearchQuery::new(query.trim(), max_results))
            .await
    }

    /// Asks the completion service `question` about `books`.
    pub async fn analyze(
        &self,
        books: &[BookRecord],
        question: &str,
    ) -> Result<String, AssistantError> {
        self.analyze_request(&AnalysisRequest {
            books: books.to_vec(),
            question: question.to_string(),
        })
        .await
    }

    pub async fn analyze_request(
        &self,
        request: &AnalysisRequest,
    ) -> Result<String, AssistantError> {
        if request.books.is_empty() {
            return Err(AssistantError::InvalidInput(
                "at least one book is required".to_string(),
            ));
        }
        if request.question.trim().is_empty() {
            return Err(AssistantError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let prompt = build_prompt(request, self.settings.description_budget);
        let size = prompt.chars().count();
        let limit = self.settings.max_prompt_chars;
        if size > limit {
            return Err(AssistantError::ContentTooLarge { size, limit });
        }

        tracing::debug!(
            books = request.books.len(),
            prompt_chars = size,
            "submitting analysis prompt"
        );
        let completion = self.provider.complete(&prompt).await.map_err(|e| {
            if e.status() == Some(413) {
                AssistantError::ContentTooLarge { size, limit }
            } else {
                AssistantError::from_service(Service::TextCompletion, e)
            }
        })?;
        Ok(completion.text)
    }

    /// Recommends up to `max_recommendations` books related to `title`.
    ///
    /// Candidates titled exactly like the reference are skipped, as are
    /// duplicates. An empty result is reported as [`AssistantError::NotFound`].
    pub async fn recommend(
        &self,
        title: &str,
        max_recommendations: u32,
    ) -> Result<Vec<BookRecord>, AssistantError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AssistantError::InvalidQuery(
                "book title must not be empty".to_string(),
            ));
        }
        if max_recommendations == 0 {
            return Err(AssistantError::InvalidQuery(
                "max recommendations must be at least 1".to_string(),
            ));
        }
        self.recommend_request(&RecommendationRequest {
            title: title.to_string(),
            max_recommendations,
        })
        .await
    }

    async fn recommend_request(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<BookRecord>, AssistantError> {
        let mut excluded = vec![request.title.clone()];
        let candidates = match self.settings.strategy {
            RecommendStrategy::Title => self.title_candidates(request).await?,
            RecommendStrategy::Category => {
                let lookup = self
                    .run_search(&SearchQuery::new(request.title.clone(), 1))
                    .await?;
                let Some(reference) = lookup.into_iter().next() else {
                    return Err(AssistantError::NotFound(request.title.clone()));
                };
                excluded.push(reference.title.clone());
                self.category_candidates(request, &reference).await?
            }
        };

        let picks = select_recommendations(
            candidates,
            &excluded,
            request.max_recommendations as usize,
        );
        tracing::debug!(
            title = %request.title,
            strategy = ?self.settings.strategy,
            picked = picks.len(),
            "recommendation search complete"
        );
        if picks.is_empty() {
            return Err(AssistantError::NotFound(request.title.clone()));
        }
        Ok(picks)
    }

    async fn title_candidates(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<BookRecord>, AssistantError> {
        // Editions often share the reference title exactly, so leave room for several.
        let k = request.max_recommendations;
        let max = k
            .saturating_mul(2)
            .saturating_add(1)
            .min(GOOGLE_BOOKS_MAX_RESULTS.max(k.saturating_add(1)));
        self.run_search(&SearchQuery::new(request.title.clone(), max))
            .await
    }

    async fn category_candidates(
        &self,
        request: &RecommendationRequest,
        reference: &BookRecord,
    ) -> Result<Vec<BookRecord>, AssistantError> {
        if reference.categories.is_empty() {
            tracing::debug!(
                title = %reference.title,
                "reference has no categories; searching by title"
            );
            return self.title_candidates(request).await;
        }

        let searches = reference
            .categories
            .iter()
            .take(self.settings.max_categories.max(1))
            .map(|category| {
                let query = SearchQuery::new(
                    format!("subject:{category}"),
                    request.max_recommendations,
                );
                async move { self.run_search(&query).await }
            });
        let pages = try_join_all(searches).await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn run_search(&self, query: &SearchQuery) -> Result<Vec<BookRecord>, AssistantError> {
        let mut records = self
            .catalog
            .search(query)
            .await
            .map_err(|e| AssistantError::from_service(Service::BookMetadata, e))?;
        records.truncate(query.max_results as usize);
        Ok(records)
    }
}

fn select_recommendations(
    candidates: Vec<BookRecord>,
    excluded: &[String],
    max: usize,
) -> Vec<BookRecord> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|book| !excluded.iter().any(|title| *title == book.title))
        .filter(|book| seen.insert(dedup_key(book)))
        .take(max)
        .collect()
}

fn dedup_key(book: &BookRecord) -> String {
    match &book.id {
        Some(id) => format!("id:{id}"),
        None => format!("title:{}|{}", book.title, book.authors.join(",")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::providers::MockProvider;
    use crate::types::Completion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn titled(titles: &[&str]) -> Vec<BookRecord> {
        titles
            .iter()
            .map(|t| BookRecord::new(*t).with_authors(["Someone"]))
            .collect()
    }

    /// Ignores the requested bound and always returns everything.
    struct OverfullCatalog(Vec<BookRecord>);

    #[async_trait]
    impl BookCatalog for OverfullCatalog {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<BookRecord>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    struct DownCatalog;

    #[async_trait]
    impl BookCatalog for DownCatalog {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<BookRecord>, ServiceError> {
            Err(ServiceError::Request("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for CountingProvider {
        async fn complete(&self, prompt: &str) -> Result<Completion, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            MockProvider.complete(prompt).await
        }
    }

    #[tokio::test]
    async fn search_rejects_empty_query_and_zero_bound() {
        let assistant = Assistant::new(StaticCatalog::new(), MockProvider);
        assert!(matches!(
            assistant.search("", 5).await,
            Err(AssistantError::InvalidQuery(_))
        ));
        assert!(matches!(
            assistant.search("   ", 5).await,
            Err(AssistantError::InvalidQuery(_))
        ));
        assert!(matches!(
            assistant.search("dune", 0).await,
            Err(AssistantError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn search_preserves_titles_verbatim() {
        let titles = [
            "Superintelligence: Paths, Dangers, Strategies",
            "Life 3.0",
            "Human Compatible",
            "Weapons of Math Destruction",
            "The Alignment Problem",
        ];
        let catalog =
            StaticCatalog::new().with_results("artificial intelligence ethics", titled(&titles));
        let assistant = Assistant::new(catalog, MockProvider);

        let books = assistant
            .search("artificial intelligence ethics", 5)
            .await
            .expect("search should succeed");
        let got: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(got, titles);
    }

    #[tokio::test]
    async fn search_never_exceeds_bound() {
        let assistant = Assistant::new(
            OverfullCatalog(titled(&["a", "b", "c", "d", "e", "f"])),
            MockProvider,
        );
        for max in 1..=6 {
            let books = assistant.search("q", max).await.expect("search");
            assert!(books.len() <= max as usize);
            assert!(books.iter().all(|b| !b.title.is_empty()));
        }
    }

    #[tokio::test]
    async fn search_reports_unreachable_catalog() {
        let assistant = Assistant::new(DownCatalog, MockProvider);
        let err = assistant.search("dune", 5).await.expect_err("catalog down");
        assert!(matches!(
            err,
            AssistantError::ServiceUnavailable {
                service: Service::BookMetadata,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn analyze_rejects_empty_books_and_question() {
        let assistant = Assistant::new(StaticCatalog::new(), MockProvider);
        assert!(matches!(
            assistant.analyze(&[], "any question").await,
            Err(AssistantError::InvalidInput(_))
        ));
        assert!(matches!(
            assistant.analyze(&titled(&["Dune"]), "  ").await,
            Err(AssistantError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn analyze_is_deterministic_against_stub() {
        let assistant = Assistant::new(StaticCatalog::new(), MockProvider);
        let books = titled(&["Dune", "Emma"]);
        let first = assistant
            .analyze(&books, "Which is older?")
            .await
            .expect("analyze");
        let second = assistant
            .analyze(&books, "Which is older?")
            .await
            .expect("analyze");
        assert_eq!(first, second);
        assert_eq!(first, "mock analysis of 2 book(s) for question: Which is older?");
    }

    #[tokio::test]
    async fn oversized_prompt_fails_before_calling_provider() {
        let assistant = Assistant::new(StaticCatalog::new(), CountingProvider::default())
            .with_settings(AssistantSettings {
                max_prompt_chars: 200,
                ..AssistantSettings::default()
            });
        let books = titled(&["a"; 20]);
        let err = assistant
            .analyze(&books, "summarize")
            .await
            .expect_err("prompt too large");
        assert!(matches!(
            err,
            AssistantError::ContentTooLarge { limit: 200, .. }
        ));
        assert_eq!(assistant.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "provider-cohere")]
    #[tokio::test]
    async fn completion_503_is_service_unavailable() {
        use crate::http::stub::StubServer;

        let server = StubServer::spawn(503, r#"{"message":"service unavailable"}"#).await;
        let provider = CohereProvider::new(
            server.url.clone(),
            "k".to_string(),
            "command".to_string(),
            0.7,
            500,
        )
        .with_client(server.client());
        let assistant = Assistant::new(StaticCatalog::new(), provider);
        let err = assistant
            .analyze(&titled(&["Dune"]), "Is it good?")
            .await
            .expect_err("503 must fail");
        assert!(matches!(
            err,
            AssistantError::ServiceUnavailable {
                service: Service::TextCompletion,
                ..
            }
        ));
    }

    #[cfg(feature = "provider-cohere")]
    #[tokio::test]
    async fn completion_413_is_content_too_large() {
        use crate::http::stub::StubServer;

        let server = StubServer::spawn(413, r#"{"message":"too many tokens"}"#).await;
        let provider = CohereProvider::new(
            server.url.clone(),
            "k".to_string(),
            "command".to_string(),
            0.7,
            500,
        )
        .with_client(server.client());
        let assistant = Assistant::new(StaticCatalog::new(), provider);
        let err = assistant
            .analyze(&titled(&["Dune"]), "Is it good?")
            .await
            .expect_err("413 must fail");
        assert!(matches!(err, AssistantError::ContentTooLarge { .. }));
    }

    #[tokio::test]
    async fn unreachable_catalog_error_omits_api_key() {
        use crate::catalog::GoogleBooksCatalog;
        use crate::http::stub::client_with_timeout;
        use std::time::Duration;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let catalog =
            GoogleBooksCatalog::new(format!("http://{addr}/books"), "s3cret".to_string())
                .with_client(client_with_timeout(Duration::from_secs(5)));
        let assistant = Assistant::new(catalog, MockProvider);

        let err = assistant.search("dune", 5).await.expect_err("closed port");
        assert!(matches!(
            err,
            AssistantError::ServiceUnavailable {
                service: Service::BookMetadata,
                ..
            }
        ));
        assert!(!err.to_string().contains("s3cret"));
    }

    #[tokio::test]
    async fn stalled_catalog_times_out_as_unavailable() {
        use crate::catalog::GoogleBooksCatalog;
        use crate::http::stub::{client_with_timeout, StubServer};
        use std::time::Duration;

        let server = StubServer::stalled().await;
        let catalog = GoogleBooksCatalog::new(server.url.clone(), "s3cret".to_string())
            .with_client(client_with_timeout(Duration::from_millis(200)));
        let assistant = Assistant::new(catalog, MockProvider);

        let err = tokio::time::timeout(Duration::from_secs(10), assistant.search("dune", 5))
            .await
            .expect("request timeout should fire first")
            .expect_err("stalled catalog");
        assert!(matches!(
            err,
            AssistantError::ServiceUnavailable {
                service: Service::BookMetadata,
                ..
            }
        ));
        assert!(!err.to_string().contains("s3cret"));
    }

    #[cfg(feature = "provider-cohere")]
    #[test]
    fn from_credentials_targets_default_services() {
        use crate::providers::COHERE_GENERATE_ENDPOINT;

        let assistant = Assistant::from_credentials(&Credentials::new("books", "cohere"))
            .expect("default clients build");
        assert_eq!(assistant.catalog.endpoint, GOOGLE_BOOKS_ENDPOINT);
        assert_eq!(assistant.provider.endpoint, COHERE_GENERATE_ENDPOINT);
        assert_eq!(assistant.provider.model, "command");
        assert_eq!(assistant.settings(), &AssistantSettings::default());
    }

    #[tokio::test]
    async fn title_strategy_excludes_reference_and_respects_bound() {
        let catalog = StaticCatalog::new().with_results(
            "Dune",
            titled(&["Dune", "Dune Messiah", "Hyperion", "Foundation", "Solaris"]),
        );
        let assistant = Assistant::new(catalog, MockProvider).with_settings(AssistantSettings {
            strategy: RecommendStrategy::Title,
            ..AssistantSettings::default()
        });

        let picks = assistant.recommend("Dune", 3).await.expect("recommend");
        assert_eq!(picks.len(), 3);
        assert!(picks.iter().all(|b| b.title != "Dune"));
        assert_eq!(assistant.catalog.queries()[0].max_results, 7);
    }

    #[tokio::test]
    async fn title_strategy_skips_repeated_editions_of_reference() {
        let mut editions = titled(&["Dune", "Dune", "Dune"]);
        for (i, book) in editions.iter_mut().enumerate() {
            book.id = Some(format!("dune-{i}"));
        }
        editions.extend(titled(&["Dune Messiah", "Children of Dune", "Hyperion"]));
        let catalog = StaticCatalog::new().with_results("Dune", editions);
        let assistant = Assistant::new(catalog, MockProvider).with_settings(AssistantSettings {
            strategy: RecommendStrategy::Title,
            ..AssistantSettings::default()
        });

        let picks = assistant.recommend("Dune", 3).await.expect("recommend");
        let titles: Vec<_> = picks.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Dune Messiah", "Children of Dune", "Hyperion"]);
    }

    #[tokio::test]
    async fn title_strategy_overfetch_stays_within_catalog_limit() {
        let assistant = Assistant::new(StaticCatalog::new(), MockProvider).with_settings(
            AssistantSettings {
                strategy: RecommendStrategy::Title,
                ..AssistantSettings::default()
            },
        );
        let _ = assistant.recommend("Dune", 30).await;
        let _ = assistant.recommend("Dune", 50).await;
        let queries = assistant.catalog.queries();
        assert_eq!(queries[0].max_results, GOOGLE_BOOKS_MAX_RESULTS);
        assert_eq!(queries[1].max_results, 51);
    }

    #[tokio::test]
    async fn category_strategy_searches_subjects_and_dedupes() {
        let reference = BookRecord::new("Superintelligence")
            .with_id("ref")
            .with_categories(["Computers", "Philosophy"]);
        let life = BookRecord::new("Life 3.0").with_id("life");
        let catalog = StaticCatalog::new()
            .with_results("Superintelligence by Nick Bostrom", vec![reference.clone()])
            .with_results(
                "subject:Computers",
                vec![
                    reference,
                    life.clone(),
                    BookRecord::new("Human Compatible").with_id("hc"),
                ],
            )
            .with_results(
                "subject:Philosophy",
                vec![life, BookRecord::new("Ethics").with_id("eth")],
            );
        let assistant = Assistant::new(catalog, MockProvider);

        let picks = assistant
            .recommend("Superintelligence by Nick Bostrom", 3)
            .await
            .expect("recommend");
        let titles: Vec<_> = picks.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Life 3.0", "Human Compatible", "Ethics"]);

        let queries = assistant.catalog.queries();
        assert_eq!(queries[0], SearchQuery::new("Superintelligence by Nick Bostrom", 1));
        assert_eq!(queries.len(), 3);
    }

    #[tokio::test]
    async fn category_strategy_caps_category_searches() {
        let reference =
            BookRecord::new("Emma").with_categories(["Fiction", "Romance", "Classics"]);
        let catalog = StaticCatalog::new()
            .with_results("Emma", vec![reference])
            .with_results("subject:Fiction", titled(&["Persuasion"]));
        let assistant = Assistant::new(catalog, MockProvider).with_settings(AssistantSettings {
            max_categories: 1,
            ..AssistantSettings::default()
        });

        let picks = assistant.recommend("Emma", 3).await.expect("recommend");
        assert_eq!(picks.len(), 1);
        assert_eq!(assistant.catalog.queries().len(), 2);
    }

    #[tokio::test]
    async fn category_strategy_falls_back_to_title_search() {
        let catalog = StaticCatalog::new().with_results(
            "Obscure Book",
            titled(&["Obscure Book", "Obscure Book Companion"]),
        );
        let assistant = Assistant::new(catalog, MockProvider);

        let picks = assistant.recommend("Obscure Book", 2).await.expect("recommend");
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].title, "Obscure Book Companion");
    }

    #[tokio::test]
    async fn recommend_reports_not_found() {
        let assistant = Assistant::new(StaticCatalog::new(), MockProvider);
        assert!(matches!(
            assistant.recommend("Nothing Matches", 3).await,
            Err(AssistantError::NotFound(_))
        ));

        let only_self = StaticCatalog::new().with_results("Dune", titled(&["Dune"]));
        let assistant = Assistant::new(only_self, MockProvider);
        assert!(matches!(
            assistant.recommend("Dune", 3).await,
            Err(AssistantError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn recommend_validates_input() {
        let assistant = Assistant::new(StaticCatalog::new(), MockProvider);
        assert!(matches!(
            assistant.recommend("", 3).await,
            Err(AssistantError::InvalidQuery(_))
        ));
        assert!(matches!(
            assistant.recommend("Dune", 0).await,
            Err(AssistantError::InvalidQuery(_))
        ));
    }

    #[test]
    fn credentials_report_missing_variable() {
        let err = Credentials::from_lookup(|k| {
            (k == Credentials::BOOKS_API_KEY_VAR).then(|| "books".to_string())
        })
        .expect_err("completion key missing");
        assert!(err.to_string().contains("COHERE_API_KEY"));

        let creds =
            Credentials::from_lookup(|_| Some("s3cret".to_string())).expect("both keys");
        assert_eq!(creds.books_api_key(), "s3cret");
        assert!(!format!("{creds:?}").contains("s3cret"));
    }
}
