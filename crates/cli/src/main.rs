use bookwise_core::assistant::{Assistant, AssistantError, AssistantSettings};
use bookwise_core::catalog::{BookCatalog, GoogleBooksCatalog};
use bookwise_core::http::build_client;
#[cfg(feature = "provider-cohere")]
use bookwise_core::providers::{CohereProvider, COHERE_GENERATE_ENDPOINT};
use bookwise_core::providers::{CompletionProvider, MockProvider};
#[cfg(feature = "provider-openai-compat")]
use bookwise_core::providers::{OpenAICompatProvider, OPENAI_CHAT_ENDPOINT};
use bookwise_core::types::{AppConfig, BookRecord, JsonEnvelope, RecommendStrategy};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;
use url::Url;

const DEMO_QUERY: &str = "artificial intelligence ethics";
const DEMO_QUESTION: &str =
    "What are the main ethical concerns discussed in these books regarding AI?";
const DEMO_TITLE: &str = "Superintelligence by Nick Bostrom";

#[derive(Debug, Parser)]
#[command(
    name = "bookwise",
    version,
    about = "Search books, ask an LLM about them, and find similar titles"
)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,
    /// Completion provider override (cohere, openai_compat, mock).
    #[arg(long, global = true)]
    provider: Option<String>,
    #[arg(long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    InitConfig {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    Search {
        query: String,
        #[arg(long = "max", default_value_t = 5)]
        max_results: u32,
    },
    Analyze {
        query: String,
        #[arg(long)]
        question: String,
        #[arg(long = "max", default_value_t = 5)]
        max_results: u32,
    },
    Recommend {
        title: String,
        #[arg(long = "max", default_value_t = 3)]
        max_recommendations: u32,
        #[arg(long)]
        strategy: Option<RecommendStrategy>,
    },
    /// Search, analyze, and recommend with a fixed example.
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.cmd {
        init_config_file(Path::new(".bookwise.toml"), force)?;
        println!("initialized .bookwise.toml");
        return Ok(());
    }

    let mut cfg = load_config()?;
    if let Some(p) = cli.provider {
        cfg.llm.provider = p;
    }
    if let Some(m) = cli.model {
        cfg.llm.model = m;
    }
    if let Commands::Recommend {
        strategy: Some(strategy),
        ..
    } = &cli.cmd
    {
        cfg.recommend.strategy = *strategy;
    }

    let assistant = build_assistant(&cfg, |k| std::env::var(k).ok())?;

    match cli.cmd {
        Commands::InitConfig { .. } => {}
        Commands::Search { query, max_results } => {
            let books = assistant
                .search(&query, max_results)
                .await
                .map_err(render_assistant_error)?;
            print_books("search", &books, cli.json)?;
        }
        Commands::Analyze {
            query,
            question,
            max_results,
        } => {
            let books = assistant
                .search(&query, max_results)
                .await
                .map_err(render_assistant_error)?;
            let analysis = assistant
                .analyze(&books, &question)
                .await
                .map_err(render_assistant_error)?;
            if cli.json {
                print_envelope(
                    "analyze",
                    "analysis completed",
                    json!({"books": books, "analysis": analysis}),
                )?;
            } else {
                println!("{analysis}");
            }
        }
        Commands::Recommend {
            title,
            max_recommendations,
            ..
        } => {
            let books = assistant
                .recommend(&title, max_recommendations)
                .await
                .map_err(render_assistant_error)?;
            print_books("recommend", &books, cli.json)?;
        }
        Commands::Demo => run_demo(&assistant, cli.json).await?,
    }

    Ok(())
}

struct DemoReport {
    books: Vec<BookRecord>,
    analysis: Option<String>,
    recommendations: Vec<BookRecord>,
}

async fn demo_report<C, P>(assistant: &Assistant<C, P>) -> Result<DemoReport, AssistantError>
where
    C: BookCatalog,
    P: CompletionProvider,
{
    let books = assistant.search(DEMO_QUERY, 5).await?;
    let analysis = if books.is_empty() {
        tracing::warn!(query = DEMO_QUERY, "demo search found no books; skipping analysis");
        None
    } else {
        Some(assistant.analyze(&books, DEMO_QUESTION).await?)
    };
    let recommendations = assistant.recommend(DEMO_TITLE, 3).await?;
    Ok(DemoReport {
        books,
        analysis,
        recommendations,
    })
}

async fn run_demo<C, P>(assistant: &Assistant<C, P>, json_output: bool) -> anyhow::Result<()>
where
    C: BookCatalog,
    P: CompletionProvider,
{
    let report = demo_report(assistant)
        .await
        .map_err(render_assistant_error)?;

    if json_output {
        return print_envelope(
            "demo",
            "demo completed",
            json!({
                "books": report.books,
                "analysis": report.analysis,
                "recommendations": report.recommendations,
            }),
        );
    }

    match &report.analysis {
        Some(analysis) => println!("Analysis: {analysis}"),
        None => println!("Analysis: no books found for \"{DEMO_QUERY}\""),
    }
    println!("\nRecommended Books:");
    for book in &report.recommendations {
        println!("{}", format_book_line(book));
    }
    Ok(())
}

fn print_books(phase: &str, books: &[BookRecord], json_output: bool) -> anyhow::Result<()> {
    if json_output {
        return print_envelope(
            phase,
            &format!("{} book(s)", books.len()),
            json!({ "books": books }),
        );
    }
    if books.is_empty() {
        println!("no books found");
    }
    for book in books {
        println!("{}", format_book_line(book));
    }
    Ok(())
}

fn print_envelope(phase: &str, message: &str, details: serde_json::Value) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonEnvelope {
            status: "ok".to_string(),
            phase: phase.to_string(),
            message: message.to_string(),
            details,
        })?
    );
    Ok(())
}

fn format_book_line(book: &BookRecord) -> String {
    if book.authors.is_empty() {
        format!("- {}", book.title)
    } else {
        format!("- {} by {}", book.title, book.authors.join(", "))
    }
}

fn build_assistant<F>(
    cfg: &AppConfig,
    env_get: F,
) -> anyhow::Result<Assistant<GoogleBooksCatalog, Box<dyn CompletionProvider>>>
where
    F: Fn(&str) -> Option<String> + Copy,
{
    tracing::debug!(
        provider = %cfg.llm.provider,
        model = %cfg.llm.model,
        strategy = ?cfg.recommend.strategy,
        timeout_ms = cfg.timeouts.request_ms,
        "building assistant"
    );
    let client = build_client(cfg.timeouts.request_timeout())?;
    let catalog = build_catalog(cfg, env_get, client.clone())?;
    let provider = build_provider(cfg, env_get, client)?;
    Ok(Assistant::new(catalog, provider).with_settings(AssistantSettings::from(cfg)))
}

fn build_catalog<F>(
    cfg: &AppConfig,
    env_get: F,
    client: Client,
) -> anyhow::Result<GoogleBooksCatalog>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = validate_endpoint(&cfg.books.endpoint)?;
    let api_key = require_credential(&cfg.books.api_key_env_var, &env_get)?;
    Ok(GoogleBooksCatalog::new(endpoint, api_key).with_client(client))
}

fn build_provider<F>(
    cfg: &AppConfig,
    env_get: F,
    client: Client,
) -> anyhow::Result<Box<dyn CompletionProvider>>
where
    F: Fn(&str) -> Option<String> + Copy,
{
    let provider = cfg.llm.provider.to_ascii_lowercase();
    let endpoint = resolve_provider_endpoint(cfg, env_get);

    match provider.as_str() {
        "mock" => Ok(Box::new(MockProvider)),
        #[cfg(feature = "provider-cohere")]
        "cohere" => Ok(Box::new(
            CohereProvider::new(
                validate_endpoint(endpoint.as_deref().unwrap_or(COHERE_GENERATE_ENDPOINT))?,
                require_credential(&cfg.llm.api_key_env_var, &env_get)?,
                cfg.llm.model.clone(),
                cfg.llm.temperature,
                cfg.llm.max_tokens,
            )
            .with_client(client),
        )),
        #[cfg(feature = "provider-openai-compat")]
        "openai_compat" | "chatgpt" => Ok(Box::new(
            OpenAICompatProvider::new(
                validate_endpoint(endpoint.as_deref().unwrap_or(OPENAI_CHAT_ENDPOINT))?,
                env_get(&cfg.llm.api_key_env_var),
                cfg.llm.model.clone(),
                cfg.llm.temperature,
                cfg.llm.max_tokens,
            )
            .with_client(client),
        )),
        #[cfg(feature = "provider-openai-compat")]
        "openrouter" => Ok(Box::new(
            OpenAICompatProvider::new(
                validate_endpoint(
                    endpoint
                        .as_deref()
                        .unwrap_or("https://openrouter.ai/api/v1/chat/completions"),
                )?,
                env_get(&cfg.llm.api_key_env_var),
                cfg.llm.model.clone(),
                cfg.llm.temperature,
                cfg.llm.max_tokens,
            )
            .with_client(client),
        )),
        other => anyhow::bail!(
            "unknown or disabled completion provider `{other}`; try one of: {}",
            available_providers().join(", ")
        ),
    }
}

fn available_providers() -> Vec<&'static str> {
    let mut names = vec!["mock"];
    if cfg!(feature = "provider-cohere") {
        names.push("cohere");
    }
    if cfg!(feature = "provider-openai-compat") {
        names.extend(["openai_compat", "chatgpt", "openrouter"]);
    }
    names
}

fn resolve_provider_endpoint<F>(cfg: &AppConfig, env_get: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    cfg.llm
        .endpoint
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env_get(&cfg.llm.endpoint_env_var))
        .filter(|v| !v.trim().is_empty())
}

fn require_credential<F>(var: &str, env_get: &F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    env_get(var)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| render_assistant_error(AssistantError::MissingCredential(var.to_string())))
}

fn validate_endpoint(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("invalid endpoint `{raw}`: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("endpoint `{raw}` must use http or https");
    }
    Ok(url.to_string())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let local_path = PathBuf::from(".bookwise.toml");
    let home_path = std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".bookwise.toml"));

    let home = match &home_path {
        Some(path) => read_config_value(path)?,
        None => None,
    };
    let local = read_config_value(&local_path)?;

    resolve_config(home, local, |k| std::env::var(k).ok())
}

fn resolve_config<F>(
    home: Option<Value>,
    local: Option<Value>,
    env_get: F,
) -> anyhow::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = Value::try_from(AppConfig::default())?;
    if let Some(home_value) = home {
        merge_toml(&mut merged, home_value);
    }
    if let Some(local_value) = local {
        merge_toml(&mut merged, local_value);
    }

    let mut cfg: AppConfig = merged.try_into()?;
    apply_env_overrides(&mut cfg, env_get);
    Ok(cfg)
}

fn read_config_value(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)?;
    let parsed = raw.parse::<Value>()?;
    Ok(Some(parsed))
}

fn merge_toml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_map), Value::Table(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn apply_env_overrides<F>(cfg: &mut AppConfig, env_get: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env_get("BOOKWISE_BOOKS_ENDPOINT") {
        cfg.books.endpoint = v;
    }
    if let Some(v) = env_get("BOOKWISE_BOOKS_API_KEY_ENV_VAR") {
        cfg.books.api_key_env_var = v;
    }

    if let Some(v) = env_get("BOOKWISE_PROVIDER") {
        cfg.llm.provider = v;
    }
    if let Some(v) = env_get("BOOKWISE_MODEL") {
        cfg.llm.model = v;
    }
    if let Some(v) = env_get("BOOKWISE_ENDPOINT") {
        cfg.llm.endpoint = Some(v);
    }
    if let Some(v) = env_get("BOOKWISE_TEMPERATURE").and_then(|v| v.parse::<f32>().ok()) {
        cfg.llm.temperature = v;
    }
    if let Some(v) = env_get("BOOKWISE_MAX_TOKENS").and_then(|v| v.parse::<u32>().ok()) {
        cfg.llm.max_tokens = v;
    }
    if let Some(v) = env_get("BOOKWISE_ENDPOINT_ENV_VAR") {
        cfg.llm.endpoint_env_var = v;
    }
    if let Some(v) = env_get("BOOKWISE_API_KEY_ENV_VAR") {
        cfg.llm.api_key_env_var = v;
    }

    if let Some(v) = env_get("BOOKWISE_DESCRIPTION_BUDGET").and_then(|v| v.parse::<usize>().ok()) {
        cfg.prompt.description_budget = v;
    }
    if let Some(v) = env_get("BOOKWISE_MAX_PROMPT_CHARS").and_then(|v| v.parse::<usize>().ok()) {
        cfg.prompt.max_prompt_chars = v;
    }

    if let Some(v) = env_get("BOOKWISE_RECOMMEND_STRATEGY").and_then(|v| v.parse().ok()) {
        cfg.recommend.strategy = v;
    }
    if let Some(v) = env_get("BOOKWISE_MAX_CATEGORIES").and_then(|v| v.parse::<usize>().ok()) {
        cfg.recommend.max_categories = v;
    }

    if let Some(v) = env_get("BOOKWISE_REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        cfg.timeouts.request_ms = v;
    }
}

fn init_config_file(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; re-run with --force to overwrite",
            path.display()
        );
    }
    fs::write(path, config_template())?;
    Ok(())
}

fn config_template() -> &'static str {
    r#"# bookwise configuration
# precedence: CLI > env > local .bookwise.toml > home ~/.bookwise.toml > defaults

[books]
endpoint = "https://www.googleapis.com/books/v1/volumes"
api_key_env_var = "GOOGLE_BOOKS_API_KEY"

[llm]
# provider options: cohere, openai_compat, chatgpt, openrouter, mock
provider = "cohere"
# optional explicit endpoint override
endpoint = ""
model = "command"
temperature = 0.7
max_tokens = 500
endpoint_env_var = "BOOKWISE_LLM_ENDPOINT"
api_key_env_var = "COHERE_API_KEY"

[prompt]
description_budget = 1000
max_prompt_chars = 12000

[recommend]
# strategy options: category, title
strategy = "category"
max_categories = 3

[timeouts]
request_ms = 15000
"#
}

fn render_assistant_error(err: AssistantError) -> anyhow::Error {
    match err {
        AssistantError::MissingCredential(var) => anyhow::anyhow!(
            "missing credential: export {var} or point the config at another variable"
        ),
        AssistantError::ContentTooLarge { size, limit } => anyhow::anyhow!(
            "prompt of {size} characters is too large (limit {limit}); search for fewer books or lower prompt.description_budget"
        ),
        other => anyhow::anyhow!(other),
    }
}
