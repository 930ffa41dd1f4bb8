use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lode_core::config::{Config, ProviderKind};
use lode_core::{AgentBuilder, RagWorkflow};
use lode_llm::any::AnyProvider;
use lode_llm::compatible::CompatibleProvider;
use lode_llm::openai::OpenAiProvider;
use lode_memory::VectorIndex;
use lode_memory::document::{SourceLoader, TextSplitter, WebLoader};
use lode_tools::retriever::format_documents;
use lode_tools::{CompositeExecutor, RetrieverExecutor, WikipediaExecutor};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";

#[derive(Debug, Parser)]
#[command(name = "lode", version, about = "Ask questions about your documents")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load sources, split them into chunks and save a fresh index.
    Ingest {
        /// URLs, PDF files, directories of PDFs, text files or URL lists.
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Print the indexed chunks nearest to a query.
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer a question using the index and the agent's tools.
    Ask {
        question: String,
        /// Also print the chunks retrieved for the question.
        #[arg(long)]
        show_sources: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let provider = Arc::new(create_provider(&config)?);
    tracing::debug!(provider = config.llm.provider.as_str(), model = %config.llm.model, "provider ready");

    match cli.command {
        Command::Ingest { sources } => ingest(&config, provider, &sources).await,
        Command::Search { query, k } => search(&config, provider, &query, k).await,
        Command::Ask {
            question,
            show_sources,
        } => ask(&config, provider, &question, show_sources).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(explicit: Option<&std::path::Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LODE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("LODE_OPENAI_API_KEY not found")?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                Some(api_key.expose().to_owned()),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                Some(llm.embedding_model.clone()),
            )))
        }
        ProviderKind::Ollama => {
            // OpenAI defaults left in place are swapped for their local counterparts.
            let base_url = if llm.base_url == OPENAI_BASE_URL {
                OLLAMA_BASE_URL.to_owned()
            } else {
                llm.base_url.clone()
            };
            let embedding_model = if llm.embedding_model == OPENAI_EMBEDDING_MODEL {
                OLLAMA_EMBEDDING_MODEL.to_owned()
            } else {
                llm.embedding_model.clone()
            };
            Ok(AnyProvider::Compatible(CompatibleProvider::new(
                ProviderKind::Ollama.as_str().to_owned(),
                None,
                base_url,
                llm.model.clone(),
                llm.max_tokens,
                Some(embedding_model),
            )))
        }
    }
}

async fn load_index(
    config: &Config,
    provider: Arc<AnyProvider>,
) -> anyhow::Result<VectorIndex<AnyProvider>> {
    let mut index: VectorIndex<_> = VectorIndex::new(provider);
    index.load(&config.index.path).await.with_context(|| {
        format!(
            "failed to load index from {} (run `lode ingest` first)",
            config.index.path.display()
        )
    })?;
    Ok(index)
}

async fn ingest(
    config: &Config,
    provider: Arc<AnyProvider>,
    sources: &[String],
) -> anyhow::Result<()> {
    let loader = SourceLoader::new(
        config.ingest.max_file_size,
        WebLoader::new(config.ingest.max_body_bytes),
    );
    let documents = loader.load(sources).await.context("failed to load sources")?;
    tracing::info!(documents = documents.len(), "sources loaded");

    let splitter = TextSplitter::new(config.ingest.splitter())?;
    let chunks = splitter.split_documents(&documents);
    tracing::info!(chunks = chunks.len(), "documents split");

    let mut index: VectorIndex<_> = VectorIndex::new(provider);
    index.build(&chunks).await.context("failed to build index")?;
    index
        .save(&config.index.path)
        .await
        .context("failed to save index")?;

    println!(
        "Indexed {} chunks from {} documents into {}",
        index.len(),
        documents.len(),
        config.index.path.display()
    );
    Ok(())
}

async fn search(
    config: &Config,
    provider: Arc<AnyProvider>,
    query: &str,
    k: Option<usize>,
) -> anyhow::Result<()> {
    let index = load_index(config, provider).await?;
    let chunks = index
        .retrieve(query, k.unwrap_or(config.index.top_k))
        .await
        .context("search failed")?;
    println!("{}", format_documents(&chunks));
    Ok(())
}

async fn ask(
    config: &Config,
    provider: Arc<AnyProvider>,
    question: &str,
    show_sources: bool,
) -> anyhow::Result<()> {
    let index = Arc::new(load_index(config, provider.clone()).await?);

    let retriever = RetrieverExecutor::new(index.clone(), &config.tools.retriever);
    let wikipedia = config
        .tools
        .wikipedia
        .enabled
        .then(|| WikipediaExecutor::new(&config.tools.wikipedia));
    let tools = CompositeExecutor::new(retriever, wikipedia);

    let mut builder =
        AgentBuilder::new(provider, tools).max_tool_iterations(config.agent.max_tool_iterations);
    if let Some(prompt) = &config.agent.system_prompt {
        builder = builder.system_prompt(prompt.as_str());
    }

    let workflow = RagWorkflow::new(index, builder.build()).with_top_k(config.index.top_k);
    let state = workflow.run(question).await.context("retrieval failed")?;

    println!("{}", state.answer.unwrap_or_default());
    if show_sources {
        println!("\n{}", format_documents(&state.retrieved_docs));
    }
    Ok(())
}
