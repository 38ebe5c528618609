mod search;
mod setup;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crumb_core::answer::AnswerPipeline;
use crumb_core::config::Config;
use crumb_core::indexer::{IndexOutcome, Indexer};
use crumb_core::retriever::Retriever;
use crumb_gateway::{AskRequest, GatewayServer};
use crumb_llm::any::AnyProvider;
use crumb_memory::VectorStore;
use tokio::sync::{mpsc, watch};

use crate::setup::{
    create_embedder, create_provider, health_check, init_subscriber, open_index, open_store,
    resolve_config_path, store_location,
};

const SEARCH_USAGE: &str = "Usage: crumb search <QUERY>";

#[derive(Parser)]
#[command(name = "crumb")]
#[command(about = "Index a text file, search it, and answer questions over it")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to `CRUMB_CONFIG`, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and store the source file
    Index {
        /// Source text file, overriding `index.source_path`
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Print the chunks closest to a query
    Search {
        /// Text to search for
        query: Option<String>,
    },
    /// Answer a question from the indexed text
    Ask {
        /// Question to answer
        question: String,
    },
    /// Serve the question form over HTTP
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Search { query: None } = cli.command {
        eprintln!("{SEARCH_USAGE}");
        std::process::exit(1);
    }

    init_subscriber();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    match cli.command {
        Command::Index { source } => {
            let source = source.unwrap_or_else(|| config.index.source_path.clone());
            let embedder = create_embedder(&config)?;
            let store = open_store(&config.store).await?;
            let result = run_index(&config, &embedder, Arc::clone(&store), &source).await;
            store.close().await;
            result
        }
        Command::Search { query } => {
            let query = query.unwrap_or_default();
            search::run_search(&config, &query, &mut std::io::stdout()).await
        }
        Command::Ask { question } => {
            let provider = create_provider(&config)?;
            health_check(&provider).await;
            let store = open_index(&config.store).await?;
            let result = run_ask(&config, provider, Arc::clone(&store), &question).await;
            store.close().await;
            result
        }
        Command::Serve => {
            let provider = create_provider(&config)?;
            health_check(&provider).await;
            let store = open_index(&config.store).await?;
            let result = run_serve(&config, provider, Arc::clone(&store)).await;
            store.close().await;
            result
        }
    }
}

fn build_retriever(
    config: &Config,
    provider: &AnyProvider,
    store: Arc<dyn VectorStore>,
) -> Retriever {
    Retriever::new(
        store,
        config.store.collection.clone(),
        provider.embed_fn(),
        config.retrieval,
    )
}

async fn run_index(
    config: &Config,
    embedder: &AnyProvider,
    store: Arc<dyn VectorStore>,
    source: &Path,
) -> anyhow::Result<()> {
    println!("Indexing {}", source.display());
    let indexer = Indexer::new(
        store,
        config.store.collection.clone(),
        embedder.embed_fn(),
        &config.index,
    );

    match indexer.index(source).await? {
        IndexOutcome::Indexed(stats) => {
            println!("Loaded {} document(s)", stats.documents);
            println!("Split into {} chunk(s)", stats.chunks);
            println!("Index stored at {}", store_location(&config.store));
        }
        IndexOutcome::SourceMissing(path) => {
            println!("Source file not found: {}", path.display());
        }
    }
    Ok(())
}

async fn run_ask(
    config: &Config,
    provider: AnyProvider,
    store: Arc<dyn VectorStore>,
    question: &str,
) -> anyhow::Result<()> {
    let retriever = build_retriever(config, &provider, store);
    let pipeline = AnswerPipeline::new(retriever, provider, config.llm.max_tokens);
    let answer = pipeline.answer(question).await?;
    println!("{answer}");
    Ok(())
}

async fn run_serve(
    config: &Config,
    provider: AnyProvider,
    store: Arc<dyn VectorStore>,
) -> anyhow::Result<()> {
    let retriever = build_retriever(config, &provider, store);
    let pipeline = AnswerPipeline::new(retriever, provider, config.llm.max_tokens);

    let (ask_tx, ask_rx) = mpsc::channel(16);
    let worker = tokio::spawn(answer_worker(pipeline, ask_rx));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    let server = GatewayServer::new(
        &config.gateway.bind,
        config.gateway.port,
        ask_tx,
        shutdown_rx,
    )
    .with_max_body_size(config.gateway.max_body_size);
    println!("Serving on http://{}", server.addr());
    server.serve().await?;

    if let Err(e) = worker.await {
        tracing::warn!("answer worker ended abnormally: {e}");
    }
    Ok(())
}

/// Answers form questions one at a time until every sender is dropped.
async fn answer_worker(
    pipeline: AnswerPipeline<AnyProvider>,
    mut rx: mpsc::Receiver<AskRequest>,
) {
    while let Some(AskRequest { question, reply }) = rx.recv().await {
        let answer = match pipeline.answer(&question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("answer failed: {e:#}");
                format!("Error generating answer: {e}")
            }
        };
        if reply.send(answer).is_err() {
            tracing::debug!("client went away before the answer was ready");
        }
    }
    tracing::info!("answer worker stopped");
}
