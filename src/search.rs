//! `crumb search`: print the chunks closest to a query.

use std::io::Write;

use crumb_core::config::Config;
use crumb_core::retriever::{Retrieved, Retriever};

use crate::setup::{create_embedder, open_index, store_location};

/// Load the embedder and index, then write the search transcript to `out`.
///
/// Failures while loading are reported in the transcript, not returned.
///
/// # Errors
///
/// Returns an error only if writing to `out` fails.
pub(crate) async fn run_search(
    config: &Config,
    query: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    writeln!(out, "Index: {}", store_location(&config.store))?;
    writeln!(out, "Query: {query}")?;

    let retriever = match load_retriever(config).await {
        Ok(retriever) => retriever,
        Err(e) => {
            tracing::error!("failed to load index for search: {e:#}");
            writeln!(out, "Error during retrieval: {e:#}")?;
            return Ok(());
        }
    };

    let written = write_results(&retriever, query, out).await;
    retriever.close().await;
    written
}

async fn load_retriever(config: &Config) -> anyhow::Result<Retriever> {
    let embedder = create_embedder(config)?;
    let store = open_index(&config.store).await?;
    Ok(Retriever::new(
        store,
        config.store.collection.clone(),
        embedder.embed_fn(),
        config.retrieval,
    ))
}

async fn write_results(
    retriever: &Retriever,
    query: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match retriever.total_chunks().await {
        Ok(total) => writeln!(out, "Indexed chunks: {total}")?,
        Err(e) => tracing::warn!("failed to count indexed chunks: {e}"),
    }

    let retrieved = retriever.retrieve_default(query).await;
    match &retrieved {
        Retrieved::Failed(msg) => writeln!(out, "{msg}")?,
        Retrieved::Context(chunks) if chunks.is_empty() => {
            writeln!(out, "No matching results found.")?;
        }
        Retrieved::Context(chunks) => {
            writeln!(out, "\nFound {} matching chunk(s):\n", chunks.len())?;
            writeln!(out, "{}", retrieved.text())?;
        }
    }
    Ok(())
}
