//! `docchat ingest`: build the vector index from the documents folder.

use std::sync::Arc;

use anyhow::Context;
use docchat_rag::{DEFAULT_COLLECTION, DocumentLoader, IndexWriteMode, LocalVectorStore};
use tracing::info;

use crate::cli::IngestArgs;
use crate::settings;

/// What an ingest run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The documents folder did not exist and was created empty.
    CreatedDocsDir,
    /// Nothing in the folder produced text.
    NothingToIndex,
    /// The index was written.
    Indexed { documents: usize, chunks: usize, total: usize },
}

pub async fn run(args: &IngestArgs) -> anyhow::Result<IngestOutcome> {
    let docs_dir = &args.docs_dir;
    if !docs_dir.exists() {
        std::fs::create_dir_all(docs_dir)
            .with_context(|| format!("failed to create {}", docs_dir.display()))?;
        println!(
            "Created {}. Add PDF, Word, text or image files there and run `docchat ingest` again.",
            docs_dir.display()
        );
        return Ok(IngestOutcome::CreatedDocsDir);
    }

    let config = settings::ingest_config(args)?;

    let loader = DocumentLoader::default();
    let dir = docs_dir.clone();
    let extraction = tokio::task::spawn_blocking(move || loader.load_folder(&dir))
        .await
        .context("document extraction panicked")??;
    println!("{}", extraction.summary);

    if extraction.documents.iter().all(|d| d.text.trim().is_empty()) {
        println!("No text found in {}; the index was not built.", docs_dir.display());
        return Ok(IngestOutcome::NothingToIndex);
    }

    let embedder = settings::embedding_provider(args.index.embedding).await?;
    let store = Arc::new(
        LocalVectorStore::create(&args.index.db_dir)
            .await
            .with_context(|| format!("failed to open the index at {}", args.index.db_dir.display()))?,
    );
    let pipeline = settings::pipeline(config, embedder, store)?;

    let chunks = pipeline.chunk_documents(&extraction.documents);
    let mode = if args.append { IndexWriteMode::Append } else { IndexWriteMode::Overwrite };
    let report = pipeline.index_chunks(DEFAULT_COLLECTION, chunks, mode).await?;
    info!(db_dir = %args.index.db_dir.display(), ?mode, "index written");

    println!(
        "Indexed {} chunks from {} documents into {} ({} chunks in total).",
        report.chunks,
        report.documents,
        args.index.db_dir.display(),
        report.total
    );
    Ok(IngestOutcome::Indexed {
        documents: report.documents,
        chunks: report.chunks,
        total: report.total,
    })
}
