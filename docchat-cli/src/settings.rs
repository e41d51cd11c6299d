//! Turning parsed arguments into library components.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use docchat_rag::{
    AnswerSynthesizer, ChatModel, ChatSession, DEFAULT_COLLECTION, EmbeddingProvider,
    HashEmbeddingProvider, LocalVectorStore, MockChatModel, RagConfig, RagPipeline,
    RecursiveChunker, SynthesizerConfig, VectorStore,
};
use docchat_rag::{AnthropicChatModel, AnthropicConfig};
use tracing::info;

use crate::cli::{ChatArgs, EmbeddingBackend, IngestArgs, LlmBackend};

/// Construct the embedding provider for `backend`.
pub async fn embedding_provider(backend: EmbeddingBackend) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match backend {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbeddingProvider::default())),
        EmbeddingBackend::Fastembed => fastembed_provider().await,
    }
}

#[cfg(feature = "fastembed")]
async fn fastembed_provider() -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    info!("loading local embedding model (downloaded on first use)");
    let provider = tokio::task::spawn_blocking(docchat_rag::FastEmbedProvider::new)
        .await
        .context("embedding model loader panicked")??;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "fastembed"))]
async fn fastembed_provider() -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    bail!("this build has no local embedding model; rebuild with `--features fastembed` or use `--embedding hash`")
}

pub fn ingest_config(args: &IngestArgs) -> anyhow::Result<RagConfig> {
    RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .embed_batch_size(args.batch_size)
        .build()
        .context("invalid chunking options")
}

pub fn chat_config(args: &ChatArgs) -> anyhow::Result<RagConfig> {
    let mut builder = RagConfig::builder().top_k(args.top_k);
    if let Some(min_score) = args.min_score {
        builder = builder.similarity_threshold(min_score);
    }
    builder.build().context("invalid retrieval options")
}

pub fn pipeline(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
) -> anyhow::Result<RagPipeline> {
    let chunker = RecursiveChunker::new(config.chunk_size, config.chunk_overlap);
    Ok(RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(store)
        .chunker(Arc::new(chunker))
        .build()?)
}

fn chat_model(args: &ChatArgs) -> anyhow::Result<Arc<dyn ChatModel>> {
    match args.llm {
        LlmBackend::Echo => Ok(Arc::new(MockChatModel::new())),
        LlmBackend::Anthropic => {
            let mut config = AnthropicConfig::from_env()?;
            if let Some(model) = &args.model {
                config = config.with_model(model.clone());
            }
            Ok(Arc::new(AnthropicChatModel::new(config)?))
        }
    }
}

/// Load the index and wire up a chat session over it.
///
/// The model is configured first so a missing API key fails before the
/// index or embedding model is loaded.
pub async fn open_session(args: &ChatArgs) -> anyhow::Result<ChatSession> {
    let model = chat_model(args)?;

    let db_dir = &args.index.db_dir;
    let Some(store) = LocalVectorStore::open(db_dir)
        .await
        .with_context(|| format!("failed to load the index at {}", db_dir.display()))?
    else {
        bail!("no index found at {}; run `docchat ingest` first", db_dir.display());
    };

    let embedder = embedding_provider(args.index.embedding).await?;
    let pipeline = pipeline(chat_config(args)?, embedder, Arc::new(store))?;
    let spec = pipeline
        .verify_collection(DEFAULT_COLLECTION)
        .await
        .context("the index cannot be queried with this embedding backend; pass the --embedding used at ingest time or re-run `docchat ingest`")?;
    info!(model = %spec.embedding_model, llm = model.name(), "index ready");

    let synthesizer = AnswerSynthesizer::new(model).with_config(synthesizer_config(args));
    Ok(ChatSession::new(Arc::new(pipeline), synthesizer))
}

/// Answer settings. The echo backend cannot rewrite questions, so it
/// always retrieves with the question as typed.
pub fn synthesizer_config(args: &ChatArgs) -> SynthesizerConfig {
    SynthesizerConfig {
        answer_timeout: Duration::from_secs(args.timeout),
        condense_questions: !args.no_condense && args.llm != LlmBackend::Echo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn chat_args(argv: &[&str]) -> ChatArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Chat(args) = cli.command else { panic!("expected chat") };
        args
    }

    #[test]
    fn echo_backend_never_condenses() {
        let config = synthesizer_config(&chat_args(&["docchat", "chat", "--llm", "echo"]));
        assert!(!config.condense_questions);
        assert_eq!(config.answer_timeout, Duration::from_secs(120));
    }

    #[test]
    fn anthropic_backend_condenses_unless_disabled() {
        assert!(synthesizer_config(&chat_args(&["docchat", "chat"])).condense_questions);
        let args = chat_args(&["docchat", "chat", "--no-condense", "--timeout", "5"]);
        let config = synthesizer_config(&args);
        assert!(!config.condense_questions);
        assert_eq!(config.answer_timeout, Duration::from_secs(5));
    }
}
