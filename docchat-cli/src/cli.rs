//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Embedding backend used when none is given.
pub const DEFAULT_EMBEDDING: &str = if cfg!(feature = "fastembed") { "fastembed" } else { "hash" };

/// docchat: ask questions about a folder of documents
#[derive(Parser, Debug)]
#[command(name = "docchat", version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract, chunk and embed the documents folder into the index
    Ingest(IngestArgs),
    /// Start an interactive chat over the index
    Chat(ChatArgs),
    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,

        #[command(flatten)]
        chat: ChatArgs,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Hashed bag-of-words vectors; offline, lexical matching only
    Hash,
    /// Local sentence-transformer model (needs the `fastembed` feature)
    Fastembed,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmBackend {
    /// Anthropic Messages API (needs ANTHROPIC_API_KEY)
    Anthropic,
    /// Echo the retrieved excerpts back; no network
    Echo,
}

/// Options shared by every command that touches the index.
#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Directory holding the persisted vector index
    #[arg(long, env = "DOCCHAT_DB_DIR", default_value = "db")]
    pub db_dir: PathBuf,

    /// Embedding backend; must match the one the index was built with
    #[arg(long, env = "DOCCHAT_EMBEDDING", value_enum, default_value = DEFAULT_EMBEDDING)]
    pub embedding: EmbeddingBackend,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Folder of PDF, Word, text and image files
    #[arg(long, env = "DOCCHAT_DOCS_DIR", default_value = "documents")]
    pub docs_dir: PathBuf,

    #[command(flatten)]
    pub index: IndexArgs,

    /// Add to the existing index instead of rebuilding it
    #[arg(long)]
    pub append: bool,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Chunks embedded per batch
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub index: IndexArgs,

    /// Answer generator
    #[arg(long, value_enum, default_value = "anthropic")]
    pub llm: LlmBackend,

    /// Anthropic model name
    #[arg(long, env = "ANTHROPIC_MODEL")]
    pub model: Option<String>,

    /// Number of excerpts retrieved per question
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    /// Drop excerpts scoring below this cosine similarity
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Seconds to wait for each model reply
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Retrieve with follow-up questions as typed instead of rewriting them
    #[arg(long)]
    pub no_condense: bool,

    /// List the source files after each answer
    #[arg(long)]
    pub sources: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_defaults() {
        let cli = Cli::try_parse_from(["docchat", "ingest"]).unwrap();
        let Command::Ingest(args) = cli.command else { panic!("expected ingest") };
        assert_eq!(args.docs_dir, PathBuf::from("documents"));
        assert_eq!(args.index.db_dir, PathBuf::from("db"));
        assert_eq!((args.chunk_size, args.chunk_overlap, args.batch_size), (1000, 200, 32));
        assert!(!args.append);
    }

    #[cfg(feature = "fastembed")]
    #[test]
    fn sentence_model_is_the_default_embedding() {
        let cli = Cli::try_parse_from(["docchat", "ingest"]).unwrap();
        let Command::Ingest(args) = cli.command else { panic!("expected ingest") };
        assert_eq!(args.index.embedding, EmbeddingBackend::Fastembed);

        let cli = Cli::try_parse_from(["docchat", "chat", "--embedding", "hash"]).unwrap();
        let Command::Chat(args) = cli.command else { panic!("expected chat") };
        assert_eq!(args.index.embedding, EmbeddingBackend::Hash);
    }

    #[test]
    fn ask_takes_a_question_and_chat_options() {
        let cli = Cli::try_parse_from([
            "docchat", "-v", "ask", "What is it?", "--llm", "echo", "--top-k", "2", "--sources",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Ask { question, chat } = cli.command else { panic!("expected ask") };
        assert_eq!(question, "What is it?");
        assert_eq!(chat.llm, LlmBackend::Echo);
        assert_eq!(chat.top_k, 2);
        assert!(chat.sources);
    }
}
