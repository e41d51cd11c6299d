//! Command-line front end for docchat.
//!
//! - `docchat ingest` builds the index from the documents folder
//! - `docchat chat` starts an interactive session over it
//! - `docchat ask` answers one question

pub mod cli;
pub mod console;
pub mod ingest;
pub mod settings;
pub mod telemetry;

pub use cli::{Cli, Command};

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ingest(args) => {
            ingest::run(&args).await?;
        }
        Command::Chat(args) => {
            let session = settings::open_session(&args).await?;
            console::run(session, args.sources).await?;
        }
        Command::Ask { question, chat } => {
            let mut session = settings::open_session(&chat).await?;
            let answer = session.ask(&question).await?;
            console::print_answer(&answer, chat.sources);
        }
    }
    Ok(())
}
