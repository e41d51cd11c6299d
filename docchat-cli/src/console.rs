//! Interactive chat loop.

use docchat_rag::{Answer, ChatSession, Role};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

const HELP: &str = "Commands: /clear forget the conversation, /history show it, /sources toggle source listing, /help, exit";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Exit,
    Clear,
    History,
    ToggleSources,
    Help,
    Empty,
    Ask(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "exit" | "quit" | "/exit" | "/quit" => Self::Exit,
            "/clear" => Self::Clear,
            "/history" => Self::History,
            "/sources" => Self::ToggleSources,
            "/help" | "?" => Self::Help,
            _ => Self::Ask(line.to_string()),
        }
    }
}

pub fn print_answer(answer: &Answer, show_sources: bool) {
    println!("\nAssistant: {}\n", answer.text);
    if show_sources && !answer.sources.is_empty() {
        println!("Sources: {}\n", answer.citations().join(", "));
    }
}

/// Read questions until `exit` or end of input.
pub async fn run(mut session: ChatSession, mut show_sources: bool) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask questions about your documents. {HELP}\n");

    loop {
        let line = match editor.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Empty => continue,
            ConsoleCommand::Exit => break,
            ConsoleCommand::Help => println!("{HELP}\n"),
            ConsoleCommand::Clear => {
                session.clear_history();
                println!("Conversation cleared.\n");
            }
            ConsoleCommand::History => {
                if session.memory().is_empty() {
                    println!("No conversation yet.\n");
                }
                for turn in session.memory().turns() {
                    let who = match turn.role {
                        Role::User => "You",
                        Role::Assistant => "Assistant",
                    };
                    println!("{who}: {}", turn.content);
                }
            }
            ConsoleCommand::ToggleSources => {
                show_sources = !show_sources;
                println!("Source listing {}.\n", if show_sources { "on" } else { "off" });
            }
            ConsoleCommand::Ask(question) => {
                let _ = editor.add_history_entry(question.as_str());
                match session.ask(&question).await {
                    Ok(answer) => print_answer(&answer, show_sources),
                    Err(e) => {
                        warn!(error = %e, "question failed");
                        eprintln!("\nError: {e}\n");
                    }
                }
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_questions() {
        assert_eq!(ConsoleCommand::parse("  "), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("QUIT"), ConsoleCommand::Exit);
        assert_eq!(ConsoleCommand::parse("/clear"), ConsoleCommand::Clear);
        assert_eq!(ConsoleCommand::parse("/sources"), ConsoleCommand::ToggleSources);
        assert_eq!(
            ConsoleCommand::parse(" What is Exit Strategy? "),
            ConsoleCommand::Ask("What is Exit Strategy?".into())
        );
    }
}
