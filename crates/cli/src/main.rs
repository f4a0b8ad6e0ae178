//! ferrule CLI, the main entry point.
//!
//! Commands:
//! - `chat`     Interactive chat session
//! - `ask`      One-shot question
//! - `history`  Browse stored conversations
//! - `tools`    List available tools

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ferrule",
    about = "ferrule: a terminal AI agent that can run commands on your behalf",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Model to use, e.g. `gemini/gemini-2.0-flash`
        #[arg(short, long)]
        model: Option<String>,

        /// Do not offer tools to the model
        #[arg(long)]
        no_tools: bool,
    },

    /// Ask a one-shot question
    Ask {
        /// The question
        question: String,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        no_tools: bool,
    },

    /// View past conversations
    History {
        /// Number of conversations to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Show the messages of one conversation
        #[arg(long)]
        id: Option<String>,
    },

    /// List available tools
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the answer
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Chat { model, no_tools } => commands::chat::run(model, no_tools).await,
        Commands::Ask {
            question,
            model,
            no_tools,
        } => commands::ask::run(question, model, no_tools).await,
        Commands::History { limit, id } => commands::history::run(limit, id).await,
        Commands::Tools => commands::tools::run().await,
    };

    // Commands have released their resources by now. Exiting here also
    // skips waiting on a stdin read left pending by an interrupted prompt.
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}
