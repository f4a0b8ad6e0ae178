//! `ferrule ask`: one question, one answer, then exit.

use std::sync::Arc;

use super::CmdResult;
use super::input::TerminalInput;

pub async fn run(question: String, model: Option<String>, no_tools: bool) -> CmdResult {
    let config = super::load_config()?;
    super::require_api_key(&config)?;

    let input = Arc::new(TerminalInput::stdin());
    let agent = super::build_agent(&config, model, no_tools, input).await?;

    eprint!("  Thinking...");
    let result = agent.respond(None, question).await;
    eprint!("\r              \r");

    let (_, answer) = result?;
    println!("{answer}");
    Ok(())
}
