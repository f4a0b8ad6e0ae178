//! `ferrule chat`: interactive session on one conversation.

use std::io::Write;
use std::sync::Arc;

use ferrule_agent::{AgentEvent, AgentLoop};
use ferrule_core::message::ConversationId;
use futures::StreamExt;

use super::CmdResult;
use super::input::TerminalInput;

pub async fn run(model: Option<String>, no_tools: bool) -> CmdResult {
    let config = super::load_config()?;
    super::require_api_key(&config)?;

    let input = Arc::new(TerminalInput::stdin());
    let agent = super::build_agent(&config, model, no_tools, input.clone()).await?;
    let mut conversation = Some(agent.start_conversation().await?);

    println!();
    println!("  ferrule chat");
    println!("  Model:  {}", agent.model());
    println!("  Tools:  {}", if agent.tools_enabled() { "enabled" } else { "disabled" });
    println!();
    println!("  Type 'exit' or 'quit' to end the session.");
    println!("  Ctrl+C stops a reply, or ends the session at the prompt.");
    println!();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = input.read_line_or(tokio::signal::ctrl_c()).await? else {
            println!();
            break;
        };
        let message = line.trim();
        if is_exit(message) {
            break;
        }
        if message.is_empty() {
            continue;
        }

        print!("  Agent > ");
        std::io::stdout().flush()?;

        tokio::select! {
            outcome = stream_reply(&agent, conversation.clone(), message) => match outcome {
                Ok(id) => conversation = id.or(conversation),
                Err(e) => eprintln!("\n  [Error] {e}"),
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n  [Interrupted]");
            }
        }
        println!();
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Print a reply as it streams. Returns the conversation the turn ran on.
async fn stream_reply(
    agent: &AgentLoop,
    conversation: Option<ConversationId>,
    input: &str,
) -> Result<Option<ConversationId>, Box<dyn std::error::Error>> {
    let mut events = agent.process_message(conversation, input);
    let mut id = None;

    while let Some(event) = events.next().await {
        let event = event?;
        if let AgentEvent::ConversationStarted { conversation_id } = &event {
            id = Some(ConversationId(conversation_id.clone()));
        }
        if let Some(fragment) = event.render() {
            print!("{fragment}");
            std::io::stdout().flush()?;
        }
    }
    Ok(id)
}

fn is_exit(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q")
}
