//! `ferrule history`: recent conversations, or one in full.

use ferrule_core::message::{ConversationId, Message, Role};
use ferrule_core::store::ConversationStore;

use super::CmdResult;

pub async fn run(limit: usize, id: Option<String>) -> CmdResult {
    let config = super::load_config()?;
    let store = super::open_store(&config).await?;

    let outcome = match id {
        Some(id) => show_conversation(&store, &id).await,
        None => list_recent(&store, limit).await,
    };
    store.close().await;
    outcome
}

async fn list_recent(store: &dyn ConversationStore, limit: usize) -> CmdResult {
    let conversations = store.list_conversations(limit).await?;
    if conversations.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    println!("Recent Conversations (last {limit}):");
    println!();
    for conv in &conversations {
        println!(
            "  {}... | {} | {} messages | {}",
            short_id(conv.id.as_str()),
            conv.created_at.format("%Y-%m-%d"),
            conv.message_count,
            conv.model.as_deref().unwrap_or("default"),
        );
    }
    Ok(())
}

async fn show_conversation(store: &dyn ConversationStore, id: &str) -> CmdResult {
    let Some(conv) = store.get_conversation(&ConversationId::from(id)).await? else {
        return Err(format!("Conversation not found: {id}").into());
    };

    println!("Conversation: {}", conv.id);
    println!(
        "Created: {} | Model: {}",
        conv.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        conv.model.as_deref().unwrap_or("default"),
    );
    println!();
    for msg in &conv.messages {
        println!("{}", format_message(msg));
        println!();
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_message(msg: &Message) -> String {
    let mut out = format!("{}: {}", msg.role.as_str().to_uppercase(), msg.content);
    if msg.role == Role::Assistant {
        for call in &msg.tool_calls {
            out.push_str(&format!("\n  -> {} {}", call.name, call.arguments));
        }
    }
    out
}
