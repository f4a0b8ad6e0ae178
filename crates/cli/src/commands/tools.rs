//! `ferrule tools`: list the built-in tools.

use std::sync::Arc;

use ferrule_core::tool::Tool;
use ferrule_tools::DenyAll;

use super::CmdResult;

pub async fn run() -> CmdResult {
    let config = super::load_config()?;
    // Listing never executes anything
    let registry = ferrule_tools::default_registry(&config.tools, Arc::new(DenyAll));

    let tools = registry.list_tools();
    if tools.is_empty() {
        println!("No tools registered.");
        return Ok(());
    }

    println!("Available Tools:");
    println!();
    for tool in tools {
        println!("  {} {}", tool.name, badge(tool));
        println!("    {}", tool.description);
        println!();
    }
    Ok(())
}

fn badge(tool: &Tool) -> &'static str {
    if tool.requires_confirmation {
        "! requires confirmation"
    } else {
        "* auto"
    }
}
