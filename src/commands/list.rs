use agentstore::{ListOptions, Store};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list one type (skills, commands, agents, rules, instructions, settings)
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "")]
    pub kind: String,

    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_list(store: &Store, args: ListArgs) -> Result<()> {
    let opts = ListOptions::from_type(&args.kind)?;
    let result = store.list(&opts)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("{}", "The store is empty.".dimmed());
        return Ok(());
    }

    for (category, items) in result.iter() {
        if items.is_empty() {
            continue;
        }
        println!("{} ({})", category.to_string().bold(), items.len());
        let width = items.iter().map(|i| i.name.len()).max().unwrap_or(0);
        for item in items {
            if item.description.is_empty() {
                println!("  {}", item.name.cyan());
            } else {
                let name = format!("{:<width$}", item.name);
                println!("  {}  {}", name.cyan(), item.description.dimmed());
            }
        }
        println!();
    }
    Ok(())
}
