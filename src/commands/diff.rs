use agentstore::{DiffEntry, DiffOptions, LinkState, Store};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{state_label, state_marker};

/// Arguments for the diff command
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only show links for this agent
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_diff(store: &Store, args: DiffArgs) -> Result<()> {
    let entries = store.diff(&DiffOptions { agent: args.agent })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No links registered.".dimmed());
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }

    let drifted = entries
        .iter()
        .filter(|e| e.state() != LinkState::Linked)
        .count();
    if drifted == 0 {
        println!("\n{}", "All links match the store.".green());
    }
    Ok(())
}

fn print_entry(entry: &DiffEntry) {
    let state = entry.state();
    println!(
        "{} {} {}",
        state_marker(state),
        state_label(state),
        entry.link.target.display().to_string().bold()
    );
    if let Some(note) = entry.note() {
        println!("    {}", note.dimmed());
    }
    for line in entry.lines() {
        let styled = if line.starts_with("+++") || line.starts_with("---") {
            line.bold()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        println!("    {styled}");
    }
}
