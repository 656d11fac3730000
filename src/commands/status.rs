use agentstore::{LinkState, StatusResult, Store};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{state_label, state_marker};

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_status(store: &Store, args: StatusArgs) -> Result<()> {
    let status = store.check_status()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    if !status.all_linked() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_status(status: &StatusResult) {
    let info = &status.store;
    println!("{} {}", "Store:".bold(), info.dir.display());
    println!(
        "  {} commits, {} uncommitted, remote: {}",
        info.commit_count,
        info.uncommitted_files,
        info.remote_url.as_deref().unwrap_or("none")
    );
    if info.unpushed_commits > 0 {
        println!("  {} unpushed commits", info.unpushed_commits.to_string().yellow());
    }

    println!("\n{}", "Agents:".bold());
    if status.agents.is_empty() {
        println!("  {}", "none registered (run `agentstore detect`)".dimmed());
    }
    for agent in &status.agents {
        let marker = if agent.detected { "✔".green() } else { "○".yellow() };
        println!(
            "  {} {:<10} {}",
            marker,
            agent.name,
            agent.config_dir.display().to_string().dimmed()
        );
    }

    println!("\n{}", "Links:".bold());
    if status.links.is_empty() {
        println!("  {}", "none registered (run `agentstore link`)".dimmed());
    }
    for link in &status.links {
        println!(
            "  {} {} {} -> {}",
            state_marker(link.state),
            state_label(link.state),
            link.entry.source.display(),
            link.entry.target.display()
        );
        if link.state != LinkState::Linked
            && let Some(reason) = link.reason()
        {
            println!("      {}", reason.dimmed());
        }
    }

    let problems = status.links.len() - status.count(LinkState::Linked);
    if problems > 0 {
        println!("\nStatus: {} problems found", problems);
    } else {
        println!("\nStatus: All good");
    }
}
