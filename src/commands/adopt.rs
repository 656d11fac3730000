use agentstore::{AdoptItem, AdoptOptions, AdoptStatus, LinkOutcome, Store};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

/// Arguments for the adopt command
#[derive(Args, Debug)]
pub struct AdoptArgs {
    /// Only adopt from this agent (default: every detected agent)
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Show what would be imported without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Import into the store but leave the originals in place
    #[arg(long)]
    pub copy: bool,

    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_adopt(store: &Store, args: AdoptArgs) -> Result<()> {
    let items = store.adopt(&AdoptOptions {
        agent: args.agent,
        dry_run: args.dry_run,
        copy: args.copy,
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("{}", "Nothing to adopt.".dimmed());
        return Ok(());
    }

    for item in &items {
        print_item(item);
    }

    let conflicts = items
        .iter()
        .filter(|i| matches!(i.status, AdoptStatus::Conflict(_)))
        .count();
    let failed = items
        .iter()
        .filter(|i| matches!(i.status, AdoptStatus::Failed(_)))
        .count();

    if args.dry_run {
        println!("\n{}", "Dry run: nothing was changed.".dimmed());
    }
    if conflicts > 0 {
        println!(
            "\n{} {conflicts} item(s) differ from the store and were left in place. Compare them with {}.",
            "!".yellow(),
            "agentstore diff".cyan()
        );
    }
    if failed > 0 {
        bail!("{failed} item(s) could not be adopted");
    }
    Ok(())
}

fn print_item(item: &AdoptItem) {
    let original = item.original.display();
    let source = item.source.display().to_string();
    match &item.status {
        AdoptStatus::Pending => println!(
            "  {} {} would be imported as {}",
            "○".cyan(),
            original,
            source.cyan()
        ),
        AdoptStatus::Imported => println!(
            "  {} {} imported as {}",
            "✔".green(),
            original,
            source.cyan()
        ),
        AdoptStatus::AlreadyManaged => println!(
            "  {} {} already in store as {}",
            "✔".green(),
            original,
            source.cyan()
        ),
        AdoptStatus::Conflict(reason) => {
            println!("  {} Conflict: {} ({})", "!".yellow(), original, reason.dimmed())
        }
        AdoptStatus::Failed(reason) => {
            println!("  {} Failed: {} ({})", "✘".red(), original, reason.dimmed())
        }
    }
    match &item.link {
        Some(LinkOutcome::Failed(reason)) | Some(LinkOutcome::Conflict(reason)) => {
            println!("      {} not linked: {}", "✘".red(), reason.dimmed())
        }
        Some(_) => println!("      {}", "linked".dimmed()),
        None => {}
    }
}
