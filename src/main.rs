//! agentstore CLI
//!
//! Command-line interface for the canonical agent configuration store.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use agentstore::Store;
use commands::add::AddArgs;
use commands::adopt::AdoptArgs;
use commands::diff::DiffArgs;
use commands::link::{LinkArgs, UnlinkArgs};
use commands::list::ListArgs;
use commands::status::StatusArgs;

/// Environment variable holding the log filter
const LOG_ENV: &str = "AGENTSTORE_LOG";

#[derive(Parser)]
#[command(name = "agentstore")]
#[command(
    author,
    version,
    about = "Keep AI agent configuration in one store and link it everywhere"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Store directory (default: $AGENTSTORE_DIR or the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store (safe to run again)
    Init,

    /// List store content
    List(ListArgs),

    /// Probe PATH for agent binaries
    Detect,

    /// Link store content into an agent's configuration directory
    Link(LinkArgs),

    /// Replace links with standalone copies and stop tracking them
    Unlink(UnlinkArgs),

    /// Show store metadata, agents and link health
    Status(StatusArgs),

    /// Show how link targets differ from the store
    Diff(DiffArgs),

    /// Scaffold a new skill, command, agent or rule
    Add(AddArgs),

    /// Import existing agent configuration into the store and link it back
    Adopt(AdoptArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let store = open_store(cli.store)?;
    tracing::debug!(dir = %store.dir().display(), "Using store");

    match cli.command {
        Commands::Init => run_init(&store)?,
        Commands::List(args) => commands::list::run_list(&store, args)?,
        Commands::Detect => run_detect(&store)?,
        Commands::Link(args) => commands::link::run_link(&store, args)?,
        Commands::Unlink(args) => commands::link::run_unlink(&store, args)?,
        Commands::Status(args) => commands::status::run_status(&store, args)?,
        Commands::Diff(args) => commands::diff::run_diff(&store, args)?,
        Commands::Add(args) => commands::add::run_add(&store, args)?,
        Commands::Adopt(args) => commands::adopt::run_adopt(&store, args)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "agentstore=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_store(dir: Option<PathBuf>) -> Result<Store> {
    let located = Store::locate().context("Failed to locate the agent store")?;
    Ok(match dir {
        Some(dir) => Store::new(dir, located.home()),
        None => located,
    })
}

fn run_init(store: &Store) -> Result<()> {
    let report = store
        .init()
        .with_context(|| format!("Failed to initialize {}", store.dir().display()))?;

    if report.is_noop() {
        println!(
            "{} Store already initialized at {}",
            "✔".green(),
            store.dir().display()
        );
        return Ok(());
    }

    println!(
        "{} Initialized store at {}",
        "✔".green(),
        store.dir().display()
    );
    for path in &report.created {
        println!("  {} Created: {}", "+".green(), path.display());
    }
    println!(
        "\nNext steps:\n  1. Edit {} with your shared instructions\n  2. Run {} then {}",
        store.dir().join("instructions/AGENTS.md").display().to_string().cyan(),
        "agentstore detect".cyan(),
        "agentstore link --all".cyan()
    );
    Ok(())
}

fn run_detect(store: &Store) -> Result<()> {
    let agents = store.detect()?;

    for agent in &agents {
        if agent.detected {
            let location = agent
                .binary_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "  {} {:<10} {}",
                "✔".green(),
                agent.name.bold(),
                location.dimmed()
            );
        } else {
            println!(
                "  {} {:<10} {}",
                "○".yellow(),
                agent.name,
                "not found".dimmed()
            );
        }
    }

    let found = agents.iter().filter(|a| a.detected).count();
    println!("\n{found} of {} agents detected", agents.len());
    Ok(())
}
