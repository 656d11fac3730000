use agentstore::{LinkOptions, LinkOutcome, LinkReport, Store, UnlinkOptions, UnlinkOutcome};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

/// Arguments for the link command
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Agent to link (e.g. claude, codex, gemini, opencode)
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub agent: Option<String>,

    /// Link every detected agent
    #[arg(long)]
    pub all: bool,

    /// Replace whatever occupies a target
    #[arg(short, long)]
    pub force: bool,

    /// Copy content instead of symlinking it
    #[arg(long)]
    pub copy: bool,
}

/// Arguments for the unlink command
#[derive(Args, Debug)]
pub struct UnlinkArgs {
    /// Only unlink this agent's targets
    #[arg(short, long)]
    pub agent: Option<String>,
}

pub fn run_link(store: &Store, args: LinkArgs) -> Result<()> {
    let reports = match args.agent {
        Some(agent) => vec![store.link(&LinkOptions {
            agent,
            force: args.force,
            copy: args.copy,
        })?],
        None => {
            let reports = store.link_detected(args.force, args.copy)?;
            if reports.is_empty() {
                println!(
                    "{}",
                    "No detected agents. Run `agentstore detect` first.".yellow()
                );
            }
            reports
        }
    };

    let mut problems = 0;
    for report in &reports {
        print_report(report);
        problems += report.conflicts() + report.failures();
    }

    if problems > 0 {
        bail!(
            "{problems} link(s) not applied (run `agentstore adopt` to import existing files, or use --force to replace occupied targets)"
        );
    }
    Ok(())
}

fn print_report(report: &LinkReport) {
    println!("{}", report.agent.bold());
    if report.actions.is_empty() {
        println!("  {}", "nothing to link".dimmed());
    }
    for action in &report.actions {
        let target = action.entry.target.display();
        match &action.outcome {
            LinkOutcome::Created => println!("  {} Linked: {}", "✔".green(), target),
            LinkOutcome::AlreadyLinked => {
                println!("  {} Already linked: {}", "✔".green(), target)
            }
            LinkOutcome::Repaired => println!("  {} Repaired: {}", "✔".green(), target),
            LinkOutcome::Overwritten => {
                println!("  {} Replaced: {}", "!".yellow(), target)
            }
            LinkOutcome::Converted => {
                println!("  {} Replaced link with copy: {}", "✔".green(), target)
            }
            LinkOutcome::Conflict(reason) => {
                println!("  {} Conflict: {} ({})", "✘".red(), target, reason.dimmed())
            }
            LinkOutcome::Failed(reason) => {
                println!("  {} Failed: {} ({})", "✘".red(), target, reason.dimmed())
            }
        }
    }
    println!(
        "  Changed: {}, Unchanged: {}, Conflicts: {}, Errors: {}",
        report.changed().to_string().green(),
        report.unchanged().to_string().dimmed(),
        report.conflicts().to_string().yellow(),
        report.failures().to_string().red()
    );
}

pub fn run_unlink(store: &Store, args: UnlinkArgs) -> Result<()> {
    let actions = store.unlink(&UnlinkOptions { agent: args.agent })?;

    if actions.is_empty() {
        println!("{}", "No links registered.".dimmed());
        return Ok(());
    }

    let mut failed = 0;
    for action in &actions {
        let target = action.entry.target.display();
        match &action.outcome {
            UnlinkOutcome::Materialized => {
                println!("  {} Replaced link with copy: {}", "✔".green(), target)
            }
            UnlinkOutcome::Untracked => println!("  {} Untracked: {}", "✔".green(), target),
            UnlinkOutcome::Failed(reason) => {
                failed += 1;
                println!("  {} Failed: {} ({})", "✘".red(), target, reason.dimmed())
            }
        }
    }

    if failed > 0 {
        bail!("{failed} link(s) could not be unlinked");
    }
    Ok(())
}
