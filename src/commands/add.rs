use agentstore::{Category, Store};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Arguments for the add command
#[derive(Args, Debug)]
pub struct AddArgs {
    /// What to add: skills, commands, agents or rules
    pub category: String,

    /// Name of the new item (lowercase letters, digits, hyphens)
    pub name: String,
}

pub fn run_add(store: &Store, args: AddArgs) -> Result<()> {
    let category: Category = args.category.parse()?;
    let added = store.add(category, &args.name)?;

    println!(
        "{} Added {} {}",
        "✔".green(),
        category.to_string().trim_end_matches('s'),
        added.name.bold()
    );
    for path in &added.created {
        println!("  {} {}", "+".green(), path.display());
    }
    Ok(())
}
