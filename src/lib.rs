//! agentstore - a single source of truth for AI agent configuration
//!
//! Keeps instructions, skills, commands, agents, rules and settings in one
//! git-tracked store and links them into each agent's configuration
//! directory, reporting how every link has drifted since.

pub mod adopt;
pub mod agent_ids;
pub mod config;
pub mod detect;
pub mod diff;
pub mod error;
pub mod fs;
pub mod health;
pub mod inventory;
pub mod linker;
pub mod registry;
pub mod status;
pub mod store;
pub mod templates;
pub mod vcs;

pub use adopt::{AdoptItem, AdoptKind, AdoptOptions, AdoptStatus};
pub use config::{Config, LinkMode};
pub use diff::{DiffBody, DiffEntry, DiffOptions, LinkDiff};
pub use error::{Error, Result};
pub use health::{LinkHealth, LinkState};
pub use inventory::{AddResult, Category, ContentItem, ListOptions, ListResult};
pub use linker::{LinkAction, LinkOptions, LinkOutcome, LinkReport, UnlinkAction, UnlinkOptions, UnlinkOutcome};
pub use registry::{Agent, LinkEntry, Registry};
pub use status::StatusResult;
pub use store::{InitReport, Store};
pub use vcs::StoreInfo;
