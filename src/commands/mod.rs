pub mod add;
pub mod adopt;
pub mod diff;
pub mod link;
pub mod list;
pub mod status;

use colored::{ColoredString, Colorize};

use agentstore::LinkState;

/// Colored marker for a link state
pub fn state_marker(state: LinkState) -> ColoredString {
    match state {
        LinkState::Linked => "✔".green(),
        LinkState::Unlinked => "○".yellow(),
        LinkState::Broken => "✘".red(),
        LinkState::Diverged => "~".yellow(),
        LinkState::Replaced => "!".red(),
    }
}

/// Colored state label, padded for column output
pub fn state_label(state: LinkState) -> ColoredString {
    let label = format!("{:<9}", state.as_str());
    match state {
        LinkState::Linked => label.green(),
        LinkState::Unlinked | LinkState::Diverged => label.yellow(),
        LinkState::Broken | LinkState::Replaced => label.red(),
    }
}
