//! Status aggregation

use serde::Serialize;

use crate::error::Result;
use crate::health::{self, LinkHealth, LinkState};
use crate::registry::Agent;
use crate::store::Store;
use crate::vcs::{self, StoreInfo};

/// Combined view of the store, its agents and every link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResult {
    pub store: StoreInfo,
    pub agents: Vec<Agent>,
    pub links: Vec<LinkHealth>,
}

impl StatusResult {
    /// Number of links in `state`
    pub fn count(&self, state: LinkState) -> usize {
        self.links.iter().filter(|l| l.state == state).count()
    }

    /// True when every link is in place
    pub fn all_linked(&self) -> bool {
        self.links.iter().all(|l| l.state == LinkState::Linked)
    }
}

impl Store {
    /// Report store metadata, registered agents and link health. Read-only.
    pub fn check_status(&self) -> Result<StatusResult> {
        self.ensure_initialized()?;
        let registry = self.registry()?;

        Ok(StatusResult {
            store: vcs::query_store_info(self.dir()),
            links: health::evaluate_all(&registry.links, self.dir()),
            agents: registry.agents,
        })
    }
}
