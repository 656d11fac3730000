//! Version-control metadata for the store
//!
//! The store is a plain git repository. This module only creates it and
//! reads facts from it; nothing here commits, fetches or pushes.

use git2::{BranchType, Oid, Reference, Repository, Status, StatusOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Metadata about the store's git repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub dir: PathBuf,
    pub commit_count: usize,
    pub remote_url: Option<String>,
    pub unpushed_commits: usize,
    pub uncommitted_files: usize,
}

/// Create a repository at `dir` unless one is already there.
///
/// Returns `true` when a repository was created.
pub fn init_repo(dir: &Path) -> Result<bool> {
    if is_repo(dir) {
        return Ok(false);
    }
    Repository::init(dir)?;
    tracing::info!(dir = %dir.display(), "Initialized store repository");
    Ok(true)
}

/// Whether `dir` holds a git repository.
pub fn is_repo(dir: &Path) -> bool {
    Repository::open(dir).is_ok()
}

/// Gather repository metadata. Every fact degrades to zero/empty on failure.
pub fn query_store_info(dir: &Path) -> StoreInfo {
    let mut info = StoreInfo {
        dir: dir.to_path_buf(),
        ..StoreInfo::default()
    };

    let repo = match Repository::open(dir) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!(error = %e, "Store is not a git repository");
            return info;
        }
    };

    match commit_count(&repo) {
        Ok(n) => info.commit_count = n,
        Err(e) => tracing::debug!(error = %e, "No commit history"),
    }

    info.remote_url = repo
        .find_remote("origin")
        .ok()
        .and_then(|remote| remote.url().map(str::to_string));

    if info.remote_url.is_some() {
        match unpushed_commits(&repo) {
            Ok(n) => info.unpushed_commits = n,
            Err(e) => tracing::debug!(error = %e, "Could not count unpushed commits"),
        }
    }

    match uncommitted_files(&repo) {
        Ok(n) => info.uncommitted_files = n,
        Err(e) => tracing::debug!(error = %e, "Could not read working tree status"),
    }

    info
}

fn commit_count(repo: &Repository) -> std::result::Result<usize, git2::Error> {
    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    Ok(walk.filter_map(|oid| oid.ok()).count())
}

fn unpushed_commits(repo: &Repository) -> std::result::Result<usize, git2::Error> {
    let head = repo.head()?;
    let local = head
        .target()
        .ok_or_else(|| git2::Error::from_str("HEAD does not point at a commit"))?;
    let upstream = upstream_oid(repo, &head)?;
    let (ahead, _behind) = repo.graph_ahead_behind(local, upstream)?;
    Ok(ahead)
}

/// The upstream of the current branch, falling back to `origin/HEAD`.
fn upstream_oid(repo: &Repository, head: &Reference) -> std::result::Result<Oid, git2::Error> {
    if head.is_branch()
        && let Some(name) = head.shorthand()
        && let Ok(branch) = repo.find_branch(name, BranchType::Local)
        && let Ok(upstream) = branch.upstream()
        && let Some(oid) = upstream.get().target()
    {
        return Ok(oid);
    }
    repo.refname_to_id("refs/remotes/origin/HEAD")
}

fn uncommitted_files(repo: &Repository) -> std::result::Result<usize, git2::Error> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .filter(|s| s.status() != Status::CURRENT && !s.status().contains(Status::IGNORED))
        .count())
}
