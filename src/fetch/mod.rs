//! Base configuration sources.
//!
//! A fetcher returns the current upstream base document and whether it
//! changed since the previous fetch. The caller stores the content as the
//! local base copy that the merge reads.

pub mod file;
pub mod git;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::{SourceConfig, SourceKind};
use crate::core::errors::Result;
use crate::engine::atomic::atomic_write;

pub use file::FileFetcher;
pub use git::GitFetcher;

/// Result of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    #[serde(skip)]
    pub content: String,
    /// Upstream moved since the previous fetch (or this is the first fetch).
    pub changed: bool,
    /// Human-readable origin, for logs.
    pub origin: String,
}

/// Produces the upstream base document.
pub trait BaseFetcher {
    fn fetch(&mut self) -> Result<FetchOutcome>;
}

/// Build the fetcher selected by `source.kind`.
pub fn fetcher_for(source: &SourceConfig, state_path: &Path) -> Result<Box<dyn BaseFetcher>> {
    match source.kind {
        SourceKind::Git => Ok(Box::new(GitFetcher::from_config(source)?)),
        SourceKind::File => Ok(Box::new(FileFetcher::from_config(source, state_path)?)),
    }
}

/// Write fetched content to the local base copy.
pub fn store_base(base_file: &Path, outcome: &FetchOutcome) -> Result<()> {
    atomic_write(base_file, outcome.content.as_bytes())
}

/// First executable named `name` on `PATH`.
#[must_use]
pub fn which_binary(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
