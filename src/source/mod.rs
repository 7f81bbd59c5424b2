//! Change sources: where the change set, file contents and tree listing
//! come from.

pub mod git;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::change::{ChangeMetadata, TreeEntry};

pub use git::GitChangeSource;

/// Errors from a change source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{path} is too large ({size} bytes)")]
    TooLarge { path: String, size: usize },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Read access to a change request and the repository it targets.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Title, author, branches, file list and diff text of a change.
    async fn change_metadata(&self, id: &str) -> Result<ChangeMetadata, SourceError>;

    /// Content of `path` at revision `git_ref`.
    async fn file_content(&self, path: &str, git_ref: &str) -> Result<String, SourceError>;

    /// Every path in the repository at revision `git_ref`.
    async fn tree_listing(&self, git_ref: &str) -> Result<Vec<TreeEntry>, SourceError>;
}
