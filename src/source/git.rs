//! Change source backed by a local git checkout.
//!
//! Shells out to `git` via `tokio::process::Command`. A change id is a
//! revision range `base..head` (or `base...head`); a single revision means
//! `rev..HEAD`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ChangeSource, SourceError};
use crate::diff::{parse_unified_diff, to_file_changes};
use crate::models::change::{ChangeMetadata, TreeEntry, TreeEntryKind};

/// Default ceiling for a single file read through `git show`.
const DEFAULT_MAX_FILE_BYTES: usize = 1_000_000;

/// Reads changes from the git repository at `repo_root`.
#[derive(Debug, Clone)]
pub struct GitChangeSource {
    repo_root: PathBuf,
    max_file_bytes: usize,
}

impl GitChangeSource {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn with_max_file_bytes(mut self, max: usize) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    async fn git(&self, args: &[&str]) -> Result<String, SourceError> {
        debug!(?args, "running git");
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| SourceError::Transport(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_git_failure(args, &stderr));
        }

        // Diffs and file contents may carry non-UTF-8 bytes; those become U+FFFD.
        Ok(match String::from_utf8(output.stdout) {
            Ok(text) => text,
            Err(e) => {
                debug!(?args, "git output is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    }

    /// Resolve a revision to a full commit id.
    async fn resolve(&self, rev: &str) -> Result<String, SourceError> {
        let spec = format!("{rev}^{{commit}}");
        let out = self
            .git(&["rev-parse", "--verify", "--quiet", &spec])
            .await
            .map_err(|_| SourceError::NotFound(format!("revision '{rev}'")))?;
        Ok(out.trim().to_string())
    }
}

/// Split a change id into `(base, head)`.
pub fn parse_change_id(id: &str) -> (String, String) {
    let id = id.trim();
    if let Some((base, head)) = id.split_once("...").or_else(|| id.split_once("..")) {
        let head = if head.is_empty() { "HEAD" } else { head };
        (base.to_string(), head.to_string())
    } else {
        (id.to_string(), "HEAD".to_string())
    }
}

fn classify_git_failure(args: &[&str], stderr: &str) -> SourceError {
    const MISSING: &[&str] = &[
        "unknown revision",
        "bad revision",
        "does not exist",
        "exists on disk, but not in",
        "invalid object name",
        "not a valid object name",
        "needed a single revision",
    ];
    let lower = stderr.to_lowercase();
    if MISSING.iter().any(|m| lower.contains(m)) {
        SourceError::NotFound(stderr.to_string())
    } else {
        SourceError::Transport(format!("git {} failed: {stderr}", args.join(" ")))
    }
}

#[async_trait]
impl ChangeSource for GitChangeSource {
    async fn change_metadata(&self, id: &str) -> Result<ChangeMetadata, SourceError> {
        let (base, head) = parse_change_id(id);
        self.resolve(&base).await?;
        let head_sha = self.resolve(&head).await?;

        let range = format!("{base}...{head}");
        let diff_text = self
            .git(&["diff", "--no-color", "--src-prefix=a/", "--dst-prefix=b/", &range])
            .await?;
        let files = to_file_changes(&parse_unified_diff(&diff_text));

        let log = self
            .git(&["log", "-1", "--format=%s%x00%an%x00%b", &head_sha])
            .await?;
        let mut parts = log.splitn(3, '\0');
        let title = parts.next().unwrap_or_default().trim().to_string();
        let author = parts.next().unwrap_or_default().trim().to_string();
        let description = parts.next().unwrap_or_default().trim().to_string();

        Ok(ChangeMetadata {
            id: id.to_string(),
            title,
            author,
            description,
            base_branch: base,
            head_branch: head,
            head_ref: head_sha,
            files,
            diff_text,
        })
    }

    async fn file_content(&self, path: &str, git_ref: &str) -> Result<String, SourceError> {
        let object = format!("{git_ref}:{path}");
        let size: usize = self
            .git(&["cat-file", "-s", &object])
            .await?
            .trim()
            .parse()
            .map_err(|e| SourceError::Transport(format!("unexpected git cat-file output: {e}")))?;
        if size > self.max_file_bytes {
            return Err(SourceError::TooLarge {
                path: path.to_string(),
                size,
            });
        }
        self.git(&["show", &object]).await
    }

    async fn tree_listing(&self, git_ref: &str) -> Result<Vec<TreeEntry>, SourceError> {
        let out = self.git(&["ls-tree", "-r", "-t", "--full-tree", git_ref]).await?;
        Ok(parse_ls_tree(&out))
    }
}

/// Parse `git ls-tree` lines (`<mode> <type> <object>\t<path>`). Submodules are skipped.
fn parse_ls_tree(output: &str) -> Vec<TreeEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (meta, path) = line.split_once('\t')?;
            let kind = match meta.split_whitespace().nth(1)? {
                "blob" => TreeEntryKind::Blob,
                "tree" => TreeEntryKind::Tree,
                _ => return None,
            };
            Some(TreeEntry {
                path: path.to_string(),
                kind,
            })
        })
        .collect()
}
