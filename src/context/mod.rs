//! Context assembly: fetching changed-file content, the repository layout
//! and the files the change imports.
//!
//! Only the change metadata is fatal to a review; everything fetched here
//! degrades to empty results with a logged warning.

pub mod imports;
pub mod prompt;
pub mod tree;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::change::{ChangeMetadata, TreeEntryKind};
use crate::models::context::{AssembledContext, FileSnapshot};
use crate::models::language::Language;
use crate::models::metrics::ProcessingMode;
use crate::sizing::{SizeLimits, SizedChange, clip};
use crate::source::{ChangeSource, SourceError};

pub use prompt::render_context_section;

/// Changed files with more changed lines than this are not fetched.
const MAX_CHANGED_FILE_LINES: usize = 5000;
/// Changed files larger than this are dropped after fetching.
const MAX_CHANGED_FILE_BYTES: usize = 100_000;
/// Related and newly-imported files larger than this are dropped.
const MAX_LINKED_FILE_BYTES: usize = 50_000;

/// Default number of concurrent content fetches.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Builds an [`AssembledContext`] from a change source.
pub struct ContextAssembler {
    source: Arc<dyn ChangeSource>,
    limits: SizeLimits,
    concurrency: usize,
}

impl ContextAssembler {
    pub fn new(source: Arc<dyn ChangeSource>, limits: SizeLimits) -> Self {
        Self {
            source,
            limits,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Assemble the context for a right-sized change.
    pub async fn assemble(&self, change: &ChangeMetadata, sized: &SizedChange) -> AssembledContext {
        if !sized.mode.fetches_content() {
            info!(files = change.files.len(), "diff-only mode, skipping content fetch");
            return AssembledContext::degraded(
                ProcessingMode::DiffOnly,
                format!(
                    "Diff-only analysis ({} files - full content fetch skipped for performance)",
                    change.files.len()
                ),
            );
        }

        let git_ref = change.head_ref.as_str();
        let wanted: Vec<String> = sized
            .files
            .iter()
            .take(sized.max_context_files)
            .filter(|f| !f.is_removed() && f.changes() <= MAX_CHANGED_FILE_LINES)
            .map(|f| f.path.clone())
            .collect();

        let changed_files = self
            .fetch_all(wanted, git_ref, MAX_CHANGED_FILE_BYTES, self.limits.max_file_content_size)
            .await;

        let listing = match self.source.tree_listing(git_ref).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "failed to fetch repository tree, continuing without it");
                Vec::new()
            }
        };
        let structure = (!listing.is_empty()).then(|| tree::summarize(&listing));
        let repo_files: HashSet<String> = listing
            .into_iter()
            .filter(|e| e.kind == TreeEntryKind::Blob)
            .map(|e| e.path)
            .collect();

        let import_graph = import_graph(&changed_files);

        let (related_files, imported_files) = if sized.mode.resolves_imports() {
            let related = self
                .related_files(&changed_files, &import_graph, &repo_files, git_ref)
                .await;
            let imported = self
                .newly_imported_files(&sized.diff_text, &changed_files, &related, &repo_files, git_ref)
                .await;
            (related, imported)
        } else {
            (Vec::new(), Vec::new())
        };

        info!(
            changed = changed_files.len(),
            related = related_files.len(),
            imported = imported_files.len(),
            mode = %sized.mode,
            "context assembled"
        );

        AssembledContext {
            mode: sized.mode,
            changed_files,
            related_files,
            imported_files,
            structure,
            import_graph,
            note: None,
        }
    }

    async fn related_files(
        &self,
        changed: &[FileSnapshot],
        graph: &IndexMap<String, Vec<String>>,
        repo_files: &HashSet<String>,
        git_ref: &str,
    ) -> Vec<FileSnapshot> {
        let changed_paths: HashSet<&str> = changed.iter().map(|f| f.path.as_str()).collect();
        let mut targets: IndexSet<String> = IndexSet::new();
        for file in changed {
            let (Some(lang), Some(imports)) = (file.language, graph.get(&file.path)) else {
                continue;
            };
            for import in imports {
                if let Some(path) = imports::resolve_import(import, &file.path, lang, repo_files) {
                    if !changed_paths.contains(path.as_str()) {
                        targets.insert(path);
                    }
                }
            }
        }
        debug!(candidates = targets.len(), "resolved related files");

        let wanted = targets.into_iter().take(self.limits.max_related_files).collect();
        self.fetch_all(wanted, git_ref, MAX_LINKED_FILE_BYTES, self.limits.max_related_file_size)
            .await
    }

    async fn newly_imported_files(
        &self,
        diff: &str,
        changed: &[FileSnapshot],
        related: &[FileSnapshot],
        repo_files: &HashSet<String>,
        git_ref: &str,
    ) -> Vec<FileSnapshot> {
        let known: HashSet<&str> = changed
            .iter()
            .chain(related)
            .map(|f| f.path.as_str())
            .collect();
        let mut targets: IndexSet<String> = IndexSet::new();
        for (source_file, import) in imports::added_imports(diff) {
            let Some(lang) = Language::from_path(&source_file) else {
                continue;
            };
            if let Some(path) = imports::resolve_import(&import, &source_file, lang, repo_files) {
                if !known.contains(path.as_str()) {
                    targets.insert(path);
                }
            }
        }
        debug!(candidates = targets.len(), "resolved newly imported files");

        let wanted = targets
            .into_iter()
            .take(self.limits.max_diff_imported_files)
            .collect();
        self.fetch_all(
            wanted,
            git_ref,
            MAX_LINKED_FILE_BYTES,
            self.limits.max_diff_imported_file_size,
        )
        .await
    }

    /// Fetch files concurrently, keeping input order and dropping failures.
    async fn fetch_all(
        &self,
        paths: Vec<String>,
        git_ref: &str,
        max_bytes: usize,
        prompt_cap: usize,
    ) -> Vec<FileSnapshot> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (idx, path) in paths.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&semaphore);
            let git_ref = git_ref.to_string();
            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    let err = SourceError::Transport("fetch pool closed".into());
                    return (idx, path, Err(err));
                };
                let result = source.file_content(&path, &git_ref).await;
                (idx, path, result)
            });
        }

        let mut fetched = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, path, Ok(content))) => {
                    if content.len() > max_bytes {
                        debug!(path, size = content.len(), "skipping oversized file");
                        continue;
                    }
                    fetched.push((idx, snapshot(path, content, prompt_cap)));
                }
                Ok((_, path, Err(e))) => warn!(path, error = %e, "failed to fetch file content"),
                Err(e) => warn!(error = %e, "file fetch task failed"),
            }
        }

        fetched.sort_by_key(|(idx, _)| *idx);
        fetched.into_iter().map(|(_, s)| s).collect()
    }
}

fn snapshot(path: String, content: String, prompt_cap: usize) -> FileSnapshot {
    FileSnapshot {
        language: Language::from_path(&path),
        content_for_prompt: clip(&content, prompt_cap).to_string(),
        path,
        content,
    }
}

/// Imports of each changed file; files without imports are left out.
pub fn import_graph(files: &[FileSnapshot]) -> IndexMap<String, Vec<String>> {
    files
        .iter()
        .filter_map(|f| {
            let imports = imports::extract_imports(&f.content, f.language?);
            (!imports.is_empty()).then(|| (f.path.clone(), imports))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::change::{FileChange, FileStatus, TreeEntry};
    use crate::sizing::right_size;

    struct MemorySource {
        files: HashMap<String, String>,
        content_calls: AtomicUsize,
        tree_fails: bool,
    }

    impl MemorySource {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect(),
                content_calls: AtomicUsize::new(0),
                tree_fails: false,
            }
        }
    }

    #[async_trait]
    impl ChangeSource for MemorySource {
        async fn change_metadata(&self, id: &str) -> Result<ChangeMetadata, SourceError> {
            Err(SourceError::NotFound(id.to_string()))
        }

        async fn file_content(&self, path: &str, _git_ref: &str) -> Result<String, SourceError> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(path.to_string()))
        }

        async fn tree_listing(&self, _git_ref: &str) -> Result<Vec<TreeEntry>, SourceError> {
            if self.tree_fails {
                return Err(SourceError::Transport("boom".into()));
            }
            let mut paths: Vec<_> = self.files.keys().cloned().collect();
            paths.sort();
            Ok(paths.into_iter().map(TreeEntry::blob).collect())
        }
    }

    fn change_with(files: &[(&str, FileStatus)], diff: &str) -> ChangeMetadata {
        ChangeMetadata {
            head_ref: "HEAD".into(),
            files: files
                .iter()
                .map(|(p, status)| FileChange {
                    path: p.to_string(),
                    status: *status,
                    additions: 2,
                    deletions: 0,
                    patch: String::new(),
                })
                .collect(),
            diff_text: diff.into(),
            ..ChangeMetadata::default()
        }
    }

    const VIEWS_DIFF: &str = "diff --git a/app/views.py b/app/views.py
--- a/app/views.py
+++ b/app/views.py
@@ -1 +1,2 @@
+from app.services import notify
 from app.models import User
";

    fn repo() -> MemorySource {
        MemorySource::new(&[
            ("app/views.py", "from app.models import User\nfrom app.services import notify\n"),
            ("app/models.py", "class User:\n    pass\n"),
            ("app/services.py", "def notify():\n    pass\n"),
            ("app/old.py", "gone"),
        ])
    }

    #[tokio::test]
    async fn full_mode_finds_related_and_newly_imported() {
        let source = Arc::new(repo());
        let change = change_with(
            &[("app/views.py", FileStatus::Modified), ("app/old.py", FileStatus::Removed)],
            VIEWS_DIFF,
        );
        let limits = SizeLimits::default();
        let sized = right_size(&change, ProcessingMode::Full, &limits);
        let ctx = ContextAssembler::new(source, limits).assemble(&change, &sized).await;

        let changed: Vec<_> = ctx.changed_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(changed, ["app/views.py"]);
        let related: Vec<_> = ctx.related_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(related, ["app/models.py", "app/services.py"]);
        // services.py is already related, so nothing new remains.
        assert!(ctx.imported_files.is_empty());
        assert_eq!(ctx.import_graph["app/views.py"], ["app.models", "app.services"]);
        assert!(ctx.structure.is_some());
    }

    #[tokio::test]
    async fn newly_imported_distinct_from_related() {
        let source = Arc::new(MemorySource::new(&[
            ("app/views.py", "import os\n"),
            ("app/services.py", "def notify():\n    pass\n"),
        ]));
        let change = change_with(&[("app/views.py", FileStatus::Modified)], VIEWS_DIFF);
        let limits = SizeLimits::default();
        let sized = right_size(&change, ProcessingMode::Full, &limits);
        let ctx = ContextAssembler::new(source, limits).assemble(&change, &sized).await;

        assert!(ctx.related_files.is_empty());
        let imported: Vec<_> = ctx.imported_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(imported, ["app/services.py"]);
    }

    #[tokio::test]
    async fn truncated_mode_skips_import_resolution() {
        let source = Arc::new(repo());
        let change = change_with(&[("app/views.py", FileStatus::Modified)], VIEWS_DIFF);
        let limits = SizeLimits::default();
        let sized = right_size(&change, ProcessingMode::Truncated, &limits);
        let ctx = ContextAssembler::new(source, limits).assemble(&change, &sized).await;

        assert_eq!(ctx.changed_files.len(), 1);
        assert!(ctx.related_files.is_empty());
        assert!(ctx.imported_files.is_empty());
    }

    #[tokio::test]
    async fn diff_only_fetches_nothing() {
        let source = Arc::new(repo());
        let change = change_with(&[("app/views.py", FileStatus::Modified)], VIEWS_DIFF);
        let limits = SizeLimits::default();
        let sized = right_size(&change, ProcessingMode::DiffOnly, &limits);
        let ctx = ContextAssembler::new(source.clone(), limits)
            .assemble(&change, &sized)
            .await;

        assert_eq!(source.content_calls.load(Ordering::SeqCst), 0);
        assert!(!ctx.has_content());
        assert!(ctx.note.unwrap().starts_with("Diff-only analysis (1 files"));
    }

    #[tokio::test]
    async fn tree_failure_degrades_to_no_structure() {
        let mut source = repo();
        source.tree_fails = true;
        let change = change_with(&[("app/views.py", FileStatus::Modified)], VIEWS_DIFF);
        let limits = SizeLimits::default();
        let sized = right_size(&change, ProcessingMode::Full, &limits);
        let ctx = ContextAssembler::new(Arc::new(source), limits)
            .assemble(&change, &sized)
            .await;

        assert_eq!(ctx.changed_files.len(), 1);
        assert!(ctx.structure.is_none());
        assert!(ctx.related_files.is_empty());
    }

    #[tokio::test]
    async fn fetch_order_is_preserved_and_prompt_view_capped() {
        let big = "y".repeat(20_000);
        let files: Vec<(String, String)> =
            (0..12).map(|i| (format!("m{i:02}.go"), big.clone())).collect();
        let borrowed: Vec<(&str, &str)> =
            files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let source = Arc::new(MemorySource::new(&borrowed));
        let statuses: Vec<(&str, FileStatus)> =
            files.iter().map(|(p, _)| (p.as_str(), FileStatus::Modified)).collect();
        let change = change_with(&statuses, "");
        let limits = SizeLimits::default();
        let sized = right_size(&change, ProcessingMode::Full, &limits);
        let ctx = ContextAssembler::new(source, limits.clone())
            .with_concurrency(3)
            .assemble(&change, &sized)
            .await;

        let order: Vec<_> = ctx.changed_files.iter().map(|f| f.path.clone()).collect();
        let expected: Vec<_> = files.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(order, expected);
        assert!(ctx.changed_files.iter().all(|f| f.content.len() == 20_000));
        assert!(ctx
            .changed_files
            .iter()
            .all(|f| f.content_for_prompt.len() == limits.max_file_content_size));
    }
}
