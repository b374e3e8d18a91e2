//! Repository extraction: clone, walk, filter, and aggregate file
//! content under byte budgets.
//!
//! The walk is deterministic (sorted directories, priority-sorted files)
//! so truncation under the total budget is reproducible and biased
//! toward keeping code over binary/noise files.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ExtractError, ExtractResult};
use crate::traits::extractor::{ExtractContext, Extractor};
use crate::traits::store::{DocumentFilter, DocumentRecord, DocumentStore, InsertOutcome};
use crate::types::config::RepositoryConfig;
use crate::types::document::RepositoryDocument;

/// Extensions processed ahead of everything else within a directory.
const PRIORITY_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".cpp", ".c", ".h", ".cs", ".php", ".rb", ".go", ".rs",
    ".swift", ".kt", ".scala", ".r", ".sql", ".html", ".css", ".scss", ".less", ".vue", ".jsx",
    ".tsx", ".md", ".txt", ".yml", ".yaml", ".json", ".xml", ".sh", ".bat", ".ps1", ".dockerfile",
    ".nf",
];

/// Directory names marking dependency caches and build outputs, matched
/// case-insensitively as substrings of the relative path.
const HEAVY_DIR_NAMES: &[&str] = &[
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    "build",
    "dist",
    "target",
];

/// Source of repository working trees.
///
/// The seam lets tests materialize fixture trees without touching the
/// network; production uses [`GitCloneSource`].
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Materialize the repository behind `link` under `workspace` and
    /// return the checkout root.
    async fn fetch(&self, link: &str, workspace: &Path) -> ExtractResult<PathBuf>;
}

/// Clones through the `git` CLI, bounded by a deadline.
pub struct GitCloneSource {
    timeout: Duration,
}

impl GitCloneSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RepositorySource for GitCloneSource {
    async fn fetch(&self, link: &str, workspace: &Path) -> ExtractResult<PathBuf> {
        let name = repo_name(link)?;
        let dest = workspace.join(&name);

        let clone = Command::new("git")
            .args(["clone", "--depth", "1"])
            .arg(link)
            .arg(&dest)
            .output();

        let output = tokio::time::timeout(self.timeout, clone)
            .await
            .map_err(|_| ExtractError::Timeout {
                operation: format!("git clone {}", link),
                seconds: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Clone {
                link: link.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(dest)
    }
}

/// Repository name: the last path segment of the link.
pub(crate) fn repo_name(link: &str) -> ExtractResult<String> {
    let name = link
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");

    if name.is_empty() {
        return Err(ExtractError::InvalidLink {
            link: link.to_string(),
        });
    }
    Ok(name.to_string())
}

/// What a budgeted walk over a checkout produced.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Relative path → normalized text, in accumulation order
    pub files: IndexMap<String, String>,

    /// Sum of accumulated content lengths
    pub total_bytes: usize,

    /// Files accumulated
    pub files_read: usize,

    /// Files skipped by ignore patterns, size caps, or read failures
    pub files_skipped: usize,

    /// Whether the total budget stopped the walk early
    pub truncated: bool,
}

fn has_priority_extension(lower_name: &str) -> bool {
    PRIORITY_EXTENSIONS.iter().any(|ext| lower_name.ends_with(ext))
}

fn skip_directory(rel: &str, ignore: &[String]) -> bool {
    if rel.is_empty() {
        return false;
    }
    if ignore.iter().any(|pattern| rel.starts_with(pattern.as_str())) {
        return true;
    }
    let lower = rel.to_lowercase();
    HEAVY_DIR_NAMES.iter().any(|name| lower.contains(name))
}

/// Strip characters that would break the downstream tabular encoding
/// (field separators) and surrounding whitespace.
fn normalize_content(text: &str) -> String {
    text.replace(',', "").trim().to_string()
}

/// Walk a checkout depth-first under the configured budgets.
///
/// The total cap is soft: exceeding it stops both the file loop and the
/// directory loop, and whatever accumulated so far is the result.
pub fn collect_tree(root: &Path, config: &RepositoryConfig) -> ExtractResult<WalkOutcome> {
    let mut outcome = WalkOutcome::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            !skip_directory(&rel, &config.ignore)
        });

    'directories: for entry in walker.filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }

        let rel_dir = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        let mut names: Vec<String> = Vec::new();
        for child in std::fs::read_dir(entry.path())? {
            let child = child?;
            if child.file_type()?.is_file() {
                names.push(child.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort_by_key(|name| {
            let lower = name.to_lowercase();
            (u8::from(!has_priority_extension(&lower)), lower)
        });

        for name in names {
            if config.ignore.iter().any(|pattern| name.ends_with(pattern.as_str())) {
                outcome.files_skipped += 1;
                continue;
            }

            let full_path = entry.path().join(&name);

            // Cheap metadata check before reading the whole file.
            let metadata = match std::fs::metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(error) => {
                    debug!(file = %full_path.display(), error = %error, "could not stat file");
                    outcome.files_skipped += 1;
                    continue;
                }
            };
            if metadata.len() > config.max_file_bytes {
                debug!(file = %name, bytes = metadata.len(), "skipping oversized file");
                outcome.files_skipped += 1;
                continue;
            }

            let bytes = match std::fs::read(&full_path) {
                Ok(bytes) => bytes,
                Err(error) => {
                    debug!(file = %full_path.display(), error = %error, "could not read file");
                    outcome.files_skipped += 1;
                    continue;
                }
            };

            // Invalid encoding bytes are tolerated; the decoded length can
            // diverge from the on-disk size, so the cap is checked again.
            let text = String::from_utf8_lossy(&bytes);
            if text.len() as u64 > config.max_file_bytes {
                debug!(file = %name, bytes = text.len(), "skipping oversized decoded content");
                outcome.files_skipped += 1;
                continue;
            }

            let normalized = normalize_content(&text);
            if normalized.is_empty() {
                continue;
            }

            let rel_file = if rel_dir.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", rel_dir, name)
            };
            outcome.total_bytes += normalized.len();
            outcome.files.insert(rel_file, normalized);
            outcome.files_read += 1;

            if outcome.total_bytes as u64 > config.max_total_bytes {
                info!(
                    bytes = outcome.total_bytes,
                    "total content budget reached, stopping walk"
                );
                outcome.truncated = true;
                break 'directories;
            }
        }
    }

    Ok(outcome)
}

/// Extraction capability for version-control links.
pub struct RepositoryExtractor<S> {
    store: Arc<S>,
    source: Arc<dyn RepositorySource>,
    config: RepositoryConfig,
}

impl<S: DocumentStore> RepositoryExtractor<S> {
    /// Create an extractor cloning through the git CLI.
    pub fn new(store: Arc<S>, config: RepositoryConfig) -> Self {
        let source = Arc::new(GitCloneSource::new(config.clone_timeout));
        Self {
            store,
            source,
            config,
        }
    }

    /// Swap the repository source (used by tests).
    pub fn with_source(mut self, source: Arc<dyn RepositorySource>) -> Self {
        self.source = source;
        self
    }

    async fn extract_into(
        &self,
        workspace: &Path,
        link: &str,
        ctx: &ExtractContext,
    ) -> ExtractResult<()> {
        let checkout = self.source.fetch(link, workspace).await?;

        let config = self.config.clone();
        let outcome = tokio::task::spawn_blocking(move || collect_tree(&checkout, &config))
            .await
            .map_err(|error| ExtractError::Io(std::io::Error::other(error)))??;

        info!(
            link = %link,
            files = outcome.files_read,
            skipped = outcome.files_skipped,
            bytes = outcome.total_bytes,
            truncated = outcome.truncated,
            "repository walk complete"
        );

        let document = RepositoryDocument::new(
            repo_name(link)?,
            link,
            outcome.files,
            &self.config.platform,
            &ctx.user,
        );

        match self
            .store
            .insert_unique(&DocumentFilter::by_link(link), &document)
            .await?
        {
            InsertOutcome::Inserted(doc) => {
                info!(id = %doc.id(), link = %link, "repository document persisted");
            }
            InsertOutcome::Existing(doc) => {
                info!(
                    id = %doc.id(),
                    link = %link,
                    "repository ingested concurrently, keeping prior document"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DocumentStore> Extractor for RepositoryExtractor<S> {
    fn platform(&self) -> &str {
        &self.config.platform
    }

    async fn extract(&self, link: &str, ctx: &ExtractContext) -> ExtractResult<()> {
        // Dedup: a prior document for this link suppresses re-extraction.
        if let Some(existing) = self
            .store
            .find::<RepositoryDocument>(&DocumentFilter::by_link(link))
            .await?
        {
            info!(link = %link, id = %existing.id(), "repository already ingested, skipping");
            return Ok(());
        }

        info!(link = %link, "starting repository extraction");
        let workspace = TempDir::new()?;
        let result = self.extract_into(workspace.path(), link, ctx).await;

        // Cleanup runs on every exit path; failures are logged and never
        // allowed to mask the extraction result. Drop still removes the
        // directory if the job is cancelled before reaching this point.
        if let Err(error) = workspace.close() {
            warn!(error = %error, "workspace cleanup failed");
        }

        result
    }
}
