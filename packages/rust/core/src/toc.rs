//! TOC path resolution.
//!
//! Yuque reports a repository's table of contents as a flat, ordered list
//! whose entries point at their parent by uuid. Each document is exported
//! into a directory named after its ancestors, so the flat list is turned
//! into a document id → ancestor path mapping here.

use std::collections::HashMap;
use std::path::{MAIN_SEPARATOR_STR, PathBuf};

use tracing::{debug, instrument};

use yuque_export_markdown::sanitize_file_name;
use yuque_export_shared::{DocId, ExportError, Result, TocEntry, TocKind};

/// Ancestor titles of a document, root first, excluding the document itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Build a path from root-to-leaf ancestor titles.
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Ancestor titles, root first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the document sits directly under the repository root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Relative directory on disk, each title sanitized into one component.
    pub fn to_fs_path(&self) -> PathBuf {
        self.segments
            .iter()
            .map(|segment| sanitize_file_name(segment))
            .collect()
    }
}

/// Titles joined with the platform separator; empty for top-level documents.
impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join(MAIN_SEPARATOR_STR))
    }
}

/// Map every document entry of `entries` to its ancestor path.
///
/// Title entries are never destinations but do appear as ancestors. Fails
/// with [`ExportError::Resolution`] when a parent uuid is unknown or the
/// parent chain loops.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn resolve_paths(entries: &[TocEntry]) -> Result<HashMap<DocId, DocumentPath>> {
    let by_uuid: HashMap<&str, &TocEntry> =
        entries.iter().map(|e| (e.uuid.as_str(), e)).collect();

    let mut paths = HashMap::new();
    for entry in entries.iter().filter(|e| e.kind == TocKind::Document) {
        let Some(id) = entry.id else {
            debug!(uuid = %entry.uuid, title = %entry.title, "document entry has no id, skipping");
            continue;
        };
        paths.insert(id, ancestor_path(entry, &by_uuid, entries.len())?);
    }

    debug!(documents = paths.len(), "resolved document paths");
    Ok(paths)
}

/// Walk parent links up to a root. A valid chain never has more than
/// `limit` ancestors, so exceeding it means a cycle.
fn ancestor_path(
    entry: &TocEntry,
    by_uuid: &HashMap<&str, &TocEntry>,
    limit: usize,
) -> Result<DocumentPath> {
    let mut titles = Vec::new();
    let mut parent_uuid = entry.parent_uuid.as_str();

    while !parent_uuid.is_empty() {
        let unresolved = || ExportError::Resolution {
            uuid: entry.uuid.clone(),
            parent_uuid: parent_uuid.to_string(),
        };

        if titles.len() >= limit {
            return Err(unresolved());
        }
        let parent = by_uuid.get(parent_uuid).ok_or_else(unresolved)?;

        titles.push(parent.title.clone());
        parent_uuid = parent.parent_uuid.as_str();
    }

    titles.reverse();
    Ok(DocumentPath::new(titles))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
