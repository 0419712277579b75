//! Repository index file: a nested bullet list mirroring the TOC.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use yuque_export_markdown::{encode_link_component, sanitize_file_name};
use yuque_export_shared::{DocId, ExportError, Result, TocEntry, TocKind};

use crate::toc::DocumentPath;

/// Render the index body for one repository.
///
/// Every entry becomes one line indented by `depth - 1` tabs. Titles are
/// plain text; documents link to `./<repo>/<path>/<title>.md`.
pub fn render_index(
    repo_name: &str,
    toc: &[TocEntry],
    paths: &HashMap<DocId, DocumentPath>,
) -> String {
    let mut out = String::new();

    for entry in toc {
        let tabs = "\t".repeat(entry.depth.saturating_sub(1) as usize);

        let path = match entry.kind {
            TocKind::Document => entry.id.and_then(|id| paths.get(&id)),
            _ => None,
        };

        match (entry.kind, path) {
            (TocKind::Document, Some(path)) => {
                let link = document_link(repo_name, path, &entry.title);
                out.push_str(&format!("{tabs}- [{}]({link}) \n", entry.title));
            }
            (TocKind::Document, None) => {
                warn!(uuid = %entry.uuid, title = %entry.title, "document has no resolved path, listing without link");
                out.push_str(&format!("{tabs}- {} \n", entry.title));
            }
            _ => out.push_str(&format!("{tabs}- {} \n", entry.title)),
        }
    }

    out
}

/// Relative link from the export root to a document's markdown file.
fn document_link(repo_name: &str, path: &DocumentPath, title: &str) -> String {
    let mut parts = vec![encode_link_component(&sanitize_file_name(repo_name))];
    parts.extend(
        path.segments()
            .iter()
            .map(|s| encode_link_component(&sanitize_file_name(s))),
    );
    parts.push(format!(
        "{}.md",
        encode_link_component(&sanitize_file_name(title))
    ));

    format!("./{}", parts.join("/"))
}

/// Append `content` to `<output_root>/<repo>.md`, creating it if needed.
pub fn append_index(output_root: &Path, repo_name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_root).map_err(|e| ExportError::io(output_root, e))?;

    let path = output_root.join(format!("{}.md", sanitize_file_name(repo_name)));
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| ExportError::io(&path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ExportError::io(&path, e))?;

    debug!(path = %path.display(), bytes = content.len(), "index written");
    Ok(path)
}
