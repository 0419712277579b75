//! Export orchestration and domain logic for the Yuque exporter.
//!
//! This crate ties together the API client, TOC path resolution, markdown
//! rewriting and asset downloading into the end-to-end export run.

pub mod index;
pub mod pipeline;
pub mod selection;
pub mod toc;

pub use index::{append_index, render_index};
pub use pipeline::{
    DocumentListing, ExportRequest, ExportSummary, ExportTarget, ExportedDocument, Exporter,
    FailedDocument, ProgressReporter, RepositoryListing, RepositorySummary, SilentProgress,
    list_documents,
};
pub use selection::{DocSelection, IdSelection, plan_targets, select_docs, select_repos};
pub use toc::{DocumentPath, resolve_paths};
