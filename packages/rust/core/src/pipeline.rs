//! End-to-end export: repositories → TOC paths → documents → markdown + assets → index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use yuque_export_api::YuqueClient;
use yuque_export_fetcher::AssetFetcher;
use yuque_export_markdown::{ASSETS_DIR, ContentRewriter, RewriteContext, sanitize_file_name};
use yuque_export_shared::{
    AssetFailurePolicy, DocId, Document, ExportConfig, ExportError, RepoId, Repository, Result,
    TocEntry,
};

use crate::index::{append_index, render_index};
use crate::selection::{IdSelection, select_docs};
use crate::toc::{DocumentPath, resolve_paths};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A document of a repository together with its resolved TOC path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentListing {
    pub id: DocId,
    pub title: String,
    pub path: DocumentPath,
}

/// Everything known about a repository before its documents are fetched.
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    pub toc: Vec<TocEntry>,
    pub paths: HashMap<DocId, DocumentPath>,
    /// Documents in listing order.
    pub documents: Vec<DocumentListing>,
    /// Total as reported by the listing endpoint.
    pub reported_total: u64,
}

/// Fetch the TOC and the full document listing of a repository and join them.
///
/// Documents the TOC does not mention are placed at the repository root.
#[instrument(skip(api))]
pub async fn list_documents(api: &YuqueClient, repo_id: RepoId) -> Result<RepositoryListing> {
    let toc = api.repo_toc(repo_id).await?;
    let paths = resolve_paths(&toc)?;
    let listing = api.list_docs(repo_id).await?;

    let documents = listing
        .data
        .into_iter()
        .map(|doc| {
            let path = match paths.get(&doc.id) {
                Some(path) => path.clone(),
                None => {
                    debug!(doc_id = doc.id, title = %doc.title, "document not in TOC, exporting at root");
                    DocumentPath::default()
                }
            };
            DocumentListing {
                id: doc.id,
                title: doc.title,
                path,
            }
        })
        .collect();

    Ok(RepositoryListing {
        toc,
        paths,
        documents,
        reported_total: listing.meta.total,
    })
}

// ---------------------------------------------------------------------------
// Request / summary
// ---------------------------------------------------------------------------

/// One repository to export and which of its documents.
#[derive(Debug, Clone)]
pub struct ExportTarget {
    pub repository: Repository,
    pub documents: IdSelection,
}

/// A full export run.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub targets: Vec<ExportTarget>,
}

/// A document written to disk.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub repo_id: RepoId,
    pub doc_id: DocId,
    pub title: String,
    pub markdown_path: PathBuf,
    pub assets_downloaded: usize,
    /// Assets that failed but did not stop the document from being written.
    pub assets_failed: usize,
}

/// A document that was not written.
#[derive(Debug, Clone)]
pub struct FailedDocument {
    pub doc_id: DocId,
    pub title: String,
    pub error: String,
}

/// Outcome of exporting one repository.
#[derive(Debug, Clone)]
pub struct RepositorySummary {
    pub repository: Repository,
    pub exported: Vec<ExportedDocument>,
    pub failed: Vec<FailedDocument>,
    /// Requested ids absent from the repository.
    pub not_found: Vec<DocId>,
    pub index_path: Option<PathBuf>,
    /// Set when the repository could not be listed at all.
    pub error: Option<String>,
}

impl RepositorySummary {
    fn new(repository: Repository) -> Self {
        Self {
            repository,
            exported: Vec::new(),
            failed: Vec::new(),
            not_found: Vec::new(),
            index_path: None,
            error: None,
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub repositories: Vec<RepositorySummary>,
    pub elapsed: Duration,
}

impl ExportSummary {
    pub fn exported_count(&self) -> usize {
        self.repositories.iter().map(|r| r.exported.len()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.repositories.iter().map(|r| r.failed.len()).sum()
    }

    pub fn not_found_count(&self) -> usize {
        self.repositories.iter().map(|r| r.not_found.len()).sum()
    }

    /// Repositories that could not be listed.
    pub fn failed_repositories(&self) -> impl Iterator<Item = &RepositorySummary> {
        self.repositories.iter().filter(|r| r.error.is_some())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting export status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the repository's documents have been selected.
    fn repository_started(&self, repo: &Repository, documents: usize);
    /// Called before a document body is fetched.
    fn document_started(&self, doc: &DocumentListing, current: usize, total: usize);
    /// Called after a document's markdown is written.
    fn document_exported(&self, doc: &ExportedDocument);
    /// Called when a document is skipped because of an error.
    fn document_failed(&self, doc: &DocumentListing, error: &ExportError);
    /// Called for each requested document id the repository does not have.
    fn document_not_found(&self, repo: &Repository, doc_id: DocId);
    /// Called when a repository is done, including when it could not be listed.
    fn repository_finished(&self, summary: &RepositorySummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn repository_started(&self, _repo: &Repository, _documents: usize) {}
    fn document_started(&self, _doc: &DocumentListing, _current: usize, _total: usize) {}
    fn document_exported(&self, _doc: &ExportedDocument) {}
    fn document_failed(&self, _doc: &DocumentListing, _error: &ExportError) {}
    fn document_not_found(&self, _repo: &Repository, _doc_id: DocId) {}
    fn repository_finished(&self, _summary: &RepositorySummary) {}
}

// ---------------------------------------------------------------------------
// Exporter
// ---------------------------------------------------------------------------

/// Drives an export run.
///
/// Repositories and documents are processed one at a time; the assets of a
/// single document are downloaded concurrently.
pub struct Exporter {
    api: YuqueClient,
    fetcher: AssetFetcher,
    rewriter: Box<dyn ContentRewriter>,
    config: ExportConfig,
}

impl Exporter {
    pub fn new(
        api: YuqueClient,
        fetcher: AssetFetcher,
        rewriter: Box<dyn ContentRewriter>,
        config: ExportConfig,
    ) -> Self {
        Self {
            api,
            fetcher,
            rewriter,
            config,
        }
    }

    /// Export every target of `request`.
    ///
    /// Document and repository failures are recorded in the summary and the
    /// run continues; I/O and configuration errors abort it.
    #[instrument(skip_all, fields(repositories = request.targets.len(), root = %self.config.output_root.display()))]
    pub async fn export(
        &self,
        request: &ExportRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ExportSummary> {
        let start = Instant::now();
        info!("starting export");

        let mut summary = ExportSummary::default();
        for target in &request.targets {
            let repo_summary = self.export_repository(target, progress).await?;
            progress.repository_finished(&repo_summary);
            summary.repositories.push(repo_summary);
        }

        summary.elapsed = start.elapsed();
        info!(
            exported = summary.exported_count(),
            failed = summary.failed_count(),
            not_found = summary.not_found_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "export complete"
        );

        Ok(summary)
    }

    /// Export the selected documents of one repository, then append its index.
    #[instrument(skip_all, fields(repo_id = target.repository.id, repo = %target.repository.name))]
    async fn export_repository(
        &self,
        target: &ExportTarget,
        progress: &dyn ProgressReporter,
    ) -> Result<RepositorySummary> {
        let repo = &target.repository;
        let mut summary = RepositorySummary::new(repo.clone());

        let listing = match list_documents(&self.api, repo.id).await {
            Ok(listing) => listing,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(error = %e, "failed to list repository, skipping");
                summary.error = Some(e.to_string());
                return Ok(summary);
            }
        };

        let (selected, missing) = select_docs(&listing.documents, &target.documents);
        for doc_id in missing {
            progress.document_not_found(repo, doc_id);
            summary.not_found.push(doc_id);
        }

        info!(
            documents = selected.len(),
            reported_total = listing.reported_total,
            "exporting repository"
        );
        progress.repository_started(repo, selected.len());

        let total = selected.len();
        for (i, doc) in selected.into_iter().enumerate() {
            progress.document_started(doc, i + 1, total);

            match self.export_document(repo, doc).await {
                Ok(exported) => {
                    progress.document_exported(&exported);
                    summary.exported.push(exported);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(doc_id = doc.id, title = %doc.title, error = %e, "document skipped");
                    progress.document_failed(doc, &e);
                    summary.failed.push(FailedDocument {
                        doc_id: doc.id,
                        title: doc.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let index = render_index(&repo.name, &listing.toc, &listing.paths);
        summary.index_path = Some(append_index(&self.config.output_root, &repo.name, &index)?);

        Ok(summary)
    }

    /// Fetch, rewrite and persist one document with its assets.
    #[instrument(skip_all, fields(doc_id = listing.id))]
    async fn export_document(
        &self,
        repo: &Repository,
        listing: &DocumentListing,
    ) -> Result<ExportedDocument> {
        let body = self.api.doc_body(repo.id, listing.id).await?;
        let mut document = Document {
            id: listing.id,
            title: listing.title.clone(),
            path: listing.path.to_string(),
            body,
        };

        let doc_dir = self
            .config
            .output_root
            .join(sanitize_file_name(&repo.name))
            .join(listing.path.to_fs_path());
        let assets_dir = doc_dir.join(ASSETS_DIR);
        ensure_dir(&assets_dir)?;

        let file_title = sanitize_file_name(&document.title);
        let ctx = RewriteContext {
            title: &file_title,
            assets_dir: &assets_dir,
        };
        let rewritten = self.rewriter.rewrite(&document.body, &ctx);
        document.body = rewritten.body;

        let mut report = self.fetcher.fetch_all(&rewritten.assets).await;
        if let Some(pos) = report.failed.iter().position(|f| f.error.is_fatal()) {
            return Err(report.failed.swap_remove(pos).error);
        }
        if !report.is_complete() && self.config.on_asset_error == AssetFailurePolicy::FailDocument
        {
            let failed = report.failed.len();
            let first = report.failed.swap_remove(0);
            return Err(ExportError::fetch(
                first.asset.remote_url,
                format!(
                    "{failed} of {} assets failed, first: {}",
                    rewritten.assets.len(),
                    first.error
                ),
            ));
        }

        let markdown_path = doc_dir.join(format!("{file_title}.md"));
        std::fs::write(&markdown_path, &document.body)
            .map_err(|e| ExportError::io(&markdown_path, e))?;

        info!(
            title = %document.title,
            path = %document.path,
            assets = report.downloaded.len(),
            "document exported"
        );

        Ok(ExportedDocument {
            repo_id: repo.id,
            doc_id: document.id,
            title: document.title,
            markdown_path,
            assets_downloaded: report.downloaded.len(),
            assets_failed: report.failed.len(),
        })
    }
}

/// Create `dir` and its parents, logging the first creation.
fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;
        debug!(path = %dir.display(), "created directory");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
