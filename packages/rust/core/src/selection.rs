//! Choosing which repositories and documents to export.

use std::str::FromStr;

use tracing::warn;

use yuque_export_shared::{DocId, ExportError, RepoId, Repository, Result};

use crate::pipeline::{DocumentListing, ExportTarget};

/// Either everything, or an explicit list of ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSelection {
    All,
    Ids(Vec<u64>),
}

impl IdSelection {
    /// Parse `ALL` (any case) or a comma-separated id list such as `12, 34`.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens: Vec<&str> = input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            return Err(ExportError::parse("no ids given"));
        }
        if tokens.iter().any(|t| t.eq_ignore_ascii_case("all")) {
            return Ok(Self::All);
        }

        let mut ids = Vec::with_capacity(tokens.len());
        for token in tokens {
            let id = token
                .parse()
                .map_err(|_| ExportError::parse(format!("invalid id '{token}'")))?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(Self::Ids(ids))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl FromStr for IdSelection {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Document selection for one repository, or for every selected repository
/// when `repo` is `None`. Written as `[REPO_ID:]IDS|ALL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocSelection {
    pub repo: Option<RepoId>,
    pub docs: IdSelection,
}

impl DocSelection {
    /// Parse `12,34`, `ALL` or `7:12,34`.
    pub fn parse(input: &str) -> Result<Self> {
        match input.split_once(':') {
            Some((repo, docs)) => {
                let repo = repo.trim();
                let repo = repo
                    .parse()
                    .map_err(|_| ExportError::parse(format!("invalid repository id '{repo}'")))?;
                Ok(Self {
                    repo: Some(repo),
                    docs: IdSelection::parse(docs)?,
                })
            }
            None => Ok(Self {
                repo: None,
                docs: IdSelection::parse(input)?,
            }),
        }
    }
}

impl FromStr for DocSelection {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Pair every repository with the documents to export from it.
///
/// A selection scoped to a repository wins over an unscoped one; without
/// either, every document is exported. An unscoped id list is ambiguous
/// once more than one repository is selected and is rejected, as is a
/// scope naming a repository outside `repos`.
pub fn plan_targets(repos: Vec<Repository>, docs: &[DocSelection]) -> Result<Vec<ExportTarget>> {
    for scoped in docs.iter().filter_map(|d| d.repo) {
        if !repos.iter().any(|r| r.id == scoped) {
            return Err(ExportError::not_found("repository", scoped));
        }
    }

    let unscoped = docs.iter().rev().find(|d| d.repo.is_none()).map(|d| &d.docs);
    if let Some(IdSelection::Ids(_)) = unscoped {
        if repos.len() > 1 {
            return Err(ExportError::parse(
                "document ids must be prefixed with REPO_ID: when several repositories are selected",
            ));
        }
    }

    Ok(repos
        .into_iter()
        .map(|repository| {
            let documents = docs
                .iter()
                .rev()
                .find(|d| d.repo == Some(repository.id))
                .map(|d| &d.docs)
                .or(unscoped)
                .cloned()
                .unwrap_or(IdSelection::All);
            ExportTarget {
                repository,
                documents,
            }
        })
        .collect())
}

/// Resolve a repository selection against the repositories the user owns.
///
/// Fails with [`ExportError::NotFound`] on the first unknown id.
pub fn select_repos(all: &[Repository], selection: &IdSelection) -> Result<Vec<Repository>> {
    match selection {
        IdSelection::All => Ok(all.to_vec()),
        IdSelection::Ids(ids) => ids
            .iter()
            .map(|id| {
                all.iter()
                    .find(|repo| repo.id == *id)
                    .cloned()
                    .ok_or_else(|| ExportError::not_found("repository", id))
            })
            .collect(),
    }
}

/// Resolve a document selection against a repository listing.
///
/// Returns the selected documents in listing order plus the requested ids
/// that are not in the listing.
pub fn select_docs<'a>(
    all: &'a [DocumentListing],
    selection: &IdSelection,
) -> (Vec<&'a DocumentListing>, Vec<DocId>) {
    match selection {
        IdSelection::All => (all.iter().collect(), Vec::new()),
        IdSelection::Ids(ids) => {
            let selected = all.iter().filter(|doc| ids.contains(&doc.id)).collect();
            let missing: Vec<DocId> = ids
                .iter()
                .copied()
                .filter(|id| !all.iter().any(|doc| doc.id == *id))
                .collect();
            for id in &missing {
                warn!(doc_id = id, "document not found in repository, skipping");
            }
            (selected, missing)
        }
    }
}
