//! Core domain types for Yuque repositories, documents, and assets.

use std::path::PathBuf;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Numeric identifier of a repository (a Yuque "book").
pub type RepoId = u64;

/// Numeric identifier of a document.
pub type DocId = u64;

// ---------------------------------------------------------------------------
// API envelopes
// ---------------------------------------------------------------------------

/// The `{data: ...}` envelope every API response is wrapped in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

/// `meta` block of a listing response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(default)]
    pub total: u64,
}

/// A (possibly aggregated) listing: `{meta: {total}, data: [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub meta: ListMeta,
    pub data: Vec<T>,
}

// ---------------------------------------------------------------------------
// User / Repository
// ---------------------------------------------------------------------------

/// The authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: String,
}

/// A named collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub name: String,
    /// `group/slug` namespace, when the API reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

// ---------------------------------------------------------------------------
// TocEntry
// ---------------------------------------------------------------------------

/// Kind of a table-of-contents node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TocKind {
    /// A section heading. Becomes a directory, never a file.
    #[serde(rename = "TITLE")]
    Title,
    /// An exportable document.
    #[serde(rename = "DOC", alias = "DOCUMENT")]
    Document,
    /// Anything else the API reports (external links and the like).
    #[serde(other)]
    Other,
}

/// A single node of a repository's flat TOC listing.
///
/// Nodes form a forest through `parent_uuid`; roots have an empty parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocEntry {
    /// Document id for `DOC` nodes; absent for titles.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<DocId>,
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parent_uuid: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TocKind,
    #[serde(default)]
    pub depth: u32,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// One row of the repository document listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSummary {
    pub id: DocId,
    pub title: String,
    #[serde(default)]
    pub slug: String,
}

/// Document detail as returned by the API; only the body matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDetail {
    pub id: DocId,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
}

/// A document being exported.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    /// Ancestor directory path, `/`-joined (empty for top-level documents).
    pub path: String,
    /// Raw markup; rewritten in place before being persisted.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// What kind of remote asset a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Attachment,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Attachment => f.write_str("attachment"),
        }
    }
}

/// An asset found in a document body together with its planned local copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub kind: AssetKind,
    /// The exact markup that was matched in the body.
    pub full_match: String,
    /// URL to download from.
    pub remote_url: String,
    /// Path used in the rewritten markup (`assets/...`).
    pub local_relative_path: String,
    /// Where the download is written.
    pub local_absolute_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Accept ids as numbers, numeric strings, empty strings or null.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid id {n}"))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!("invalid id {other}"))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toc_entry_deserializes_title_and_doc() {
        let json = r#"[
            {"type": "TITLE", "title": "Guide", "uuid": "u1", "parent_uuid": "", "id": "", "depth": 1},
            {"type": "DOC", "title": "Intro", "uuid": "u2", "parent_uuid": "u1", "id": 101, "depth": 2},
            {"type": "LINK", "title": "Home", "uuid": "u3", "parent_uuid": null, "depth": 1}
        ]"#;

        let entries: Vec<TocEntry> = serde_json::from_str(json).expect("deserialize toc");
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].kind, TocKind::Title);
        assert_eq!(entries[0].id, None);
        assert!(entries[0].parent_uuid.is_empty());

        assert_eq!(entries[1].kind, TocKind::Document);
        assert_eq!(entries[1].id, Some(101));
        assert_eq!(entries[1].parent_uuid, "u1");

        assert_eq!(entries[2].kind, TocKind::Other);
        assert!(entries[2].parent_uuid.is_empty());
    }

    #[test]
    fn toc_entry_accepts_string_ids() {
        let json = r#"{"type": "DOCUMENT", "title": "A", "uuid": "x", "id": "77", "depth": 1}"#;
        let entry: TocEntry = serde_json::from_str(json).expect("deserialize");
        assert_eq!(entry.kind, TocKind::Document);
        assert_eq!(entry.id, Some(77));
        assert_eq!(entry.parent_uuid, "");
    }

    #[test]
    fn toc_entry_rejects_garbage_ids() {
        let json = r#"{"type": "DOC", "title": "A", "uuid": "x", "id": "abc", "depth": 1}"#;
        assert!(serde_json::from_str::<TocEntry>(json).is_err());
    }

    #[test]
    fn list_response_deserialization() {
        let json = r#"{"meta": {"total": 2}, "data": [
            {"id": 1, "title": "One", "slug": "one"},
            {"id": 2, "title": "Two"}
        ]}"#;
        let parsed: ListResponse<DocSummary> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.meta.total, 2);
        assert_eq!(parsed.data[1].slug, "");
    }

    #[test]
    fn doc_detail_null_body() {
        let json = r#"{"data": {"id": 5, "title": "Empty", "body": null}}"#;
        let parsed: ApiEnvelope<DocDetail> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.data.body, "");
    }
}
