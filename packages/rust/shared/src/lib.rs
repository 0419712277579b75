//! Shared types, error model, and configuration for the Yuque exporter.
//!
//! This crate is the foundation depended on by all other crates in the workspace.
//! It provides:
//! - [`ExportError`]: the unified error type
//! - Domain types ([`TocEntry`], [`Repository`], [`AssetReference`], ...)
//! - Configuration ([`AppConfig`], [`ClientConfig`], [`ExportConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AUTH_HEADER, ApiConfig, AppConfig, AssetFailurePolicy, ClientConfig, ExportConfig, ExportSettings,
    USER_AGENT, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_token,
};
pub use error::{ExportError, Result};
pub use types::{
    ApiEnvelope, AssetKind, AssetReference, DocDetail, DocId, DocSummary, Document, ListMeta,
    ListResponse, RepoId, Repository, TocEntry, TocKind, User,
};
