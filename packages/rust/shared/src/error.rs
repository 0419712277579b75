//! Error types for the Yuque exporter.
//!
//! Library crates use [`ExportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all export operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A TOC entry points at a parent that does not exist, or the parent
    /// chain never reaches a root.
    #[error("cannot resolve TOC entry {uuid}: parent {parent_uuid:?} does not lead to a root")]
    Resolution { uuid: String, parent_uuid: String },

    /// A selected repository or document is absent from the upstream listing.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Network failure while fetching a document body or an asset.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The upstream API answered with a non-success status.
    #[error("API request {url} returned HTTP {status}")]
    Api { url: String, status: u16 },

    /// Response decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, msg: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.to_string(),
        }
    }

    /// Create a not-found error for an entity of the given kind.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Local filesystem and configuration failures are fatal. Network and
    /// decoding failures only fail the document being exported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ExportError::config("missing token");
        assert_eq!(err.to_string(), "config error: missing token");

        let err = ExportError::not_found("repository", 42);
        assert_eq!(err.to_string(), "repository 42 not found");

        let err = ExportError::Api {
            url: "https://www.yuque.com/api/v2/user".into(),
            status: 401,
        };
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn fatal_classification() {
        let io = ExportError::io("/tmp/x", std::io::Error::other("disk full"));
        assert!(io.is_fatal());
        assert!(ExportError::config("bad").is_fatal());

        assert!(!ExportError::fetch("https://cdn.nlark.com/a.png", "timeout").is_fatal());
        assert!(!ExportError::parse("bad json").is_fatal());
        assert!(
            !ExportError::Resolution {
                uuid: "a".into(),
                parent_uuid: "b".into()
            }
            .is_fatal()
        );
    }
}
