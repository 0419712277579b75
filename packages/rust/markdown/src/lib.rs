//! Markdown body processing for exported Yuque documents.
//!
//! Cleans up the HTML artifacts Yuque leaves in its markdown, rewrites
//! remote image and attachment references to local `assets/` paths, and
//! turns titles into safe file names.

mod cleanup;
mod names;
mod rewrite;

pub use names::{encode_link_component, sanitize_file_name};
pub use rewrite::{
    ASSETS_DIR, ContentRewriter, DEFAULT_ATTACHMENT_ORIGIN, DEFAULT_IMAGE_ORIGIN, RegexRewriter,
    RewriteContext, RewriteOutput, attachment_api_url,
};
