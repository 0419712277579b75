//! Asset discovery and link rewriting.
//!
//! A [`ContentRewriter`] takes a raw document body, finds the images and
//! attachments hosted upstream, plans where each one lands locally, and
//! returns the body with those references pointing at the local copies.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use yuque_export_shared::{AssetKind, AssetReference, ExportError, Result};

use crate::cleanup;
use crate::names::encode_link_component;

/// Name of the per-directory folder holding downloaded assets.
pub const ASSETS_DIR: &str = "assets";

/// Default origin serving embedded images.
pub const DEFAULT_IMAGE_ORIGIN: &str = "https://cdn.nlark.com";

/// Default origin serving attachments.
pub const DEFAULT_ATTACHMENT_ORIGIN: &str = "https://www.yuque.com";

/// Image extensions recognized on the image host, matched case-insensitively.
const IMAGE_EXTENSIONS: &str = "png|jpe?g|gif|webp|svg|bmp";

/// Per-document inputs to a rewrite.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Document title, already sanitized for use as a file name.
    pub title: &'a str,
    /// Absolute directory the assets are written to.
    pub assets_dir: &'a Path,
}

/// Rewritten body plus the downloads it depends on.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutput {
    pub body: String,
    /// Images first, then attachments, each in order of first appearance.
    pub assets: Vec<AssetReference>,
}

/// Strategy for locating and rewriting remote asset references.
pub trait ContentRewriter: Send + Sync {
    /// Normalize `body` and rewrite every recognized remote asset reference.
    fn rewrite(&self, body: &str, ctx: &RewriteContext<'_>) -> RewriteOutput;
}

// ---------------------------------------------------------------------------
// RegexRewriter
// ---------------------------------------------------------------------------

/// Pattern-matching rewriter for Yuque markdown.
///
/// Images are `![alt](<image origin>/yuque/....<ext>)`, optionally followed by
/// a `#`/`?` suffix. Attachments are `[text](<attachment origin>/attachments/.../<file>)`.
#[derive(Debug, Clone)]
pub struct RegexRewriter {
    image_re: Regex,
    attachment_re: Regex,
}

impl Default for RegexRewriter {
    fn default() -> Self {
        Self::with_origins(DEFAULT_IMAGE_ORIGIN, DEFAULT_ATTACHMENT_ORIGIN)
            .expect("default origins are valid")
    }
}

impl RegexRewriter {
    /// Rewriter for the public Yuque hosts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewriter matching custom image and attachment origins
    /// (e.g. `https://cdn.nlark.com`, `https://www.yuque.com`).
    pub fn with_origins(image_origin: &str, attachment_origin: &str) -> Result<Self> {
        let image_origin = regex::escape(&normalize_origin(image_origin)?);
        let attachment_origin = regex::escape(&normalize_origin(attachment_origin)?);

        let image_re = Regex::new(&format!(
            r"!\[[^\]]*\]\(({image_origin}/yuque/[^)\s#?]*\.((?i:{IMAGE_EXTENSIONS})))(?:[#?][^)\s]*)?\)"
        ))
        .map_err(|e| ExportError::config(format!("invalid image pattern: {e}")))?;

        let attachment_re = Regex::new(&format!(
            r"\[([^\]]*)\]\(({attachment_origin}/attachments/[^)\s#?]*/([^/)\s#?]+))(?:[#?][^)\s]*)?\)"
        ))
        .map_err(|e| ExportError::config(format!("invalid attachment pattern: {e}")))?;

        Ok(Self {
            image_re,
            attachment_re,
        })
    }

    /// Image pass: `![..](cdn)` → `![{title}-{i}](assets/{title}-{i}.{ext})`.
    fn rewrite_images(&self, body: &mut String, ctx: &RewriteContext<'_>) -> Vec<AssetReference> {
        let mut seen = HashSet::new();
        let matches: Vec<(String, String, String)> = self
            .image_re
            .captures_iter(body.as_str())
            .filter(|caps| seen.insert(caps[0].to_string()))
            .map(|caps| (caps[0].to_string(), caps[1].to_string(), caps[2].to_string()))
            .collect();

        let link_title = encode_link_component(ctx.title);
        let mut assets = Vec::with_capacity(matches.len());

        for (index, (full_match, url, ext)) in matches.into_iter().enumerate() {
            let relative = format!("{ASSETS_DIR}/{link_title}-{index}.{ext}");
            let replacement = format!("![{link_title}-{index}]({relative})");
            *body = body.replace(&full_match, &replacement);

            assets.push(AssetReference {
                kind: AssetKind::Image,
                full_match,
                remote_url: url,
                local_relative_path: relative,
                local_absolute_path: ctx.assets_dir.join(format!("{}-{index}.{ext}", ctx.title)),
            });
        }

        assets
    }

    /// Attachment pass: `[text](host/attachments/../f)` → `[text](assets/f)`.
    fn rewrite_attachments(
        &self,
        body: &mut String,
        ctx: &RewriteContext<'_>,
    ) -> Vec<AssetReference> {
        let mut seen = HashSet::new();
        let matches: Vec<(String, String, String, String)> = self
            .attachment_re
            .captures_iter(body.as_str())
            .filter(|caps| seen.insert(caps[0].to_string()))
            .map(|caps| {
                (
                    caps[0].to_string(),
                    caps[1].to_string(),
                    caps[2].to_string(),
                    caps[3].to_string(),
                )
            })
            .collect();

        let mut assets = Vec::with_capacity(matches.len());

        for (full_match, text, url, file_name) in matches {
            if file_name == "." || file_name == ".." {
                warn!(url = %url, "attachment URL has no usable file name, leaving link remote");
                continue;
            }

            let relative = format!("{ASSETS_DIR}/{file_name}");
            let replacement = format!("[{text}]({relative})");
            *body = body.replace(&full_match, &replacement);

            assets.push(AssetReference {
                kind: AssetKind::Attachment,
                full_match,
                remote_url: attachment_api_url(&url),
                local_relative_path: relative,
                local_absolute_path: ctx.assets_dir.join(&file_name),
            });
        }

        assets
    }
}

impl ContentRewriter for RegexRewriter {
    fn rewrite(&self, body: &str, ctx: &RewriteContext<'_>) -> RewriteOutput {
        let mut body = cleanup::run_pipeline(body);

        let mut assets = self.rewrite_images(&mut body, ctx);
        let images = assets.len();
        assets.extend(self.rewrite_attachments(&mut body, ctx));

        debug!(
            title = ctx.title,
            images,
            attachments = assets.len() - images,
            "rewrote asset references"
        );

        RewriteOutput { body, assets }
    }
}

/// Point an attachment URL at the API endpoint instead of the web viewer.
pub fn attachment_api_url(url: &str) -> String {
    url.replace("/attachments/", "/api/v2/attachments/")
}

/// Reduce an origin to `scheme://host[:port]`.
fn normalize_origin(origin: &str) -> Result<String> {
    let url = Url::parse(origin)
        .map_err(|e| ExportError::config(format!("invalid asset origin '{origin}': {e}")))?;
    if url.host_str().is_none() {
        return Err(ExportError::config(format!("asset origin '{origin}' has no host")));
    }
    Ok(url.origin().ascii_serialization())
}
