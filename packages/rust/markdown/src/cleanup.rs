//! Normalization passes applied to a raw Yuque body before asset rewriting.
//!
//! Each pass is a function `&str -> String` applied in sequence. Yuque's
//! markdown export leaves HTML artifacts behind (heading anchors, `<br />`
//! tags glued to images) and decorates image URLs with `#`/`?` suffixes;
//! these passes turn that into plain markdown.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on a raw document body.
pub(crate) fn run_pipeline(body: &str) -> String {
    let mut result = strip_name_anchors(body);

    result = collapse_image_breaks(&result);
    result = convert_line_breaks(&result);
    result = strip_image_url_suffixes(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Strip heading anchors
// ---------------------------------------------------------------------------

/// Remove `<a name="...">...</a>` anchors Yuque emits in front of headings.
fn strip_name_anchors(body: &str) -> String {
    static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"<a\s+name="[^"]*"\s*>[^<]*</a>"#).expect("valid regex")
    });

    ANCHOR_RE.replace_all(body, "").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 2: Collapse breaks around images and links
// ---------------------------------------------------------------------------

/// Turn a `<br />` directly before an image, or directly after a closing
/// `)`, into a single newline.
fn collapse_image_breaks(body: &str) -> String {
    static BR_BEFORE_IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<br\s*/?>!\[").expect("valid regex"));
    static BR_AFTER_PAREN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\)<br\s*/?>").expect("valid regex"));

    let result = BR_BEFORE_IMAGE_RE.replace_all(body, "\n![");
    BR_AFTER_PAREN_RE.replace_all(&result, ")\n").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: Line-break tags to newlines
// ---------------------------------------------------------------------------

fn convert_line_breaks(body: &str) -> String {
    static BR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<br\s*/?>").expect("valid regex"));

    BR_RE.replace_all(body, "\n").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: Strip image URL suffixes
// ---------------------------------------------------------------------------

/// Drop the `#...` / `?...` tail glued onto `.png` and `.jpeg` URLs.
///
/// `pic.png#averageHue=...&width=300)` becomes `pic.png)`.
fn strip_image_url_suffixes(body: &str) -> String {
    static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\.((?i:png|jpeg))[#?][^)\s]*\)").expect("valid regex")
    });

    SUFFIX_RE.replace_all(body, ".$1)").into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_name_anchors_removes_heading_anchors() {
        let input = "<a name=\"Ab3xZ\"></a>\n## Setup\n<a name=\"q9\">x</a>text";
        assert_eq!(strip_name_anchors(input), "\n## Setup\ntext");
    }

    #[test]
    fn strip_name_anchors_keeps_regular_links() {
        let input = "<a href=\"https://example.com\">site</a>";
        assert_eq!(strip_name_anchors(input), input);
    }

    #[test]
    fn collapse_break_before_image() {
        let input = "text<br />![image.png](https://cdn.nlark.com/yuque/a.png)";
        assert_eq!(
            collapse_image_breaks(input),
            "text\n![image.png](https://cdn.nlark.com/yuque/a.png)"
        );
    }

    #[test]
    fn collapse_break_after_paren() {
        let input = "![a](https://cdn.nlark.com/yuque/a.png)<br />next";
        assert_eq!(
            collapse_image_breaks(input),
            "![a](https://cdn.nlark.com/yuque/a.png)\nnext"
        );
    }

    #[test]
    fn convert_line_breaks_handles_variants() {
        assert_eq!(convert_line_breaks("a<br />b<br/>c<br>d"), "a\nb\nc\nd");
    }

    #[test]
    fn strip_suffix_after_png_and_jpeg() {
        let input = "![a](https://cdn.nlark.com/yuque/a.png#averageHue=%23f&width=30) and \
                     ![b](https://cdn.nlark.com/yuque/b.jpeg?x-oss-process=image) end";
        assert_eq!(
            strip_image_url_suffixes(input),
            "![a](https://cdn.nlark.com/yuque/a.png) and ![b](https://cdn.nlark.com/yuque/b.jpeg) end"
        );
    }

    #[test]
    fn strip_suffix_keeps_uppercase_extension() {
        let input = "![a](https://cdn.nlark.com/yuque/Shot.PNG#abc)";
        assert_eq!(
            strip_image_url_suffixes(input),
            "![a](https://cdn.nlark.com/yuque/Shot.PNG)"
        );
    }

    #[test]
    fn strip_suffix_leaves_clean_urls() {
        let input = "![a](https://cdn.nlark.com/yuque/a.png)";
        assert_eq!(strip_image_url_suffixes(input), input);
    }

    #[test]
    fn full_pipeline_normalizes_body() {
        let input = "<a name=\"h1\"></a>\n# Title<br />![image.png](https://cdn.nlark.com/yuque/0/1/p.png#w=1)<br />after";
        let result = run_pipeline(input);
        assert_eq!(
            result,
            "\n# Title\n![image.png](https://cdn.nlark.com/yuque/0/1/p.png)\nafter"
        );
    }

    #[test]
    fn pipeline_is_identity_on_plain_markdown() {
        let input = "# Notes\n\n![Doc-0](assets/Doc-0.png)\n\n[a.zip](assets/a.zip)\n";
        assert_eq!(run_pipeline(input), input);
    }
}
