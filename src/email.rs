//! Rewrites post HTML into a form that renders acceptably in third-party
//! email clients.
//!
//! The rewrite is a single walk over a real parse tree (not sequential regex
//! passes): the fragment is parsed with `scraper`, each node is re-serialized
//! with the email rules applied in place. The rules are:
//!
//! 1. anchor `href` normalization (empty → `#`, relative → absolute)
//! 2. image `src` normalization (relative → absolute, `data:` untouched)
//! 3. YouTube iframe normalization to a canonical responsive embed
//! 4. responsive inline style injected on unstyled images
//! 5. code blocks restyled for email, interactive copy controls stripped
//! 6. everything else passes through structurally intact
//!
//! This module never errors: empty input produces empty output and the
//! extraction helpers degrade to `None` / an empty list.

use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Inline style injected on images that do not declare one.
pub const RESPONSIVE_IMG_STYLE: &str = "max-width: 100%; height: auto;";

/// Inline style applied to `<pre>` blocks for email rendering.
const PRE_STYLE: &str = "background-color: #f6f8fa; border-radius: 6px; padding: 16px; \
     overflow-x: auto; font-family: ui-monospace, SFMono-Regular, Menlo, monospace; \
     font-size: 14px;";

/// Inline style for normalized video embeds.
const EMBED_STYLE: &str = "width: 100%; aspect-ratio: 16 / 9; border: 0;";

static CLASS_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)featured|hero|cover|thumbnail").expect("valid class regex"));

/// Transformed content plus the representative image the transform found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailHtml {
    pub html: String,
    pub image: Option<String>,
}

/// Rewrite `content` into email-safe HTML against `base_url`.
pub fn transform(content: &str, base_url: &str) -> EmailHtml {
    if content.trim().is_empty() {
        return EmailHtml {
            html: String::new(),
            image: None,
        };
    }
    let doc = Html::parse_fragment(content);
    let mut out = String::new();
    for child in doc.root_element().children() {
        render_node(child, base_url, &mut out);
    }
    let image = extract_featured_image(content, base_url);
    EmailHtml { html: out, image }
}

/// Find a representative image for the content, in priority order:
/// a class-hinted featured/hero/cover/thumbnail image, then any image with
/// explicit width and height attributes, then the first image. Returns the
/// absolutized URL, or `None` when the content has no images.
pub fn extract_featured_image(content: &str, base_url: &str) -> Option<String> {
    if content.trim().is_empty() {
        return None;
    }
    let doc = Html::parse_fragment(content);
    let img_sel = Selector::parse("img").ok()?;
    let images: Vec<ElementRef> = doc.select(&img_sel).collect();

    let hinted = images.iter().find(|img| {
        img.value()
            .attr("class")
            .is_some_and(|class| CLASS_HINT.is_match(class))
    });
    let sized = images.iter().find(|img| {
        img.value().attr("width").is_some() && img.value().attr("height").is_some()
    });

    hinted
        .or(sized)
        .or(images.first())
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| absolutize(src, base_url))
}

/// All image URLs found in the content, in document order, absolutized.
pub fn extract_images(content: &str, base_url: &str) -> Vec<String> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    let doc = Html::parse_fragment(content);
    let Ok(img_sel) = Selector::parse("img") else {
        return Vec::new();
    };
    doc.select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| absolutize(src, base_url))
        .collect()
}

/// Relative→absolute URL rewrite: base trailing slash stripped, leading
/// slash on the path enforced. Absolute URLs, `mailto:`/`tel:` links,
/// fragments and `data:` URIs pass through untouched.
fn absolutize(raw: &str, base_url: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
        || lower.starts_with('#')
    {
        return trimmed.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        trimmed.trim_start_matches('/')
    )
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn render_node(node: NodeRef<'_, Node>, base_url: &str, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                render_element(element, base_url, out);
            }
        }
        // Comments, doctypes and processing instructions have no place in
        // email bodies.
        _ => {}
    }
}

fn render_element(element: ElementRef<'_>, base_url: &str, out: &mut String) {
    let tag = element.value().name();
    match tag {
        // Scripting and interactive controls are meaningless in email.
        "script" | "style" | "noscript" | "template" | "button" => {}
        "iframe" => render_iframe(element, base_url, out),
        _ => {
            out.push('<');
            out.push_str(tag);
            render_attrs(element, base_url, out);
            out.push('>');
            if VOID_ELEMENTS.contains(&tag) {
                return;
            }
            for child in element.children() {
                render_node(child, base_url, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn render_attrs(element: ElementRef<'_>, base_url: &str, out: &mut String) {
    let tag = element.value().name();
    let mut saw_href = false;
    let mut saw_style = false;

    for (name, value) in element.value().attrs() {
        let rewritten = match (tag, name) {
            ("a", "href") => {
                saw_href = true;
                if value.trim().is_empty() {
                    "#".to_string()
                } else {
                    absolutize(value, base_url)
                }
            }
            ("img", "src") => absolutize(value, base_url),
            _ => {
                if name == "style" {
                    saw_style = true;
                }
                value.to_string()
            }
        };
        push_attr(out, name, &rewritten);
    }

    // Rule 1: a missing href becomes a harmless placeholder.
    if tag == "a" && !saw_href {
        push_attr(out, "href", "#");
    }
    // Rule 4: unstyled images get a responsive default; styled ones are
    // left untouched so re-applying the transform is a no-op.
    if tag == "img" && !saw_style {
        push_attr(out, "style", RESPONSIVE_IMG_STYLE);
    }
    // Rule 5: code fences get an email-safe style.
    if tag == "pre" && !saw_style {
        push_attr(out, "style", PRE_STYLE);
    }
}

/// Iframes pointing at a known video host are rewritten to the canonical
/// embed form with fixed query parameters and responsive sizing; everything
/// else is passed through with its src absolutized.
fn render_iframe(element: ElementRef<'_>, base_url: &str, out: &mut String) {
    let src = element.value().attr("src").unwrap_or("").trim();
    if let Some(video_id) = youtube_video_id(src) {
        out.push_str("<iframe");
        push_attr(
            out,
            "src",
            &format!("https://www.youtube.com/embed/{video_id}?rel=0&showinfo=0"),
        );
        push_attr(out, "style", EMBED_STYLE);
        push_attr(out, "allowfullscreen", "");
        out.push_str("></iframe>");
        return;
    }
    out.push_str("<iframe");
    for (name, value) in element.value().attrs() {
        if name == "src" {
            push_attr(out, "src", &absolutize(value, base_url));
        } else {
            push_attr(out, name, value);
        }
    }
    out.push_str("></iframe>");
}

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:embed/|watch\?v=)|youtu\.be/)([A-Za-z0-9_-]{6,})",
    )
    .expect("valid youtube regex")
});

fn youtube_video_id(src: &str) -> Option<String> {
    YOUTUBE_ID
        .captures(src)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    if name == "allowfullscreen" && value.is_empty() {
        return;
    }
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com";

    #[test]
    fn empty_input_is_empty_output() {
        let result = transform("", BASE);
        assert!(result.html.is_empty());
        assert!(result.image.is_none());
        assert!(extract_featured_image("  ", BASE).is_none());
        assert!(extract_images("", BASE).is_empty());
    }

    #[test]
    fn relative_image_becomes_absolute_and_responsive() {
        let result = transform(r#"<img src="/images/a.png">"#, BASE);
        assert_eq!(
            result.html,
            r#"<img src="https://example.com/images/a.png" style="max-width: 100%; height: auto;">"#
        );
        assert_eq!(
            result.image.as_deref(),
            Some("https://example.com/images/a.png")
        );
    }

    #[test]
    fn transform_is_a_no_op_on_its_own_output() {
        let once = transform(
            r#"<p><a href="/about">about</a></p><img src="images/a.png">"#,
            BASE,
        );
        let twice = transform(&once.html, BASE);
        assert_eq!(once.html, twice.html);
    }

    #[test]
    fn styled_image_is_left_untouched() {
        let input = r#"<img src="https://example.com/a.png" style="width: 50%;">"#;
        let result = transform(input, BASE);
        assert_eq!(result.html, input);
    }

    #[test]
    fn empty_and_relative_hrefs_are_normalized() {
        let result = transform(
            r##"<a href="">x</a><a>y</a><a href="/p">z</a><a href="#top">t</a><a href="mailto:a@b.c">m</a>"##,
            BASE,
        );
        assert!(result.html.contains(r##"<a href="#">x</a>"##));
        assert!(result.html.contains(r##"<a href="#">y</a>"##));
        assert!(result.html.contains(r#"<a href="https://example.com/p">z</a>"#));
        assert!(result.html.contains(r##"<a href="#top">t</a>"##));
        assert!(result.html.contains(r#"<a href="mailto:a@b.c">m</a>"#));
    }

    #[test]
    fn base_trailing_slash_is_stripped() {
        let result = transform(r#"<a href="p/q">x</a>"#, "https://example.com/");
        assert!(result.html.contains(r#"href="https://example.com/p/q""#));
    }

    #[test]
    fn data_uri_images_are_untouched() {
        let input = r#"<img src="data:image/png;base64,AAAA">"#;
        let result = transform(input, BASE);
        assert!(result.html.contains(r#"src="data:image/png;base64,AAAA""#));
    }

    #[test]
    fn youtube_iframes_are_canonicalized() {
        for src in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0&showinfo=0",
        ] {
            let result = transform(&format!(r#"<iframe src="{src}"></iframe>"#), BASE);
            assert!(
                result.html.contains(
                    r#"src="https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0&amp;showinfo=0""#
                ),
                "unexpected output for {src}: {}",
                result.html
            );
            assert!(result.html.contains("aspect-ratio: 16 / 9"));
        }
    }

    #[test]
    fn copy_buttons_and_scripts_are_stripped() {
        let result = transform(
            r#"<pre><button class="copy">Copy</button><code>let x = 1;</code></pre><script>evil()</script>"#,
            BASE,
        );
        assert!(!result.html.contains("button"));
        assert!(!result.html.contains("evil"));
        assert!(result.html.contains("<code>let x = 1;</code>"));
        assert!(result.html.contains("overflow-x: auto"));
    }

    #[test]
    fn featured_image_priority_order() {
        let content = r#"
            <img src="/first.png">
            <img src="/sized.png" width="200" height="100">
            <img class="post-hero" src="/hero.png">
        "#;
        assert_eq!(
            extract_featured_image(content, BASE).as_deref(),
            Some("https://example.com/hero.png")
        );

        let no_hint = r#"<img src="/first.png"><img src="/sized.png" width="2" height="1">"#;
        assert_eq!(
            extract_featured_image(no_hint, BASE).as_deref(),
            Some("https://example.com/sized.png")
        );

        let plain = r#"<p>text</p><img src="/first.png"><img src="/second.png">"#;
        assert_eq!(
            extract_featured_image(plain, BASE).as_deref(),
            Some("https://example.com/first.png")
        );

        assert!(extract_featured_image("<p>no images</p>", BASE).is_none());
    }

    #[test]
    fn extract_images_returns_all_in_order() {
        let content = r#"<img src="/a.png"><p><img src="https://cdn.example/b.png"></p>"#;
        assert_eq!(
            extract_images(content, BASE),
            vec![
                "https://example.com/a.png".to_string(),
                "https://cdn.example/b.png".to_string(),
            ]
        );
    }

    #[test]
    fn tables_pass_through_intact() {
        let result = transform(
            "<table><tr><td>a</td><td>b &amp; c</td></tr></table>",
            BASE,
        );
        assert_eq!(
            result.html,
            "<table><tbody><tr><td>a</td><td>b &amp; c</td></tr></tbody></table>"
        );
    }
}
