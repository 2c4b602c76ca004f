//! Raw page text extraction.
//!
//! The tab hands us whatever it saw: usually HTML, sometimes plain text.
//! Extraction picks the first structural content region from a fixed
//! priority list, falls back to body text, strips markup and collapses
//! whitespace, then caps the result so a single giant page cannot bloat
//! the store.

pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Browser-internal and extension-internal schemes are never captured.
const INTERNAL_SCHEMES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "about:",
    "edge://",
    "brave://",
    "devtools://",
    "moz-extension://",
    "view-source:",
];

/// Structural regions tried in order; the first match wins.
const REGION_TAGS: &[&str] = &["main", "article"];
const REGION_MARKERS: &[&str] = &["main-content", "content", "post", "entry"];

pub fn is_internal_url(url: &str) -> bool {
    let url = url.trim_start().to_lowercase();
    INTERNAL_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

/// Extract readable text from a raw page payload. Returns an empty string
/// when nothing usable is found; the caller stores the page anyway.
pub fn extract_content(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Plain-text payloads skip the markup path entirely.
    if !trimmed.contains('<') {
        return cap(&collapse_whitespace(trimmed));
    }

    let cleaned = remove_enclosed(trimmed, "script");
    let cleaned = remove_enclosed(&cleaned, "style");

    let region = REGION_TAGS
        .iter()
        .find_map(|tag| find_tag_region(&cleaned, tag))
        .or_else(|| {
            REGION_MARKERS
                .iter()
                .find_map(|marker| find_marked_region(&cleaned, marker))
        })
        .or_else(|| find_tag_region(&cleaned, "body"))
        .unwrap_or_else(|| cleaned.clone());

    cap(&collapse_whitespace(&strip_tags(&region)))
}

/// Inner text of the first `<tag ...>...</tag>` pair, if present.
fn find_tag_region(html: &str, tag: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let open_at = lower.find(&open)?;
    let content_from = open_at + lower[open_at..].find('>')? + 1;
    let close_at = content_from + lower[content_from..].find(&close)?;
    Some(html[content_from..close_at].to_string())
}

/// Inner text of the first element whose id/class attribute mentions
/// `marker`. Best-effort: reads to the next closing tag of the same name.
fn find_marked_region(html: &str, marker: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let id_needle = format!("id=\"{marker}\"");
    let class_needle = format!("class=\"{marker}\"");

    let attr_at = lower.find(&id_needle).or_else(|| lower.find(&class_needle))?;
    let open_at = lower[..attr_at].rfind('<')?;
    let tag_name: String = lower[open_at + 1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if tag_name.is_empty() {
        return None;
    }

    let content_from = open_at + lower[open_at..].find('>')? + 1;
    let close = format!("</{tag_name}>");
    let close_at = content_from + lower[content_from..].find(&close)?;
    Some(html[content_from..close_at].to_string())
}

/// Drop `<tag>...</tag>` blocks wholesale, including their contents.
fn remove_enclosed(html: &str, tag: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    loop {
        let lower = rest.to_lowercase();
        match lower.find(&open) {
            Some(open_at) => {
                out.push_str(&rest[..open_at]);
                match lower[open_at..].find(&close) {
                    Some(offset) => {
                        rest = &rest[open_at + offset + close.len()..];
                    }
                    None => return out,
                }
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cap(text: &str) -> String {
    text.chars().take(MAX_CONTENT_CHARS).collect()
}
