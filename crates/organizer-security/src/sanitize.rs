//! Config and HTML sanitization
//!
//! Every sanitizer here runs to a fixed point, so feeding its output back
//! in returns the same value.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

static DANGEROUS_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "iframe", "object", "embed"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<\s*{tag}\b[^>]*>.*?<\s*/\s*{tag}\s*>")).expect("static regex")
        })
        .collect()
});

static DANGEROUS_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(script|style|iframe|object|embed)\b[^>]*>").expect("static regex")
});

static PROTOCOL_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(javascript|vbscript|livescript)\s*:|data\s*:\s*text/html").expect("static regex")
});

static EVENT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<[^>]*?)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("static regex")
});

static EVENT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^on[a-z]+$").expect("static regex"));

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)([^<>]*)>").expect("static regex")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z][a-zA-Z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("static regex")
});

pub const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "img", "li", "ol", "p", "pre", "span", "strong", "table", "tbody", "td", "th", "thead",
    "tr", "u", "ul",
];

const GLOBAL_ATTRIBUTES: &[&str] = &["title", "class"];

const MAX_HTML_PASSES: usize = 16;

fn allowed_attribute(tag: &str, attribute: &str) -> bool {
    if GLOBAL_ATTRIBUTES.contains(&attribute) {
        return true;
    }
    matches!(
        (tag, attribute),
        ("a", "href") | ("a", "target") | ("img", "src") | ("img", "alt")
    )
}

/// Links inside sanitized HTML may only be web, mail, or document-relative.
fn is_safe_link(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    if lowered.starts_with("http://")
        || lowered.starts_with("https://")
        || lowered.starts_with("mailto:")
    {
        return true;
    }
    !lowered.contains(':')
}

/// Strip script blocks, protocol handlers and inline event attributes.
pub fn sanitize_text(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = strip_once(&current);
        // Each pass only removes characters, so the loop is bounded by length.
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(input: &str) -> String {
    let mut out = input.to_string();
    for block in DANGEROUS_BLOCKS.iter() {
        out = block.replace_all(&out, "").into_owned();
    }
    out = DANGEROUS_TAG.replace_all(&out, "").into_owned();
    out = PROTOCOL_HANDLER.replace_all(&out, "").into_owned();
    out = EVENT_ATTRIBUTE.replace_all(&out, "$1").into_owned();
    out
}

/// Sanitize HTML against the fixed tag and attribute allow-list.
pub fn sanitize_html(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_HTML_PASSES {
        let next = canonicalize_tags(&sanitize_text(&current));
        if next == current {
            return current;
        }
        current = next;
    }

    // Inputs that keep re-forming markup lose their angle brackets.
    let flattened: String = current.chars().filter(|c| *c != '<' && *c != '>').collect();
    sanitize_text(&flattened)
}

fn canonicalize_tags(input: &str) -> String {
    TAG.replace_all(input, |caps: &Captures| {
        let closing = !caps[1].is_empty();
        let tag = caps[2].to_lowercase();
        if !ALLOWED_TAGS.contains(&tag.as_str()) {
            return String::new();
        }
        if closing {
            return format!("</{}>", tag);
        }

        let mut rebuilt = format!("<{}", tag);
        for attr in ATTRIBUTE.captures_iter(&caps[3]) {
            let name = attr[1].to_lowercase();
            if !allowed_attribute(&tag, &name) {
                continue;
            }
            let raw = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value: String = raw.chars().filter(|c| !matches!(c, '"' | '<' | '>')).collect();
            if (name == "href" || name == "src") && !is_safe_link(&value) {
                continue;
            }
            rebuilt.push_str(&format!(" {}=\"{}\"", name, value));
        }
        rebuilt.push('>');
        rebuilt
    })
    .into_owned()
}

/// Recursively sanitize a config value, preserving its structure.
///
/// Keys shaped like inline event handlers (`onclick`, `onLoad`, ...) are
/// dropped. Every string goes through `text`.
pub fn sanitize_value(value: &Value, text: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(text(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize_value(v, text)).collect()),
        Value::Object(map) => {
            let mut clean = Map::with_capacity(map.len());
            for (key, child) in map {
                if EVENT_KEY.is_match(key) {
                    continue;
                }
                clean.insert(key.clone(), sanitize_value(child, text));
            }
            Value::Object(clean)
        }
        other => other.clone(),
    }
}

/// Sanitize a config with the plain-text rules applied to every string.
pub fn sanitize_config(value: &Value) -> Value {
    sanitize_value(value, &sanitize_text)
}
