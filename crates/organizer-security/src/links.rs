//! Link checks for external-link menus

use serde_json::Value;
use url::Url;

pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// IP loggers and known phishing relays.
pub const BLOCKED_DOMAINS: &[&str] = &[
    "grabify.link",
    "iplogger.org",
    "iplogger.com",
    "2no.co",
    "blasze.com",
    "ps3cfw.com",
];

pub const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "rebrand.ly",
    "cutt.ly",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkVerdict {
    Ok,
    Shortener(String),
    Invalid(String),
    DisallowedScheme(String),
    Blocked(String),
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

pub fn check_link(raw: &str) -> LinkVerdict {
    let parsed = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(e) => return LinkVerdict::Invalid(e.to_string()),
    };

    let scheme = parsed.scheme();
    if !ALLOWED_SCHEMES.contains(&scheme) {
        return LinkVerdict::DisallowedScheme(scheme.to_string());
    }

    // mailto links carry no host
    let host = match parsed.host_str() {
        Some(h) => h.to_lowercase(),
        None => return LinkVerdict::Ok,
    };

    if let Some(domain) = BLOCKED_DOMAINS.iter().find(|d| domain_matches(&host, d)) {
        return LinkVerdict::Blocked(domain.to_string());
    }
    if let Some(domain) = URL_SHORTENERS.iter().find(|d| domain_matches(&host, d)) {
        return LinkVerdict::Shortener(domain.to_string());
    }
    LinkVerdict::Ok
}

/// Collect `(path, url)` pairs from an external-link config: a top-level
/// `url` and every `links[i].url`.
pub fn collect_links(config: &Value) -> Vec<(String, String)> {
    let mut found = Vec::new();
    if let Some(url) = config.get("url").and_then(Value::as_str) {
        found.push(("config.url".to_string(), url.to_string()));
    }
    if let Some(links) = config.get("links").and_then(Value::as_array) {
        for (i, link) in links.iter().enumerate() {
            let url = match link {
                Value::String(s) => Some(s.as_str()),
                other => other.get("url").and_then(Value::as_str),
            };
            if let Some(url) = url {
                found.push((format!("config.links[{}].url", i), url.to_string()));
            }
        }
    }
    found
}
