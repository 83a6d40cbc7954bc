//! Malicious-pattern detection
//!
//! Findings come in two strengths. `Definite` findings are injection
//! shapes with no legitimate use in a menu (script tags, protocol handlers,
//! SQL statement sequences) and become hard validation errors. `Suspicious`
//! findings only produce warnings so ordinary text is never locked out.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingStrength {
    Definite,
    Suspicious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    ScriptTag,
    ProtocolHandler,
    EventHandler,
    SqlInjection,
    SuspiciousKeyword,
    SpecialCharacters,
}

impl PatternCategory {
    /// Categories the sanitizer is able to strip out of config values.
    pub fn is_sanitizable(&self) -> bool {
        matches!(self, Self::ScriptTag | Self::ProtocolHandler | Self::EventHandler)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub strength: FindingStrength,
    pub category: PatternCategory,
    pub message: String,
}

static SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(script|iframe|object|embed|style)\b").expect("static regex")
});

static PROTOCOL_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(javascript|vbscript|livescript)\s*:|data\s*:\s*text/html").expect("static regex")
});

static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<[^>]*\son[a-z]+\s*=").expect("static regex")
});

static SQL_INJECTION: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bunion\s+(all\s+)?select\b",
        r"(?i)\bdrop\s+(table|database|schema)\b",
        r"(?i)\btruncate\s+table\b",
        r"(?i)\bdelete\s+from\b",
        r"(?i)\binsert\s+into\b",
        r"(?i)\bexec(ute)?\s+(xp_|sp_)",
        r"(?i)'\s*or\s+'?\d+'?\s*=\s*'?\d+",
        r"(?i)'\s*;\s*--",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "eval(",
    "document.cookie",
    "document.write",
    "window.location",
    "innerhtml",
    "fromcharcode",
    "expression(",
    "<!--",
    ";base64,",
];

/// Share of non-alphanumeric, non-whitespace characters above which text
/// is flagged.
const SPECIAL_CHAR_DENSITY: f64 = 0.3;
const DENSITY_MIN_LENGTH: usize = 12;

/// Scan text for injection shapes.
pub fn scan(text: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    if SCRIPT_TAG.is_match(text) {
        findings.push(definite(PatternCategory::ScriptTag, "script-capable tag"));
    }
    if PROTOCOL_HANDLER.is_match(text) {
        findings.push(definite(PatternCategory::ProtocolHandler, "script protocol handler"));
    }
    if EVENT_HANDLER.is_match(text) {
        findings.push(definite(PatternCategory::EventHandler, "inline event handler"));
    }
    if SQL_INJECTION.iter().any(|re| re.is_match(text)) {
        findings.push(definite(PatternCategory::SqlInjection, "SQL statement sequence"));
    }

    let lowered = text.to_lowercase();
    if let Some(keyword) = SUSPICIOUS_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
        findings.push(Finding {
            strength: FindingStrength::Suspicious,
            category: PatternCategory::SuspiciousKeyword,
            message: format!("suspicious keyword '{}'", keyword),
        });
    }

    findings
}

/// Flag text made mostly of punctuation and symbols.
pub fn special_character_density(text: &str) -> Option<Finding> {
    let total = text.chars().count();
    if total < DENSITY_MIN_LENGTH {
        return None;
    }
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    let density = special as f64 / total as f64;
    if density > SPECIAL_CHAR_DENSITY {
        Some(Finding {
            strength: FindingStrength::Suspicious,
            category: PatternCategory::SpecialCharacters,
            message: format!("{:.0}% special characters", density * 100.0),
        })
    } else {
        None
    }
}

fn definite(category: PatternCategory, label: &str) -> Finding {
    Finding {
        strength: FindingStrength::Definite,
        category,
        message: format!("contains {}", label),
    }
}
