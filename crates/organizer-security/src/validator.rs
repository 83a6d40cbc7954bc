// ============================================================================
// Organizer Security - Content Validator
// File: crates/organizer-security/src/validator.rs
// Description: Structural and safety validation of menu mutation payloads
// ============================================================================

use once_cell::sync::Lazy;
use organizer_shared::constants::{MAX_CONFIG_BYTES, MAX_MENU_NAME_LENGTH};
use organizer_shared::MenuType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::links::{check_link, collect_links, LinkVerdict};
use crate::patterns::{scan, special_character_density, FindingStrength, PatternCategory};
use crate::sanitize::{sanitize_config, sanitize_html};

static NAME_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[\p{L}\p{M}\p{N} _\-.,:;!?'"()&/#+@]+$"#).expect("static regex")
});

/// Share of custom-page content that may be removed before a warning.
const HEAVY_SANITIZATION_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Required,
    TooLong,
    InvalidCharacters,
    Duplicate,
    TooLarge,
    MaliciousPattern,
    SuspiciousContent,
    InvalidUrl,
    DisallowedScheme,
    BlockedDomain,
    UrlShortener,
    MissingUrl,
    OutOfRange,
    ContentSanitized,
    HeavySanitization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedContent {
    pub name: String,
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub sanitized: SanitizedContent,
}

impl ValidationReport {
    pub fn has_malicious_content(&self) -> bool {
        self.errors.iter().any(|e| e.code == IssueCode::MaliciousPattern)
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_name_length: usize,
    pub max_config_bytes: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_name_length: MAX_MENU_NAME_LENGTH,
            max_config_bytes: MAX_CONFIG_BYTES,
        }
    }
}

/// Pure validator: the result depends only on its arguments.
#[derive(Debug, Clone, Default)]
pub struct ContentValidator {
    config: ValidatorConfig,
}

impl ContentValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        name: &str,
        menu_type: MenuType,
        config: &Value,
        existing_names: &[String],
    ) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let name = name.trim().to_string();
        self.check_name(&name, existing_names, &mut errors, &mut warnings);

        let sanitized_config = self.check_config(menu_type, config, &mut errors, &mut warnings);

        debug!(
            menu_type = %menu_type,
            errors = errors.len(),
            warnings = warnings.len(),
            "Content validated"
        );

        ValidationReport {
            ok: errors.is_empty(),
            errors,
            warnings,
            sanitized: SanitizedContent {
                name,
                config: sanitized_config,
            },
        }
    }

    fn check_name(
        &self,
        name: &str,
        existing_names: &[String],
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        if name.is_empty() {
            errors.push(ValidationIssue::new("name", IssueCode::Required, "Menu name is required"));
            return;
        }

        let length = name.chars().count();
        if length > self.config.max_name_length {
            errors.push(ValidationIssue::new(
                "name",
                IssueCode::TooLong,
                format!(
                    "Menu name must be at most {} characters (got {})",
                    self.config.max_name_length, length
                ),
            ));
        }

        if !NAME_CHARSET.is_match(name) {
            errors.push(ValidationIssue::new(
                "name",
                IssueCode::InvalidCharacters,
                "Menu name contains characters that are not allowed",
            ));
        }

        if existing_names.iter().any(|existing| existing.trim() == name) {
            errors.push(ValidationIssue::new(
                "name",
                IssueCode::Duplicate,
                format!("A menu named '{}' already exists", name),
            ));
        }

        for finding in scan(name) {
            match finding.strength {
                FindingStrength::Definite => errors.push(ValidationIssue::new(
                    "name",
                    IssueCode::MaliciousPattern,
                    finding.message,
                )),
                FindingStrength::Suspicious => warnings.push(ValidationIssue::new(
                    "name",
                    IssueCode::SuspiciousContent,
                    finding.message,
                )),
            }
        }
        if let Some(finding) = special_character_density(name) {
            warnings.push(ValidationIssue::new("name", IssueCode::SuspiciousContent, finding.message));
        }
    }

    fn check_config(
        &self,
        menu_type: MenuType,
        config: &Value,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) -> Value {
        let size = serde_json::to_vec(config).map(|v| v.len()).unwrap_or(usize::MAX);
        if size > self.config.max_config_bytes {
            errors.push(ValidationIssue::new(
                "config",
                IssueCode::TooLarge,
                format!(
                    "Config is {} bytes, limit is {} bytes",
                    size, self.config.max_config_bytes
                ),
            ));
        }

        let mut strings = Vec::new();
        collect_strings(config, "config", &mut strings);
        for (path, text) in &strings {
            for finding in scan(text) {
                match (finding.strength, finding.category) {
                    (FindingStrength::Definite, PatternCategory::SqlInjection) => errors.push(
                        ValidationIssue::new(path.clone(), IssueCode::MaliciousPattern, finding.message),
                    ),
                    (FindingStrength::Definite, category) if category.is_sanitizable() => {
                        warnings.push(ValidationIssue::new(
                            path.clone(),
                            IssueCode::ContentSanitized,
                            format!("removed unsafe content ({})", finding.message),
                        ))
                    }
                    _ => warnings.push(ValidationIssue::new(
                        path.clone(),
                        IssueCode::SuspiciousContent,
                        finding.message,
                    )),
                }
            }
        }

        match menu_type {
            MenuType::ExternalLink => {
                check_external_links(config, errors, warnings);
                sanitize_config(config)
            }
            MenuType::CustomPage => sanitize_custom_page(config, warnings),
            _ => sanitize_config(config),
        }
    }
}

fn collect_strings(value: &Value, path: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => out.push((path.to_string(), s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_strings(item, &format!("{}[{}]", path, i), out);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                collect_strings(child, &format!("{}.{}", path, key), out);
            }
        }
        _ => {}
    }
}

fn check_external_links(
    config: &Value,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let links = collect_links(config);
    if links.is_empty() {
        errors.push(ValidationIssue::new(
            "config",
            IssueCode::MissingUrl,
            "External link menus need at least one URL",
        ));
        return;
    }

    for (path, url) in links {
        match check_link(&url) {
            LinkVerdict::Ok => {}
            LinkVerdict::Invalid(reason) => errors.push(ValidationIssue::new(
                path,
                IssueCode::InvalidUrl,
                format!("'{}' is not a valid URL: {}", url, reason),
            )),
            LinkVerdict::DisallowedScheme(scheme) => errors.push(ValidationIssue::new(
                path,
                IssueCode::DisallowedScheme,
                format!("URL scheme '{}' is not allowed", scheme),
            )),
            LinkVerdict::Blocked(domain) => errors.push(ValidationIssue::new(
                path,
                IssueCode::BlockedDomain,
                format!("Links to {} are blocked", domain),
            )),
            LinkVerdict::Shortener(domain) => warnings.push(ValidationIssue::new(
                path,
                IssueCode::UrlShortener,
                format!("{} hides the real destination", domain),
            )),
        }
    }
}

/// Custom pages keep their HTML `content` under the allow-list; every other
/// string gets the plain-text rules.
fn sanitize_custom_page(config: &Value, warnings: &mut Vec<ValidationIssue>) -> Value {
    let mut sanitized = sanitize_config(config);

    let original = config.get("content").and_then(Value::as_str);
    if let (Some(original), Some(slot)) = (original, sanitized.get_mut("content")) {
        let cleaned = sanitize_html(original);
        let before = original.chars().count();
        let after = cleaned.chars().count();
        if before > 0 {
            let removed = before.saturating_sub(after) as f64 / before as f64;
            if removed > HEAVY_SANITIZATION_RATIO {
                warnings.push(ValidationIssue::new(
                    "config.content",
                    IssueCode::HeavySanitization,
                    format!("Sanitization removed {:.0}% of the page content", removed * 100.0),
                ));
            }
        }
        *slot = Value::String(cleaned);
    }
    sanitized
}
