//! # Organizer Security
//! 
//! Content validation for menu mutations (name rules, config sanitization,
//! malicious-pattern detection, link checks) and identity tokens.

pub mod jwt;
pub mod patterns;
pub mod sanitize;
pub mod links;
pub mod validator;

pub use jwt::JwtService;
pub use validator::{ContentValidator, IssueCode, SanitizedContent, ValidationIssue, ValidationReport, ValidatorConfig};
