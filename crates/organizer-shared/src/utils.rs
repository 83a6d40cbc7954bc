//! Utility functions

use uuid::Uuid;

use crate::constants::OFFLINE_ACTIONS_KEY_PREFIX;

/// Local storage key holding the offline queue of one identity.
pub fn offline_actions_key(identity: &Uuid) -> String {
    format!("{}{}", OFFLINE_ACTIONS_KEY_PREFIX, identity)
}

/// Shorten free text before it goes into a log line.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
