//! Content hashing for change detection.
//!
//! A refresh re-reads every cached record from the remote store; hashing the
//! payload lets it tell an unchanged record from a changed one without
//! comparing JSON trees field by field.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a SHA256 hash of a JSON payload.
///
/// `serde_json` keeps object keys sorted (no `preserve_order` feature), so
/// equal values always serialize to the same bytes.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if a payload differs from a previously stored hash.
///
/// Returns `true` if there is no stored hash or the hashes differ.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_deterministic() {
        let a = json!({"key": "engine", "checked_at_entry": true});
        let b = json!({"checked_at_entry": true, "key": "engine"});

        assert_eq!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a).len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = json!({"key": "engine", "checked_at_entry": true});
        let b = json!({"key": "engine", "checked_at_entry": false});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
