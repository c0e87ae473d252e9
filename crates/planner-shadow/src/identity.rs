//! Deterministic identities and lineage labels for shadow objects
//!
//! A shadow's name is a pure function of (primary name, branch, change-id):
//! `"{primary}-{branch}-{change_id}"` whenever that string is already a valid
//! DNS label. Branches such as `Feature/X` or very long names cannot be used
//! as-is; for those the readable part is sanitised and truncated and a digest
//! of the raw tuple is appended, so lossy inputs never share a name.

use aws_lc_rs::digest::{digest, SHA256};

use planner_common::{
    LabelSet, LABEL_KEY, LABEL_PRIMARY_RESOURCE_KEY, LABEL_PR_ID_KEY, LABEL_VALUE,
};

/// Longest name the planner will produce (DNS label limit)
pub const MAX_NAME_LEN: usize = 63;

/// Hex characters of the tuple digest appended to lossy names
const DIGEST_LEN: usize = 10;

/// Derive the name of a shadow object
pub fn derive_name(primary: &str, branch: &str, change_id: &str) -> String {
    let raw = format!("{primary}-{branch}-{change_id}");
    let sanitized = sanitize(&raw);
    if sanitized == raw && raw.len() <= MAX_NAME_LEN {
        return raw;
    }

    let digest = tuple_digest(primary, branch, change_id);
    let budget = MAX_NAME_LEN - DIGEST_LEN - 1;
    let prefix: String = sanitized.chars().take(budget).collect();
    let prefix = prefix.trim_end_matches('-');
    if prefix.is_empty() {
        digest
    } else {
        format!("{prefix}-{digest}")
    }
}

/// Derive the label set of a shadow object
///
/// Returns `existing` plus the marker, primary-reference and change-id labels.
/// The lineage labels win on key collision; `existing` is not modified.
pub fn derive_labels(existing: &LabelSet, primary: &str, change_id: &str) -> LabelSet {
    let mut labels = existing.clone();
    labels.insert(LABEL_KEY.to_string(), LABEL_VALUE.to_string());
    labels.insert(LABEL_PRIMARY_RESOURCE_KEY.to_string(), primary.to_string());
    labels.insert(LABEL_PR_ID_KEY.to_string(), change_id.to_string());
    labels
}

/// Label selector matching shadows, optionally narrowed by primary and change-id
pub fn shadow_selector(primary: Option<&str>, change_id: Option<&str>) -> LabelSet {
    let mut labels = LabelSet::new();
    labels.insert(LABEL_KEY.to_string(), LABEL_VALUE.to_string());
    if let Some(primary) = primary {
        labels.insert(LABEL_PRIMARY_RESOURCE_KEY.to_string(), primary.to_string());
    }
    if let Some(change_id) = change_id {
        labels.insert(LABEL_PR_ID_KEY.to_string(), change_id.to_string());
    }
    labels
}

/// Whether a label set carries the shadow marker
pub fn is_shadow(labels: &LabelSet) -> bool {
    labels.get(LABEL_KEY).map(String::as_str) == Some(LABEL_VALUE)
}

/// Check that `value` is usable as a Kubernetes label value
pub fn is_valid_label_value(value: &str) -> bool {
    if value.len() > MAX_NAME_LEN {
        return false;
    }
    if value.is_empty() {
        return true;
    }
    let bytes = value.as_bytes();
    let alnum = |b: &u8| b.is_ascii_alphanumeric();
    alnum(&bytes[0])
        && alnum(&bytes[bytes.len() - 1])
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(*b, b'-' | b'_' | b'.'))
}

/// Lowercase, map anything outside `[a-z0-9-]` to '-', trim leading/trailing '-'
fn sanitize(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_string()
}

/// Digest of the length-prefixed tuple; no two distinct tuples encode the same
fn tuple_digest(primary: &str, branch: &str, change_id: &str) -> String {
    let encoded = format!(
        "{}:{}{}:{}{}:{}",
        primary.len(),
        primary,
        branch.len(),
        branch,
        change_id.len(),
        change_id
    );
    let hash = digest(&SHA256, encoded.as_bytes());
    hash.as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
        .chars()
        .take(DIGEST_LEN)
        .collect()
}
