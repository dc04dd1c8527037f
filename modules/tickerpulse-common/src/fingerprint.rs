//! Stable record identity and entity file naming.

use std::sync::LazyLock;

use chrono::SecondsFormat;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::types::RawPost;

static RE_NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Joins canonical fields so that no field boundary can be forged by content.
const FIELD_SEP: &str = "\u{1f}";

/// Derive the dedup key for a fetched post.
///
/// The platform id is reused when present (Reddit `t3_` fullname prefixes are
/// stripped so both spellings agree). Without one, the key is `h_` followed by
/// the hex SHA-256 of entity, timestamp, title and body. Returns `None` only when
/// there is neither a platform id nor a timestamp to hash.
pub fn fingerprint(entity: &str, post: &RawPost) -> Option<String> {
    if let Some(id) = post.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let bare = id.strip_prefix("t3_").unwrap_or(id);
        if !bare.is_empty() {
            return Some(bare.to_string());
        }
    }

    let created_at = post.created_at?;
    let canonical = [
        entity.trim(),
        &created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        post.title.trim(),
        post.body.trim(),
    ]
    .join(FIELD_SEP);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Some(format!("h_{}", hex::encode(hasher.finalize())))
}

/// Filesystem-safe name for an entity: lowercase, runs of anything else
/// collapsed to `_`. "Apple Inc." -> "apple_inc".
pub fn entity_slug(entity: &str) -> String {
    let lower = entity.trim().to_lowercase();
    RE_NON_SLUG
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}
