// src/privacy.rs
//! Helpers that keep patient text out of logs and identifiers.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Short stable id for a piece of text: first 6 bytes of SHA-256 as hex.
/// Logs carry this id, never the text itself.
pub fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Prefix of at most `max` chars, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
