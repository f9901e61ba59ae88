//! Deterministic sandbox identities.
//!
//! A sandbox identity has the form `sb-{dirname}-{hash}`:
//!
//! - `dirname` is the sanitized base name of the workspace directory
//! - `hash` is the first 8 hex characters of the SHA-256 of the absolute
//!   workspace path
//!
//! The same absolute path always yields the same identity, while two
//! directories that share a base name get different hashes.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::paths;

/// Prefix shared by every generated identity.
pub const NAME_PREFIX: &str = "sb-";

/// Number of hex characters of the path digest kept in an identity.
pub const HASH_LEN: usize = 8;

/// Fallback used when a directory name sanitizes to nothing.
const FALLBACK_DIRNAME: &str = "sandbox";

/// Sanitizes a directory name for use inside an identity.
///
/// Lower-cases, turns spaces into hyphens, drops everything outside
/// `[a-z0-9-_]`, collapses hyphen runs and trims hyphens at both ends.
#[must_use]
pub fn sanitize_dirname(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        let ch = if ch == ' ' { '-' } else { ch };
        let allowed = ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_';
        if !allowed || (ch == '-' && out.ends_with('-')) {
            continue;
        }
        out.push(ch);
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_DIRNAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Generates the identity for a workspace path.
///
/// A leading `~` is expanded against `home` and the path is made absolute
/// against the current directory first.
#[must_use]
pub fn generate_name(path: &Path, home: &Path) -> String {
    generate_name_for_absolute(&paths::absolutize(path, home))
}

/// Generates the identity for an already absolute, normalized path.
#[must_use]
pub fn generate_name_for_absolute(abs_path: &Path) -> String {
    let dirname = abs_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let digest = Sha256::digest(abs_path.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");

    format!(
        "{NAME_PREFIX}{}-{}",
        sanitize_dirname(&dirname),
        &hex[..HASH_LEN]
    )
}

/// Extracts the dirname portion of an identity.
///
/// Returns the whole name when it does not follow the `sb-{dirname}-{hash}`
/// convention, e.g. for sandboxes created with an explicit `--name`.
#[must_use]
pub fn dirname_of(name: &str) -> &str {
    parse_name(name).map_or(name, |(dirname, _)| dirname)
}

/// Splits an identity into its `(dirname, hash)` parts.
#[must_use]
pub fn parse_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(NAME_PREFIX)?;
    let (dirname, hash) = rest.rsplit_once('-')?;

    let hash_ok = hash.len() == HASH_LEN
        && hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));

    if dirname.is_empty() || !hash_ok {
        return None;
    }
    Some((dirname, hash))
}
