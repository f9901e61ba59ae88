//! Fuzzy resolution of sandbox names.
//!
//! A query is scored against every known sandbox, case-insensitively, using the
//! first rule that applies (lower is better):
//!
//! | score | rule                                    |
//! |-------|-----------------------------------------|
//! | 0     | query equals the full name              |
//! | 10    | name starts with query                  |
//! | 20    | query equals the embedded dirname       |
//! | 30    | dirname starts with query               |
//! | 40    | dirname contains query                  |
//! | 50    | query appears anywhere in the name      |
//!
//! An exact match always wins outright.

use super::naming::dirname_of;
use crate::error::{Result, SandboxError};
use crate::manager::SandboxInfo;

/// Score of an exact, full-name match.
pub const EXACT_MATCH: u8 = 0;

/// Scores how well `query` matches `name`, or `None` when it does not match.
#[must_use]
pub fn score_match(query: &str, name: &str) -> Option<u8> {
    let query = query.to_lowercase();
    let name_lower = name.to_lowercase();

    if query == name_lower {
        return Some(EXACT_MATCH);
    }
    if name_lower.starts_with(&query) {
        return Some(10);
    }

    let dirname = dirname_of(name).to_lowercase();
    if query == dirname {
        Some(20)
    } else if dirname.starts_with(&query) {
        Some(30)
    } else if dirname.contains(&query) {
        Some(40)
    } else if name_lower.contains(&query) {
        Some(50)
    } else {
        None
    }
}

/// Returns the sandboxes matching `query`, best first.
///
/// Ties keep the order of `sandboxes`. If any sandbox matches exactly, only
/// that sandbox is returned.
#[must_use]
pub fn find_matching(query: &str, sandboxes: &[SandboxInfo]) -> Vec<SandboxInfo> {
    let mut scored: Vec<(u8, &SandboxInfo)> = sandboxes
        .iter()
        .filter_map(|sandbox| score_match(query, &sandbox.name).map(|score| (score, sandbox)))
        .collect();

    // Stable sort keeps input order among equal scores
    scored.sort_by_key(|(score, _)| *score);

    match scored.first() {
        Some((EXACT_MATCH, exact)) => vec![(*exact).clone()],
        _ => scored.into_iter().map(|(_, s)| s.clone()).collect(),
    }
}

/// Resolves `query` to exactly one sandbox.
///
/// # Errors
///
/// Returns `SandboxError::NotFound` when nothing matches and
/// `SandboxError::AmbiguousMatch` when several sandboxes match and none exactly.
pub fn resolve_unique(query: &str, sandboxes: &[SandboxInfo]) -> Result<SandboxInfo> {
    let mut matches = find_matching(query, sandboxes);
    match matches.len() {
        0 => Err(SandboxError::not_found_name(query)),
        1 => Ok(matches.remove(0)),
        _ => Err(SandboxError::AmbiguousMatch {
            query: query.to_string(),
            candidates: matches,
        }),
    }
}
