//! Plain-text rendering for `sb list`.

use chrono::DateTime;

use crate::manager::{SandboxInfo, SandboxStatus};

const STATUS_WIDTH: usize = 8;

/// Formats a runtime timestamp as `YYYY-MM-DD HH:MM`.
///
/// Falls back to the first 16 characters of the raw value when it is not
/// RFC 3339.
#[must_use]
pub fn format_created_at(created_at: &str) -> String {
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(timestamp) => timestamp.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => created_at.chars().take(16).collect(),
    }
}

/// Renders sandboxes as an aligned table with a header and separator line.
#[must_use]
pub fn render_table(rows: &[(SandboxInfo, SandboxStatus)]) -> String {
    let name_width = rows
        .iter()
        .map(|(s, _)| s.name.len())
        .chain(["Name".len()])
        .max()
        .unwrap_or_default();
    let workspace_width = rows
        .iter()
        .map(|(s, _)| s.workspace.len())
        .chain(["Workspace".len()])
        .max()
        .unwrap_or_default();

    let header = format!(
        "{:<name_width$}  {:<workspace_width$}  {:<STATUS_WIDTH$}  Created",
        "Name", "Workspace", "Status"
    );
    let mut lines = vec![header.clone(), "-".repeat(header.len())];
    for (sandbox, status) in rows {
        lines.push(format!(
            "{:<name_width$}  {:<workspace_width$}  {:<STATUS_WIDTH$}  {}",
            sandbox.name,
            sandbox.workspace,
            status.to_string(),
            format_created_at(&sandbox.created_at),
        ));
    }
    lines.join("\n")
}
