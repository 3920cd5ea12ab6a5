// SPDX-License-Identifier: MIT OR Apache-2.0

//! go.mod parsing.
//!
//! Handles single-line `require` directives and `require ( … )` blocks.
//! Versions are normalized by stripping the leading `v`.

use super::{added_lines, Dependency, ECOSYSTEM_GO};

/// Parse a complete go.mod.
#[must_use]
pub fn parse_gomod(path: &str, contents: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut in_require_block = false;

    for raw in contents.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if in_require_block {
            if line == ")" {
                in_require_block = false;
            } else if let Some(dep) = parse_module_line(path, line) {
                deps.push(dep);
            }
            continue;
        }

        if line == "require (" {
            in_require_block = true;
        } else if let Some(rest) = line.strip_prefix("require ") {
            if let Some(dep) = parse_module_line(path, rest.trim()) {
                deps.push(dep);
            }
        }
    }

    deps
}

/// Parse the added lines of a go.mod patch.
///
/// Hunks carry no block context, so both `require path vX` and bare
/// `path vX` forms are accepted.
#[must_use]
pub fn parse_patch(path: &str, patch: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for raw in added_lines(patch) {
        let line = strip_comment(raw).trim();
        if line.is_empty() || line == ")" || line == "require (" {
            continue;
        }
        let line = line.strip_prefix("require ").unwrap_or(line).trim();
        if let Some(dep) = parse_module_line(path, line) {
            deps.push(dep);
        }
    }
    deps
}

/// `module/path v1.2.3` → a dependency, or `None` for non-module lines.
fn parse_module_line(path: &str, line: &str) -> Option<Dependency> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let version = parts.next()?;

    // Module paths contain a dot or slash; directives like `go 1.22`
    // don't.
    if !(name.contains('/') || name.contains('.')) {
        return None;
    }
    let version = version.strip_prefix('v')?;
    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    Some(Dependency::new(ECOSYSTEM_GO, name, version, path))
}

fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}
