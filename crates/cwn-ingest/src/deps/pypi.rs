// SPDX-License-Identifier: MIT OR Apache-2.0

//! requirements.txt parsing.
//!
//! The version kept is the first specifier's, operators stripped:
//! `requests>=2.0,<3` pins `2.0`, `requests==2.*` pins `2`, a bare
//! `requests` pins the empty string.

use super::{added_lines, Dependency, ECOSYSTEM_PYPI};
use regex::Regex;
use std::sync::OnceLock;

fn requirement_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(?:(?:===|==|>=|<=|~=|!=|>|<)\s*([A-Za-z0-9._*+!-]+))?",
        )
        .expect("requirement pattern compiles")
    })
}

/// Parse a complete requirements.txt.
#[must_use]
pub fn parse_requirements(path: &str, contents: &str) -> Vec<Dependency> {
    contents
        .lines()
        .filter_map(|line| parse_requirement(path, line))
        .collect()
}

/// Parse the added lines of a requirements.txt patch.
#[must_use]
pub fn parse_patch(path: &str, patch: &str) -> Vec<Dependency> {
    added_lines(patch)
        .into_iter()
        .filter_map(|line| parse_requirement(path, line))
        .collect()
}

/// Parse one requirement line, or `None` for comments, options, and
/// URL requirements.
fn parse_requirement(path: &str, line: &str) -> Option<Dependency> {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with('-')
        || trimmed.contains("://")
    {
        return None;
    }

    let captures = requirement_pattern().captures(trimmed)?;
    let name = captures.get(1)?.as_str();
    let version = captures
        .get(2)
        .map(|m| m.as_str().trim_end_matches(".*").to_owned())
        .unwrap_or_default();

    Some(Dependency::new(ECOSYSTEM_PYPI, name, version, path))
}
