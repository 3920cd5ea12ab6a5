// SPDX-License-Identifier: MIT OR Apache-2.0

//! package-lock.json parsing.
//!
//! The full-file parser walks the v2/v3 `packages` map (with a v1
//! `dependencies` fallback). The patch parser reassembles a document
//! fragment from `+` lines and extracts name/version pairs by pattern —
//! a heuristic that can misparse exotic lock files, kept deliberately
//! simple.

use super::{added_lines, Dependency, ECOSYSTEM_NPM};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Parse a complete package-lock.json.
#[must_use]
pub fn parse_lockfile(path: &str, contents: &str) -> Vec<Dependency> {
    let Ok(doc) = serde_json::from_str::<serde_json::Value>(contents) else {
        return Vec::new();
    };
    let mut deps = Vec::new();

    if let Some(packages) = doc.get("packages").and_then(|v| v.as_object()) {
        for (pkg_path, info) in packages {
            // The empty key is the root project itself.
            if pkg_path.is_empty() {
                continue;
            }
            let name = package_name(pkg_path);
            let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
                continue;
            };
            let mut dep = Dependency::new(ECOSYSTEM_NPM, name, version, path);
            if let Some(integrity) = info.get("integrity").and_then(|v| v.as_str()) {
                dep.hashes = parse_integrity(integrity);
            }
            deps.push(dep);
        }
        return deps;
    }

    // Lockfile v1.
    if let Some(dependencies) = doc.get("dependencies").and_then(|v| v.as_object()) {
        for (name, info) in dependencies {
            let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
                continue;
            };
            let mut dep = Dependency::new(ECOSYSTEM_NPM, name.as_str(), version, path);
            if let Some(integrity) = info.get("integrity").and_then(|v| v.as_str()) {
                dep.hashes = parse_integrity(integrity);
            }
            deps.push(dep);
        }
    }

    deps
}

/// Parse the added lines of a package-lock.json patch.
#[must_use]
pub fn parse_patch(path: &str, patch: &str) -> Vec<Dependency> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?s)"([^"\n]+)"\s*:\s*\{[^{}]*?"version"\s*:\s*"([^"\n]+)"(?:[^{}]*?"integrity"\s*:\s*"([^"\n]+)")?"#,
        )
        .expect("npm patch pattern compiles")
    });

    let blob = added_lines(patch).join("\n");
    let mut deps = Vec::new();
    for captures in re.captures_iter(&blob) {
        let raw_name = &captures[1];
        if raw_name.is_empty() || raw_name == "dependencies" || raw_name == "packages" {
            continue;
        }
        let mut dep = Dependency::new(
            ECOSYSTEM_NPM,
            package_name(raw_name),
            &captures[2],
            path,
        );
        if let Some(integrity) = captures.get(3) {
            dep.hashes = parse_integrity(integrity.as_str());
        }
        deps.push(dep);
    }
    deps
}

/// Strip the `node_modules/` prefix chain from a packages-map key.
fn package_name(pkg_path: &str) -> &str {
    pkg_path
        .rsplit_once("node_modules/")
        .map_or(pkg_path, |(_, name)| name)
}

/// `sha512-AAA… sha1-BBB…` → algorithm-keyed digests.
fn parse_integrity(integrity: &str) -> BTreeMap<String, String> {
    integrity
        .split_whitespace()
        .filter_map(|entry| entry.split_once('-'))
        .map(|(alg, digest)| (alg.to_owned(), digest.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v3_packages_map() {
        let lock = r#"{
            "name": "app",
            "lockfileVersion": 3,
            "packages": {
                "": {"name": "app", "version": "0.0.1"},
                "node_modules/left-pad": {
                    "version": "1.3.0",
                    "integrity": "sha512-abc123"
                },
                "node_modules/@scope/pkg/node_modules/inner": {
                    "version": "2.0.0"
                }
            }
        }"#;
        let deps = parse_lockfile("package-lock.json", lock);
        assert_eq!(deps.len(), 2);
        // serde_json maps iterate in key order, so the scoped path sorts
        // first.
        assert_eq!(deps[0].name, "inner");
        assert_eq!(deps[1].name, "left-pad");
        assert_eq!(deps[1].version, "1.3.0");
        assert_eq!(deps[1].hashes["sha512"], "abc123");
    }

    #[test]
    fn parses_v1_dependencies_map() {
        let lock = r#"{
            "dependencies": {
                "left-pad": {"version": "1.3.0", "integrity": "sha1-xyz"}
            }
        }"#;
        let deps = parse_lockfile("package-lock.json", lock);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].hashes["sha1"], "xyz");
    }

    #[test]
    fn patch_heuristic_extracts_added_packages() {
        let patch = concat!(
            "@@ -10,6 +10,11 @@\n",
            "     },\n",
            "+    \"node_modules/is-even\": {\n",
            "+      \"version\": \"1.0.0\",\n",
            "+      \"integrity\": \"sha512-deadbeef\"\n",
            "+    },\n",
            "     \"node_modules/left-pad\": {\n",
        );
        let deps = parse_patch("package-lock.json", patch);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "is-even");
        assert_eq!(deps[0].version, "1.0.0");
        assert_eq!(deps[0].hashes["sha512"], "deadbeef");
    }

    #[test]
    fn invalid_json_yields_nothing() {
        assert!(parse_lockfile("package-lock.json", "not json").is_empty());
    }
}
