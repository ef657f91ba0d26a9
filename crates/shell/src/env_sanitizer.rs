// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the environment for every child process (shells, tunnels, git)
//! from the parent environment and the parsed `.env` file (§4.1, C1).

use std::collections::HashMap;

const DROPPED_PREFIXES: &[&str] = &["npm_", "VITE_"];
const DROPPED_NAMES: &[&str] = &["NODE_ENV", "NODE", "_BUN_WATCHER_CHILD"];

/// Returns the platform's `PATH`-like variable name (`Path` on Windows).
pub fn path_var_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "Path"
    } else {
        "PATH"
    }
}

/// Returns the platform's path-list separator (`;` on Windows, `:` elsewhere).
pub fn path_separator() -> char {
    if cfg!(target_os = "windows") {
        ';'
    } else {
        ':'
    }
}

fn is_dropped_key(key: &str) -> bool {
    DROPPED_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) || DROPPED_NAMES.contains(&key)
}

/// Strips `node_modules` entries out of a `PATH`-shaped value.
fn strip_node_modules_path(value: &str) -> String {
    let sep = path_separator();
    value
        .split(sep)
        .filter(|entry| !entry.contains("node_modules"))
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

/// Parses a `.env`-format buffer into a flat key/value map. Lines starting
/// with `#` and blank lines are ignored; surrounding single/double quotes
/// on values are stripped.
pub fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim().to_string();
        let mut value = value.trim().to_string();
        if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value = value[1..value.len() - 1].to_string();
        }
        map.insert(key, value);
    }
    map
}

/// Builds a clean child-process environment.
///
/// For each key in `parent_env`: drop keys matching the runtime-pollution
/// list, drop keys whose value is identical to the one recorded in
/// `dotenv` (evidence the parent only has it because it was auto-injected
/// at process start), and keep everything else. Finally strip any
/// `node_modules` entry out of the PATH-shaped variable.
pub fn sanitize_env(
    parent_env: &HashMap<String, String>,
    dotenv: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (key, value) in parent_env {
        if is_dropped_key(key) {
            continue;
        }
        if dotenv.get(key) == Some(value) {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }

    let path_key = path_var_name();
    if let Some(path_value) = out.get(path_key).cloned() {
        out.insert(path_key.to_string(), strip_node_modules_path(&path_value));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn drops_npm_and_vite_prefixed_keys() {
        let parent = env(&[("npm_config_foo", "1"), ("VITE_PORT", "3000"), ("HOME", "/home/demo")]);
        let clean = sanitize_env(&parent, &HashMap::new());
        assert!(!clean.contains_key("npm_config_foo"));
        assert!(!clean.contains_key("VITE_PORT"));
        assert!(clean.contains_key("HOME"));
    }

    #[test]
    fn drops_named_runtime_pollution_keys() {
        let parent = env(&[("NODE_ENV", "development"), ("NODE", "/usr/bin/node"), ("_BUN_WATCHER_CHILD", "1")]);
        let clean = sanitize_env(&parent, &HashMap::new());
        assert!(clean.is_empty());
    }

    #[test]
    fn drops_keys_that_match_the_dotenv_value_exactly() {
        let dotenv = env(&[("API_TOKEN", "secret-123")]);
        let parent = env(&[("API_TOKEN", "secret-123")]);
        let clean = sanitize_env(&parent, &dotenv);
        assert!(!clean.contains_key("API_TOKEN"), ".env-equal value is auto-injected evidence");
    }

    #[test]
    fn keeps_keys_that_diverge_from_dotenv_value() {
        let dotenv = env(&[("API_TOKEN", "secret-123")]);
        let parent = env(&[("API_TOKEN", "overridden-by-user")]);
        let clean = sanitize_env(&parent, &dotenv);
        assert_eq!(clean.get("API_TOKEN"), Some(&"overridden-by-user".to_string()));
    }

    #[test]
    fn strips_node_modules_entries_from_path() {
        let sep = path_separator();
        let path_key = path_var_name();
        let path_value = format!("/usr/bin{sep}/project/node_modules/.bin{sep}/usr/local/bin");
        let parent = env(&[(path_key, path_value.as_str())]);
        let clean = sanitize_env(&parent, &HashMap::new());
        let cleaned_path = clean.get(path_key).unwrap();
        assert!(!cleaned_path.contains("node_modules"));
        assert!(cleaned_path.contains("/usr/bin"));
        assert!(cleaned_path.contains("/usr/local/bin"));
    }

    #[test]
    fn parse_dotenv_strips_quotes_and_ignores_comments() {
        let contents = "# a comment\nFOO=\"bar\"\nBAZ='qux'\n\nPLAIN=value\n";
        let map = parse_dotenv(contents);
        assert_eq!(map.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(map.get("BAZ"), Some(&"qux".to_string()));
        assert_eq!(map.get("PLAIN"), Some(&"value".to_string()));
        assert_eq!(map.len(), 3);
    }
}
