// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Porcelain output parsers. `git` quotes paths containing special
//! characters in C-style octal/escape notation; every parser here must
//! unescape them before handing paths back to callers (§4.11).

use serde::{Deserialize, Serialize};

/// Unescapes a path as emitted by `git status --porcelain=v1` /
/// `git diff --name-status`, undoing the quoting git applies to paths with
/// non-ASCII or special characters: surrounding double quotes, and
/// backslash escapes for `\n`, `\t`, `\\`, `\"`, and octal byte escapes.
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut out = Vec::new();
    let bytes = inner.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                }
                b't' => {
                    out.push(b'\t');
                    i += 2;
                }
                b'\\' => {
                    out.push(b'\\');
                    i += 2;
                }
                b'"' => {
                    out.push(b'"');
                    i += 2;
                }
                d1 @ b'0'..=b'7' => {
                    // Octal escape: up to 3 digits.
                    let mut value = (d1 - b'0') as u32;
                    let mut consumed = 1;
                    while consumed < 3 && i + 1 + consumed < bytes.len() {
                        let b = bytes[i + 1 + consumed];
                        if (b'0'..=b'7').contains(&b) {
                            value = value * 8 + (b - b'0') as u32;
                            consumed += 1;
                        } else {
                            break;
                        }
                    }
                    out.push(value as u8);
                    i += 1 + consumed;
                }
                other => {
                    out.push(other);
                    i += 2;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// One entry from `git status --porcelain=v1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub index_status: char,
    pub worktree_status: char,
    /// Present for renames (`R `/` R`), the path before the rename.
    pub rename_from: Option<String>,
}

/// Parses `git status --porcelain=v1 -z` output (NUL-separated records;
/// renamed entries emit two NUL-separated path fields).
pub fn parse_status_z(output: &[u8]) -> Vec<FileStatus> {
    let mut entries = Vec::new();
    let records: Vec<&[u8]> = output.split(|&b| b == 0).filter(|r| !r.is_empty()).collect();
    let mut i = 0;
    while i < records.len() {
        let record = records[i];
        if record.len() < 4 {
            i += 1;
            continue;
        }
        let index_status = record[0] as char;
        let worktree_status = record[1] as char;
        let path = String::from_utf8_lossy(&record[3..]).into_owned();
        let is_rename = index_status == 'R' || worktree_status == 'R';
        let rename_from = if is_rename && i + 1 < records.len() {
            i += 1;
            Some(String::from_utf8_lossy(records[i]).into_owned())
        } else {
            None
        };
        entries.push(FileStatus { path, index_status, worktree_status, rename_from });
        i += 1;
    }
    entries
}

/// One commit from `git log`, as parsed from a `\x1f`-delimited format
/// string whose records are terminated by `\0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: String,
    pub subject: String,
    pub body: String,
}

/// The `--pretty=format:` string used to produce parseable log records:
/// fields separated by unit separator (`\x1f`), records by `\0`.
pub const LOG_FORMAT: &str = "%H\x1f%an\x1f%ae\x1f%aI\x1f%s\x1f%b";

pub fn parse_log(output: &str) -> Vec<LogRecord> {
    output
        .split('\0')
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(6, '\u{1f}');
            Some(LogRecord {
                hash: fields.next()?.to_string(),
                author_name: fields.next()?.to_string(),
                author_email: fields.next()?.to_string(),
                timestamp: fields.next()?.to_string(),
                subject: fields.next()?.to_string(),
                body: fields.next().unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Ahead/behind counts from `git rev-list --left-right --count A...B`
/// output: `"<ahead>\t<behind>"`.
pub fn parse_ahead_behind(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.trim().split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

/// Splits a 3-way merge conflict's marker sections: `<<<<<<<`, optional
/// `|||||||` (diff3 base), `=======`, `>>>>>>>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSections {
    pub ours: String,
    pub base: Option<String>,
    pub theirs: String,
}

pub fn parse_conflict_markers(text: &str) -> Option<ConflictSections> {
    let start = text.find("<<<<<<<")?;
    let rest = &text[start..];
    let ours_start = rest.find('\n')? + 1;

    let base_marker = rest.find("\n|||||||");
    let sep_marker = rest.find("\n=======")?;
    let end_marker = rest.find("\n>>>>>>>")?;

    let (ours_end, base) = match base_marker {
        Some(bm) if bm < sep_marker => {
            let base_start = bm + 1 + "|||||||".len();
            let base_start = rest[base_start..].find('\n').map(|i| base_start + i + 1)?;
            (bm + 1, Some(rest[base_start..sep_marker + 1].to_string()))
        }
        _ => (sep_marker + 1, None),
    };

    let ours = rest[ours_start..ours_end].to_string();
    let theirs_start = sep_marker + "\n=======".len() + 1;
    let theirs = rest[theirs_start..end_marker + 1].to_string();

    Some(ConflictSections { ours, base, theirs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_path_handles_simple_escapes() {
        assert_eq!(unquote_path("\"a\\tb.txt\""), "a\tb.txt");
        assert_eq!(unquote_path("\"line\\nbreak\""), "line\nbreak");
        assert_eq!(unquote_path("\"quote\\\"mark\""), "quote\"mark");
    }

    #[test]
    fn unquote_path_handles_octal_escapes() {
        // 0303 0251 is UTF-8 for "é" split across two octal escapes.
        assert_eq!(unquote_path("\"caf\\303\\251.txt\""), "café.txt");
    }

    #[test]
    fn unquote_path_passes_through_unquoted_strings() {
        assert_eq!(unquote_path("plain.txt"), "plain.txt");
    }

    #[test]
    fn parse_status_z_reads_simple_entries() {
        let raw = b" M src/main.rs\0?? new_file.txt\0";
        let entries = parse_status_z(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "src/main.rs");
        assert_eq!(entries[0].worktree_status, 'M');
        assert_eq!(entries[1].index_status, '?');
    }

    #[test]
    fn parse_status_z_consumes_rename_pair() {
        let raw = b"R  new_name.rs\0old_name.rs\0";
        let entries = parse_status_z(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "new_name.rs");
        assert_eq!(entries[0].rename_from.as_deref(), Some("old_name.rs"));
    }

    #[test]
    fn parse_log_splits_fields_and_records() {
        let raw = "abc123\u{1f}Jane\u{1f}jane@example.com\u{1f}2026-01-01T00:00:00Z\u{1f}fix bug\u{1f}body text\0  \n";
        let records = parse_log(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash, "abc123");
        assert_eq!(records[0].subject, "fix bug");
        assert_eq!(records[0].body, "body text");
    }

    #[test]
    fn parse_ahead_behind_reads_tab_separated_counts() {
        assert_eq!(parse_ahead_behind("3\t1\n"), Some((3, 1)));
    }

    #[test]
    fn parse_conflict_markers_extracts_ours_and_theirs() {
        let text = "before\n<<<<<<< HEAD\nmine\n=======\ntheirs\n>>>>>>> branch\nafter\n";
        let sections = parse_conflict_markers(text).unwrap();
        assert_eq!(sections.ours, "mine\n");
        assert_eq!(sections.theirs, "theirs\n");
        assert!(sections.base.is_none());
    }

    #[test]
    fn parse_conflict_markers_extracts_diff3_base() {
        let text = "<<<<<<< HEAD\nmine\n|||||||base\noriginal\n=======\ntheirs\n>>>>>>> branch\n";
        let sections = parse_conflict_markers(text).unwrap();
        assert_eq!(sections.ours, "mine\n");
        assert_eq!(sections.base.as_deref(), Some("original\n"));
        assert_eq!(sections.theirs, "theirs\n");
    }
}
