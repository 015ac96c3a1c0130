// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wildcard name matching for rule patterns.
//!
//! Supports:
//! - `*` -- Matches any run of characters (including none)
//! - `?` -- Matches exactly one character
//!
//! A pattern without wildcard characters is compared exactly. An absent
//! pattern is read as `*`. Matching is case-sensitive and works on Unicode
//! scalar values, so `?` consumes one character rather than one byte.

const WILDCARDS: [char; 2] = ['*', '?'];

/// True if `name` contains `*` or `?`.
pub fn has_wildcards(name: &str) -> bool {
    name.contains(&WILDCARDS[..])
}

/// Match `name` against an optional glob `pattern`.
///
/// # Examples
///
/// ```
/// use hdds_access::matcher::name_match;
///
/// assert!(name_match(Some("data.*"), "data.temperature"));
/// assert!(name_match(Some("dev-??"), "dev-42"));
/// assert!(name_match(None, "anything"));
/// assert!(!name_match(Some("Data.*"), "data.temperature"));
/// ```
pub fn name_match(pattern: Option<&str>, name: &str) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    if pattern == "*" {
        return true;
    }
    if !has_wildcards(pattern) {
        return pattern == name;
    }
    glob_match(pattern, name)
}

/// Byte-level entry point for callers holding raw buffers.
///
/// Absent names and invalid UTF-8 on either side never match.
pub fn name_match_bytes(pattern: Option<&[u8]>, name: Option<&[u8]>) -> bool {
    let Some(name) = name.and_then(|n| std::str::from_utf8(n).ok()) else {
        return false;
    };
    match pattern {
        None => true,
        Some(p) => match std::str::from_utf8(p) {
            Ok(p) => name_match(Some(p), name),
            Err(_) => false,
        },
    }
}

/// Iterative glob with single-star backtracking.
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p_idx, mut n_idx) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);

    while n_idx < name.len() {
        match pattern.get(p_idx) {
            Some('*') => {
                star_idx = Some(p_idx);
                match_idx = n_idx;
                p_idx += 1;
            }
            Some(&c) if c == '?' || c == name[n_idx] => {
                p_idx += 1;
                n_idx += 1;
            }
            _ => match star_idx {
                Some(star) => {
                    p_idx = star + 1;
                    match_idx += 1;
                    n_idx = match_idx;
                }
                None => return false,
            },
        }
    }

    while pattern.get(p_idx) == Some(&'*') {
        p_idx += 1;
    }

    p_idx == pattern.len()
}
