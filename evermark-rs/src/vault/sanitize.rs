//! File-name sanitization and collision suffixes.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Longest name (in characters) produced by [`sanitize_file_name`].
pub const MAX_NAME_CHARS: usize = 120;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Make `name` safe as a single path component on common filesystems.
///
/// May return an empty string; callers pick their own fallback.
pub fn sanitize_file_name(name: &str) -> String {
    let normalized: String = name.nfc().collect();
    let collapsed = WHITESPACE.replace_all(&normalized, " ");

    let replaced: String = collapsed
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches([' ', '.']);
    let truncated: String = trimmed.chars().take(MAX_NAME_CHARS).collect();
    let mut out = truncated.trim_end_matches([' ', '.']).to_string();

    if is_reserved(&out) {
        let insert_at = out.find('.').unwrap_or(out.len());
        out.insert(insert_at, '_');
    }
    out
}

/// Windows device names, with or without an extension.
fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem))
}

/// Split a file name into stem and extension (`"a.png"` -> `("a", Some("png"))`).
///
/// Only short, space-free trailing segments count as extensions.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ => (name, None),
    }
}

/// Claim a name in `taken`, appending `-1`, `-2`, ... to the stem until it
/// is free. Comparison is case-insensitive.
pub fn unique_name(stem: &str, extension: Option<&str>, taken: &mut HashSet<String>) -> String {
    let mut counter = 0;
    loop {
        let candidate = match counter {
            0 => stem.to_string(),
            n => format!("{}-{}", stem, n),
        };
        let full = match extension {
            Some(ext) => format!("{}.{}", candidate, ext),
            None => candidate,
        };
        if taken.insert(full.to_lowercase()) {
            return full;
        }
        counter += 1;
    }
}
