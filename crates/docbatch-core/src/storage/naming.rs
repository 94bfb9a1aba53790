//! File naming: `{category}_{docname}_{YYYYMMDD}_{urlhash}.{ext}`.

use crate::fetcher::DocumentFormat;
use crate::task::{url_digest, Task};

/// Maximum file name length in bytes (Linux NAME_MAX).
pub const NAME_MAX: usize = 255;

const FALLBACK: &str = "document";

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control() || c.is_whitespace()
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn truncate_on_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut take = max_bytes;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    s.truncate(take);
}

/// Sanitize one name component: forbidden, control and whitespace characters
/// become `_`, `_` runs collapse, `.`/`_`/space are trimmed from the ends.
/// Reserved device names get a trailing `_`; an empty result becomes
/// `document`.
pub fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }
    let mut out = out.trim_matches(&['.', '_', ' '][..]).to_string();
    if out.is_empty() {
        out = FALLBACK.to_string();
    }
    if is_reserved_windows_name(&out) {
        out.push('_');
    }
    out
}

/// Document name from the URL: last non-empty path segment without its
/// extension, with `-` treated as a separator.
fn document_name(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let segment = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };
    stem.replace('-', "_")
}

/// Final file name for a task's document. Deterministic for a task, so a
/// re-fetch overwrites the same path, and distinct for distinct URLs through
/// the URL hash.
pub fn file_name_for(task: &Task, format: DocumentFormat) -> String {
    let hash = &url_digest(&task.url)[..8];
    let suffix = format!(
        "_{}_{}.{}",
        task.issue_date.format("%Y%m%d"),
        hash,
        format.extension()
    );

    let docname = document_name(&task.url);
    let raw_prefix = if docname.is_empty() {
        task.category.clone()
    } else {
        format!("{}_{}", task.category, docname)
    };
    let mut prefix = sanitize_component(&raw_prefix);
    truncate_on_char_boundary(&mut prefix, NAME_MAX - suffix.len());
    let prefix = prefix.trim_end_matches(&['.', '_', ' '][..]);
    let prefix = if prefix.is_empty() { FALLBACK } else { prefix };
    format!("{}{}", prefix, suffix)
}
