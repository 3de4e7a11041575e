//! Filter-string scanning and subtest-name rewriting.
//!
//! A filter such as `Foo/A=1` is one unanchored regular expression per
//! hierarchy level. A `/` only separates levels when it is outside any
//! bracket expression and any parenthesised group, and is not escaped:
//!
//! ```text
//! A/B[c/d]/E      -> ["A", "B[c/d]", "E"]
//! x(a/b)/y        -> ["x(a/b)", "y"]
//! a\/b/c          -> ["a\/b", "c"]
//! ```

use regex::Regex;
use std::sync::OnceLock;

/// Letters, marks, numbers, punctuation, symbols, and the ASCII space.
const PRINTABLE: &str = r"^[\p{L}\p{M}\p{N}\p{P}\p{S} ]$";

static PRINTABLE_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Split a filter string into per-level patterns.
///
/// Never fails: an unmatched `]` is legal and ignored, and an unbalanced
/// `(` simply suppresses splitting for the rest of the string. Invalid
/// patterns are caught later when each level is compiled.
pub fn split_levels(s: &str) -> Vec<String> {
    let bytes = s.as_bytes();
    let mut levels = Vec::with_capacity(bytes.iter().filter(|&&b| b == b'/').count() + 1);
    let mut start = 0;
    let mut brackets = 0usize;
    let mut parens = 0i32;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            b'(' if brackets == 0 => parens += 1,
            b')' if brackets == 0 => parens -= 1,
            b'\\' => i += 1,
            b'/' if brackets == 0 && parens == 0 => {
                levels.push(s[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    levels.push(s[start..].to_string());
    levels
}

/// Rewrite a subtest name into a single path-safe segment.
///
/// Every run of whitespace becomes a single `_`, every non-printable
/// character is replaced by its escaped form (`\u{1}`, `\0`, ...), everything
/// else is kept.
pub fn rewrite(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if is_printable(c) {
            out.push(c);
        } else if c.escape_debug().next() == Some('\\') {
            out.extend(c.escape_debug());
        } else {
            out.extend(c.escape_unicode());
        }
    }
    out
}

/// Printability by Unicode general category.
///
/// Controls, format characters, separators other than the ASCII space,
/// surrogates, private-use and unassigned code points are not printable.
fn is_printable(c: char) -> bool {
    if c.is_ascii() {
        return c == ' ' || c.is_ascii_graphic();
    }
    match PRINTABLE_RE.get_or_init(|| Regex::new(PRINTABLE).ok()) {
        Some(re) => re.is_match(c.encode_utf8(&mut [0u8; 4])),
        None => !c.is_control(),
    }
}
