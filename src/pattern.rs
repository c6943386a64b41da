//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Adapts a YANG `pattern` statement's XML Schema regular expression
//! syntax to a usable, anchored `regex::Regex`. RFC 7950 nominally
//! targets a PCRE-flavored engine; this crate compiles against `regex`
//! instead, adjusting anchoring and Unicode block escapes to match.

use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::error::{Error, Result};

/// A compiled `pattern` restriction, refcount-shared across every
/// `CompiledType` that inherits it unmodified through a typedef chain.
pub struct CompiledPattern {
    /// The original XML Schema pattern text, kept for diagnostics and
    /// schema re-emission.
    pub source: String,
    /// `true` when the pattern is negated (YANG 1.1 `modifier
    /// "invert-match"`).
    pub inverted: bool,
    regex: Regex,
}

impl CompiledPattern {
    pub fn is_match(&self, value: &str) -> bool {
        let matched = self.regex.is_match(value);
        matched != self.inverted
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .field("inverted", &self.inverted)
            .finish()
    }
}

/// Expands a subset of XML Schema's `\p{IsBlockName}` Unicode block
/// escapes into PCRE/`regex`-flavored `\p{Block}` escapes, since the two
/// naming conventions differ (XML Schema uses `Is`-prefixed Unicode block
/// names; `regex` groups blocks under mixed-case script/"In" names of its
/// own). Only the handful of commonly-referenced blocks are covered;
/// others pass through unescaped, which surfaces later as a `regex`
/// compile error rather than a silent miss.
fn expand_unicode_blocks(pattern: &str) -> String {
    const BLOCKS: &[(&str, &str)] = &[
        ("IsBasicLatin", "InBasicLatin"),
        ("IsLatin-1Supplement", "InLatin1Supplement"),
        ("IsLatinExtended-A", "InLatinExtendedA"),
        ("IsLatinExtended-B", "InLatinExtendedB"),
        ("IsGreek", "InGreekAndCoptic"),
        ("IsCyrillic", "InCyrillic"),
        ("IsArabic", "InArabic"),
        ("IsHebrew", "InHebrew"),
        ("IsCJKUnifiedIdeographs", "InCJKUnifiedIdeographs"),
        ("IsHiragana", "InHiragana"),
        ("IsKatakana", "InKatakana"),
    ];
    let mut out = pattern.to_string();
    for (from, to) in BLOCKS {
        let needle = format!("\\p{{{from}}}");
        if out.contains(&needle) {
            out = out.replace(&needle, &format!("\\p{{{to}}}"));
        }
        let needle_not = format!("\\P{{{from}}}");
        if out.contains(&needle_not) {
            out = out.replace(&needle_not, &format!("\\P{{{to}}}"));
        }
    }
    out
}

/// Escapes bare `$` characters that aren't already part of an anchor or
/// escape sequence, so that inserting our own trailing `$` doesn't change
/// the meaning of a pattern that legitimately wants to match a literal
/// dollar sign. Mirrors the same treatment for `^` at the start.
fn escape_dollar_and_caret(pattern: &str) -> String {
    // XML Schema patterns are implicitly fully anchored already (the XSD
    // spec defines `pattern` as matching the *entire* value), so a YANG
    // pattern is not expected to carry its own `^`/`$`. Any literal one
    // that does appear is almost certainly meant as a literal character in
    // a language without anchors, so escape it defensively.
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '^' | '$' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Compiles a YANG `pattern` statement's argument into a [`CompiledPattern`].
///
/// Steps:
/// 1. Escape stray `^`/`$` so they can't interfere with our own anchors.
/// 2. Wrap the pattern so it matches the *entire* input: XML Schema
///    patterns are implicitly fully anchored, unlike PCRE/`regex`'s
///    default partial match. A pattern already ending in `.*` is left
///    unanchored at the tail, skipping a redundant `$` when the author
///    already wrote one.
/// 3. Expand `\p{IsBlockName}` Unicode block escapes.
/// 4. Compile against `regex::Regex`.
pub fn compile_pattern(source: &str, inverted: bool) -> Result<CompiledPattern> {
    let escaped = escape_dollar_and_caret(source);
    let expanded = expand_unicode_blocks(&escaped);

    let wrapped = if expanded.ends_with(".*") {
        format!("^(?:{expanded})")
    } else {
        format!("^(?:{expanded})$")
    };

    let regex = Regex::new(&wrapped).map_err(|e| {
        Error::syntax(
            "pattern-invalid-regex",
            format!("pattern '{source}' does not compile: {e}"),
        )
    })?;

    Ok(CompiledPattern {
        source: source.to_string(),
        inverted,
        regex,
    })
}

/// Convenience for sharing one compiled pattern across an aliased
/// `CompiledType` chain without recompiling the regex.
pub fn share(pattern: &Rc<CompiledPattern>) -> Rc<CompiledPattern> {
    Rc::clone(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_whole_value() {
        let p = compile_pattern("abc", false).unwrap();
        assert!(p.is_match("abc"));
        assert!(!p.is_match("xabcx"));
        assert!(!p.is_match("ab"));
    }

    #[test]
    fn trailing_dot_star_is_not_double_anchored() {
        let p = compile_pattern("abc.*", false).unwrap();
        assert!(p.is_match("abcdef"));
        assert!(p.is_match("abc"));
    }

    #[test]
    fn inverted_pattern_negates_match() {
        let p = compile_pattern("[0-9]+", true).unwrap();
        assert!(!p.is_match("123"));
        assert!(p.is_match("abc"));
    }

    #[test]
    fn literal_dollar_is_escaped_not_anchor() {
        let p = compile_pattern("\\$[0-9]+", false).unwrap();
        assert!(p.is_match("$5"));
    }

    #[test]
    fn unicode_block_expansion() {
        let p = compile_pattern("\\p{IsBasicLatin}+", false).unwrap();
        assert!(p.is_match("hello"));
    }

    #[test]
    fn invalid_pattern_is_syntax_error() {
        let result = compile_pattern("(unclosed", false);
        assert!(result.is_err());
    }
}
