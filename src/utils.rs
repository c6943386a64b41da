//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Small shared helpers with no better home: filename and revision
//! bookkeeping used by [`crate::loader`].

/// Splits a YANG source filename (`"name.yang"` or `"name@2023-01-01.yang"`)
/// into its module name and optional revision. Returns `None` if the
/// filename doesn't end in `.yang`.
pub(crate) fn parse_module_filename(filename: &str) -> Option<(&str, Option<&str>)> {
    let stem = filename.strip_suffix(".yang")?;
    match stem.split_once('@') {
        Some((name, revision)) => Some((name, Some(revision))),
        None => Some((stem, None)),
    }
}

/// Picks the lexicographically greatest of two optional `YYYY-MM-DD`
/// revisions. `None` (no revision)
/// sorts below any revisioned file.
pub(crate) fn newer_revision<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if a >= b { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_revisioned_filename() {
        assert_eq!(parse_module_filename("ietf-interfaces@2018-02-20.yang"), Some(("ietf-interfaces", Some("2018-02-20"))));
    }

    #[test]
    fn splits_bare_filename() {
        assert_eq!(parse_module_filename("ietf-interfaces.yang"), Some(("ietf-interfaces", None)));
    }

    #[test]
    fn rejects_non_yang_filename() {
        assert_eq!(parse_module_filename("README.md"), None);
    }

    #[test]
    fn newer_revision_prefers_revisioned_over_none() {
        assert_eq!(newer_revision(Some("2020-01-01"), None), Some("2020-01-01"));
    }

    #[test]
    fn newer_revision_picks_lexicographically_greatest() {
        assert_eq!(newer_revision(Some("2020-01-01"), Some("2021-06-15")), Some("2021-06-15"));
    }
}
