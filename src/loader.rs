//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Directory search loader: given a module name and optional
//! revision, searches the context's configured search paths (plus the
//! current working directory, unless disabled) for a matching
//! `name.yang` or `name@revision.yang` file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::{newer_revision, parse_module_filename};

#[derive(Debug, Default)]
pub struct Loader {
    search_dirs: Vec<PathBuf>,
    search_cwd: bool,
}

/// A file the loader found on disk, together with the (name, revision) it
/// parsed out of the filename.
pub struct Found {
    pub path: PathBuf,
    pub revision: Option<String>,
    pub source: String,
}

impl Loader {
    pub fn new() -> Loader {
        Loader { search_dirs: Vec::new(), search_cwd: true }
    }

    pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
        self.search_dirs.push(dir.into());
    }

    pub fn clear_search_dirs(&mut self) {
        self.search_dirs.clear();
    }

    pub fn set_search_cwd(&mut self, enabled: bool) {
        self.search_cwd = enabled;
    }

    /// Finds and reads the best-matching module file for `name`. If
    /// `revision` is given, only an exact `name@revision.yang` match is
    /// accepted; otherwise the lexicographically greatest revision among
    /// every `name@*.yang`/`name.yang` candidate across all search
    /// directories wins.
    pub fn find(&self, name: &str, revision: Option<&str>) -> Result<Found> {
        let mut best: Option<(PathBuf, Option<String>)> = None;

        for dir in self.dirs() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let filename = entry.file_name();
                let Some(filename) = filename.to_str() else { continue };
                let Some((fname, frev)) = parse_module_filename(filename) else { continue };
                if fname != name {
                    continue;
                }
                if let Some(want) = revision {
                    if frev == Some(want) {
                        return self.read(entry.path(), Some(want.to_string()));
                    }
                    continue;
                }
                let is_better = match &best {
                    None => true,
                    Some((_, cur_rev)) => frev.is_some() && newer_revision(cur_rev.as_deref(), frev) == frev && cur_rev.as_deref() != frev,
                };
                if is_better {
                    best = Some((entry.path(), frev.map(str::to_string)));
                }
            }
        }

        match (revision, best) {
            (Some(want), _) => Err(Error::not_found("module-not-found", format!("module '{name}@{want}' not found in search path"))),
            (None, Some((path, rev))) => self.read(path, rev),
            (None, None) => Err(Error::not_found("module-not-found", format!("module '{name}' not found in search path"))),
        }
    }

    fn read(&self, path: PathBuf, revision: Option<String>) -> Result<Found> {
        let source = fs::read_to_string(&path)
            .map_err(|e| Error::internal("module-read-failed", format!("failed to read '{}': {e}", path.display())))?;
        Ok(Found { path, revision, source })
    }

    fn dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.search_dirs.clone();
        if self.search_cwd {
            dirs.push(Path::new(".").to_path_buf());
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tempdir(files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("yang-core-loader-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            let mut f = fs::File::create(dir.join(name)).unwrap();
            f.write_all(contents.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn picks_latest_revision_when_unspecified() {
        let dir = tempdir(&[
            ("example@2020-01-01.yang", "old"),
            ("example@2021-06-15.yang", "new"),
        ]);
        let mut loader = Loader::new();
        loader.set_search_cwd(false);
        loader.add_search_dir(&dir);
        let found = loader.find("example", None).unwrap();
        assert_eq!(found.revision.as_deref(), Some("2021-06-15"));
        assert_eq!(found.source, "new");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn exact_revision_match_required_when_specified() {
        let dir = tempdir(&[("example@2020-01-01.yang", "old")]);
        let mut loader = Loader::new();
        loader.set_search_cwd(false);
        loader.add_search_dir(&dir);
        assert!(loader.find("example", Some("2021-06-15")).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bare_filename_is_lowest_precedence() {
        let dir = tempdir(&[("example.yang", "bare"), ("example@2020-01-01.yang", "revisioned")]);
        let mut loader = Loader::new();
        loader.set_search_cwd(false);
        loader.add_search_dir(&dir);
        let found = loader.find("example", None).unwrap();
        assert_eq!(found.source, "revisioned");
        let _ = fs::remove_dir_all(&dir);
    }
}
