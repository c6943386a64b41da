//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The [`Context`]: owns the dictionary, the cache of compiled modules, the
//! loader's search paths, and the context-wide diagnostics buffer. This is
//! the entry point most callers reach for; `module::compile` does the
//! actual per-module work, driven by `Context` through [`ModuleResolver`].

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use bitflags::bitflags;

use crate::dict::Dictionary;
use crate::error::{Diagnostic, Error, Result};
use crate::loader::Loader;
use crate::logging;
use crate::module::{self, ModuleHandle, ModuleResolver};
use crate::parser;
use crate::schema::SchemaModule;

bitflags! {
    /// Context-wide compilation flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ContextFlags: u16 {
        /// Every feature starts enabled; `if-feature` is never evaluated.
        const ALL_IMPLEMENTED = 0b0000_0001;
        /// Don't search the configured search directories at all.
        const DISABLE_SEARCHDIRS = 0b0000_0010;
        /// Don't search the current working directory.
        const DISABLE_SEARCHDIR_CWD = 0b0000_0100;
        /// Prefer a hit in the search directories over an already-cached
        /// module of the same name when revisions differ.
        const PREFER_SEARCHDIRS = 0b0000_1000;
        /// Drop a module's YANG source text from memory once it has been
        /// compiled; only the linked [`SchemaModule`] is retained.
        const FREE_SOURCE_ON_COMPILE = 0b0001_0000;
    }
}

impl Default for ContextFlags {
    fn default() -> ContextFlags {
        ContextFlags::empty()
    }
}

/// Per-call compilation knobs that aren't worth a context-wide flag.
#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    /// Default YANG version assumed when a module omits `yang-version`.
    pub default_yang_version_11: bool,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions { default_yang_version_11: false }
    }
}

struct CachedModule {
    name: String,
    revision: Option<String>,
    schema: Rc<SchemaModule>,
    source: Option<String>,
    /// Set for a module the caller explicitly submitted (`compile_str`/
    /// `compile_file`), as opposed to one loaded only to satisfy another
    /// module's `import`. At most one implemented entry may exist per name.
    implemented: bool,
}

/// Owns every module compiled so far, the dictionary they share, and the
/// loader used to find more of them on disk.
pub struct Context {
    dict: Rc<Dictionary>,
    flags: ContextFlags,
    options: CompileOptions,
    loader: Loader,
    modules: RefCell<Vec<CachedModule>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Context {
    pub fn new(flags: ContextFlags) -> Context {
        let mut loader = Loader::new();
        loader.set_search_cwd(!flags.contains(ContextFlags::DISABLE_SEARCHDIR_CWD));
        Context {
            dict: Rc::new(Dictionary::new()),
            flags,
            options: CompileOptions::default(),
            loader,
            modules: RefCell::new(Vec::new()),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    pub fn with_options(flags: ContextFlags, options: CompileOptions) -> Context {
        let mut ctx = Context::new(flags);
        ctx.options = options;
        ctx
    }

    pub fn set_options(&mut self, options: CompileOptions) {
        self.options = options;
    }

    pub fn add_search_dir(&mut self, dir: impl AsRef<Path>) {
        if !self.flags.contains(ContextFlags::DISABLE_SEARCHDIRS) {
            self.loader.add_search_dir(dir.as_ref());
        }
    }

    pub fn get_options(&self) -> ContextFlags {
        self.flags
    }

    pub fn set_option(&mut self, flag: ContextFlags) {
        self.flags.insert(flag);
    }

    pub fn unset_option(&mut self, flag: ContextFlags) {
        self.flags.remove(flag);
    }

    pub fn dictionary(&self) -> Rc<Dictionary> {
        Rc::clone(&self.dict)
    }

    /// Every diagnostic recorded since the last [`Context::take_diagnostics`]
    /// call. Unlike `Error`, which unwinds `compile_str`/`compile_file`
    /// immediately on the first rule violation, this buffer is reserved for
    /// callers who want to keep going and collect every failure from a
    /// batch of module loads before reporting.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    fn record(&self, err: &Error) {
        self.diagnostics.borrow_mut().push(err.to_diagnostic());
    }

    pub fn get_module(&self, name: &str, revision: Option<&str>) -> Option<Rc<SchemaModule>> {
        self.modules
            .borrow()
            .iter()
            .find(|m| m.name == name && m.revision.as_deref() == revision)
            .map(|m| Rc::clone(&m.schema))
    }

    pub fn get_module_latest(&self, name: &str) -> Option<Rc<SchemaModule>> {
        self.modules
            .borrow()
            .iter()
            .filter(|m| m.name == name)
            .max_by(|a, b| a.revision.cmp(&b.revision))
            .map(|m| Rc::clone(&m.schema))
    }

    pub fn modules(&self) -> Vec<ModuleHandle> {
        self.modules
            .borrow()
            .iter()
            .map(|m| ModuleHandle { name: m.name.clone(), revision: m.revision.clone(), schema: Rc::clone(&m.schema) })
            .collect()
    }

    /// Compiles a module from in-memory YANG source text, registering it
    /// (and any submodules it `include`s) under the context's cache as an
    /// **implemented** module (§4.E): at most one implemented module per
    /// name may exist in a context.
    pub fn compile_str(&mut self, source: &str) -> Result<Rc<SchemaModule>> {
        self.compile_source(source, true)
    }

    /// Shared body of [`Context::compile_str`] and the dependency-loading
    /// path in [`ModuleResolver::resolve_module`]. `implemented` is `true`
    /// only for a module the caller explicitly submitted; a module loaded
    /// purely to satisfy another module's `import` is not implemented.
    fn compile_source(&mut self, source: &str, implemented: bool) -> Result<Rc<SchemaModule>> {
        let stmts = parser::parse(source)?;
        let top = stmts
            .first()
            .ok_or_else(|| Error::syntax("empty-source", "YANG source contains no top-level statement"))?;
        let mut parsed = module::parse_module(top)?;

        for include in parsed.includes.clone() {
            let found = self.loader.find(&include.submodule, include.revision.as_deref())?;
            let sub_stmts = parser::parse(&found.source)?;
            let sub_top = sub_stmts
                .first()
                .ok_or_else(|| Error::syntax("empty-source", "submodule source contains no top-level statement"))?;
            let sub = module::parse_module(sub_top)?;
            module::merge_submodule(&mut parsed, sub);
        }

        let name = parsed.name.clone();
        let revision = parsed.revision.clone();

        let existing_idx = self.modules.borrow().iter().position(|m| m.name == name && m.revision == revision);
        if let Some(idx) = existing_idx {
            let has_parsed_tree = self.modules.borrow()[idx].source.is_some();
            if has_parsed_tree {
                return Err(Error::already_exists(
                    "module-duplicate",
                    format!("module '{name}' ({}) is already present in this context", revision.as_deref().unwrap_or("no revision")),
                ));
            }
            // A compiled-only entry (its parsed tree was released by
            // `FREE_SOURCE_ON_COMPILE`): reattach the freshly-parsed
            // source and reuse the already-compiled handle.
            logging::module_reused(&name, revision.as_deref());
            let keep_source = !self.flags.contains(ContextFlags::FREE_SOURCE_ON_COMPILE);
            let mut modules = self.modules.borrow_mut();
            modules[idx].source = keep_source.then(|| source.to_string());
            if implemented {
                modules[idx].implemented = true;
            }
            return Ok(Rc::clone(&modules[idx].schema));
        }

        if implemented && self.modules.borrow().iter().any(|m| m.name == name && m.implemented) {
            return Err(Error::already_exists(
                "module-already-implemented",
                format!("an implemented module named '{name}' already exists in this context"),
            ));
        }

        let schema = module::compile(&parsed, self)?;
        let keep_source = !self.flags.contains(ContextFlags::FREE_SOURCE_ON_COMPILE);
        self.modules.borrow_mut().push(CachedModule {
            name,
            revision,
            schema: Rc::clone(&schema),
            source: keep_source.then(|| source.to_string()),
            implemented,
        });
        Ok(schema)
    }

    /// Compiles a module from a file on disk, using its path purely for
    /// diagnostics/logging (the loader is still what resolves imports).
    pub fn compile_file(&mut self, path: impl AsRef<Path>) -> Result<Rc<SchemaModule>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::internal("module-read-failed", format!("failed to read '{}': {e}", path.display())))?;
        let schema = self.compile_str(&source)?;
        logging::module_loaded(&schema.name, schema.revision.as_deref(), path);
        Ok(schema)
    }

    /// Loads and compiles `name` (optionally pinned to `revision`) by
    /// searching the context's search directories. Internal callers
    /// resolving an `import` mid-compile go through the same path via
    /// [`ModuleResolver::resolve_module`] below.
    pub fn load_module(&mut self, name: &str, revision: Option<&str>) -> Result<Rc<SchemaModule>> {
        self.resolve_module(name, revision)
    }

    fn source_of(&self, name: &str, revision: Option<&str>) -> Option<String> {
        self.modules
            .borrow()
            .iter()
            .find(|m| m.name == name && m.revision.as_deref() == revision)
            .and_then(|m| m.source.clone())
    }
}

impl ModuleResolver for Context {
    fn resolve_module(&mut self, name: &str, revision: Option<&str>) -> Result<Rc<SchemaModule>> {
        if let Some(existing) = self.get_module(name, revision) {
            logging::module_reused(name, revision);
            return Ok(existing);
        }
        if revision.is_none() && !self.flags.contains(ContextFlags::PREFER_SEARCHDIRS) {
            if let Some(cached) = self.get_module_latest(name) {
                return Ok(cached);
            }
        }

        let result = self.loader.find(name, revision).and_then(|found| {
            let path = found.path.clone();
            let schema = self.compile_source(&found.source, false)?;
            logging::module_loaded(&schema.name, schema.revision.as_deref(), &path);
            Ok(schema)
        });

        match result {
            Ok(schema) => Ok(schema),
            Err(err) => {
                self.record(&err);
                Err(err)
            }
        }
    }

    fn all_implemented(&self) -> bool {
        self.flags.contains(ContextFlags::ALL_IMPLEMENTED)
    }

    fn dictionary(&self) -> Rc<Dictionary> {
        Rc::clone(&self.dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        module example {
            namespace "urn:example";
            prefix ex;

            leaf greeting {
                type string;
            }
        }
    "#;

    #[test]
    fn compiles_and_caches_a_module() {
        let mut ctx = Context::new(ContextFlags::empty());
        let m1 = ctx.compile_str(EXAMPLE).unwrap();
        assert_eq!(m1.name.as_str(), "example");
        let m2 = ctx.get_module("example", None).unwrap();
        assert!(Rc::ptr_eq(&m1, &m2));
    }

    #[test]
    fn recompiling_same_source_is_rejected_as_duplicate() {
        let mut ctx = Context::new(ContextFlags::empty());
        ctx.compile_str(EXAMPLE).unwrap();
        let err = ctx.compile_str(EXAMPLE).unwrap_err();
        assert_eq!(err.code, "module-duplicate");
    }

    #[test]
    fn compiled_only_entry_reattaches_source_on_resubmission() {
        let mut ctx = Context::new(ContextFlags::FREE_SOURCE_ON_COMPILE);
        let m1 = ctx.compile_str(EXAMPLE).unwrap();
        assert!(ctx.source_of("example", None).is_none());
        let m2 = ctx.compile_str(EXAMPLE).unwrap();
        assert!(Rc::ptr_eq(&m1, &m2));
        assert!(ctx.source_of("example", None).is_some());
    }

    #[test]
    fn second_implemented_revision_of_same_name_is_rejected() {
        const REVISED: &str = r#"
            module example {
                namespace "urn:example";
                prefix ex;
                revision 2024-01-01;

                leaf greeting {
                    type string;
                }
            }
        "#;
        let mut ctx = Context::new(ContextFlags::empty());
        ctx.compile_str(EXAMPLE).unwrap();
        let err = ctx.compile_str(REVISED).unwrap_err();
        assert_eq!(err.code, "module-already-implemented");
    }

    #[test]
    fn free_source_on_compile_drops_cached_text() {
        let mut ctx = Context::new(ContextFlags::FREE_SOURCE_ON_COMPILE);
        ctx.compile_str(EXAMPLE).unwrap();
        assert!(ctx.source_of("example", None).is_none());
    }

    #[test]
    fn keeps_source_by_default() {
        let mut ctx = Context::new(ContextFlags::empty());
        ctx.compile_str(EXAMPLE).unwrap();
        assert!(ctx.source_of("example", None).is_some());
    }
}
