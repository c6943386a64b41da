//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Compilation-decision logging.
//!
//! Direct `log::debug!`/`log::warn!` call sites for the handful of
//! compile-time decisions worth recording (type aliasing vs. allocation,
//! restriction narrowing, feature cascades), kept in one place so their
//! wording stays consistent.

const TARGET: &str = "yang_core::module";

pub(crate) fn type_aliased(typedef: &str) {
    log::debug!(target: TARGET, "typedef '{typedef}' adds no restriction, aliasing parent CompiledType");
}

pub(crate) fn type_narrowed(typedef: &str) {
    log::debug!(target: TARGET, "typedef '{typedef}' narrows its parent type, allocating a fresh CompiledType");
}

pub(crate) fn feature_enabled(name: &str) {
    log::debug!(target: TARGET, "feature '{name}' enabled");
}

pub(crate) fn feature_disabled(name: &str) {
    log::debug!(target: TARGET, "feature '{name}' disabled");
}

pub(crate) fn feature_cascade_disabled(dependent: &str, cause: &str) {
    log::debug!(target: TARGET, "feature '{dependent}' disabled by cascade from '{cause}'");
}

pub(crate) fn feature_enable_all_rolled_back(unsatisfied: &[String]) {
    log::warn!(target: TARGET, "change(*, true) rolled back: features still unsatisfied: {}", unsatisfied.join(", "));
}

pub(crate) fn module_loaded(name: &str, revision: Option<&str>, path: &std::path::Path) {
    log::debug!(target: TARGET, "loaded module '{name}' revision={revision:?} from {}", path.display());
}

pub(crate) fn module_reused(name: &str, revision: Option<&str>) {
    log::debug!(target: TARGET, "reusing already-compiled module '{name}' revision={revision:?}");
}
