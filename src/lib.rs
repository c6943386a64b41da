//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! A pure-Rust YANG (RFC 7950) schema compiler.
//!
//! Given module source text, [`context::Context`] parses, links and
//! restriction-merges it into a [`schema::SchemaModule`]: typedef chains are
//! walked and narrowed, `if-feature` expressions are compiled to postfix
//! form and evaluated, identities are linked to their base, `uses`/grouping
//! expansion and `augment`/`deviation` application run against the target
//! tree.
//!
//! ## Design goals
//! * Two-stage lifecycle: a source-faithful parsed tree, then a linked,
//!   restriction-merged compiled tree, matching RFC 7950's own separation
//!   between "module" and "schema tree" concepts.
//! * No FFI: every stage is plain Rust, so a compiled [`schema::SchemaNode`]
//!   tree can be walked, cloned (by `Rc`) and shared without crossing a C
//!   boundary.
//! * Feature evaluation is its own well-tested component: `if-feature`
//!   expressions compile once to a compact postfix form, and toggling a
//!   feature at runtime cascades to every dependent without silently
//!   re-enabling anything downstream.
//!
//! ## Examples
//!
//! ```
//! use yang_core::context::{Context, ContextFlags};
//!
//! let mut ctx = Context::new(ContextFlags::empty());
//! let module = ctx.compile_str(r#"
//!     module example {
//!         namespace "urn:example";
//!         prefix ex;
//!
//!         leaf greeting {
//!             type string;
//!         }
//!     }
//! "#).unwrap();
//! assert_eq!(module.name.as_str(), "example");
//! ```

pub mod context;
pub mod dict;
pub mod error;
pub mod feature;
pub mod identity;
pub mod iter;
pub mod loader;
pub mod logging;
pub mod module;
pub mod parsed;
pub mod parser;
pub mod pattern;
pub mod schema;
pub mod types;
pub mod utils;

pub use crate::error::{Diagnostic, Error, ErrorKind, Result};
