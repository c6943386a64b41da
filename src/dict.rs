//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Component A: the context-wide string dictionary.
//!
//! Every string that ends up in a parsed or compiled tree (module names,
//! node names, descriptions, pattern text, ...) is interned here first.
//! Two interned copies of the same bytes are always the same allocation, so
//! string equality on the hot compilation paths (status checks, typedef
//! lookups, feature name comparisons) reduces to a pointer comparison
//! instead of a byte-by-byte scan.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// An interned string handle.
///
/// Cloning is cheap (`Rc` bump); equality and hashing are by pointer
/// identity, matching the source's "dictionary null sentinel or
/// dictionary-interned pointer" invariant.
#[derive(Clone)]
pub struct IStr(Rc<str>);

impl IStr {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for IStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq for IStr {
    fn eq(&self, other: &IStr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for IStr {}

impl Hash for IStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for IStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for IStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl AsRef<str> for IStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for IStr {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for IStr {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// The context-wide interning table.
///
/// Holds only weak references: once every node referencing an interned
/// string is dropped, the allocation goes away on its own instead of
/// living for the lifetime of the context. This is the refcounted,
/// create-on-intern / free-on-last-release lifecycle, expressed
/// with ownership instead of a manual `refcount` field.
#[derive(Default)]
pub struct Dictionary {
    table: RefCell<HashMap<Box<str>, Weak<str>>>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }

    /// Interns `s`, returning the canonical handle for its byte sequence.
    pub fn intern(&self, s: &str) -> IStr {
        let mut table = self.table.borrow_mut();
        if let Some(weak) = table.get(s) {
            if let Some(rc) = weak.upgrade() {
                return IStr(rc);
            }
        }
        let rc: Rc<str> = Rc::from(s);
        table.insert(Box::from(s), Rc::downgrade(&rc));
        IStr(rc)
    }

    /// Number of distinct byte sequences currently interned (including
    /// stale, about-to-be-collected entries whose last strong reference
    /// was just dropped).
    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop dictionary bookkeeping for strings nobody holds anymore.
    ///
    /// Never required for correctness (`intern` already re-creates an
    /// entry whose weak reference has gone stale), only for bounding the
    /// dictionary's own memory use after heavy churn such as repeated
    /// disable/enable cycles during `change()`.
    pub fn gc(&self) {
        self.table.borrow_mut().retain(|_, weak| weak.strong_count() > 0);
    }
}
