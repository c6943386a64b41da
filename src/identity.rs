//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The identity/derived-identity graph (RFC 7950 §7.18).
//!
//! Identities form a DAG: each identity names zero or more base
//! identities, and each base keeps a back-link to every identity derived
//! from it. The back-links are what makes `instance-identifier`-free
//! "is this value derived from that base?" checks (used by `identityref`)
//! an O(depth) walk instead of a full-graph scan.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dict::IStr;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Current,
    Deprecated,
    Obsolete,
}

impl Default for Status {
    fn default() -> Status {
        Status::Current
    }
}

pub struct Identity {
    pub name: IStr,
    pub module: IStr,
    pub status: Status,
    pub bases: RefCell<Vec<Rc<Identity>>>,
    pub derived: RefCell<Vec<Rc<Identity>>>,
}

impl Identity {
    pub fn new(name: IStr, module: IStr, status: Status) -> Rc<Identity> {
        Rc::new(Identity {
            name,
            module,
            status,
            bases: RefCell::new(Vec::new()),
            derived: RefCell::new(Vec::new()),
        })
    }

    /// `true` if `self` is `other`, or is (transitively) derived from it.
    pub fn derives_from(self: &Rc<Identity>, other: &Rc<Identity>) -> bool {
        if Rc::ptr_eq(self, other) {
            return true;
        }
        self.bases.borrow().iter().any(|base| base.derives_from(other))
    }
}

/// Links `identity` to each of its `base_names`, appending `identity` to
/// every base's `derived` back-link list in the order links are resolved.
/// `lookup` resolves a (possibly prefixed) base identity name; cross-module
/// bases are expected to already be compiled, since imports compile before
/// the importing module (§4.E).
pub fn link_bases<F>(identity: &Rc<Identity>, base_names: &[String], mut lookup: F) -> Result<()>
where
    F: FnMut(&str) -> Result<Rc<Identity>>,
{
    for name in base_names {
        let base = lookup(name)?;
        if base.derives_from(identity) {
            return Err(Error::semantic(
                "identity-circular",
                format!("identity '{}' would create a cycle through base '{}'", identity.name, base.name),
            ));
        }
        base.derived.borrow_mut().push(Rc::clone(identity));
        identity.bases.borrow_mut().push(base);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn istr(s: &str) -> IStr {
        crate::dict::Dictionary::new().intern(s)
    }

    #[test]
    fn derives_from_walks_multiple_bases() {
        let animal = Identity::new(istr("animal"), istr("test"), Status::Current);
        let mammal = Identity::new(istr("mammal"), istr("test"), Status::Current);
        let dog = Identity::new(istr("dog"), istr("test"), Status::Current);

        link_bases(&mammal, &["animal".into()], |n| match n {
            "animal" => Ok(Rc::clone(&animal)),
            _ => Err(Error::not_found("x", "missing")),
        })
        .unwrap();
        link_bases(&dog, &["mammal".into()], |n| match n {
            "mammal" => Ok(Rc::clone(&mammal)),
            _ => Err(Error::not_found("x", "missing")),
        })
        .unwrap();

        assert!(dog.derives_from(&animal));
        assert!(dog.derives_from(&mammal));
        assert!(dog.derives_from(&dog));
        assert!(!animal.derives_from(&dog));
        assert_eq!(animal.derived.borrow().len(), 1);
    }

    #[test]
    fn cycle_is_rejected() {
        let a = Identity::new(istr("a"), istr("test"), Status::Current);
        let b = Identity::new(istr("b"), istr("test"), Status::Current);
        link_bases(&b, &["a".into()], |_| Ok(Rc::clone(&a))).unwrap();
        let result = link_bases(&a, &["b".into()], |_| Ok(Rc::clone(&b)));
        assert!(result.is_err());
    }
}
