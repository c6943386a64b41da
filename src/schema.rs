//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The compiled data tree: what `module.rs`'s compiler produces from a
//! [`crate::parsed::ParsedModule`] once typedefs, `if-feature`, `uses`,
//! augments and deviations have all been resolved. Every node here is
//! immutable once built; `Rc` sharing (for `type`) and a `Weak` parent
//! link are the ownership pattern used throughout this crate.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::dict::IStr;
use crate::feature::{Feature, IfFeatureExpr};
use crate::identity::{Identity, Status};
use crate::parsed::ParsedTypedef;
use crate::types::CompiledType;

#[derive(Debug)]
pub struct SchemaNodeMust {
    pub xpath: String,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
}

#[derive(Debug)]
pub struct SchemaNodeWhen {
    pub xpath: String,
}

/// The node-kind-specific data. Kept as a flat enum (mirroring the
/// teacher's `SchemaNodeKind`) rather than one struct per kind plus a
/// trait object, since every kind still shares the bulk of its fields
/// (see [`SchemaNode`]) and callers overwhelmingly want to `match` on
/// kind anyway.
#[derive(Debug)]
pub enum SchemaNodeKind {
    Container { presence: bool },
    Leaf { type_: Rc<CompiledType>, default: Option<String> },
    LeafList { type_: Rc<CompiledType>, min_elements: u32, max_elements: Option<u32>, ordered_by_user: bool },
    List { keys: Vec<IStr>, min_elements: u32, max_elements: Option<u32>, ordered_by_user: bool },
    Choice { default_case: Option<IStr>, mandatory: bool },
    Case,
    AnyXml,
    AnyData,
    Rpc,
    Action,
    Notification,
}

impl SchemaNodeKind {
    pub fn is_data_node(&self) -> bool {
        !matches!(self, SchemaNodeKind::Rpc | SchemaNodeKind::Action | SchemaNodeKind::Notification | SchemaNodeKind::Case)
    }
}

pub struct SchemaNode {
    pub name: IStr,
    pub module: IStr,
    pub kind: SchemaNodeKind,
    pub config: bool,
    pub mandatory: bool,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub if_features: Vec<IfFeatureExpr>,
    pub must: Vec<SchemaNodeMust>,
    pub when: Option<SchemaNodeWhen>,
    pub children: Vec<Rc<SchemaNode>>,
    pub input: Option<Rc<SchemaNode>>,
    pub output: Option<Rc<SchemaNode>>,
    parent: RefCell<Weak<SchemaNode>>,
    index_in_parent: Cell<usize>,
}

impl SchemaNode {
    pub fn new(
        name: IStr,
        module: IStr,
        kind: SchemaNodeKind,
        config: bool,
        mandatory: bool,
        status: Status,
        if_features: Vec<IfFeatureExpr>,
    ) -> SchemaNode {
        SchemaNode {
            name,
            module,
            kind,
            config,
            mandatory,
            status,
            description: None,
            reference: None,
            if_features,
            must: Vec::new(),
            when: None,
            children: Vec::new(),
            input: None,
            output: None,
            parent: RefCell::new(Weak::new()),
            index_in_parent: Cell::new(0),
        }
    }

    /// Links `self`'s children's `parent`/`index_in_parent` back-pointers.
    /// Call once, right after wrapping the fully-built node in an `Rc`.
    pub fn link_children(self: &Rc<SchemaNode>) {
        for (i, child) in self.children.iter().enumerate() {
            *child.parent.borrow_mut() = Rc::downgrade(self);
            child.index_in_parent.set(i);
        }
        if let Some(input) = &self.input {
            *input.parent.borrow_mut() = Rc::downgrade(self);
        }
        if let Some(output) = &self.output {
            *output.parent.borrow_mut() = Rc::downgrade(self);
        }
    }

    pub fn parent(&self) -> Option<Rc<SchemaNode>> {
        self.parent.borrow().upgrade()
    }

    pub fn index_in_parent(&self) -> usize {
        self.index_in_parent.get()
    }

    /// Whether every `if-feature` on this node currently evaluates true.
    /// A disabled node is still present in the tree (this crate doesn't
    /// prune schema nodes at compile time); callers that care about
    /// effective visibility check this explicitly.
    pub fn is_enabled(&self) -> bool {
        self.if_features.iter().all(|e| e.evaluate())
    }

    /// Builds this node's schema path (`/module:top/child/grandchild`),
    /// prefixing each step with its owning module's name only where that
    /// differs from the preceding step's, matching RFC 7950 §6.5's
    /// "schema node identifier" convention.
    pub fn path(self: &Rc<SchemaNode>) -> String {
        let mut segments = Vec::new();
        let mut cur = Some(Rc::clone(self));
        let mut last_module: Option<IStr> = None;
        while let Some(node) = cur {
            let seg = if last_module.as_ref() != Some(&node.module) {
                format!("{}:{}", node.module, node.name)
            } else {
                node.name.to_string()
            };
            segments.push(seg);
            last_module = Some(node.module.clone());
            cur = node.parent();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

/// A resolved `import` statement, kept on the compiled module purely for
/// introspection (path resolution itself runs off `ParsedModule::imports`
/// during compilation).
#[derive(Debug, Clone)]
pub struct SchemaImport {
    pub module: String,
    pub prefix: String,
    pub revision: Option<String>,
}

pub struct SchemaModule {
    pub name: IStr,
    pub revision: Option<String>,
    pub namespace: IStr,
    pub prefix: IStr,
    pub organization: Option<String>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub imports: Vec<SchemaImport>,
    pub children: Vec<Rc<SchemaNode>>,
    pub features: Vec<Rc<Feature>>,
    pub identities: Vec<Rc<Identity>>,
    /// Module-level typedefs, kept around after compilation so that a
    /// module importing this one can walk a `prefix:name` typedef chain
    /// that crosses into this module's own namespace.
    pub typedefs: HashMap<String, Rc<ParsedTypedef>>,
}

impl SchemaModule {
    pub fn find_child(&self, name: &str) -> Option<&Rc<SchemaNode>> {
        self.children.iter().find(|c| c.name.as_str() == name)
    }

    pub fn typedef(&self, name: &str) -> Option<&Rc<ParsedTypedef>> {
        self.typedefs.get(name)
    }

    pub fn feature(&self, name: &str) -> Option<&Rc<Feature>> {
        self.features.iter().find(|f| f.name.as_str() == name)
    }

    pub fn identity(&self, name: &str) -> Option<&Rc<Identity>> {
        self.identities.iter().find(|i| i.name.as_str() == name)
    }
}
