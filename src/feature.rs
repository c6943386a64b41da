//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Component B: the `if-feature` expression compiler, evaluator, and the
//! `change()` enable/disable propagation algorithm.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::dict::IStr;
use crate::error::{Error, Result};

/// A compiled feature.
///
/// `dependents` holds every feature whose `if-feature` expression
/// references this one; it is populated as a side effect of compiling
/// those expressions (§4.B), in the order the dependents were compiled.
/// Weak references break the cycle with `dependents` pointing "backwards"
/// relative to the `features[]` array each `IfFeatureExpr` holds.
#[derive(Debug)]
pub struct Feature {
    pub name: IStr,
    pub enabled: Cell<bool>,
    pub if_features: RefCell<Vec<IfFeatureExpr>>,
    pub dependents: RefCell<Vec<Weak<Feature>>>,
}

impl Feature {
    pub fn new(name: IStr) -> Rc<Feature> {
        Rc::new(Feature {
            name,
            enabled: Cell::new(true),
            if_features: RefCell::new(Vec::new()),
            dependents: RefCell::new(Vec::new()),
        })
    }

    /// A feature is enabled only if every one of its `if-feature`
    /// expressions currently evaluates to true.
    pub fn if_features_satisfied(&self) -> bool {
        self.if_features.borrow().iter().all(|expr| expr.evaluate())
    }
}

/// One slot of the postfix opcode stream:
/// `FEATURE=1`, `NOT=2`, `AND=3`, `OR=0`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    Or = 0b00,
    Feature = 0b01,
    Not = 0b10,
    And = 0b11,
}

impl Opcode {
    fn from_bits(bits: u8) -> Opcode {
        match bits {
            0b00 => Opcode::Or,
            0b01 => Opcode::Feature,
            0b10 => Opcode::Not,
            0b11 => Opcode::And,
            _ => unreachable!("2-bit value out of range"),
        }
    }
}

/// A packed stream of 2-bit opcodes, one byte holding four slots.
///
/// This is the "byte vector indexed by pairs with bitwise masking" form
/// a compact, cache-friendly representation — there's no need for a tree AST
/// once the expression has been reduced to postfix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Opcodes {
    bits: Vec<u8>,
    len: usize,
}

impl Opcodes {
    fn new() -> Opcodes {
        Opcodes::default()
    }

    fn push(&mut self, op: Opcode) {
        let byte_idx = self.len / 4;
        let shift = (self.len % 4) * 2;
        if byte_idx == self.bits.len() {
            self.bits.push(0);
        }
        self.bits[byte_idx] |= (op as u8) << shift;
        self.len += 1;
    }

    fn get(&self, idx: usize) -> Opcode {
        let byte_idx = idx / 4;
        let shift = (idx % 4) * 2;
        Opcode::from_bits((self.bits[byte_idx] >> shift) & 0b11)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A compiled `if-feature` expression: a postfix opcode stream plus the
/// ordered list of feature references the `FEATURE` opcodes consume.
#[derive(Clone, Debug, Default)]
pub struct IfFeatureExpr {
    features: Vec<Rc<Feature>>,
    ops: Opcodes,
}

impl IfFeatureExpr {
    /// Recursively (iteratively, in this implementation — see the note in
    /// short-circuiting a flat postfix stream)
    /// consumes the postfix opcode stream and returns its boolean value.
    pub fn evaluate(&self) -> bool {
        if self.ops.is_empty() {
            return true;
        }
        let mut stack: Vec<bool> = Vec::with_capacity(self.ops.len());
        let mut next_feature = self.features.iter();
        for i in 0..self.ops.len() {
            match self.ops.get(i) {
                Opcode::Feature => {
                    let f = next_feature
                        .next()
                        .expect("opcode stream references more features than were compiled");
                    stack.push(f.enabled.get());
                }
                Opcode::Not => {
                    let v = stack.pop().expect("postfix stream malformed: NOT underflow");
                    stack.push(!v);
                }
                Opcode::And => {
                    let b = stack.pop().expect("postfix stream malformed: AND underflow");
                    let a = stack.pop().expect("postfix stream malformed: AND underflow");
                    stack.push(a && b);
                }
                Opcode::Or => {
                    let b = stack.pop().expect("postfix stream malformed: OR underflow");
                    let a = stack.pop().expect("postfix stream malformed: OR underflow");
                    stack.push(a || b);
                }
            }
        }
        debug_assert_eq!(stack.len(), 1);
        stack.pop().unwrap_or(true)
    }

    pub fn features(&self) -> &[Rc<Feature>] {
        &self.features
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Tok {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Ident,
}

fn tokenize(expr: &str) -> Vec<(Tok, &str)> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    fn flush<'a>(expr: &'a str, word_start: &mut Option<usize>, end: usize, tokens: &mut Vec<(Tok, &'a str)>) {
        if let Some(start) = word_start.take() {
            let word = &expr[start..end];
            let tok = match word {
                "not" => Tok::Not,
                "and" => Tok::And,
                "or" => Tok::Or,
                _ => Tok::Ident,
            };
            tokens.push((tok, word));
        }
    }

    for (i, c) in expr.char_indices() {
        match c {
            '(' | ')' | ' ' | '\t' | '\n' | '\r' => {
                flush(expr, &mut word_start, i, &mut tokens);
                match c {
                    '(' => tokens.push((Tok::LParen, "(")),
                    ')' => tokens.push((Tok::RParen, ")")),
                    _ => {}
                }
            }
            _ => {
                if word_start.is_none() {
                    word_start = Some(i);
                }
            }
        }
    }
    flush(expr, &mut word_start, expr.len(), &mut tokens);
    tokens
}

fn precedence(tok: Tok) -> u8 {
    match tok {
        Tok::Not => 3,
        Tok::And => 2,
        Tok::Or => 1,
        _ => 0,
    }
}

enum PToken<'a> {
    Ident(&'a str),
    Op(Tok),
}

/// Compiles a textual `if-feature` expression into postfix form.
///
/// `lookup` resolves a (possibly prefixed) feature name against the
/// current module's own features or, for a prefixed name, against an
/// imported module's features (§4.B "Feature lookup"). `yang_version_11`
/// gates the YANG 1.1-only constructs (parentheses, boolean operators).
pub fn compile_if_feature<F>(expr: &str, yang_version_11: bool, mut lookup: F) -> Result<IfFeatureExpr>
where
    F: FnMut(&str) -> Result<Rc<Feature>>,
{
    let tokens = tokenize(expr);
    if tokens.is_empty() {
        return Err(Error::syntax(
            "if-feature-empty",
            "if-feature expression is empty",
        ));
    }

    let mut has_parens = false;
    let mut ident_count = 0;
    for (tok, _) in &tokens {
        match tok {
            Tok::LParen | Tok::RParen => has_parens = true,
            Tok::Ident => ident_count += 1,
            _ => {}
        }
    }
    if (has_parens || ident_count > 1) && !yang_version_11 {
        return Err(Error::syntax(
            "if-feature-requires-1.1",
            "if-feature expressions with operators or parentheses require YANG 1.1",
        ));
    }

    let mut output: Vec<PToken<'_>> = Vec::with_capacity(tokens.len());
    let mut opstack: Vec<Tok> = Vec::new();
    let mut depth = 0i32;

    for (tok, text) in &tokens {
        match tok {
            Tok::Ident => output.push(PToken::Ident(text)),
            Tok::Not => opstack.push(Tok::Not),
            Tok::And | Tok::Or => {
                let prec = precedence(*tok);
                while let Some(&top) = opstack.last() {
                    if top == Tok::LParen {
                        break;
                    }
                    if precedence(top) >= prec {
                        output.push(PToken::Op(opstack.pop().unwrap()));
                    } else {
                        break;
                    }
                }
                opstack.push(*tok);
            }
            Tok::LParen => {
                depth += 1;
                opstack.push(Tok::LParen);
            }
            Tok::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err(Error::syntax(
                        "if-feature-unbalanced-parens",
                        "unbalanced parentheses in if-feature expression",
                    ));
                }
                loop {
                    match opstack.pop() {
                        Some(Tok::LParen) => break,
                        Some(top) => output.push(PToken::Op(top)),
                        None => {
                            return Err(Error::syntax(
                                "if-feature-unbalanced-parens",
                                "unbalanced parentheses in if-feature expression",
                            ))
                        }
                    }
                }
            }
        }
    }
    if depth != 0 {
        return Err(Error::syntax(
            "if-feature-unbalanced-parens",
            "unbalanced parentheses in if-feature expression",
        ));
    }
    while let Some(top) = opstack.pop() {
        if top == Tok::LParen {
            return Err(Error::syntax(
                "if-feature-unbalanced-parens",
                "unbalanced parentheses in if-feature expression",
            ));
        }
        output.push(PToken::Op(top));
    }

    let mut features = Vec::new();
    let mut ops = Opcodes::new();
    let mut stack_depth = 0i32;
    for p in output {
        match p {
            PToken::Ident(name) => {
                let feature = lookup(name)?;
                features.push(feature);
                ops.push(Opcode::Feature);
                stack_depth += 1;
            }
            PToken::Op(Tok::Not) => {
                if stack_depth < 1 {
                    return Err(Error::syntax(
                        "if-feature-malformed",
                        "not enough operands for 'not' in if-feature expression",
                    ));
                }
                ops.push(Opcode::Not);
            }
            PToken::Op(Tok::And) => {
                if stack_depth < 2 {
                    return Err(Error::syntax(
                        "if-feature-malformed",
                        "not enough operands for 'and' in if-feature expression",
                    ));
                }
                ops.push(Opcode::And);
                stack_depth -= 1;
            }
            PToken::Op(Tok::Or) => {
                if stack_depth < 2 {
                    return Err(Error::syntax(
                        "if-feature-malformed",
                        "not enough operands for 'or' in if-feature expression",
                    ));
                }
                ops.push(Opcode::Or);
                stack_depth -= 1;
            }
            PToken::Op(_) => unreachable!("parens never reach the emit pass"),
        }
    }
    if stack_depth != 1 {
        return Err(Error::syntax(
            "if-feature-malformed",
            "if-feature expression does not reduce to a single value",
        ));
    }

    // Record this expression against every feature it references, so that
    // `change()` can walk dependents for cascading disablement.
    Ok(IfFeatureExpr { features, ops })
}

/// Registers `expr` as a dependent expression of every feature it
/// references. Call once after `compile_if_feature` succeeds and the
/// expression has found its permanent home on a `Feature`.
pub fn register_dependent(expr: &IfFeatureExpr, dependent: &Rc<Feature>) {
    for f in &expr.features {
        f.dependents.borrow_mut().push(Rc::downgrade(dependent));
    }
}

/// Implements `change(module, name, value)` (§4.B) over a flat list of a
/// single module's features (cross-module features referenced only via
/// `if-feature` are resolved through `Rc` sharing, so disabling them here
/// is visible everywhere they're referenced).
pub fn change(features: &[Rc<Feature>], name: &str, value: bool) -> Result<()> {
    if name == "*" {
        change_all(features, value)
    } else {
        let feature = features
            .iter()
            .find(|f| f.name.as_str() == name)
            .ok_or_else(|| Error::not_found("feature-not-found", format!("feature '{name}' not found")))?;
        change_one(feature, value)
    }
}

fn change_one(feature: &Rc<Feature>, value: bool) -> Result<()> {
    if feature.enabled.get() == value {
        return Ok(());
    }
    if value && !feature.if_features_satisfied() {
        return Err(Error::denied(
            "feature-if-feature-conflict",
            format!("feature '{}' cannot be enabled: if-feature conditions not met", feature.name),
        ));
    }
    feature.enabled.set(value);
    if value {
        crate::logging::feature_enabled(&feature.name);
    } else {
        crate::logging::feature_disabled(&feature.name);
    }
    cascade_from(feature);
    Ok(())
}

fn change_all(features: &[Rc<Feature>], value: bool) -> Result<()> {
    if !value {
        for f in features {
            f.enabled.set(false);
        }
        return Ok(());
    }

    let snapshot: Vec<bool> = features.iter().map(|f| f.enabled.get()).collect();

    let mut progressed = true;
    while progressed {
        progressed = false;
        for f in features {
            if !f.enabled.get() && f.if_features_satisfied() {
                f.enabled.set(true);
                progressed = true;
            }
        }
    }

    let failures: Vec<&str> = features
        .iter()
        .filter(|f| !f.enabled.get())
        .map(|f| f.name.as_str())
        .collect();
    if !failures.is_empty() {
        crate::logging::feature_enable_all_rolled_back(&failures.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        for (f, prev) in features.iter().zip(snapshot.iter()) {
            f.enabled.set(*prev);
        }
        return Err(Error::denied(
            "feature-if-feature-conflict",
            format!("features could not be enabled: {}", failures.join(", ")),
        ));
    }

    Ok(())
}

/// Cascades a disable/enable through `feature`'s dependents: any dependent
/// currently enabled whose `if-feature` now evaluates false is disabled.
/// No dependent is ever auto-enabled by this walk.
fn cascade_from(feature: &Rc<Feature>) {
    let mut queue: Vec<Rc<Feature>> = feature
        .dependents
        .borrow()
        .iter()
        .filter_map(Weak::upgrade)
        .collect();

    while let Some(dependent) = queue.pop() {
        if dependent.enabled.get() && !dependent.if_features_satisfied() {
            dependent.enabled.set(false);
            crate::logging::feature_cascade_disabled(&dependent.name, &feature.name);
            queue.extend(dependent.dependents.borrow().iter().filter_map(Weak::upgrade));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn istr(s: &str) -> IStr {
        crate::dict::Dictionary::new().intern(s)
    }

    fn make_features(names: &[&str]) -> Vec<Rc<Feature>> {
        names.iter().map(|n| Feature::new(istr(n))).collect()
    }

    #[test]
    fn postfix_evaluates_boolean_semantics() {
        let feats = make_features(&["a", "b", "c"]);
        let lookup = |name: &str| -> Result<Rc<Feature>> {
            feats
                .iter()
                .find(|f| f.name.as_str() == name)
                .cloned()
                .ok_or_else(|| Error::not_found("x", "missing"))
        };
        let expr = compile_if_feature("a and (b or not c)", true, lookup).unwrap();
        feats[0].enabled.set(true);
        feats[1].enabled.set(false);
        feats[2].enabled.set(false);
        assert!(expr.evaluate());

        feats[2].enabled.set(true);
        assert!(!expr.evaluate());
    }

    #[test]
    fn yang_10_rejects_operators() {
        let feats = make_features(&["a", "b"]);
        // `and` + two idents requires 1.1.
        let result = compile_if_feature("a and b", false, |name| {
            feats
                .iter()
                .find(|f| f.name.as_str() == name)
                .cloned()
                .ok_or_else(|| Error::not_found("x", "missing"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn single_feature_10_is_fine() {
        let feats = make_features(&["a"]);
        let expr = compile_if_feature("a", false, |name| {
            feats
                .iter()
                .find(|f| f.name.as_str() == name)
                .cloned()
                .ok_or_else(|| Error::not_found("x", "missing"))
        })
        .unwrap();
        feats[0].enabled.set(true);
        assert!(expr.evaluate());
    }

    #[test]
    fn cascade_disables_dependents_without_auto_enable() {
        // x (no if-feature), y if-feature x, z if-feature y.
        let x = Feature::new(istr("x"));
        let y = Feature::new(istr("y"));
        let z = Feature::new(istr("z"));
        let all = vec![x.clone(), y.clone(), z.clone()];

        let expr_y = compile_if_feature("x", true, |name| {
            all.iter().find(|f| f.name.as_str() == name).cloned().ok_or_else(|| Error::not_found("x", "missing"))
        })
        .unwrap();
        register_dependent(&expr_y, &y);
        y.if_features.borrow_mut().push(expr_y);

        let expr_z = compile_if_feature("y", true, |name| {
            all.iter().find(|f| f.name.as_str() == name).cloned().ok_or_else(|| Error::not_found("x", "missing"))
        })
        .unwrap();
        register_dependent(&expr_z, &z);
        z.if_features.borrow_mut().push(expr_z);

        assert!(x.enabled.get() && y.enabled.get() && z.enabled.get());

        change(&all, "x", false).unwrap();
        assert!(!x.enabled.get());
        assert!(!y.enabled.get());
        assert!(!z.enabled.get());

        change(&all, "x", true).unwrap();
        assert!(x.enabled.get());
        assert!(!y.enabled.get(), "no dependent is ever auto-enabled");
        assert!(!z.enabled.get());
    }
}
