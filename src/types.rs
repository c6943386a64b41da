//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Component C: the type-derivation compiler.
//!
//! Walks a `type` statement's typedef chain down to a YANG builtin
//! basetype, merging each level's restrictions (`range`, `length`,
//! `pattern`, `enum`, `bits`, ...) into a single [`CompiledType`]. Per the
//! resolved design rule: a derived step that adds no
//! restriction of its own returns the parent's `CompiledType` unchanged
//! (an `Rc` clone — an alias); a step that narrows anything allocates a
//! fresh `CompiledType`, sharing unrelated restriction data (e.g.
//! `patterns`) by `Rc` rather than deep-copying it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::dict::IStr;
use crate::error::{Error, Result};
use crate::identity::{Identity, Status};
use crate::parsed::{ParsedEnum, ParsedBit, ParsedType, ParsedTypedef};
use crate::pattern::{self, CompiledPattern};

/// The nineteen YANG builtin types (RFC 7950 §4.2.4), plus `leafref` kept
/// distinct from `instance-identifier` since their restriction shapes
/// differ (`path`/`require-instance` vs. `require-instance` alone).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BaseType {
    Binary,
    Bits,
    Boolean,
    Decimal64,
    Empty,
    Enumeration,
    IdentityRef,
    InstanceIdentifier,
    Int8,
    Int16,
    Int32,
    Int64,
    Leafref,
    String,
    Union,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl BaseType {
    pub fn from_builtin_name(name: &str) -> Option<BaseType> {
        Some(match name {
            "binary" => BaseType::Binary,
            "bits" => BaseType::Bits,
            "boolean" => BaseType::Boolean,
            "decimal64" => BaseType::Decimal64,
            "empty" => BaseType::Empty,
            "enumeration" => BaseType::Enumeration,
            "identityref" => BaseType::IdentityRef,
            "instance-identifier" => BaseType::InstanceIdentifier,
            "int8" => BaseType::Int8,
            "int16" => BaseType::Int16,
            "int32" => BaseType::Int32,
            "int64" => BaseType::Int64,
            "leafref" => BaseType::Leafref,
            "string" => BaseType::String,
            "union" => BaseType::Union,
            "uint8" => BaseType::UInt8,
            "uint16" => BaseType::UInt16,
            "uint32" => BaseType::UInt32,
            "uint64" => BaseType::UInt64,
            _ => return None,
        })
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            BaseType::Int8
                | BaseType::Int16
                | BaseType::Int32
                | BaseType::Int64
                | BaseType::UInt8
                | BaseType::UInt16
                | BaseType::UInt32
                | BaseType::UInt64
                | BaseType::Decimal64
        )
    }

    /// The basetype's own natural bounds, expressed as a scaled i128 (the
    /// scale factor for `decimal64` is `10^fraction_digits`; integer types
    /// ignore `fraction_digits`).
    fn natural_range(self, fraction_digits: Option<u8>) -> Option<RangeConstraint> {
        let (lower, upper) = match self {
            BaseType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            BaseType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            BaseType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            BaseType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            BaseType::UInt8 => (0, u8::MAX as i128),
            BaseType::UInt16 => (0, u16::MAX as i128),
            BaseType::UInt32 => (0, u32::MAX as i128),
            BaseType::UInt64 => (0, u64::MAX as i128),
            // decimal64's value space is a 64-bit scaled integer; the
            // scale (10^fraction-digits) only affects how a decimal
            // literal's text is parsed into that integer, not the bound.
            BaseType::Decimal64 => {
                let _ = fraction_digits;
                (i64::MIN as i128, i64::MAX as i128)
            }
            _ => return None,
        };
        Some(RangeConstraint {
            parts: vec![RangePart { lower, upper }],
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RangePart {
    pub lower: i128,
    pub upper: i128,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeConstraint {
    pub parts: Vec<RangePart>,
}

impl RangeConstraint {
    fn overall_bounds(&self) -> (i128, i128) {
        (
            self.parts.first().map(|p| p.lower).unwrap_or(i128::MIN),
            self.parts.last().map(|p| p.upper).unwrap_or(i128::MAX),
        )
    }

    /// Whether every part of `self` is covered, without gaps, by `parent`.
    fn is_subset_of(&self, parent: &RangeConstraint) -> bool {
        self.parts.iter().all(|part| covers(&parent.parts, part.lower, part.upper))
    }

    pub fn contains(&self, value: i128) -> bool {
        self.parts.iter().any(|p| value >= p.lower && value <= p.upper)
    }
}

fn covers(parent: &[RangePart], lo: i128, hi: i128) -> bool {
    let mut cur = lo;
    for part in parent {
        if part.upper < cur {
            continue;
        }
        if part.lower > cur {
            return false;
        }
        cur = part.upper.saturating_add(1);
        if cur > hi {
            return true;
        }
    }
    false
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LengthPart {
    pub lower: u64,
    pub upper: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LengthConstraint {
    pub parts: Vec<LengthPart>,
}

impl LengthConstraint {
    fn overall_bounds(&self) -> (u64, u64) {
        (
            self.parts.first().map(|p| p.lower).unwrap_or(0),
            self.parts.last().map(|p| p.upper).unwrap_or(u64::MAX),
        )
    }

    fn is_subset_of(&self, parent: &LengthConstraint) -> bool {
        self.parts.iter().all(|part| covers_u64(&parent.parts, part.lower, part.upper))
    }

    pub fn contains(&self, value: u64) -> bool {
        self.parts.iter().any(|p| value >= p.lower && value <= p.upper)
    }
}

fn covers_u64(parent: &[LengthPart], lo: u64, hi: u64) -> bool {
    let mut cur = lo;
    for part in parent {
        if part.upper < cur {
            continue;
        }
        if part.lower > cur {
            return false;
        }
        cur = part.upper.saturating_add(1);
        if cur > hi {
            return true;
        }
    }
    false
}

#[derive(Clone, Debug)]
pub struct EnumItem {
    pub name: IStr,
    pub value: i64,
}

#[derive(Clone, Debug)]
pub struct BitItem {
    pub name: IStr,
    pub position: u32,
}

/// A fully compiled type: either a fresh allocation (this chain step added
/// a restriction) or an `Rc` alias of an earlier, unmodified step.
#[derive(Debug)]
pub struct CompiledType {
    pub name: IStr,
    pub base: BaseType,
    pub range: Option<RangeConstraint>,
    pub length: Option<LengthConstraint>,
    pub patterns: Vec<Rc<CompiledPattern>>,
    pub enums: Vec<EnumItem>,
    pub bits: Vec<BitItem>,
    pub fraction_digits: Option<u8>,
    pub path: Option<String>,
    pub require_instance: bool,
    pub bases: Vec<Rc<Identity>>,
    pub members: Vec<Rc<CompiledType>>,
}

/// Callbacks the compiler needs to resolve names outside the `ParsedType`
/// it was handed: typedefs (possibly in another, already-compiled module)
/// and, for `identityref`, identities.
pub trait TypeContext {
    fn resolve_typedef(&mut self, name: &str) -> Result<Rc<ParsedTypedef>>;
    fn resolve_identity(&mut self, name: &str) -> Result<Rc<Identity>>;
    /// Resolves and fully compiles a `prefix:name` typedef reference that
    /// crosses into an imported module, checking `referencing_status`
    /// against that typedef's own status before walking the rest of its
    /// chain (which may cross yet another module boundary).
    fn resolve_foreign_typedef(&mut self, name: &str, referencing_status: Status) -> Result<Rc<CompiledType>>;
}

/// RFC 7950 §10.3.9: a `current` definition must not reference a
/// `deprecated` or `obsolete` one, and a `deprecated` definition must not
/// reference an `obsolete` one.
pub(crate) fn check_status_reference(referencing: Status, referenced: Status, name: &str) -> Result<()> {
    let incompatible = matches!(
        (referencing, referenced),
        (Status::Current, Status::Deprecated) | (Status::Current, Status::Obsolete) | (Status::Deprecated, Status::Obsolete)
    );
    if incompatible {
        return Err(Error::semantic(
            "status-incompatible-reference",
            format!("a {referencing:?} definition cannot reference {referenced:?} typedef '{name}'"),
        ));
    }
    Ok(())
}

/// Chain-compiles `parsed` into a `CompiledType`, memoizing by typedef
/// name so that two leafs using the same typedef share one allocation
/// (the common, unmodified case) and only typedef uses that add their own
/// restrictions pay for a fresh allocation. `referencing_status` is the
/// status of whatever (leaf, typedef, union member) is naming `parsed`,
/// checked against each typedef hop's own status as the chain is walked.
pub fn compile_type(
    parsed: &ParsedType,
    referencing_status: Status,
    ctx: &mut dyn TypeContext,
    cache: &mut HashMap<String, Rc<CompiledType>>,
) -> Result<Rc<CompiledType>> {
    if let Some(base) = BaseType::from_builtin_name(&parsed.name) {
        return compile_builtin(parsed, base, referencing_status, ctx, cache);
    }

    if parsed.name.contains(':') {
        let base = ctx.resolve_foreign_typedef(&parsed.name, referencing_status)?;
        return apply_restrictions_if_any(parsed, &base, ctx);
    }

    let typedef = ctx.resolve_typedef(&parsed.name)?;
    check_status_reference(referencing_status, typedef.status, &parsed.name)?;

    if let Some(cached) = cache.get(&parsed.name) {
        let base = Rc::clone(cached);
        return apply_restrictions_if_any(parsed, &base, ctx);
    }

    let base = compile_type(&typedef.type_, typedef.status, ctx, cache)?;
    cache.insert(parsed.name.clone(), Rc::clone(&base));
    apply_restrictions_if_any(parsed, &base, ctx)
}

fn compile_builtin(
    parsed: &ParsedType,
    base: BaseType,
    referencing_status: Status,
    ctx: &mut dyn TypeContext,
    cache: &mut HashMap<String, Rc<CompiledType>>,
) -> Result<Rc<CompiledType>> {
    let fraction_digits = parsed.fraction_digits;
    let mut compiled = CompiledType {
        name: istr(&parsed.name),
        base,
        range: base.natural_range(fraction_digits),
        length: match base {
            BaseType::String | BaseType::Binary => Some(LengthConstraint {
                parts: vec![LengthPart { lower: 0, upper: u64::MAX }],
            }),
            _ => None,
        },
        patterns: Vec::new(),
        enums: Vec::new(),
        bits: Vec::new(),
        fraction_digits,
        path: parsed.path.clone(),
        require_instance: parsed.require_instance.unwrap_or(base == BaseType::InstanceIdentifier),
        bases: Vec::new(),
        members: Vec::new(),
    };

    if base.is_numeric() {
        if let Some(range_text) = &parsed.range {
            let parent = compiled.range.clone().expect("numeric basetype always has a natural range");
            let digits = (base == BaseType::Decimal64).then_some(fraction_digits.unwrap_or(2));
            let resolved = parse_range(&range_text.text, parent.overall_bounds(), digits)?;
            if !resolved.is_subset_of(&parent) {
                return Err(Error::semantic(
                    "range-not-subset",
                    format!("range '{}' is not a subset of the basetype's range", range_text.text),
                ));
            }
            compiled.range = Some(resolved);
        }
    }

    if matches!(base, BaseType::String | BaseType::Binary) {
        if let Some(length_text) = &parsed.length {
            let parent = compiled.length.clone().expect("string/binary basetype always has a natural length");
            let resolved = parse_length(&length_text.text, parent.overall_bounds())?;
            if !resolved.is_subset_of(&parent) {
                return Err(Error::semantic(
                    "length-not-subset",
                    format!("length '{}' is not a subset of the basetype's length", length_text.text),
                ));
            }
            compiled.length = Some(resolved);
        }
        if base == BaseType::String {
            for p in &parsed.patterns {
                compiled.patterns.push(Rc::new(pattern::compile_pattern(&p.text, p.inverted)?));
            }
        }
    }

    if base == BaseType::Enumeration {
        compiled.enums = compile_enums_fresh(&parsed.enums)?;
        if compiled.enums.is_empty() {
            return Err(Error::semantic("enumeration-empty", "enumeration type must define at least one enum"));
        }
    }

    if base == BaseType::Bits {
        compiled.bits = compile_bits_fresh(&parsed.bits)?;
        if compiled.bits.is_empty() {
            return Err(Error::semantic("bits-empty", "bits type must define at least one bit"));
        }
    }

    if base == BaseType::IdentityRef {
        for name in &parsed.bases {
            compiled.bases.push(ctx.resolve_identity(name)?);
        }
        if compiled.bases.is_empty() {
            return Err(Error::semantic("identityref-no-base", "identityref must name at least one base identity"));
        }
    }

    if base == BaseType::Union {
        for member in &parsed.members {
            compiled.members.push(compile_type(member, referencing_status, ctx, cache)?);
        }
        if compiled.members.is_empty() {
            return Err(Error::semantic("union-no-members", "union type must list at least one member type"));
        }
    }

    Ok(Rc::new(compiled))
}

fn apply_restrictions_if_any(
    parsed: &ParsedType,
    base: &Rc<CompiledType>,
    ctx: &mut dyn TypeContext,
) -> Result<Rc<CompiledType>> {
    let adds_restriction = parsed.range.is_some()
        || parsed.length.is_some()
        || !parsed.patterns.is_empty()
        || !parsed.enums.is_empty()
        || !parsed.bits.is_empty()
        || parsed.path.is_some()
        || parsed.require_instance.is_some()
        || !parsed.bases.is_empty()
        || !parsed.members.is_empty();

    if !adds_restriction {
        crate::logging::type_aliased(&parsed.name);
        return Ok(Rc::clone(base));
    }
    crate::logging::type_narrowed(&parsed.name);

    let mut compiled = CompiledType {
        name: istr(&parsed.name),
        base: base.base,
        range: base.range.clone(),
        length: base.length.clone(),
        patterns: base.patterns.clone(),
        enums: base.enums.clone(),
        bits: base.bits.clone(),
        fraction_digits: base.fraction_digits,
        path: base.path.clone(),
        require_instance: base.require_instance,
        bases: base.bases.clone(),
        members: base.members.clone(),
    };

    if let Some(range_text) = &parsed.range {
        let parent = compiled
            .range
            .clone()
            .ok_or_else(|| Error::semantic("range-on-non-numeric", "range restriction on a non-numeric type"))?;
        let digits = (compiled.base == BaseType::Decimal64).then_some(compiled.fraction_digits.unwrap_or(2));
        let resolved = parse_range(&range_text.text, parent.overall_bounds(), digits)?;
        if !resolved.is_subset_of(&parent) {
            return Err(Error::semantic(
                "range-not-subset",
                format!("range '{}' does not narrow the base type's range", range_text.text),
            ));
        }
        compiled.range = Some(resolved);
    }

    if let Some(length_text) = &parsed.length {
        let parent = compiled
            .length
            .clone()
            .ok_or_else(|| Error::semantic("length-on-non-string", "length restriction on a non-string/binary type"))?;
        let resolved = parse_length(&length_text.text, parent.overall_bounds())?;
        if !resolved.is_subset_of(&parent) {
            return Err(Error::semantic(
                "length-not-subset",
                format!("length '{}' does not narrow the base type's length", length_text.text),
            ));
        }
        compiled.length = Some(resolved);
    }

    for p in &parsed.patterns {
        compiled.patterns.push(Rc::new(pattern::compile_pattern(&p.text, p.inverted)?));
    }

    if !parsed.enums.is_empty() {
        compiled.enums = compile_enums_restricted(&parsed.enums, &base.enums)?;
    }

    if !parsed.bits.is_empty() {
        compiled.bits = compile_bits_restricted(&parsed.bits, &base.bits)?;
    }

    if let Some(path) = &parsed.path {
        compiled.path = Some(path.clone());
    }
    if let Some(require_instance) = parsed.require_instance {
        compiled.require_instance = require_instance;
    }

    for name in &parsed.bases {
        compiled.bases.push(ctx.resolve_identity(name)?);
    }

    Ok(Rc::new(compiled))
}

/// Compiles a fresh (non-restricting) `enum` list. Explicit values must be
/// unique within the type; an implicit value continues from the previous
/// one (explicit or implicit) plus one and must not run past `int32`'s
/// range (RFC 7950 §9.6.4.2).
fn compile_enums_fresh(parsed: &[ParsedEnum]) -> Result<Vec<EnumItem>> {
    let mut out: Vec<EnumItem> = Vec::with_capacity(parsed.len());
    let mut next_auto: i64 = 0;
    for e in parsed {
        if out.iter().any(|i| i.name.as_str() == e.name) {
            return Err(Error::semantic("enum-duplicate-name", format!("enum '{}' is defined more than once", e.name)));
        }
        let value = match e.value {
            Some(v) => v,
            None => {
                if next_auto > i32::MAX as i64 {
                    return Err(Error::semantic(
                        "enum-value-overflow",
                        format!("auto-assigned value for enum '{}' exceeds int32 range", e.name),
                    ));
                }
                next_auto
            }
        };
        if value < i32::MIN as i64 || value > i32::MAX as i64 {
            return Err(Error::semantic("enum-value-out-of-range", format!("enum '{}' value {value} is outside int32 range", e.name)));
        }
        if out.iter().any(|i| i.value == value) {
            return Err(Error::semantic(
                "enum-duplicate-value",
                format!("enum '{}' reuses value {value} already assigned to another enum", e.name),
            ));
        }
        next_auto = value.saturating_add(1);
        out.push(EnumItem { name: istr(&e.name), value });
    }
    Ok(out)
}

fn compile_enums_restricted(parsed: &[ParsedEnum], base: &[EnumItem]) -> Result<Vec<EnumItem>> {
    let mut out: Vec<EnumItem> = Vec::with_capacity(parsed.len());
    for e in parsed {
        if out.iter().any(|i| i.name.as_str() == e.name) {
            return Err(Error::semantic("enum-duplicate-name", format!("enum '{}' is defined more than once", e.name)));
        }
        let found = base
            .iter()
            .find(|b| b.name.as_str() == e.name)
            .ok_or_else(|| Error::semantic("enum-not-in-base", format!("enum '{}' is not defined in the base type", e.name)))?;
        if let Some(v) = e.value {
            if v != found.value {
                return Err(Error::semantic(
                    "enum-value-mismatch",
                    format!("enum '{}' cannot change its assigned value when restricting", e.name),
                ));
            }
        }
        out.push(found.clone());
    }
    Ok(out)
}

/// Compiles a fresh (non-restricting) `bit` list. Same uniqueness and
/// overflow rules as enums, over `uint32`'s range instead of `int32`'s.
fn compile_bits_fresh(parsed: &[ParsedBit]) -> Result<Vec<BitItem>> {
    let mut out: Vec<BitItem> = Vec::with_capacity(parsed.len());
    let mut next_auto: u64 = 0;
    for b in parsed {
        if out.iter().any(|i| i.name.as_str() == b.name) {
            return Err(Error::semantic("bit-duplicate-name", format!("bit '{}' is defined more than once", b.name)));
        }
        let position = match b.position {
            Some(p) => p,
            None => {
                if next_auto > u32::MAX as u64 {
                    return Err(Error::semantic(
                        "bit-position-overflow",
                        format!("auto-assigned position for bit '{}' exceeds uint32 range", b.name),
                    ));
                }
                next_auto as u32
            }
        };
        if out.iter().any(|i| i.position == position) {
            return Err(Error::semantic(
                "bit-duplicate-position",
                format!("bit '{}' reuses position {position} already assigned to another bit", b.name),
            ));
        }
        next_auto = position as u64 + 1;
        out.push(BitItem { name: istr(&b.name), position });
    }
    Ok(out)
}

fn compile_bits_restricted(parsed: &[ParsedBit], base: &[BitItem]) -> Result<Vec<BitItem>> {
    let mut out: Vec<BitItem> = Vec::with_capacity(parsed.len());
    for b in parsed {
        if out.iter().any(|i| i.name.as_str() == b.name) {
            return Err(Error::semantic("bit-duplicate-name", format!("bit '{}' is defined more than once", b.name)));
        }
        let found = base
            .iter()
            .find(|x| x.name.as_str() == b.name)
            .ok_or_else(|| Error::semantic("bit-not-in-base", format!("bit '{}' is not defined in the base type", b.name)))?;
        if let Some(p) = b.position {
            if p != found.position {
                return Err(Error::semantic(
                    "bit-position-mismatch",
                    format!("bit '{}' cannot change its assigned position when restricting", b.name),
                ));
            }
        }
        out.push(found.clone());
    }
    Ok(out)
}

/// Interns a name for diagnostics purposes only, without a `Dictionary`
/// reference at hand; `CompiledType::name` is used for error messages and
/// schema re-emission, not for pointer-identity comparisons, so a private
/// single-string `Rc<str>` is enough here.
fn istr(s: &str) -> IStr {
    crate::dict::Dictionary::new().intern(s)
}

fn parse_number(text: &str) -> Result<i128> {
    text.trim()
        .parse::<i128>()
        .map_err(|_| Error::syntax("range-invalid-number", format!("'{text}' is not a valid integer")))
}

/// Parses a `range` statement argument: `part (" | " part)*`, `part = value
/// | value ".." value`, `value = "min" | "max" | integer`. `fraction_digits`
/// is `Some` only for `decimal64`, where bound literals are decimal text
/// (`"1.5"`) scaled into the type's raw 64-bit integer representation.
fn parse_range(text: &str, parent_bounds: (i128, i128), fraction_digits: Option<u8>) -> Result<RangeConstraint> {
    let mut parts = Vec::new();
    for part in text.split('|') {
        let part = part.trim();
        if part.is_empty() {
            return Err(Error::syntax("range-empty-part", "empty range part"));
        }
        let (lower, upper) = if let Some((lo, hi)) = part.split_once("..") {
            (
                parse_range_bound(lo.trim(), parent_bounds, fraction_digits)?,
                parse_range_bound(hi.trim(), parent_bounds, fraction_digits)?,
            )
        } else {
            let v = parse_range_bound(part, parent_bounds, fraction_digits)?;
            (v, v)
        };
        if lower > upper {
            return Err(Error::syntax("range-inverted-part", format!("range part '{part}' has lower bound greater than upper bound")));
        }
        parts.push(RangePart { lower, upper });
    }
    parts.sort_by_key(|p| p.lower);
    for w in parts.windows(2) {
        if w[1].lower <= w[0].upper {
            return Err(Error::syntax("range-overlapping-parts", "range parts must be disjoint and ascending"));
        }
    }
    Ok(RangeConstraint { parts })
}

fn parse_range_bound(text: &str, parent_bounds: (i128, i128), fraction_digits: Option<u8>) -> Result<i128> {
    match text {
        "min" => Ok(parent_bounds.0),
        "max" => Ok(parent_bounds.1),
        _ => match fraction_digits {
            Some(digits) => parse_decimal_literal(text, digits),
            None => parse_number(text),
        },
    }
}

/// Parses a decimal64 literal (`["-"] int ["." frac]`) into its raw scaled
/// integer form, i.e. `value * 10^fraction_digits`.
fn parse_decimal_literal(text: &str, fraction_digits: u8) -> Result<i128> {
    let invalid = || Error::syntax("decimal-invalid", format!("'{text}' is not a valid decimal64 value"));
    let text = text.trim();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = rest.split_once('.').unwrap_or((rest, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if frac_part.len() > fraction_digits as usize {
        return Err(Error::syntax(
            "decimal-too-many-fraction-digits",
            format!("'{text}' has more fraction digits than fraction-digits allows"),
        ));
    }
    let int_val: i128 = if int_part.is_empty() { 0 } else { int_part.parse().map_err(|_| invalid())? };
    let frac_val: i128 = if frac_part.is_empty() { 0 } else { frac_part.parse().map_err(|_| invalid())? };
    let pad = fraction_digits as u32 - frac_part.len() as u32;
    let scale = 10i128.pow(fraction_digits as u32);
    let magnitude = int_val * scale + frac_val * 10i128.pow(pad);
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parses a `length` statement argument, same grammar as `range` but over
/// non-negative integers.
fn parse_length(text: &str, parent_bounds: (u64, u64)) -> Result<LengthConstraint> {
    let mut parts = Vec::new();
    for part in text.split('|') {
        let part = part.trim();
        if part.is_empty() {
            return Err(Error::syntax("length-empty-part", "empty length part"));
        }
        let (lower, upper) = if let Some((lo, hi)) = part.split_once("..") {
            (parse_length_bound(lo.trim(), parent_bounds)?, parse_length_bound(hi.trim(), parent_bounds)?)
        } else {
            let v = parse_length_bound(part, parent_bounds)?;
            (v, v)
        };
        if lower > upper {
            return Err(Error::syntax("length-inverted-part", format!("length part '{part}' has lower bound greater than upper bound")));
        }
        parts.push(LengthPart { lower, upper });
    }
    parts.sort_by_key(|p| p.lower);
    for w in parts.windows(2) {
        if w[1].lower <= w[0].upper {
            return Err(Error::syntax("length-overlapping-parts", "length parts must be disjoint and ascending"));
        }
    }
    Ok(LengthConstraint { parts })
}

fn parse_length_bound(text: &str, parent_bounds: (u64, u64)) -> Result<u64> {
    match text {
        "min" => Ok(parent_bounds.0),
        "max" => Ok(parent_bounds.1),
        _ => text.trim().parse::<u64>().map_err(|_| Error::syntax("length-invalid-number", format!("'{text}' is not a valid non-negative integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_subset_check_detects_gap() {
        let parent = RangeConstraint { parts: vec![RangePart { lower: 1, upper: 100 }] };
        let child = parse_range("10..20", parent.overall_bounds(), None).unwrap();
        assert!(child.is_subset_of(&parent));

        // 200 is a literal value, so parsing succeeds, but it widens past
        // the parent's actual upper bound of 100.
        let widening = parse_range("1..200", parent.overall_bounds(), None).unwrap();
        assert!(!widening.is_subset_of(&parent));
    }

    #[test]
    fn min_max_keywords_resolve_against_parent() {
        let parent = RangeConstraint { parts: vec![RangePart { lower: -128, upper: 127 } ] };
        let child = parse_range("min..0", parent.overall_bounds(), None).unwrap();
        assert_eq!(child.parts[0].lower, -128);
        assert!(child.is_subset_of(&parent));
    }

    #[test]
    fn enum_restriction_rejects_unknown_name() {
        let base = vec![EnumItem { name: istr("up"), value: 0 }, EnumItem { name: istr("down"), value: 1 }];
        let restricted = vec![ParsedEnum { name: "sideways".into(), value: None }];
        let result = compile_enums_restricted(&restricted, &base);
        assert!(result.is_err());
    }

    #[test]
    fn enum_restriction_rejects_value_change() {
        let base = vec![EnumItem { name: istr("up"), value: 0 }];
        let restricted = vec![ParsedEnum { name: "up".into(), value: Some(5) }];
        let result = compile_enums_restricted(&restricted, &base);
        assert!(result.is_err());
    }

    #[test]
    fn enum_restriction_keeps_inherited_value() {
        let base = vec![EnumItem { name: istr("up"), value: 0 }, EnumItem { name: istr("down"), value: 1 }];
        let restricted = vec![ParsedEnum { name: "down".into(), value: None }];
        let out = compile_enums_restricted(&restricted, &base).unwrap();
        assert_eq!(out[0].value, 1);
    }

    #[test]
    fn fresh_enum_rejects_duplicate_name() {
        let parsed = vec![ParsedEnum { name: "up".into(), value: None }, ParsedEnum { name: "up".into(), value: None }];
        let err = compile_enums_fresh(&parsed).unwrap_err();
        assert_eq!(err.code, "enum-duplicate-name");
    }

    #[test]
    fn fresh_enum_rejects_duplicate_value() {
        let parsed = vec![ParsedEnum { name: "up".into(), value: Some(0) }, ParsedEnum { name: "down".into(), value: Some(0) }];
        let err = compile_enums_fresh(&parsed).unwrap_err();
        assert_eq!(err.code, "enum-duplicate-value");
    }

    #[test]
    fn fresh_enum_rejects_auto_assign_overflow() {
        let parsed = vec![
            ParsedEnum { name: "top".into(), value: Some(i32::MAX as i64) },
            ParsedEnum { name: "overflow".into(), value: None },
        ];
        let err = compile_enums_fresh(&parsed).unwrap_err();
        assert_eq!(err.code, "enum-value-overflow");
    }

    #[test]
    fn fresh_enum_auto_assigns_sequentially() {
        let parsed = vec![ParsedEnum { name: "a".into(), value: None }, ParsedEnum { name: "b".into(), value: None }];
        let out = compile_enums_fresh(&parsed).unwrap();
        assert_eq!(out[0].value, 0);
        assert_eq!(out[1].value, 1);
    }

    #[test]
    fn fresh_bits_rejects_duplicate_position() {
        let parsed = vec![ParsedBit { name: "a".into(), position: Some(1) }, ParsedBit { name: "b".into(), position: Some(1) }];
        let err = compile_bits_fresh(&parsed).unwrap_err();
        assert_eq!(err.code, "bit-duplicate-position");
    }

    #[test]
    fn fresh_bits_rejects_auto_assign_overflow() {
        let parsed = vec![ParsedBit { name: "top".into(), position: Some(u32::MAX) }, ParsedBit { name: "overflow".into(), position: None }];
        let err = compile_bits_fresh(&parsed).unwrap_err();
        assert_eq!(err.code, "bit-position-overflow");
    }

    #[test]
    fn status_reference_rejects_current_referencing_deprecated() {
        let err = check_status_reference(Status::Current, Status::Deprecated, "old_typedef").unwrap_err();
        assert_eq!(err.code, "status-incompatible-reference");
    }

    #[test]
    fn status_reference_allows_deprecated_referencing_deprecated() {
        assert!(check_status_reference(Status::Deprecated, Status::Deprecated, "old_typedef").is_ok());
    }

    #[test]
    fn status_reference_rejects_deprecated_referencing_obsolete() {
        let err = check_status_reference(Status::Deprecated, Status::Obsolete, "gone_typedef").unwrap_err();
        assert_eq!(err.code, "status-incompatible-reference");
    }
}
