//! Function and event signatures.
//!
//! Signatures are immutable once built; the selector (functions) and topic
//! (events) are derived from the canonical string at construction and
//! cached on the value.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AbiError;
use crate::selector::{canonical_signature, selector_of, topic_of};
use crate::types::{split_top_level, AbiType};

/// A named (or unnamed) function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: AbiType,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: AbiType) -> Self {
        let name = name.into();
        Self {
            name: (!name.is_empty()).then_some(name),
            ty,
        }
    }

    pub fn unnamed(ty: AbiType) -> Self {
        Self { name: None, ty }
    }
}

/// An event parameter; `indexed` params live in topics rather than data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: AbiType,
    pub indexed: bool,
}

impl EventParam {
    pub fn new(name: impl Into<String>, ty: AbiType, indexed: bool) -> Self {
        let name = name.into();
        Self {
            name: (!name.is_empty()).then_some(name),
            ty,
            indexed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    NonPayable,
    Payable,
}

impl StateMutability {
    /// `view` and `pure` functions are served by `eth_call` alone.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }
}

// ─── FunctionSignature ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    name: String,
    inputs: Vec<Param>,
    outputs: Vec<Param>,
    state_mutability: StateMutability,
    canonical: String,
    selector: [u8; 4],
}

impl FunctionSignature {
    /// A non-payable function with unnamed inputs and no outputs.
    pub fn new(name: impl Into<String>, inputs: Vec<AbiType>) -> Result<Self, AbiError> {
        Self::from_params(
            name,
            inputs.into_iter().map(Param::unnamed).collect(),
            Vec::new(),
            StateMutability::NonPayable,
        )
    }

    pub fn from_params(
        name: impl Into<String>,
        inputs: Vec<Param>,
        outputs: Vec<Param>,
        state_mutability: StateMutability,
    ) -> Result<Self, AbiError> {
        let name = name.into();
        check_identifier(&name, &name)?;
        for p in inputs.iter().chain(&outputs) {
            p.ty.validate().map_err(|e| AbiError::InvalidSignature {
                signature: name.clone(),
                reason: e.to_string(),
            })?;
        }
        let types: Vec<AbiType> = inputs.iter().map(|p| p.ty.clone()).collect();
        let canonical = canonical_signature(&name, &types);
        let selector = selector_of(&canonical);
        Ok(Self {
            name,
            inputs,
            outputs,
            state_mutability,
            canonical,
            selector,
        })
    }

    /// Replace the declared outputs. The selector does not depend on them.
    pub fn with_outputs(mut self, outputs: Vec<AbiType>) -> Result<Self, AbiError> {
        for ty in &outputs {
            ty.validate().map_err(|e| AbiError::InvalidSignature {
                signature: self.canonical.clone(),
                reason: e.to_string(),
            })?;
        }
        self.outputs = outputs.into_iter().map(Param::unnamed).collect();
        Ok(self)
    }

    pub fn with_state_mutability(mut self, state_mutability: StateMutability) -> Self {
        self.state_mutability = state_mutability;
        self
    }

    /// Parse a human-readable declaration:
    ///
    /// ```text
    /// balanceOf(address owner) view returns (uint256)
    /// function transfer(address to, uint256 amount) returns (bool)
    /// ```
    pub fn parse(decl: &str) -> Result<Self, AbiError> {
        let s = decl.trim();
        let s = s.strip_prefix("function ").unwrap_or(s).trim();
        let (name, params, rest) = split_declaration(decl, s)?;
        let inputs = parse_params(decl, params)?
            .into_iter()
            .map(|(name, ty, indexed)| {
                if indexed {
                    Err(invalid(decl, "`indexed` is only valid on event params"))
                } else {
                    Ok(Param { name, ty })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut state_mutability = StateMutability::NonPayable;
        let mut outputs = Vec::new();
        let mut rest = rest.trim();
        while !rest.is_empty() {
            let (word, tail) = rest.split_at(rest.find(['(', ' ']).unwrap_or(rest.len()));
            match word {
                "view" => state_mutability = StateMutability::View,
                "pure" => state_mutability = StateMutability::Pure,
                "payable" => state_mutability = StateMutability::Payable,
                "nonpayable" | "external" | "public" => {}
                "returns" => {
                    let tail = tail.trim_start();
                    let close = matching_paren(tail)
                        .ok_or_else(|| invalid(decl, "unbalanced `returns` list"))?;
                    outputs = parse_params(decl, &tail[1..close])?
                        .into_iter()
                        .map(|(name, ty, _)| Param { name, ty })
                        .collect();
                    rest = tail[close + 1..].trim();
                    continue;
                }
                other => return Err(invalid(decl, &format!("unexpected `{other}`"))),
            }
            rest = tail.trim();
        }

        Self::from_params(name, inputs, outputs, state_mutability)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Param] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Param] {
        &self.outputs
    }

    pub fn input_types(&self) -> Vec<AbiType> {
        self.inputs.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn output_types(&self) -> Vec<AbiType> {
        self.outputs.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn state_mutability(&self) -> StateMutability {
        self.state_mutability
    }

    /// `name(t1,t2,...)`
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn selector(&self) -> [u8; 4] {
        self.selector
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

// ─── EventSignature ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    name: String,
    params: Vec<EventParam>,
    anonymous: bool,
    canonical: String,
    topic: B256,
}

impl EventSignature {
    /// Unnamed params given as `(type, indexed)` pairs.
    pub fn new(name: impl Into<String>, params: Vec<(AbiType, bool)>) -> Result<Self, AbiError> {
        Self::from_params(
            name,
            params
                .into_iter()
                .map(|(ty, indexed)| EventParam {
                    name: None,
                    ty,
                    indexed,
                })
                .collect(),
            false,
        )
    }

    pub fn from_params(
        name: impl Into<String>,
        params: Vec<EventParam>,
        anonymous: bool,
    ) -> Result<Self, AbiError> {
        let name = name.into();
        check_identifier(&name, &name)?;
        for p in &params {
            p.ty.validate().map_err(|e| AbiError::InvalidSignature {
                signature: name.clone(),
                reason: e.to_string(),
            })?;
        }
        // topics[0] is taken by the signature unless the event is anonymous.
        let max_indexed = if anonymous { 4 } else { 3 };
        let indexed = params.iter().filter(|p| p.indexed).count();
        if indexed > max_indexed {
            return Err(AbiError::InvalidSignature {
                signature: name,
                reason: format!("{indexed} indexed params, at most {max_indexed} allowed"),
            });
        }
        let types: Vec<AbiType> = params.iter().map(|p| p.ty.clone()).collect();
        let canonical = canonical_signature(&name, &types);
        let topic = topic_of(&canonical);
        Ok(Self {
            name,
            params,
            anonymous,
            canonical,
            topic,
        })
    }

    /// Parse a human-readable declaration:
    ///
    /// ```text
    /// Transfer(address indexed from, address indexed to, uint256 value)
    /// event Upgraded(address indexed implementation)
    /// Ping(uint256) anonymous
    /// ```
    pub fn parse(decl: &str) -> Result<Self, AbiError> {
        let s = decl.trim();
        let s = s.strip_prefix("event ").unwrap_or(s).trim();
        let (name, params, rest) = split_declaration(decl, s)?;
        let params = parse_params(decl, params)?
            .into_iter()
            .map(|(name, ty, indexed)| EventParam { name, ty, indexed })
            .collect();
        let anonymous = match rest.trim() {
            "" => false,
            "anonymous" => true,
            other => return Err(invalid(decl, &format!("unexpected `{other}`"))),
        };
        Self::from_params(name, params, anonymous)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[EventParam] {
        &self.params
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Number of topics a matching log carries.
    pub fn topic_count(&self) -> usize {
        let indexed = self.params.iter().filter(|p| p.indexed).count();
        if self.anonymous {
            indexed
        } else {
            indexed + 1
        }
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn topic(&self) -> B256 {
        self.topic
    }
}

impl fmt::Display for EventSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

// ─── Parsing helpers ──────────────────────────────────────────────────────────

fn invalid(decl: &str, reason: &str) -> AbiError {
    AbiError::InvalidSignature {
        signature: decl.trim().to_string(),
        reason: reason.to_string(),
    }
}

fn check_identifier(decl: &str, name: &str) -> Result<(), AbiError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(invalid(decl, &format!("invalid identifier `{name}`")));
    }
    Ok(())
}

/// Index of the `)` matching the `(` at position 0.
fn matching_paren(s: &str) -> Option<usize> {
    if !s.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `name(params) rest` → `(name, params, rest)`.
fn split_declaration<'a>(decl: &str, s: &'a str) -> Result<(&'a str, &'a str, &'a str), AbiError> {
    let open = s.find('(').ok_or_else(|| invalid(decl, "missing parameter list"))?;
    let name = s[..open].trim();
    check_identifier(decl, name)?;
    let close = matching_paren(&s[open..])
        .map(|c| c + open)
        .ok_or_else(|| invalid(decl, "unbalanced parentheses"))?;
    Ok((name, &s[open + 1..close], &s[close + 1..]))
}

/// Parse `type [indexed] [location] [name], ...`.
fn parse_params(decl: &str, list: &str) -> Result<Vec<(Option<String>, AbiType, bool)>, AbiError> {
    let parts = split_top_level(list).map_err(|_| invalid(decl, "malformed parameter list"))?;
    parts.into_iter().map(|part| parse_param(decl, part)).collect()
}

fn parse_param(decl: &str, part: &str) -> Result<(Option<String>, AbiType, bool), AbiError> {
    let (ty_text, rest) = split_type(part);
    let ty = parse_type(decl, ty_text)?;
    let mut indexed = false;
    let mut name = None;
    for word in rest.split_whitespace() {
        match word {
            "indexed" => indexed = true,
            "memory" | "calldata" | "storage" => {}
            _ if name.is_none() => {
                check_identifier(decl, word)?;
                name = Some(word.to_string());
            }
            _ => return Err(invalid(decl, &format!("unexpected `{word}` in `{part}`"))),
        }
    }
    Ok((name, ty, indexed))
}

/// Split a parameter into its type spelling and the words after it. Tuple
/// types may contain spaces inside their parentheses.
fn split_type(part: &str) -> (&str, &str) {
    let part = part.trim();
    let mut depth = 0i32;
    for (i, c) in part.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => return (&part[..i], &part[i..]),
            _ => {}
        }
    }
    (part, "")
}

/// Type spelling, allowing `tuple(...)` and named tuple components.
fn parse_type(decl: &str, text: &str) -> Result<AbiType, AbiError> {
    let text = text.strip_prefix("tuple").unwrap_or(text);
    if text.starts_with('(') {
        let close = matching_paren(text).ok_or_else(|| invalid(decl, "unbalanced tuple"))?;
        let members: Vec<String> = parse_params(decl, &text[1..close])?
            .into_iter()
            .map(|(_, ty, _)| ty.to_string())
            .collect();
        let canonical = format!("({}){}", members.join(","), &text[close + 1..]);
        return canonical
            .parse()
            .map_err(|e: crate::error::EncodeError| invalid(decl, &e.to_string()));
    }
    text.parse()
        .map_err(|e: crate::error::EncodeError| invalid(decl, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_selector_from_types() {
        let sig = FunctionSignature::new("transfer", vec![AbiType::Address, AbiType::Uint(256)])
            .unwrap();
        assert_eq!(sig.canonical(), "transfer(address,uint256)");
        assert_eq!(sig.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn parse_function_with_names_and_returns() {
        let sig = FunctionSignature::parse("balanceOf(address owner) view returns (uint256)")
            .unwrap();
        assert_eq!(sig.name(), "balanceOf");
        assert_eq!(sig.inputs()[0].name.as_deref(), Some("owner"));
        assert_eq!(sig.output_types(), vec![AbiType::Uint(256)]);
        assert_eq!(sig.state_mutability(), StateMutability::View);
        assert_eq!(sig.canonical(), "balanceOf(address)");
    }

    #[test]
    fn parse_function_keyword_and_aliases() {
        let sig = FunctionSignature::parse("function approve(address spender, uint value) returns (bool)")
            .unwrap();
        assert_eq!(sig.canonical(), "approve(address,uint256)");
        assert_eq!(sig.state_mutability(), StateMutability::NonPayable);
    }

    #[test]
    fn parse_function_with_named_tuple() {
        let sig = FunctionSignature::parse("submit((uint256 id, bytes data)[] orders, bytes memory sig)")
            .unwrap();
        assert_eq!(sig.canonical(), "submit((uint256,bytes)[],bytes)");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(FunctionSignature::parse("transfer(address").is_err());
        assert!(FunctionSignature::parse("1bad(uint256)").is_err());
        assert!(FunctionSignature::parse("f(uint7)").is_err());
        assert!(FunctionSignature::parse("f(uint256) frobnicate").is_err());
        assert!(FunctionSignature::parse("f(uint256 indexed a)").is_err());
    }

    #[test]
    fn parse_event_with_indexed() {
        let sig = EventSignature::parse(
            "Transfer(address indexed from, address indexed to, uint256 value)",
        )
        .unwrap();
        assert_eq!(sig.canonical(), "Transfer(address,address,uint256)");
        assert_eq!(
            format!("{:x}", sig.topic()),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert!(sig.params()[0].indexed);
        assert!(!sig.params()[2].indexed);
        assert_eq!(sig.topic_count(), 3);
    }

    #[test]
    fn parse_anonymous_event() {
        let sig = EventSignature::parse("event Ping(uint256 indexed n) anonymous").unwrap();
        assert!(sig.is_anonymous());
        assert_eq!(sig.topic_count(), 1);
    }

    #[test]
    fn too_many_indexed_params() {
        let params = vec![(AbiType::Uint(256), true); 4];
        assert!(EventSignature::new("E", params.clone()).is_err());
        let anon = params
            .into_iter()
            .map(|(ty, indexed)| EventParam { name: None, ty, indexed })
            .collect();
        assert!(EventSignature::from_params("E", anon, true).is_ok());
    }

    #[test]
    fn outputs_do_not_change_selector() {
        let a = FunctionSignature::new("totalSupply", vec![]).unwrap();
        let b = a.clone().with_outputs(vec![AbiType::Uint(256)]).unwrap();
        assert_eq!(a.selector(), b.selector());
        assert_eq!(b.outputs().len(), 1);
    }
}
