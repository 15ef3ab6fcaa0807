//! ABI type system.
//!
//! The ABI type universe is closed, so both the type descriptor
//! ([`AbiType`]) and the value carrier ([`AbiValue`]) are plain enums and
//! the codec is a `match` over them.

use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EncodeError;

/// An Ethereum ABI type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AbiType {
    Bool,
    /// Unsigned integer, width in bits (8..=256, multiple of 8).
    Uint(u16),
    /// Signed integer, width in bits (8..=256, multiple of 8).
    Int(u16),
    /// 20-byte account address.
    Address,
    /// `bytes1` .. `bytes32`. Length in bytes.
    FixedBytes(u8),
    /// Variable-length byte string.
    Bytes,
    /// UTF-8 string.
    String,
    /// `T[len]`
    FixedArray(Box<AbiType>, usize),
    /// `T[]`
    Array(Box<AbiType>),
    /// `(T1,T2,...)`
    Tuple(Vec<AbiType>),
}

impl AbiType {
    /// `uintN`, validating the width.
    pub fn uint(bits: u16) -> Result<Self, EncodeError> {
        check_int_width(bits)?;
        Ok(Self::Uint(bits))
    }

    /// `intN`, validating the width.
    pub fn int(bits: u16) -> Result<Self, EncodeError> {
        check_int_width(bits)?;
        Ok(Self::Int(bits))
    }

    /// `bytesN`, validating the length.
    pub fn fixed_bytes(len: u8) -> Result<Self, EncodeError> {
        if !(1..=32).contains(&len) {
            return Err(EncodeError::InvalidType(format!("bytes{len}")));
        }
        Ok(Self::FixedBytes(len))
    }

    /// `T[len]`, validating the element type.
    pub fn fixed_array(elem: AbiType, len: usize) -> Result<Self, EncodeError> {
        let ty = Self::FixedArray(Box::new(elem), len);
        ty.validate()?;
        Ok(ty)
    }

    /// `T[]`, validating the element type.
    pub fn array(elem: AbiType) -> Result<Self, EncodeError> {
        let ty = Self::Array(Box::new(elem));
        ty.validate()?;
        Ok(ty)
    }

    /// `(T1,...)`, validating every member.
    pub fn tuple(members: Vec<AbiType>) -> Result<Self, EncodeError> {
        let ty = Self::Tuple(members);
        ty.validate()?;
        Ok(ty)
    }

    /// Check widths and lengths recursively.
    ///
    /// The enum variants are public, so a hand-built type may be invalid;
    /// the codec calls this before trusting a type.
    pub fn validate(&self) -> Result<(), EncodeError> {
        match self {
            Self::Uint(bits) | Self::Int(bits) => check_int_width(*bits),
            Self::FixedBytes(len) if !(1..=32).contains(len) => {
                Err(EncodeError::InvalidType(format!("bytes{len}")))
            }
            Self::FixedArray(_, 0) => Err(EncodeError::InvalidType(self.to_string())),
            Self::FixedArray(elem, _) | Self::Array(elem) => elem.validate(),
            Self::Tuple(members) => members.iter().try_for_each(AbiType::validate),
            _ => Ok(()),
        }
    }

    /// `true` for `bytes`, `string`, `T[]` and any composite holding one of them.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(elem, _) => elem.is_dynamic(),
            Self::Tuple(members) => members.iter().any(AbiType::is_dynamic),
            _ => false,
        }
    }

    /// Elementary single-word types (the ones an indexed topic stores verbatim).
    pub fn is_word(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Uint(_) | Self::Int(_) | Self::Address | Self::FixedBytes(_)
        )
    }

    /// Number of bytes this type occupies in the head of a sequence.
    /// Dynamic types occupy one offset word.
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            Self::FixedArray(elem, len) => elem.head_size().saturating_mul(*len),
            Self::Tuple(members) => members
                .iter()
                .map(AbiType::head_size)
                .fold(0, usize::saturating_add),
            _ => 32,
        }
    }
}

fn check_int_width(bits: u16) -> Result<(), EncodeError> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(EncodeError::InvalidType(format!("integer width {bits}")));
    }
    Ok(())
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Address => write!(f, "address"),
            Self::FixedBytes(n) => write!(f, "bytes{n}"),
            Self::Bytes => write!(f, "bytes"),
            Self::String => write!(f, "string"),
            Self::FixedArray(elem, len) => write!(f, "{elem}[{len}]"),
            Self::Array(elem) => write!(f, "{elem}[]"),
            Self::Tuple(members) => {
                let parts: Vec<_> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

impl FromStr for AbiType {
    type Err = EncodeError;

    /// Parse a Solidity type spelling. Accepts the `uint`/`int`/`byte`
    /// aliases and normalizes them to their canonical form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || EncodeError::InvalidType(s.to_string());

        if s.ends_with(']') {
            let open = s.rfind('[').ok_or_else(invalid)?;
            let elem: AbiType = s[..open].parse()?;
            let size = &s[open + 1..s.len() - 1];
            let ty = if size.is_empty() {
                AbiType::Array(Box::new(elem))
            } else {
                let len = size.trim().parse::<usize>().map_err(|_| invalid())?;
                AbiType::FixedArray(Box::new(elem), len)
            };
            ty.validate()?;
            return Ok(ty);
        }

        if let Some(inner) = s.strip_prefix('(') {
            let inner = inner.strip_suffix(')').ok_or_else(invalid)?;
            let members = split_top_level(inner)
                .map_err(|_| invalid())?
                .into_iter()
                .map(str::parse)
                .collect::<Result<Vec<AbiType>, _>>()?;
            return Ok(AbiType::Tuple(members));
        }

        let ty = match s {
            "bool" => AbiType::Bool,
            "address" => AbiType::Address,
            "string" => AbiType::String,
            "bytes" => AbiType::Bytes,
            "uint" => AbiType::Uint(256),
            "int" => AbiType::Int(256),
            "byte" => AbiType::FixedBytes(1),
            _ => {
                if let Some(bits) = s.strip_prefix("uint") {
                    AbiType::Uint(bits.parse().map_err(|_| invalid())?)
                } else if let Some(bits) = s.strip_prefix("int") {
                    AbiType::Int(bits.parse().map_err(|_| invalid())?)
                } else if let Some(len) = s.strip_prefix("bytes") {
                    AbiType::FixedBytes(len.parse().map_err(|_| invalid())?)
                } else {
                    return Err(invalid());
                }
            }
        };
        ty.validate()?;
        Ok(ty)
    }
}

impl TryFrom<String> for AbiType {
    type Error = EncodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AbiType> for String {
    fn from(ty: AbiType) -> Self {
        ty.to_string()
    }
}

/// Split a comma-separated list at nesting depth zero.
///
/// `"uint256,(bool,bytes),address[]"` → `["uint256", "(bool,bytes)", "address[]"]`.
/// An empty (or all-whitespace) input yields an empty list.
pub(crate) fn split_top_level(s: &str) -> Result<Vec<&str>, ()> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(());
                }
            }
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(());
    }
    parts.push(s[start..].trim());
    if parts.iter().any(|p| p.is_empty()) {
        return Err(());
    }
    Ok(parts)
}

// ─── Values ───────────────────────────────────────────────────────────────────

/// A concrete ABI value.
///
/// Integers carry the bit width they were created or decoded with; the codec
/// checks the value against the *declared* [`AbiType`], not this tag, and
/// decoding tags with the declared width. The tag is therefore ignored by
/// equality: `Uint(1000, 64) == Uint(1000, 256)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AbiValue {
    Bool(bool),
    Uint(U256, u16),
    Int(I256, u16),
    Address(Address),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    FixedArray(Vec<AbiValue>),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl PartialEq for AbiValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Uint(a, _), Self::Uint(b, _)) => a == b,
            (Self::Int(a, _), Self::Int(b, _)) => a == b,
            (Self::Address(a), Self::Address(b)) => a == b,
            (Self::FixedBytes(a), Self::FixedBytes(b)) | (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::FixedArray(a), Self::FixedArray(b))
            | (Self::Array(a), Self::Array(b))
            | (Self::Tuple(a), Self::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AbiValue {}

impl AbiValue {
    /// `uint256` value from any unsigned primitive; full-width values go
    /// through `AbiValue::from(U256)`.
    pub fn uint256(v: impl Into<u128>) -> Self {
        Self::Uint(U256::from(v.into()), 256)
    }

    /// `int256` value.
    pub fn int256(v: I256) -> Self {
        Self::Int(v, 256)
    }

    /// `bytesN` value; the length is checked against the declared type at
    /// encode time.
    pub fn fixed_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::FixedBytes(bytes.as_ref().to_vec())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Uint(..) => "uint",
            Self::Int(..) => "int",
            Self::Address(_) => "address",
            Self::FixedBytes(_) => "fixed bytes",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::FixedArray(_) => "fixed array",
            Self::Array(_) => "array",
            Self::Tuple(_) => "tuple",
        }
    }

    /// Validate this value against a declared type: variant, integer range,
    /// byte length and element counts, recursively.
    pub fn type_check(&self, ty: &AbiType) -> Result<(), EncodeError> {
        match (self, ty) {
            (Self::Bool(_), AbiType::Bool)
            | (Self::Address(_), AbiType::Address)
            | (Self::Bytes(_), AbiType::Bytes)
            | (Self::String(_), AbiType::String) => Ok(()),

            (Self::Uint(v, _), AbiType::Uint(bits)) => {
                if uint_fits(v, *bits) {
                    Ok(())
                } else {
                    Err(EncodeError::IntegerOverflow {
                        ty: ty.to_string(),
                        value: v.to_string(),
                    })
                }
            }

            (Self::Int(v, _), AbiType::Int(bits)) => {
                if int_fits(v, *bits) {
                    Ok(())
                } else {
                    Err(EncodeError::IntegerOverflow {
                        ty: ty.to_string(),
                        value: v.to_string(),
                    })
                }
            }

            (Self::FixedBytes(b), AbiType::FixedBytes(n)) => {
                if b.len() == *n as usize {
                    Ok(())
                } else {
                    Err(EncodeError::InvalidLength {
                        ty: ty.to_string(),
                        expected: *n as usize,
                        got: b.len(),
                    })
                }
            }

            (Self::FixedArray(elems), AbiType::FixedArray(elem_ty, len)) => {
                if elems.len() != *len {
                    return Err(EncodeError::InvalidLength {
                        ty: ty.to_string(),
                        expected: *len,
                        got: elems.len(),
                    });
                }
                elems.iter().try_for_each(|e| e.type_check(elem_ty))
            }

            (Self::Array(elems), AbiType::Array(elem_ty)) => {
                elems.iter().try_for_each(|e| e.type_check(elem_ty))
            }

            (Self::Tuple(members), AbiType::Tuple(types)) => {
                if members.len() != types.len() {
                    return Err(EncodeError::InvalidLength {
                        ty: ty.to_string(),
                        expected: types.len(),
                        got: members.len(),
                    });
                }
                members
                    .iter()
                    .zip(types)
                    .try_for_each(|(m, t)| m.type_check(t))
            }

            _ => Err(EncodeError::TypeMismatch {
                expected: ty.to_string(),
                got: self.kind().to_string(),
            }),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Self::Uint(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i256(&self) -> Option<I256> {
        match self {
            Self::Int(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Bytes of a `bytes` or `bytesN` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) | Self::FixedBytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Members of an array, fixed array or tuple.
    pub fn as_slice(&self) -> Option<&[AbiValue]> {
        match self {
            Self::Array(v) | Self::FixedArray(v) | Self::Tuple(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

pub(crate) fn uint_fits(v: &U256, bits: u16) -> bool {
    v.bit_len() <= bits as usize
}

pub(crate) fn int_fits(v: &I256, bits: u16) -> bool {
    if bits >= 256 {
        return true;
    }
    // A value fits in `bits` when every bit above the sign bit equals the sign.
    let raw = v.into_raw();
    let magnitude = if v.is_negative() { !raw } else { raw };
    (magnitude >> (bits as usize - 1)).is_zero()
}

/// Two's-complement conversion that cannot fail for any `i128`.
pub(crate) fn i256_from_i128(x: i128) -> I256 {
    let abs = U256::from(x.unsigned_abs());
    if x < 0 {
        I256::from_raw(U256::ZERO.wrapping_sub(abs))
    } else {
        I256::from_raw(abs)
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty => $bits:expr),*) => {
        $(impl From<$t> for AbiValue {
            fn from(v: $t) -> Self {
                Self::Uint(U256::from(v), $bits)
            }
        })*
    };
}

macro_rules! impl_from_signed {
    ($($t:ty => $bits:expr),*) => {
        $(impl From<$t> for AbiValue {
            fn from(v: $t) -> Self {
                Self::Int(i256_from_i128(v as i128), $bits)
            }
        })*
    };
}

impl_from_unsigned!(u8 => 8, u16 => 16, u32 => 32, u64 => 64, u128 => 128);
impl_from_signed!(i8 => 8, i16 => 16, i32 => 32, i64 => 64, i128 => 128);

impl From<U256> for AbiValue {
    fn from(v: U256) -> Self {
        Self::Uint(v, 256)
    }
}

impl From<I256> for AbiValue {
    fn from(v: I256) -> Self {
        Self::Int(v, 256)
    }
}

impl From<bool> for AbiValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Address> for AbiValue {
    fn from(v: Address) -> Self {
        Self::Address(v)
    }
}

impl From<B256> for AbiValue {
    fn from(v: B256) -> Self {
        Self::FixedBytes(v.to_vec())
    }
}

impl From<Vec<u8>> for AbiValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&str> for AbiValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AbiValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Uint(v, _) => write!(f, "{v}"),
            Self::Int(v, _) => write!(f, "{v}"),
            Self::Address(a) => write!(f, "{}", a.to_checksum(None)),
            Self::FixedBytes(b) | Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::FixedArray(v) | Self::Array(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Tuple(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_display() {
        assert_eq!(AbiType::Uint(256).to_string(), "uint256");
        assert_eq!(
            AbiType::Array(Box::new(AbiType::Address)).to_string(),
            "address[]"
        );
        assert_eq!(
            AbiType::Tuple(vec![AbiType::Bool, AbiType::Bytes]).to_string(),
            "(bool,bytes)"
        );
    }

    #[test]
    fn parse_aliases_normalize() {
        assert_eq!("uint".parse::<AbiType>().unwrap(), AbiType::Uint(256));
        assert_eq!("int".parse::<AbiType>().unwrap(), AbiType::Int(256));
        assert_eq!("byte".parse::<AbiType>().unwrap(), AbiType::FixedBytes(1));
    }

    #[test]
    fn parse_nested() {
        let ty: AbiType = "(uint256[],bool)[2]".parse().unwrap();
        assert_eq!(
            ty,
            AbiType::FixedArray(
                Box::new(AbiType::Tuple(vec![
                    AbiType::Array(Box::new(AbiType::Uint(256))),
                    AbiType::Bool,
                ])),
                2
            )
        );
        assert_eq!(ty.to_string(), "(uint256[],bool)[2]");
        assert!(ty.is_dynamic());
    }

    #[test]
    fn parse_rejects_bad_widths() {
        assert!("uint7".parse::<AbiType>().is_err());
        assert!("uint264".parse::<AbiType>().is_err());
        assert!("bytes33".parse::<AbiType>().is_err());
        assert!("bytes0".parse::<AbiType>().is_err());
        assert!("address[0]".parse::<AbiType>().is_err());
        assert!("(uint256,".parse::<AbiType>().is_err());
    }

    #[test]
    fn static_classification() {
        assert!(!AbiType::FixedArray(Box::new(AbiType::Uint(8)), 3).is_dynamic());
        assert!(AbiType::FixedArray(Box::new(AbiType::String), 3).is_dynamic());
        assert!(AbiType::Tuple(vec![AbiType::Address, AbiType::Bytes]).is_dynamic());
        assert_eq!(
            AbiType::Tuple(vec![AbiType::Address, AbiType::FixedBytes(4)]).head_size(),
            64
        );
        assert_eq!(AbiType::FixedArray(Box::new(AbiType::Bool), 3).head_size(), 96);
    }

    #[test]
    fn type_check_integer_ranges() {
        assert!(AbiValue::from(255u64).type_check(&AbiType::Uint(8)).is_ok());
        assert!(matches!(
            AbiValue::from(256u64).type_check(&AbiType::Uint(8)),
            Err(EncodeError::IntegerOverflow { .. })
        ));
        assert!(AbiValue::from(-128i64).type_check(&AbiType::Int(8)).is_ok());
        assert!(AbiValue::from(127i64).type_check(&AbiType::Int(8)).is_ok());
        assert!(AbiValue::from(-129i64).type_check(&AbiType::Int(8)).is_err());
        assert!(AbiValue::from(128i64).type_check(&AbiType::Int(8)).is_err());
    }

    #[test]
    fn type_check_fixed_bytes_length() {
        let err = AbiValue::fixed_bytes([1u8; 3])
            .type_check(&AbiType::FixedBytes(4))
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidLength {
                ty: "bytes4".into(),
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn type_check_variant_mismatch() {
        let err = AbiValue::Bool(true).type_check(&AbiType::Address).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { .. }));
    }

    #[test]
    fn abi_type_serde_as_string() {
        let ty: AbiType = "address[2]".parse().unwrap();
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, "\"address[2]\"");
        let back: AbiType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
    }
}
