//! The ABI codec.
//!
//! Wire format summary:
//! - every element occupies whole 32-byte words;
//! - integers, addresses and bools are right-aligned big-endian, signed
//!   integers are sign-extended, `bytesN` is left-aligned;
//! - a sequence (arguments, tuple members, array elements) is a *head* of one
//!   slot per element followed by a *tail*; dynamic elements put a byte offset
//!   into the head (relative to the start of the head) and their contents
//!   into the tail;
//! - `bytes`, `string` and `T[]` start with a length word.
//!
//! [`encode`] / [`decode`] work on a single value. For a dynamic type they
//! produce / consume the tail representation (what an offset points at), so
//! `encode` of a 33-byte `bytes` is three words: length, then two data words.

use alloy_primitives::{Address, I256, U256};

use crate::error::{DecodeError, EncodeError};
use crate::types::{int_fits, uint_fits, AbiType, AbiValue};

const WORD: usize = 32;

/// Round `len` up to a whole number of words.
fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

fn push_usize(out: &mut Vec<u8>, n: usize) {
    out.extend_from_slice(&U256::from(n).to_be_bytes::<32>());
}

fn push_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded_len(bytes.len()) - bytes.len(), 0);
}

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// Encode a single value against its declared type.
///
/// The value is validated first; an out-of-range integer or a wrong byte
/// length is an error, never a truncation.
pub fn encode(value: &AbiValue, ty: &AbiType) -> Result<Vec<u8>, EncodeError> {
    ty.validate()?;
    value.type_check(ty)?;
    let mut out = Vec::new();
    encode_into(value, ty, &mut out)?;
    Ok(out)
}

/// Encode a list of values as a head/tail sequence, i.e. the layout of
/// function arguments, return values and event data.
pub fn encode_params(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, EncodeError> {
    if values.len() != types.len() {
        return Err(EncodeError::ArgumentCount {
            expected: types.len(),
            got: values.len(),
        });
    }
    for (value, ty) in values.iter().zip(types) {
        ty.validate()?;
        value.type_check(ty)?;
    }
    let items: Vec<_> = values.iter().zip(types).collect();
    let mut out = Vec::new();
    encode_sequence(&items, &mut out)?;
    Ok(out)
}

fn encode_into(value: &AbiValue, ty: &AbiType, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match (value, ty) {
        (AbiValue::Bool(b), AbiType::Bool) => {
            let mut word = [0u8; WORD];
            word[31] = u8::from(*b);
            out.extend_from_slice(&word);
        }
        (AbiValue::Uint(v, _), AbiType::Uint(_)) => {
            out.extend_from_slice(&v.to_be_bytes::<32>());
        }
        (AbiValue::Int(v, _), AbiType::Int(_)) => {
            // Two's complement of the 256-bit value is already sign-extended.
            out.extend_from_slice(&v.into_raw().to_be_bytes::<32>());
        }
        (AbiValue::Address(a), AbiType::Address) => {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(a.as_slice());
        }
        (AbiValue::FixedBytes(b), AbiType::FixedBytes(_)) => push_padded(out, b),
        (AbiValue::Bytes(b), AbiType::Bytes) => {
            push_usize(out, b.len());
            push_padded(out, b);
        }
        (AbiValue::String(s), AbiType::String) => {
            push_usize(out, s.len());
            push_padded(out, s.as_bytes());
        }
        (AbiValue::FixedArray(elems), AbiType::FixedArray(elem_ty, _)) => {
            let items: Vec<_> = elems.iter().map(|e| (e, elem_ty.as_ref())).collect();
            encode_sequence(&items, out)?;
        }
        (AbiValue::Array(elems), AbiType::Array(elem_ty)) => {
            push_usize(out, elems.len());
            let items: Vec<_> = elems.iter().map(|e| (e, elem_ty.as_ref())).collect();
            encode_sequence(&items, out)?;
        }
        (AbiValue::Tuple(members), AbiType::Tuple(types)) => {
            let items: Vec<_> = members.iter().zip(types).collect();
            encode_sequence(&items, out)?;
        }
        _ => {
            return Err(EncodeError::TypeMismatch {
                expected: ty.to_string(),
                got: value.kind().to_string(),
            })
        }
    }
    Ok(())
}

fn encode_sequence(items: &[(&AbiValue, &AbiType)], out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let head_len = items
        .iter()
        .map(|(_, ty)| ty.head_size())
        .fold(0, usize::saturating_add);
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (value, ty) in items {
        if ty.is_dynamic() {
            push_usize(&mut head, head_len + tail.len());
            encode_into(value, ty, &mut tail)?;
        } else {
            encode_into(value, ty, &mut head)?;
        }
    }
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    Ok(())
}

// ─── Packed / topic encodings ─────────────────────────────────────────────────

/// Non-standard packed encoding (`abi.encodePacked`).
///
/// Elementary values use their minimal width (`uint32` → 4 bytes, `address`
/// → 20 bytes, `bytes`/`string` unpadded). Array elements are padded to a
/// full word. Tuples, nested arrays and arrays of dynamic elements have no
/// packed form and are rejected.
pub fn encode_packed(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, EncodeError> {
    if values.len() != types.len() {
        return Err(EncodeError::ArgumentCount {
            expected: types.len(),
            got: values.len(),
        });
    }
    let mut out = Vec::new();
    for (value, ty) in values.iter().zip(types) {
        ty.validate()?;
        value.type_check(ty)?;
        match (value, ty) {
            (AbiValue::Bool(b), _) => out.push(u8::from(*b)),
            (AbiValue::Uint(v, _), AbiType::Uint(bits)) => {
                let word = v.to_be_bytes::<32>();
                out.extend_from_slice(&word[WORD - *bits as usize / 8..]);
            }
            (AbiValue::Int(v, _), AbiType::Int(bits)) => {
                let word = v.into_raw().to_be_bytes::<32>();
                out.extend_from_slice(&word[WORD - *bits as usize / 8..]);
            }
            (AbiValue::Address(a), _) => out.extend_from_slice(a.as_slice()),
            (AbiValue::FixedBytes(b), _) | (AbiValue::Bytes(b), _) => out.extend_from_slice(b),
            (AbiValue::String(s), _) => out.extend_from_slice(s.as_bytes()),
            (AbiValue::FixedArray(elems), AbiType::FixedArray(elem_ty, _))
            | (AbiValue::Array(elems), AbiType::Array(elem_ty)) => {
                if !elem_ty.is_word() {
                    return Err(EncodeError::InvalidType(format!(
                        "{ty} has no packed encoding"
                    )));
                }
                for elem in elems {
                    encode_into(elem, elem_ty, &mut out)?;
                }
            }
            _ => {
                return Err(EncodeError::InvalidType(format!(
                    "{ty} has no packed encoding"
                )))
            }
        }
    }
    Ok(out)
}

/// The bytes Solidity hashes when a reference-type value is an indexed
/// event parameter.
///
/// `bytes`/`string` contribute their raw contents; arrays and tuples are the
/// concatenation of their members' encodings, each padded to whole words
/// (nested `bytes`/`string` included, without a length prefix). Word types
/// encode as their single 32-byte word.
pub fn topic_preimage(value: &AbiValue, ty: &AbiType) -> Result<Vec<u8>, EncodeError> {
    ty.validate()?;
    value.type_check(ty)?;
    let mut out = Vec::new();
    write_topic_preimage(value, ty, false, &mut out)?;
    Ok(out)
}

fn write_topic_preimage(
    value: &AbiValue,
    ty: &AbiType,
    nested: bool,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    match (value, ty) {
        (AbiValue::Bytes(b), AbiType::Bytes) => {
            if nested {
                push_padded(out, b);
            } else {
                out.extend_from_slice(b);
            }
        }
        (AbiValue::String(s), AbiType::String) => {
            if nested {
                push_padded(out, s.as_bytes());
            } else {
                out.extend_from_slice(s.as_bytes());
            }
        }
        (AbiValue::FixedArray(elems), AbiType::FixedArray(elem_ty, _))
        | (AbiValue::Array(elems), AbiType::Array(elem_ty)) => {
            for elem in elems {
                write_topic_preimage(elem, elem_ty, true, out)?;
            }
        }
        (AbiValue::Tuple(members), AbiType::Tuple(types)) => {
            for (member, member_ty) in members.iter().zip(types) {
                write_topic_preimage(member, member_ty, true, out)?;
            }
        }
        _ => encode_into(value, ty, out)?,
    }
    Ok(())
}

// ─── Decoding ─────────────────────────────────────────────────────────────────

/// The low 8 bytes of `word` as a `usize`, if the upper 24 are zero.
fn word_to_usize(word: &[u8; WORD]) -> Option<usize> {
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low)).ok()
}

/// Decode a single value of type `ty` starting at `offset`.
///
/// Returns the value and the number of bytes consumed from `offset` (the
/// furthest byte read, including padding when present in the buffer).
pub fn decode(buf: &[u8], offset: usize, ty: &AbiType) -> Result<(AbiValue, usize), DecodeError> {
    ty.validate()
        .map_err(|e| DecodeError::InvalidType(e.to_string()))?;
    let mut reader = Reader::new(buf);
    let value = reader.value_at(offset, ty)?;
    Ok((value, reader.end.saturating_sub(offset)))
}

/// Decode a head/tail sequence of `types` from the start of `buf`.
///
/// An empty type list accepts any payload, including an empty one.
pub fn decode_params(buf: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>, DecodeError> {
    for ty in types {
        ty.validate()
            .map_err(|e| DecodeError::InvalidType(e.to_string()))?;
    }
    let refs: Vec<&AbiType> = types.iter().collect();
    Reader::new(buf).sequence_at(0, &refs)
}

/// Bounds-checked cursor over an ABI buffer. Tracks the furthest byte read
/// and the number of words read so far.
///
/// A well-formed encoding reads every word at most once, so the total is
/// capped at twice the buffer's word count. Offsets that alias one tail
/// would otherwise let a small payload expand without bound.
struct Reader<'a> {
    buf: &'a [u8],
    end: usize,
    read: usize,
    budget: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            end: 0,
            read: 0,
            budget: buf.len().div_ceil(WORD).saturating_mul(2).saturating_add(2),
        }
    }

    fn charge(&mut self, words: usize) -> Result<(), DecodeError> {
        self.read = self.read.saturating_add(words);
        if self.read > self.budget {
            return Err(DecodeError::ExpansionLimit {
                limit: self.budget,
            });
        }
        Ok(())
    }

    fn word(&mut self, at: usize) -> Result<&'a [u8; WORD], DecodeError> {
        let truncated = DecodeError::Truncated {
            offset: at,
            needed: WORD,
            len: self.buf.len(),
        };
        let stop = match at.checked_add(WORD) {
            Some(stop) if stop <= self.buf.len() => stop,
            _ => return Err(truncated),
        };
        let buf: &'a [u8] = self.buf;
        let word = <&'a [u8; WORD]>::try_from(&buf[at..stop]).map_err(|_| truncated)?;
        self.charge(1)?;
        self.end = self.end.max(stop);
        Ok(word)
    }

    /// Read a word that must hold a small non-negative integer (offset/length).
    fn small_int(&mut self, at: usize) -> Result<Option<usize>, DecodeError> {
        Ok(word_to_usize(self.word(at)?))
    }

    fn length(&mut self, at: usize) -> Result<usize, DecodeError> {
        let word = self.word(at)?;
        word_to_usize(word).ok_or_else(|| DecodeError::LengthOutOfBounds {
            offset: at,
            length: format!("0x{}", hex::encode(word)),
        })
    }

    fn byte_run(&mut self, at: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        let stop = at
            .checked_add(len)
            .filter(|stop| *stop <= self.buf.len())
            .ok_or_else(|| DecodeError::LengthOutOfBounds {
                offset: at,
                length: len.to_string(),
            })?;
        self.charge(len.div_ceil(WORD))?;
        // Padding is consumed when present; a payload cut right after the
        // data is still accepted.
        let padded_stop = at.saturating_add(padded_len(len)).min(self.buf.len());
        self.end = self.end.max(stop).max(padded_stop);
        let buf: &'a [u8] = self.buf;
        Ok(&buf[at..stop])
    }

    fn invalid(at: usize, ty: &AbiType) -> DecodeError {
        DecodeError::InvalidValue {
            offset: at,
            ty: ty.to_string(),
        }
    }

    fn value_at(&mut self, at: usize, ty: &AbiType) -> Result<AbiValue, DecodeError> {
        match ty {
            AbiType::Bool => {
                let word = self.word(at)?;
                if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
                    return Err(Self::invalid(at, ty));
                }
                Ok(AbiValue::Bool(word[31] == 1))
            }
            AbiType::Uint(bits) => {
                let v = U256::from_be_bytes(*self.word(at)?);
                if !uint_fits(&v, *bits) {
                    return Err(Self::invalid(at, ty));
                }
                Ok(AbiValue::Uint(v, *bits))
            }
            AbiType::Int(bits) => {
                let v = I256::from_raw(U256::from_be_bytes(*self.word(at)?));
                if !int_fits(&v, *bits) {
                    return Err(Self::invalid(at, ty));
                }
                Ok(AbiValue::Int(v, *bits))
            }
            AbiType::Address => {
                let word = self.word(at)?;
                if word[..12].iter().any(|b| *b != 0) {
                    return Err(Self::invalid(at, ty));
                }
                Ok(AbiValue::Address(Address::from_slice(&word[12..])))
            }
            AbiType::FixedBytes(n) => {
                let n = *n as usize;
                let word = self.word(at)?;
                if word[n..].iter().any(|b| *b != 0) {
                    return Err(Self::invalid(at, ty));
                }
                Ok(AbiValue::FixedBytes(word[..n].to_vec()))
            }
            AbiType::Bytes => {
                let len = self.length(at)?;
                let data = self.byte_run(at + WORD, len)?;
                Ok(AbiValue::Bytes(data.to_vec()))
            }
            AbiType::String => {
                let len = self.length(at)?;
                let data = self.byte_run(at + WORD, len)?;
                let s = std::str::from_utf8(data)
                    .map_err(|_| DecodeError::InvalidUtf8 { offset: at })?;
                Ok(AbiValue::String(s.to_string()))
            }
            AbiType::FixedArray(elem, len) => {
                // The whole head must be in the buffer before any allocation
                // sized by the declared length.
                let fits = elem
                    .head_size()
                    .checked_mul(*len)
                    .and_then(|size| at.checked_add(size))
                    .is_some_and(|stop| stop <= self.buf.len());
                if !fits {
                    return Err(DecodeError::Truncated {
                        offset: at,
                        needed: elem.head_size().saturating_mul(*len),
                        len: self.buf.len(),
                    });
                }
                let types = vec![elem.as_ref(); *len];
                Ok(AbiValue::FixedArray(self.sequence_at(at, &types)?))
            }
            AbiType::Array(elem) => {
                let len = self.length(at)?;
                let base = at + WORD;
                // Every element needs at least one head word; reject lengths
                // that cannot fit before allocating anything.
                let available = self.buf.len().saturating_sub(base) / elem.head_size().max(WORD);
                if len > available {
                    return Err(DecodeError::LengthOutOfBounds {
                        offset: at,
                        length: len.to_string(),
                    });
                }
                let types = vec![elem.as_ref(); len];
                Ok(AbiValue::Array(self.sequence_at(base, &types)?))
            }
            AbiType::Tuple(members) => {
                let types: Vec<&AbiType> = members.iter().collect();
                Ok(AbiValue::Tuple(self.sequence_at(at, &types)?))
            }
        }
    }

    fn sequence_at(&mut self, base: usize, types: &[&AbiType]) -> Result<Vec<AbiValue>, DecodeError> {
        let mut values = Vec::with_capacity(types.len());
        let mut head = base;
        for ty in types {
            if ty.is_dynamic() {
                let offset = self.small_int(head)?;
                let target = offset
                    .and_then(|o| base.checked_add(o))
                    .filter(|t| *t < self.buf.len())
                    .ok_or(DecodeError::OffsetOutOfBounds {
                        offset: head,
                        len: self.buf.len(),
                    })?;
                values.push(self.value_at(target, ty)?);
                head += WORD;
            } else {
                values.push(self.value_at(head, ty)?);
                head += ty.head_size();
            }
        }
        Ok(values)
    }
}
