//! Function call encoding and return / calldata decoding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_params, encode_params};
use crate::error::{AbiError, DecodeError, EncodeError};
use crate::selector::selector_hex;
use crate::signature::{FunctionSignature, Param};
use crate::types::{AbiType, AbiValue};

/// Selector plus encoded arguments, sent to the node verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCall {
    pub selector: [u8; 4],
    pub args: Vec<u8>,
}

impl EncodedCall {
    /// Full calldata: `selector ++ args`.
    pub fn data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + self.args.len());
        data.extend_from_slice(&self.selector);
        data.extend_from_slice(&self.args);
        data
    }

    /// Calldata as a `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.data()))
    }

    pub fn selector_hex(&self) -> String {
        selector_hex(self.selector)
    }
}

/// Result of decoding calldata against a known function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedCall {
    /// Function name (e.g. "transfer")
    pub name: String,
    pub selector: [u8; 4],
    /// Decoded arguments in declaration order; unnamed ones are keyed `arg{i}`.
    pub inputs: IndexMap<String, AbiValue>,
}

impl DecodedCall {
    pub fn selector_hex(&self) -> String {
        selector_hex(self.selector)
    }

    pub fn input(&self, name: &str) -> Option<&AbiValue> {
        self.inputs.get(name)
    }
}

/// Encode a call to `sig` with `args`.
///
/// Argument count and every value's type are checked before anything is
/// written.
pub fn build_call(sig: &FunctionSignature, args: &[AbiValue]) -> Result<EncodedCall, EncodeError> {
    let types = sig.input_types();
    if args.len() != types.len() {
        return Err(EncodeError::ArgumentCount {
            expected: types.len(),
            got: args.len(),
        });
    }
    Ok(EncodedCall {
        selector: sig.selector(),
        args: encode_params(args, &types)?,
    })
}

/// Decode `eth_call` return data. Zero declared outputs accept any payload,
/// including an empty one.
pub fn decode_return(data: &[u8], outputs: &[AbiType]) -> Result<Vec<AbiValue>, DecodeError> {
    decode_params(data, outputs)
}

/// Decode full calldata (selector included) against `sig`.
pub fn decode_input(sig: &FunctionSignature, calldata: &[u8]) -> Result<DecodedCall, AbiError> {
    if calldata.len() < 4 {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: 4,
            len: calldata.len(),
        }
        .into());
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&calldata[..4]);
    if selector != sig.selector() {
        return Err(AbiError::SelectorMismatch {
            expected: selector_hex(sig.selector()),
            got: selector_hex(selector),
        });
    }
    let values = decode_params(&calldata[4..], &sig.input_types())?;
    Ok(DecodedCall {
        name: sig.name().to_string(),
        selector,
        inputs: name_values(sig.inputs(), values),
    })
}

/// Deployment payload: contract bytecode followed by the encoded constructor
/// arguments. Constructors have no selector.
pub fn encode_constructor(
    bytecode: &[u8],
    types: &[AbiType],
    args: &[AbiValue],
) -> Result<Vec<u8>, EncodeError> {
    let encoded = encode_params(args, types)?;
    let mut data = Vec::with_capacity(bytecode.len() + encoded.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(&encoded);
    Ok(data)
}

pub(crate) fn name_values(params: &[Param], values: Vec<AbiValue>) -> IndexMap<String, AbiValue> {
    params
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (p, v))| {
            let key = p.name.clone().unwrap_or_else(|| format!("arg{i}"));
            (key, v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    fn transfer() -> FunctionSignature {
        FunctionSignature::parse("transfer(address to, uint256 amount) returns (bool)").unwrap()
    }

    #[test]
    fn build_transfer_call() {
        let to = Address::repeat_byte(0x42);
        let call = build_call(&transfer(), &[to.into(), AbiValue::uint256(1000u64)]).unwrap();
        let data = call.data();
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[16..36], to.as_slice());
        assert_eq!(call.selector_hex(), "0xa9059cbb");
    }

    #[test]
    fn build_rejects_wrong_arity() {
        let err = build_call(&transfer(), &[AbiValue::Bool(true)]).unwrap_err();
        assert_eq!(err, EncodeError::ArgumentCount { expected: 2, got: 1 });
    }

    #[test]
    fn build_rejects_wrong_type() {
        let err = build_call(&transfer(), &[AbiValue::Bool(true), AbiValue::uint256(1u64)])
            .unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { .. }));
    }

    #[test]
    fn decode_input_round_trip() {
        let sig = transfer();
        let to = Address::repeat_byte(0x01);
        let call = build_call(&sig, &[to.into(), AbiValue::uint256(7u64)]).unwrap();
        let decoded = decode_input(&sig, &call.data()).unwrap();
        assert_eq!(decoded.name, "transfer");
        assert_eq!(decoded.input("to").and_then(AbiValue::as_address), Some(to));
        assert_eq!(decoded.input("amount").and_then(AbiValue::as_u256), Some(U256::from(7)));
    }

    #[test]
    fn decode_input_selector_mismatch() {
        let approve = FunctionSignature::parse("approve(address,uint256)").unwrap();
        let call = build_call(&approve, &[Address::ZERO.into(), AbiValue::uint256(0u64)]).unwrap();
        let err = decode_input(&transfer(), &call.data()).unwrap_err();
        assert!(err.is_selector_mismatch());
    }

    #[test]
    fn unnamed_inputs_keyed_by_position() {
        let sig = FunctionSignature::new("f", vec![AbiType::Bool, AbiType::Uint(8)]).unwrap();
        let call = build_call(&sig, &[AbiValue::Bool(true), AbiValue::from(3u8)]).unwrap();
        let decoded = decode_input(&sig, &call.data()).unwrap();
        let keys: Vec<_> = decoded.inputs.keys().cloned().collect();
        assert_eq!(keys, vec!["arg0", "arg1"]);
    }

    #[test]
    fn empty_return_for_no_outputs() {
        assert!(decode_return(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn constructor_payload_appends_args() {
        let bytecode = [0x60, 0x80, 0x60, 0x40];
        let data = encode_constructor(&bytecode, &[AbiType::Uint(256)], &[AbiValue::uint256(5u64)])
            .unwrap();
        assert_eq!(&data[..4], &bytecode);
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 5);
    }
}
