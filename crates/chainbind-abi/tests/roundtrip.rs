//! Property tests: decode(encode(v)) == v for generated values, and the
//! encoder agrees byte-for-byte with alloy's dynamic ABI encoder.

use alloy_dyn_abi::DynSolValue;
use chainbind_abi::{codec, AbiType, AbiValue, Address, B256, U256};
use proptest::prelude::*;

fn to_dyn(value: &AbiValue) -> DynSolValue {
    match value {
        AbiValue::Bool(b) => DynSolValue::Bool(*b),
        AbiValue::Uint(v, bits) => DynSolValue::Uint(*v, *bits as usize),
        AbiValue::Int(v, bits) => DynSolValue::Int(*v, *bits as usize),
        AbiValue::Address(a) => DynSolValue::Address(*a),
        AbiValue::FixedBytes(b) => DynSolValue::FixedBytes(B256::right_padding_from(b), b.len()),
        AbiValue::Bytes(b) => DynSolValue::Bytes(b.clone()),
        AbiValue::String(s) => DynSolValue::String(s.clone()),
        AbiValue::FixedArray(v) => DynSolValue::FixedArray(v.iter().map(to_dyn).collect()),
        AbiValue::Array(v) => DynSolValue::Array(v.iter().map(to_dyn).collect()),
        AbiValue::Tuple(v) => DynSolValue::Tuple(v.iter().map(to_dyn).collect()),
    }
}

fn leaf() -> impl Strategy<Value = (AbiType, AbiValue)> {
    prop_oneof![
        any::<bool>().prop_map(|b| (AbiType::Bool, AbiValue::Bool(b))),
        (1u16..=32, any::<[u8; 32]>()).prop_map(|(n, raw)| {
            let bits = n * 8;
            let v = U256::from_be_bytes(raw) >> (256 - bits as usize);
            (AbiType::Uint(bits), AbiValue::Uint(v, bits))
        }),
        any::<i64>().prop_map(|x| (AbiType::Int(64), AbiValue::from(x))),
        any::<i128>().prop_map(|x| (AbiType::Int(256), AbiValue::from(x))),
        any::<[u8; 20]>().prop_map(|a| (AbiType::Address, AbiValue::Address(Address::from(a)))),
        prop::collection::vec(any::<u8>(), 1..=32)
            .prop_map(|b| (AbiType::FixedBytes(b.len() as u8), AbiValue::FixedBytes(b))),
        prop::collection::vec(any::<u8>(), 0..100).prop_map(|b| (AbiType::Bytes, AbiValue::Bytes(b))),
        ".{0,40}".prop_map(|s| (AbiType::String, AbiValue::String(s))),
    ]
}

fn typed_value() -> impl Strategy<Value = (AbiType, AbiValue)> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(|members| {
                let (types, values) = members.into_iter().unzip();
                (AbiType::Tuple(types), AbiValue::Tuple(values))
            }),
            (inner.clone(), 0usize..4).prop_map(|((ty, v), n)| {
                (AbiType::Array(Box::new(ty)), AbiValue::Array(vec![v; n]))
            }),
            (inner, 1usize..4).prop_map(|((ty, v), n)| {
                (AbiType::FixedArray(Box::new(ty), n), AbiValue::FixedArray(vec![v; n]))
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_single_value_round_trip((ty, value) in typed_value()) {
        let encoded = codec::encode(&value, &ty).unwrap();
        let (decoded, used) = codec::decode(&encoded, 0, &ty).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(used, encoded.len());
    }

    #[test]
    fn prop_params_match_alloy(items in prop::collection::vec(typed_value(), 0..4)) {
        let (types, values): (Vec<_>, Vec<_>) = items.into_iter().unzip();
        let ours = codec::encode_params(&values, &types).unwrap();
        let theirs = DynSolValue::Tuple(values.iter().map(to_dyn).collect()).abi_encode_params();
        prop_assert_eq!(&ours, &theirs);
        prop_assert_eq!(codec::decode_params(&ours, &types).unwrap(), values);
    }

    #[test]
    fn prop_width_tag_is_not_part_of_the_value(x in any::<u64>(), y in any::<i64>(), tag in 64u16..=256) {
        let types = [AbiType::Uint(256), AbiType::Int(256), AbiType::Uint(64)];
        let values = vec![
            AbiValue::Uint(U256::from(x), tag),
            AbiValue::from(y),
            AbiValue::uint256(x),
        ];
        let encoded = codec::encode_params(&values, &types).unwrap();
        prop_assert_eq!(codec::decode_params(&encoded, &types).unwrap(), values);
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256),
                                (ty, _) in typed_value()) {
        let _ = codec::decode(&bytes, 0, &ty);
        let _ = codec::decode_params(&bytes, &[ty]);
    }
}
