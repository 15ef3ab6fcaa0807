//! Golden vectors from the Solidity ABI specification and well-known
//! mainnet contracts.

use chainbind_abi::{
    build_call, codec, decode_all, decode_input, encode_topic, keccak256, AbiError, AbiType,
    AbiValue, Address, ContractAbi, DecodeError, EventField, EventSignature, FunctionSignature,
    Log, RevertReason, B256, U256,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// One big-endian word holding `n`.
fn word(n: u64) -> Vec<u8> {
    U256::from(n).to_be_bytes::<32>().to_vec()
}

/// `bytes` right-padded to a whole number of words.
fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(bytes.len().div_ceil(32) * 32, 0);
    out
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

fn uints(xs: &[u64]) -> AbiValue {
    AbiValue::Array(xs.iter().map(|x| AbiValue::uint256(*x)).collect())
}

// ─── Selectors ────────────────────────────────────────────────────────────────

#[test]
fn well_known_selectors() {
    let cases = [
        ("transfer(address,uint256)", "a9059cbb"),
        ("baz(uint32,bool)", "cdcd77c0"),
        ("sam(bytes,bool,uint256[])", "a5643bf2"),
        ("f(uint256,uint32[],bytes10,bytes)", "8be65246"),
        ("g(uint256[][],string[])", "2289b18c"),
    ];
    for (decl, expected) in cases {
        let sig = FunctionSignature::parse(decl).unwrap();
        assert_eq!(hex::encode(sig.selector()), expected, "{decl}");
    }
}

#[test]
fn erc20_transfer_topic() {
    let sig = EventSignature::parse("Transfer(address indexed, address indexed, uint256)").unwrap();
    assert_eq!(
        format!("{:#x}", sig.topic()),
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
    );
}

// ─── Encoding vectors ─────────────────────────────────────────────────────────

#[test]
fn baz_static_args() {
    let sig = FunctionSignature::parse("baz(uint32 x, bool y)").unwrap();
    let call = build_call(&sig, &[AbiValue::from(69u32), AbiValue::Bool(true)]).unwrap();
    assert_eq!(call.args, concat(&[word(69), word(1)]));
}

#[test]
fn sam_dynamic_args() {
    let sig = FunctionSignature::parse("sam(bytes,bool,uint256[])").unwrap();
    let args = [
        AbiValue::Bytes(b"dave".to_vec()),
        AbiValue::Bool(true),
        uints(&[1, 2, 3]),
    ];
    let call = build_call(&sig, &args).unwrap();
    let expected = concat(&[
        word(0x60),
        word(1),
        word(0xa0),
        word(4),
        padded(b"dave"),
        word(3),
        word(1),
        word(2),
        word(3),
    ]);
    assert_eq!(call.args, expected);

    let decoded = decode_input(&sig, &call.data()).unwrap();
    let values: Vec<_> = decoded.inputs.into_values().collect();
    assert_eq!(values, args.to_vec());
}

#[test]
fn f_mixed_static_and_dynamic() {
    let sig = FunctionSignature::parse("f(uint256,uint32[],bytes10,bytes)").unwrap();
    let args = [
        AbiValue::uint256(0x123u64),
        AbiValue::Array(vec![AbiValue::from(0x456u32), AbiValue::from(0x789u32)]),
        AbiValue::fixed_bytes(b"1234567890"),
        AbiValue::Bytes(b"Hello, world!".to_vec()),
    ];
    let call = build_call(&sig, &args).unwrap();
    let expected = concat(&[
        word(0x123),
        word(0x80),
        padded(b"1234567890"),
        word(0xe0),
        word(2),
        word(0x456),
        word(0x789),
        word(0xd),
        padded(b"Hello, world!"),
    ]);
    assert_eq!(call.args, expected);
}

#[test]
fn g_nested_dynamic_arrays() {
    let types = [
        "uint256[][]".parse::<AbiType>().unwrap(),
        "string[]".parse::<AbiType>().unwrap(),
    ];
    let args = [
        AbiValue::Array(vec![uints(&[1, 2]), uints(&[3])]),
        AbiValue::Array(vec!["one".into(), "two".into(), "three".into()]),
    ];
    let encoded = codec::encode_params(&args, &types).unwrap();
    let expected = concat(&[
        word(0x40),
        word(0x140),
        word(2),
        word(0x40),
        word(0xa0),
        word(2),
        word(1),
        word(2),
        word(1),
        word(3),
        word(3),
        word(0x60),
        word(0xa0),
        word(0xe0),
        word(3),
        padded(b"one"),
        word(3),
        padded(b"two"),
        word(5),
        padded(b"three"),
    ]);
    assert_eq!(encoded, expected);
    assert_eq!(codec::decode_params(&encoded, &types).unwrap(), args.to_vec());
}

#[test]
fn bytes_of_33_bytes_is_three_words() {
    let value = AbiValue::Bytes(vec![0x5a; 33]);
    let encoded = codec::encode(&value, &AbiType::Bytes).unwrap();
    assert_eq!(encoded.len(), 96);
    assert_eq!(&encoded[..32], word(33).as_slice());
}

#[test]
fn bytes_array_of_unequal_lengths_keeps_order() {
    let ty: AbiType = "bytes[]".parse().unwrap();
    let value = AbiValue::Array(vec![
        AbiValue::Bytes(vec![]),
        AbiValue::Bytes(vec![1; 64]),
        AbiValue::Bytes(vec![2; 3]),
    ]);
    let encoded = codec::encode(&value, &ty).unwrap();
    let (decoded, used) = codec::decode(&encoded, 0, &ty).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(used, encoded.len());
}

#[test]
fn int_minus_one_is_all_ones() {
    let encoded = codec::encode(&AbiValue::from(-1i32), &AbiType::Int(32)).unwrap();
    assert_eq!(encoded, vec![0xff; 32]);
}

// ─── Decoding failures ────────────────────────────────────────────────────────

#[test]
fn malformed_payloads_are_rejected() {
    let types = ["bytes".parse::<AbiType>().unwrap()];
    // offset past the end
    assert!(codec::decode_params(&word(0x20), &types).is_err());
    // length past the end
    let payload = concat(&[word(0x20), word(100), padded(b"short")]);
    assert!(matches!(
        codec::decode_params(&payload, &types),
        Err(DecodeError::LengthOutOfBounds { .. })
    ));
    // invalid utf-8
    let payload = concat(&[word(0x20), word(2), padded(&[0xff, 0xfe])]);
    assert!(matches!(
        codec::decode_params(&payload, &[AbiType::String]),
        Err(DecodeError::InvalidUtf8 { .. })
    ));
}

// ─── Events ───────────────────────────────────────────────────────────────────

#[test]
fn receipt_with_mixed_logs() {
    let abi = ContractAbi::from_signatures(&[
        "event Transfer(address indexed from, address indexed to, uint256 value)",
        "event Approval(address indexed owner, address indexed spender, uint256 value)",
    ])
    .unwrap();
    let transfer = abi.event("Transfer").unwrap();
    let approval = abi.event("Approval").unwrap();
    let holder = Address::repeat_byte(0xaa);
    let topic = |a: Address| B256::left_padding_from(a.as_slice());

    let logs = vec![
        Log {
            topics: vec![approval.topic(), topic(holder), topic(Address::ZERO)],
            data: word(5).into(),
            ..Default::default()
        },
        Log {
            topics: vec![transfer.topic(), topic(holder), topic(Address::ZERO)],
            data: word(7).into(),
            ..Default::default()
        },
    ];
    let transfers = decode_all(&logs, transfer).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(
        transfers[0].value("value").and_then(AbiValue::as_u256),
        Some(U256::from(7))
    );
    assert_eq!(abi.decode_log(&logs[0]).unwrap().name, "Approval");
}

#[test]
fn indexed_dynamic_param_is_keccak_of_preimage() {
    let sig = EventSignature::parse("StringEvent(string indexed message)").unwrap();
    let expected = keccak256(b"relay started");
    assert_eq!(
        encode_topic(&"relay started".into(), &AbiType::String).unwrap(),
        expected
    );
    let log = Log {
        topics: vec![sig.topic(), expected],
        ..Default::default()
    };
    let ev = chainbind_abi::decode_log(&log, &sig).unwrap();
    assert_eq!(ev.field("message"), Some(&EventField::Hashed(expected)));
}

#[test]
fn foreign_log_is_selector_mismatch() {
    let sig = EventSignature::parse("Upgraded(address indexed implementation)").unwrap();
    let log = Log {
        topics: vec![keccak256(b"Other(address)"), B256::ZERO],
        ..Default::default()
    };
    let err = chainbind_abi::decode_log(&log, &sig).unwrap_err();
    assert!(matches!(err, AbiError::SelectorMismatch { .. }));
}

// ─── Revert data ──────────────────────────────────────────────────────────────

#[test]
fn revert_reason_round_trip_through_encoder() {
    let error = FunctionSignature::parse("Error(string)").unwrap();
    let data = build_call(&error, &["insufficient allowance".into()]).unwrap().data();
    assert_eq!(
        RevertReason::decode(&data),
        Some(RevertReason::Message {
            message: "insufficient allowance".into()
        })
    );
}
