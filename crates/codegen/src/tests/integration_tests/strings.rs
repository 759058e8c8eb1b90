//! Byte arrays in storage, memory, calldata and return data

use crate::tests::helpers::Deployed;
use alloy_primitives::{U256, keccak256};
use vyc_data::{AbiValue, Type};

const GREETER: &str = r#"
greeting: public(String[32])
payload: Bytes[64]

@external
def __init__():
    self.greeting = "hello"

@external
def set_greeting(g: String[32]):
    self.greeting = g

@view
@external
def greeting_length() -> uint256:
    return len(self.greeting)

@pure
@external
def is_hello(s: String[32]) -> bool:
    return s == "hello"

@pure
@external
def digest(s: String[32]) -> bytes32:
    return keccak256(s)

@external
def store_payload(b: Bytes[64]):
    self.payload = b

@view
@external
def load_payload() -> Bytes[64]:
    return self.payload

@pure
@external
def fixed() -> Bytes[40]:
    return b"\x01\x02this literal is longer than one word\xff"
"#;

fn string(value: &str) -> AbiValue {
    AbiValue::String(value.into())
}

#[test]
fn strings_round_trip_through_storage() {
    let mut greeter = Deployed::new(GREETER);
    let greeting = greeter.values("greeting()", &[], &[Type::String(32)]);
    assert_eq!(greeting, [string("hello")]);
    assert_eq!(greeter.word("greeting_length()", &[]), U256::from(5));

    let long = "a greeting that is 32 bytes long";
    assert_eq!(long.len(), 32);
    greeter.call("set_greeting(string)", &[string(long)]).unwrap();
    assert_eq!(greeter.values("greeting()", &[], &[Type::String(32)]), [string(long)]);
    assert_eq!(greeter.word("greeting_length()", &[]), U256::from(32));

    greeter.call("set_greeting(string)", &[string("")]).unwrap();
    assert_eq!(greeter.values("greeting()", &[], &[Type::String(32)]), [string("")]);
}

#[test]
fn oversized_strings_are_rejected() {
    let mut greeter = Deployed::new(GREETER);
    let too_long = "x".repeat(33);
    greeter.reverts("set_greeting(string)", &[string(&too_long)]);
}

#[test]
fn equality_and_hashing() {
    let mut greeter = Deployed::new(GREETER);
    assert_eq!(greeter.word("is_hello(string)", &[string("hello")]), U256::from(1));
    assert_eq!(greeter.word("is_hello(string)", &[string("hell")]), U256::ZERO);
    assert_eq!(greeter.word("is_hello(string)", &[string("hello!")]), U256::ZERO);

    let digest = greeter.word("digest(string)", &[string("vyper")]);
    assert_eq!(digest, U256::from_be_bytes(keccak256("vyper").0));
}

#[test]
fn bytes_span_several_words() {
    let mut greeter = Deployed::new(GREETER);
    let payload: Vec<u8> = (0..50).collect();
    greeter.call("store_payload(bytes)", &[AbiValue::Bytes(payload.clone())]).unwrap();
    let loaded = greeter.values("load_payload()", &[], &[Type::Bytes(64)]);
    assert_eq!(loaded, [AbiValue::Bytes(payload)]);
}

#[test]
fn bytes_literals() {
    let mut greeter = Deployed::new(GREETER);
    let mut expected = vec![0x01, 0x02];
    expected.extend_from_slice(b"this literal is longer than one word");
    expected.push(0xff);
    assert_eq!(greeter.values("fixed()", &[], &[Type::Bytes(40)]), [AbiValue::Bytes(expected)]);
}
