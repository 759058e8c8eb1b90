//! Contracts deployed by the creation builtins

use crate::{
    address::{create_address, create2_address},
    templates::{MINIMAL_PROXY, minimal_proxy_initcode, runtime_copy_initcode},
    tests::helpers::{Deployed, compile, revert_reason},
};
use alloy_primitives::{Address, B256, U256};
use vyc_data::{AbiValue, Type, encode_call};

const FACTORY: &str = r#"
order: public(uint256)

@external
def proxy(target: address) -> address:
    return create_minimal_proxy_to(target)

@external
def proxy_at(target: address, salt: bytes32) -> address:
    return create_minimal_proxy_to(target, salt=salt)

@external
def proxy_at_or_zero(target: address, salt: bytes32) -> address:
    return create_minimal_proxy_to(target, salt=salt, revert_on_failure=False)

@external
def copy_of(target: address) -> address:
    return create_copy_of(target)

@external
def copy_at(target: address, salt: bytes32) -> address:
    return create_copy_of(target, salt=salt)

@external
def copy_at_or_zero(target: address, salt: bytes32) -> address:
    return create_copy_of(target, salt=salt, revert_on_failure=False)

@external
def bare_factory_at(target: address, salt: bytes32) -> address:
    return create_from_factory(target, salt=salt)

@external
def skipping_factory_at(target: address, salt: bytes32) -> address:
    return create_from_factory(target, salt=salt, code_offset=3)

@internal
def value_first() -> uint256:
    self.order = self.order * 10 + 1
    return 0

@internal
def salt_second() -> bytes32:
    self.order = self.order * 10 + 2
    return 0x00000000000000000000000000000000000000000000000000000000000000aa

@external
def keyword_order(target: address) -> address:
    return create_copy_of(target, salt=self.salt_second(), value=self.value_first())

@external
def from_blueprint(target: address, name: String[16]) -> address:
    return create_from_blueprint(target, name)

@payable
@external
def funded_copy(target: address) -> address:
    return create_copy_of(target, value=msg.value)
"#;

const COUNTER: &str = r#"
count: public(uint256)

@external
def bump() -> uint256:
    self.count += 1
    return self.count
"#;

const GREETER: &str = r#"
name: public(String[16])

@payable
@external
def __init__(n: String[16]):
    self.name = n
"#;

fn address_of(word: U256) -> Address {
    Address::from_word(B256::from(word))
}

fn created(factory: &mut Deployed, signature: &str, args: &[AbiValue]) -> Address {
    address_of(factory.word(signature, args))
}

#[test]
fn minimal_proxies_delegate_with_their_own_storage() {
    let mut factory = Deployed::new(FACTORY);
    let counter = factory.deploy(COUNTER, &[]);

    let proxy = created(&mut factory, "proxy(address)", &[AbiValue::Address(counter)]);
    // Contracts start at nonce 1
    assert_eq!(proxy, create_address(factory.address, 1));
    let initcode = minimal_proxy_initcode(counter);
    assert_eq!(factory.chain.code_at(proxy).as_ref(), &initcode[9..]);
    assert_eq!(initcode.len(), MINIMAL_PROXY.len());

    let bump = encode_call("bump()", &[]);
    factory.chain.call(proxy, bump.clone()).unwrap();
    let count = factory.chain.call(proxy, bump).unwrap();
    assert_eq!(test_utils::word(&count), Some(U256::from(2)));
    let count = factory.chain.call(counter, encode_call("count()", &[])).unwrap();
    assert_eq!(test_utils::word(&count), Some(U256::ZERO));
}

#[test]
fn create2_addresses_are_predictable() {
    let mut factory = Deployed::new(FACTORY);
    let counter = factory.deploy(COUNTER, &[]);
    let salt = B256::repeat_byte(0x5a);
    let args = [AbiValue::Address(counter), AbiValue::FixedBytes(salt, 32)];

    let proxy = created(&mut factory, "proxy_at(address,bytes32)", &args);
    let expected = create2_address(factory.address, salt, &minimal_proxy_initcode(counter));
    assert_eq!(proxy, expected);

    // The address is taken now
    factory.reverts("proxy_at(address,bytes32)", &args);
    let soft = created(&mut factory, "proxy_at_or_zero(address,bytes32)", &args);
    assert_eq!(soft, Address::ZERO);
}

#[test]
fn copies_share_code_but_not_state() {
    let mut factory = Deployed::new(FACTORY);
    let counter = factory.deploy(COUNTER, &[]);
    factory.chain.call(counter, encode_call("bump()", &[])).unwrap();

    let copy = created(&mut factory, "copy_of(address)", &[AbiValue::Address(counter)]);
    assert_ne!(copy, Address::ZERO);
    assert_eq!(factory.chain.code_at(copy), factory.chain.code_at(counter));
    let count = factory.chain.call(copy, encode_call("count()", &[])).unwrap();
    assert_eq!(test_utils::word(&count), Some(U256::ZERO));
}

#[test]
fn blueprints_run_with_forwarded_arguments() {
    let mut factory = Deployed::new(FACTORY);
    let blueprint = Address::repeat_byte(0xb1);
    factory.chain.set_code(blueprint, compile(GREETER).init);

    for name in ["hello!", "bar"] {
        let args = [AbiValue::Address(blueprint), AbiValue::String(name.into())];
        let greeter = created(&mut factory, "from_blueprint(address,string)", &args);
        let output = factory.chain.call(greeter, encode_call("name()", &[])).unwrap();
        let decoded = vyc_data::abi::decode_params(&[Type::String(16)], &output).unwrap();
        assert_eq!(decoded, [AbiValue::String(name.into())]);
    }
}

#[test]
fn value_is_forwarded_to_the_new_contract() {
    let mut factory = Deployed::new(FACTORY);
    let blueprint = Address::repeat_byte(0xb2);
    factory.chain.set_code(blueprint, compile(GREETER).init);
    let args = [AbiValue::Address(blueprint), AbiValue::String("paid".into())];
    let unpaid = created(&mut factory, "from_blueprint(address,string)", &args);
    assert_eq!(factory.chain.balance(unpaid), U256::ZERO);

    let counter = factory.deploy(COUNTER, &[]);
    let calldata = encode_call("funded_copy(address)", &[AbiValue::Address(counter)]);
    let value = U256::from(1000);
    let output = factory.chain.call_with_value(factory.address, calldata, value).unwrap();
    let copy = address_of(test_utils::word(&output).unwrap());
    assert_eq!(factory.chain.balance(copy), value);
}

#[test]
fn targets_without_code_are_rejected() {
    let mut factory = Deployed::new(FACTORY);
    let nobody = AbiValue::Address(Address::repeat_byte(0x99));
    factory.reverts("proxy(address)", &[nobody.clone()]);
    factory.reverts("copy_of(address)", &[nobody.clone()]);
    factory.reverts("from_blueprint(address,string)", &[nobody, AbiValue::String("x".into())]);
}

#[test]
fn failing_init_code_bubbles_its_revert() {
    let mut factory = Deployed::new(FACTORY);
    let blueprint = Address::repeat_byte(0xb3);
    let refusing = "@external\ndef __init__(n: String[16]):\n    raise \"refused\"\n";
    factory.chain.set_code(blueprint, compile(refusing).init);

    let args = [AbiValue::Address(blueprint), AbiValue::String("x".into())];
    let failure = factory.reverts("from_blueprint(address,string)", &args);
    assert_eq!(revert_reason(&failure).as_deref(), Some("refused"));
}

#[test]
fn create2_copies_land_at_the_predicted_address_once() {
    let mut factory = Deployed::new(FACTORY);
    let counter = factory.deploy(COUNTER, &[]);
    let salt = B256::repeat_byte(0xc0);
    let args = [AbiValue::Address(counter), AbiValue::FixedBytes(salt, 32)];

    let copy = created(&mut factory, "copy_at(address,bytes32)", &args);
    let runtime = factory.chain.code_at(counter);
    let initcode = runtime_copy_initcode(&runtime).unwrap();
    assert_eq!(copy, create2_address(factory.address, salt, &initcode));
    assert_eq!(factory.chain.code_at(copy), runtime);

    factory.reverts("copy_at(address,bytes32)", &args);
    let soft = created(&mut factory, "copy_at_or_zero(address,bytes32)", &args);
    assert_eq!(soft, Address::ZERO);

    let fresh = [AbiValue::Address(counter), AbiValue::FixedBytes(B256::repeat_byte(0xc1), 32)];
    let other = created(&mut factory, "copy_at_or_zero(address,bytes32)", &fresh);
    assert_ne!(other, Address::ZERO);
    assert_ne!(other, copy);
}

#[test]
fn factories_without_arguments_run_the_target_code_as_is() {
    let mut factory = Deployed::new(FACTORY);
    let target = Address::repeat_byte(0xf1);
    let counter = compile(COUNTER);
    factory.chain.set_code(target, counter.init.clone());
    let salt = B256::repeat_byte(0x07);
    let args = [AbiValue::Address(target), AbiValue::FixedBytes(salt, 32)];

    let created_counter = created(&mut factory, "bare_factory_at(address,bytes32)", &args);
    assert_eq!(created_counter, create2_address(factory.address, salt, &counter.init));
    assert_eq!(factory.chain.code_at(created_counter).as_ref(), counter.runtime.as_slice());

    factory.reverts("bare_factory_at(address,bytes32)", &args);
}

#[test]
fn code_offset_skips_a_prefix_of_the_target_code() {
    let mut factory = Deployed::new(FACTORY);
    let target = Address::repeat_byte(0xf2);
    let counter = compile(COUNTER);
    let mut code = vec![0xfe; 3];
    code.extend_from_slice(&counter.init);
    factory.chain.set_code(target, code.clone());
    let salt = B256::repeat_byte(0x08);
    let args = [AbiValue::Address(target), AbiValue::FixedBytes(salt, 32)];

    let skipped = created(&mut factory, "skipping_factory_at(address,bytes32)", &args);
    assert_eq!(skipped, create2_address(factory.address, salt, &code[3..]));
    assert_eq!(factory.chain.code_at(skipped).as_ref(), counter.runtime.as_slice());

    // Nothing is left past the offset
    let short = Address::repeat_byte(0xf3);
    factory.chain.set_code(short, vec![0xfe; 3]);
    let args = [AbiValue::Address(short), AbiValue::FixedBytes(salt, 32)];
    factory.reverts("skipping_factory_at(address,bytes32)", &args);
}

#[test]
fn creation_operands_ignore_keyword_order() {
    let mut factory = Deployed::new(FACTORY);
    let counter = factory.deploy(COUNTER, &[]);
    let copy = created(&mut factory, "keyword_order(address)", &[AbiValue::Address(counter)]);
    assert_ne!(copy, Address::ZERO);
    // `value` is evaluated before `salt` although written after it
    assert_eq!(factory.word("order()", &[]), U256::from(12));
}
