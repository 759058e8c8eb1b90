//! Internal calls, default arguments and calls to other contracts

use crate::tests::helpers::{Deployed, revert_reason};
use alloy_primitives::{Address, U256};
use vyc_data::{AbiValue, Type};

const DEFAULTS: &str = r#"
@internal
def add_default(a: uint256, b: uint256 = 10) -> uint256:
    return a + b

@internal
def describe(n: uint256) -> String[8]:
    if n == 0:
        return "zero"
    return "nonzero"

@external
def one(a: uint256) -> uint256:
    return self.add_default(a)

@external
def two(a: uint256, b: uint256) -> uint256:
    return self.add_default(a, b) + self.add_default(b, a)

@external
def maybe(a: uint256, b: uint256 = 5) -> uint256:
    return a * b

@external
def name_of(n: uint256) -> String[8]:
    return self.describe(n)
"#;

const CALLEE: &str = r#"
stored: public(uint256)

@external
def store(v: uint256):
    self.stored = v

@pure
@external
def echo(s: String[16]) -> String[16]:
    return s

@external
def fail():
    raise "nope"
"#;

const CALLER: &str = r#"
interface Callee:
    def store(v: uint256): nonpayable
    def stored() -> uint256: view
    def echo(s: String[16]) -> String[16]: view
    def fail(): nonpayable

@external
def forward(target: address, v: uint256) -> uint256:
    Callee(target).store(v)
    return Callee(target).stored()

@view
@external
def echo(target: address, s: String[16]) -> String[16]:
    return Callee(target).echo(s)

@external
def fail(target: address):
    Callee(target).fail()
"#;

#[test]
fn internal_defaults() {
    let mut contract = Deployed::new(DEFAULTS);
    assert_eq!(contract.word("one(uint256)", &[AbiValue::uint(1)]), U256::from(11));
    let args = [AbiValue::uint(2), AbiValue::uint(3)];
    assert_eq!(contract.word("two(uint256,uint256)", &args), U256::from(10));
}

#[test]
fn external_defaults_have_their_own_selector() {
    let mut contract = Deployed::new(DEFAULTS);
    assert_eq!(contract.word("maybe(uint256)", &[AbiValue::uint(3)]), U256::from(15));
    let args = [AbiValue::uint(3), AbiValue::uint(4)];
    assert_eq!(contract.word("maybe(uint256,uint256)", &args), U256::from(12));
}

#[test]
fn internal_calls_return_strings() {
    let mut contract = Deployed::new(DEFAULTS);
    let name = contract.values("name_of(uint256)", &[AbiValue::uint(0)], &[Type::String(8)]);
    assert_eq!(name, [AbiValue::String("zero".into())]);
    let name = contract.values("name_of(uint256)", &[AbiValue::uint(4)], &[Type::String(8)]);
    assert_eq!(name, [AbiValue::String("nonzero".into())]);
}

#[test]
fn calls_to_other_contracts() {
    let mut caller = Deployed::new(CALLER);
    let callee = caller.deploy(CALLEE, &[]);
    let target = AbiValue::Address(callee);

    let args = [target.clone(), AbiValue::uint(42)];
    assert_eq!(caller.word("forward(address,uint256)", &args), U256::from(42));
    assert_eq!(caller.chain.call(callee, vyc_data::encode_call("stored()", &[])).unwrap()[31], 42);

    let args = [target.clone(), AbiValue::String("ping".into())];
    let echoed = caller.values("echo(address,string)", &args, &[Type::String(16)]);
    assert_eq!(echoed, [AbiValue::String("ping".into())]);

    let failure = caller.reverts("fail(address)", &[target]);
    assert_eq!(revert_reason(&failure).as_deref(), Some("nope"));
}

#[test]
fn calls_to_accounts_without_code_revert() {
    let mut caller = Deployed::new(CALLER);
    let nobody = AbiValue::Address(Address::repeat_byte(0x42));
    caller.reverts("forward(address,uint256)", &[nobody, AbiValue::uint(1)]);
}
