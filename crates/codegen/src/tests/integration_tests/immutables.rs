//! Constructor arguments and immutables appended to the runtime code

use crate::tests::helpers::{Deployed, compile};
use alloy_primitives::U256;
use vyc_data::{AbiValue, Type};

const CONFIGURED: &str = r#"
NAME: public(immutable(String[128]))
SCALE: immutable(uint256)
created_by: public(address)

@external
def __init__(name: String[128], scale: uint256):
    NAME = name
    SCALE = scale
    self.created_by = msg.sender

@view
@external
def scaled(x: uint256) -> uint256:
    return x * SCALE
"#;

fn args(name: &str, scale: u64) -> Vec<AbiValue> {
    vec![AbiValue::String(name.into()), AbiValue::uint(scale)]
}

#[test]
fn immutables_are_read_from_code() {
    let name = "n".repeat(128);
    let mut contract = Deployed::with_args(CONFIGURED, &args(&name, 7));
    assert_eq!(contract.word("scaled(uint256)", &[AbiValue::uint(6)]), U256::from(42));
    assert_eq!(contract.values("NAME()", &[], &[Type::String(128)]), [AbiValue::String(name)]);

    let code = contract.chain.code_at(contract.address);
    assert!(code.starts_with(&contract.bytecode.runtime));
    // String[128] as a length word and 128 bytes, then the uint256
    assert_eq!(code.len(), contract.bytecode.runtime.len() + 32 + 128 + 32);
}

#[test]
fn oversized_constructor_arguments_fail() {
    let name = "n".repeat(129);
    assert!(Deployed::try_with_args(CONFIGURED, &args(&name, 7)).is_err());
}

#[test]
fn missing_constructor_arguments_fail() {
    let bytecode = compile(CONFIGURED);
    let mut chain = test_utils::Chain::new();
    assert!(chain.deploy(bytecode.init).is_err());
}

#[test]
fn constructors_reject_value_unless_payable() {
    let bytecode = compile(CONFIGURED);
    let mut init = bytecode.init;
    init.extend_from_slice(&vyc_data::encode_params(&args("x", 1)));
    let mut chain = test_utils::Chain::new();
    assert!(chain.deploy_with_value(init.clone(), U256::from(1)).is_err());
    assert!(chain.deploy(init).is_ok());
}
