//! Property tests comparing checked arithmetic on chain with host arithmetic

use crate::{Bytecode, tests::helpers::compile};
use alloy_primitives::{I256, U256};
use proptest::prelude::*;
use std::sync::OnceLock;
use test_utils::{Chain, word};
use vyc_data::{AbiValue, encode_call};

const MATH: &str = r#"
@pure
@external
def add(a: uint256, b: uint256) -> uint256:
    return a + b

@pure
@external
def sub(a: uint256, b: uint256) -> uint256:
    return a - b

@pure
@external
def mul(a: uint256, b: uint256) -> uint256:
    return a * b

@pure
@external
def sadd(a: int256, b: int256) -> int256:
    return a + b

@pure
@external
def ssub(a: int256, b: int256) -> int256:
    return a - b

@pure
@external
def add64(a: int64, b: int64) -> int64:
    return a + b
"#;

fn bytecode() -> &'static Bytecode {
    static BYTECODE: OnceLock<Bytecode> = OnceLock::new();
    BYTECODE.get_or_init(|| compile(MATH))
}

/// Runs `signature` on a fresh deployment. `None` if it reverted.
fn run(signature: &str, args: &[AbiValue]) -> Option<U256> {
    let mut chain = Chain::new();
    let address = chain.deploy(bytecode().init.clone()).expect("deploys");
    let output = chain.call(address, encode_call(signature, args)).ok()?;
    word(&output)
}

fn arb_u256() -> impl Strategy<Value = U256> {
    prop_oneof![
        // Explicit edge cases
        Just(U256::ZERO),
        Just(U256::MAX),
        any::<u8>().prop_map(|x| U256::ONE << x),
        any::<[u8; 32]>().prop_map(U256::from_be_bytes),
    ]
}

fn arb_i256() -> impl Strategy<Value = I256> {
    prop_oneof![
        Just(I256::ZERO),
        Just(I256::MIN),
        Just(I256::MAX),
        Just(I256::MINUS_ONE),
        arb_u256().prop_map(I256::from_raw),
    ]
}

proptest! {
    #[test]
    fn unsigned_add(a in arb_u256(), b in arb_u256()) {
        let result = run("add(uint256,uint256)", &[AbiValue::Uint(a), AbiValue::Uint(b)]);
        prop_assert_eq!(result, a.checked_add(b));
    }

    #[test]
    fn unsigned_sub(a in arb_u256(), b in arb_u256()) {
        let result = run("sub(uint256,uint256)", &[AbiValue::Uint(a), AbiValue::Uint(b)]);
        prop_assert_eq!(result, a.checked_sub(b));
    }

    #[test]
    fn unsigned_mul(a in arb_u256(), b in arb_u256()) {
        let result = run("mul(uint256,uint256)", &[AbiValue::Uint(a), AbiValue::Uint(b)]);
        prop_assert_eq!(result, a.checked_mul(b));
    }

    #[test]
    fn signed_add(a in arb_i256(), b in arb_i256()) {
        let result = run("sadd(int256,int256)", &[AbiValue::Int(a), AbiValue::Int(b)]);
        prop_assert_eq!(result, a.checked_add(b).map(I256::into_raw));
    }

    #[test]
    fn signed_sub(a in arb_i256(), b in arb_i256()) {
        let result = run("ssub(int256,int256)", &[AbiValue::Int(a), AbiValue::Int(b)]);
        prop_assert_eq!(result, a.checked_sub(b).map(I256::into_raw));
    }

    #[test]
    fn narrow_signed_add(a in any::<i64>(), b in any::<i64>()) {
        let int = |value: i64| AbiValue::Int(I256::try_from(value).unwrap());
        let args = [int(a), int(b)];
        let result = run("add64(int64,int64)", &args);
        let expected = a.checked_add(b).map(|sum| I256::try_from(sum).unwrap().into_raw());
        prop_assert_eq!(result, expected);
    }
}
