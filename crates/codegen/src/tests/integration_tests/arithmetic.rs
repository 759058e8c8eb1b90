//! Checked arithmetic on deployed code

use crate::tests::helpers::Deployed;
use alloy_primitives::{I256, U256};
use vyc_data::AbiValue;

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
def div(a: uint256, b: uint256) -> uint256:
    return a / b

@pure
@external
def add8(a: uint8, b: uint8) -> uint8:
    return a + b

@pure
@external
def sub128(a: int128, b: int128) -> int128:
    return a - b

@pure
@external
def div128(a: int128, b: int128) -> int128:
    return a // b

@pure
@external
def mod256(a: int256, b: int256) -> int256:
    return a % b

@pure
@external
def mul256(a: int256, b: int256) -> int256:
    return a * b

@pure
@external
def neg(a: int256) -> int256:
    return -a

@pure
@external
def shifted(a: uint256, n: uint256) -> uint256:
    return (a << n) | (a >> n)
"#;

fn int(value: i128) -> AbiValue {
    AbiValue::Int(I256::try_from(value).unwrap())
}

fn as_int(word: U256) -> I256 {
    I256::from_raw(word)
}

#[test]
fn unsigned_operations() {
    let mut math = Deployed::new(MATH);
    let (a, b) = (AbiValue::uint(12), AbiValue::uint(5));
    let ab = [a, b];
    assert_eq!(math.word("add(uint256,uint256)", &ab), U256::from(17));
    assert_eq!(math.word("sub(uint256,uint256)", &ab), U256::from(7));
    assert_eq!(math.word("mul(uint256,uint256)", &ab), U256::from(60));
    assert_eq!(math.word("div(uint256,uint256)", &ab), U256::from(2));
    assert_eq!(math.word("add8(uint8,uint8)", &ab), U256::from(17));
}

#[test]
fn unsigned_overflow_reverts() {
    let mut math = Deployed::new(MATH);
    let max = AbiValue::Uint(U256::MAX);
    math.reverts("add(uint256,uint256)", &[max.clone(), AbiValue::uint(1)]);
    math.reverts("sub(uint256,uint256)", &[AbiValue::uint(1), AbiValue::uint(2)]);
    math.reverts("mul(uint256,uint256)", &[max.clone(), AbiValue::uint(2)]);
    math.reverts("div(uint256,uint256)", &[max, AbiValue::uint(0)]);
    math.reverts("add8(uint8,uint8)", &[AbiValue::uint(200), AbiValue::uint(56)]);
    assert_eq!(
        math.word("add8(uint8,uint8)", &[AbiValue::uint(200), AbiValue::uint(55)]),
        U256::from(255)
    );
    let zero_times = [AbiValue::uint(0), AbiValue::uint(2)];
    assert_eq!(math.word("mul(uint256,uint256)", &zero_times), U256::ZERO);
}

#[test]
fn signed_operations() {
    let mut math = Deployed::new(MATH);
    let result = math.word("sub128(int128,int128)", &[int(-5), int(7)]);
    assert_eq!(as_int(result), I256::try_from(-12).unwrap());
    // Division truncates toward zero
    let result = math.word("div128(int128,int128)", &[int(-7), int(2)]);
    assert_eq!(as_int(result), I256::try_from(-3).unwrap());
    let result = math.word("mod256(int256,int256)", &[int(-7), int(3)]);
    assert_eq!(as_int(result), I256::try_from(-1).unwrap());
    let result = math.word("mul256(int256,int256)", &[int(-4), int(6)]);
    assert_eq!(as_int(result), I256::try_from(-24).unwrap());
    let result = math.word("neg(int256)", &[int(9)]);
    assert_eq!(as_int(result), I256::try_from(-9).unwrap());
}

#[test]
fn signed_overflow_reverts() {
    let mut math = Deployed::new(MATH);
    math.reverts("sub128(int128,int128)", &[int(i128::MIN), int(1)]);
    math.reverts("div128(int128,int128)", &[int(i128::MIN), int(-1)]);
    math.reverts("div128(int128,int128)", &[int(1), int(0)]);
    math.reverts("mod256(int256,int256)", &[int(1), int(0)]);

    let min = AbiValue::Int(I256::MIN);
    math.reverts("neg(int256)", &[min.clone()]);
    math.reverts("mul256(int256,int256)", &[min.clone(), int(-1)]);
    math.reverts("mul256(int256,int256)", &[int(-1), min]);
}

#[test]
fn shifts() {
    let mut math = Deployed::new(MATH);
    let word = math.word("shifted(uint256,uint256)", &[AbiValue::uint(0x0f0), AbiValue::uint(4)]);
    assert_eq!(word, U256::from(0xf00 | 0x0f));
}
