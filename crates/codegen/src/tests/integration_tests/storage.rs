//! Storage variables, mappings, structs and getters

use crate::tests::helpers::Deployed;
use alloy_primitives::{Address, I256, U256};
use test_utils::DEFAULT_CALLER;
use vyc_data::AbiValue;

const REGISTRY: &str = r#"
struct Point:
    x: int128
    y: int128

owner: public(address)
counter: public(uint256)
balances: public(HashMap[address, uint256])
points: HashMap[uint256, Point]
history: uint256[4]

@external
def __init__():
    self.owner = msg.sender

@external
def bump(by: uint256) -> uint256:
    self.counter += by
    return self.counter

@external
def deposit(who: address, amount: uint256):
    self.balances[who] += amount

@external
def set_point(key: uint256, x: int128, y: int128):
    self.points[key] = Point({x: x, y: y})

@view
@external
def point_y(key: uint256) -> int128:
    return self.points[key].y

@external
def record(i: uint256, v: uint256):
    self.history[i] = v

@view
@external
def recorded(i: uint256) -> uint256:
    return self.history[i]
"#;

fn int(value: i64) -> AbiValue {
    AbiValue::Int(I256::try_from(value).unwrap())
}

#[test]
fn constructor_writes_storage() {
    let mut registry = Deployed::new(REGISTRY);
    let owner = registry.word("owner()", &[]);
    assert_eq!(owner, U256::from_be_slice(DEFAULT_CALLER.as_slice()));
}

#[test]
fn augmented_assignment_accumulates() {
    let mut registry = Deployed::new(REGISTRY);
    assert_eq!(registry.word("bump(uint256)", &[AbiValue::uint(2)]), U256::from(2));
    assert_eq!(registry.word("bump(uint256)", &[AbiValue::uint(3)]), U256::from(5));
    assert_eq!(registry.word("counter()", &[]), U256::from(5));
}

#[test]
fn mapping_entries_are_independent() {
    let mut registry = Deployed::new(REGISTRY);
    let (alice, bob) = (Address::repeat_byte(0xa1), Address::repeat_byte(0xb0));
    for (who, amount) in [(alice, 7), (alice, 3), (bob, 1)] {
        let args = [AbiValue::Address(who), AbiValue::uint(amount)];
        registry.call("deposit(address,uint256)", &args).unwrap();
    }

    assert_eq!(registry.word("balances(address)", &[AbiValue::Address(alice)]), U256::from(10));
    assert_eq!(registry.word("balances(address)", &[AbiValue::Address(bob)]), U256::from(1));
    let nobody = AbiValue::Address(Address::ZERO);
    assert_eq!(registry.word("balances(address)", &[nobody]), U256::ZERO);
}

#[test]
fn struct_fields_in_mappings() {
    let mut registry = Deployed::new(REGISTRY);
    let signature = "set_point(uint256,int128,int128)";
    registry.call(signature, &[AbiValue::uint(1), int(-5), int(-9)]).unwrap();
    registry.call(signature, &[AbiValue::uint(2), int(4), int(8)]).unwrap();

    let y = registry.word("point_y(uint256)", &[AbiValue::uint(1)]);
    assert_eq!(I256::from_raw(y), I256::try_from(-9).unwrap());
    assert_eq!(registry.word("point_y(uint256)", &[AbiValue::uint(2)]), U256::from(8));
}

#[test]
fn out_of_range_arguments_are_rejected() {
    let mut registry = Deployed::new(REGISTRY);
    // 2**127 does not fit an int128
    let too_big = AbiValue::Uint(U256::from(1) << 127);
    registry.reverts("set_point(uint256,int128,int128)", &[AbiValue::uint(1), too_big, int(0)]);
}

#[test]
fn array_indices_are_bounds_checked() {
    let mut registry = Deployed::new(REGISTRY);
    registry.call("record(uint256,uint256)", &[AbiValue::uint(3), AbiValue::uint(9)]).unwrap();
    assert_eq!(registry.word("recorded(uint256)", &[AbiValue::uint(3)]), U256::from(9));
    assert_eq!(registry.word("recorded(uint256)", &[AbiValue::uint(0)]), U256::ZERO);

    registry.reverts("record(uint256,uint256)", &[AbiValue::uint(4), AbiValue::uint(1)]);
    registry.reverts("recorded(uint256)", &[AbiValue::Uint(U256::MAX)]);
}
