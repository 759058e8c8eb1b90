//! Loops, branches, assertions

use crate::tests::helpers::{Deployed, revert_reason};
use alloy_primitives::{I256, U256};
use vyc_data::AbiValue;

const FLOW: &str = r#"
nums: uint256[5]

@external
def fill():
    for i in range(5):
        self.nums[i] = i * i

@view
@external
def total() -> uint256:
    s: uint256 = 0
    for x in self.nums:
        s += x
    return s

@pure
@external
def sum_to(n: uint256) -> uint256:
    s: uint256 = 0
    for i in range(n, bound=100):
        s += i
    return s

@pure
@external
def span(a: int128, b: int128) -> uint256:
    count: uint256 = 0
    for i: int128 in range(a, b, bound=50):
        count += 1
    return count

@pure
@external
def first_odd_over(n: uint256) -> uint256:
    result: uint256 = 0
    for i in range(100):
        if i <= n:
            continue
        if i % 2 == 1:
            result = i
            break
    return result

@pure
@external
def classify(x: uint256) -> uint256:
    if x < 10:
        return 1
    elif x < 100:
        return 2
    else:
        return 3

@pure
@external
def guarded(x: uint256) -> uint256:
    assert x < 10, "too big"
    return x

@pure
@external
def always_fails():
    raise
"#;

fn int(value: i64) -> AbiValue {
    AbiValue::Int(I256::try_from(value).unwrap())
}

#[test]
fn loops_over_storage_arrays() {
    let mut flow = Deployed::new(FLOW);
    assert_eq!(flow.word("total()", &[]), U256::ZERO);
    flow.call("fill()", &[]).unwrap();
    assert_eq!(flow.word("total()", &[]), U256::from(1 + 4 + 9 + 16));
}

#[test]
fn bounded_ranges() {
    let mut flow = Deployed::new(FLOW);
    assert_eq!(flow.word("sum_to(uint256)", &[AbiValue::uint(10)]), U256::from(45));
    assert_eq!(flow.word("sum_to(uint256)", &[AbiValue::uint(0)]), U256::ZERO);
    assert_eq!(flow.word("sum_to(uint256)", &[AbiValue::uint(100)]), U256::from(4950));
    flow.reverts("sum_to(uint256)", &[AbiValue::uint(101)]);
}

#[test]
fn signed_ranges() {
    let mut flow = Deployed::new(FLOW);
    assert_eq!(flow.word("span(int128,int128)", &[int(-3), int(4)]), U256::from(7));
    // An end before the start iterates zero times
    assert_eq!(flow.word("span(int128,int128)", &[int(4), int(-3)]), U256::ZERO);
    flow.reverts("span(int128,int128)", &[int(0), int(51)]);
}

#[test]
fn break_and_continue() {
    let mut flow = Deployed::new(FLOW);
    assert_eq!(flow.word("first_odd_over(uint256)", &[AbiValue::uint(4)]), U256::from(5));
    assert_eq!(flow.word("first_odd_over(uint256)", &[AbiValue::uint(98)]), U256::from(99));
    assert_eq!(flow.word("first_odd_over(uint256)", &[AbiValue::uint(99)]), U256::ZERO);
}

#[test]
fn elif_chains() {
    let mut flow = Deployed::new(FLOW);
    for (x, class) in [(5, 1), (50, 2), (500, 3)] {
        assert_eq!(flow.word("classify(uint256)", &[AbiValue::uint(x)]), U256::from(class));
    }
}

#[test]
fn assertions_revert_with_reason() {
    let mut flow = Deployed::new(FLOW);
    assert_eq!(flow.word("guarded(uint256)", &[AbiValue::uint(3)]), U256::from(3));
    let failure = flow.reverts("guarded(uint256)", &[AbiValue::uint(10)]);
    assert_eq!(revert_reason(&failure).as_deref(), Some("too big"));

    let failure = flow.reverts("always_fails()", &[]);
    assert_eq!(failure.revert_data().map(|data| data.len()), Some(0));
}
