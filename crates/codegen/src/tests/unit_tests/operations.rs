//! Opcodes chosen for expressions, calls and creation builtins

use crate::tests::helpers::{assert_opcode_counts, runtime_asm};

#[test]
fn division_follows_signedness() {
    let asm = runtime_asm(
        r#"
@pure
@external
def unsigned(a: uint256, b: uint256) -> uint256:
    return a / b

@pure
@external
def signed(a: int256, b: int256) -> int256:
    return a % b
"#,
    );
    assert_opcode_counts(&asm, &[("DIV", 1), ("SMOD", 1), ("SDIV", 0), ("MOD", 0)]);
}

#[test]
fn external_calls_follow_mutability() {
    let asm = runtime_asm(
        r#"
interface Oracle:
    def price() -> uint256: view
    def poke(): nonpayable

@view
@external
def read(o: address) -> uint256:
    return Oracle(o).price()

@external
def write(o: address):
    Oracle(o).poke()
"#,
    );
    assert_opcode_counts(&asm, &[("STATICCALL", 1), ("CALL", 1), ("EXTCODESIZE", 2)]);
}

#[test]
fn creation_opcodes() {
    let asm = runtime_asm(
        r#"
@external
def proxy(t: address) -> address:
    return create_minimal_proxy_to(t)

@external
def copy_of(t: address, s: bytes32) -> address:
    return create_copy_of(t, salt=s)
"#,
    );
    assert_opcode_counts(&asm, &[("CREATE", 1), ("CREATE2", 1), ("EXTCODECOPY", 1)]);
}

#[test]
fn indexed_fields_become_topics() {
    let asm = runtime_asm(
        r#"
event Transfer:
    sender: indexed(address)
    receiver: indexed(address)
    amount: uint256

@external
def send(to: address, amount: uint256):
    log Transfer(msg.sender, to, amount)
"#,
    );
    assert_opcode_counts(&asm, &[("LOG3", 1), ("LOG1", 0)]);
}

#[test]
fn internal_functions_are_emitted_once() {
    let asm = runtime_asm(
        r#"
@internal
def double(a: uint256) -> uint256:
    return a * 2

@external
def f(a: uint256) -> uint256:
    return self.double(a) + self.double(a + 1)
"#,
    );
    // One multiplication in the body, checked with one division
    assert_opcode_counts(&asm, &[("MUL", 1), ("DIV", 1)]);
}
