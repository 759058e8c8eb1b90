//! Layout of the runtime dispatcher and the init code

use crate::tests::helpers::{analyze, assert_opcode_counts, compile, count_opcode, runtime_asm};
use crate::{AssemblyMode, Config, generate_with_config};

const TWO_FUNCTIONS: &str = r#"
@external
def f(a: uint256, b: uint256 = 1):
    pass

@external
def g():
    pass
"#;

#[test]
fn one_comparison_per_entry_point() {
    let asm = runtime_asm(TWO_FUNCTIONS);
    // f(uint256), f(uint256,uint256), g()
    assert_opcode_counts(&asm, &[("EQ", 3), ("CALLVALUE", 3), ("CALLDATALOAD", 1)]);
}

#[test]
fn payable_entries_skip_the_value_check() {
    let asm = runtime_asm("@payable\n@external\ndef f():\n    pass\n");
    assert_eq!(count_opcode(&asm, "CALLVALUE"), 0);
}

#[test]
fn fallback_runs_on_short_calldata() {
    let source = "x: uint256\n@external\ndef __default__():\n    self.x = 1\n";
    let asm = runtime_asm(source);
    assert_opcode_counts(&asm, &[("SSTORE", 1), ("EQ", 0)]);
}

#[test]
fn getters_read_storage() {
    let asm = runtime_asm("x: public(uint256)\n@external\ndef set(v: uint256):\n    self.x = v\n");
    assert_opcode_counts(&asm, &[("SLOAD", 1), ("SSTORE", 1)]);
}

#[test]
fn init_code_embeds_the_runtime_code() {
    let bytecode = compile(TWO_FUNCTIONS);
    let runtime = bytecode.runtime.as_slice();
    let position = bytecode.init.windows(runtime.len()).position(|w| w == runtime);
    let position = position.expect("runtime code is embedded");
    assert_eq!(position + bytecode.runtime.len(), bytecode.init.len());
}

#[test]
fn maximized_assembly_is_not_smaller() {
    let contract = analyze(TWO_FUNCTIONS);
    let minimized = generate_with_config(&contract, Config::default()).unwrap();
    let maximized =
        generate_with_config(&contract, Config { assembly: AssemblyMode::Maximized }).unwrap();
    assert!(maximized.runtime.len() >= minimized.runtime.len());
}

#[test]
fn translation_is_deterministic() {
    assert_eq!(compile(TWO_FUNCTIONS), compile(TWO_FUNCTIONS));
}
