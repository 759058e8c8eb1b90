#![no_main]

use libfuzzer_sys::fuzz_target;

// Any source either compiles or is rejected with a diagnostic
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else { return };
    match vyc::compile(source) {
        Ok(contract) => {
            assert!(!contract.runtime_code.is_empty());
            assert!(contract.init_code.ends_with(&contract.runtime_code));
        }
        Err(vyc::CompileError::Diagnostic(_)) => {}
        Err(err) => panic!("{err}"),
    }
});
