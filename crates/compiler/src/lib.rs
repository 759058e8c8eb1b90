//! Compiles contract source text into deployable EVM bytecode.
//!
//! The pipeline is parse, structure validation, type checking, then code generation. The first
//! diagnostic aborts compilation, no bytecode is produced for a rejected unit.
//!
//! ```no_run
//! let contract = vyc::compile("@external\ndef f() -> uint256:\n    return 1\n")?;
//! let init_code = contract.deploy_code(&[])?;
//! # Ok::<(), vyc::CompileError>(())
//! ```

use std::collections::BTreeMap;
use thiserror::Error;
use vyc_data::{abi::encode_params, types::Type};

pub use vyc_codegen::{AssemblyMode, CodegenError, Config};
pub use vyc_data::AbiValue;
pub use vyc_syntax::{Diagnostic, DiagnosticKind};

#[derive(Debug, Error)]
pub enum CompileError {
    /// The source was rejected.
    #[error(transparent)]
    Diagnostic(#[from] Diagnostic),

    /// The backend could not lower a checked contract.
    #[error("internal compiler error: {0}")]
    Codegen(#[from] CodegenError),

    #[error("constructor takes {expected} arguments, {found} given")]
    ConstructorArgumentCount { expected: usize, found: usize },

    #[error("constructor argument {index} is not a valid `{expected}`")]
    ConstructorArgumentType { index: usize, expected: String },
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// Output of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledContract {
    /// Runs the constructor. Constructor arguments are appended to it.
    pub init_code: Vec<u8>,
    /// Code stored at the contract's address, without the immutables appended at deployment.
    pub runtime_code: Vec<u8>,
    /// Selector of every external entry point by canonical signature. Functions with default
    /// arguments have one entry per accepted argument count.
    pub method_identifiers: BTreeMap<String, [u8; 4]>,
    pub constructor_inputs: Vec<Type>,
}

impl CompiledContract {
    /// Init code followed by the ABI encoded constructor arguments.
    pub fn deploy_code(&self, args: &[AbiValue]) -> Result<Vec<u8>> {
        if args.len() != self.constructor_inputs.len() {
            return Err(CompileError::ConstructorArgumentCount {
                expected: self.constructor_inputs.len(),
                found: args.len(),
            });
        }
        for (index, (arg, ty)) in args.iter().zip(&self.constructor_inputs).enumerate() {
            if !arg.matches(ty) {
                return Err(CompileError::ConstructorArgumentType {
                    index,
                    expected: ty.to_string(),
                });
            }
        }
        let mut code = self.init_code.clone();
        code.extend_from_slice(&encode_params(args));
        Ok(code)
    }
}

pub fn compile(source: &str) -> Result<CompiledContract> {
    compile_with_config(source, Config::default())
}

pub fn compile_with_config(source: &str, config: Config) -> Result<CompiledContract> {
    let module = vyc_syntax::parse_module(source)?;
    tracing::debug!(items = module.items.len(), "parsed");
    let contract = vyc_sema::analyze(&module)?;
    tracing::debug!(functions = contract.functions.len(), "checked");
    let bytecode = vyc_codegen::generate_with_config(&contract, config)?;

    let mut method_identifiers = BTreeMap::new();
    for (_, function) in contract.external_functions() {
        let signature = function.signature();
        for arity in function.required_params()..=function.params.len() {
            let mut shortened = signature.clone();
            shortened.params.truncate(arity);
            method_identifiers.insert(shortened.canonical(), shortened.selector());
        }
    }
    let constructor_inputs = match contract.constructor {
        Some(id) => contract.functions[id].param_types().cloned().collect(),
        None => Vec::new(),
    };

    tracing::trace!(
        init = bytecode.init.len(),
        runtime = bytecode.runtime.len(),
        entry_points = method_identifiers.len(),
        "compiled"
    );
    Ok(CompiledContract {
        init_code: bytecode.init,
        runtime_code: bytecode.runtime,
        method_identifiers,
        constructor_inputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETER: &str = r#"
greeting: public(String[16])

@external
def __init__(g: String[16]):
    self.greeting = g

@external
def set(g: String[16], repeat: uint256 = 1):
    self.greeting = g
"#;

    #[test]
    fn method_identifiers_cover_default_arities() {
        let contract = compile(GREETER).unwrap();
        let names: Vec<&str> = contract.method_identifiers.keys().map(String::as_str).collect();
        assert_eq!(names, ["greeting()", "set(string)", "set(string,uint256)"]);
        assert_eq!(contract.method_identifiers["greeting()"], vyc_data::selector("greeting()"));
        assert_eq!(contract.constructor_inputs, [Type::String(16)]);
    }

    #[test]
    fn deploy_code_checks_constructor_arguments() {
        let contract = compile(GREETER).unwrap();
        assert!(matches!(
            contract.deploy_code(&[]),
            Err(CompileError::ConstructorArgumentCount { expected: 1, found: 0 })
        ));
        let too_long = AbiValue::String("x".repeat(17));
        assert!(matches!(
            contract.deploy_code(&[too_long]),
            Err(CompileError::ConstructorArgumentType { index: 0, .. })
        ));

        let code = contract.deploy_code(&[AbiValue::String("hi".into())]).unwrap();
        assert!(code.starts_with(&contract.init_code));
        assert_eq!(code.len(), contract.init_code.len() + 96);
    }

    #[test]
    fn diagnostics_abort_compilation() {
        let err = compile("@external\ndef f():\n    x: bool = 1\n").unwrap_err();
        let CompileError::Diagnostic(diagnostic) = err else { panic!("expected a diagnostic") };
        assert_eq!(diagnostic.kind, DiagnosticKind::Type);
    }
}
