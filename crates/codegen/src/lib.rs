//! EVM bytecode generator for typed contracts
//!
//! Translates a [`Contract`] produced by semantic analysis into two code objects:
//! - the runtime code: a selector dispatcher, the external functions and every internal
//!   function they reach. Immutables are read from the end of the deployed code.
//! - the init code: the constructor, then a deployer returning the runtime code with the
//!   immutables appended. Constructor arguments are read from the end of the init code.
//!
//! ## Memory Layout
//! - `0x00-0x7F`: scratch space for hashing
//! - init code only: immutables under construction
//! - one statically allocated frame per function for locals and temporaries
//! - after the frames: buffers of runtime size (created init code, deployed code)
//!
//! The creation builtins (`create_minimal_proxy_to`, `create_copy_of`,
//! `create_from_blueprint`) assemble init code from the [`templates`] at runtime; [`address`]
//! predicts the addresses they deploy to.

pub mod address;
mod error;
pub mod templates;
mod translator;

#[cfg(test)]
mod tests;

pub use error::{CodegenError, Result};
pub use translator::{CodeObject, Translator};

use evm_glue::assembler::{assemble_maximized, assemble_minimized};
use vyc_data::Contract;

/// How marks are resolved to code offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Smallest push for every reference
    #[default]
    Minimized,
    /// PUSH2 for every reference
    Maximized,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    pub assembly: AssemblyMode,
}

/// The two code objects of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytecode {
    /// Runs the constructor and returns the runtime code followed by the immutables.
    pub init: Vec<u8>,
    /// Deployed code, without the immutables.
    pub runtime: Vec<u8>,
}

pub fn generate(contract: &Contract) -> Result<Bytecode> {
    generate_with_config(contract, Config::default())
}

pub fn generate_with_config(contract: &Contract, config: Config) -> Result<Bytecode> {
    let mut translator = Translator::runtime(contract)?;
    translator.translate()?;
    let runtime = assemble(&translator.into_asm(), config.assembly)?;

    let mut translator = Translator::init(contract, runtime.clone())?;
    translator.translate()?;
    let init = assemble(&translator.into_asm(), config.assembly)?;

    tracing::debug!(init = init.len(), runtime = runtime.len(), "generated bytecode");
    Ok(Bytecode { init, runtime })
}

fn assemble(asm: &[evm_glue::assembly::Asm], mode: AssemblyMode) -> Result<Vec<u8>> {
    let assembled = match mode {
        AssemblyMode::Minimized => assemble_minimized(asm, true),
        AssemblyMode::Maximized => assemble_maximized(asm, true),
    };
    let (_, bytecode) = assembled.map_err(|e| CodegenError::Assembly(format!("{e:?}")))?;
    Ok(bytecode)
}
