//! Semantic analysis: structural validation, then name resolution and typing into the
//! [`Contract`] consumed by code generation.

mod builtins;
mod check;
pub mod scope;
pub mod structure;

pub use check::check_module;
pub use structure::validate;

use vyc_data::Contract;
use vyc_syntax::{Result, ast::Module};

/// Validates `module` and resolves it into a typed contract. The first diagnostic aborts.
pub fn analyze(module: &Module<'_>) -> Result<Contract> {
    validate(module)?;
    tracing::debug!(items = module.items.len(), "structure validated");
    check_module(module)
}
