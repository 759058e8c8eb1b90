//! Semantic data model shared by analysis and code generation.

pub mod abi;
pub mod hir;
pub mod index;
pub mod types;

pub use crate::{
    abi::{AbiValue, encode_call, encode_params, selector},
    hir::{
        Call, CallTarget, Contract, CreationCall, CreationStrategy, ExprKind, Function,
        FunctionKind, Stmt, TypedExpr,
    },
    index::*,
    types::{ExternalSignature, IntType, InterfaceType, Mutability, StructType, Type},
};
