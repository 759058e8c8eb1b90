//! Interpretation of type annotations.

use super::ModuleContext;
use crate::scope::Location;
use alloy_primitives::U256;
use vyc_data::{IntType, Type, TypedExpr, hir::ExprKind as HirExprKind};
use vyc_syntax::{
    Diagnostic, Result,
    ast::{Expr, ExprKind},
};

const MAX_ARRAY_LEN: u64 = 1 << 16;
const MAX_BYTES_LEN: u64 = 1 << 20;
const MAX_TYPE_SIZE: u64 = 1 << 24;

impl ModuleContext<'_> {
    /// Any type, `HashMap` included.
    pub(crate) fn resolve_type(&self, annotation: &Expr<'_>) -> Result<Type> {
        let ty = match &annotation.kind {
            ExprKind::Name(name) => self.named_type(name).ok_or_else(|| {
                Diagnostic::structure(format!("unknown type `{name}`"), annotation.span.clone())
            })?,
            ExprKind::Subscript { value, index } => match value.as_name() {
                Some("HashMap") => {
                    let ExprKind::Tuple(members) = &index.kind else {
                        return Err(Diagnostic::type_error(
                            "HashMap needs a key and a value type",
                            index.span.clone(),
                        ));
                    };
                    let [key, value] = members.as_slice() else {
                        return Err(Diagnostic::type_error(
                            "HashMap needs a key and a value type",
                            index.span.clone(),
                        ));
                    };
                    let key_ty = self.resolve_type(key)?;
                    if !key_ty.is_word() {
                        return Err(Diagnostic::type_error(
                            format!("`{key_ty}` cannot be used as a HashMap key"),
                            key.span.clone(),
                        ));
                    }
                    Type::HashMap(Box::new(key_ty), Box::new(self.resolve_type(value)?))
                }
                Some(kind @ ("Bytes" | "String")) => {
                    let len = self.array_bound(index, MAX_BYTES_LEN)?;
                    if kind == "Bytes" { Type::Bytes(len) } else { Type::String(len) }
                }
                Some("DynArray") => {
                    return Err(Diagnostic::type_error(
                        "dynamic arrays are not supported",
                        annotation.span.clone(),
                    ));
                }
                _ => {
                    let element = self.resolve_type(value)?;
                    if !element.is_value_type() {
                        return Err(Diagnostic::type_error(
                            "arrays of HashMap are not supported",
                            value.span.clone(),
                        ));
                    }
                    let len = self.array_bound(index, MAX_ARRAY_LEN)?;
                    if u64::from(element.memory_size()) * u64::from(len) > MAX_TYPE_SIZE {
                        return Err(Diagnostic::type_error(
                            format!("type `{element}[{len}]` is too large"),
                            annotation.span.clone(),
                        ));
                    }
                    Type::Array(Box::new(element), len)
                }
            },
            _ => {
                return Err(Diagnostic::type_error(
                    "expected a type annotation",
                    annotation.span.clone(),
                ));
            }
        };
        if u64::from(ty.memory_size()) > MAX_TYPE_SIZE {
            return Err(Diagnostic::type_error(
                format!("type `{ty}` is too large"),
                annotation.span.clone(),
            ));
        }
        Ok(ty)
    }

    /// A type whose values can live in memory: everything but `HashMap`.
    pub(crate) fn resolve_value_type(&self, annotation: &Expr<'_>) -> Result<Type> {
        let ty = self.resolve_type(annotation)?;
        if !ty.is_value_type() {
            return Err(Diagnostic::type_error(
                "HashMap is only allowed as the type of a storage variable",
                annotation.span.clone(),
            ));
        }
        Ok(ty)
    }

    fn named_type(&self, name: &str) -> Option<Type> {
        match name {
            "bool" => return Some(Type::Bool),
            "address" => return Some(Type::Address),
            _ => {}
        }
        if let Some(ty) = self.structs.get(name) {
            return Some(Type::Struct(ty.clone()));
        }
        if let Some(ty) = self.interfaces.get(name) {
            return Some(Type::Interface(ty.clone()));
        }
        let (signed, bits) = match name.strip_prefix("uint") {
            Some(bits) => (false, bits),
            None => match name.strip_prefix("int") {
                Some(bits) => (true, bits),
                None => {
                    let m = name.strip_prefix("bytes")?.parse::<u8>().ok()?;
                    return (1..=32).contains(&m).then_some(Type::BytesM(m));
                }
            },
        };
        let bits = bits.parse::<u16>().ok()?;
        (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(Type::Int(IntType { signed, bits }))
    }

    /// Length of an array or byte array: an integer literal or an integer constant.
    fn array_bound(&self, bound: &Expr<'_>, max: u64) -> Result<u32> {
        let value = match &bound.kind {
            ExprKind::Int(value) => Some(*value),
            ExprKind::Name(name) => {
                match self.scopes.lookup(self.scopes.module(), name).map(|b| &b.location) {
                    Some(Location::Constant(TypedExpr {
                        kind: HirExprKind::Literal(value),
                        ty: Type::Int(int),
                        ..
                    })) if !int.signed || !value.bit(255) => Some(*value),
                    _ => None,
                }
            }
            _ => None,
        };
        let Some(value) = value else {
            return Err(Diagnostic::type_error(
                "array bound must be an integer literal or constant",
                bound.span.clone(),
            ));
        };
        if value == U256::ZERO || value > U256::from(max) {
            return Err(Diagnostic::type_error(
                format!("array bound must be between 1 and {max}"),
                bound.span.clone(),
            ));
        }
        Ok(value.to::<u32>())
    }
}
