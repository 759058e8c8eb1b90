//! Builtin functions: `len`, `empty`, `keccak256` and the contract creation family.

use crate::check::{Checker, coerce, reject_keywords};
use alloy_primitives::{U256, keccak256};
use vyc_data::{CreationCall, CreationStrategy, Type, TypedExpr, hir::ExprKind};
use vyc_syntax::{
    Diagnostic, DiagnosticKind, Result, Span,
    ast::{Expr, Keyword},
};

/// Creation builtin named `name`, if any.
pub(crate) fn creation_strategy(name: &str) -> Option<CreationStrategy> {
    match name {
        "create_minimal_proxy_to" => Some(CreationStrategy::MinimalProxy),
        "create_from_factory" | "create_from_blueprint" => Some(CreationStrategy::FactoryForward),
        "create_copy_of" => Some(CreationStrategy::RuntimeCopy),
        _ => None,
    }
}

/// Type errors in builtin arguments are reported as argument errors.
fn as_argument(diagnostic: Diagnostic) -> Diagnostic {
    match diagnostic.kind {
        DiagnosticKind::Type => Diagnostic { kind: DiagnosticKind::Argument, ..diagnostic },
        _ => diagnostic,
    }
}

fn single<'a, 'src>(
    name: &str,
    args: &'a [Expr<'src>],
    keywords: &[Keyword<'src>],
    span: &Span,
) -> Result<&'a Expr<'src>> {
    reject_keywords(keywords, name)?;
    match args {
        [arg] => Ok(arg),
        _ => Err(Diagnostic::argument(
            format!("`{name}` takes exactly one argument, {} given", args.len()),
            span.clone(),
        )),
    }
}

impl<'src> Checker<'_, 'src> {
    /// Checks a call to the builtin `name`. Returns `None` if `name` is not a builtin.
    pub(crate) fn builtin(
        &mut self,
        name: &str,
        args: &[Expr<'src>],
        keywords: &[Keyword<'src>],
        span: Span,
    ) -> Result<Option<TypedExpr>> {
        let value = match name {
            "len" => {
                let arg = single(name, args, keywords, &span)?;
                let value = self.expr(arg, None).map_err(as_argument)?;
                match (&value.kind, &value.ty) {
                    (ExprKind::BytesLiteral(bytes), _) => {
                        let len = ExprKind::Literal(U256::from(bytes.len()));
                        TypedExpr::new(len, Type::UINT256, span)
                    }
                    (_, Type::Bytes(_) | Type::String(_)) => {
                        TypedExpr::new(ExprKind::Len(Box::new(value)), Type::UINT256, span)
                    }
                    (_, Type::Array(_, len)) => {
                        TypedExpr::new(ExprKind::Literal(U256::from(*len)), Type::UINT256, span)
                    }
                    (_, ty) => {
                        return Err(Diagnostic::argument(
                            format!("`len` expects a byte array, string or array, found `{ty}`"),
                            value.span.clone(),
                        ));
                    }
                }
            }
            "empty" => {
                let arg = single(name, args, keywords, &span)?;
                let ty = self.module.resolve_value_type(arg).map_err(as_argument)?;
                if ty.is_word() {
                    TypedExpr::new(ExprKind::Literal(U256::ZERO), ty, span)
                } else {
                    TypedExpr::new(ExprKind::Empty, ty, span)
                }
            }
            "keccak256" => {
                let arg = single(name, args, keywords, &span)?;
                let value = self.infer(arg, Some(&Type::Bytes(u32::MAX))).map_err(as_argument)?;
                match (&value.kind, &value.ty) {
                    (ExprKind::BytesLiteral(bytes), _) => {
                        let hash = U256::from_be_bytes(keccak256(bytes).0);
                        TypedExpr::new(ExprKind::Literal(hash), Type::BytesM(32), span)
                    }
                    (_, Type::Bytes(_) | Type::String(_) | Type::BytesM(32)) => {
                        TypedExpr::new(ExprKind::Keccak256(Box::new(value)), Type::BytesM(32), span)
                    }
                    (_, ty) => {
                        return Err(Diagnostic::argument(
                            format!("`keccak256` expects bytes, a string or bytes32, found `{ty}`"),
                            value.span.clone(),
                        ));
                    }
                }
            }
            "range" => {
                return Err(Diagnostic::structure(
                    "`range` can only be used as the iterable of a `for` loop",
                    span,
                ));
            }
            _ => match creation_strategy(name) {
                Some(strategy) => self.creation(name, strategy, args, keywords, span)?,
                None => return Ok(None),
            },
        };
        Ok(Some(value))
    }

    /// Resolves a call to one of the creation builtins.
    fn creation(
        &mut self,
        name: &str,
        strategy: CreationStrategy,
        args: &[Expr<'src>],
        keywords: &[Keyword<'src>],
        span: Span,
    ) -> Result<TypedExpr> {
        let Some((target, forwarded)) = args.split_first() else {
            return Err(Diagnostic::argument(
                format!("`{name}` needs a target address"),
                span,
            ));
        };
        if strategy != CreationStrategy::FactoryForward && !forwarded.is_empty() {
            return Err(Diagnostic::argument(
                format!("`{name}` takes exactly one positional argument, {} given", args.len()),
                span,
            ));
        }
        self.require_state_write("deploying a contract", &span)?;

        let target = self.infer(target, Some(&Type::Address)).map_err(as_argument)?;
        let target = match target.ty {
            Type::Interface(_) => TypedExpr { ty: Type::Address, ..target },
            _ => coerce(target, &Type::Address).map_err(as_argument)?,
        };
        let mut args = Vec::with_capacity(forwarded.len());
        for arg in forwarded {
            let value = self.expr(arg, None).map_err(as_argument)?;
            if !value.ty.is_value_type() {
                return Err(Diagnostic::argument(
                    format!("`{}` cannot be passed to a constructor", value.ty),
                    value.span,
                ));
            }
            args.push(value);
        }

        let mut call = CreationCall {
            strategy,
            target,
            args,
            value: None,
            salt: None,
            revert_on_failure: true,
            code_offset: 0,
        };
        for keyword in keywords {
            let value = &keyword.value;
            match keyword.name.inner {
                "value" => {
                    let value = self.expr(value, Some(&Type::UINT256)).map_err(as_argument)?;
                    call.value = Some(value)
                }
                "salt" => {
                    let salt = self.expr(value, Some(&Type::BytesM(32))).map_err(as_argument)?;
                    call.salt = Some(salt)
                }
                "revert_on_failure" => {
                    let flag = self.expr(value, Some(&Type::Bool)).map_err(as_argument)?;
                    let Some(flag) = flag.as_literal() else {
                        return Err(Diagnostic::argument(
                            "`revert_on_failure` must be a constant",
                            value.span.clone(),
                        ));
                    };
                    call.revert_on_failure = !flag.is_zero();
                }
                "code_offset" if strategy == CreationStrategy::FactoryForward => {
                    let offset = self.expr(value, Some(&Type::UINT256)).map_err(as_argument)?;
                    match offset.as_literal() {
                        Some(offset) if offset <= U256::from(u32::MAX) => {
                            call.code_offset = offset.to::<u32>()
                        }
                        _ => {
                            return Err(Diagnostic::argument(
                                "`code_offset` must be a constant that fits in 32 bits",
                                value.span.clone(),
                            ));
                        }
                    }
                }
                other => {
                    return Err(Diagnostic::argument(
                        format!("unexpected keyword argument `{other}` for `{name}`"),
                        keyword.name.span.clone(),
                    ));
                }
            }
        }

        tracing::trace!(?strategy, create2 = call.uses_create2(), "resolved creation builtin");
        Ok(TypedExpr::new(ExprKind::Create(Box::new(call)), Type::Address, span))
    }
}
