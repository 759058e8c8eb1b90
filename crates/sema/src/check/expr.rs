use super::{Checker, fold, mutability_name};
use crate::scope::Location;
use alloy_primitives::{U256, hex};
use vyc_data::{
    Call, CallTarget, FunctionKind, IntType, Mutability, Type, TypedExpr,
    hir::{AddressMember, BinOp, EnvVar, ExprKind},
};
use vyc_syntax::{
    Diagnostic, Result, Span,
    ast::{self, Expr, Ident, Keyword, UnaryOp},
};

/// Outcome of checking a call expression.
pub(crate) enum CallResult {
    Value(TypedExpr),
    /// Call of a function without a return value.
    Void(Call),
}

/// Integer literals whose type is decided by the other operand.
fn is_untyped_literal(expr: &Expr<'_>) -> bool {
    match &expr.kind {
        ast::ExprKind::Int(_) | ast::ExprKind::Hex(_) => true,
        ast::ExprKind::Unary { op: UnaryOp::Neg | UnaryOp::Invert, operand } => {
            is_untyped_literal(operand)
        }
        ast::ExprKind::BinOp { left, right, .. } => {
            is_untyped_literal(left) && is_untyped_literal(right)
        }
        _ => false,
    }
}

fn literal(value: U256, ty: Type, span: Span) -> TypedExpr {
    TypedExpr::new(ExprKind::Literal(value), ty, span)
}

fn bool_literal(value: bool, span: Span) -> TypedExpr {
    literal(U256::from(value as u8), Type::Bool, span)
}

fn int_type(expected: Option<&Type>) -> Option<&Type> {
    expected.filter(|ty| matches!(ty, Type::Int(_)))
}

impl<'src> Checker<'_, 'src> {
    /// Checks `expr` and requires the result to fit in a location of type `expected`.
    pub(crate) fn expr(&mut self, expr: &Expr<'src>, expected: Option<&Type>) -> Result<TypedExpr> {
        let value = self.infer(expr, expected)?;
        match expected {
            Some(ty) => coerce(value, ty),
            None => Ok(value),
        }
    }

    /// Checks `expr`, using `expected` only to give literals a type.
    pub(crate) fn infer(&mut self, expr: &Expr<'src>, expected: Option<&Type>) -> Result<TypedExpr> {
        let span = expr.span.clone();
        match &expr.kind {
            ast::ExprKind::Int(value) => {
                let int = match expected {
                    Some(Type::Int(int)) => *int,
                    _ => IntType::UINT256,
                };
                if !int.contains(*value) {
                    return Err(Diagnostic::type_error(
                        format!("literal {value} does not fit in `{int}`"),
                        span,
                    ));
                }
                Ok(literal(*value, Type::Int(int), span))
            }
            ast::ExprKind::Hex(digits) => hex_literal(digits, expected, span),
            ast::ExprKind::Str(value) => {
                let len = value.len() as u32;
                let ty = match expected {
                    Some(Type::Bytes(_)) => Type::Bytes(len),
                    _ => Type::String(len),
                };
                Ok(TypedExpr::new(ExprKind::BytesLiteral(value.as_bytes().to_vec().into()), ty, span))
            }
            ast::ExprKind::Bytes(value) => {
                let ty = Type::Bytes(value.len() as u32);
                Ok(TypedExpr::new(ExprKind::BytesLiteral(value.clone().into()), ty, span))
            }
            ast::ExprKind::Bool(value) => Ok(bool_literal(*value, span)),
            ast::ExprKind::List(items) => self.list(items, expected, span),
            ast::ExprKind::Tuple(_) => Err(Diagnostic::type_error("tuples are not supported", span)),
            ast::ExprKind::Dict(_) => Err(Diagnostic::type_error(
                "dict literals are only allowed as struct constructor arguments",
                span,
            )),
            ast::ExprKind::Slice { .. } => {
                Err(Diagnostic::syntax("slicing is not supported, there are no slice values", span))
            }
            ast::ExprKind::Name(name) => self.name(name, span),
            ast::ExprKind::Attribute { value, attr } => self.attribute(value, attr, span),
            ast::ExprKind::Subscript { value, index } => {
                let base = self.expr(value, None)?;
                self.index(base, index, span)
            }
            ast::ExprKind::Call { .. } => match self.call(expr)? {
                CallResult::Value(value) => Ok(value),
                CallResult::Void(_) => {
                    Err(Diagnostic::type_error("function does not return a value", span))
                }
            },
            ast::ExprKind::BinOp { op, left, right } => self.binary(*op, left, right, expected, span),
            ast::ExprKind::Compare { op, left, right } => {
                let (left, right) = self.operands(left, right, None)?;
                let ordered = !matches!(op, ast::CmpOp::Eq | ast::CmpOp::NotEq);
                let comparable = match &left.ty {
                    Type::Int(_) => true,
                    Type::Bytes(_) | Type::String(_) => !ordered,
                    ty => ty.is_word() && !ordered,
                };
                if !comparable {
                    return Err(Diagnostic::type_error(
                        format!("cannot compare values of type `{}`", left.ty),
                        span,
                    ));
                }
                if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                    let signed = matches!(left.ty, Type::Int(IntType { signed: true, .. }));
                    return Ok(bool_literal(fold::compare(*op, signed, l, r), span));
                }
                let kind = ExprKind::Compare { op: *op, left: Box::new(left), right: Box::new(right) };
                Ok(TypedExpr::new(kind, Type::Bool, span))
            }
            ast::ExprKind::BoolOp { op, left, right } => {
                let left = self.expr(left, Some(&Type::Bool))?;
                let right = self.expr(right, Some(&Type::Bool))?;
                if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                    let (l, r) = (!l.is_zero(), !r.is_zero());
                    let value = match op {
                        ast::BoolOp::And => l && r,
                        ast::BoolOp::Or => l || r,
                    };
                    return Ok(bool_literal(value, span));
                }
                let kind = ExprKind::BoolOp { op: *op, left: Box::new(left), right: Box::new(right) };
                Ok(TypedExpr::new(kind, Type::Bool, span))
            }
            ast::ExprKind::Unary { op, operand } => self.unary(*op, operand, expected, span),
        }
    }

    fn list(&mut self, items: &[Expr<'src>], expected: Option<&Type>, span: Span) -> Result<TypedExpr> {
        let element = match expected {
            Some(Type::Array(element, len)) => {
                if items.len() != *len as usize {
                    return Err(Diagnostic::type_error(
                        format!("expected {len} elements, found {}", items.len()),
                        span,
                    ));
                }
                Some((**element).clone())
            }
            _ => None,
        };
        let mut typed = Vec::with_capacity(items.len());
        let mut element = element;
        for item in items {
            let value = self.expr(item, element.as_ref())?;
            element.get_or_insert_with(|| value.ty.clone());
            typed.push(value);
        }
        let Some(element) = element else {
            return Err(Diagnostic::type_error("empty list literals are not supported", span));
        };
        let ty = Type::Array(Box::new(element), typed.len() as u32);
        Ok(TypedExpr::new(ExprKind::List(typed), ty, span))
    }

    fn name(&mut self, name: &str, span: Span) -> Result<TypedExpr> {
        if name == "self" {
            return self.environment(EnvVar::SelfAddress, span);
        }
        let Some(binding) = self.module.scopes.lookup(self.scope, name) else {
            if self.module.storage.contains_key(name) {
                return Err(Diagnostic::structure(
                    format!("`{name}` is a storage variable, access it as `self.{name}`"),
                    span,
                ));
            }
            return Err(Diagnostic::structure(format!("undeclared name `{name}`"), span));
        };
        let ty = binding.ty.clone();
        match &binding.location {
            Location::Memory(local) => Ok(TypedExpr::new(ExprKind::Local(*local), ty, span)),
            Location::Constant(value) => Ok(TypedExpr { ty, span, ..value.clone() }),
            Location::Immutable(id) => {
                let id = *id;
                self.require_state_read(&span)?;
                Ok(TypedExpr::new(ExprKind::Immutable(id), ty, span))
            }
        }
    }

    pub(crate) fn environment(&self, var: EnvVar, span: Span) -> Result<TypedExpr> {
        let Some(state) = &self.function else {
            return Err(Diagnostic::type_error("value must be a compile-time constant", span));
        };
        if state.mutability == Mutability::Pure {
            return Err(Diagnostic::structure("pure functions cannot read the environment", span));
        }
        if var == EnvVar::MsgValue
            && state.mutability != Mutability::Payable
            && state.kind != FunctionKind::Internal
        {
            return Err(Diagnostic::structure(
                "`msg.value` can only be used in payable functions",
                span,
            ));
        }
        let ty = match var {
            EnvVar::MsgSender | EnvVar::TxOrigin | EnvVar::SelfAddress => Type::Address,
            EnvVar::MsgValue | EnvVar::BlockTimestamp | EnvVar::BlockNumber | EnvVar::ChainId => {
                Type::UINT256
            }
        };
        Ok(TypedExpr::new(ExprKind::Env(var), ty, span))
    }

    fn attribute(&mut self, value: &Expr<'src>, attr: &Ident<'src>, span: Span) -> Result<TypedExpr> {
        let env = match (value.as_name(), attr.inner) {
            (Some("msg"), "sender") => Some(EnvVar::MsgSender),
            (Some("msg"), "value") => Some(EnvVar::MsgValue),
            (Some("tx"), "origin") => Some(EnvVar::TxOrigin),
            (Some("block"), "timestamp") => Some(EnvVar::BlockTimestamp),
            (Some("block"), "number") => Some(EnvVar::BlockNumber),
            (Some("chain"), "id") => Some(EnvVar::ChainId),
            (Some(name @ ("msg" | "tx" | "block" | "chain")), attr) => {
                return Err(Diagnostic::structure(format!("unknown attribute `{name}.{attr}`"), span));
            }
            _ => None,
        };
        if let Some(var) = env {
            return self.environment(var, span);
        }

        if value.as_name() == Some("self") {
            if let Some(&id) = self.module.storage.get(attr.inner) {
                self.require_state_read(&span)?;
                let ty = self.module.contract.storage[id].ty.clone();
                return Ok(TypedExpr::new(ExprKind::Storage(id), ty, span));
            }
            if self.module.functions.contains_key(attr.inner) {
                return Err(Diagnostic::structure(
                    format!("`self.{}` is a function and must be called", attr.inner),
                    span,
                ));
            }
            if attr.inner != "balance" {
                return Err(Diagnostic::structure(
                    format!("undeclared storage variable `self.{}`", attr.inner),
                    span,
                ));
            }
        }

        let base = self.expr(value, None)?;
        self.member(base, attr, span)
    }

    /// Struct field, interface address or address property of `base`.
    pub(crate) fn member(
        &mut self,
        base: TypedExpr,
        attr: &Ident<'src>,
        span: Span,
    ) -> Result<TypedExpr> {
        match &base.ty {
            Type::Struct(def) => {
                let Some((index, ty)) = def.field(attr.inner) else {
                    return Err(Diagnostic::type_error(
                        format!("struct `{}` has no field `{}`", def.name, attr.inner),
                        attr.span.clone(),
                    ));
                };
                let ty = ty.clone();
                Ok(TypedExpr::new(ExprKind::Field { base: Box::new(base), index }, ty, span))
            }
            Type::Interface(_) if attr.inner == "address" => {
                Ok(TypedExpr { ty: Type::Address, span, ..base })
            }
            Type::Address | Type::Interface(_) => {
                let (member, ty) = match attr.inner {
                    "balance" => (AddressMember::Balance, Type::UINT256),
                    "codesize" => (AddressMember::Codesize, Type::UINT256),
                    "codehash" => (AddressMember::Codehash, Type::BytesM(32)),
                    "is_contract" => (AddressMember::IsContract, Type::Bool),
                    other => {
                        return Err(Diagnostic::type_error(
                            format!("`{}` has no member `{other}`", base.ty),
                            attr.span.clone(),
                        ));
                    }
                };
                self.require_state_read(&span)?;
                let kind = ExprKind::AddressMember { address: Box::new(base), member };
                Ok(TypedExpr::new(kind, ty, span))
            }
            ty => Err(Diagnostic::type_error(
                format!("`{ty}` has no member `{}`", attr.inner),
                attr.span.clone(),
            )),
        }
    }

    /// Array element or `HashMap` value of `base`.
    pub(crate) fn index(
        &mut self,
        base: TypedExpr,
        index: &Expr<'src>,
        span: Span,
    ) -> Result<TypedExpr> {
        let (index, element) = match &base.ty {
            Type::Array(element, len) => {
                let index = self.expr(index, None)?;
                if !matches!(index.ty, Type::Int(_)) {
                    return Err(Diagnostic::type_error(
                        format!("array index must be an integer, found `{}`", index.ty),
                        index.span,
                    ));
                }
                if let Some(value) = index.as_literal() {
                    if value >= U256::from(*len) {
                        return Err(Diagnostic::type_error(
                            format!("index out of bounds for an array of length {len}"),
                            index.span,
                        ));
                    }
                }
                (index, (**element).clone())
            }
            Type::HashMap(key, value) => (self.expr(index, Some(key))?, (**value).clone()),
            ty => {
                return Err(Diagnostic::type_error(format!("`{ty}` cannot be indexed"), span));
            }
        };
        let kind = ExprKind::Index { base: Box::new(base), index: Box::new(index) };
        Ok(TypedExpr::new(kind, element, span))
    }

    /// Types both operands of a binary operator, the literal side last so that it takes the type
    /// of the other side.
    fn operands(
        &mut self,
        left: &Expr<'src>,
        right: &Expr<'src>,
        expected: Option<&Type>,
    ) -> Result<(TypedExpr, TypedExpr)> {
        if is_untyped_literal(left) && !is_untyped_literal(right) {
            let right = self.expr(right, expected)?;
            let left = self.operand(left, &right.ty)?;
            return Ok((left, right));
        }
        let left = self.expr(left, expected)?;
        let right = self.operand(right, &left.ty)?;
        Ok((left, right))
    }

    /// Byte arrays of any length compare with each other.
    fn operand(&mut self, expr: &Expr<'src>, other: &Type) -> Result<TypedExpr> {
        let value = self.infer(expr, Some(other))?;
        match (&value.ty, other) {
            (Type::Bytes(_), Type::Bytes(_)) | (Type::String(_), Type::String(_)) => Ok(value),
            _ => coerce(value, other),
        }
    }

    fn binary(
        &mut self,
        op: BinOp,
        left: &Expr<'src>,
        right: &Expr<'src>,
        expected: Option<&Type>,
        span: Span,
    ) -> Result<TypedExpr> {
        let (left, right) = if matches!(op, BinOp::Shl | BinOp::Shr) {
            let left = self.expr(left, int_type(expected))?;
            (left, self.expr(right, Some(&Type::UINT256))?)
        } else {
            self.operands(left, right, int_type(expected))?
        };
        let Type::Int(int) = left.ty else {
            return Err(Diagnostic::type_error(
                format!("`{}` is not defined for `{}`", op.symbol(), left.ty),
                span,
            ));
        };
        let bitwise =
            matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr);
        if bitwise && int != IntType::UINT256 {
            return Err(Diagnostic::type_error(
                format!("`{}` is only defined for `uint256`, not `{int}`", op.symbol()),
                span,
            ));
        }
        match (left.as_literal(), right.as_literal()) {
            (Some(l), Some(r)) => {
                let Some(value) = fold::binary(op, int, l, r) else {
                    return Err(Diagnostic::type_error(
                        format!("constant expression overflows `{int}` or divides by zero"),
                        span,
                    ));
                };
                return Ok(literal(value, left.ty, span));
            }
            _ if op == BinOp::Pow => {
                return Err(Diagnostic::type_error(
                    "`**` needs compile-time constant operands",
                    span,
                ));
            }
            (_, Some(r)) if r.is_zero() && matches!(op, BinOp::Div | BinOp::Mod) => {
                return Err(Diagnostic::type_error("division by zero", right.span));
            }
            _ => {}
        }
        let ty = left.ty.clone();
        let kind = ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) };
        Ok(TypedExpr::new(kind, ty, span))
    }

    fn unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr<'src>,
        expected: Option<&Type>,
        span: Span,
    ) -> Result<TypedExpr> {
        match op {
            UnaryOp::Neg => {
                if let ast::ExprKind::Int(value) = operand.kind {
                    let int = match expected {
                        Some(Type::Int(int)) => *int,
                        _ => IntType::INT256,
                    };
                    let raw = value.wrapping_neg();
                    if !int.signed || value > (U256::from(1) << 255) || !int.contains(raw) {
                        return Err(Diagnostic::type_error(
                            format!("literal -{value} does not fit in `{int}`"),
                            span,
                        ));
                    }
                    return Ok(literal(raw, Type::Int(int), span));
                }
                let value = self.expr(operand, int_type(expected))?;
                let Type::Int(int) = value.ty else {
                    return Err(Diagnostic::type_error(
                        format!("cannot negate a value of type `{}`", value.ty),
                        span,
                    ));
                };
                if !int.signed {
                    return Err(Diagnostic::type_error(
                        format!("cannot negate a value of unsigned type `{int}`"),
                        span,
                    ));
                }
                if let Some(raw) = value.as_literal() {
                    let Some(negated) = fold::negate(int, raw) else {
                        return Err(Diagnostic::type_error(
                            format!("negation overflows `{int}`"),
                            span,
                        ));
                    };
                    return Ok(literal(negated, value.ty, span));
                }
                Ok(TypedExpr::new(ExprKind::Neg(Box::new(value)), Type::Int(int), span))
            }
            UnaryOp::Invert => {
                let value = self.expr(operand, Some(&Type::UINT256))?;
                if let Some(raw) = value.as_literal() {
                    return Ok(literal(!raw, Type::UINT256, span));
                }
                Ok(TypedExpr::new(ExprKind::Invert(Box::new(value)), Type::UINT256, span))
            }
            UnaryOp::Not => {
                let value = self.expr(operand, Some(&Type::Bool))?;
                if let Some(raw) = value.as_literal() {
                    return Ok(bool_literal(raw.is_zero(), span));
                }
                Ok(TypedExpr::new(ExprKind::Not(Box::new(value)), Type::Bool, span))
            }
        }
    }

    pub(crate) fn call(&mut self, expr: &Expr<'src>) -> Result<CallResult> {
        let span = expr.span.clone();
        let ast::ExprKind::Call { func, args, keywords } = &expr.kind else {
            return Err(Diagnostic::type_error("expected a call", span));
        };
        match &func.kind {
            ast::ExprKind::Name(name) => {
                if let Some(value) = self.builtin(name, args, keywords, span.clone())? {
                    return Ok(CallResult::Value(value));
                }
                if let Some(def) = self.module.structs.get(name).cloned() {
                    return self.struct_literal(&def, args, keywords, span).map(CallResult::Value);
                }
                if let Some(interface) = self.module.interfaces.get(name).cloned() {
                    let [address] = args.as_slice() else {
                        return Err(Diagnostic::argument(
                            format!("`{name}` takes exactly one address"),
                            span,
                        ));
                    };
                    reject_keywords(keywords, name)?;
                    let address = self.infer(address, Some(&Type::Address))?;
                    if !matches!(address.ty, Type::Address | Type::Interface(_)) {
                        return Err(Diagnostic::type_error(
                            format!("expected `address`, found `{}`", address.ty),
                            address.span,
                        ));
                    }
                    return Ok(CallResult::Value(TypedExpr {
                        ty: Type::Interface(interface),
                        span,
                        ..address
                    }));
                }
                if self.module.scopes.lookup(self.scope, name).is_some() {
                    return Err(Diagnostic::type_error(format!("`{name}` is not callable"), span));
                }
                if self.module.functions.contains_key(name) {
                    return Err(Diagnostic::structure(
                        format!("functions of this contract are called as `self.{name}(...)`"),
                        span,
                    ));
                }
                Err(Diagnostic::structure(format!("unknown function `{name}`"), span))
            }
            ast::ExprKind::Attribute { value, attr } if value.as_name() == Some("self") => {
                self.internal_call(attr, args, keywords, span)
            }
            ast::ExprKind::Attribute { value, attr } => {
                let address = self.expr(value, None)?;
                let Type::Interface(interface) = &address.ty else {
                    return Err(Diagnostic::type_error(
                        format!("`{}` has no callable member `{}`", address.ty, attr.inner),
                        span,
                    ));
                };
                let Some(signature) = interface.function(attr.inner).cloned() else {
                    return Err(Diagnostic::structure(
                        format!("interface `{}` has no function `{}`", interface.name, attr.inner),
                        attr.span.clone(),
                    ));
                };
                reject_keywords(keywords, attr.inner)?;
                if args.len() != signature.params.len() {
                    return Err(Diagnostic::argument(
                        format!(
                            "`{}` expects {} arguments, {} given",
                            attr.inner,
                            signature.params.len(),
                            args.len()
                        ),
                        span,
                    ));
                }
                let Some(state) = &self.function else {
                    return Err(Diagnostic::type_error("value must be a compile-time constant", span));
                };
                let caller = state.mutability;
                if caller == Mutability::Pure
                    || (!caller.can_write_state() && signature.mutability.can_write_state())
                {
                    return Err(Diagnostic::structure(
                        format!(
                            "cannot call {} function `{}` from a {} function",
                            mutability_name(signature.mutability),
                            attr.inner,
                            mutability_name(caller)
                        ),
                        span,
                    ));
                }
                let args = args
                    .iter()
                    .zip(&signature.params)
                    .map(|(arg, ty)| self.expr(arg, Some(ty)))
                    .collect::<Result<Vec<_>>>()?;
                let returns = signature.returns.clone();
                let call = Call {
                    target: CallTarget::External { address: Box::new(address), signature },
                    args,
                };
                Ok(match returns {
                    Some(ty) => CallResult::Value(TypedExpr::new(ExprKind::Call(call), ty, span)),
                    None => CallResult::Void(call),
                })
            }
            _ => Err(Diagnostic::type_error("expression is not callable", span)),
        }
    }

    fn internal_call(
        &mut self,
        name: &Ident<'src>,
        args: &[Expr<'src>],
        keywords: &[Keyword<'src>],
        span: Span,
    ) -> Result<CallResult> {
        let Some(&id) = self.module.functions.get(name.inner) else {
            return Err(Diagnostic::structure(
                format!("unknown function `self.{}`", name.inner),
                name.span.clone(),
            ));
        };
        let callee = &self.module.contract.functions[id];
        if callee.kind != FunctionKind::Internal {
            return Err(Diagnostic::structure(
                format!("`{}` is not an internal function and cannot be called on `self`", name.inner),
                span,
            ));
        }
        reject_keywords(keywords, name.inner)?;
        let (required, total) = (callee.required_params(), callee.params.len());
        if args.len() < required || args.len() > total {
            let expected =
                if required == total { total.to_string() } else { format!("{required} to {total}") };
            return Err(Diagnostic::argument(
                format!("`{}` expects {expected} arguments, {} given", name.inner, args.len()),
                span,
            ));
        }
        let params: Vec<Type> = callee.param_types().cloned().collect();
        let defaults = callee.defaults[args.len() - required..].to_vec();
        let (callee_mutability, returns) = (callee.mutability, callee.returns.clone());

        let state = self.state(&span)?;
        if !state.mutability.can_write_state() && callee_mutability > state.mutability {
            return Err(Diagnostic::structure(
                format!(
                    "cannot call {} function `{}` from a {} function",
                    mutability_name(callee_mutability),
                    name.inner,
                    mutability_name(state.mutability)
                ),
                span,
            ));
        }
        state.calls.push((id, span.clone()));

        let mut typed = args
            .iter()
            .zip(&params)
            .map(|(arg, ty)| self.expr(arg, Some(ty)))
            .collect::<Result<Vec<_>>>()?;
        typed.extend(defaults);
        let call = Call { target: CallTarget::Internal(id), args: typed };
        Ok(match returns {
            Some(ty) => CallResult::Value(TypedExpr::new(ExprKind::Call(call), ty, span)),
            None => CallResult::Void(call),
        })
    }

    fn struct_literal(
        &mut self,
        def: &std::sync::Arc<vyc_data::StructType>,
        args: &[Expr<'src>],
        keywords: &[Keyword<'src>],
        span: Span,
    ) -> Result<TypedExpr> {
        let (
            [Expr { kind: ast::ExprKind::Dict(entries), .. }],
            [],
        ) = (args, keywords)
        else {
            return Err(Diagnostic::argument(
                format!("`{}` takes a single dict of field values", def.name),
                span,
            ));
        };
        let mut values: Vec<Option<TypedExpr>> = vec![None; def.fields.len()];
        for (key, value) in entries {
            let Some(field) = key.as_name() else {
                let message = "field names must be plain identifiers";
                return Err(Diagnostic::syntax(message, key.span.clone()));
            };
            let Some((index, ty)) = def.field(field) else {
                return Err(Diagnostic::type_error(
                    format!("struct `{}` has no field `{field}`", def.name),
                    key.span.clone(),
                ));
            };
            if values[index].is_some() {
                return Err(Diagnostic::type_error(
                    format!("field `{field}` given twice"),
                    key.span.clone(),
                ));
            }
            values[index] = Some(self.expr(value, Some(ty))?);
        }
        let fields = values
            .into_iter()
            .zip(&def.fields)
            .map(|(value, (name, _))| {
                value.ok_or_else(|| {
                    Diagnostic::type_error(format!("missing value for field `{name}`"), span.clone())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TypedExpr::new(ExprKind::Struct(fields), Type::Struct(def.clone()), span))
    }
}

pub(crate) fn reject_keywords(keywords: &[Keyword<'_>], name: &str) -> Result<()> {
    match keywords.first() {
        Some(keyword) => Err(Diagnostic::argument(
            format!("`{name}` does not take keyword arguments"),
            keyword.name.span.clone(),
        )),
        None => Ok(()),
    }
}

pub(crate) fn coerce(value: TypedExpr, expected: &Type) -> Result<TypedExpr> {
    if expected.accepts(&value.ty) {
        return Ok(value);
    }
    Err(Diagnostic::type_error(
        format!("expected a value of type `{expected}`, found `{}`", value.ty),
        value.span,
    ))
}

/// Hex literals are addresses, `bytesM`, `Bytes` or integers depending on where they are used.
fn hex_literal(digits: &str, expected: Option<&Type>, span: Span) -> Result<TypedExpr> {
    let Ok(bytes) = hex::decode(digits) else {
        return Err(Diagnostic::syntax("invalid hex literal", span));
    };
    let left_aligned = |bytes: &[u8]| U256::from_be_slice(bytes) << (8 * (32 - bytes.len()));
    match expected {
        Some(Type::Address) => {
            if digits.len() != 40 {
                return Err(Diagnostic::syntax(
                    format!("address literal must have 40 hex digits, found {}", digits.len()),
                    span,
                ));
            }
            Ok(literal(U256::from_be_slice(&bytes), Type::Address, span))
        }
        Some(Type::BytesM(m)) => {
            if bytes.len() != *m as usize {
                return Err(Diagnostic::type_error(
                    format!("`bytes{m}` literal needs {} hex digits, not {}", 2 * m, digits.len()),
                    span,
                ));
            }
            Ok(literal(left_aligned(&bytes), Type::BytesM(*m), span))
        }
        Some(Type::Bytes(_)) => {
            let ty = Type::Bytes(bytes.len() as u32);
            Ok(TypedExpr::new(ExprKind::BytesLiteral(bytes.into()), ty, span))
        }
        Some(Type::Int(int)) => {
            let value = (bytes.len() <= 32).then(|| U256::from_be_slice(&bytes));
            match value {
                Some(value) if int.contains(value) => Ok(literal(value, Type::Int(*int), span)),
                _ => Err(Diagnostic::type_error(format!("literal does not fit in `{int}`"), span)),
            }
        }
        _ if digits.len() == 40 => Ok(literal(U256::from_be_slice(&bytes), Type::Address, span)),
        _ if !bytes.is_empty() && bytes.len() <= 32 => {
            Ok(literal(left_aligned(&bytes), Type::BytesM(bytes.len() as u8), span))
        }
        _ => {
            let ty = Type::Bytes(bytes.len() as u32);
            Ok(TypedExpr::new(ExprKind::BytesLiteral(bytes.into()), ty, span))
        }
    }
}
