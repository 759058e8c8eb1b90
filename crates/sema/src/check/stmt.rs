use super::{CallResult, Checker, fold};
use crate::{scope::Location, structure::is_builtin_type_name};
use alloy_primitives::U256;
use vyc_data::{
    FunctionKind, IntType, Type, TypedExpr,
    hir::{BinOp, ExprKind, Stmt},
};
use vyc_syntax::{
    Diagnostic, Result, Span,
    ast::{self, Expr, Ident, Keyword, StmtKind},
};

/// Names that can never be declared as locals.
const RESERVED: &[&str] = &[
    "self", "msg", "block", "tx", "chain", "len", "empty", "keccak256", "range",
    "create_minimal_proxy_to", "create_from_factory", "create_from_blueprint", "create_copy_of",
];

/// Whether control never falls off the end of `body`.
pub(crate) fn terminates(body: &[Stmt]) -> bool {
    match body.last() {
        Some(Stmt::Return(_) | Stmt::Raise(_)) => true,
        Some(Stmt::If { body, orelse, .. }) => terminates(body) && terminates(orelse),
        _ => false,
    }
}

impl<'src> Checker<'_, 'src> {
    pub(crate) fn block(&mut self, body: &[ast::Stmt<'src>]) -> Result<Vec<Stmt>> {
        let outer = self.scope;
        self.scope = self.module.scopes.push(outer);
        let result = body.iter().map(|stmt| self.stmt(stmt)).collect();
        self.scope = outer;
        result
    }

    fn stmt(&mut self, stmt: &ast::Stmt<'src>) -> Result<Stmt> {
        let span = stmt.span.clone();
        match &stmt.kind {
            StmtKind::AnnAssign { target, annotation, value } => {
                let Some(name) = target.as_name() else {
                    return Err(Diagnostic::syntax("only simple names can be annotated", span));
                };
                let ty = self.module.resolve_value_type(annotation)?;
                let value = match value {
                    Some(value) => self.expr(value, Some(&ty))?,
                    None => TypedExpr::new(ExprKind::Empty, ty.clone(), span),
                };
                let name = Ident::new(name, target.span.clone());
                let local = self.declare_local(&name, ty.clone(), true)?;
                let target = TypedExpr::new(ExprKind::Local(local), ty, target.span.clone());
                Ok(Stmt::Assign { target, value })
            }
            StmtKind::Assign { targets, value } => {
                let [target] = targets.as_slice() else {
                    return Err(Diagnostic::syntax(
                        "chained assignment is not allowed, assign one target per statement",
                        span,
                    ));
                };
                let target = assignable(self.place(target)?)?;
                let value = self.expr(value, Some(&target.ty))?;
                Ok(Stmt::Assign { target, value })
            }
            StmtKind::AugAssign { target, op, value } => {
                let target = self.place(target)?;
                let Type::Int(int) = target.ty else {
                    return Err(Diagnostic::type_error(
                        format!("`{}=` is not defined for `{}`", op.symbol(), target.ty),
                        span,
                    ));
                };
                let value = match op {
                    BinOp::Pow => {
                        return Err(Diagnostic::type_error(
                            "`**` needs compile-time constant operands",
                            span,
                        ));
                    }
                    BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
                        if int != IntType::UINT256 =>
                    {
                        return Err(Diagnostic::type_error(
                            format!("`{}` is only defined for `uint256`, not `{int}`", op.symbol()),
                            span,
                        ));
                    }
                    _ => self.expr(value, Some(&target.ty))?,
                };
                if matches!(op, BinOp::Div | BinOp::Mod) && value.as_literal() == Some(U256::ZERO) {
                    return Err(Diagnostic::type_error("division by zero", value.span));
                }
                Ok(Stmt::AugAssign { target, op: *op, value })
            }
            StmtKind::If { test, body, orelse } => {
                let test = self.expr(test, Some(&Type::Bool))?;
                let body = self.block(body)?;
                let orelse = self.block(orelse)?;
                Ok(Stmt::If { test, body, orelse })
            }
            StmtKind::For { target, annotation, iter, body, orelse } => {
                if orelse.is_some() {
                    return Err(Diagnostic::syntax("`for` loops cannot have an `else` block", span));
                }
                self.for_loop(target, annotation.as_ref(), iter, body)
            }
            StmtKind::While { .. } => Err(Diagnostic::syntax(
                "`while` loops are not supported, use a bounded `for` loop",
                span,
            )),
            StmtKind::Return(value) => {
                let returns = self.state(&span)?.returns.clone();
                match (value, returns) {
                    (None, None) => Ok(Stmt::Return(None)),
                    (Some(value), Some(ty)) => Ok(Stmt::Return(Some(self.expr(value, Some(&ty))?))),
                    (Some(value), None) => Err(Diagnostic::type_error(
                        "function does not declare a return type",
                        value.span.clone(),
                    )),
                    (None, Some(ty)) => {
                        let message = format!("missing return value of type `{ty}`");
                        Err(Diagnostic::type_error(message, span))
                    }
                }
            }
            StmtKind::Assert { test, msg } => {
                let test = self.expr(test, Some(&Type::Bool))?;
                let reason = msg.as_ref().map(|msg| self.reason(msg)).transpose()?;
                Ok(Stmt::Assert { test, reason })
            }
            StmtKind::Raise(reason) => {
                Ok(Stmt::Raise(reason.as_ref().map(|reason| self.reason(reason)).transpose()?))
            }
            StmtKind::Log(event) => self.log(event),
            StmtKind::Pass => Ok(Stmt::Pass),
            StmtKind::Break => Ok(Stmt::Break),
            StmtKind::Continue => Ok(Stmt::Continue),
            StmtKind::Expr(expr) => {
                if !matches!(expr.kind, ast::ExprKind::Call { .. }) {
                    return Err(Diagnostic::structure("expression statement has no effect", span));
                }
                match self.call(expr)? {
                    CallResult::Void(call) => Ok(Stmt::Call(call)),
                    CallResult::Value(TypedExpr { kind: ExprKind::Call(call), .. }) => {
                        Ok(Stmt::Call(call))
                    }
                    CallResult::Value(value @ TypedExpr { kind: ExprKind::Create(_), .. }) => {
                        Ok(Stmt::Expr(value))
                    }
                    CallResult::Value(_) => {
                        Err(Diagnostic::structure("expression statement has no effect", span))
                    }
                }
            }
        }
    }

    /// Revert reason of `assert` and `raise`.
    fn reason(&mut self, reason: &Expr<'src>) -> Result<TypedExpr> {
        let value = self.expr(reason, None)?;
        if !matches!(value.ty, Type::String(_)) {
            return Err(Diagnostic::type_error(
                format!("revert reason must be a string, found `{}`", value.ty),
                value.span,
            ));
        }
        Ok(value)
    }

    /// Assignable location: a mutable local, an immutable inside the constructor, a storage
    /// variable, or an element or field of one.
    fn place(&mut self, target: &Expr<'src>) -> Result<TypedExpr> {
        let span = target.span.clone();
        let place = match &target.kind {
            ast::ExprKind::Name(name) => {
                let Some(binding) = self.module.scopes.lookup(self.scope, name) else {
                    return Err(Diagnostic::structure(format!("undeclared name `{name}`"), span));
                };
                let (ty, mutable) = (binding.ty.clone(), binding.mutable);
                match binding.location.clone() {
                    Location::Memory(local) if mutable => {
                        TypedExpr::new(ExprKind::Local(local), ty, span)
                    }
                    Location::Memory(_) => {
                        return Err(Diagnostic::structure(
                            format!("`{name}` is read-only and cannot be assigned"),
                            span,
                        ));
                    }
                    Location::Constant(_) => {
                        return Err(Diagnostic::structure(
                            format!("cannot assign to constant `{name}`"),
                            span,
                        ));
                    }
                    Location::Immutable(id) => {
                        let state = self.state(&span)?;
                        if state.kind != FunctionKind::Constructor {
                            return Err(Diagnostic::structure(
                                format!("immutable `{name}` can only be assigned in __init__"),
                                span,
                            ));
                        }
                        state.assigned_immutables.insert(id);
                        TypedExpr::new(ExprKind::Immutable(id), ty, span)
                    }
                }
            }
            ast::ExprKind::Attribute { value, attr } if value.as_name() == Some("self") => {
                let Some(&id) = self.module.storage.get(attr.inner) else {
                    return Err(Diagnostic::structure(
                        format!("undeclared storage variable `self.{}`", attr.inner),
                        span,
                    ));
                };
                self.require_state_write("writing to storage", &span)?;
                let ty = self.module.contract.storage[id].ty.clone();
                TypedExpr::new(ExprKind::Storage(id), ty, span)
            }
            ast::ExprKind::Attribute { value, attr } => {
                let base = self.place(value)?;
                if !matches!(base.ty, Type::Struct(_)) {
                    return Err(Diagnostic::type_error(
                        format!("cannot assign to a member of `{}`", base.ty),
                        span,
                    ));
                }
                self.member(base, attr, span)?
            }
            ast::ExprKind::Subscript { value, index } => {
                let base = self.place(value)?;
                self.index(base, index, span)?
            }
            _ => return Err(Diagnostic::structure("invalid assignment target", span)),
        };
        Ok(place)
    }

    fn for_loop(
        &mut self,
        target: &Ident<'src>,
        annotation: Option<&Expr<'src>>,
        iter: &Expr<'src>,
        body: &[ast::Stmt<'src>],
    ) -> Result<Stmt> {
        let declared = annotation.map(|a| self.module.resolve_value_type(a)).transpose()?;
        let outer = self.scope;
        self.scope = self.module.scopes.push(outer);
        let result = match &iter.kind {
            ast::ExprKind::Call { func, args, keywords } if func.as_name() == Some("range") => {
                let ty = declared.unwrap_or(Type::UINT256);
                if !matches!(ty, Type::Int(_)) {
                    return Err(Diagnostic::type_error(
                        format!("range loop variable must be an integer, not `{ty}`"),
                        iter.span.clone(),
                    ));
                }
                let (start, end, bound) = self.range(args, keywords, &ty, iter.span.clone())?;
                let var = self.declare_local(target, ty, false)?;
                self.block(body).map(|body| Stmt::ForRange { var, start, end, bound, body })
            }
            _ => {
                let iter = self.expr(iter, None)?;
                let Type::Array(element, _) = &iter.ty else {
                    return Err(Diagnostic::type_error(
                        format!("cannot iterate over a value of type `{}`", iter.ty),
                        iter.span,
                    ));
                };
                let element = (**element).clone();
                if let Some(declared) = declared {
                    if declared != element {
                        return Err(Diagnostic::type_error(
                            format!("loop variable is `{declared}` but elements are `{element}`"),
                            target.span.clone(),
                        ));
                    }
                }
                let var = self.declare_local(target, element, false)?;
                self.block(body).map(|body| Stmt::ForIn { var, iter, body })
            }
        };
        self.scope = outer;
        result
    }

    /// `range(end)`, `range(start, end)`, either optionally with `bound=N`. Without a bound both
    /// ends must be constants.
    fn range(
        &mut self,
        args: &[Expr<'src>],
        keywords: &[Keyword<'src>],
        ty: &Type,
        span: Span,
    ) -> Result<(TypedExpr, TypedExpr, u64)> {
        let (start, end) = match args {
            [end] => {
                let start = TypedExpr::new(ExprKind::Literal(U256::ZERO), ty.clone(), span.clone());
                (start, self.expr(end, Some(ty))?)
            }
            [start, end] => (self.expr(start, Some(ty))?, self.expr(end, Some(ty))?),
            _ => {
                return Err(Diagnostic::argument("`range` takes one or two arguments", span));
            }
        };
        let mut bound = None;
        for keyword in keywords {
            if keyword.name.inner != "bound" {
                return Err(Diagnostic::argument(
                    format!("unexpected keyword argument `{}` for `range`", keyword.name.inner),
                    keyword.name.span.clone(),
                ));
            }
            let value = self.expr(&keyword.value, Some(&Type::UINT256))?;
            match value.as_literal() {
                Some(value) if !value.is_zero() && value <= U256::from(u32::MAX) => {
                    bound = Some(value.to::<u64>())
                }
                _ => {
                    return Err(Diagnostic::argument(
                        "`bound` must be a positive integer constant",
                        keyword.value.span.clone(),
                    ));
                }
            }
        }
        let bound = match (bound, start.as_literal(), end.as_literal()) {
            (Some(bound), ..) => bound,
            (None, Some(start), Some(end)) => {
                let count = match ty {
                    Type::Int(int) if int.signed => {
                        fold::binary(BinOp::Sub, IntType::INT256, end, start)
                    }
                    _ => end.checked_sub(start),
                };
                match count {
                    Some(count) if count <= U256::from(u32::MAX) => count.to::<u64>(),
                    _ => {
                        return Err(Diagnostic::argument(
                            "`range` end must not be smaller than its start",
                            span,
                        ));
                    }
                }
            }
            _ => {
                return Err(Diagnostic::argument(
                    "`range` over non-constant values needs a `bound=` keyword",
                    span,
                ));
            }
        };
        Ok((start, end, bound))
    }

    fn log(&mut self, event: &Expr<'src>) -> Result<Stmt> {
        let ast::ExprKind::Call { func, args, keywords } = &event.kind else {
            return Err(Diagnostic::structure("`log` needs an event call", event.span.clone()));
        };
        let Some(name) = func.as_name() else {
            return Err(Diagnostic::structure("`log` needs an event name", func.span.clone()));
        };
        let Some(&id) = self.module.events.get(name) else {
            return Err(Diagnostic::structure(format!("unknown event `{name}`"), func.span.clone()));
        };
        self.require_state_write("logging", &event.span)?;
        let fields: Vec<(String, Type)> = self.module.contract.events[id]
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.ty.clone()))
            .collect();

        let args = match (args.as_slice(), keywords.as_slice()) {
            (args, []) => {
                if args.len() != fields.len() {
                    return Err(Diagnostic::argument(
                        format!("event `{name}` has {} fields, {} given", fields.len(), args.len()),
                        event.span.clone(),
                    ));
                }
                args.iter()
                    .zip(&fields)
                    .map(|(arg, (_, ty))| self.expr(arg, Some(ty)))
                    .collect::<Result<Vec<_>>>()?
            }
            ([], keywords) => {
                let mut values: Vec<Option<TypedExpr>> = vec![None; fields.len()];
                for keyword in keywords {
                    let field = fields.iter().position(|(n, _)| n == keyword.name.inner);
                    let Some(index) = field else {
                        return Err(Diagnostic::argument(
                            format!("event `{name}` has no field `{}`", keyword.name.inner),
                            keyword.name.span.clone(),
                        ));
                    };
                    values[index] = Some(self.expr(&keyword.value, Some(&fields[index].1))?);
                }
                values
                    .into_iter()
                    .zip(&fields)
                    .map(|(value, (field, _))| {
                        value.ok_or_else(|| {
                            Diagnostic::argument(
                                format!("missing value for field `{field}` of event `{name}`"),
                                event.span.clone(),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            _ => {
                return Err(Diagnostic::argument(
                    "event arguments must be all positional or all keywords",
                    event.span.clone(),
                ));
            }
        };
        Ok(Stmt::Log { event: id, args })
    }

}

/// Whole `HashMap`s have no value to assign.
fn assignable(place: TypedExpr) -> Result<TypedExpr> {
    if !place.ty.is_value_type() {
        return Err(Diagnostic::type_error(
            format!("cannot assign to a value of type `{}`", place.ty),
            place.span,
        ));
    }
    Ok(place)
}

pub(crate) fn check_local_name(name: &Ident<'_>) -> Result<()> {
    if RESERVED.contains(&name.inner) || is_builtin_type_name(name.inner) {
        return Err(Diagnostic::structure(
            format!("`{}` is a reserved name", name.inner),
            name.span.clone(),
        ));
    }
    Ok(())
}
