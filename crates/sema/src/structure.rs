//! Shape checks that run before any name resolution or typing.
//!
//! Every rule here looks at a single syntax node (plus whether the traversal is inside a loop),
//! so the first violation in document order is reported.

use alloy_primitives::{Address, hex};
use std::collections::HashSet;
use vyc_syntax::{
    Diagnostic, Result, Span,
    ast::{Expr, ExprKind, Item, Keyword, Module, Stmt, StmtKind, UnaryOp},
};

/// Names that denote a type wherever they appear in an annotation.
pub(crate) fn is_builtin_type_name(name: &str) -> bool {
    match name {
        "bool" | "address" | "Bytes" | "String" | "HashMap" => true,
        _ => {
            let bits = name.strip_prefix("uint").or_else(|| name.strip_prefix("int"));
            if let Some(bits) = bits {
                return bits.parse::<u16>().is_ok_and(|b| b % 8 == 0 && (8..=256).contains(&b));
            }
            name.strip_prefix("bytes")
                .and_then(|m| m.parse::<u8>().ok())
                .is_some_and(|m| (1..=32).contains(&m))
        }
    }
}

pub fn validate(module: &Module<'_>) -> Result<()> {
    let user_types = module
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Struct(def) => Some(def.name.inner),
            Item::Interface(def) => Some(def.name.inner),
            _ => None,
        })
        .collect();
    let mut validator = StructureValidator { user_types, loop_depth: 0 };
    for item in &module.items {
        validator.item(item)?;
    }
    Ok(())
}

struct StructureValidator<'src> {
    user_types: HashSet<&'src str>,
    loop_depth: usize,
}

impl<'src> StructureValidator<'src> {
    fn is_type_name(&self, name: &str) -> bool {
        is_builtin_type_name(name) || self.user_types.contains(name)
    }

    fn item(&mut self, item: &Item<'src>) -> Result<()> {
        match item {
            Item::Variable(decl) => {
                self.annotation(&decl.annotation)?;
                decl.value.as_ref().map_or(Ok(()), |value| self.expr(value))
            }
            Item::Struct(def) => {
                def.fields.iter().try_for_each(|field| self.annotation(&field.annotation))
            }
            Item::Event(def) => {
                def.fields.iter().try_for_each(|field| self.annotation(&field.annotation))
            }
            Item::Interface(def) => def.functions.iter().try_for_each(|function| {
                for param in &function.params {
                    self.annotation(&param.annotation)?;
                }
                function.returns.as_ref().map_or(Ok(()), |ret| self.annotation(ret))
            }),
            Item::Function(def) => {
                for decorator in &def.decorators {
                    self.expr(decorator)?;
                }
                for param in &def.params {
                    self.annotation(&param.annotation)?;
                    if let Some(default) = &param.default {
                        self.expr(default)?;
                    }
                }
                if let Some(ret) = &def.returns {
                    self.annotation(ret)?;
                }
                self.loop_depth = 0;
                self.block(&def.body)
            }
        }
    }

    fn annotation(&self, annotation: &Expr<'src>) -> Result<()> {
        match &annotation.kind {
            ExprKind::Name(_) => Ok(()),
            ExprKind::Subscript { value, index } => {
                self.annotation(value)?;
                match &index.kind {
                    ExprKind::Slice { .. } => Err(Diagnostic::syntax(
                        "array bound must be a single integer, not a slice",
                        index.span.clone(),
                    )),
                    ExprKind::Tuple(members) => {
                        members.iter().try_for_each(|member| self.annotation(member))
                    }
                    ExprKind::Name(name) if self.is_type_name(name) => Err(Diagnostic::syntax(
                        format!("type `{name}` cannot be used as an array bound"),
                        index.span.clone(),
                    )),
                    _ => self.expr(index),
                }
            }
            // `public(T)`, `indexed(T)`, `event({...})` and friends
            ExprKind::Call { func, args, keywords } => {
                self.call_arguments(args, keywords)?;
                self.expr(func)?;
                for arg in args {
                    match &arg.kind {
                        ExprKind::Dict(entries) => {
                            for (key, value) in entries {
                                self.field_key(key)?;
                                self.annotation(value)?;
                            }
                        }
                        _ => self.annotation(arg)?,
                    }
                }
                Ok(())
            }
            _ => self.expr(annotation),
        }
    }

    fn block(&mut self, body: &[Stmt<'src>]) -> Result<()> {
        body.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &Stmt<'src>) -> Result<()> {
        match &stmt.kind {
            StmtKind::AnnAssign { target, annotation, value } => {
                if target.as_name().is_none() {
                    return Err(Diagnostic::syntax(
                        "only simple names can be annotated",
                        target.span.clone(),
                    ));
                }
                self.annotation(annotation)?;
                value.as_ref().map_or(Ok(()), |value| self.expr(value))
            }
            StmtKind::Assign { targets, value } => {
                if targets.len() > 1 {
                    return Err(Diagnostic::syntax(
                        "chained assignment is not allowed, assign one target per statement",
                        stmt.span.clone(),
                    ));
                }
                targets.iter().try_for_each(|target| self.target(target))?;
                self.expr(value)
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.target(target)?;
                self.expr(value)
            }
            StmtKind::If { test, body, orelse } => {
                self.expr(test)?;
                self.block(body)?;
                self.block(orelse)
            }
            StmtKind::For { annotation, iter, body, orelse, .. } => {
                if let Some(orelse) = orelse {
                    let span = orelse.first().map_or(stmt.span.clone(), |s| s.span.clone());
                    return Err(Diagnostic::syntax("`for` loops cannot have an `else` block", span));
                }
                if let Some(annotation) = annotation {
                    self.annotation(annotation)?;
                }
                self.expr(iter)?;
                self.loop_depth += 1;
                let result = self.block(body);
                self.loop_depth -= 1;
                result
            }
            StmtKind::While { .. } => Err(Diagnostic::syntax(
                "`while` loops are not supported, use a bounded `for` loop",
                stmt.span.clone(),
            )),
            StmtKind::Return(value) | StmtKind::Raise(value) => {
                value.as_ref().map_or(Ok(()), |value| self.expr(value))
            }
            StmtKind::Assert { test, msg } => {
                self.expr(test)?;
                msg.as_ref().map_or(Ok(()), |msg| self.expr(msg))
            }
            StmtKind::Log(event) => self.expr(event),
            StmtKind::Break | StmtKind::Continue if self.loop_depth == 0 => {
                let keyword =
                    if matches!(stmt.kind, StmtKind::Break) { "break" } else { "continue" };
                Err(Diagnostic::syntax(format!("`{keyword}` outside of a loop"), stmt.span.clone()))
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Pass => Ok(()),
            StmtKind::Expr(expr) => self.expr(expr),
        }
    }

    fn target(&self, target: &Expr<'src>) -> Result<()> {
        if let ExprKind::Subscript { value, index } = &target.kind {
            if !matches!(index.kind, ExprKind::Slice { .. }) {
                return self.expr(target);
            }
            let message = if is_state_reference(value) {
                "cannot assign to a slice of a storage variable"
            } else {
                "slice assignment is not supported"
            };
            return Err(Diagnostic::syntax(message, target.span.clone()));
        }
        self.expr(target)
    }

    fn expr(&self, expr: &Expr<'src>) -> Result<()> {
        match &expr.kind {
            ExprKind::Name(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Bytes(_)
            | ExprKind::Bool(_) => Ok(()),
            ExprKind::Hex(digits) => check_hex_literal(digits, expr.span.clone()),
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                items.iter().try_for_each(|item| self.expr(item))
            }
            ExprKind::Dict(entries) => entries.iter().try_for_each(|(key, value)| {
                self.field_key(key)?;
                self.expr(value)
            }),
            ExprKind::Attribute { value, .. } => self.expr(value),
            ExprKind::Subscript { value, index } => {
                if matches!(index.kind, ExprKind::Slice { .. }) {
                    let message = if is_state_reference(value) {
                        "storage variables cannot be sliced"
                    } else {
                        "slicing is not supported, there are no slice values"
                    };
                    return Err(Diagnostic::syntax(message, expr.span.clone()));
                }
                self.expr(value)?;
                self.expr(index)
            }
            ExprKind::Slice { .. } => {
                Err(Diagnostic::syntax("unexpected slice expression", expr.span.clone()))
            }
            ExprKind::Call { func, args, keywords } => {
                self.call_arguments(args, keywords)?;
                self.expr(func)?;
                args.iter().try_for_each(|arg| self.expr(arg))?;
                keywords.iter().try_for_each(|keyword| self.expr(&keyword.value))
            }
            ExprKind::BinOp { left, right, .. }
            | ExprKind::BoolOp { left, right, .. }
            | ExprKind::Compare { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Unary { op, operand } => {
                if *op != UnaryOp::Not && operand.as_name() == Some("self") {
                    let symbol = if *op == UnaryOp::Neg { "-" } else { "~" };
                    return Err(Diagnostic::syntax(
                        format!("unary `{symbol}` is only defined for numbers, not for `self`"),
                        expr.span.clone(),
                    ));
                }
                self.expr(operand)
            }
        }
    }

    /// Keys of event and struct dictionaries name fields.
    fn field_key(&self, key: &Expr<'src>) -> Result<()> {
        match key.kind {
            ExprKind::Name(_) => Ok(()),
            _ => Err(Diagnostic::syntax("field names must be plain identifiers", key.span.clone())),
        }
    }

    fn call_arguments(&self, args: &[Expr<'src>], keywords: &[Keyword<'src>]) -> Result<()> {
        let first_keyword = keywords.first().map(|keyword| keyword.name.span.start);
        let misplaced = args.iter().find(|arg| first_keyword.is_some_and(|at| arg.span.start > at));
        if let Some(arg) = misplaced {
            return Err(Diagnostic::syntax(
                "positional argument follows keyword argument",
                arg.span.clone(),
            ));
        }
        let mut seen = HashSet::with_capacity(keywords.len());
        for keyword in keywords {
            if !seen.insert(keyword.name.inner) {
                return Err(Diagnostic::syntax(
                    format!("keyword argument `{}` repeated", keyword.name.inner),
                    keyword.name.span.clone(),
                ));
            }
        }
        Ok(())
    }
}

/// `self.x`, or any subscript/attribute chain rooted in one.
fn is_state_reference(expr: &Expr<'_>) -> bool {
    if expr.as_self_attribute().is_some() {
        return true;
    }
    match &expr.kind {
        ExprKind::Subscript { value, .. } | ExprKind::Attribute { value, .. } => {
            is_state_reference(value)
        }
        _ => false,
    }
}

/// Rejects odd-length hex literals and 40 digit literals whose casing is not a valid checksum.
pub(crate) fn check_hex_literal(digits: &str, span: Span) -> Result<()> {
    if digits.len() % 2 != 0 {
        return Err(Diagnostic::syntax(
            format!("hex literal must have an even number of digits, found {}", digits.len()),
            span,
        ));
    }
    if digits.len() == 40 {
        let Ok(bytes) = hex::decode(digits) else {
            return Err(Diagnostic::syntax("invalid hex literal", span));
        };
        let checksummed = Address::from_slice(&bytes).to_checksum(None);
        if checksummed[2..] != *digits {
            return Err(Diagnostic::syntax(
                format!("address literal has an invalid checksum, expected {checksummed}"),
                span,
            ));
        }
    }
    Ok(())
}
