//! Name resolution and typing: turns a validated [`Module`] into a typed [`Contract`].

mod expr;
mod fold;
mod stmt;
mod types;

pub(crate) use expr::{CallResult, coerce, reject_keywords};

use crate::scope::{Binding, Location, ScopeId, Scopes};
use alloy_primitives::{B256, keccak256};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use vyc_data::{
    EventId, ExternalSignature, FunctionId, FunctionKind, ImmutableId, IndexVec, InterfaceType,
    LocalId, Mutability, StorageId, StructType, Type, TypedExpr,
    hir::{Contract, Event, EventField, ExprKind, Function, ImmutableVar, Local, Stmt, StorageVar},
};
use vyc_syntax::{
    Diagnostic, Result, Span,
    ast::{self, Expr, FunctionDef, Ident, InterfaceDef, Item, Module, StructDef, VariableDecl},
};

pub fn check_module(module: &Module<'_>) -> Result<Contract> {
    let mut cx = ModuleContext::new();

    // Constants first: array bounds anywhere may refer to them.
    for item in &module.items {
        if let Item::Variable(decl) = item {
            if let Some(("constant" | "public", _)) = wrapper(&decl.annotation) {
                cx.declare_constant(decl)?;
            }
        }
    }
    for item in &module.items {
        match item {
            Item::Struct(def) => cx.declare_struct(def)?,
            Item::Interface(def) => cx.declare_interface(def)?,
            _ => {}
        }
    }
    for item in &module.items {
        match item {
            Item::Event(def) => {
                let fields = def.fields.iter().map(|f| (&f.name, &f.annotation));
                cx.declare_event(&def.name, fields)?;
            }
            Item::Variable(decl) => cx.declare_variable(decl)?,
            _ => {}
        }
    }
    let mut bodies = Vec::new();
    for item in &module.items {
        if let Item::Function(def) = item {
            bodies.push((cx.declare_function(def)?, def));
        }
    }
    cx.check_selectors()?;

    let mut calls = IndexVec::<FunctionId, Vec<(FunctionId, Span)>>::new();
    calls.resize(cx.contract.functions.len(), Vec::new());
    let mut assigned = HashSet::new();
    for (id, def) in bodies {
        let state = cx.check_body(id, def)?;
        calls[id] = state.calls;
        assigned.extend(state.assigned_immutables);
    }
    cx.check_recursion(&calls)?;

    for (id, immutable) in cx.contract.immutables.iter_enumerated() {
        if !assigned.contains(&id) {
            return Err(Diagnostic::structure(
                format!("immutable `{}` is never assigned in the constructor", immutable.name),
                cx.immutable_spans[id].clone(),
            ));
        }
    }

    tracing::debug!(
        functions = cx.contract.functions.len(),
        storage_slots = cx.next_slot,
        "checked module"
    );
    Ok(cx.contract)
}

fn already_declared(name: &Ident<'_>) -> Diagnostic {
    Diagnostic::structure(format!("`{}` is already declared", name.inner), name.span.clone())
}

/// `name(inner)` annotations such as `public(T)` or `constant(T)`.
fn wrapper<'a, 'src>(annotation: &'a Expr<'src>) -> Option<(&'src str, &'a Expr<'src>)> {
    match &annotation.kind {
        ast::ExprKind::Call { func, args, keywords } if args.len() == 1 && keywords.is_empty() => {
            Some((func.as_name()?, &args[0]))
        }
        _ => None,
    }
}

pub(crate) struct ModuleContext<'src> {
    pub(crate) structs: HashMap<&'src str, Arc<StructType>>,
    pub(crate) interfaces: HashMap<&'src str, Arc<InterfaceType>>,
    pub(crate) events: HashMap<&'src str, EventId>,
    pub(crate) storage: HashMap<&'src str, StorageId>,
    pub(crate) functions: HashMap<&'src str, FunctionId>,
    pub(crate) scopes: Scopes<'src>,
    pub(crate) contract: Contract,
    declared: HashMap<&'src str, Span>,
    immutable_spans: IndexVec<ImmutableId, Span>,
    next_slot: u64,
    immutables_end: u32,
}

/// Per-function facts gathered while checking a body.
pub(crate) struct FunctionState {
    pub(crate) kind: FunctionKind,
    pub(crate) mutability: Mutability,
    pub(crate) returns: Option<Type>,
    pub(crate) locals: IndexVec<LocalId, Local>,
    pub(crate) calls: Vec<(FunctionId, Span)>,
    pub(crate) assigned_immutables: HashSet<ImmutableId>,
}

/// Checks expressions and statements. Without a function it only accepts constant expressions.
pub(crate) struct Checker<'a, 'src> {
    pub(crate) module: &'a mut ModuleContext<'src>,
    pub(crate) function: Option<FunctionState>,
    pub(crate) scope: ScopeId,
}

impl<'src> ModuleContext<'src> {
    fn new() -> Self {
        Self {
            structs: HashMap::new(),
            interfaces: HashMap::new(),
            events: HashMap::new(),
            storage: HashMap::new(),
            functions: HashMap::new(),
            scopes: Scopes::new(),
            contract: Contract::default(),
            declared: HashMap::new(),
            immutable_spans: IndexVec::new(),
            next_slot: 0,
            immutables_end: 0,
        }
    }

    fn declare_name(&mut self, name: &Ident<'src>) -> Result<()> {
        if self.declared.insert(name.inner, name.span.clone()).is_some() {
            return Err(already_declared(name));
        }
        Ok(())
    }

    fn constant_checker(&mut self) -> Checker<'_, 'src> {
        let scope = self.scopes.module();
        Checker { module: self, function: None, scope }
    }

    fn declare_constant(&mut self, decl: &VariableDecl<'src>) -> Result<()> {
        let (public, annotation) = match wrapper(&decl.annotation) {
            Some(("public", inner)) => match wrapper(inner) {
                Some(("constant", annotation)) => (true, annotation),
                _ => return Ok(()),
            },
            Some(("constant", annotation)) => (false, annotation),
            _ => return Ok(()),
        };
        let ty = self.resolve_type(annotation)?;
        if !(ty.is_word() || ty.is_byte_array()) {
            return Err(Diagnostic::type_error(
                format!("constants of type `{ty}` are not supported"),
                annotation.span.clone(),
            ));
        }
        let Some(value) = &decl.value else {
            return Err(Diagnostic::structure(
                format!("constant `{}` needs a value", decl.name.inner),
                decl.span.clone(),
            ));
        };
        let value = self.constant_checker().constant(value, &ty)?;
        self.declare_name(&decl.name)?;
        let binding = Binding { ty, location: Location::Constant(value.clone()), mutable: false };
        let scope = self.scopes.module();
        self.scopes.declare(scope, decl.name.inner, binding)
            .map_err(|_| already_declared(&decl.name))?;
        if public {
            self.add_getter(&decl.name, value);
        }
        Ok(())
    }

    fn declare_struct(&mut self, def: &StructDef<'src>) -> Result<()> {
        self.declare_name(&def.name)?;
        let mut fields: Vec<(String, Type)> = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            if fields.iter().any(|(name, _)| name == field.name.inner) {
                return Err(Diagnostic::structure(
                    format!("duplicate field `{}`", field.name.inner),
                    field.name.span.clone(),
                ));
            }
            let ty = self.resolve_type(&field.annotation)?;
            if !ty.is_value_type() {
                return Err(Diagnostic::type_error(
                    "struct fields cannot be of type HashMap",
                    field.annotation.span.clone(),
                ));
            }
            fields.push((field.name.inner.to_string(), ty));
        }
        if fields.is_empty() {
            return Err(Diagnostic::structure("structs need at least one field", def.span.clone()));
        }
        let ty = StructType { name: def.name.inner.to_string(), fields };
        self.structs.insert(def.name.inner, Arc::new(ty));
        Ok(())
    }

    fn declare_interface(&mut self, def: &InterfaceDef<'src>) -> Result<()> {
        self.declare_name(&def.name)?;
        let mut functions: Vec<ExternalSignature> = Vec::with_capacity(def.functions.len());
        for function in &def.functions {
            let Some(mutability) = Mutability::from_name(function.mutability.inner) else {
                return Err(Diagnostic::structure(
                    format!("unknown mutability `{}`", function.mutability.inner),
                    function.mutability.span.clone(),
                ));
            };
            let params = function
                .params
                .iter()
                .map(|param| self.resolve_value_type(&param.annotation))
                .collect::<Result<Vec<_>>>()?;
            let returns =
                function.returns.as_ref().map(|r| self.resolve_value_type(r)).transpose()?;
            let name = function.name.inner.to_string();
            let signature = ExternalSignature { name, params, returns, mutability };
            if functions.iter().any(|other| other.name == signature.name) {
                return Err(Diagnostic::structure(
                    format!("duplicate interface function `{}`", signature.name),
                    function.name.span.clone(),
                ));
            }
            functions.push(signature);
        }
        let ty = InterfaceType { name: def.name.inner.to_string(), functions };
        self.interfaces.insert(def.name.inner, Arc::new(ty));
        Ok(())
    }

    fn declare_event<'a>(
        &mut self,
        name: &Ident<'src>,
        fields: impl Iterator<Item = (&'a Ident<'src>, &'a Expr<'src>)>,
    ) -> Result<()>
    where
        'src: 'a,
    {
        self.declare_name(name)?;
        let mut event_fields: Vec<EventField> = Vec::new();
        for (field, annotation) in fields {
            let (indexed, annotation) = match wrapper(annotation) {
                Some(("indexed", inner)) => (true, inner),
                _ => (false, annotation),
            };
            let ty = self.resolve_value_type(annotation)?;
            if indexed && !(ty.is_word() || ty.is_byte_array()) {
                return Err(Diagnostic::type_error(
                    format!("indexed event fields cannot be of type `{ty}`"),
                    annotation.span.clone(),
                ));
            }
            if event_fields.iter().any(|f| f.name == field.inner) {
                return Err(Diagnostic::structure(
                    format!("duplicate event field `{}`", field.inner),
                    field.span.clone(),
                ));
            }
            event_fields.push(EventField { name: field.inner.to_string(), ty, indexed });
        }
        if event_fields.iter().filter(|f| f.indexed).count() > 3 {
            return Err(Diagnostic::type_error(
                "events can have at most 3 indexed fields",
                name.span.clone(),
            ));
        }
        let types: Vec<String> = event_fields.iter().map(|f| f.ty.abi_name()).collect();
        let topic0: B256 = keccak256(format!("{}({})", name.inner, types.join(",")));
        let id = self.contract.events.push(Event {
            name: name.inner.to_string(),
            fields: event_fields,
            topic0,
        });
        self.events.insert(name.inner, id);
        Ok(())
    }

    fn declare_variable(&mut self, decl: &VariableDecl<'src>) -> Result<()> {
        let (public, annotation) = match wrapper(&decl.annotation) {
            Some(("event", fields)) => {
                let ast::ExprKind::Dict(entries) = &fields.kind else {
                    return Err(Diagnostic::structure(
                        "event fields must be given as a dict",
                        fields.span.clone(),
                    ));
                };
                let mut named = Vec::with_capacity(entries.len());
                for (key, annotation) in entries {
                    let ast::ExprKind::Name(name) = key.kind else {
                        return Err(Diagnostic::syntax(
                            "field names must be plain identifiers",
                            key.span.clone(),
                        ));
                    };
                    named.push((Ident::new(name, key.span.clone()), annotation));
                }
                return self.declare_event(&decl.name, named.iter().map(|(n, a)| (n, *a)));
            }
            Some(("constant", _)) => return Ok(()),
            Some(("public", inner)) => match wrapper(inner) {
                Some(("constant", _)) => return Ok(()),
                _ => (true, inner),
            },
            _ => (false, &decl.annotation),
        };
        if let Some(value) = &decl.value {
            return Err(Diagnostic::structure(
                "only constants can be given a value at declaration",
                value.span.clone(),
            ));
        }
        self.declare_name(&decl.name)?;

        if let Some(("immutable", inner)) = wrapper(annotation) {
            let ty = self.resolve_value_type(inner)?;
            let offset = self.immutables_end;
            self.immutables_end += ty.memory_size();
            let id = self.contract.immutables.push(ImmutableVar {
                name: decl.name.inner.to_string(),
                ty: ty.clone(),
                offset,
            });
            self.immutable_spans.push(decl.name.span.clone());
            let location = Location::Immutable(id);
            let binding = Binding { ty: ty.clone(), location, mutable: false };
            let scope = self.scopes.module();
            self.scopes.declare(scope, decl.name.inner, binding)
                .map_err(|_| already_declared(&decl.name))?;
            if public {
                let access = TypedExpr::new(ExprKind::Immutable(id), ty, decl.name.span.clone());
                self.add_getter(&decl.name, access);
            }
            return Ok(());
        }

        let ty = self.resolve_type(annotation)?;
        let slot = self.next_slot;
        self.next_slot += ty.storage_slots();
        let id = self.contract.storage.push(StorageVar {
            name: decl.name.inner.to_string(),
            ty: ty.clone(),
            slot,
        });
        self.storage.insert(decl.name.inner, id);
        if public {
            let access = TypedExpr::new(ExprKind::Storage(id), ty, decl.name.span.clone());
            self.add_getter(&decl.name, access);
        }
        Ok(())
    }

    /// External view function returning `access`, taking one argument per `HashMap` key or
    /// array index needed to reach a value.
    fn add_getter(&mut self, name: &Ident<'src>, access: TypedExpr) {
        let span = name.span.clone();
        let mut locals = IndexVec::<LocalId, Local>::new();
        let mut params = Vec::new();
        let mut value = access;
        loop {
            let (key, element) = match &value.ty {
                Type::HashMap(key, element) => ((**key).clone(), (**element).clone()),
                Type::Array(element, _) => (Type::UINT256, (**element).clone()),
                _ => break,
            };
            let arg = format!("arg{}", params.len());
            let local = locals.push(Local { name: arg, ty: key.clone() });
            params.push(local);
            let index = TypedExpr::new(ExprKind::Local(local), key, span.clone());
            let kind = ExprKind::Index { base: Box::new(value), index: Box::new(index) };
            value = TypedExpr::new(kind, element, span.clone());
        }
        self.contract.functions.push(Function {
            name: name.inner.to_string(),
            kind: FunctionKind::External,
            mutability: Mutability::View,
            params,
            locals,
            returns: Some(value.ty.clone()),
            defaults: Vec::new(),
            body: vec![Stmt::Return(Some(value))],
            span,
        });
    }

    fn declare_function(&mut self, def: &FunctionDef<'src>) -> Result<FunctionId> {
        let mut visibility: Option<&str> = None;
        let mut mutability: Option<Mutability> = None;
        for decorator in &def.decorators {
            let Some(name) = decorator.as_name() else {
                return Err(Diagnostic::structure("unsupported decorator", decorator.span.clone()));
            };
            match name {
                "external" | "internal" | "deploy" if visibility.is_none() => {
                    visibility = Some(name)
                }
                "pure" | "view" | "nonpayable" | "payable" if mutability.is_none() => {
                    mutability = Mutability::from_name(name)
                }
                "external" | "internal" | "deploy" | "pure" | "view" | "nonpayable" | "payable" => {
                    return Err(Diagnostic::structure(
                        format!("conflicting decorator `@{name}`"),
                        decorator.span.clone(),
                    ));
                }
                _ => {
                    return Err(Diagnostic::structure(
                        format!("unknown decorator `@{name}`"),
                        decorator.span.clone(),
                    ));
                }
            }
        }

        let name_span = def.name.span.clone();
        let kind = match (def.name.inner, visibility) {
            ("__init__", None | Some("external" | "deploy")) => FunctionKind::Constructor,
            ("__init__", _) => {
                return Err(Diagnostic::structure("the constructor cannot be internal", name_span));
            }
            ("__default__", Some("external")) => FunctionKind::Fallback,
            ("__default__", _) => {
                return Err(Diagnostic::structure("`__default__` must be external", name_span));
            }
            (_, Some("external")) => FunctionKind::External,
            (_, None | Some("internal")) => FunctionKind::Internal,
            (_, Some(other)) => {
                return Err(Diagnostic::structure(
                    format!("`@{other}` is only valid on the constructor"),
                    name_span,
                ));
            }
        };
        let mutability = mutability.unwrap_or(Mutability::Nonpayable);
        match kind {
            FunctionKind::Constructor | FunctionKind::Fallback
                if !mutability.can_write_state() =>
            {
                return Err(Diagnostic::structure(
                    format!("`{}` cannot be {}", def.name.inner, mutability_name(mutability)),
                    name_span,
                ));
            }
            FunctionKind::Internal if mutability == Mutability::Payable => {
                let message = "internal functions cannot be payable";
                return Err(Diagnostic::structure(message, name_span));
            }
            _ => {}
        }
        if kind == FunctionKind::Constructor && def.returns.is_some() {
            return Err(Diagnostic::structure("the constructor cannot return a value", name_span));
        }
        if kind == FunctionKind::Fallback && !def.params.is_empty() {
            return Err(Diagnostic::structure("`__default__` cannot take arguments", name_span));
        }

        let mut locals = IndexVec::<LocalId, Local>::new();
        let mut params = Vec::with_capacity(def.params.len());
        let mut defaults = Vec::new();
        for param in &def.params {
            if locals.iter().any(|local| local.name == param.name.inner) {
                return Err(Diagnostic::structure(
                    format!("duplicate argument `{}`", param.name.inner),
                    param.name.span.clone(),
                ));
            }
            let ty = self.resolve_value_type(&param.annotation)?;
            match &param.default {
                Some(default) => {
                    if matches!(kind, FunctionKind::Constructor | FunctionKind::Fallback) {
                        return Err(Diagnostic::structure(
                            "the constructor cannot have default arguments",
                            default.span.clone(),
                        ));
                    }
                    defaults.push(self.constant_checker().constant(default, &ty)?);
                }
                None if !defaults.is_empty() => {
                    return Err(Diagnostic::structure(
                        "arguments without a default cannot follow arguments with one",
                        param.span.clone(),
                    ));
                }
                None => {}
            }
            params.push(locals.push(Local { name: param.name.inner.to_string(), ty }));
        }
        let returns = def.returns.as_ref().map(|r| self.resolve_value_type(r)).transpose()?;

        self.declare_name(&def.name)?;
        let id = self.contract.functions.push(Function {
            name: def.name.inner.to_string(),
            kind,
            mutability,
            params,
            locals,
            returns,
            defaults,
            body: Vec::new(),
            span: def.span.clone(),
        });
        self.functions.insert(def.name.inner, id);
        match kind {
            FunctionKind::Constructor => self.contract.constructor = Some(id),
            FunctionKind::Fallback => self.contract.fallback = Some(id),
            _ => {}
        }
        Ok(id)
    }

    /// Every external entry point, including each shortened form of functions with default
    /// arguments, needs a distinct selector.
    fn check_selectors(&self) -> Result<()> {
        let mut seen: HashMap<[u8; 4], String> = HashMap::new();
        for (_, function) in self.contract.external_functions() {
            let signature = function.signature();
            for arity in function.required_params()..=function.params.len() {
                let mut shortened = signature.clone();
                shortened.params.truncate(arity);
                let canonical = shortened.canonical();
                if let Some(other) = seen.insert(shortened.selector(), canonical.clone()) {
                    return Err(Diagnostic::structure(
                        format!("selector of `{canonical}` collides with `{other}`"),
                        function.span.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_body(&mut self, id: FunctionId, def: &FunctionDef<'src>) -> Result<FunctionState> {
        let function = &self.contract.functions[id];
        let state = FunctionState {
            kind: function.kind,
            mutability: function.mutability,
            returns: function.returns.clone(),
            locals: function.locals.clone(),
            calls: Vec::new(),
            assigned_immutables: HashSet::new(),
        };
        let params: Vec<(LocalId, Type)> =
            function.params.iter().map(|&p| (p, function.locals[p].ty.clone())).collect();

        let scope = self.scopes.push(self.scopes.module());
        for (param, (local, ty)) in def.params.iter().zip(params) {
            stmt::check_local_name(&param.name)?;
            let binding = Binding { ty, location: Location::Memory(local), mutable: false };
            self.scopes.declare(scope, param.name.inner, binding)
                .map_err(|_| already_declared(&param.name))?;
        }

        let mut checker = Checker { module: self, function: Some(state), scope };
        let body = checker.block(&def.body)?;
        let Some(state) = checker.function.take() else {
            return Err(Diagnostic::structure("function state lost", def.span.clone()));
        };
        if let Some(ty) = &state.returns {
            if !stmt::terminates(&body) {
                return Err(Diagnostic::structure(
                    format!("`{}` may finish without returning a `{ty}`", def.name.inner),
                    def.name.span.clone(),
                ));
            }
        }

        let function = &mut self.contract.functions[id];
        function.locals = state.locals.clone();
        function.body = body;
        Ok(state)
    }

    /// Internal functions use statically allocated frames, so call cycles are rejected.
    fn check_recursion(
        &self,
        calls: &IndexVec<FunctionId, Vec<(FunctionId, Span)>>,
    ) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn visit(
            node: FunctionId,
            calls: &IndexVec<FunctionId, Vec<(FunctionId, Span)>>,
            marks: &mut IndexVec<FunctionId, Mark>,
            contract: &Contract,
        ) -> Result<()> {
            marks[node] = Mark::Active;
            for (callee, span) in &calls[node] {
                match marks[*callee] {
                    Mark::Active => {
                        return Err(Diagnostic::structure(
                            format!(
                                "recursive call to `{}` is not allowed",
                                contract.functions[*callee].name
                            ),
                            span.clone(),
                        ));
                    }
                    Mark::Unvisited => visit(*callee, calls, marks, contract)?,
                    Mark::Done => {}
                }
            }
            marks[node] = Mark::Done;
            Ok(())
        }

        let mut marks = IndexVec::<FunctionId, Mark>::new();
        marks.resize(calls.len(), Mark::Unvisited);
        for (id, _) in calls.iter_enumerated() {
            if marks[id] == Mark::Unvisited {
                visit(id, calls, &mut marks, &self.contract)?;
            }
        }
        Ok(())
    }
}

impl<'src> Checker<'_, 'src> {
    /// Checks an expression that must fold to a literal.
    pub(crate) fn constant(&mut self, expr: &Expr<'src>, ty: &Type) -> Result<TypedExpr> {
        let value = self.expr(expr, Some(ty))?;
        match value.kind {
            ExprKind::Literal(_) | ExprKind::BytesLiteral(_) => Ok(value),
            _ => {
                let message = "value must be a compile-time constant";
                Err(Diagnostic::type_error(message, expr.span.clone()))
            }
        }
    }

    pub(crate) fn state(&mut self, span: &Span) -> Result<&mut FunctionState> {
        self.function.as_mut().ok_or_else(|| {
            Diagnostic::type_error("value must be a compile-time constant", span.clone())
        })
    }

    /// Reading storage, immutables or balances.
    pub(crate) fn require_state_read(&self, span: &Span) -> Result<()> {
        match &self.function {
            Some(state) if !state.mutability.can_read_state() => Err(Diagnostic::structure(
                "pure functions cannot read contract state",
                span.clone(),
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn require_state_write(&self, action: &str, span: &Span) -> Result<()> {
        match &self.function {
            Some(state) if !state.mutability.can_write_state() => {
                let mutability = mutability_name(state.mutability);
                let message = format!("{action} is not allowed in {mutability} functions");
                Err(Diagnostic::structure(message, span.clone()))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn declare_local(
        &mut self,
        name: &Ident<'src>,
        ty: Type,
        mutable: bool,
    ) -> Result<LocalId> {
        stmt::check_local_name(name)?;
        let state = self.state(&name.span)?;
        let id = state.locals.push(Local { name: name.inner.to_string(), ty: ty.clone() });
        let binding = Binding { ty, location: Location::Memory(id), mutable };
        let scope = self.scope;
        self.module.scopes.declare(scope, name.inner, binding).map_err(|_| already_declared(name))?;
        Ok(id)
    }
}

pub(crate) fn mutability_name(mutability: Mutability) -> &'static str {
    match mutability {
        Mutability::Pure => "pure",
        Mutability::View => "view",
        Mutability::Nonpayable => "nonpayable",
        Mutability::Payable => "payable",
    }
}

#[cfg(test)]
mod tests;
