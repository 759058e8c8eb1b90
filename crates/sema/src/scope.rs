//! Lexical scopes, stored in an arena and linked to their parent by index.

use std::collections::HashMap;
use vyc_data::{ImmutableId, IndexVec, LocalId, TypedExpr, Type, newtype_index};

newtype_index! {
    pub struct ScopeId;
}

#[derive(Debug, Clone)]
pub enum Location {
    /// Memory-resident local or parameter.
    Memory(LocalId),
    Immutable(ImmutableId),
    /// Folded value, inlined at every use.
    Constant(TypedExpr),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub location: Location,
    pub mutable: bool,
}

#[derive(Debug)]
struct ScopeRecord<'src> {
    parent: Option<ScopeId>,
    names: HashMap<&'src str, Binding>,
}

#[derive(Debug)]
pub struct Scopes<'src> {
    records: IndexVec<ScopeId, ScopeRecord<'src>>,
}

impl<'src> Scopes<'src> {
    /// Arena holding only the module scope.
    pub fn new() -> Self {
        let mut records = IndexVec::new();
        records.push(ScopeRecord { parent: None, names: HashMap::new() });
        Self { records }
    }

    pub fn module(&self) -> ScopeId {
        ScopeId::new(0)
    }

    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.records.push(ScopeRecord { parent: Some(parent), names: HashMap::new() })
    }

    /// Declares `name` in `scope`. Shadowing a name of any enclosing scope is refused, in which
    /// case the binding is handed back.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &'src str,
        binding: Binding,
    ) -> Result<(), Binding> {
        if self.lookup(scope, name).is_some() {
            return Err(binding);
        }
        self.records[scope].names.insert(name, binding);
        Ok(())
    }

    /// Innermost binding of `name` visible from `scope`.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Binding> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let record = &self.records[id];
            if let Some(binding) = record.names.get(name) {
                return Some(binding);
            }
            current = record.parent;
        }
        None
    }
}

impl Default for Scopes<'_> {
    fn default() -> Self {
        Self::new()
    }
}
