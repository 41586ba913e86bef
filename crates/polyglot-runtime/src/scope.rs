//! Lexical scopes as an index-linked arena.
//!
//! Closures capture their defining scope by [`ScopeId`]; the arena is
//! owned by the interpreter instance and dropped at end of run, so the
//! cycle "function holds scope holds function" never appears in the
//! ownership graph.

use std::collections::HashMap;

use crate::value::Value;

/// Index of a scope inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// What kind of thing a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Class,
    Namespace,
    Builtin,
    Imported,
}

/// One binding in a scope.
#[derive(Debug)]
pub struct Binding<F> {
    pub value: Value<F>,
    pub kind: SymbolKind,
}

impl<F> Clone for Binding<F> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            kind: self.kind,
        }
    }
}

struct Scope<F> {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Binding<F>>,
}

/// Arena of scopes for one interpreter run.
pub struct ScopeArena<F> {
    scopes: Vec<Scope<F>>,
}

impl<F> Default for ScopeArena<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> ScopeArena<F> {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Allocate a new scope chained to `parent`.
    pub fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            symbols: HashMap::new(),
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// Install a binding in `scope` itself (declaration).
    ///
    /// Returns `false` if the name was already declared in this scope;
    /// the binding is replaced either way.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        value: Value<F>,
        kind: SymbolKind,
    ) -> bool {
        self.scopes[scope.0]
            .symbols
            .insert(name.into(), Binding { value, kind })
            .is_none()
    }

    /// Look a name up, walking the parent chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Binding<F>> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(binding) = self.scopes[id.0].symbols.get(name) {
                return Some(binding);
            }
            current = self.scopes[id.0].parent;
        }
        None
    }

    /// True if the name is declared in `scope` itself, ignoring parents.
    pub fn declared_here(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].symbols.contains_key(name)
    }

    /// Assign to the nearest scope that already binds `name`.
    ///
    /// Returns `false` if no enclosing scope binds it (the caller
    /// decides whether that is an implicit declaration or an error).
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value<F>) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(binding) = self.scopes[id.0].symbols.get_mut(name) {
                binding.value = value;
                return true;
            }
            current = self.scopes[id.0].parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyFn;

    fn int(n: i64) -> Value<DummyFn> {
        Value::Int(n)
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut arena: ScopeArena<DummyFn> = ScopeArena::new();
        let global = arena.push(None);
        let inner = arena.push(Some(global));
        arena.declare(global, "x", int(1), SymbolKind::Variable);
        let binding = arena.lookup(inner, "x").unwrap();
        assert!(matches!(binding.value, Value::Int(1)));
    }

    #[test]
    fn test_declare_shadows_without_touching_parent() {
        let mut arena: ScopeArena<DummyFn> = ScopeArena::new();
        let global = arena.push(None);
        let inner = arena.push(Some(global));
        arena.declare(global, "x", int(1), SymbolKind::Variable);
        arena.declare(inner, "x", int(2), SymbolKind::Variable);
        assert!(matches!(arena.lookup(inner, "x").unwrap().value, Value::Int(2)));
        assert!(matches!(arena.lookup(global, "x").unwrap().value, Value::Int(1)));
    }

    #[test]
    fn test_assign_mutates_nearest_binder() {
        let mut arena: ScopeArena<DummyFn> = ScopeArena::new();
        let global = arena.push(None);
        let inner = arena.push(Some(global));
        arena.declare(global, "x", int(1), SymbolKind::Variable);
        assert!(arena.assign(inner, "x", int(9)));
        assert!(matches!(arena.lookup(global, "x").unwrap().value, Value::Int(9)));
    }

    #[test]
    fn test_assign_unbound_reports_false() {
        let mut arena: ScopeArena<DummyFn> = ScopeArena::new();
        let global = arena.push(None);
        assert!(!arena.assign(global, "nope", int(0)));
    }

    #[test]
    fn test_redeclaration_reported() {
        let mut arena: ScopeArena<DummyFn> = ScopeArena::new();
        let global = arena.push(None);
        assert!(arena.declare(global, "x", int(1), SymbolKind::Variable));
        assert!(!arena.declare(global, "x", int(2), SymbolKind::Variable));
    }
}
