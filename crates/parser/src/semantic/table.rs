//! Chained symbol scopes shared by the analyzer, transformer, and
//! generator.
//!
//! Scopes live in one flat arena with parent indices; an explicit scope
//! stack tracks the active chain. A scope created for a function keeps its
//! name, so later passes re-enter it with [`SymbolTable::enter_scope`] and
//! see the same symbols the analyzer left behind.

use indexmap::map::Entry;
use indexmap::IndexMap;
use std::collections::HashMap;

use crate::types::{FunctionSig, Type};

pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    /// Name of the scope that owns the symbol.
    pub scope: String,
    /// Host-side type string from introspection, kept only for
    /// compatibility checks.
    pub go_type: Option<String>,
    /// Set by the generator on the symbol's first emitted write.
    pub declared: bool,
    /// Ordered history of types assigned to this name.
    pub assigned: Vec<Type>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type, scope: impl Into<String>) -> Self {
        let ty_clone = ty.clone();
        Symbol {
            name: name.into(),
            ty,
            scope: scope.into(),
            go_type: None,
            declared: false,
            assigned: vec![ty_clone],
        }
    }

    pub fn function_sig(&self) -> Option<&FunctionSig> {
        match &self.ty {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub parent: Option<usize>,
    symbols: IndexMap<String, Symbol>,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    scope_stack: Vec<usize>,
    named_scopes: HashMap<String, usize>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let global = Scope {
            name: GLOBAL_SCOPE.to_string(),
            parent: None,
            symbols: IndexMap::new(),
        };
        let mut named_scopes = HashMap::new();
        named_scopes.insert(GLOBAL_SCOPE.to_string(), 0);
        SymbolTable {
            scopes: vec![global],
            scope_stack: vec![0],
            named_scopes,
        }
    }

    fn current(&self) -> usize {
        *self.scope_stack.last().unwrap_or(&0)
    }

    pub fn current_scope_name(&self) -> &str {
        &self.scopes[self.current()].name
    }

    /// Open a new child scope of the active one and make it active.
    pub fn push_scope(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        let id = self.scopes.len();
        self.scopes.push(Scope {
            name: name.clone(),
            parent: Some(self.current()),
            symbols: IndexMap::new(),
        });
        self.named_scopes.insert(name, id);
        self.scope_stack.push(id);
        id
    }

    /// Re-enter a scope created by an earlier pass. Unknown names open a
    /// fresh scope so a pass never dead-ends.
    pub fn enter_scope(&mut self, name: &str) {
        match self.named_scopes.get(name) {
            Some(&id) => self.scope_stack.push(id),
            None => {
                self.push_scope(name);
            }
        }
    }

    pub fn pop_scope(&mut self) {
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
        }
    }

    /// Define (or overwrite) `name` in the active scope.
    pub fn define(&mut self, name: impl Into<String>, ty: Type) -> &mut Symbol {
        let scope_id = self.current();
        let scope_name = self.scopes[scope_id].name.clone();
        let name = name.into();
        let symbol = Symbol::new(name.clone(), ty, scope_name);
        insert_symbol(&mut self.scopes[scope_id], name, symbol)
    }

    /// Define `name` in the outermost scope, regardless of what is active.
    pub fn define_global(&mut self, name: impl Into<String>, ty: Type) -> &mut Symbol {
        let name = name.into();
        let symbol = Symbol::new(name.clone(), ty, GLOBAL_SCOPE);
        insert_symbol(&mut self.scopes[0], name, symbol)
    }

    /// Resolve `name` through the active chain of scopes.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        let mut scope_id = Some(self.current());
        while let Some(id) = scope_id {
            let scope = &self.scopes[id];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            scope_id = scope.parent;
        }
        None
    }

    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let mut scope_id = Some(self.current());
        while let Some(id) = scope_id {
            if self.scopes[id].symbols.contains_key(name) {
                return self.scopes[id].symbols.get_mut(name);
            }
            scope_id = self.scopes[id].parent;
        }
        None
    }

    /// Whether `name` is defined in the active scope itself.
    pub fn defined_locally(&self, name: &str) -> bool {
        self.scopes[self.current()].symbols.contains_key(name)
    }

    /// Record an assignment of `ty` to `name` wherever it resolves,
    /// widening the symbol's type when it changes.
    pub fn assign(&mut self, name: &str, ty: Type) {
        if let Some(symbol) = self.resolve_mut(name) {
            if symbol.ty.to_string() != ty.to_string() {
                symbol.ty = ty.clone();
            }
            if symbol.assigned.last().map(|t| t.to_string()) != Some(ty.to_string()) {
                symbol.assigned.push(ty);
            }
        }
    }

    /// Look up a symbol by searching every scope, nearest first by scope
    /// creation order. Used for function symbols referenced across passes.
    pub fn find_anywhere(&self, name: &str) -> Option<&Symbol> {
        let mut scope_id = Some(self.current());
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id].symbols.get(name) {
                return Some(symbol);
            }
            scope_id = self.scopes[id].parent;
        }
        self.scopes
            .iter()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// Update the `index`-th parameter type of function `fn_name`: both
    /// the function symbol's signature and the parameter symbol inside
    /// the function's own scope.
    pub fn update_function_param(&mut self, fn_name: &str, index: usize, ty: Type) {
        for scope in &mut self.scopes {
            if let Some(symbol) = scope.symbols.get_mut(fn_name) {
                if let Type::Function(sig) = &mut symbol.ty {
                    if let Some(slot) = sig.params.get_mut(index) {
                        *slot = ty.clone();
                    }
                }
            }
        }
        if let Some(&scope_id) = self.named_scopes.get(fn_name) {
            // Parameters are the scope's first definitions, in order.
            if let Some((_, symbol)) = self.scopes[scope_id].symbols.get_index_mut(index) {
                symbol.ty = ty;
            }
        }
    }

    /// Replace the recorded return types of function `fn_name`.
    pub fn update_function_returns(&mut self, fn_name: &str, returns: Vec<Type>) {
        for scope in &mut self.scopes {
            if let Some(symbol) = scope.symbols.get_mut(fn_name) {
                if let Type::Function(sig) = &mut symbol.ty {
                    sig.returns = returns.clone();
                }
            }
        }
    }

    /// Symbols of a named scope in definition order.
    pub fn scope_symbols(&self, name: &str) -> impl Iterator<Item = &Symbol> {
        let id = self.named_scopes.get(name).copied();
        id.into_iter()
            .flat_map(move |id| self.scopes[id].symbols.values())
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.named_scopes.contains_key(name)
    }
}

fn insert_symbol(scope: &mut Scope, name: String, symbol: Symbol) -> &mut Symbol {
    match scope.symbols.entry(name) {
        Entry::Occupied(mut entry) => {
            entry.insert(symbol);
            entry.into_mut()
        }
        Entry::Vacant(entry) => entry.insert(symbol),
    }
}
