//! Scoped name lookup and function overload resolution.
//!
//! Plain names live in a stack of scopes searched top-down; functions live
//! in a separate multi-map keyed by name, because a call site selects among
//! all same-named candidates by argument types. A table can consult the
//! frozen global symbols of a compiled preamble: local candidates win, the
//! preamble is searched only when the local table has nothing viable.

use crate::ast::{DeclView, NodeId};
use crate::atom::AtomString;
use crate::types::{TypeContext, TypeId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Which kind of scope a declaration was registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclScope {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub decl: NodeId,
    pub name: AtomString,
    pub param_types: Vec<TypeId>,
    pub return_type: TypeId,
    /// Set when this entry redeclares a compatible earlier prototype.
    pub first_declaration: Option<NodeId>,
    pub has_body: bool,
}

/// The frozen global scope of a finished compilation, shared by pointer
/// with later invocations.
#[derive(Debug, Default, Clone)]
pub struct GlobalSymbols {
    pub variables: HashMap<AtomString, DeclView>,
    pub functions: HashMap<AtomString, Vec<FunctionEntry>>,
}

pub enum FunctionLookup {
    Found(FunctionEntry),
    Ambiguous(Vec<FunctionEntry>),
    NotFound,
}

#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<AtomString, DeclView>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    external: Option<Arc<GlobalSymbols>>,
    scopes: Vec<Scope>,
    functions: HashMap<AtomString, Vec<FunctionEntry>>,
}

impl SymbolTable {
    pub fn new(external: Option<Arc<GlobalSymbols>>) -> Self {
        SymbolTable { external, scopes: vec![Scope::default()], functions: HashMap::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        // The global scope cannot be popped.
        debug_assert!(self.scopes.len() > 1);
        self.scopes.pop();
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current_decl_scope(&self) -> DeclScope {
        match self.scopes.len() {
            1 => DeclScope::Global,
            2 => DeclScope::Function,
            _ => DeclScope::Block,
        }
    }

    /// Register a name in the innermost scope; later registrations shadow
    /// earlier ones.
    pub fn add_symbol(&mut self, name: AtomString, decl: DeclView) {
        self.scopes.last_mut().expect("scope stack is never empty").symbols.insert(name, decl);
    }

    pub fn find_symbol(&self, name: AtomString) -> Option<DeclView> {
        for scope in self.scopes.iter().rev() {
            if let Some(&decl) = scope.symbols.get(&name) {
                return Some(decl);
            }
        }
        self.external.as_ref().and_then(|ext| ext.variables.get(&name).copied())
    }

    /// Register a function, linking it to an earlier compatible prototype
    /// if one exists. Returns the first declaration it links to.
    pub fn add_function(&mut self, mut entry: FunctionEntry) -> Option<NodeId> {
        let overloads = self.functions.entry(entry.name).or_default();
        let first = overloads
            .iter()
            .find(|existing| existing.param_types == entry.param_types)
            .map(|existing| existing.first_declaration.unwrap_or(existing.decl));
        entry.first_declaration = first;
        overloads.push(entry);
        first
    }

    /// Overload resolution: among visible same-named functions with a
    /// matching parameter count where every argument converts implicitly,
    /// pick the candidate that is at least as good on every argument and
    /// strictly better on at least one.
    pub fn find_function(
        &self,
        name: AtomString,
        arg_types: &[TypeId],
        types: &TypeContext,
    ) -> FunctionLookup {
        let local = self.functions.get(&name).map(Vec::as_slice).unwrap_or(&[]);
        match resolve_overloads(local, arg_types, types) {
            FunctionLookup::NotFound => {}
            found => return found,
        }
        let external = self
            .external
            .as_ref()
            .and_then(|ext| ext.functions.get(&name))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        resolve_overloads(external, arg_types, types)
    }

    /// Freeze this table's global scope and function set for sharing.
    pub fn into_global_symbols(mut self) -> GlobalSymbols {
        debug_assert_eq!(self.scopes.len(), 1, "only the global scope survives a compilation");
        let mut variables =
            self.scopes.pop().map(|scope| scope.symbols).unwrap_or_default();
        let mut functions = self.functions;
        // Fold the preamble's symbols in so the frozen set is self-contained.
        if let Some(external) = self.external.take() {
            for (name, decl) in &external.variables {
                variables.entry(*name).or_insert(*decl);
            }
            for (name, overloads) in &external.functions {
                functions.entry(*name).or_insert_with(|| overloads.clone());
            }
        }
        GlobalSymbols { variables, functions }
    }
}

fn resolve_overloads(
    candidates: &[FunctionEntry],
    arg_types: &[TypeId],
    types: &TypeContext,
) -> FunctionLookup {
    let mut viable: Vec<&FunctionEntry> = Vec::new();
    for entry in candidates {
        if entry.param_types.len() != arg_types.len() {
            continue;
        }
        if !entry
            .param_types
            .iter()
            .zip(arg_types)
            .all(|(&param, &arg)| types.is_convertible_to(arg, param))
        {
            continue;
        }
        // A redeclaration of an already-viable signature (prototype plus
        // definition) is the same candidate.
        if viable.iter().any(|existing| existing.param_types == entry.param_types) {
            continue;
        }
        viable.push(entry);
    }

    match viable.len() {
        0 => FunctionLookup::NotFound,
        1 => FunctionLookup::Found(viable[0].clone()),
        _ => {
            // `lhs` beats `rhs` when no argument converts better to `rhs`
            // and at least one converts strictly better to `lhs`.
            let beats = |lhs: &FunctionEntry, rhs: &FunctionEntry| -> bool {
                let mut strictly_better = false;
                for ((&l, &r), &arg) in lhs.param_types.iter().zip(&rhs.param_types).zip(arg_types) {
                    if types.has_better_conversion(arg, r, l) {
                        return false;
                    }
                    if types.has_better_conversion(arg, l, r) {
                        strictly_better = true;
                    }
                }
                strictly_better
            };

            let mut best = viable[0];
            for &candidate in &viable[1..] {
                if beats(candidate, best) {
                    best = candidate;
                }
            }
            if viable.iter().all(|&other| std::ptr::eq(other, best) || beats(best, other)) {
                FunctionLookup::Found(best.clone())
            } else {
                FunctionLookup::Ambiguous(viable.into_iter().cloned().collect())
            }
        }
    }
}
