use std::collections::HashMap;

use super::types::{FunctionSignature, Symbol};

/// One naming environment. Scopes never outlive the analyzer; the stack
/// below owns them outright.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    pub symbols: HashMap<String, Symbol>,
    pub functions: HashMap<String, FunctionSignature>,
}

/// The analyzer's scope chain as an explicit stack: index 0 is the global
/// scope, the last entry is the innermost. Lookup walks outward; definitions
/// always land in the innermost scope.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop(&mut self) {
        // The global scope stays for the lifetime of the analyzer.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn define_symbol(&mut self, symbol: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.symbols.insert(symbol.name.clone(), symbol);
        }
    }

    pub fn define_function(&mut self, function: FunctionSignature) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.functions.insert(function.name.clone(), function);
        }
    }

    pub fn find_symbol(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionSignature> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.functions.get(name))
    }

    /// Shadowing checks only consult the innermost scope.
    pub fn symbol_in_current(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.symbols.contains_key(name))
    }

    pub fn function_in_current(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.functions.contains_key(name))
    }

    /// Collapses the stack back to the global scope and hands it over, for
    /// consumers that outlive the analysis (the code generator).
    pub fn into_global(mut self) -> Scope {
        self.scopes.truncate(1);
        self.scopes.pop().unwrap_or_default()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
