use std::collections::HashMap;

/// Name bindings layered by lexical depth, searched innermost-out.
///
/// Each analysis pass keeps its own stack while walking and binds whatever
/// it needs per name; nothing here outlives the walk. Resolution is
/// sequential and deterministic, so a plain `HashMap` per layer suffices.
#[derive(Debug, Clone)]
pub struct ScopeStack<T> {
    layers: Vec<ScopeLayer<T>>,
}

#[derive(Debug, Clone)]
struct ScopeLayer<T> {
    bindings: HashMap<String, T>,
}

impl<T> ScopeLayer<T> {
    fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }
}

impl<T: Clone> Default for ScopeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ScopeStack<T> {
    /// Creates a stack holding the initial outermost scope.
    pub fn new() -> Self {
        Self {
            layers: vec![ScopeLayer::new()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.layers.push(ScopeLayer::new());
    }

    /// Drops the innermost scope. The outermost layer is never dropped.
    pub fn exit_scope(&mut self) {
        if self.layers.len() > 1 {
            self.layers.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Binds a name in the innermost scope, replacing any binding of the
    /// same name at this depth.
    pub fn bind(&mut self, name: impl Into<String>, value: T) {
        if let Some(layer) = self.layers.last_mut() {
            layer.bindings.insert(name.into(), value);
        }
    }

    /// Resolves a name, searching from innermost to outermost scope.
    pub fn resolve(&self, name: &str) -> Option<T> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.bindings.get(name) {
                return Some(value.clone());
            }
        }
        None
    }

    /// Resolves a name in the enclosing scopes only, skipping the innermost
    /// layer. A hit here while binding the same name innermost is shadowing.
    pub fn resolve_outer(&self, name: &str) -> Option<T> {
        for layer in self.layers.iter().rev().skip(1) {
            if let Some(value) = layer.bindings.get(name) {
                return Some(value.clone());
            }
        }
        None
    }

    pub fn bound_in_current(&self, name: &str) -> bool {
        self.layers
            .last()
            .is_some_and(|layer| layer.bindings.contains_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}
