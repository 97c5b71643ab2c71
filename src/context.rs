//! Per-session state: providers, parameter declarations, facts, slots.
//!
//! A [`Context`] is the unit of isolation. Everything analysis learns and
//! everything compilation allocates lives here; two sessions never share
//! state, so distinct contexts are usable from distinct threads. Artifacts
//! produced under a context do not borrow from it.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::ast::NodeId;
use crate::semantic::{Diagnostic, SemanticError, SemanticFacts, SemanticResult};
use crate::typesystem::{NativeProvider, ProviderChain, TypeDefinition, TypeProvider};

/// One declared invocation parameter. Order of declaration is the order of
/// values handed to `CompiledExpr::invoke`.
#[derive(Debug, Clone)]
pub struct ParameterDecl {
    name: String,
    type_name: String,
}

impl ParameterDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

pub struct Context {
    session_id: Uuid,
    providers: ProviderChain,
    parameters: Vec<ParameterDecl>,
    facts: SemanticFacts,
    local_slots: HashMap<NodeId, usize>,
    diagnostics: Vec<Diagnostic>,
    analyzed: HashSet<NodeId>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A fresh session backed by the native provider alone.
    pub fn new() -> Self {
        let mut providers = ProviderChain::new();
        providers.push_back(Arc::new(NativeProvider::new()));
        Self {
            session_id: Uuid::new_v4(),
            providers,
            parameters: Vec::new(),
            facts: SemanticFacts::new(),
            local_slots: HashMap::new(),
            diagnostics: Vec::new(),
            analyzed: HashSet::new(),
        }
    }

    /// Adds a provider ahead of those already present. The most recently
    /// added provider answers first for names several providers know.
    pub fn with_provider(mut self, provider: Arc<dyn TypeProvider>) -> Self {
        self.providers.push_front(provider);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Declares the next invocation parameter and returns its slot.
    pub fn declare_parameter(&mut self, name: &str, type_name: &str) -> SemanticResult<usize> {
        if self.parameters.iter().any(|p| p.name == name) {
            return Err(SemanticError::duplicate_parameter(name));
        }
        let index = self.parameters.len();
        debug!(session = %self.session_id, name, type_name, index, "parameter declared");
        self.parameters.push(ParameterDecl {
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        Ok(index)
    }

    pub fn parameters(&self) -> &[ParameterDecl] {
        &self.parameters
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    pub fn type_by_name(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        self.providers.type_by_name(name)
    }

    pub fn type_by_handle(&self, handle: TypeId) -> Option<Arc<TypeDefinition>> {
        self.providers.type_by_handle(handle)
    }

    pub fn facts(&self) -> &SemanticFacts {
        &self.facts
    }

    pub(crate) fn facts_mut(&mut self) -> &mut SemanticFacts {
        &mut self.facts
    }

    /// Frame slot for a variable declaration, allocated on first request.
    /// Every later request for the same declaration yields the same slot.
    pub(crate) fn local_slot(&mut self, declaration: NodeId) -> usize {
        let next = self.local_slots.len();
        *self.local_slots.entry(declaration).or_insert(next)
    }

    pub fn local_count(&self) -> usize {
        self.local_slots.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        debug!(session = %self.session_id, %diagnostic, "diagnostic recorded");
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn is_analyzed(&self, root: NodeId) -> bool {
        self.analyzed.contains(&root)
    }

    pub(crate) fn mark_analyzed(&mut self, root: NodeId) {
        self.analyzed.insert(root);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("session_id", &self.session_id)
            .field("parameters", &self.parameters)
            .field("facts", &self.facts.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::MockTypeProvider;

    #[test]
    fn test_parameter_declaration_order_is_slot_order() {
        let mut ctx = Context::new();
        assert_eq!(ctx.declare_parameter("x", "Int32").unwrap(), 0);
        assert_eq!(ctx.declare_parameter("y", "Float64").unwrap(), 1);
        assert_eq!(ctx.parameter_index("y"), Some(1));
        assert_eq!(ctx.parameter_index("z"), None);
        assert_eq!(ctx.parameter_count(), 2);
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let mut ctx = Context::new();
        ctx.declare_parameter("x", "Int32").unwrap();
        assert!(matches!(
            ctx.declare_parameter("x", "Float64"),
            Err(SemanticError::DuplicateParameter { name }) if name == "x"
        ));
        assert_eq!(ctx.parameter_count(), 1);
    }

    #[test]
    fn test_local_slots_are_memoized_per_declaration() {
        let mut ctx = Context::new();
        let a = crate::ast::Node::variable("a").id();
        let b = crate::ast::Node::variable("b").id();

        assert_eq!(ctx.local_slot(a), 0);
        assert_eq!(ctx.local_slot(b), 1);
        assert_eq!(ctx.local_slot(a), 0);
        assert_eq!(ctx.local_count(), 2);
    }

    #[test]
    fn test_added_provider_answers_before_native() {
        let mut custom = MockTypeProvider::new();
        custom.expect_type_by_name().returning(|name| {
            if name == "Int32" {
                Some(Arc::new(TypeDefinition::new("Int32").nullable()))
            } else {
                None
            }
        });

        let ctx = Context::new().with_provider(Arc::new(custom));
        // The custom answer shadows the built-in descriptor.
        assert!(ctx.type_by_name("Int32").unwrap().is_nullable());
        // Unknown names still fall through to the native provider.
        assert!(ctx.type_by_name("String").unwrap().is_string());
    }

    #[test]
    fn test_sessions_are_distinct() {
        assert_ne!(Context::new().session_id(), Context::new().session_id());
    }
}
