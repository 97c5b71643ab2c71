//! Semantic analysis: three ordered passes over an immutable tree.
//!
//! Nothing here rewrites a node. Every conclusion is a fact keyed by
//! [`NodeId`] in the session's [`SemanticFacts`]: resolved types, resolved
//! members, and use-to-declaration bindings. The backend consumes facts and
//! fails compilation on the first one it needs and cannot find; analysis
//! itself only accumulates diagnostics.
//!
//! Pass order is fixed: type resolution, then member resolution (which needs
//! receiver types), then scope validation.

pub mod error;
pub mod members;
pub mod promote;
pub mod scope;
pub mod types;
pub mod validate;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ast::{Node, NodeId};
use crate::context::Context;
use crate::typesystem::{TypeDefinition, TypeMember};

pub use error::{Diagnostic, DiagnosticCode, SemanticError, SemanticResult, Severity};
pub use members::MemberResolver;
pub use promote::{promote, promote_unary, NumericKind};
pub use types::TypeResolver;
pub use validate::ScopeValidator;

/// What a name use resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Slot in the declared parameter list.
    Parameter { index: usize },
    /// Local variable, identified by its declaring node.
    Local { declaration: NodeId },
}

/// Facts recorded against one node.
#[derive(Debug, Clone, Default)]
pub struct SemanticInfo {
    resolved_type: Option<Arc<TypeDefinition>>,
    resolved_member: Option<Arc<TypeMember>>,
}

/// Identity-keyed fact store. Facts are insert-once: the first resolution
/// for a node stands for the life of the session, so sharing a subtree
/// between roots cannot flip earlier conclusions.
#[derive(Debug, Clone, Default)]
pub struct SemanticFacts {
    info: HashMap<NodeId, SemanticInfo>,
    bindings: HashMap<NodeId, Binding>,
}

impl SemanticFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolved_type(&self, node: NodeId) -> Option<Arc<TypeDefinition>> {
        self.info.get(&node)?.resolved_type.clone()
    }

    pub fn resolved_member(&self, node: NodeId) -> Option<Arc<TypeMember>> {
        self.info.get(&node)?.resolved_member.clone()
    }

    pub fn binding(&self, node: NodeId) -> Option<Binding> {
        self.bindings.get(&node).copied()
    }

    pub fn has_type(&self, node: NodeId) -> bool {
        self.info
            .get(&node)
            .is_some_and(|i| i.resolved_type.is_some())
    }

    pub(crate) fn set_resolved_type(&mut self, node: NodeId, definition: Arc<TypeDefinition>) {
        let info = self.info.entry(node).or_default();
        if info.resolved_type.is_none() {
            info.resolved_type = Some(definition);
        }
    }

    pub(crate) fn set_resolved_member(&mut self, node: NodeId, member: Arc<TypeMember>) {
        let info = self.info.entry(node).or_default();
        if info.resolved_member.is_none() {
            info.resolved_member = Some(member);
        }
    }

    pub(crate) fn set_binding(&mut self, node: NodeId, binding: Binding) {
        self.bindings.entry(node).or_insert(binding);
    }

    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

/// Runs the pass pipeline against one root.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyzes `root`, recording facts and diagnostics on the session.
    /// A root already analyzed in this session is skipped outright, so
    /// repeated analysis neither duplicates diagnostics nor moves facts.
    #[tracing::instrument(skip_all, fields(root = %root.id()))]
    pub fn analyze(&self, ctx: &mut Context, root: &Node) {
        if ctx.is_analyzed(root.id()) {
            debug!("root already analyzed, skipping");
            return;
        }

        debug!("type resolution");
        TypeResolver::new().run(ctx, root);
        debug!("member resolution");
        MemberResolver::new().run(ctx, root);
        debug!("scope validation");
        ScopeValidator::new().run(ctx, root);

        ctx.mark_analyzed(root.id());
        debug!(facts = ctx.facts().len(), "analysis complete");
    }
}
