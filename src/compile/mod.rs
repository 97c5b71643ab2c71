//! Compilation backend.
//!
//! [`Compiler::compile`] analyzes the tree, then assembles the middleware
//! chain: caller-supplied stages first, the [`TransformerRegistry`] next,
//! the built-in [`Translator`] last. The chain produces one [`Thunk`] per
//! node and the root thunk ships inside a [`CompiledExpr`], detached from
//! the compiling `Context`.
//!
//! Analysis never fails; compilation does. A node the passes could not
//! type or resolve surfaces here as a [`CompileError`] naming the node.

pub mod artifact;
pub mod middleware;
mod ops;
pub mod registry;
pub mod translate;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::ast::{Node, NodeId, NodeKind};
use crate::context::Context;
use crate::semantic::{SemanticAnalyzer, SemanticError};

pub use artifact::{Activation, CompiledExpr, RuntimeError, RuntimeResult, Thunk};
pub use middleware::{Middleware, Next};
pub use registry::{NodeTransformer, TransformerRegistry};
pub use translate::Translator;

/// Errors raised while turning an analyzed tree into an artifact.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("{kind} node {node} has no resolved type")]
    MissingType { node: NodeId, kind: String },

    #[error("Type {receiver} has no member {member}")]
    UnknownMember {
        node: NodeId,
        member: String,
        receiver: String,
    },

    #[error("No overload of {receiver}.{method} matches the argument types")]
    NoMatchingOverload {
        node: NodeId,
        method: String,
        receiver: String,
    },

    #[error("Name {name} is not declared")]
    Undeclared { node: NodeId, name: String },

    #[error("Assignment target {node} is not an assignable variable")]
    InvalidAssignmentTarget { node: NodeId },

    #[error("Block declaration {node} is not a variable")]
    InvalidDeclaration { node: NodeId },

    #[error("Unknown type {name}")]
    UnknownType { name: String },

    #[error("Transformer failed at {node}: {message}")]
    Transformer { node: NodeId, message: String },

    #[error("No stage translated {kind} node {node}")]
    NoTranslation { node: NodeId, kind: String },
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub(crate) fn missing_type(node: &Node) -> Self {
        Self::MissingType {
            node: node.id(),
            kind: describe(node).to_string(),
        }
    }

    pub(crate) fn unknown_member(node: &Node, member: &str, receiver: &str) -> Self {
        Self::UnknownMember {
            node: node.id(),
            member: member.to_string(),
            receiver: receiver.to_string(),
        }
    }

    pub(crate) fn no_matching_overload(node: &Node, method: &str, receiver: &str) -> Self {
        Self::NoMatchingOverload {
            node: node.id(),
            method: method.to_string(),
            receiver: receiver.to_string(),
        }
    }

    pub(crate) fn undeclared(node: &Node, name: &str) -> Self {
        Self::Undeclared {
            node: node.id(),
            name: name.to_string(),
        }
    }

    pub(crate) fn invalid_assignment_target(node: &Node) -> Self {
        Self::InvalidAssignmentTarget { node: node.id() }
    }

    pub(crate) fn invalid_declaration(node: &Node) -> Self {
        Self::InvalidDeclaration { node: node.id() }
    }

    pub(crate) fn unknown_type(name: &str) -> Self {
        Self::UnknownType {
            name: name.to_string(),
        }
    }

    /// For custom transformers reporting their own failures.
    pub fn transformer(node: &Node, message: impl Into<String>) -> Self {
        Self::Transformer {
            node: node.id(),
            message: message.into(),
        }
    }

    pub(crate) fn no_translation(node: &Node) -> Self {
        Self::NoTranslation {
            node: node.id(),
            kind: describe(node).to_string(),
        }
    }
}

pub(crate) fn describe(node: &Node) -> &'static str {
    match node.kind() {
        NodeKind::Constant(_) => "constant",
        NodeKind::Parameter { .. } => "parameter",
        NodeKind::Variable { .. } => "variable",
        NodeKind::Unary { .. } => "unary",
        NodeKind::Binary { .. } => "binary",
        NodeKind::MemberAccess { .. } => "member access",
        NodeKind::IndexAccess { .. } => "index access",
        NodeKind::MethodInvocation { .. } => "method invocation",
        NodeKind::Assignment { .. } => "assignment",
        NodeKind::Block { .. } => "block",
        NodeKind::Conditional { .. } => "conditional",
        NodeKind::Coalesce { .. } => "coalesce",
        NodeKind::TypeCast { .. } => "type cast",
    }
}

/// Front door of the backend. Owns the extension points and the built-in
/// translator; stateless across compilations apart from registrations.
#[derive(Default)]
pub struct Compiler {
    middleware: Vec<Arc<dyn Middleware>>,
    registry: TransformerRegistry,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage ahead of the registry and the built-in translator.
    /// Stages run in the order they were added.
    pub fn add_middleware(&mut self, stage: Arc<dyn Middleware>) {
        self.middleware.push(stage);
    }

    /// Registers a transformer for the nodes `predicate` selects.
    pub fn register_transformer<P, T>(&mut self, predicate: P, transformer: T, priority: i32)
    where
        P: Fn(&Node, &Context) -> bool + Send + Sync + 'static,
        T: NodeTransformer + 'static,
    {
        self.registry.register(predicate, transformer, priority);
    }

    /// Analyzes and compiles one tree into an invocable artifact.
    #[tracing::instrument(skip_all, fields(session = %ctx.session_id(), root = %root.id()))]
    pub fn compile(&self, ctx: &mut Context, root: &Node) -> CompileResult<CompiledExpr> {
        SemanticAnalyzer::new().analyze(ctx, root);

        let translator = Translator::new();
        let mut chain: Vec<&dyn Middleware> = Vec::with_capacity(self.middleware.len() + 2);
        for stage in &self.middleware {
            chain.push(stage.as_ref());
        }
        chain.push(&self.registry);
        chain.push(&translator);

        let thunk = Next::new(&chain).call(ctx, root)?;
        debug!(
            parameters = ctx.parameter_count(),
            locals = ctx.local_count(),
            "compilation finished"
        );
        Ok(CompiledExpr::new(
            thunk,
            ctx.parameter_count(),
            ctx.local_count(),
        ))
    }
}
