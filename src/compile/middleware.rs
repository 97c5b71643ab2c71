//! The compilation pipeline.
//!
//! Compilation is a chain of [`Middleware`] stages. Each stage looks at the
//! node and either produces a [`Thunk`] or forwards to the next stage via
//! [`Next::call`]. Child nodes are compiled through [`Next::restart`], which
//! re-enters the chain from the top, so an outer stage observes every node
//! of the tree, not just the root it was first handed.

use super::artifact::Thunk;
use super::{CompileError, CompileResult};
use crate::ast::Node;
use crate::context::Context;

/// One stage of the compilation chain.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Context, &Node, Next<'_>) -> CompileResult<Thunk> + Send + Sync,
{
    fn handle(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk> {
        self(ctx, node, next)
    }
}

/// Continuation handed to each stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    all: &'a [&'a dyn Middleware],
    remaining: &'a [&'a dyn Middleware],
}

impl<'a> Next<'a> {
    pub(crate) fn new(all: &'a [&'a dyn Middleware]) -> Self {
        Self {
            all,
            remaining: all,
        }
    }

    /// Forwards the node to the next stage. Running past the last stage
    /// means nothing translated the node.
    pub fn call(self, ctx: &mut Context, node: &Node) -> CompileResult<Thunk> {
        match self.remaining.split_first() {
            Some((stage, rest)) => stage.handle(
                ctx,
                node,
                Next {
                    all: self.all,
                    remaining: rest,
                },
            ),
            None => Err(CompileError::no_translation(node)),
        }
    }

    /// Compiles a child node through the full chain.
    pub fn restart(self, ctx: &mut Context, node: &Node) -> CompileResult<Thunk> {
        Next::new(self.all).call(ctx, node)
    }
}
