//! Predicate-keyed node transformers.
//!
//! The registry sits in the chain ahead of the built-in translator.
//! Consumers register a predicate and a [`NodeTransformer`]; the first
//! entry whose predicate matches the node takes over its compilation.
//! Unmatched nodes fall through to the next stage untouched.

use std::sync::Arc;

use tracing::trace;

use super::artifact::Thunk;
use super::middleware::{Middleware, Next};
use super::CompileResult;
use crate::ast::Node;
use crate::context::Context;

/// Compiles nodes its registration predicate selected. A transformer may
/// compile children through `next.restart` or decline by forwarding the
/// node with `next.call`.
pub trait NodeTransformer: Send + Sync {
    fn transform(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk>;
}

impl<F> NodeTransformer for F
where
    F: Fn(&mut Context, &Node, Next<'_>) -> CompileResult<Thunk> + Send + Sync,
{
    fn transform(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk> {
        self(ctx, node, next)
    }
}

struct Entry {
    predicate: Box<dyn Fn(&Node, &Context) -> bool + Send + Sync>,
    transformer: Arc<dyn NodeTransformer>,
    priority: i32,
}

/// Ordered transformer table. Higher priority entries are consulted
/// first; equal priorities keep registration order.
#[derive(Default)]
pub struct TransformerRegistry {
    entries: Vec<Entry>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P, T>(&mut self, predicate: P, transformer: T, priority: i32)
    where
        P: Fn(&Node, &Context) -> bool + Send + Sync + 'static,
        T: NodeTransformer + 'static,
    {
        let entry = Entry {
            predicate: Box::new(predicate),
            transformer: Arc::new(transformer),
            priority,
        };
        // Insert before the first strictly lower priority so ties stay in
        // registration order.
        let position = self
            .entries
            .iter()
            .position(|existing| existing.priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Middleware for TransformerRegistry {
    fn handle(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk> {
        for entry in &self.entries {
            if (entry.predicate)(node, ctx) {
                trace!(node = %node.id(), priority = entry.priority, "transformer matched");
                return entry.transformer.transform(ctx, node, next);
            }
        }
        next.call(ctx, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::compile::artifact::Activation;
    use crate::value::Value;

    fn yielding(
        value: Value,
    ) -> impl Fn(&mut Context, &Node, Next<'_>) -> CompileResult<Thunk> + Send + Sync {
        move |_ctx: &mut Context, _node: &Node, _next: Next<'_>| {
            let value = value.clone();
            let thunk: Thunk = Arc::new(move |_frame| Ok(value.clone()));
            Ok(thunk)
        }
    }

    fn run(chain: &[&dyn Middleware], node: &Node) -> Value {
        let mut ctx = Context::new();
        let thunk = Next::new(chain).call(&mut ctx, node).unwrap();
        let mut frame = Activation::new(Vec::new(), 0);
        thunk(&mut frame).unwrap()
    }

    #[test]
    fn test_unmatched_node_falls_through() {
        let mut registry = TransformerRegistry::new();
        registry.register(
            |node: &Node, _: &Context| matches!(node.kind(), NodeKind::Block { .. }),
            yielding(Value::Int32(1)),
            0,
        );
        let tail = yielding(Value::Int32(2));
        let chain: Vec<&dyn Middleware> = vec![&registry, &tail];
        assert_eq!(run(&chain, &Node::constant(0)), Value::Int32(2));
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let mut registry = TransformerRegistry::new();
        registry.register(|_: &Node, _: &Context| true, yielding(Value::Int32(1)), 0);
        registry.register(|_: &Node, _: &Context| true, yielding(Value::Int32(2)), 0);
        let tail = yielding(Value::Int32(3));
        let chain: Vec<&dyn Middleware> = vec![&registry, &tail];
        // Equal priority keeps registration order.
        assert_eq!(run(&chain, &Node::constant(0)), Value::Int32(1));
    }

    #[test]
    fn test_higher_priority_runs_first() {
        let mut registry = TransformerRegistry::new();
        registry.register(|_: &Node, _: &Context| true, yielding(Value::Int32(1)), 0);
        registry.register(|_: &Node, _: &Context| true, yielding(Value::Int32(2)), 10);
        let tail = yielding(Value::Int32(3));
        let chain: Vec<&dyn Middleware> = vec![&registry, &tail];
        assert_eq!(run(&chain, &Node::constant(0)), Value::Int32(2));
    }

    #[test]
    fn test_transformer_may_decline() {
        let mut registry = TransformerRegistry::new();
        registry.register(
            |_: &Node, _: &Context| true,
            |ctx: &mut Context, node: &Node, next: Next<'_>| next.call(ctx, node),
            0,
        );
        let tail = yielding(Value::Int32(9));
        let chain: Vec<&dyn Middleware> = vec![&registry, &tail];
        assert_eq!(run(&chain, &Node::constant(0)), Value::Int32(9));
    }
}
