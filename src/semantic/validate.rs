//! Pass 3: scope validation.
//!
//! One lexical scope per `Block`. Declared variables are registered on
//! entry and dropped on exit; every `Parameter` and `Variable` use resolves
//! by name to the nearest declaration and the link is recorded as a
//! [`Binding`] fact for the backend. Shadowing an outer binding is a
//! warning, an unresolvable name an error; both accumulate and neither
//! stops the walk.

use std::collections::HashSet;

use tracing::trace;

use crate::ast::{Node, NodeId, NodeKind};
use crate::context::Context;
use crate::semantic::error::Diagnostic;
use crate::semantic::scope::ScopeStack;
use crate::semantic::Binding;

pub struct ScopeValidator {
    scope: ScopeStack<Binding>,
    // Shared subtrees are validated at their first occurrence only, in
    // line with facts being per-node rather than per-occurrence.
    visited: HashSet<NodeId>,
}

impl Default for ScopeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeValidator {
    pub fn new() -> Self {
        Self {
            scope: ScopeStack::new(),
            visited: HashSet::new(),
        }
    }

    pub fn run(&mut self, ctx: &mut Context, root: &Node) {
        let declared: Vec<(String, usize)> = ctx
            .parameters()
            .iter()
            .enumerate()
            .map(|(index, p)| (p.name().to_string(), index))
            .collect();
        for (name, index) in declared {
            self.scope.bind(name, Binding::Parameter { index });
        }
        self.visit(ctx, root);
    }

    fn visit(&mut self, ctx: &mut Context, node: &Node) {
        if !self.visited.insert(node.id()) {
            return;
        }

        match node.kind() {
            NodeKind::Parameter { name } | NodeKind::Variable { name, .. } => {
                self.resolve_use(ctx, node, name);
            }
            NodeKind::Block { variables, nodes } => {
                self.scope.enter_scope();
                for declaration in variables {
                    self.declare(ctx, declaration);
                }
                for child in nodes {
                    self.visit(ctx, child);
                }
                self.scope.exit_scope();
            }
            _ => {
                for child in node.children() {
                    self.visit(ctx, child);
                }
            }
        }
    }

    fn declare(&mut self, ctx: &mut Context, declaration: &Node) {
        let NodeKind::Variable { name, init } = declaration.kind() else {
            return;
        };
        // Initializers run before the name exists, so they see the outer
        // binding, never the one being introduced.
        if let Some(init) = init {
            self.visit(ctx, init);
        }
        if self.scope.contains(name) {
            trace!(node = %declaration.id(), name = %name, "shadowing declaration");
            ctx.push_diagnostic(Diagnostic::shadowed(declaration.id(), name));
        }
        self.scope.bind(
            name.clone(),
            Binding::Local {
                declaration: declaration.id(),
            },
        );
        // Body references to the declaring node itself resolve to it.
        self.visited.remove(&declaration.id());
    }

    fn resolve_use(&mut self, ctx: &mut Context, node: &Node, name: &str) {
        match self.scope.resolve(name) {
            Some(binding) => {
                trace!(node = %node.id(), name = %name, ?binding, "name bound");
                ctx.facts_mut().set_binding(node.id(), binding);
            }
            None => {
                trace!(node = %node.id(), name = %name, "undeclared name");
                ctx.push_diagnostic(Diagnostic::undeclared(node.id(), name));
            }
        }
    }
}
