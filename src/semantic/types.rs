//! Pass 1: bottom-up type resolution.
//!
//! Records a resolved [`TypeDefinition`] fact per node where one can be
//! derived. Nodes whose type cannot be derived get no fact at all; whether
//! that matters is the backend's call, made per operation.

use std::sync::Arc;

use tracing::trace;

use crate::ast::{BinaryOperator, Node, NodeKind, UnaryOperator};
use crate::context::Context;
use crate::semantic::members;
use crate::semantic::promote::{promote, promote_unary};
use crate::semantic::scope::ScopeStack;
use crate::typesystem::TypeDefinition;
use crate::value::Value;

pub struct TypeResolver {
    scope: ScopeStack<Arc<TypeDefinition>>,
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeResolver {
    pub fn new() -> Self {
        Self {
            scope: ScopeStack::new(),
        }
    }

    pub fn run(&mut self, ctx: &mut Context, root: &Node) {
        let declared: Vec<(String, Option<Arc<TypeDefinition>>)> = ctx
            .parameters()
            .iter()
            .map(|p| (p.name().to_string(), ctx.type_by_name(p.type_name())))
            .collect();
        for (name, definition) in declared {
            if let Some(definition) = definition {
                self.scope.bind(name, definition);
            }
        }
        self.visit(ctx, root);
    }

    fn visit(&mut self, ctx: &mut Context, node: &Node) {
        // A node with a recorded type had its whole subtree resolved
        // already; a shared diamond is walked once.
        if ctx.facts().has_type(node.id()) {
            return;
        }

        match node.kind() {
            NodeKind::Constant(value) => {
                let resolved = constant_type(ctx, value);
                self.record(ctx, node, resolved);
            }
            NodeKind::Parameter { name } | NodeKind::Variable { name, init: None } => {
                let resolved = self.scope.resolve(name);
                self.record(ctx, node, resolved);
            }
            NodeKind::Variable { name, init: Some(init) } => {
                self.visit(ctx, init);
                let resolved = self.scope.resolve(name);
                self.record(ctx, node, resolved);
            }
            NodeKind::Unary { op, operand } => {
                self.visit(ctx, operand);
                let resolved = match op {
                    UnaryOperator::Not => ctx.type_by_name("Boolean"),
                    UnaryOperator::Minus => {
                        let kind = ctx
                            .facts()
                            .resolved_type(operand.id())
                            .and_then(|t| t.numeric_kind());
                        kind.and_then(|k| ctx.type_by_name(promote_unary(k).type_name()))
                    }
                };
                self.record(ctx, node, resolved);
            }
            NodeKind::Binary { op, left, right } => {
                self.visit(ctx, left);
                self.visit(ctx, right);
                let resolved = binary_type(ctx, *op, left, right);
                self.record(ctx, node, resolved);
            }
            NodeKind::MemberAccess { instance, .. } => {
                self.visit(ctx, instance);
                self.record_access(ctx, node);
            }
            NodeKind::IndexAccess { instance, args }
            | NodeKind::MethodInvocation { instance, args, .. } => {
                self.visit(ctx, instance);
                for arg in args {
                    self.visit(ctx, arg);
                }
                self.record_access(ctx, node);
            }
            NodeKind::Assignment { target, value } => {
                self.visit(ctx, value);
                self.visit(ctx, target);
                let resolved = ctx.facts().resolved_type(value.id());
                self.record(ctx, node, resolved);
            }
            NodeKind::Block { variables, nodes } => {
                self.scope.enter_scope();
                for declaration in variables {
                    self.declare(ctx, declaration, nodes);
                }
                for child in nodes {
                    self.visit(ctx, child);
                }
                let resolved = match nodes.last() {
                    Some(last) => ctx.facts().resolved_type(last.id()),
                    None => ctx.type_by_name("Null"),
                };
                self.scope.exit_scope();
                self.record(ctx, node, resolved);
            }
            NodeKind::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                self.visit(ctx, condition);
                self.visit(ctx, if_true);
                self.visit(ctx, if_false);
                // The true branch alone decides the static type.
                let resolved = ctx.facts().resolved_type(if_true.id());
                self.record(ctx, node, resolved);
            }
            NodeKind::Coalesce { left, right } => {
                self.visit(ctx, left);
                self.visit(ctx, right);
                let resolved = ctx.facts().resolved_type(right.id());
                self.record(ctx, node, resolved);
            }
            NodeKind::TypeCast { operand, target, .. } => {
                self.visit(ctx, operand);
                let resolved = ctx.type_by_name(target);
                self.record(ctx, node, resolved);
            }
        }
    }

    /// Seeds a block-declared variable's type: the initializer decides,
    /// else the first assignment to that name among the block's own nodes,
    /// else the variable stays unresolved.
    fn declare(&mut self, ctx: &mut Context, declaration: &Node, body: &[Node]) {
        let NodeKind::Variable { name, init } = declaration.kind() else {
            return;
        };
        let mut resolved = None;
        if let Some(init) = init {
            self.visit(ctx, init);
            resolved = ctx.facts().resolved_type(init.id());
        }
        if resolved.is_none() {
            if let Some(value) = first_assignment_value(name, body) {
                self.visit(ctx, value);
                resolved = ctx.facts().resolved_type(value.id());
            }
        }
        match resolved {
            Some(definition) => {
                self.scope.bind(name.clone(), definition.clone());
                ctx.facts_mut()
                    .set_resolved_type(declaration.id(), definition);
            }
            None => trace!(node = %declaration.id(), name = %name, "variable type unresolved"),
        }
    }

    fn record_access(&mut self, ctx: &mut Context, node: &Node) {
        let member = members::resolve_access(ctx.facts(), node);
        let resolved = member.and_then(|m| ctx.type_by_name(m.value_type()));
        self.record(ctx, node, resolved);
    }

    fn record(&self, ctx: &mut Context, node: &Node, resolved: Option<Arc<TypeDefinition>>) {
        if let Some(definition) = resolved {
            trace!(node = %node.id(), type_name = definition.name(), "type resolved");
            ctx.facts_mut().set_resolved_type(node.id(), definition);
        }
    }
}

fn constant_type(ctx: &Context, value: &Value) -> Option<Arc<TypeDefinition>> {
    if let Some(handle) = value.runtime_handle() {
        return ctx.type_by_handle(handle);
    }
    ctx.type_by_name(value.type_name())
}

fn binary_type(
    ctx: &Context,
    op: BinaryOperator,
    left: &Node,
    right: &Node,
) -> Option<Arc<TypeDefinition>> {
    if op.is_comparison() || op.is_logical() {
        return ctx.type_by_name("Boolean");
    }

    let left_type = ctx.facts().resolved_type(left.id());
    let right_type = ctx.facts().resolved_type(right.id());

    // String concatenation wins over promotion when either side is String.
    if op == BinaryOperator::Add {
        let is_string = |t: &Option<Arc<TypeDefinition>>| t.as_deref().is_some_and(|t| t.is_string());
        if is_string(&left_type) || is_string(&right_type) {
            return ctx.type_by_name("String");
        }
    }

    let left_kind = left_type?.numeric_kind()?;
    let right_kind = right_type?.numeric_kind()?;
    ctx.type_by_name(promote(left_kind, right_kind).type_name())
}

fn first_assignment_value<'a>(name: &str, body: &'a [Node]) -> Option<&'a Node> {
    body.iter().find_map(|candidate| match candidate.kind() {
        NodeKind::Assignment { target, value } => match target.kind() {
            NodeKind::Variable {
                name: target_name, ..
            } if target_name == name => Some(value),
            _ => None,
        },
        _ => None,
    })
}
