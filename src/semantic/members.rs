//! Pass 2: member resolution.
//!
//! Binds each access node to one concrete [`TypeMember`] of its receiver's
//! resolved type. Lookup is by name for member access, by exact
//! argument-type list for indexers and method invocations; there is no
//! scoring and no implicit conversion. A miss records nothing, and the
//! backend later refuses to translate the unresolved access.

use std::sync::Arc;

use tracing::trace;

use crate::ast::{Node, NodeKind};
use crate::context::Context;
use crate::semantic::SemanticFacts;
use crate::typesystem::TypeMember;

/// Looks up the member an access node refers to, given the facts known so
/// far. Requires the receiver (and, for calls, every argument) to carry a
/// resolved type already.
pub(crate) fn resolve_access(facts: &SemanticFacts, node: &Node) -> Option<Arc<TypeMember>> {
    match node.kind() {
        NodeKind::MemberAccess { instance, member } => {
            let receiver = facts.resolved_type(instance.id())?;
            receiver.member(member)
        }
        NodeKind::IndexAccess { instance, args } => {
            let receiver = facts.resolved_type(instance.id())?;
            let arg_types = argument_types(facts, args)?;
            let refs: Vec<&str> = arg_types.iter().map(String::as_str).collect();
            receiver.find_indexer(&refs)
        }
        NodeKind::MethodInvocation {
            instance,
            method,
            args,
        } => {
            let receiver = facts.resolved_type(instance.id())?;
            let arg_types = argument_types(facts, args)?;
            let refs: Vec<&str> = arg_types.iter().map(String::as_str).collect();
            receiver.find_method(method, &refs)
        }
        _ => None,
    }
}

fn argument_types(facts: &SemanticFacts, args: &[Node]) -> Option<Vec<String>> {
    args.iter()
        .map(|arg| {
            facts
                .resolved_type(arg.id())
                .map(|t| t.name().to_string())
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemberResolver;

impl MemberResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, ctx: &mut Context, root: &Node) {
        self.visit(ctx, root);
    }

    fn visit(&mut self, ctx: &mut Context, node: &Node) {
        for child in node.children() {
            self.visit(ctx, child);
        }

        if !matches!(
            node.kind(),
            NodeKind::MemberAccess { .. }
                | NodeKind::IndexAccess { .. }
                | NodeKind::MethodInvocation { .. }
        ) {
            return;
        }

        match resolve_access(ctx.facts(), node) {
            Some(member) => {
                trace!(
                    node = %node.id(),
                    owner = member.owner(),
                    member = member.name(),
                    "member resolved"
                );
                let value_type = ctx.type_by_name(member.value_type());
                let facts = ctx.facts_mut();
                facts.set_resolved_member(node.id(), member);
                if let Some(value_type) = value_type {
                    facts.set_resolved_type(node.id(), value_type);
                }
            }
            None => trace!(node = %node.id(), "member unresolved"),
        }
    }
}
