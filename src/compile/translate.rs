//! The built-in translation stage.
//!
//! [`Translator`] terminates the middleware chain and knows every core node
//! kind. Kernel selection happens here, at compile time, from the facts the
//! analysis passes recorded: a binary node whose operands were both typed
//! gets a fixed promotion baked into its thunk, an access node must carry a
//! resolved member or compilation fails, an identifier becomes a plain slot
//! read. The thunks it builds never touch the `Context` again.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::trace;

use super::artifact::{Activation, RuntimeError, Thunk};
use super::middleware::{Middleware, Next};
use super::ops;
use super::{CompileError, CompileResult};
use crate::ast::{BinaryOperator, Node, NodeKind, UnaryOperator};
use crate::context::Context;
use crate::semantic::promote::{promote, NumericKind};
use crate::semantic::Binding;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl Translator {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Translator {
    fn handle(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk> {
        trace!(node = %node.id(), kind = super::describe(node), "translating");
        match node.kind() {
            NodeKind::Constant(value) => {
                let value = value.clone();
                let thunk: Thunk = Arc::new(move |_frame| Ok(value.clone()));
                Ok(thunk)
            }
            NodeKind::Parameter { name } | NodeKind::Variable { name, .. } => {
                self.identifier(ctx, node, name)
            }
            NodeKind::Unary { op, operand } => self.unary(ctx, *op, operand, next),
            NodeKind::Binary { op, left, right } => self.binary(ctx, *op, left, right, next),
            NodeKind::MemberAccess { instance, .. } => self.access(ctx, node, instance, &[], next),
            NodeKind::IndexAccess { instance, args }
            | NodeKind::MethodInvocation { instance, args, .. } => {
                self.access(ctx, node, instance, args, next)
            }
            NodeKind::Assignment { target, value } => self.assignment(ctx, target, value, next),
            NodeKind::Block { variables, nodes } => self.block(ctx, variables, nodes, next),
            NodeKind::Conditional {
                condition,
                if_true,
                if_false,
            } => self.conditional(ctx, condition, if_true, if_false, next),
            NodeKind::Coalesce { left, right } => self.coalesce(ctx, left, right, next),
            NodeKind::TypeCast {
                operand,
                target,
                checked,
            } => self.cast(ctx, operand, target, *checked, next),
        }
    }
}

impl Translator {
    /// Parameters and variable references compile to frame reads. The
    /// binding recorded for this exact node decides which kind of read.
    fn identifier(&self, ctx: &mut Context, node: &Node, name: &str) -> CompileResult<Thunk> {
        let binding = ctx
            .facts()
            .binding(node.id())
            .ok_or_else(|| CompileError::undeclared(node, name))?;
        let thunk: Thunk = match binding {
            Binding::Parameter { index } => {
                Arc::new(move |frame: &mut Activation| frame.parameter(index).cloned())
            }
            Binding::Local { declaration } => {
                let slot = ctx.local_slot(declaration);
                Arc::new(move |frame: &mut Activation| Ok(frame.local(slot).clone()))
            }
        };
        Ok(thunk)
    }

    fn unary(
        &self,
        ctx: &mut Context,
        op: UnaryOperator,
        operand: &Node,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let operand = next.restart(ctx, operand)?;
        let thunk: Thunk = match op {
            UnaryOperator::Not => Arc::new(move |frame| ops::not_value(&operand(frame)?)),
            UnaryOperator::Minus => Arc::new(move |frame| ops::negate_value(&operand(frame)?)),
        };
        Ok(thunk)
    }

    fn binary(
        &self,
        ctx: &mut Context,
        op: BinaryOperator,
        left: &Node,
        right: &Node,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        if op.is_logical() {
            return self.logical(ctx, op, left, right, next);
        }
        let left_numeric = analyzed_numeric(ctx, left);
        let right_numeric = analyzed_numeric(ctx, right);
        let concatenates = op == BinaryOperator::Add
            && (analyzed_string(ctx, left) || analyzed_string(ctx, right));
        let lhs = next.restart(ctx, left)?;
        let rhs = next.restart(ctx, right)?;

        let thunk: Thunk = match op {
            BinaryOperator::Equal => Arc::new(move |frame| {
                Ok(Value::Boolean(ops::equal_values(&lhs(frame)?, &rhs(frame)?)))
            }),
            BinaryOperator::NotEqual => Arc::new(move |frame| {
                Ok(Value::Boolean(!ops::equal_values(
                    &lhs(frame)?,
                    &rhs(frame)?,
                )))
            }),
            BinaryOperator::LessThan => ordering_thunk(lhs, rhs, |o| o == Ordering::Less),
            BinaryOperator::LessThanEqual => ordering_thunk(lhs, rhs, |o| o != Ordering::Greater),
            BinaryOperator::GreaterThan => ordering_thunk(lhs, rhs, |o| o == Ordering::Greater),
            BinaryOperator::GreaterThanEqual => ordering_thunk(lhs, rhs, |o| o != Ordering::Less),
            _ if concatenates => Arc::new(move |frame| {
                let l = lhs(frame)?;
                let r = rhs(frame)?;
                Ok(Value::String(format!("{l}{r}")))
            }),
            _ => arithmetic_thunk(op, left_numeric, right_numeric, lhs, rhs),
        };
        Ok(thunk)
    }

    fn logical(
        &self,
        ctx: &mut Context,
        op: BinaryOperator,
        left: &Node,
        right: &Node,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let lhs = next.restart(ctx, left)?;
        let rhs = next.restart(ctx, right)?;
        // Short-circuit: the right operand only runs when the left did not
        // already decide the answer.
        let thunk: Thunk = if op == BinaryOperator::And {
            Arc::new(move |frame| {
                if !ops::boolean_of(&lhs(frame)?)? {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(ops::boolean_of(&rhs(frame)?)?))
            })
        } else {
            Arc::new(move |frame| {
                if ops::boolean_of(&lhs(frame)?)? {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(ops::boolean_of(&rhs(frame)?)?))
            })
        };
        Ok(thunk)
    }

    /// Member access, indexing and invocation compile through the one
    /// member the resolver recorded. No member fact, no artifact.
    fn access(
        &self,
        ctx: &mut Context,
        node: &Node,
        instance: &Node,
        args: &[Node],
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let Some(member) = ctx.facts().resolved_member(node.id()) else {
            return Err(unresolved_access(ctx, node));
        };
        let instance = next.restart(ctx, instance)?;
        let args = args
            .iter()
            .map(|arg| next.restart(ctx, arg))
            .collect::<CompileResult<Vec<_>>>()?;
        let thunk: Thunk = Arc::new(move |frame| {
            let receiver = instance(frame)?;
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in &args {
                evaluated.push(arg(frame)?);
            }
            member.evaluate(&receiver, &evaluated)
        });
        Ok(thunk)
    }

    fn assignment(
        &self,
        ctx: &mut Context,
        target: &Node,
        value: &Node,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let NodeKind::Variable { name, .. } = target.kind() else {
            return Err(CompileError::invalid_assignment_target(target));
        };
        let slot = match ctx.facts().binding(target.id()) {
            Some(Binding::Local { declaration }) => ctx.local_slot(declaration),
            // Parameters are caller-owned and read-only.
            Some(Binding::Parameter { .. }) => {
                return Err(CompileError::invalid_assignment_target(target))
            }
            None => return Err(CompileError::undeclared(target, name)),
        };
        let value = next.restart(ctx, value)?;
        let thunk: Thunk = Arc::new(move |frame| {
            let value = value(frame)?;
            frame.set_local(slot, value.clone());
            Ok(value)
        });
        Ok(thunk)
    }

    fn block(
        &self,
        ctx: &mut Context,
        variables: &[Node],
        nodes: &[Node],
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let mut inits: Vec<(usize, Thunk)> = Vec::new();
        for declaration in variables {
            let NodeKind::Variable { init, .. } = declaration.kind() else {
                return Err(CompileError::invalid_declaration(declaration));
            };
            let slot = ctx.local_slot(declaration.id());
            if let Some(init) = init {
                inits.push((slot, next.restart(ctx, init)?));
            }
        }
        let body = nodes
            .iter()
            .map(|stage| next.restart(ctx, stage))
            .collect::<CompileResult<Vec<_>>>()?;
        let thunk: Thunk = Arc::new(move |frame| {
            for (slot, init) in &inits {
                let value = init(frame)?;
                frame.set_local(*slot, value);
            }
            let mut result = Value::Null;
            for stage in &body {
                result = stage(frame)?;
            }
            Ok(result)
        });
        Ok(thunk)
    }

    fn conditional(
        &self,
        ctx: &mut Context,
        condition: &Node,
        if_true: &Node,
        if_false: &Node,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let condition = next.restart(ctx, condition)?;
        let if_true = next.restart(ctx, if_true)?;
        let if_false = next.restart(ctx, if_false)?;
        let thunk: Thunk = Arc::new(move |frame| {
            if ops::boolean_of(&condition(frame)?)? {
                if_true(frame)
            } else {
                if_false(frame)
            }
        });
        Ok(thunk)
    }

    fn coalesce(
        &self,
        ctx: &mut Context,
        left: &Node,
        right: &Node,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let left = next.restart(ctx, left)?;
        let right = next.restart(ctx, right)?;
        let thunk: Thunk = Arc::new(move |frame| match left(frame)? {
            Value::Null => right(frame),
            value => Ok(value),
        });
        Ok(thunk)
    }

    fn cast(
        &self,
        ctx: &mut Context,
        operand: &Node,
        target: &str,
        checked: bool,
        next: Next<'_>,
    ) -> CompileResult<Thunk> {
        let definition = ctx
            .type_by_name(target)
            .ok_or_else(|| CompileError::unknown_type(target))?;
        let operand = next.restart(ctx, operand)?;
        let thunk: Thunk = match definition.numeric_kind() {
            Some(kind) => {
                Arc::new(move |frame| ops::cast_numeric(&operand(frame)?, kind, checked))
            }
            None if checked => {
                let name = definition.name().to_string();
                let nullable = definition.is_nullable();
                let handle = definition.handle();
                Arc::new(move |frame| {
                    let value = operand(frame)?;
                    if value_conforms(&value, &name, nullable, handle) {
                        Ok(value)
                    } else {
                        Err(RuntimeError::invalid_cast(&value, &name))
                    }
                })
            }
            // Unchecked non-numeric casts are assertions to the analyzer
            // only; at runtime the value passes through untouched.
            None => operand,
        };
        Ok(thunk)
    }
}

fn analyzed_numeric(ctx: &Context, node: &Node) -> Option<NumericKind> {
    ctx.facts()
        .resolved_type(node.id())
        .and_then(|t| t.numeric_kind())
}

fn analyzed_string(ctx: &Context, node: &Node) -> bool {
    ctx.facts()
        .resolved_type(node.id())
        .is_some_and(|t| t.is_string())
}

fn ordering_thunk<F>(lhs: Thunk, rhs: Thunk, check: F) -> Thunk
where
    F: Fn(Ordering) -> bool + Send + Sync + 'static,
{
    Arc::new(move |frame| ops::compare_values(&check, &lhs(frame)?, &rhs(frame)?))
}

fn arithmetic_thunk(
    op: BinaryOperator,
    left_numeric: Option<NumericKind>,
    right_numeric: Option<NumericKind>,
    lhs: Thunk,
    rhs: Thunk,
) -> Thunk {
    match (left_numeric, right_numeric) {
        (Some(l), Some(r)) => {
            let target = promote(l, r);
            Arc::new(move |frame| {
                let l = ops::widen(&lhs(frame)?, target)?;
                let r = ops::widen(&rhs(frame)?, target)?;
                ops::apply_arithmetic(op, &l, &r)
            })
        }
        // Operand types unknown to analysis; promotion moves to runtime.
        _ => Arc::new(move |frame| ops::promoted_arithmetic(op, &lhs(frame)?, &rhs(frame)?)),
    }
}

/// Shapes the failure for an access node the resolver left bare.
fn unresolved_access(ctx: &Context, node: &Node) -> CompileError {
    let receiver_of = |instance: &Node| ctx.facts().resolved_type(instance.id());
    match node.kind() {
        NodeKind::MemberAccess { instance, member } => match receiver_of(instance) {
            Some(receiver) => CompileError::unknown_member(node, member, receiver.name()),
            None => CompileError::missing_type(instance),
        },
        NodeKind::MethodInvocation {
            instance, method, ..
        } => match receiver_of(instance) {
            Some(receiver) => {
                if receiver.member(method).is_some() {
                    CompileError::no_matching_overload(node, method, receiver.name())
                } else {
                    CompileError::unknown_member(node, method, receiver.name())
                }
            }
            None => CompileError::missing_type(instance),
        },
        NodeKind::IndexAccess { instance, .. } => match receiver_of(instance) {
            Some(receiver) => CompileError::no_matching_overload(node, "indexer", receiver.name()),
            None => CompileError::missing_type(instance),
        },
        _ => CompileError::missing_type(node),
    }
}

fn value_conforms(
    value: &Value,
    type_name: &str,
    nullable: bool,
    handle: Option<std::any::TypeId>,
) -> bool {
    match value {
        Value::Null => nullable,
        // Object is the top of the hierarchy; everything conforms.
        _ if type_name == "Object" => true,
        // Host values carry no usable name; they match by runtime handle.
        Value::Opaque(_) => handle.is_some() && value.runtime_handle() == handle,
        _ => value.type_name() == type_name,
    }
}
