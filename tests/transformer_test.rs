use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use espalier::{
    ast::{Node, NodeKind},
    compile::{
        Activation, CompileError, CompileResult, Compiler, Middleware, Next, NodeTransformer,
        RuntimeError, Thunk,
    },
    context::Context,
    value::Value,
};

fn legacy_call(ctx: &mut Context) -> Node {
    ctx.declare_parameter("s", "String").unwrap();
    Node::parameter("s").invoke("Legacy", vec![])
}

/// Compiles `Legacy` calls the member resolver knows nothing about:
/// the receiver compiles through the full chain, the call itself
/// becomes an uppercase of whatever the receiver yields.
struct LegacyUppercase;

impl NodeTransformer for LegacyUppercase {
    fn transform(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk> {
        let NodeKind::MethodInvocation { instance, .. } = node.kind() else {
            return next.call(ctx, node);
        };
        let inner = next.restart(ctx, instance)?;
        Ok(Arc::new(move |frame: &mut Activation| {
            match inner(frame)? {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(RuntimeError::type_mismatch("String", &other)),
            }
        }))
    }
}

fn is_legacy(node: &Node, _ctx: &Context) -> bool {
    matches!(node.kind(), NodeKind::MethodInvocation { method, .. } if method == "Legacy")
}

#[test]
fn test_unhandled_method_fails_without_transformer() {
    let mut ctx = Context::new();
    let tree = legacy_call(&mut ctx);
    let err = Compiler::new().compile(&mut ctx, &tree).unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnknownMember { member, receiver, .. }
            if member == "Legacy" && receiver == "String"
    ));
}

#[test]
fn test_transformer_rescues_the_same_tree() {
    let mut ctx = Context::new();
    let tree = legacy_call(&mut ctx);
    let mut compiler = Compiler::new();
    compiler.register_transformer(is_legacy, LegacyUppercase, 0);

    let artifact = compiler.compile(&mut ctx, &tree).unwrap();
    assert_eq!(
        artifact.invoke(&[Value::from("hello")]).unwrap(),
        Value::from("HELLO")
    );
}

#[test]
fn test_transformer_output_feeds_surrounding_translation() {
    let mut ctx = Context::new();
    let call = legacy_call(&mut ctx);
    let tree = Node::constant("id=").add(call);
    let mut compiler = Compiler::new();
    compiler.register_transformer(is_legacy, LegacyUppercase, 0);

    let artifact = compiler.compile(&mut ctx, &tree).unwrap();
    assert_eq!(
        artifact.invoke(&[Value::from("ab12")]).unwrap(),
        Value::from("id=AB12")
    );
}

fn yielding(value: Value) -> impl Fn(&mut Context, &Node, Next<'_>) -> CompileResult<Thunk> + Send + Sync {
    move |_ctx: &mut Context, _node: &Node, _next: Next<'_>| {
        let value = value.clone();
        let thunk: Thunk = Arc::new(move |_frame| Ok(value.clone()));
        Ok(thunk)
    }
}

#[test]
fn test_higher_priority_transformer_wins() {
    let is_constant = |node: &Node, _: &Context| matches!(node.kind(), NodeKind::Constant(_));
    let mut compiler = Compiler::new();
    compiler.register_transformer(is_constant, yielding(Value::from("low")), 1);
    compiler.register_transformer(is_constant, yielding(Value::from("high")), 10);

    let mut ctx = Context::new();
    let artifact = compiler.compile(&mut ctx, &Node::constant(0)).unwrap();
    assert_eq!(artifact.invoke(&[]).unwrap(), Value::from("high"));
}

struct CountingStage {
    seen: Arc<AtomicUsize>,
}

impl Middleware for CountingStage {
    fn handle(&self, ctx: &mut Context, node: &Node, next: Next<'_>) -> CompileResult<Thunk> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        next.call(ctx, node)
    }
}

#[test]
fn test_middleware_observes_every_node() {
    let seen = Arc::new(AtomicUsize::new(0));
    let mut compiler = Compiler::new();
    compiler.add_middleware(Arc::new(CountingStage { seen: seen.clone() }));

    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    // Add, Multiply, the parameter and two constants: five nodes, each
    // re-entering the chain from the top.
    let tree = Node::parameter("x")
        .multiply(Node::constant(2))
        .add(Node::constant(5));

    let artifact = compiler.compile(&mut ctx, &tree).unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), 5);
    assert_eq!(artifact.invoke(&[Value::Int32(3)]).unwrap(), Value::Int32(11));
}
