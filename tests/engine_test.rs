use std::sync::Arc;
use std::thread;

use espalier::{
    ast::Node,
    compile::{CompileError, Compiler, RuntimeError},
    context::Context,
    typesystem::{NativeProvider, NativeTypeBuilder},
    value::Value,
};

fn compile(ctx: &mut Context, tree: &Node) -> espalier::CompiledExpr {
    Compiler::new().compile(ctx, tree).unwrap()
}

#[test]
fn test_artifact_compiles_once_and_reuses() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    let tree = Node::parameter("x")
        .multiply(Node::constant(2))
        .add(Node::constant(5));

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.parameter_count(), 1);
    assert_eq!(artifact.invoke(&[Value::Int32(10)]).unwrap(), Value::Int32(25));
    assert_eq!(artifact.invoke(&[Value::Int32(7)]).unwrap(), Value::Int32(19));
}

#[test]
fn test_conditional_picks_a_branch_at_runtime() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    let x = Node::parameter("x");
    let tree = Node::conditional(
        x.clone().greater_than(Node::constant(100)),
        x.clone().multiply(Node::constant(2)),
        x.clone().add(Node::constant(10)),
    );

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[Value::Int32(150)]).unwrap(), Value::Int32(300));
    assert_eq!(artifact.invoke(&[Value::Int32(50)]).unwrap(), Value::Int32(60));
}

#[test]
fn test_recompilation_reuses_analysis() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    let tree = Node::parameter("x").add(Node::constant(1));

    let compiler = Compiler::new();
    let first = compiler.compile(&mut ctx, &tree).unwrap();
    let facts_after_first = ctx.facts().len();
    let second = compiler.compile(&mut ctx, &tree).unwrap();

    // The second pass found the root analyzed and added nothing.
    assert_eq!(ctx.facts().len(), facts_after_first);
    assert_eq!(first.invoke(&[Value::Int32(1)]).unwrap(), Value::Int32(2));
    assert_eq!(second.invoke(&[Value::Int32(1)]).unwrap(), Value::Int32(2));
}

#[test]
fn test_shared_variable_node_uses_one_slot() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    // v appears four times but is one node; every occurrence reads the
    // same slot.
    let v = Node::variable_with_init("v", Node::parameter("x").multiply(Node::constant(2)));
    let body = v
        .clone()
        .multiply(v.clone())
        .divide(Node::constant(2))
        .add(v.clone());
    let tree = Node::block(vec![v], vec![body]);

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(ctx.local_count(), 1);
    // x = 6: v = 12, 12*12/2 + 12 = 84
    assert_eq!(artifact.invoke(&[Value::Int32(6)]).unwrap(), Value::Int32(84));
}

#[test]
fn test_inner_declaration_shadows_outer() {
    let mut ctx = Context::new();
    let outer = Node::variable_with_init("a", Node::constant(10));
    let inner = Node::variable_with_init("a", Node::constant(42));
    let inner_block = Node::block(vec![inner.clone()], vec![inner.clone()]);
    let tree = Node::block(vec![outer.clone()], vec![inner_block.add(outer.clone())]);

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[]).unwrap(), Value::Int32(52));
    assert_eq!(ctx.local_count(), 2);
    // Shadowing is reported but does not fail anything.
    assert_eq!(ctx.diagnostics().len(), 1);
    assert!(!ctx.has_errors());
}

#[test]
fn test_inner_declaration_shadows_parameter() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    let declaration = Node::variable_with_init("x", Node::constant(42));
    // Two distinct nodes named x: the inner one resolves to the local,
    // the outer one to the parameter.
    let inner_use = Node::parameter("x");
    let outer_use = Node::parameter("x");
    let tree = Node::block(
        vec![],
        vec![Node::block(vec![declaration], vec![inner_use]).add(outer_use)],
    );

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[Value::Int32(10)]).unwrap(), Value::Int32(52));
    assert_eq!(ctx.diagnostics().len(), 1);
    assert!(!ctx.has_errors());
}

#[test]
fn test_coalesce_falls_back_on_null() {
    let mut ctx = Context::new();
    ctx.declare_parameter("name", "String").unwrap();
    let tree = Node::parameter("name").coalesce(Node::constant("anonymous"));

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(
        artifact.invoke(&[Value::Null]).unwrap(),
        Value::from("anonymous")
    );
    assert_eq!(
        artifact.invoke(&[Value::from("bob")]).unwrap(),
        Value::from("bob")
    );
}

#[test]
fn test_checked_cast_fails_where_unchecked_wraps() {
    let mut ctx = Context::new();
    let checked = Node::constant(300).cast("Int8", true);
    let artifact = compile(&mut ctx, &checked);
    assert!(matches!(
        artifact.invoke(&[]).unwrap_err(),
        RuntimeError::InvalidCast { .. }
    ));

    let unchecked = Node::constant(300).cast("Int8", false);
    let artifact = compile(&mut ctx, &unchecked);
    assert_eq!(artifact.invoke(&[]).unwrap(), Value::Int8(44));
}

#[test]
fn test_division_by_zero_is_an_error() {
    let mut ctx = Context::new();
    ctx.declare_parameter("a", "Int32").unwrap();
    ctx.declare_parameter("b", "Int32").unwrap();
    let tree = Node::parameter("a").divide(Node::parameter("b"));

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(
        artifact
            .invoke(&[Value::Int32(10), Value::Int32(2)])
            .unwrap(),
        Value::Int32(5)
    );
    assert!(matches!(
        artifact
            .invoke(&[Value::Int32(10), Value::Int32(0)])
            .unwrap_err(),
        RuntimeError::DivisionByZero
    ));
}

#[test]
fn test_string_concatenation_formats_the_other_side() {
    let mut ctx = Context::new();
    ctx.declare_parameter("n", "Int32").unwrap();
    let tree = Node::constant("n=").add(Node::parameter("n"));

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[Value::Int32(5)]).unwrap(), Value::from("n=5"));
}

#[test]
fn test_assignment_yields_the_assigned_value() {
    let mut ctx = Context::new();
    let v = Node::variable("v");
    let tree = Node::block(
        vec![v.clone()],
        vec![v.clone().assign(Node::constant(5)).add(Node::constant(1))],
    );

    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[]).unwrap(), Value::Int32(6));
}

#[test]
fn test_empty_block_yields_null() {
    let mut ctx = Context::new();
    let tree = Node::block(vec![], vec![]);
    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[]).unwrap(), Value::Null);
}

#[test]
fn test_static_type_comes_from_the_true_branch() {
    let mut ctx = Context::new();
    ctx.declare_parameter("flag", "Boolean").unwrap();
    let tree = Node::conditional(
        Node::parameter("flag"),
        Node::constant(42),
        Node::constant("fallback"),
    );

    let artifact = compile(&mut ctx, &tree);
    // Statically the conditional is Int32, whatever the false branch says.
    let static_type = ctx.facts().resolved_type(tree.id()).unwrap();
    assert_eq!(static_type.name(), "Int32");
    // At runtime the false branch still returns its own value.
    assert_eq!(
        artifact.invoke(&[Value::Boolean(false)]).unwrap(),
        Value::from("fallback")
    );
}

#[test]
fn test_builtin_string_members() {
    let mut ctx = Context::new();
    ctx.declare_parameter("s", "String").unwrap();
    let tree = Node::parameter("s").invoke("Contains", vec![Node::constant("@")]);
    let artifact = compile(&mut ctx, &tree);
    assert_eq!(
        artifact.invoke(&[Value::from("a@b.com")]).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        artifact.invoke(&[Value::from("nope")]).unwrap(),
        Value::Boolean(false)
    );

    let mut ctx = Context::new();
    ctx.declare_parameter("s", "String").unwrap();
    let tree = Node::parameter("s").member("Length");
    let artifact = compile(&mut ctx, &tree);
    assert_eq!(artifact.invoke(&[Value::from("héllo")]).unwrap(), Value::Int32(5));
}

#[test]
fn test_unknown_member_fails_compilation() {
    let mut ctx = Context::new();
    ctx.declare_parameter("s", "String").unwrap();
    let tree = Node::parameter("s").invoke("Reverse", vec![]);
    let err = Compiler::new().compile(&mut ctx, &tree).unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnknownMember { member, receiver, .. }
            if member == "Reverse" && receiver == "String"
    ));
}

#[test]
fn test_argument_types_are_never_converted() {
    let mut ctx = Context::new();
    ctx.declare_parameter("s", "String").unwrap();
    // Contains exists, but not for an Int32 argument.
    let tree = Node::parameter("s").invoke("Contains", vec![Node::constant(1)]);
    let err = Compiler::new().compile(&mut ctx, &tree).unwrap_err();
    assert!(matches!(
        err,
        CompileError::NoMatchingOverload { method, .. } if method == "Contains"
    ));
}

#[test]
fn test_untyped_receiver_is_reported() {
    let mut ctx = Context::new();
    ctx.declare_parameter("q", "Mystery").unwrap();
    let tree = Node::parameter("q").member("Anything");
    let err = Compiler::new().compile(&mut ctx, &tree).unwrap_err();
    assert!(matches!(err, CompileError::MissingType { .. }));
}

#[test]
fn test_arity_mismatch_is_rejected() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    let artifact = compile(&mut ctx, &Node::parameter("x"));
    assert!(matches!(
        artifact.invoke(&[]).unwrap_err(),
        RuntimeError::ArgumentCount {
            expected: 1,
            found: 0
        }
    ));
}

#[test]
fn test_artifact_runs_from_many_threads() {
    let mut ctx = Context::new();
    ctx.declare_parameter("x", "Int32").unwrap();
    let tree = Node::parameter("x").multiply(Node::parameter("x"));
    let artifact = Arc::new(compile(&mut ctx, &tree));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let artifact = artifact.clone();
            thread::spawn(move || {
                for n in 0..100i32 {
                    let v = n + i;
                    let result = artifact.invoke(&[Value::Int32(v)]).unwrap();
                    assert_eq!(result, Value::Int32(v * v));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[derive(Debug)]
struct Thermostat {
    target: f64,
}

#[test]
fn test_registered_host_type_members() {
    let provider = NativeProvider::new();
    NativeTypeBuilder::<Thermostat>::new("Thermostat")
        .property("Target", "Float64", |t: &Thermostat| {
            Value::Float64(t.target)
        })
        .method(
            "WithinRange",
            "Boolean",
            &["Float64"],
            |t: &Thermostat, args: &[Value]| match args {
                [Value::Float64(limit)] => Ok(Value::Boolean(t.target.abs() <= *limit)),
                _ => Err(RuntimeError::type_mismatch(
                    "Float64",
                    args.first().unwrap_or(&Value::Null),
                )),
            },
        )
        .register(&provider);

    let mut ctx = Context::new().with_provider(Arc::new(provider));
    ctx.declare_parameter("t", "Thermostat").unwrap();
    let tree = Node::parameter("t").member("Target").multiply(Node::constant(2.0));

    let artifact = compile(&mut ctx, &tree);
    let result = artifact
        .invoke(&[Value::opaque(Thermostat { target: 21.5 })])
        .unwrap();
    assert_eq!(result, Value::Float64(43.0));
}
