use super::*;
use crate::value::Value;
use rust_decimal::Decimal;

#[test]
fn test_constant_types() {
    let mut ctx = Context::new();
    let cases = vec![
        (Node::constant(5), "Int32"),
        (Node::constant(5i64), "Int64"),
        (Node::constant(2.5f32), "Float32"),
        (Node::constant(2.5), "Float64"),
        (Node::constant(Decimal::new(125, 2)), "Decimal"),
        (Node::constant("hello"), "String"),
        (Node::constant(true), "Boolean"),
        (Node::null(), "Null"),
        (Node::constant(vec![Value::Int32(1)]), "List"),
    ];
    for (node, expected) in &cases {
        analyze(&mut ctx, node);
        assert_eq!(resolved_name(&ctx, node).as_deref(), Some(*expected));
    }
}

#[test]
fn test_parameter_types_come_from_declarations() {
    let mut ctx = context_with(&[("x", "Int32"), ("rate", "Float64")]);
    let x = Node::parameter("x");
    let rate = Node::parameter("rate");
    let root = x.clone().add(rate.clone());
    analyze(&mut ctx, &root);

    assert_eq!(resolved_name(&ctx, &x).as_deref(), Some("Int32"));
    assert_eq!(resolved_name(&ctx, &rate).as_deref(), Some("Float64"));
    // Int32 + Float64 promotes to the wider operand.
    assert_eq!(resolved_name(&ctx, &root).as_deref(), Some("Float64"));
}

#[test]
fn test_arithmetic_promotion_cases() {
    let mut ctx = Context::new();
    let cases = vec![
        (Node::constant(1i32).add(Node::constant(2i32)), "Int32"),
        (Node::constant(1i8).add(Node::constant(2i16)), "Int32"),
        (Node::constant(1i64).add(Node::constant(2u32)), "Int64"),
        (Node::constant(1u64).multiply(Node::constant(2i64)), "UInt64"),
        (Node::constant(1.5f32).subtract(Node::constant(2i64)), "Float32"),
        (
            Node::constant(Decimal::ONE).divide(Node::constant(2.0f64)),
            "Decimal",
        ),
    ];
    for (node, expected) in &cases {
        analyze(&mut ctx, node);
        assert_eq!(resolved_name(&ctx, node).as_deref(), Some(*expected), "{node}");
    }
}

#[test]
fn test_string_add_is_concatenation() {
    let mut ctx = context_with(&[("n", "Int32")]);
    let root = Node::constant("total: ").add(Node::parameter("n"));
    analyze(&mut ctx, &root);
    assert_eq!(resolved_name(&ctx, &root).as_deref(), Some("String"));

    let mut ctx = context_with(&[("n", "Int32")]);
    let flipped = Node::parameter("n").add(Node::constant("!"));
    analyze(&mut ctx, &flipped);
    assert_eq!(resolved_name(&ctx, &flipped).as_deref(), Some("String"));
}

#[test]
fn test_comparison_and_logic_are_boolean() {
    let mut ctx = context_with(&[("x", "Int32")]);
    let x = Node::parameter("x");
    let root = x
        .clone()
        .greater_than(Node::constant(0))
        .and(x.less_than_equal(Node::constant(10)));
    analyze(&mut ctx, &root);
    assert_eq!(resolved_name(&ctx, &root).as_deref(), Some("Boolean"));
}

#[test]
fn test_unary_minus_promotes_small_ints() {
    let mut ctx = Context::new();
    let small = Node::constant(4i8).negate();
    let float = Node::constant(4.0f32).negate();
    let not = Node::constant(true).not();
    for node in [&small, &float, &not] {
        analyze(&mut ctx, node);
    }
    assert_eq!(resolved_name(&ctx, &small).as_deref(), Some("Int32"));
    assert_eq!(resolved_name(&ctx, &float).as_deref(), Some("Float32"));
    assert_eq!(resolved_name(&ctx, &not).as_deref(), Some("Boolean"));
}

#[test]
fn test_untypeable_arithmetic_records_no_fact() {
    let mut ctx = Context::new();
    let root = Node::constant(true).add(Node::constant(1));
    analyze(&mut ctx, &root);
    assert!(!ctx.facts().has_type(root.id()));
    // The operands themselves were still typed.
    assert!(ctx.facts().len() >= 2);
}

#[test]
fn test_block_variable_typed_by_initializer() {
    let mut ctx = Context::new();
    let v = Node::variable_with_init("v", Node::constant(2.5));
    let body = v.clone().multiply(Node::constant(2));
    let block = Node::block(vec![v.clone()], vec![body.clone()]);
    analyze(&mut ctx, &block);

    assert_eq!(resolved_name(&ctx, &v).as_deref(), Some("Float64"));
    assert_eq!(resolved_name(&ctx, &body).as_deref(), Some("Float64"));
    // The block takes its final node's type.
    assert_eq!(resolved_name(&ctx, &block).as_deref(), Some("Float64"));
}

#[test]
fn test_block_variable_typed_by_first_assignment() {
    let mut ctx = Context::new();
    let v = Node::variable("v");
    let block = Node::block(
        vec![v.clone()],
        vec![v.clone().assign(Node::constant("seed")), v.clone()],
    );
    analyze(&mut ctx, &block);

    assert_eq!(resolved_name(&ctx, &v).as_deref(), Some("String"));
    assert_eq!(resolved_name(&ctx, &block).as_deref(), Some("String"));
}

#[test]
fn test_block_variable_without_seed_stays_unresolved() {
    let mut ctx = Context::new();
    let v = Node::variable("v");
    let block = Node::block(vec![v.clone()], vec![v.clone()]);
    analyze(&mut ctx, &block);
    assert!(!ctx.facts().has_type(v.id()));
}

#[test]
fn test_empty_block_is_null() {
    let mut ctx = Context::new();
    let block = Node::block(vec![], vec![]);
    analyze(&mut ctx, &block);
    assert_eq!(resolved_name(&ctx, &block).as_deref(), Some("Null"));
}

#[test]
fn test_assignment_takes_value_type() {
    let mut ctx = Context::new();
    let v = Node::variable_with_init("v", Node::constant(1));
    let assignment = v.clone().assign(Node::constant(2));
    let block = Node::block(vec![v], vec![assignment.clone()]);
    analyze(&mut ctx, &block);
    assert_eq!(resolved_name(&ctx, &assignment).as_deref(), Some("Int32"));
}

#[test]
fn test_conditional_takes_true_branch_type() {
    let mut ctx = context_with(&[("flag", "Boolean")]);
    // Asymmetric on purpose: the false branch's type is ignored.
    let root = Node::conditional(
        Node::parameter("flag"),
        Node::constant(1),
        Node::constant("other"),
    );
    analyze(&mut ctx, &root);
    assert_eq!(resolved_name(&ctx, &root).as_deref(), Some("Int32"));
}

#[test]
fn test_coalesce_takes_right_type() {
    let mut ctx = context_with(&[("maybe", "Null")]);
    let root = Node::parameter("maybe").coalesce(Node::constant(10));
    analyze(&mut ctx, &root);
    assert_eq!(resolved_name(&ctx, &root).as_deref(), Some("Int32"));
}

#[test]
fn test_cast_takes_target_type() {
    let mut ctx = Context::new();
    let checked = Node::constant(300).cast("Int8", true);
    let unknown = Node::constant(1).cast("Mystery", false);
    analyze(&mut ctx, &checked);
    analyze(&mut ctx, &unknown);
    assert_eq!(resolved_name(&ctx, &checked).as_deref(), Some("Int8"));
    assert!(!ctx.facts().has_type(unknown.id()));
}

#[test]
fn test_shared_subtree_resolves_once_and_consistently() {
    let mut ctx = context_with(&[("x", "Int32")]);
    let shared = Node::parameter("x").multiply(Node::constant(2));
    let root = shared.clone().add(shared.clone());
    analyze(&mut ctx, &root);

    assert_eq!(resolved_name(&ctx, &shared).as_deref(), Some("Int32"));
    assert_eq!(resolved_name(&ctx, &root).as_deref(), Some("Int32"));
}
