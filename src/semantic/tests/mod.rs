use std::sync::Arc;

use super::*;
use crate::ast::Node;
use crate::context::Context;
use crate::typesystem::SchemaProvider;

mod type_resolution_tests;

fn context_with(params: &[(&str, &str)]) -> Context {
    let mut ctx = Context::new();
    for (name, type_name) in params {
        ctx.declare_parameter(name, type_name).unwrap();
    }
    ctx
}

fn analyze(ctx: &mut Context, root: &Node) {
    SemanticAnalyzer::new().analyze(ctx, root);
}

fn resolved_name(ctx: &Context, node: &Node) -> Option<String> {
    ctx.facts()
        .resolved_type(node.id())
        .map(|t| t.name().to_string())
}

const ORDERS_SCHEMA: &str = r#"{
    "records": [
        {
            "name": "Customer",
            "properties": [
                {"name": "Email", "type": "String", "nullable": true},
                {"name": "Visits", "type": "Int32"},
                {"name": "LastOrder", "type": "Order", "reference": true, "nullable": true}
            ]
        },
        {
            "name": "Order",
            "properties": [{"name": "Total", "type": "Decimal"}]
        }
    ]
}"#;

fn customer_context() -> Context {
    let provider = SchemaProvider::from_json(ORDERS_SCHEMA).unwrap();
    let mut ctx = Context::new().with_provider(Arc::new(provider));
    ctx.declare_parameter("c", "Customer").unwrap();
    ctx
}

#[test]
fn test_facts_are_insert_once() {
    use crate::typesystem::TypeDefinition;

    let mut facts = SemanticFacts::new();
    let node = Node::constant(1).id();
    facts.set_resolved_type(node, Arc::new(TypeDefinition::new("Int32")));
    facts.set_resolved_type(node, Arc::new(TypeDefinition::new("Float64")));
    assert_eq!(facts.resolved_type(node).unwrap().name(), "Int32");

    let use_site = Node::parameter("x").id();
    facts.set_binding(use_site, Binding::Parameter { index: 0 });
    facts.set_binding(use_site, Binding::Parameter { index: 9 });
    assert_eq!(facts.binding(use_site), Some(Binding::Parameter { index: 0 }));
}

#[test]
fn test_reanalysis_is_skipped() {
    let mut ctx = Context::new();
    // An undeclared name produces exactly one diagnostic no matter how
    // often the same root is analyzed.
    let root = Node::variable("ghost").add(Node::constant(1));
    analyze(&mut ctx, &root);
    analyze(&mut ctx, &root);
    analyze(&mut ctx, &root);
    assert_eq!(ctx.diagnostics().len(), 1);
    assert!(ctx.has_errors());
}
