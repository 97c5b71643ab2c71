//! Fluent construction API.
//!
//! Consumers describe intent through these methods and hand the finished
//! tree to a [`crate::context::Context`] for analysis and compilation.

use super::{BinaryOperator, Node, NodeKind, UnaryOperator};
use crate::value::Value;

impl Node {
    pub fn constant(value: impl Into<Value>) -> Node {
        Node::new(NodeKind::Constant(value.into()))
    }

    pub fn null() -> Node {
        Node::new(NodeKind::Constant(Value::Null))
    }

    pub fn parameter(name: &str) -> Node {
        Node::new(NodeKind::Parameter {
            name: name.to_string(),
        })
    }

    pub fn variable(name: &str) -> Node {
        Node::new(NodeKind::Variable {
            name: name.to_string(),
            init: None,
        })
    }

    pub fn variable_with_init(name: &str, init: Node) -> Node {
        Node::new(NodeKind::Variable {
            name: name.to_string(),
            init: Some(init),
        })
    }

    pub fn unary(op: UnaryOperator, operand: Node) -> Node {
        Node::new(NodeKind::Unary { op, operand })
    }

    pub fn binary(op: BinaryOperator, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Binary { op, left, right })
    }

    pub fn block(variables: Vec<Node>, nodes: Vec<Node>) -> Node {
        Node::new(NodeKind::Block { variables, nodes })
    }

    pub fn conditional(condition: Node, if_true: Node, if_false: Node) -> Node {
        Node::new(NodeKind::Conditional {
            condition,
            if_true,
            if_false,
        })
    }

    pub fn negate(self) -> Node {
        Node::unary(UnaryOperator::Minus, self)
    }

    pub fn not(self) -> Node {
        Node::unary(UnaryOperator::Not, self)
    }

    pub fn add(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Add, self, other)
    }

    pub fn subtract(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Subtract, self, other)
    }

    pub fn multiply(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Multiply, self, other)
    }

    pub fn divide(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Divide, self, other)
    }

    pub fn modulo(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Modulo, self, other)
    }

    pub fn equals(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Equal, self, other)
    }

    pub fn not_equals(self, other: Node) -> Node {
        Node::binary(BinaryOperator::NotEqual, self, other)
    }

    pub fn less_than(self, other: Node) -> Node {
        Node::binary(BinaryOperator::LessThan, self, other)
    }

    pub fn greater_than(self, other: Node) -> Node {
        Node::binary(BinaryOperator::GreaterThan, self, other)
    }

    pub fn less_than_equal(self, other: Node) -> Node {
        Node::binary(BinaryOperator::LessThanEqual, self, other)
    }

    pub fn greater_than_equal(self, other: Node) -> Node {
        Node::binary(BinaryOperator::GreaterThanEqual, self, other)
    }

    pub fn and(self, other: Node) -> Node {
        Node::binary(BinaryOperator::And, self, other)
    }

    pub fn or(self, other: Node) -> Node {
        Node::binary(BinaryOperator::Or, self, other)
    }

    pub fn member(self, name: &str) -> Node {
        Node::new(NodeKind::MemberAccess {
            instance: self,
            member: name.to_string(),
        })
    }

    pub fn index(self, args: Vec<Node>) -> Node {
        Node::new(NodeKind::IndexAccess {
            instance: self,
            args,
        })
    }

    pub fn invoke(self, method: &str, args: Vec<Node>) -> Node {
        Node::new(NodeKind::MethodInvocation {
            instance: self,
            method: method.to_string(),
            args,
        })
    }

    pub fn assign(self, value: Node) -> Node {
        Node::new(NodeKind::Assignment {
            target: self,
            value,
        })
    }

    pub fn coalesce(self, right: Node) -> Node {
        Node::new(NodeKind::Coalesce { left: self, right })
    }

    /// Conversion to the named target type. Checked casts range-check and
    /// fail at runtime on loss; unchecked casts truncate or wrap.
    pub fn cast(self, target: &str, checked: bool) -> Node {
        Node::new(NodeKind::TypeCast {
            operand: self,
            target: target.to_string(),
            checked,
        })
    }
}
