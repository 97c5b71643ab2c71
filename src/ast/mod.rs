//! Expression tree model.
//!
//! Trees are built through the fluent constructors in [`builder`], never
//! parsed from text. A [`Node`] is an id plus a shared, immutable
//! [`NodeKind`]; cloning a node clones the `Arc` and keeps the id, so the
//! clone *is* the same node wherever it appears. Analysis facts are keyed by
//! that identity, which is what lets a diamond-shared subtree resolve once
//! and a twice-used variable land in one storage slot.

pub mod builder;

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        // Allocator only. Ids never carry meaning beyond uniqueness.
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One expression node. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: Arc<NodeKind>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::next(),
            kind: Arc::new(kind),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Direct children in evaluation order. A `Block` lists its declared
    /// variables before its body nodes.
    pub fn children(&self) -> Vec<&Node> {
        match self.kind() {
            NodeKind::Constant(_) | NodeKind::Parameter { .. } => Vec::new(),
            NodeKind::Variable { init, .. } => init.iter().collect(),
            NodeKind::Unary { operand, .. } => vec![operand],
            NodeKind::Binary { left, right, .. } => vec![left, right],
            NodeKind::MemberAccess { instance, .. } => vec![instance],
            NodeKind::IndexAccess { instance, args } => {
                std::iter::once(instance).chain(args).collect()
            }
            NodeKind::MethodInvocation { instance, args, .. } => {
                std::iter::once(instance).chain(args).collect()
            }
            NodeKind::Assignment { target, value } => vec![target, value],
            NodeKind::Block { variables, nodes } => variables.iter().chain(nodes).collect(),
            NodeKind::Conditional {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
            NodeKind::Coalesce { left, right } => vec![left, right],
            NodeKind::TypeCast { operand, .. } => vec![operand],
        }
    }
}

// Equality is identity. Two structurally identical constants built
// separately are different nodes and must stay that way.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Constant(Value),
    Parameter {
        name: String,
    },
    Variable {
        name: String,
        init: Option<Node>,
    },
    Unary {
        op: UnaryOperator,
        operand: Node,
    },
    Binary {
        op: BinaryOperator,
        left: Node,
        right: Node,
    },
    MemberAccess {
        instance: Node,
        member: String,
    },
    IndexAccess {
        instance: Node,
        args: Vec<Node>,
    },
    MethodInvocation {
        instance: Node,
        method: String,
        args: Vec<Node>,
    },
    Assignment {
        target: Node,
        value: Node,
    },
    Block {
        variables: Vec<Node>,
        nodes: Vec<Node>,
    },
    Conditional {
        condition: Node,
        if_true: Node,
        if_false: Node,
    },
    Coalesce {
        left: Node,
        right: Node,
    },
    TypeCast {
        operand: Node,
        target: String,
        checked: bool,
    },
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
}

impl BinaryOperator {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::GreaterThan
                | BinaryOperator::LessThanEqual
                | BinaryOperator::GreaterThanEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "!")]
    Not,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            NodeKind::Constant(value) => write!(f, "{}", value),
            NodeKind::Parameter { name } => write!(f, "{}", name),
            NodeKind::Variable { name, .. } => write!(f, "{}", name),
            NodeKind::Unary { op, operand } => write!(f, "({}{})", op, operand),
            NodeKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            NodeKind::MemberAccess { instance, member } => write!(f, "{}.{}", instance, member),
            NodeKind::IndexAccess { instance, args } => {
                write!(f, "{}[", instance)?;
                format_list(f, args)?;
                write!(f, "]")
            }
            NodeKind::MethodInvocation {
                instance,
                method,
                args,
            } => {
                write!(f, "{}.{}(", instance, method)?;
                format_list(f, args)?;
                write!(f, ")")
            }
            NodeKind::Assignment { target, value } => write!(f, "({} = {})", target, value),
            NodeKind::Block { nodes, .. } => write!(f, "{{ {} nodes }}", nodes.len()),
            NodeKind::Conditional {
                condition,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", condition, if_true, if_false),
            NodeKind::Coalesce { left, right } => write!(f, "({} ?? {})", left, right),
            NodeKind::TypeCast {
                operand, target, ..
            } => write!(f, "({} as {})", operand, target),
        }
    }
}

fn format_list(f: &mut fmt::Formatter, nodes: &[Node]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", node)?;
    }
    Ok(())
}
