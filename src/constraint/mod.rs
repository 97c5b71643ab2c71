//! Declarative validation on top of the expression engine.
//!
//! [`ValidatorBuilder`] turns per-property rules into expression trees over
//! a single `instance` parameter and compiles each into its own artifact.
//! The built [`Validator`] owns only [`CompiledExpr`]s, so it is `Send +
//! Sync` and validates concurrently with no further analysis.
//!
//! A `Null` property value fails `not_null` and passes `length` and
//! `range`; those rules guard themselves with a null check so that absence
//! is reported once, by the rule whose job it is.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::ast::Node;
use crate::compile::{CompileError, CompiledExpr, Compiler, RuntimeError};
use crate::context::Context;
use crate::semantic::SemanticError;
use crate::typesystem::TypeProvider;
use crate::value::Value;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Constraint {code} on {target} does not compile: {source}")]
    InvalidConstraint {
        target: String,
        code: ViolationCode,
        #[source]
        source: CompileError,
    },

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Stable identifier of the rule a violation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationCode {
    NotNull,
    Length,
    Range,
    Equals,
    In,
    Custom(String),
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ViolationCode::NotNull => f.write_str("not_null"),
            ViolationCode::Length => f.write_str("length"),
            ViolationCode::Range => f.write_str("range"),
            ViolationCode::Equals => f.write_str("equals"),
            ViolationCode::In => f.write_str("one_of"),
            ViolationCode::Custom(code) => f.write_str(code),
        }
    }
}

/// One failed rule. `property` is `None` for instance-level checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    property: Option<String>,
    code: ViolationCode,
    message: String,
}

impl Violation {
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    pub fn code(&self) -> &ViolationCode {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

enum Rule {
    NotNull,
    Length { min: i64, max: i64 },
    Range { min: Value, max: Value },
    Equals(Value),
    In(Vec<Value>),
}

struct PropertyRule {
    property: String,
    rule: Rule,
}

struct InstanceCheck {
    code: String,
    message: String,
    build: Box<dyn Fn(&Node) -> Node + Send + Sync>,
}

/// Collects rules, then compiles them all in [`ValidatorBuilder::build`].
pub struct ValidatorBuilder {
    type_name: String,
    rules: Vec<PropertyRule>,
    checks: Vec<InstanceCheck>,
}

impl ValidatorBuilder {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            rules: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn not_null(mut self, property: &str) -> Self {
        self.rules.push(PropertyRule {
            property: property.to_string(),
            rule: Rule::NotNull,
        });
        self
    }

    /// Bounds on the property's `Length` member, inclusive.
    pub fn length(mut self, property: &str, min: i64, max: i64) -> Self {
        self.rules.push(PropertyRule {
            property: property.to_string(),
            rule: Rule::Length { min, max },
        });
        self
    }

    /// Inclusive numeric bounds on the property value.
    pub fn range(mut self, property: &str, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.rules.push(PropertyRule {
            property: property.to_string(),
            rule: Rule::Range {
                min: min.into(),
                max: max.into(),
            },
        });
        self
    }

    pub fn equals(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.rules.push(PropertyRule {
            property: property.to_string(),
            rule: Rule::Equals(value.into()),
        });
        self
    }

    pub fn is_in(mut self, property: &str, values: Vec<Value>) -> Self {
        self.rules.push(PropertyRule {
            property: property.to_string(),
            rule: Rule::In(values),
        });
        self
    }

    /// Instance-level predicate. `build` receives the instance parameter
    /// node and returns a Boolean tree; instance checks run after every
    /// property rule, in declaration order.
    pub fn check<F>(mut self, code: &str, message: &str, build: F) -> Self
    where
        F: Fn(&Node) -> Node + Send + Sync + 'static,
    {
        self.checks.push(InstanceCheck {
            code: code.to_string(),
            message: message.to_string(),
            build: Box::new(build),
        });
        self
    }

    /// Compiles every rule against the given type source.
    pub fn build(self, provider: Arc<dyn TypeProvider>) -> Result<Validator, ValidationError> {
        let mut ctx = Context::new().with_provider(provider);
        ctx.declare_parameter("instance", &self.type_name)?;
        let compiler = Compiler::new();
        // One instance node shared by every tree; analysis records its
        // facts once.
        let instance = Node::parameter("instance");

        let mut compiled = Vec::with_capacity(self.rules.len() + self.checks.len());
        for rule in &self.rules {
            let tree = property_tree(&instance, rule);
            let artifact = compiler.compile(&mut ctx, &tree).map_err(|source| {
                ValidationError::InvalidConstraint {
                    target: rule.property.clone(),
                    code: rule_code(&rule.rule),
                    source,
                }
            })?;
            compiled.push(CompiledCheck {
                property: Some(rule.property.clone()),
                code: rule_code(&rule.rule),
                message: rule_message(rule),
                artifact,
            });
        }
        for check in &self.checks {
            let tree = (check.build)(&instance);
            let code = ViolationCode::Custom(check.code.clone());
            let artifact = compiler.compile(&mut ctx, &tree).map_err(|source| {
                ValidationError::InvalidConstraint {
                    target: self.type_name.clone(),
                    code: code.clone(),
                    source,
                }
            })?;
            compiled.push(CompiledCheck {
                property: None,
                code,
                message: check.message.clone(),
                artifact,
            });
        }
        debug!(
            type_name = %self.type_name,
            checks = compiled.len(),
            "validator built"
        );
        Ok(Validator {
            type_name: self.type_name,
            checks: compiled,
        })
    }
}

fn property_tree(instance: &Node, rule: &PropertyRule) -> Node {
    let prop = instance.clone().member(&rule.property);
    match &rule.rule {
        Rule::NotNull => prop.not_equals(Node::null()),
        Rule::Length { min, max } => {
            let length = prop.clone().member("Length");
            let bounds = length
                .clone()
                .greater_than_equal(Node::constant(*min))
                .and(length.less_than_equal(Node::constant(*max)));
            Node::conditional(prop.equals(Node::null()), Node::constant(true), bounds)
        }
        Rule::Range { min, max } => {
            let bounds = prop
                .clone()
                .greater_than_equal(Node::constant(min.clone()))
                .and(prop.clone().less_than_equal(Node::constant(max.clone())));
            Node::conditional(prop.equals(Node::null()), Node::constant(true), bounds)
        }
        Rule::Equals(value) => prop.equals(Node::constant(value.clone())),
        Rule::In(values) => values.iter().fold(Node::constant(false), |tree, value| {
            tree.or(prop.clone().equals(Node::constant(value.clone())))
        }),
    }
}

fn rule_code(rule: &Rule) -> ViolationCode {
    match rule {
        Rule::NotNull => ViolationCode::NotNull,
        Rule::Length { .. } => ViolationCode::Length,
        Rule::Range { .. } => ViolationCode::Range,
        Rule::Equals(_) => ViolationCode::Equals,
        Rule::In(_) => ViolationCode::In,
    }
}

fn rule_message(rule: &PropertyRule) -> String {
    let property = &rule.property;
    match &rule.rule {
        Rule::NotNull => format!("{property} must not be null"),
        Rule::Length { min, max } => {
            format!("{property} length must be between {min} and {max}")
        }
        Rule::Range { min, max } => format!("{property} must be between {min} and {max}"),
        Rule::Equals(value) => format!("{property} must equal {value}"),
        Rule::In(_) => format!("{property} must be one of the allowed values"),
    }
}

struct CompiledCheck {
    property: Option<String>,
    code: ViolationCode,
    message: String,
    artifact: CompiledExpr,
}

/// Compiled rule set for one type.
pub struct Validator {
    type_name: String,
    checks: Vec<CompiledCheck>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Validator")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl Validator {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Runs every check against the instance. Property rules report the
    /// first failure per property; instance checks always run.
    pub fn validate(&self, instance: &Value) -> Result<Vec<Violation>, ValidationError> {
        let mut violations = Vec::new();
        let mut failed: HashSet<&str> = HashSet::new();
        for check in &self.checks {
            if let Some(property) = check.property.as_deref() {
                if failed.contains(property) {
                    continue;
                }
            }
            let verdict = check.artifact.invoke(std::slice::from_ref(instance))?;
            if !matches!(verdict, Value::Boolean(true)) {
                if let Some(property) = check.property.as_deref() {
                    failed.insert(property);
                }
                violations.push(Violation {
                    property: check.property.clone(),
                    code: check.code.clone(),
                    message: check.message.clone(),
                });
            }
        }
        Ok(violations)
    }

    pub fn is_valid(&self, instance: &Value) -> Result<bool, ValidationError> {
        Ok(self.validate(instance)?.is_empty())
    }
}
