//! Schema-declared mutations, compiled to artifacts.
//!
//! A mutation definition is data: preconditions comparing a property
//! against a parameter or constant, and effects that assign, copy or
//! increment properties. [`MutationEngine`] lowers each piece onto the
//! expression engine, one artifact per precondition and per effect value,
//! and [`CompiledMutation::apply`] runs them against an instance.
//!
//! Instances are never modified in place. `apply` works on a copy and
//! hands back the updated record; each effect sees the writes of the
//! effects before it.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::ast::Node;
use crate::compile::{CompileError, CompiledExpr, Compiler, RuntimeError};
use crate::context::Context;
use crate::semantic::SemanticError;
use crate::typesystem::schema::{json_to_value, EffectDef, MutationDef, OperandDef, PreconditionDef};
use crate::typesystem::{SchemaProvider, TypeProvider};
use crate::value::Value;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("Unknown record {record}")]
    UnknownRecord { record: String },

    #[error("Record {record} has no mutation {mutation}")]
    UnknownMutation { record: String, mutation: String },

    #[error("Mutation {mutation} expects {expected} arguments, found {found}")]
    ArgumentCount {
        mutation: String,
        expected: usize,
        found: usize,
    },

    #[error("Mutation {mutation} precondition failed: {condition}")]
    PreconditionFailed { mutation: String, condition: String },

    #[error("Mutation {mutation}: operator {op} is not a comparison")]
    UnsupportedOperator { mutation: String, op: String },

    #[error("Mutation {mutation}: constant for {property} has no value form")]
    UnsupportedConstant { mutation: String, property: String },

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug)]
struct Precondition {
    description: String,
    artifact: CompiledExpr,
}

#[derive(Debug)]
struct Effect {
    property: String,
    artifact: CompiledExpr,
}

/// One mutation, fully compiled. Reusable and `Send + Sync`.
#[derive(Debug)]
pub struct CompiledMutation {
    record: String,
    name: String,
    parameters: Vec<String>,
    preconditions: Vec<Precondition>,
    effects: Vec<Effect>,
}

impl CompiledMutation {
    pub fn record(&self) -> &str {
        &self.record
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Checks every precondition, then runs the effects in declaration
    /// order on a working copy of the instance. The input is untouched.
    pub fn apply(&self, instance: &Value, args: &[Value]) -> Result<Value, MutationError> {
        if args.len() != self.parameters.len() {
            return Err(MutationError::ArgumentCount {
                mutation: self.name.clone(),
                expected: self.parameters.len(),
                found: args.len(),
            });
        }
        if instance.type_name() != self.record {
            return Err(MutationError::Runtime(RuntimeError::type_mismatch(
                &self.record,
                instance,
            )));
        }

        let mut invocation = Vec::with_capacity(args.len() + 1);
        invocation.push(instance.clone());
        invocation.extend_from_slice(args);

        for precondition in &self.preconditions {
            let verdict = precondition.artifact.invoke(&invocation)?;
            if !matches!(verdict, Value::Boolean(true)) {
                return Err(MutationError::PreconditionFailed {
                    mutation: self.name.clone(),
                    condition: precondition.description.clone(),
                });
            }
        }

        let mut working = instance.clone();
        for effect in &self.effects {
            invocation[0] = working.clone();
            let value = effect.artifact.invoke(&invocation)?;
            working = with_field(working, &effect.property, value, &self.record)?;
        }
        Ok(working)
    }
}

fn with_field(
    value: Value,
    property: &str,
    new_value: Value,
    record: &str,
) -> Result<Value, MutationError> {
    match value {
        Value::Record {
            type_name,
            mut fields,
        } => {
            fields.insert(property.to_string(), new_value);
            Ok(Value::Record { type_name, fields })
        }
        other => Err(MutationError::Runtime(RuntimeError::type_mismatch(
            record, &other,
        ))),
    }
}

/// Compiles and caches mutations for one schema.
pub struct MutationEngine {
    provider: Arc<SchemaProvider>,
    cache: DashMap<(String, String), Arc<CompiledMutation>>,
}

impl MutationEngine {
    pub fn new(provider: Arc<SchemaProvider>) -> Self {
        Self {
            provider,
            cache: DashMap::new(),
        }
    }

    pub fn provider(&self) -> &Arc<SchemaProvider> {
        &self.provider
    }

    /// The compiled form of `record.mutation`. Compiles on first use,
    /// serves the cached artifact after that.
    pub fn mutation(
        &self,
        record: &str,
        mutation: &str,
    ) -> Result<Arc<CompiledMutation>, MutationError> {
        let key = (record.to_string(), mutation.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }
        let compiled = Arc::new(self.compile(record, mutation)?);
        // Racing compilations produce equivalent artifacts; the first
        // insert wins and the rest are dropped.
        Ok(self.cache.entry(key).or_insert(compiled).clone())
    }

    fn compile(&self, record: &str, mutation: &str) -> Result<CompiledMutation, MutationError> {
        if self.provider.record(record).is_none() {
            return Err(MutationError::UnknownRecord {
                record: record.to_string(),
            });
        }
        let def = self
            .provider
            .mutation(record, mutation)
            .ok_or_else(|| MutationError::UnknownMutation {
                record: record.to_string(),
                mutation: mutation.to_string(),
            })?
            .clone();

        let provider: Arc<dyn TypeProvider> = self.provider.clone();
        let mut ctx = Context::new().with_provider(provider);
        ctx.declare_parameter("instance", record)?;
        for parameter in &def.parameters {
            ctx.declare_parameter(&parameter.name, &parameter.type_name)?;
        }

        let compiler = Compiler::new();
        let instance = Node::parameter("instance");

        let mut preconditions = Vec::with_capacity(def.preconditions.len());
        for pre in &def.preconditions {
            let op = pre
                .operator()
                .ok_or_else(|| MutationError::UnsupportedOperator {
                    mutation: def.name.clone(),
                    op: pre.op.clone(),
                })?;
            let operand = operand_node(&pre.operand, &def, &pre.property)?;
            let tree = Node::binary(op, instance.clone().member(&pre.property), operand);
            preconditions.push(Precondition {
                description: describe_precondition(pre),
                artifact: compiler.compile(&mut ctx, &tree)?,
            });
        }

        let mut effects = Vec::with_capacity(def.effects.len());
        for effect in &def.effects {
            let (property, tree) = effect_tree(&instance, effect, &def)?;
            effects.push(Effect {
                property,
                artifact: compiler.compile(&mut ctx, &tree)?,
            });
        }

        debug!(
            record,
            mutation = %def.name,
            preconditions = preconditions.len(),
            effects = effects.len(),
            "mutation compiled"
        );
        Ok(CompiledMutation {
            record: record.to_string(),
            name: def.name.clone(),
            parameters: def.parameters.iter().map(|p| p.name.clone()).collect(),
            preconditions,
            effects,
        })
    }
}

fn operand_node(
    operand: &OperandDef,
    def: &MutationDef,
    property: &str,
) -> Result<Node, MutationError> {
    match operand {
        OperandDef::Parameter { parameter } => Ok(Node::parameter(parameter)),
        OperandDef::Constant { value } => {
            json_to_value(value)
                .map(Node::constant)
                .ok_or_else(|| MutationError::UnsupportedConstant {
                    mutation: def.name.clone(),
                    property: property.to_string(),
                })
        }
    }
}

fn effect_tree(
    instance: &Node,
    effect: &EffectDef,
    def: &MutationDef,
) -> Result<(String, Node), MutationError> {
    match effect {
        EffectDef::Assign { property, value } => {
            let constant =
                json_to_value(value).ok_or_else(|| MutationError::UnsupportedConstant {
                    mutation: def.name.clone(),
                    property: property.clone(),
                })?;
            Ok((property.clone(), Node::constant(constant)))
        }
        EffectDef::Copy {
            property,
            parameter,
        } => Ok((property.clone(), Node::parameter(parameter))),
        EffectDef::Increment {
            property,
            parameter,
        } => Ok((
            property.clone(),
            instance
                .clone()
                .member(property)
                .add(Node::parameter(parameter)),
        )),
    }
}

fn describe_precondition(pre: &PreconditionDef) -> String {
    let operand = match &pre.operand {
        OperandDef::Parameter { parameter } => parameter.clone(),
        OperandDef::Constant { value } => value.to_string(),
    };
    format!("{} {} {}", pre.property, pre.op, operand)
}
