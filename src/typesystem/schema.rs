//! Declarative record schemas.
//!
//! A schema is plain data: records with typed properties, optional
//! reference properties naming sibling records, and named mutations made of
//! preconditions and effects. [`SchemaProvider`] validates the whole
//! definition up front and then serves record descriptors through the
//! ordinary [`TypeProvider`] contract, so the rest of the engine never
//! learns that these types came from JSON.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{native, Accessor, DescriptorCache, MemberKind, TypeDefinition, TypeMember, TypeProvider};
use crate::ast::BinaryOperator;
use crate::compile::artifact::RuntimeError;
use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("failed to parse schema: {0}")]
    Parse(String),
    #[error("duplicate record '{0}'")]
    DuplicateRecord(String),
    #[error("record '{record}': duplicate property '{property}'")]
    DuplicateProperty { record: String, property: String },
    #[error("record '{record}', property '{property}': unknown type '{type_name}'")]
    UnknownPropertyType {
        record: String,
        property: String,
        type_name: String,
    },
    #[error("record '{record}', mutation '{mutation}': duplicate parameter '{parameter}'")]
    DuplicateParameter {
        record: String,
        mutation: String,
        parameter: String,
    },
    #[error("record '{record}', mutation '{mutation}': unknown property '{property}'")]
    UnknownProperty {
        record: String,
        mutation: String,
        property: String,
    },
    #[error("record '{record}', mutation '{mutation}': unknown parameter '{parameter}'")]
    UnknownParameter {
        record: String,
        mutation: String,
        parameter: String,
    },
    #[error("record '{record}', mutation '{mutation}': unsupported operator '{op}'")]
    UnsupportedOperator {
        record: String,
        mutation: String,
        op: String,
    },
    #[error("record '{record}', mutation '{mutation}': constant is not a scalar or list")]
    UnsupportedConstant { record: String, mutation: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDef {
    pub records: Vec<RecordDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDef {
    pub name: String,
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub mutations: Vec<MutationDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub nullable: bool,
    /// Reference properties name a sibling record instead of a built-in.
    #[serde(default)]
    pub reference: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationDef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub preconditions: Vec<PreconditionDef>,
    pub effects: Vec<EffectDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreconditionDef {
    pub property: String,
    pub op: String,
    pub operand: OperandDef,
}

impl PreconditionDef {
    /// The comparison the precondition applies, already validated at
    /// construction time.
    pub fn operator(&self) -> Option<BinaryOperator> {
        self.op
            .parse::<BinaryOperator>()
            .ok()
            .filter(BinaryOperator::is_comparison)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperandDef {
    Parameter { parameter: String },
    Constant { value: serde_json::Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectDef {
    Assign {
        property: String,
        value: serde_json::Value,
    },
    Copy {
        property: String,
        parameter: String,
    },
    Increment {
        property: String,
        parameter: String,
    },
}

/// Converts a schema constant into an engine value. Objects have no value
/// form; records enter the engine as live instances, not as literals.
pub(crate) fn json_to_value(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int64(i))
            } else {
                n.as_f64().map(Value::Float64)
            }
        }
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                list.push(json_to_value(item)?);
            }
            Some(Value::List(list))
        }
        serde_json::Value::Object(_) => None,
    }
}

/// Serves declarative records as engine types.
#[derive(Debug)]
pub struct SchemaProvider {
    records: HashMap<String, RecordDef>,
    cache: DescriptorCache,
}

impl SchemaProvider {
    /// Validates every definition before accepting any of them. The first
    /// inconsistency aborts construction.
    pub fn new(def: SchemaDef) -> Result<Self, SchemaError> {
        let record_names: HashSet<&str> =
            def.records.iter().map(|r| r.name.as_str()).collect();
        if record_names.len() != def.records.len() {
            let mut seen = HashSet::new();
            for record in &def.records {
                if !seen.insert(record.name.as_str()) {
                    return Err(SchemaError::DuplicateRecord(record.name.clone()));
                }
            }
        }
        for record in &def.records {
            validate_record(record, &record_names)?;
        }

        debug!(records = def.records.len(), "schema accepted");
        let records = def
            .records
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        Ok(Self {
            records,
            cache: DescriptorCache::new(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let def: SchemaDef =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::new(def)
    }

    pub fn record(&self, name: &str) -> Option<&RecordDef> {
        self.records.get(name)
    }

    pub fn mutation(&self, record: &str, mutation: &str) -> Option<&MutationDef> {
        self.records
            .get(record)?
            .mutations
            .iter()
            .find(|m| m.name == mutation)
    }
}

fn validate_record(record: &RecordDef, siblings: &HashSet<&str>) -> Result<(), SchemaError> {
    let mut properties = HashSet::new();
    for property in &record.properties {
        if !properties.insert(property.name.as_str()) {
            return Err(SchemaError::DuplicateProperty {
                record: record.name.clone(),
                property: property.name.clone(),
            });
        }
        let known = if property.reference {
            siblings.contains(property.type_name.as_str())
        } else {
            native::is_builtin(&property.type_name)
        };
        if !known {
            return Err(SchemaError::UnknownPropertyType {
                record: record.name.clone(),
                property: property.name.clone(),
                type_name: property.type_name.clone(),
            });
        }
    }
    for mutation in &record.mutations {
        validate_mutation(record, mutation, &properties)?;
    }
    Ok(())
}

fn validate_mutation(
    record: &RecordDef,
    mutation: &MutationDef,
    properties: &HashSet<&str>,
) -> Result<(), SchemaError> {
    let mut parameters = HashSet::new();
    for parameter in &mutation.parameters {
        if !parameters.insert(parameter.name.as_str()) {
            return Err(SchemaError::DuplicateParameter {
                record: record.name.clone(),
                mutation: mutation.name.clone(),
                parameter: parameter.name.clone(),
            });
        }
    }

    let check_property = |property: &str| {
        if properties.contains(property) {
            Ok(())
        } else {
            Err(SchemaError::UnknownProperty {
                record: record.name.clone(),
                mutation: mutation.name.clone(),
                property: property.to_string(),
            })
        }
    };
    let check_parameter = |parameter: &str| {
        if parameters.contains(parameter) {
            Ok(())
        } else {
            Err(SchemaError::UnknownParameter {
                record: record.name.clone(),
                mutation: mutation.name.clone(),
                parameter: parameter.to_string(),
            })
        }
    };
    let check_constant = |value: &serde_json::Value| {
        json_to_value(value)
            .map(|_| ())
            .ok_or(SchemaError::UnsupportedConstant {
                record: record.name.clone(),
                mutation: mutation.name.clone(),
            })
    };

    for precondition in &mutation.preconditions {
        check_property(&precondition.property)?;
        if precondition.operator().is_none() {
            return Err(SchemaError::UnsupportedOperator {
                record: record.name.clone(),
                mutation: mutation.name.clone(),
                op: precondition.op.clone(),
            });
        }
        match &precondition.operand {
            OperandDef::Parameter { parameter } => check_parameter(parameter)?,
            OperandDef::Constant { value } => check_constant(value)?,
        }
    }

    for effect in &mutation.effects {
        match effect {
            EffectDef::Assign { property, value } => {
                check_property(property)?;
                check_constant(value)?;
            }
            EffectDef::Copy {
                property,
                parameter,
            }
            | EffectDef::Increment {
                property,
                parameter,
            } => {
                check_property(property)?;
                check_parameter(parameter)?;
            }
        }
    }
    Ok(())
}

fn field_accessor(record: &str, property: &str) -> Accessor {
    let record = record.to_string();
    let property = property.to_string();
    Arc::new(move |instance, _| match instance {
        Value::Record { fields, .. } => {
            Ok(fields.get(&property).cloned().unwrap_or(Value::Null))
        }
        other => Err(RuntimeError::type_mismatch(&record, other)),
    })
}

fn record_descriptor(record: &RecordDef) -> TypeDefinition {
    let mut definition = TypeDefinition::new(&record.name).nullable();
    for property in &record.properties {
        definition = definition.member_entry(TypeMember::new(
            &record.name,
            &property.name,
            MemberKind::Field,
            &property.type_name,
            &[],
            field_accessor(&record.name, &property.name),
        ));
    }
    definition
}

impl TypeProvider for SchemaProvider {
    fn type_by_name(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        self.cache.by_name(name, || {
            let record = self.records.get(name)?;
            Some(record_descriptor(record))
        })
    }

    // Record instances carry their type name, never a Rust handle.
    fn type_by_handle(&self, _handle: TypeId) -> Option<Arc<TypeDefinition>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMER_SCHEMA: &str = r#"{
        "records": [
            {
                "name": "Customer",
                "properties": [
                    {"name": "Email", "type": "String", "nullable": true},
                    {"name": "Visits", "type": "Int32"},
                    {"name": "LastOrder", "type": "Order", "reference": true, "nullable": true}
                ],
                "mutations": [
                    {
                        "name": "RecordVisit",
                        "parameters": [{"name": "count", "type": "Int32"}],
                        "preconditions": [
                            {"property": "Visits", "op": ">=", "operand": {"value": 0}}
                        ],
                        "effects": [
                            {"kind": "increment", "property": "Visits", "parameter": "count"}
                        ]
                    }
                ]
            },
            {
                "name": "Order",
                "properties": [{"name": "Total", "type": "Decimal"}]
            }
        ]
    }"#;

    #[test]
    fn test_valid_schema_round_trip() {
        let provider = SchemaProvider::from_json(CUSTOMER_SCHEMA).unwrap();
        let customer = provider.record("Customer").unwrap();
        assert_eq!(customer.properties.len(), 3);
        assert!(provider.mutation("Customer", "RecordVisit").is_some());
        assert!(provider.mutation("Customer", "Missing").is_none());
    }

    #[test]
    fn test_unknown_property_type_is_rejected() {
        let json = r#"{"records": [{"name": "A", "properties": [
            {"name": "X", "type": "Whatever"}
        ]}]}"#;
        assert!(matches!(
            SchemaProvider::from_json(json),
            Err(SchemaError::UnknownPropertyType { type_name, .. }) if type_name == "Whatever"
        ));
    }

    #[test]
    fn test_reference_must_name_a_sibling_record() {
        let json = r#"{"records": [{"name": "A", "properties": [
            {"name": "Next", "type": "Missing", "reference": true}
        ]}]}"#;
        assert!(matches!(
            SchemaProvider::from_json(json),
            Err(SchemaError::UnknownPropertyType { .. })
        ));

        // Without the reference flag a record name is not a valid type.
        let json = r#"{"records": [
            {"name": "A", "properties": [{"name": "Next", "type": "B"}]},
            {"name": "B", "properties": []}
        ]}"#;
        assert!(matches!(
            SchemaProvider::from_json(json),
            Err(SchemaError::UnknownPropertyType { .. })
        ));
    }

    #[test]
    fn test_effect_references_are_checked() {
        let json = r#"{"records": [{"name": "A",
            "properties": [{"name": "X", "type": "Int32"}],
            "mutations": [{"name": "M", "effects": [
                {"kind": "copy", "property": "X", "parameter": "ghost"}
            ]}]
        }]}"#;
        assert!(matches!(
            SchemaProvider::from_json(json),
            Err(SchemaError::UnknownParameter { parameter, .. }) if parameter == "ghost"
        ));

        let json = r#"{"records": [{"name": "A",
            "properties": [{"name": "X", "type": "Int32"}],
            "mutations": [{"name": "M", "effects": [
                {"kind": "assign", "property": "Ghost", "value": 1}
            ]}]
        }]}"#;
        assert!(matches!(
            SchemaProvider::from_json(json),
            Err(SchemaError::UnknownProperty { property, .. }) if property == "Ghost"
        ));
    }

    #[test]
    fn test_precondition_operator_must_compare() {
        let json = r#"{"records": [{"name": "A",
            "properties": [{"name": "X", "type": "Int32"}],
            "mutations": [{"name": "M",
                "preconditions": [{"property": "X", "op": "+", "operand": {"value": 1}}],
                "effects": [{"kind": "assign", "property": "X", "value": 0}]
            }]
        }]}"#;
        assert!(matches!(
            SchemaProvider::from_json(json),
            Err(SchemaError::UnsupportedOperator { op, .. }) if op == "+"
        ));
    }

    #[test]
    fn test_descriptor_serves_fields_and_caches() {
        let provider = SchemaProvider::from_json(CUSTOMER_SCHEMA).unwrap();
        let first = provider.type_by_name("Customer").unwrap();
        let second = provider.type_by_name("Customer").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_nullable());

        let email = first.member("Email").unwrap();
        assert_eq!(email.kind(), MemberKind::Field);
        assert_eq!(email.value_type(), "String");

        let instance = Value::record("Customer", &[("Email", Value::from("a@b.c"))]);
        assert_eq!(email.evaluate(&instance, &[]).unwrap(), Value::from("a@b.c"));

        // Yet-unset fields read as Null rather than erroring.
        let visits = first.member("Visits").unwrap();
        assert_eq!(visits.evaluate(&instance, &[]).unwrap(), Value::Null);

        assert!(provider.type_by_name("Unknown").is_none());
    }

    #[test]
    fn test_reference_property_types_by_sibling_name() {
        let provider = SchemaProvider::from_json(CUSTOMER_SCHEMA).unwrap();
        let customer = provider.type_by_name("Customer").unwrap();
        let last_order = customer.member("LastOrder").unwrap();
        assert_eq!(last_order.value_type(), "Order");
        assert!(provider.type_by_name("Order").is_some());
    }

    #[test]
    fn test_json_constants() {
        assert_eq!(json_to_value(&serde_json::json!(null)), Some(Value::Null));
        assert_eq!(
            json_to_value(&serde_json::json!(42)),
            Some(Value::Int64(42))
        );
        assert_eq!(
            json_to_value(&serde_json::json!(2.5)),
            Some(Value::Float64(2.5))
        );
        assert_eq!(
            json_to_value(&serde_json::json!(["a", "b"])),
            Some(Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(json_to_value(&serde_json::json!({"k": 1})), None);
    }
}
