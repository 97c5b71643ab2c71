//! Type introspection layer.
//!
//! The engine never asks where a type came from. Registered host types
//! ([`native`]), declarative records ([`schema`]) and the built-in scalars
//! all answer through one contract: a [`TypeProvider`] hands out
//! [`TypeDefinition`] descriptors by name or by runtime handle, and absence
//! is `None` so providers chain cleanly.

pub mod cache;
pub mod native;
pub mod schema;

use core::fmt;
use std::any::TypeId;
use std::sync::Arc;

use strum_macros::Display;

use crate::ast::Node;
use crate::compile::artifact::{RuntimeError, RuntimeResult};
use crate::semantic::promote::NumericKind;
use crate::value::Value;

pub use cache::DescriptorCache;
pub use native::{NativeProvider, NativeTypeBuilder};
pub use schema::{SchemaDef, SchemaError, SchemaProvider};

/// Runtime half of a member: given the receiver and evaluated arguments,
/// produce the member's value.
pub type Accessor = Arc<dyn Fn(&Value, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Indexer,
}

/// Provider-agnostic description of one member.
#[derive(Clone)]
pub struct TypeMember {
    name: String,
    owner: String,
    kind: MemberKind,
    value_type: String,
    parameter_types: Vec<String>,
    eval: Accessor,
}

impl TypeMember {
    pub fn new(
        owner: &str,
        name: &str,
        kind: MemberKind,
        value_type: &str,
        parameter_types: &[&str],
        eval: Accessor,
    ) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            kind,
            value_type: value_type.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
            eval,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn value_type(&self) -> &str {
        &self.value_type
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Runs the member against a live receiver.
    pub fn evaluate(&self, instance: &Value, args: &[Value]) -> RuntimeResult<Value> {
        if instance.is_null() {
            return Err(RuntimeError::NullReference(format!(
                "{}.{}",
                self.owner, self.name
            )));
        }
        (self.eval)(instance, args)
    }

    /// Builds the bound accessor node for this member: the one mechanism
    /// behind member access, indexing and invocation.
    pub fn accessor(&self, instance: Node, args: Vec<Node>) -> Node {
        match self.kind {
            MemberKind::Field | MemberKind::Property => instance.member(&self.name),
            MemberKind::Indexer => instance.index(args),
            MemberKind::Method => instance.invoke(&self.name, args),
        }
    }
}

impl fmt::Debug for TypeMember {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TypeMember")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .field("parameter_types", &self.parameter_types)
            .finish()
    }
}

/// Provider-agnostic description of one type: its traits as flags plus the
/// uniform merged member sequence.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    name: String,
    numeric: Option<NumericKind>,
    nullable: bool,
    element: Option<String>,
    members: Vec<Arc<TypeMember>>,
    runtime_id: Option<TypeId>,
}

impl TypeDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            numeric: None,
            nullable: false,
            element: None,
            members: Vec::new(),
            runtime_id: None,
        }
    }

    pub fn numeric(mut self, kind: NumericKind) -> Self {
        self.numeric = Some(kind);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn element(mut self, element: &str) -> Self {
        self.element = Some(element.to_string());
        self
    }

    pub fn member_entry(mut self, member: TypeMember) -> Self {
        self.members.push(Arc::new(member));
        self
    }

    pub(crate) fn runtime_id(mut self, id: TypeId) -> Self {
        self.runtime_id = Some(id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        self.numeric
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric.is_some()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_string(&self) -> bool {
        self.name == "String"
    }

    pub fn is_boolean(&self) -> bool {
        self.name == "Boolean"
    }

    pub fn element_type(&self) -> Option<&str> {
        self.element.as_deref()
    }

    pub fn handle(&self) -> Option<TypeId> {
        self.runtime_id
    }

    /// The uniform merged sequence: fields, properties, methods and indexers
    /// in declaration order.
    pub fn members(&self) -> &[Arc<TypeMember>] {
        &self.members
    }

    /// First member with the given name, whatever its kind.
    pub fn member(&self, name: &str) -> Option<Arc<TypeMember>> {
        self.members.iter().find(|m| m.name() == name).cloned()
    }

    /// Method with an exactly matching argument type list. No scoring, no
    /// implicit conversions: a mismatch in any position is a miss.
    pub fn find_method(&self, name: &str, arg_types: &[&str]) -> Option<Arc<TypeMember>> {
        self.members
            .iter()
            .find(|m| {
                m.kind() == MemberKind::Method
                    && m.name() == name
                    && m.parameter_types().len() == arg_types.len()
                    && m.parameter_types().iter().zip(arg_types).all(|(p, a)| p == a)
            })
            .cloned()
    }

    /// Indexer with an exactly matching argument type list.
    pub fn find_indexer(&self, arg_types: &[&str]) -> Option<Arc<TypeMember>> {
        self.members
            .iter()
            .find(|m| {
                m.kind() == MemberKind::Indexer
                    && m.parameter_types().len() == arg_types.len()
                    && m.parameter_types().iter().zip(arg_types).all(|(p, a)| p == a)
            })
            .cloned()
    }
}

/// The single contract between the engine and any source of type
/// information. A provider that does not know a name answers `None`; it
/// never errors, so lookups fall through to the next provider in the chain.
#[mockall::automock]
pub trait TypeProvider: Send + Sync {
    fn type_by_name(&self, name: &str) -> Option<Arc<TypeDefinition>>;

    fn type_by_handle(&self, handle: TypeId) -> Option<Arc<TypeDefinition>>;
}

/// Ordered list of providers consulted front to back; the first `Some` wins.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn TypeProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a provider ahead of everything already in the chain, so the most
    /// recently added source shadows earlier ones for names both know.
    pub fn push_front(&mut self, provider: Arc<dyn TypeProvider>) {
        self.providers.insert(0, provider);
    }

    pub fn push_back(&mut self, provider: Arc<dyn TypeProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl TypeProvider for ProviderChain {
    fn type_by_name(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        self.providers.iter().find_map(|p| p.type_by_name(name))
    }

    fn type_by_handle(&self, handle: TypeId) -> Option<Arc<TypeDefinition>> {
        self.providers.iter().find_map(|p| p.type_by_handle(handle))
    }
}
