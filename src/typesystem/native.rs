//! Built-in scalar descriptors and the host-type registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use strum::IntoEnumIterator;

use super::{Accessor, MemberKind, TypeDefinition, TypeMember, TypeProvider};
use crate::compile::artifact::{RuntimeError, RuntimeResult};
use crate::semantic::promote::NumericKind;
use crate::value::Value;

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, Arc<TypeDefinition>> = build_builtins();
}

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

pub(crate) fn builtin(name: &str) -> Option<Arc<TypeDefinition>> {
    BUILTINS.get(name).cloned()
}

fn build_builtins() -> HashMap<&'static str, Arc<TypeDefinition>> {
    let mut map = HashMap::new();
    for kind in NumericKind::iter() {
        map.insert(
            kind.type_name(),
            Arc::new(TypeDefinition::new(kind.type_name()).numeric(kind)),
        );
    }
    map.insert("String", Arc::new(string_descriptor()));
    map.insert("Boolean", Arc::new(TypeDefinition::new("Boolean")));
    map.insert("Null", Arc::new(TypeDefinition::new("Null").nullable()));
    // Top type for values the engine knows nothing more about. Deliberately
    // memberless; anything useful needs a cast first.
    map.insert("Object", Arc::new(TypeDefinition::new("Object").nullable()));
    map.insert("List", Arc::new(list_descriptor()));
    map
}

fn string_receiver<'a>(instance: &'a Value) -> RuntimeResult<&'a str> {
    match instance {
        Value::String(s) => Ok(s),
        other => Err(RuntimeError::type_mismatch("String", other)),
    }
}

fn string_arg<'a>(args: &'a [Value], index: usize) -> RuntimeResult<&'a str> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RuntimeError::type_mismatch("String", other)),
        None => Err(RuntimeError::ArgumentCount {
            expected: index + 1,
            found: args.len(),
        }),
    }
}

fn int_arg(args: &[Value], index: usize) -> RuntimeResult<i32> {
    match args.get(index) {
        Some(Value::Int32(n)) => Ok(*n),
        Some(other) => Err(RuntimeError::type_mismatch("Int32", other)),
        None => Err(RuntimeError::ArgumentCount {
            expected: index + 1,
            found: args.len(),
        }),
    }
}

fn string_predicate(
    name: &str,
    test: fn(&str, &str) -> bool,
) -> TypeMember {
    let accessor: Accessor = Arc::new(move |instance, args| {
        let receiver = string_receiver(instance)?;
        let needle = string_arg(args, 0)?;
        Ok(Value::Boolean(test(receiver, needle)))
    });
    TypeMember::new("String", name, MemberKind::Method, "Boolean", &["String"], accessor)
}

fn string_descriptor() -> TypeDefinition {
    let length: Accessor = Arc::new(|instance, _| {
        let s = string_receiver(instance)?;
        Ok(Value::Int32(s.chars().count() as i32))
    });
    let substring: Accessor = Arc::new(|instance, args| {
        let s = string_receiver(instance)?;
        let start = int_arg(args, 0)?;
        let length = int_arg(args, 1)?;
        let total = s.chars().count();
        if start < 0 || length < 0 || (start as usize) + (length as usize) > total {
            return Err(RuntimeError::IndexOutOfRange {
                index: start as i64,
                len: total,
            });
        }
        let taken: String = s.chars().skip(start as usize).take(length as usize).collect();
        Ok(Value::String(taken))
    });

    TypeDefinition::new("String")
        .member_entry(TypeMember::new(
            "String",
            "Length",
            MemberKind::Property,
            "Int32",
            &[],
            length,
        ))
        .member_entry(string_predicate("Contains", |s, n| s.contains(n)))
        .member_entry(string_predicate("StartsWith", |s, n| s.starts_with(n)))
        .member_entry(string_predicate("EndsWith", |s, n| s.ends_with(n)))
        .member_entry(TypeMember::new(
            "String",
            "Substring",
            MemberKind::Method,
            "String",
            &["Int32", "Int32"],
            substring,
        ))
}

fn list_receiver<'a>(instance: &'a Value) -> RuntimeResult<&'a [Value]> {
    match instance {
        Value::List(items) => Ok(items),
        other => Err(RuntimeError::type_mismatch("List", other)),
    }
}

fn list_descriptor() -> TypeDefinition {
    let count: Accessor = Arc::new(|instance, _| {
        let items = list_receiver(instance)?;
        Ok(Value::Int32(items.len() as i32))
    });
    let item: Accessor = Arc::new(|instance, args| {
        let items = list_receiver(instance)?;
        let index = int_arg(args, 0)?;
        if index < 0 || index as usize >= items.len() {
            return Err(RuntimeError::IndexOutOfRange {
                index: index as i64,
                len: items.len(),
            });
        }
        Ok(items[index as usize].clone())
    });

    TypeDefinition::new("List")
        .nullable()
        .element("Object")
        .member_entry(TypeMember::new(
            "List",
            "Count",
            MemberKind::Property,
            "Int32",
            &[],
            count,
        ))
        .member_entry(TypeMember::new(
            "List",
            "Item",
            MemberKind::Indexer,
            "Object",
            &["Int32"],
            item,
        ))
}

/// Provider for host-registered types plus the built-in scalars.
///
/// Registered names are consulted before the built-ins, so a host type may
/// shadow a built-in name if it really wants to.
#[derive(Debug, Default)]
pub struct NativeProvider {
    registered: DashMap<String, Arc<TypeDefinition>>,
    handles: DashMap<TypeId, String>,
}

impl NativeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, definition: TypeDefinition, handle: TypeId) {
        let name = definition.name().to_string();
        self.handles.insert(handle, name.clone());
        self.registered.insert(name, Arc::new(definition));
    }
}

impl TypeProvider for NativeProvider {
    fn type_by_name(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        if let Some(entry) = self.registered.get(name) {
            return Some(entry.clone());
        }
        builtin(name)
    }

    fn type_by_handle(&self, handle: TypeId) -> Option<Arc<TypeDefinition>> {
        let name = self.handles.get(&handle)?;
        self.registered.get(name.value()).map(|e| e.clone())
    }
}

/// Fluent registration of a Rust type as an engine type. Accessors receive
/// the downcast receiver; carrier values reach the engine as [`Value::Opaque`].
pub struct NativeTypeBuilder<T> {
    name: String,
    members: Vec<TypeMember>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Any + Send + Sync> NativeTypeBuilder<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn property<F>(mut self, name: &str, value_type: &str, get: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let owner = self.name.clone();
        let accessor: Accessor = Arc::new(move |instance, _| {
            let typed = downcast_receiver::<T>(instance, &owner)?;
            Ok(get(typed))
        });
        self.members.push(TypeMember::new(
            &self.name,
            name,
            MemberKind::Property,
            value_type,
            &[],
            accessor,
        ));
        self
    }

    pub fn method<F>(
        mut self,
        name: &str,
        value_type: &str,
        parameter_types: &[&str],
        call: F,
    ) -> Self
    where
        F: Fn(&T, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        let owner = self.name.clone();
        let accessor: Accessor = Arc::new(move |instance, args| {
            let typed = downcast_receiver::<T>(instance, &owner)?;
            call(typed, args)
        });
        self.members.push(TypeMember::new(
            &self.name,
            name,
            MemberKind::Method,
            value_type,
            parameter_types,
            accessor,
        ));
        self
    }

    pub fn register(self, provider: &NativeProvider) {
        let mut definition =
            TypeDefinition::new(&self.name).runtime_id(TypeId::of::<T>());
        for member in self.members {
            definition = definition.member_entry(member);
        }
        provider.register(definition, TypeId::of::<T>());
    }
}

fn downcast_receiver<'a, T: Any + Send + Sync>(
    instance: &'a Value,
    owner: &str,
) -> RuntimeResult<&'a T> {
    instance
        .as_opaque::<T>()
        .ok_or_else(|| RuntimeError::type_mismatch(owner, instance))
}
