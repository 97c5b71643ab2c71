//! Concurrent descriptor cache shared by providers.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;

use super::TypeDefinition;

/// Name- and handle-keyed cache for built descriptors. Building a descriptor
/// is pure, so a duplicate build on a racing miss is harmless; whichever
/// entry lands first is the one every caller sees afterwards.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    by_name: DashMap<String, Arc<TypeDefinition>>,
    by_handle: DashMap<TypeId, Arc<TypeDefinition>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor for `name`, building it outside the map
    /// lock on a miss. `build` returning `None` is not cached.
    pub fn by_name<F>(&self, name: &str, build: F) -> Option<Arc<TypeDefinition>>
    where
        F: FnOnce() -> Option<TypeDefinition>,
    {
        if let Some(hit) = self.by_name.get(name) {
            return Some(hit.clone());
        }
        let built = Arc::new(build()?);
        let entry = self
            .by_name
            .entry(name.to_string())
            .or_insert(built)
            .clone();
        if let Some(handle) = entry.handle() {
            self.by_handle.entry(handle).or_insert_with(|| entry.clone());
        }
        Some(entry)
    }

    pub fn by_handle<F>(&self, handle: TypeId, build: F) -> Option<Arc<TypeDefinition>>
    where
        F: FnOnce() -> Option<TypeDefinition>,
    {
        if let Some(hit) = self.by_handle.get(&handle) {
            return Some(hit.clone());
        }
        let built = Arc::new(build()?);
        let entry = self.by_handle.entry(handle).or_insert(built).clone();
        self.by_name
            .entry(entry.name().to_string())
            .or_insert_with(|| entry.clone());
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
