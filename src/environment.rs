// Execution environment lookup and resolution
use crate::model::ExecutionEnvironment;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// Read-only view of the stored execution environments
pub trait EnvironmentLookup {
    fn find_by_name(&self, name: &str) -> Option<ExecutionEnvironment>;
}

impl<T: EnvironmentLookup + ?Sized> EnvironmentLookup for &T {
    fn find_by_name(&self, name: &str) -> Option<ExecutionEnvironment> {
        (**self).find_by_name(name)
    }
}

impl<T: EnvironmentLookup + ?Sized> EnvironmentLookup for Arc<T> {
    fn find_by_name(&self, name: &str) -> Option<ExecutionEnvironment> {
        (**self).find_by_name(name)
    }
}

pub fn environment_key(language: &str, version: &str) -> String {
    format!("{} {}", language, version)
}

// Maps a (language, version) pair to an environment id, never failing
pub struct EnvironmentResolver<'a, L: ?Sized> {
    lookup: &'a L,
    default_id: i64,
}

impl<'a, L: EnvironmentLookup + ?Sized> EnvironmentResolver<'a, L> {
    pub fn new(lookup: &'a L, default_id: i64) -> Self {
        Self { lookup, default_id }
    }

    pub fn resolve(&self, language: &str, version: &str) -> i64 {
        let key = environment_key(language, version);
        match self.lookup.find_by_name(&key) {
            Some(env) => {
                debug!(name = %key, id = env.id, "Resolved execution environment");
                env.id
            }
            None => {
                warn!(
                    name = %key,
                    default_id = self.default_id,
                    "No execution environment found, using default"
                );
                self.default_id
            }
        }
    }
}

// In-memory environment store, safe for concurrent reads and writes
#[derive(Debug, Default)]
pub struct EnvironmentRegistry {
    by_name: DashMap<String, ExecutionEnvironment>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Replaces any environment already registered under the same name
    pub fn register(&self, environment: ExecutionEnvironment) {
        self.by_name.insert(environment.name.clone(), environment);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl FromIterator<ExecutionEnvironment> for EnvironmentRegistry {
    fn from_iter<I: IntoIterator<Item = ExecutionEnvironment>>(iter: I) -> Self {
        let registry = Self::new();
        for environment in iter {
            registry.register(environment);
        }
        registry
    }
}

impl EnvironmentLookup for EnvironmentRegistry {
    fn find_by_name(&self, name: &str) -> Option<ExecutionEnvironment> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }
}
