use crate::{Event, Params, Result};
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lazily produced sequence of scenario events
///
/// The consumer drives the stream; a plugin performs its work only as items
/// are pulled. An `Err` item ends the run as a failure.
pub type EventStream = BoxStream<'static, Result<Event>>;

/// Trait for executable scenarios
pub trait ScenarioPlugin: Send + Sync {
    /// Start the scenario with the given parameters
    ///
    /// Parameter validation may fail eagerly; everything else happens while
    /// the returned stream is polled.
    fn start(&self, params: Params) -> Result<EventStream>;
}

/// Constructor producing a fresh plugin instance per invocation
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn ScenarioPlugin> + Send + Sync>;

/// Registry of scenario plugins by name
///
/// Populated once at startup and then shared read-only, so lookups need no
/// synchronization.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry {
            factories: HashMap::new(),
        }
    }

    /// Register a plugin constructor. A later registration under the same
    /// name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ScenarioPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Get the constructor for a plugin name
    pub fn lookup(&self, name: &str) -> Option<PluginFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All registered plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
