// Backend factory: name → processor, plus the registry extension point

use std::sync::Arc;

use dashmap::DashMap;

use super::blackhole::BlackholeBackendQueueProcessor;
use super::cluster::ClusterBackendQueueProcessor;
use super::local::LocalBackendQueueProcessor;
use super::ports::{BackendQueueProcessor, WorkerBuildContext};
use super::queue::QueueBackendQueueProcessor;
use super::workspace::IndexWorkspace;
use crate::config::{keys, ConfigError, ConfigResult, IndexProperties};
use crate::errors::Result;

/// Built-in backend names (matched case-insensitively)
pub mod names {
    pub const LUCENE: &str = "lucene";
    pub const LOCAL: &str = "local";
    pub const JMS: &str = "jms";
    pub const QUEUE: &str = "queue";
    pub const BLACKHOLE: &str = "blackhole";
    pub const JGROUPS_MASTER: &str = "jgroupsMaster";
    pub const JGROUPS_SLAVE: &str = "jgroupsSlave";
    pub const JGROUPS: &str = "jgroups";

    /// Used when `backend` is absent or blank
    pub const DEFAULT: &str = LUCENE;
}

pub type BackendConstructor = Arc<dyn Fn() -> Box<dyn BackendQueueProcessor> + Send + Sync>;

/// Named constructors for backends outside the built-in set
#[derive(Clone, Default)]
pub struct BackendRegistry {
    constructors: Arc<DashMap<String, BackendConstructor>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under an exact name; replaces an earlier registration
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn BackendQueueProcessor> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(backend = %name, "backend registered");
        self.constructors.insert(name, Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.constructors.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn instantiate(&self, name: &str) -> Option<Box<dyn BackendQueueProcessor>> {
        // clone out so the map guard is released before user code runs
        let constructor = self.constructors.get(name).map(|c| Arc::clone(c.value()))?;
        Some(constructor())
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendFactory {
    registry: BackendRegistry,
}

impl BackendFactory {
    pub fn new(registry: BackendRegistry) -> Self {
        Self { registry }
    }

    /// Built-in backends only
    pub fn standard() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Built-ins first (case-insensitive), then an exact registry lookup
    pub fn instantiate(&self, name: &str) -> ConfigResult<Box<dyn BackendQueueProcessor>> {
        let name = name.trim();
        let builtin: Option<Box<dyn BackendQueueProcessor>> = match name.to_ascii_lowercase().as_str() {
            "" | "lucene" | "local" => Some(Box::new(LocalBackendQueueProcessor::new())),
            "jms" | "queue" => Some(Box::new(QueueBackendQueueProcessor::new())),
            "blackhole" => Some(Box::new(BlackholeBackendQueueProcessor::new())),
            "jgroupsmaster" => Some(Box::new(ClusterBackendQueueProcessor::master())),
            "jgroupsslave" => Some(Box::new(ClusterBackendQueueProcessor::slave())),
            "jgroups" => Some(Box::new(ClusterBackendQueueProcessor::auto())),
            _ => None,
        };
        builtin
            .or_else(|| self.registry.instantiate(name))
            .ok_or_else(|| ConfigError::UnknownBackend(name.to_string()))
    }

    /// Instantiate the backend named by `backend` and initialize it
    pub fn create_backend(
        &self,
        props: &IndexProperties,
        context: &WorkerBuildContext,
        workspace: Arc<IndexWorkspace>,
    ) -> Result<Box<dyn BackendQueueProcessor>> {
        let name = props.get(keys::BACKEND).unwrap_or(names::DEFAULT);
        let processor = self.instantiate(name)?;
        tracing::info!(index = %props.index_name(), backend = processor.name(), "creating backend");
        processor.initialize(props, context, workspace)?;
        Ok(processor)
    }
}
