//! Index managers: the producer-facing entry point per index
//!
//! An `IndexManager` owns one workspace (engine + flush barrier) and the
//! backend chosen for it. The `IndexManagerHolder` is the process-wide map
//! cluster receivers and queue drainers look indexes up in.

use std::sync::Arc;

use dashmap::DashMap;

use super::factory::BackendFactory;
use super::ports::{BackendQueueProcessor, IndexingMonitor, WorkerBuildContext};
use super::workspace::IndexWorkspace;
use crate::config::{ConfigError, IndexProperties, Properties};
use crate::errors::Result;
use crate::features::engine::IndexEngine;
use crate::features::work::domain::Work;

pub struct IndexManager {
    name: String,
    workspace: Arc<IndexWorkspace>,
    processor: Box<dyn BackendQueueProcessor>,
}

impl IndexManager {
    pub fn new(
        props: &IndexProperties,
        engine: Arc<dyn IndexEngine>,
        context: &WorkerBuildContext,
        factory: &BackendFactory,
    ) -> Result<Self> {
        let workspace = Arc::new(IndexWorkspace::new(
            props.index_name(),
            engine,
            Arc::clone(context.registry()),
        ));
        let processor = factory.create_backend(props, context, Arc::clone(&workspace))?;
        Ok(Self {
            name: props.index_name().to_string(),
            workspace,
            processor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend_name(&self) -> &str {
        self.processor.name()
    }

    pub fn workspace(&self) -> &Arc<IndexWorkspace> {
        &self.workspace
    }

    /// Submit one ordered batch; an empty batch is a no-op
    pub fn perform_operations(
        &self,
        works: Vec<Work>,
        monitor: Option<Arc<dyn IndexingMonitor>>,
    ) -> Result<()> {
        if works.is_empty() {
            return Ok(());
        }
        tracing::debug!(index = %self.name, backend = self.processor.name(), works = works.len(), "dispatching batch");
        self.processor.apply_work(works, monitor)
    }

    /// Submit one work without a commit (mass indexing)
    pub fn perform_streaming_operation(
        &self,
        work: Work,
        monitor: Option<Arc<dyn IndexingMonitor>>,
    ) -> Result<()> {
        self.processor.apply_streaming_work(work, monitor)
    }

    pub fn accepts_remote_work(&self) -> bool {
        self.processor.accepts_remote_work()
    }

    pub fn index_mapping_changed(&self) {
        self.processor.index_mapping_changed();
    }

    pub fn close(&self) -> Result<()> {
        tracing::info!(index = %self.name, "closing index manager");
        self.processor.close()
    }
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("name", &self.name)
            .field("backend", &self.processor.name())
            .finish()
    }
}

pub struct IndexManagerHolder {
    factory: BackendFactory,
    context: WorkerBuildContext,
    managers: DashMap<String, Arc<IndexManager>>,
}

impl IndexManagerHolder {
    pub fn new(factory: BackendFactory, context: WorkerBuildContext) -> Self {
        Self {
            factory,
            context,
            managers: DashMap::new(),
        }
    }

    pub fn context(&self) -> &WorkerBuildContext {
        &self.context
    }

    /// Build a manager for `index_name` from the global property map and register it
    pub fn build_index_manager(
        &self,
        global: &Properties,
        index_name: &str,
        engine: Arc<dyn IndexEngine>,
    ) -> Result<Arc<IndexManager>> {
        let props = IndexProperties::from_global(global, index_name);
        self.build_with_properties(&props, engine)
    }

    pub fn build_with_properties(
        &self,
        props: &IndexProperties,
        engine: Arc<dyn IndexEngine>,
    ) -> Result<Arc<IndexManager>> {
        if self.managers.contains_key(props.index_name()) {
            return Err(ConfigError::DuplicateIndex(props.index_name().to_string()).into());
        }
        let manager = Arc::new(IndexManager::new(props, engine, &self.context, &self.factory)?);
        self.register(Arc::clone(&manager))?;
        Ok(manager)
    }

    pub fn register(&self, manager: Arc<IndexManager>) -> Result<()> {
        match self.managers.entry(manager.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => {
                Err(ConfigError::DuplicateIndex(e.key().clone()).into())
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(manager);
                Ok(())
            }
        }
    }

    pub fn get(&self, index_name: &str) -> Option<Arc<IndexManager>> {
        self.managers.get(index_name).map(|m| Arc::clone(m.value()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.managers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn remove(&self, index_name: &str) -> Option<Arc<IndexManager>> {
        self.managers.remove(index_name).map(|(_, m)| m)
    }

    /// Close every manager; the first failure is returned after all were tried
    pub fn close_all(&self) -> Result<()> {
        let mut first_error = None;
        for name in self.names() {
            if let Some(manager) = self.remove(&name) {
                if let Err(e) = manager.close() {
                    tracing::error!(index = %name, error = %e, "closing index manager failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
