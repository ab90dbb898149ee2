//! Shared state for every repository of one application.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError, RwLock, Weak,
    },
    time::Duration,
};

use tessera_config::{config::DEFAULT_ID_MAP_KEY, Config, CounterBackend, WorkerConfig};
use tessera_db::{Dialect, MapperFactory, Schema, SqlEngine, SqliteEngine};
use tessera_events::{EventSinkHandle, NullSink, RepositoryEvent};
use tracing::info;

use crate::{
    bootstrap::BootstrapState,
    counter::{CounterStore, MemoryCounterStore},
    error::{RepoError, Result},
    worker::TaskWorker,
};

/// What the context remembers about a live repository.
pub trait RepositoryHandle: Send + Sync {
    fn schema(&self) -> &'static Schema;
}

/// Engine, counter store, worker and the two registries shared by all
/// repositories.
///
/// Registration is only allowed until the startup health check begins.
pub struct RepositoryContext {
    engine: Arc<dyn SqlEngine>,
    counter: Arc<dyn CounterStore>,
    worker: TaskWorker,
    dialect: Dialect,
    mappers: MapperFactory,
    events: EventSinkHandle,
    id_map_key: String,
    entities: RwLock<Vec<&'static Schema>>,
    repositories: RwLock<Vec<Weak<dyn RepositoryHandle>>>,
    frozen: AtomicBool,
    pub(crate) state: Mutex<BootstrapState>,
}

pub struct ContextBuilder {
    engine: Arc<dyn SqlEngine>,
    counter: Option<Arc<dyn CounterStore>>,
    dialect: Dialect,
    events: Option<EventSinkHandle>,
    id_map_key: String,
    queue_capacity: usize,
    thread_name: String,
}

impl ContextBuilder {
    pub fn counter(mut self, counter: Arc<dyn CounterStore>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn events(mut self, events: EventSinkHandle) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id_map_key(mut self, key: impl Into<String>) -> Self {
        self.id_map_key = key.into();
        self
    }

    pub fn worker(mut self, queue_capacity: usize, thread_name: impl Into<String>) -> Self {
        self.queue_capacity = queue_capacity;
        self.thread_name = thread_name.into();
        self
    }

    pub fn build(self) -> Result<Arc<RepositoryContext>> {
        let worker = TaskWorker::start(self.queue_capacity, self.thread_name)?;
        Ok(Arc::new(RepositoryContext {
            engine: self.engine,
            counter: self
                .counter
                .unwrap_or_else(|| Arc::new(MemoryCounterStore::new())),
            worker,
            dialect: self.dialect,
            mappers: MapperFactory::new(self.dialect),
            events: self.events.unwrap_or_else(|| Arc::new(NullSink)),
            id_map_key: self.id_map_key,
            entities: RwLock::new(Vec::new()),
            repositories: RwLock::new(Vec::new()),
            frozen: AtomicBool::new(false),
            state: Mutex::new(BootstrapState::Uninitialized),
        }))
    }
}

impl RepositoryContext {
    pub fn builder(engine: Arc<dyn SqlEngine>) -> ContextBuilder {
        let worker = WorkerConfig::default();
        ContextBuilder {
            engine,
            counter: None,
            dialect: Dialect::default(),
            events: None,
            id_map_key: DEFAULT_ID_MAP_KEY.to_string(),
            queue_capacity: worker.queue_capacity,
            thread_name: worker.thread_name,
        }
    }

    /// Builds the SQLite engine, counter store and worker described by `config`.
    pub fn from_config(config: &Config) -> Result<Arc<Self>> {
        config.validate()?;
        let engine = match &config.database.path {
            Some(path) => SqliteEngine::open(path)?,
            None => SqliteEngine::open_in_memory()?,
        };
        let counter: Arc<dyn CounterStore> = match config.counter.backend {
            CounterBackend::Memory => Arc::new(MemoryCounterStore::new()),
            #[cfg(feature = "redis")]
            CounterBackend::Redis => {
                let url = config.counter.url.as_deref().unwrap_or_default();
                Arc::new(crate::counter::RedisCounterStore::open(url)?)
            }
            #[cfg(not(feature = "redis"))]
            CounterBackend::Redis => {
                return Err(RepoError::Misuse(
                    "redis counter backend needs the `redis` feature".to_string(),
                ))
            }
        };
        Self::builder(Arc::new(engine))
            .counter(counter)
            .dialect(config.dialect)
            .id_map_key(config.id_map_key.clone())
            .worker(config.worker.queue_capacity, config.worker.thread_name.clone())
            .build()
    }

    pub fn engine(&self) -> &Arc<dyn SqlEngine> {
        &self.engine
    }

    pub fn counter(&self) -> &Arc<dyn CounterStore> {
        &self.counter
    }

    pub fn worker(&self) -> &TaskWorker {
        &self.worker
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn mappers(&self) -> &MapperFactory {
        &self.mappers
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.events
    }

    pub fn id_map_key(&self) -> &str {
        &self.id_map_key
    }

    /// Waits for queued background writes, e.g. before shutdown.
    pub fn drain(&self, timeout: Duration) -> bool {
        self.worker.wait_idle(timeout)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Adds a repository and its entity type to the registries.
    pub fn register(&self, handle: Weak<dyn RepositoryHandle>, schema: &'static Schema) -> Result<()> {
        let mut entities = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_frozen() {
            return Err(RepoError::Misuse(format!(
                "cannot register {} after startup began",
                schema.type_name()
            )));
        }
        if !entities.iter().any(|s| s.type_name() == schema.type_name()) {
            entities.push(schema);
        }
        self.repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        drop(entities);

        info!(type_name = schema.type_name(), table = schema.table(), "registered repository");
        self.events.emit(RepositoryEvent::EntityRegistered {
            type_name: schema.type_name().to_string(),
            table: schema.table().to_string(),
        });
        Ok(())
    }

    /// Registered entity types in registration order.
    pub fn entities(&self) -> Vec<&'static Schema> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Repositories that are still alive.
    pub fn repositories(&self) -> Vec<Arc<dyn RepositoryHandle>> {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn freeze(&self) {
        // Taken under the write lock so no registration is half done.
        let _entities = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.frozen.store(true, Ordering::Release);
    }
}
