//! Typed repositories over a shared SQL engine.
//!
//! A [`RepositoryContext`] holds the engine, the id counter store and the
//! background worker. Every [`Repository`] registers itself with the context;
//! [`HealthChecker::on_started`] then prepares tables and id rows once, and
//! [`Repository::list_domain_objects`] joins main entities with their linked
//! entities in memory.

pub mod bootstrap;
pub mod context;
pub mod counter;
pub mod domain;
pub mod error;
pub mod id_generator;
pub mod logging;
pub mod repository;
mod safety;
pub mod worker;

pub use bootstrap::{BootstrapReport, BootstrapState, HealthChecker};
pub use context::{ContextBuilder, RepositoryContext, RepositoryHandle};
pub use counter::{CounterStore, MemoryCounterStore};
pub use domain::{DomainObject, DomainObjectCriteria};
pub use error::{BootstrapError, CounterError, RepoError, Result};
pub use id_generator::IdGenerator;
pub use repository::Repository;
pub use worker::TaskWorker;

#[cfg(feature = "redis")]
pub use counter::RedisCounterStore;
