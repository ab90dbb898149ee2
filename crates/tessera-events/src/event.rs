/// All event types emitted by repositories and the startup health check.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEvent {
    /// A repository was constructed for an entity type.
    EntityRegistered { type_name: String, table: String },
    /// Startup looked at an entity's table.
    TableChecked {
        type_name: String,
        stage: TableStage,
    },
    /// A fresh `idGenerator` row was written for an entity.
    IdRowInitialised { type_name: String },
    /// The counter store was raised to the persisted max id.
    CounterReconciled {
        type_name: String,
        max_id: i64,
        counter: i64,
    },
    /// The background write of a generated id failed and was dropped.
    IdPersistFailed {
        type_name: String,
        id: i64,
        error: String,
    },
    /// Startup finished.
    BootstrapFinished { degraded: bool, failures: usize },
}

/// Outcome of the table step for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum TableStage {
    /// CREATE TABLE was executed.
    Created,
    /// The dialect does not create tables.
    Skipped,
    Failed(String),
}

impl RepositoryEvent {
    /// Entity type the event is about, if any.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            RepositoryEvent::EntityRegistered { type_name, .. }
            | RepositoryEvent::TableChecked { type_name, .. }
            | RepositoryEvent::IdRowInitialised { type_name }
            | RepositoryEvent::CounterReconciled { type_name, .. }
            | RepositoryEvent::IdPersistFailed { type_name, .. } => Some(type_name),
            RepositoryEvent::BootstrapFinished { .. } => None,
        }
    }
}
