//! Typed repository over the shared SQL engine.

use std::{marker::PhantomData, sync::Arc};

use tessera_db::{
    Criteria, Direction, Entity, InCondition, Page, Record, ReduceCondition, RefreshCondition,
    Schema, SqlEngine, Value,
};
use tracing::debug;

use crate::{
    context::{RepositoryContext, RepositoryHandle},
    error::{RepoError, Result},
    id_generator, safety,
};

/// CRUD and query operations for one entity type.
///
/// Construct with [`Repository::new`]; the repository registers itself with
/// the context so the startup health check can see its entity.
pub struct Repository<T: Entity> {
    ctx: Arc<RepositoryContext>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> RepositoryHandle for Repository<T> {
    fn schema(&self) -> &'static Schema {
        T::schema()
    }
}

fn decode_all<T: Entity>(records: Vec<Record>) -> Result<Vec<T>> {
    records
        .iter()
        .map(|r| T::from_record(r).map_err(RepoError::from))
        .collect()
}

fn reject_result_mapped(criteria: &Criteria, operation: &str) -> Result<()> {
    if criteria.is_result_mapped() {
        return Err(RepoError::Misuse(format!(
            "{operation} does not accept a result-mapped criteria, use {operation}_mapped"
        )));
    }
    Ok(())
}

fn require_result_mapped(criteria: &Criteria, operation: &str) -> Result<()> {
    if !criteria.is_result_mapped() {
        return Err(RepoError::Misuse(format!(
            "{operation} needs a result-mapped criteria"
        )));
    }
    Ok(())
}

impl<T: Entity> Repository<T> {
    pub fn new(ctx: &Arc<RepositoryContext>) -> Result<Arc<Self>> {
        let repository = Arc::new(Self {
            ctx: ctx.clone(),
            _entity: PhantomData,
        });
        let handle = Arc::downgrade(&repository);
        ctx.register(handle, T::schema())?;
        Ok(repository)
    }

    pub fn context(&self) -> &Arc<RepositoryContext> {
        &self.ctx
    }

    pub(crate) fn engine(&self) -> &dyn SqlEngine {
        self.ctx.engine().as_ref()
    }

    /// Next id for `T`. The counter store answers synchronously; the new
    /// maximum is persisted in the background.
    pub fn create_id(&self) -> Result<i64> {
        let name = T::schema().type_name();
        let id = self.ctx.counter().hincr_by(self.ctx.id_map_key(), name, 1)?;
        if id <= 0 {
            return Err(RepoError::Persistence(
                "UNEXPECTED EXCEPTION WHILE CREATING ID".to_string(),
            ));
        }
        debug!(type_name = name, id, "created id");

        let engine = self.ctx.engine().clone();
        let events = self.ctx.events().clone();
        self.ctx.worker().submit(move || {
            id_generator::persist_max_id(engine.as_ref(), events.as_ref(), name, id)
        });
        Ok(id)
    }

    /// Inserts `obj` and returns its key.
    pub fn create(&self, obj: &T) -> Result<Value> {
        Ok(self.engine().create(T::schema(), &obj.to_record())?)
    }

    pub fn create_batch(&self, list: &[T]) -> Result<bool> {
        if list.is_empty() {
            return Ok(true);
        }
        let records: Vec<Record> = list.iter().map(Entity::to_record).collect();
        Ok(self.engine().create_batch(T::schema(), &records)?)
    }

    /// Updates `obj` by its key. Fails unless the key is set.
    pub fn refresh(&self, obj: &T) -> Result<bool> {
        let record = obj.to_record();
        safety::check_refresh(T::schema(), &record)?;
        Ok(self.engine().refresh(T::schema(), &record)?)
    }

    /// Conditional update. Fails unless the target or a clause pins the key.
    pub fn refresh_condition(&self, condition: &RefreshCondition<T>) -> Result<bool> {
        let refresh = condition.to_refresh();
        safety::check_refresh_condition(T::schema(), &refresh)?;
        Ok(self.engine().refresh_condition(T::schema(), &refresh)?)
    }

    /// Conditional update without the key check.
    pub fn refresh_unsafe(&self, condition: &RefreshCondition<T>) -> Result<bool> {
        Ok(self
            .engine()
            .refresh_condition(T::schema(), &condition.to_refresh())?)
    }

    pub fn remove(&self, obj: &T) -> Result<bool> {
        Ok(self.engine().remove(T::schema(), &obj.to_record())?)
    }

    pub fn get(&self, id: impl Into<Value>) -> Result<Option<T>> {
        self.engine()
            .get(T::schema(), &id.into())?
            .map(|record| T::from_record(&record))
            .transpose()
            .map_err(RepoError::from)
    }

    pub fn list(&self) -> Result<Vec<T>> {
        decode_all(self.engine().list(T::schema(), None)?)
    }

    /// Rows matching every set field of `example`.
    pub fn list_example(&self, example: &T) -> Result<Vec<T>> {
        decode_all(self.engine().list(T::schema(), Some(&example.to_record()))?)
    }

    pub fn get_one(
        &self,
        example: &T,
        order_by: Option<&str>,
        direction: Direction,
    ) -> Result<Option<T>> {
        self.engine()
            .get_one(T::schema(), &example.to_record(), order_by, direction)?
            .map(|record| T::from_record(&record))
            .transpose()
            .map_err(RepoError::from)
    }

    pub fn reduce(&self, condition: &ReduceCondition) -> Result<Value> {
        Ok(self.engine().reduce(T::schema(), condition)?)
    }

    /// Rows whose property is in the list. An empty list returns nothing
    /// without querying.
    pub fn in_(&self, condition: &InCondition) -> Result<Vec<T>> {
        if condition.is_empty() {
            return Ok(Vec::new());
        }
        decode_all(self.engine().in_list(T::schema(), condition)?)
    }

    pub fn find(&self, criteria: &Criteria) -> Result<Page<T>> {
        reject_result_mapped(criteria, "find")?;
        self.engine()
            .find(T::schema(), criteria)?
            .try_map(|record| T::from_record(&record))
            .map_err(RepoError::from)
    }

    pub fn find_mapped(&self, criteria: &Criteria) -> Result<Page<Record>> {
        require_result_mapped(criteria, "find_mapped")?;
        Ok(self.engine().find(T::schema(), criteria)?)
    }

    pub fn list_criteria(&self, criteria: &Criteria) -> Result<Vec<T>> {
        reject_result_mapped(criteria, "list_criteria")?;
        decode_all(self.engine().list_criteria(T::schema(), criteria)?)
    }

    pub fn list_mapped(&self, criteria: &Criteria) -> Result<Vec<Record>> {
        require_result_mapped(criteria, "list_mapped")?;
        Ok(self.engine().list_criteria(T::schema(), criteria)?)
    }

    pub fn refresh_cache(&self) {
        self.engine().refresh_cache(T::schema());
    }
}
