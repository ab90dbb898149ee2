//! Domain-object assembly.
//!
//! A domain object pairs a "main" entity with the list of "with" entities
//! linked to it, either directly (`with.main_property` holds the main id) or
//! through a "relative" link entity carrying both `main_property` and
//! `with_property`.
//!
//! Main ids come from the caller or from the main query. Link values are
//! compared by their text form, so an integer id matches the same id stored
//! as text.

use std::collections::HashSet;

use tessera_db::{
    value_text, Criteria, DbError, Element, Entity, InCondition, Record, Schema, Value,
};
use tracing::debug;

use crate::{
    error::{RepoError, Result},
    repository::Repository,
};

/// One main entity and its linked "with" entities.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainObject<T, W> {
    /// Main ids were supplied by the caller; the main entity was not loaded.
    Known { main_id: Value, with_list: Vec<W> },
    /// Main entities came from the main query.
    Loaded { main: T, with_list: Vec<W> },
}

impl<T: Entity, W> DomainObject<T, W> {
    pub fn main_id(&self) -> Option<Value> {
        match self {
            DomainObject::Known { main_id, .. } => Some(main_id.clone()),
            DomainObject::Loaded { main, .. } => main.key_value(),
        }
    }

    pub fn main(&self) -> Option<&T> {
        match self {
            DomainObject::Known { .. } => None,
            DomainObject::Loaded { main, .. } => Some(main),
        }
    }

    pub fn with_list(&self) -> &[W] {
        match self {
            DomainObject::Known { with_list, .. } | DomainObject::Loaded { with_list, .. } => {
                with_list
            }
        }
    }
}

/// Describes a domain-object query.
#[derive(Debug, Clone, Default)]
pub struct DomainObjectCriteria {
    /// Main query, used when no main ids are known.
    pub criteria: Criteria,
    /// Property on the relative (or with) entity that references main.
    pub main_property: String,
    /// Property on the relative entity that references with.
    pub with_property: Option<String>,
    pub relative: Option<&'static Schema>,
    pub known_main_ids: Vec<Value>,
}

impl DomainObjectCriteria {
    pub fn new(main_property: impl Into<String>) -> Self {
        Self {
            main_property: main_property.into(),
            ..Self::default()
        }
    }

    pub fn criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn known_main_ids<V, I>(mut self, ids: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.known_main_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Links main to with through entity `R`.
    pub fn relative<R: Entity>(mut self, with_property: impl Into<String>) -> Self {
        self.relative = Some(R::schema());
        self.with_property = Some(with_property.into());
        self
    }
}

/// Where the link values live, resolved before any query runs.
enum Link {
    Direct {
        with_main: Element,
    },
    Relative {
        schema: &'static Schema,
        rel_main: Element,
        rel_with: Element,
        with_key: Element,
    },
}

fn assembly(err: DbError) -> RepoError {
    RepoError::Assembly(err.to_string())
}

fn resolve_link<W: Entity>(criteria: &DomainObjectCriteria) -> Result<Link> {
    let with_schema = W::schema();
    match criteria.relative {
        None => Ok(Link::Direct {
            with_main: with_schema.require(&criteria.main_property).map_err(assembly)?.clone(),
        }),
        Some(schema) => {
            let with_property = criteria.with_property.as_deref().ok_or_else(|| {
                RepoError::Assembly(format!("no with property set for {}", schema.type_name()))
            })?;
            Ok(Link::Relative {
                schema,
                rel_main: schema.require(&criteria.main_property).map_err(assembly)?.clone(),
                rel_with: schema.require(with_property).map_err(assembly)?.clone(),
                with_key: with_schema.require_key().map_err(assembly)?.clone(),
            })
        }
    }
}

fn link_text(element: &Element, record: &Record) -> String {
    value_text(element.get(record).unwrap_or(&Value::Null))
}

/// Keeps the first occurrence of each id by text form.
fn distinct(ids: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(value_text(id)))
        .collect()
}

impl<T: Entity> Repository<T> {
    /// Loads main entities (or takes the known ids) with their linked
    /// "with" entities, one domain object per distinct main id.
    pub fn list_domain_objects<W: Entity>(
        &self,
        criteria: &DomainObjectCriteria,
    ) -> Result<Vec<DomainObject<T, W>>> {
        if criteria.criteria.is_result_mapped() {
            return Err(RepoError::Misuse(
                "domain objects need an entity criteria for the main query".to_string(),
            ));
        }
        let link = resolve_link::<W>(criteria)?;
        let known = !criteria.known_main_ids.is_empty();

        let (main_ids, mains) = if known {
            (distinct(criteria.known_main_ids.iter().cloned()), None)
        } else {
            let main_key = T::schema().require_key().map_err(assembly)?;
            let mains = self.list_criteria(&criteria.criteria)?;
            let ids = mains
                .iter()
                .map(|m| m.to_record().remove(main_key.column).unwrap_or(Value::Null))
                .collect();
            (ids, Some(mains))
        };
        if main_ids.is_empty() {
            return Ok(Vec::new());
        }

        let engine = self.engine();
        let (withs, links) = match &link {
            Link::Direct { with_main } => {
                let withs =
                    engine.in_list(W::schema(), &InCondition::new(with_main.property, main_ids.clone()))?;
                (withs, Vec::new())
            }
            Link::Relative {
                schema,
                rel_main,
                rel_with,
                with_key,
            } => {
                let relatives =
                    engine.in_list(schema, &InCondition::new(rel_main.property, main_ids.clone()))?;
                let links: Vec<(String, String)> = relatives
                    .iter()
                    .map(|r| (link_text(rel_main, r), link_text(rel_with, r)))
                    .collect();
                let with_ids = distinct(relatives.iter().filter_map(|r| rel_with.get(r).cloned()));
                let withs = if with_ids.is_empty() {
                    Vec::new()
                } else {
                    engine.in_list(W::schema(), &InCondition::new(with_key.property, with_ids))?
                };
                (withs, links)
            }
        };
        debug!(
            main = T::schema().type_name(),
            with = W::schema().type_name(),
            mains = main_ids.len(),
            withs = withs.len(),
            "assembling domain objects"
        );

        let withs: Vec<(Record, W)> = withs
            .into_iter()
            .map(|record| W::from_record(&record).map(|w| (record, w)))
            .collect::<std::result::Result<_, _>>()
            .map_err(assembly)?;

        let with_list_for = |main_id: &Value| -> Vec<W> {
            let id = value_text(main_id);
            match &link {
                Link::Direct { with_main } => withs
                    .iter()
                    .filter(|(record, _)| link_text(with_main, record) == id)
                    .map(|(_, w)| w.clone())
                    .collect(),
                Link::Relative { with_key, .. } => {
                    let linked: HashSet<&str> = links
                        .iter()
                        .filter(|(main, _)| *main == id)
                        .map(|(_, with)| with.as_str())
                        .collect();
                    withs
                        .iter()
                        .filter(|(record, _)| linked.contains(link_text(with_key, record).as_str()))
                        .map(|(_, w)| w.clone())
                        .collect()
                }
            }
        };

        Ok(match mains {
            None => main_ids
                .into_iter()
                .map(|main_id| DomainObject::Known {
                    with_list: with_list_for(&main_id),
                    main_id,
                })
                .collect(),
            Some(mains) => mains
                .into_iter()
                .zip(main_ids.iter())
                .map(|(main, main_id)| DomainObject::Loaded {
                    with_list: with_list_for(main_id),
                    main,
                })
                .collect(),
        })
    }
}
