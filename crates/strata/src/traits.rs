//! Collaborator contracts consumed by the execution pipeline.
//!
//! Every dependency is injected at construction time; there is no
//! service locator. The pipeline itself never inspects entity internals
//! beyond what `Entity` exposes, and never generates queries beyond
//! folding typed [`Constraint`](crate::query::Constraint)s over the
//! executor's opaque query value.

use crate::{
    error::{Error, RepositoryError},
    events::RepositoryEvent,
    query::Constraint,
    types::{Aggregate, AttributeMap, Lifetime, Paged, Value},
};
use serde::{Serialize, de::DeserializeOwned};

///
/// QueryExecutor
///
/// The ORM-facing contract: resolves model handles, applies typed
/// constraints to an opaque query value, and runs terminal operations.
/// Scope names dispatch through a closed match inside `apply`; unknown
/// names are an error, never a dynamic forward.
///

pub trait QueryExecutor {
    type Query;
    type Entity: Entity;

    /// Build a fresh query for the configured model.
    ///
    /// Misconfiguration (unknown model, wrong base contract) is fatal.
    fn new_query(&self) -> Result<Self::Query, RepositoryError>;

    /// Instantiate a blank entity handle for the configured model.
    fn new_entity(&self) -> Result<Self::Entity, RepositoryError>;

    /// Fold one constraint into the query.
    fn apply(&self, query: Self::Query, constraint: &Constraint) -> Result<Self::Query, Error>;

    fn find(
        &self,
        query: Self::Query,
        id: &Value,
        columns: &[String],
    ) -> Result<Option<Self::Entity>, Error>;

    fn find_many(
        &self,
        query: Self::Query,
        ids: &[Value],
        columns: &[String],
    ) -> Result<Vec<Self::Entity>, Error>;

    fn first(
        &self,
        query: Self::Query,
        columns: &[String],
    ) -> Result<Option<Self::Entity>, Error>;

    fn get(&self, query: Self::Query, columns: &[String]) -> Result<Vec<Self::Entity>, Error>;

    fn count(&self, query: Self::Query) -> Result<u64, Error>;

    fn aggregate(
        &self,
        query: Self::Query,
        aggregate: Aggregate,
        attribute: &str,
    ) -> Result<Option<Value>, Error>;

    fn paginate(
        &self,
        query: Self::Query,
        per_page: u32,
        page: u32,
        columns: &[String],
    ) -> Result<Paged<Self::Entity>, Error>;

    /// Paginate without a total count. The default routes through
    /// `paginate` and drops the total; backends with a cheaper path
    /// should override.
    fn simple_paginate(
        &self,
        query: Self::Query,
        per_page: u32,
        page: u32,
        columns: &[String],
    ) -> Result<Paged<Self::Entity>, Error> {
        let mut page = self.paginate(query, per_page, page, columns)?;
        page.total = None;
        Ok(page)
    }
}

///
/// Entity
///
/// Opaque handle to one persisted record, owned by the executor's
/// backend. Serialization bounds exist so results can round-trip
/// through the cache store.
///

pub trait Entity: Serialize + DeserializeOwned + Clone {
    /// Attribute names that `fill` may write.
    fn fillable(&self) -> &[String];

    /// Assign attributes, restricted to the fillable set.
    fn fill(&mut self, attributes: &AttributeMap);

    /// Attributes changed since the entity was loaded or last saved.
    fn dirty(&self) -> AttributeMap;

    fn save(&mut self) -> Result<bool, Error>;

    fn delete(&mut self) -> Result<bool, Error>;

    /// Undo a soft delete.
    fn restore(&mut self) -> Result<bool, Error>;

    /// Whether `name` is a relation accessor on this entity.
    fn is_relation(&self, name: &str) -> bool;

    /// Replace relation membership, detaching members missing from
    /// `values` when `detach` is set.
    fn sync_relation(&mut self, name: &str, values: &Value, detach: bool) -> Result<(), Error>;
}

///
/// CacheStore
///
/// Key/value store with optional tag-grouping. The `tag_*` defaults
/// make tags transparent for stores that report support but share one
/// namespace; the engine only calls them when `supports_tags` is true.
///

pub trait CacheStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn put(&self, key: &str, value: Value, lifetime: Lifetime);

    fn forget(&self, key: &str);

    fn supports_tags(&self) -> bool {
        false
    }

    fn tag_get(&self, _tag: &str, key: &str) -> Option<Value> {
        self.get(key)
    }

    fn tag_put(&self, _tag: &str, key: &str, value: Value, lifetime: Lifetime) {
        self.put(key, value, lifetime);
    }

    /// Drop every entry stored under `tag` in one operation.
    fn flush_tag(&self, _tag: &str) {}

    /// Switch the active backend driver for subsequent calls.
    fn set_default_driver(&self, _name: &str) {}
}

///
/// KeyIndex
///
/// Manual-tagging fallback: a persisted map from repository identity to
/// the `method.hash` entries written for it. Concurrent writers are the
/// embedder's problem; the contract is read-modify-write.
///

pub trait KeyIndex {
    fn get(&self, repository_id: &str) -> Vec<String>;

    /// Record one entry, deduplicated.
    fn append(&self, repository_id: &str, entry: &str);

    /// Remove and return every entry for one repository, leaving other
    /// repositories untouched.
    fn clear(&self, repository_id: &str) -> Vec<String>;
}

///
/// EventSink
///
/// Fire-and-forget lifecycle notifications. The pipeline never observes
/// a return value.
///

pub trait EventSink {
    fn dispatch(&self, event: &RepositoryEvent);
}

///
/// RequestContext
///
/// Caller-scoped context: skip-cache detection and current-page
/// resolution for pagination.
///

pub trait RequestContext {
    fn has(&self, flag: &str) -> bool;

    fn current_page(&self, _page_name: &str) -> Option<u32> {
        None
    }
}

///
/// NullRequestContext
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NullRequestContext;

impl RequestContext for NullRequestContext {
    fn has(&self, _flag: &str) -> bool {
        false
    }
}

///
/// Connection
///
/// Transactional connection contract. Nesting semantics are whatever
/// the backend provides.
///

pub trait Connection {
    fn begin_transaction(&self) -> Result<(), Error>;

    fn commit(&self) -> Result<(), Error>;

    fn roll_back(&self) -> Result<(), Error>;
}
