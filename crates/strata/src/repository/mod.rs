//! Module: repository
//! Responsibility: the execution pipeline. Owns per-call scope
//! (accumulated constraints, criteria session, cache overrides) and
//! guarantees it resets on every terminal path.
//! Does not own: persistence, caching mechanics, or eventing; those
//! arrive as injected collaborators.

mod transaction;
mod write;


pub use write::Target;

use crate::{
    cache::{CacheEngine, FileKeyIndex, MemoryCache, MemoryKeyIndex},
    config::RepositoryConfig,
    criteria::{CriteriaRegistry, CriterionFactory, CriterionInput, StoredCriterion},
    error::{EntityNotFound, Error},
    events::{EntityEvent, NullEventSink, RepositoryEvent},
    query::{QueryAccumulator, WhereClause, WhereHas, WhereIn, WhereNotIn},
    traits::{
        CacheStore, Connection, EventSink, KeyIndex, NullRequestContext, QueryExecutor,
        RequestContext,
    },
    types::{Aggregate, Lifetime, Paged, Value},
};
use serde::{Serialize, de::DeserializeOwned};
use std::rc::Rc;
use tracing::debug;

///
/// Repository
///
/// One repository per model. Fluent mutators stage constraints for
/// exactly one terminal call; the terminal call routes through the
/// cache when eligible and resets the staged scope whether it
/// succeeds or fails.
///

pub struct Repository<X: QueryExecutor> {
    config: RepositoryConfig,
    executor: X,
    accumulator: QueryAccumulator,
    criteria: CriteriaRegistry<X>,
    cache: CacheEngine,
    columns: Vec<String>,
    events: Rc<dyn EventSink>,
    request: Rc<dyn RequestContext>,
    connection: Option<Rc<dyn Connection>>,
}

impl<X: QueryExecutor> Repository<X> {
    /// Start a builder with the two mandatory pieces.
    pub fn builder(config: RepositoryConfig, executor: X) -> RepositoryBuilder<X> {
        RepositoryBuilder {
            config,
            executor,
            store: None,
            index: None,
            events: None,
            request: None,
            connection: None,
        }
    }

    // ------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------

    /// Repository identity, used for cache grouping and event names.
    #[must_use]
    pub fn repository_id(&self) -> String {
        self.config
            .repository_id
            .clone()
            .unwrap_or_else(|| format!("{}Repository", self.config.model))
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    #[must_use]
    pub const fn executor(&self) -> &X {
        &self.executor
    }

    // ------------------------------------------------------------
    // Fluent constraint surface
    // ------------------------------------------------------------

    /// Restrict the columns the next terminal call selects.
    pub fn select(&mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with(&mut self, relations: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.accumulator.with(relations);
        self
    }

    pub fn where_(
        &mut self,
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.accumulator.where_(attribute, operator, value);
        self
    }

    pub fn or_where(
        &mut self,
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.accumulator.or_where(attribute, operator, value);
        self
    }

    pub fn where_clause(&mut self, clause: WhereClause) -> &mut Self {
        self.accumulator.where_clause(clause);
        self
    }

    pub fn where_in(
        &mut self,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        self.accumulator.where_in(attribute, values);
        self
    }

    pub fn where_not_in(
        &mut self,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        self.accumulator.where_not_in(attribute, values);
        self
    }

    pub fn where_has(
        &mut self,
        relation: impl Into<String>,
        constraints: Vec<WhereClause>,
    ) -> &mut Self {
        self.accumulator.where_has(relation, constraints);
        self
    }

    pub fn where_has_clause(&mut self, clause: WhereHas) -> &mut Self {
        self.accumulator.where_has_clause(clause);
        self
    }

    pub fn scope(
        &mut self,
        name: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        self.accumulator.scope(name, args);
        self
    }

    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.accumulator.offset(offset);
        self
    }

    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.accumulator.limit(limit);
        self
    }

    pub fn order_by(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.accumulator.order_by(attribute);
        self
    }

    pub fn order_by_desc(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.accumulator.order_by_desc(attribute);
        self
    }

    pub fn group_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.accumulator.group_by(column);
        self
    }

    pub fn having(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.accumulator.having(column, operator, value);
        self
    }

    pub fn or_having(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.accumulator.or_having(column, operator, value);
        self
    }

    // ------------------------------------------------------------
    // Criteria surface
    // ------------------------------------------------------------

    pub fn push_criterion(&mut self, input: impl Into<CriterionInput<X>>) -> Result<&mut Self, Error> {
        self.criteria.push(input)?;

        Ok(self)
    }

    pub fn push_criteria(
        &mut self,
        inputs: impl IntoIterator<Item = CriterionInput<X>>,
    ) -> Result<&mut Self, Error> {
        for input in inputs {
            self.criteria.push(input)?;
        }

        Ok(self)
    }

    pub fn remove_criterion(&mut self, input: impl Into<CriterionInput<X>>) -> Result<&mut Self, Error> {
        self.criteria.remove(input)?;

        Ok(self)
    }

    pub fn remove_criteria(
        &mut self,
        inputs: impl IntoIterator<Item = CriterionInput<X>>,
    ) -> Result<&mut Self, Error> {
        for input in inputs {
            self.criteria.remove(input)?;
        }

        Ok(self)
    }

    pub fn set_default_criteria(
        &mut self,
        inputs: impl IntoIterator<Item = CriterionInput<X>>,
    ) -> Result<&mut Self, Error> {
        self.criteria.set_defaults(inputs)?;

        Ok(self)
    }

    pub fn has_criterion(&self, input: &CriterionInput<X>) -> Result<bool, Error> {
        self.criteria.has(input)
    }

    pub fn get_criterion(
        &self,
        input: &CriterionInput<X>,
    ) -> Result<Option<StoredCriterion<X>>, Error> {
        self.criteria.get(input)
    }

    pub fn skip_criteria(&mut self, flag: bool) -> &mut Self {
        self.criteria.skip(flag);
        self
    }

    pub fn skip_default_criteria(&mut self, flag: bool) -> &mut Self {
        self.criteria.skip_defaults(flag);
        self
    }

    pub fn flush_criteria(&mut self) -> &mut Self {
        self.criteria.flush();
        self
    }

    pub fn register_criterion_factory(
        &mut self,
        name: impl Into<String>,
        factory: CriterionFactory<X>,
    ) -> &mut Self {
        self.criteria.register_factory(name, factory);
        self
    }

    #[must_use]
    pub const fn criteria(&self) -> &CriteriaRegistry<X> {
        &self.criteria
    }

    // ------------------------------------------------------------
    // Cache surface
    // ------------------------------------------------------------

    /// Override the cache lifetime for the next terminal call only.
    pub fn cache_lifetime(&mut self, lifetime: Lifetime) -> &mut Self {
        self.cache.set_lifetime(lifetime);
        self
    }

    /// Override the cache driver for the next terminal call only.
    pub fn cache_driver(&mut self, driver: impl Into<String>) -> &mut Self {
        self.cache.set_driver(driver);
        self
    }

    pub fn enable_cache_clear(&mut self, enabled: bool) -> &mut Self {
        self.cache.set_clear_enabled(enabled);
        self
    }

    #[must_use]
    pub const fn is_cache_clear_enabled(&self) -> bool {
        self.cache.is_clear_enabled()
    }

    /// Flush every cached result for this repository. Fires the
    /// cache-flushed event when a flush actually ran; with a disabled
    /// lifetime nothing was cached and nothing fires.
    pub fn forget_cache(&self) -> bool {
        let flushed = self.cache.forget(&self.repository_id());
        if flushed {
            self.dispatch(EntityEvent::CacheFlushed, None);
        }

        flushed
    }

    // ------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------

    pub fn find(&mut self, id: impl Into<Value>) -> Result<Option<X::Entity>, Error> {
        let id = id.into();
        self.execute_cached("find", vec![id.clone()], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.find(query, &id, &repo.columns)
        })
    }

    pub fn find_or_fail(&mut self, id: impl Into<Value>) -> Result<X::Entity, Error> {
        let id = id.into();
        self.find(id.clone())?.ok_or_else(|| {
            EntityNotFound::new(&self.config.model, display_id(&id)).into()
        })
    }

    pub fn find_many(
        &mut self,
        ids: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Vec<X::Entity>, Error> {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        self.execute_cached("find_many", vec![Value::Array(ids.clone())], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.find_many(query, &ids, &repo.columns)
        })
    }

    /// Like [`find_many`](Self::find_many), but every unique id must
    /// resolve; any shortfall fails the call, reporting the requested
    /// id set.
    pub fn find_many_or_fail(
        &mut self,
        ids: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Vec<X::Entity>, Error> {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        let mut unique: Vec<Value> = Vec::new();
        for id in &ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }

        let found = self.find_many(ids)?;
        if found.len() == unique.len() {
            return Ok(found);
        }

        let requested = unique.iter().map(display_id).collect::<Vec<_>>().join(", ");

        Err(EntityNotFound::new(&self.config.model, requested).into())
    }

    /// First entity where `attribute` equals `value`.
    pub fn find_by(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<X::Entity>, Error> {
        self.accumulator
            .where_clause(WhereClause::eq(attribute, value));
        self.find_first()
    }

    pub fn find_first(&mut self) -> Result<Option<X::Entity>, Error> {
        self.execute_cached("find_first", vec![], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.first(query, &repo.columns)
        })
    }

    pub fn find_all(&mut self) -> Result<Vec<X::Entity>, Error> {
        self.execute_cached("find_all", vec![], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.get(query, &repo.columns)
        })
    }

    pub fn find_where(&mut self, clauses: Vec<WhereClause>) -> Result<Vec<X::Entity>, Error> {
        for clause in clauses {
            self.accumulator.where_clause(clause);
        }
        self.find_all()
    }

    pub fn find_where_in(&mut self, clause: WhereIn) -> Result<Vec<X::Entity>, Error> {
        self.accumulator.where_in_clause(clause);
        self.find_all()
    }

    pub fn find_where_not_in(&mut self, clause: WhereNotIn) -> Result<Vec<X::Entity>, Error> {
        self.accumulator.where_not_in_clause(clause);
        self.find_all()
    }

    pub fn find_where_has(&mut self, clause: WhereHas) -> Result<Vec<X::Entity>, Error> {
        self.accumulator.where_has_clause(clause);
        self.find_all()
    }

    /// Paginate with a full total count. A `None` page falls back to
    /// the request context's current page, then to 1.
    pub fn paginate(
        &mut self,
        per_page: u32,
        page: Option<u32>,
    ) -> Result<Paged<X::Entity>, Error> {
        let page = self.resolve_page(page);
        self.execute_cached("paginate", vec![per_page.into(), page.into()], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.paginate(query, per_page, page, &repo.columns)
        })
    }

    /// Paginate without the total count.
    pub fn simple_paginate(
        &mut self,
        per_page: u32,
        page: Option<u32>,
    ) -> Result<Paged<X::Entity>, Error> {
        let page = self.resolve_page(page);
        self.execute_cached(
            "simple_paginate",
            vec![per_page.into(), page.into()],
            |repo| {
                let query = repo.prepared_query()?;
                repo.executor
                    .simple_paginate(query, per_page, page, &repo.columns)
            },
        )
    }

    pub fn count(&mut self) -> Result<u64, Error> {
        self.execute_cached("count", vec![], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.count(query)
        })
    }

    pub fn min(&mut self, attribute: &str) -> Result<Option<Value>, Error> {
        self.aggregate(Aggregate::Min, attribute)
    }

    pub fn max(&mut self, attribute: &str) -> Result<Option<Value>, Error> {
        self.aggregate(Aggregate::Max, attribute)
    }

    pub fn avg(&mut self, attribute: &str) -> Result<Option<Value>, Error> {
        self.aggregate(Aggregate::Avg, attribute)
    }

    pub fn sum(&mut self, attribute: &str) -> Result<Option<Value>, Error> {
        self.aggregate(Aggregate::Sum, attribute)
    }

    fn aggregate(&mut self, aggregate: Aggregate, attribute: &str) -> Result<Option<Value>, Error> {
        let method = aggregate.to_string();
        let attribute = attribute.to_string();
        self.execute_cached(&method, vec![attribute.clone().into()], |repo| {
            let query = repo.prepared_query()?;
            repo.executor.aggregate(query, aggregate, &attribute)
        })
    }

    // ------------------------------------------------------------
    // Pipeline internals
    // ------------------------------------------------------------

    /// A fresh backend query with the accumulated constraints folded
    /// in their fixed order, then the effective criteria as the final
    /// step.
    pub fn prepared_query(&self) -> Result<X::Query, Error> {
        let query = self.executor.new_query()?;
        let query = self.accumulator.prepare(&self.executor, query)?;

        self.criteria.apply(query, self)
    }

    /// Run one terminal read. Cache-eligible calls hash their scope
    /// and go through the remember cycle; everything resets after,
    /// on the error path too.
    fn execute_cached<T, F>(&mut self, method: &str, args: Vec<Value>, compute: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&Self) -> Result<T, Error>,
    {
        let result = self.execute_inner(method, args, compute);
        self.reset_scope();

        result
    }

    fn execute_inner<T, F>(&self, method: &str, args: Vec<Value>, compute: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&Self) -> Result<T, Error>,
    {
        if !self.cache.is_cacheable(method, &*self.request) {
            return compute(self);
        }

        let repository_id = self.repository_id();
        let hash = self.cache_hash(args)?;

        if let Some(hit) = self.cache.lookup(&repository_id, method, &hash) {
            debug!(%repository_id, method, "cache hit");
            return serde_json::from_value(hit).map_err(|err| Error::backend(err.to_string()));
        }
        debug!(%repository_id, method, "cache miss");

        let value = compute(self)?;
        let raw =
            serde_json::to_value(&value).map_err(|err| Error::backend(err.to_string()))?;
        self.cache.put(&repository_id, method, &hash, raw);

        Ok(value)
    }

    /// The full part list behind one cache key: call arguments, then
    /// repository identity, model, driver and lifetime, then the
    /// hashed slice of accumulated state.
    fn cache_hash(&self, mut parts: Vec<Value>) -> Result<String, Error> {
        let encode = |value: Result<Value, serde_json::Error>| {
            value.map_err(|err| Error::backend(err.to_string()))
        };

        parts.push(encode(serde_json::to_value(&self.columns))?);
        parts.push(Value::String(self.repository_id()));
        parts.push(Value::String(self.config.model.clone()));
        parts.push(
            self.cache
                .active_driver()
                .map_or(Value::Null, |driver| Value::String(driver.to_string())),
        );
        parts.push(encode(serde_json::to_value(self.cache.active_lifetime()))?);
        parts.extend(self.accumulator.hash_fields()?);

        CacheEngine::hash(parts)
    }

    /// Clear everything scoped to one terminal call: accumulated
    /// constraints, column selection, session criteria (unless the
    /// skip guard holds them) and cache overrides.
    fn reset_scope(&mut self) {
        self.accumulator.reset();
        self.columns.clear();
        self.criteria.flush();
        self.cache.reset_overrides();
    }

    fn resolve_page(&self, page: Option<u32>) -> u32 {
        page.or_else(|| self.request.current_page("page")).unwrap_or(1)
    }

    pub(crate) fn dispatch(&self, event: EntityEvent, entity: Option<&X::Entity>) {
        let payload = entity.and_then(|entity| serde_json::to_value(entity).ok());
        self.events
            .dispatch(&RepositoryEvent::new(&self.repository_id(), event, payload));
    }
}

fn display_id(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

///
/// RepositoryBuilder
///
/// Collaborators default to in-process implementations; the key index
/// honors a configured keys file.
///

pub struct RepositoryBuilder<X: QueryExecutor> {
    config: RepositoryConfig,
    executor: X,
    store: Option<Rc<dyn CacheStore>>,
    index: Option<Rc<dyn KeyIndex>>,
    events: Option<Rc<dyn EventSink>>,
    request: Option<Rc<dyn RequestContext>>,
    connection: Option<Rc<dyn Connection>>,
}

impl<X: QueryExecutor> RepositoryBuilder<X> {
    #[must_use]
    pub fn cache_store(mut self, store: Rc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn key_index(mut self, index: Rc<dyn KeyIndex>) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Rc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn request(mut self, request: Rc<dyn RequestContext>) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn connection(mut self, connection: Rc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    #[must_use]
    pub fn build(self) -> Repository<X> {
        let store = self.store.unwrap_or_else(|| Rc::new(MemoryCache::new()));
        let index = self.index.unwrap_or_else(|| {
            self.config.cache.keys_file.as_ref().map_or_else(
                || Rc::new(MemoryKeyIndex::new()) as Rc<dyn KeyIndex>,
                |path| Rc::new(FileKeyIndex::new(path)) as Rc<dyn KeyIndex>,
            )
        });
        let cache = CacheEngine::new(self.config.cache.clone(), store, index);

        Repository {
            config: self.config,
            executor: self.executor,
            accumulator: QueryAccumulator::new(),
            criteria: CriteriaRegistry::new(),
            cache,
            columns: Vec::new(),
            events: self.events.unwrap_or_else(|| Rc::new(NullEventSink)),
            request: self
                .request
                .unwrap_or_else(|| Rc::new(NullRequestContext)),
            connection: self.connection,
        }
    }
}
