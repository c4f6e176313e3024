//! Shared mock backend for pipeline tests.
//!
//! `MockExecutor` is a tiny in-process store that understands just
//! enough of the constraint vocabulary to make ordering, caching and
//! write-path assertions meaningful.

use crate::{
    criteria::Criterion,
    error::{Error, RepositoryError},
    events::RepositoryEvent,
    query::{Constraint, OrderBy, WhereClause, WhereIn, WhereNotIn},
    repository::Repository,
    traits::{Connection, Entity, EventSink, QueryExecutor, RequestContext},
    types::{Aggregate, AttributeMap, OrderDirection, Paged, Value},
};
use serde::{Deserialize, Serialize};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
    sync::LazyLock,
};

static FILLABLE: LazyLock<Vec<String>> = LazyLock::new(|| {
    vec![
        "active".to_string(),
        "age".to_string(),
        "email".to_string(),
        "name".to_string(),
    ]
});

///
/// MockDb
///
/// Rows live in shared maps so executor clones and detached entities
/// all see the same state.
///

#[derive(Clone, Debug, Default)]
pub struct MockDb {
    rows: Rc<RefCell<BTreeMap<u64, AttributeMap>>>,
    trashed: Rc<RefCell<BTreeMap<u64, AttributeMap>>>,
    relations: Rc<RefCell<Vec<(u64, String, Value, bool)>>>,
    next_id: Rc<Cell<u64>>,
    query_count: Rc<Cell<u64>>,
}

impl MockDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, rows: impl IntoIterator<Item = (u64, AttributeMap)>) {
        let mut map = self.rows.borrow_mut();
        for (id, attrs) in rows {
            if id >= self.next_id.get() {
                self.next_id.set(id + 1);
            }
            map.insert(id, attrs);
        }
    }

    #[must_use]
    pub fn row(&self, id: u64) -> Option<AttributeMap> {
        self.rows.borrow().get(&id).cloned()
    }

    #[must_use]
    pub fn is_trashed(&self, id: u64) -> bool {
        self.trashed.borrow().contains_key(&id)
    }

    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.query_count.get()
    }

    #[must_use]
    pub fn synced_relations(&self) -> Vec<(u64, String, Value, bool)> {
        self.relations.borrow().clone()
    }

    fn bump(&self) {
        self.query_count.set(self.query_count.get() + 1);
    }
}

///
/// MockEntity
///
/// Serializes without its backend handle so cached copies come back
/// detached, exactly like a rehydrated cache hit should.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MockEntity {
    pub id: Option<u64>,
    pub attributes: AttributeMap,
    #[serde(skip)]
    original: AttributeMap,
    #[serde(skip)]
    db: Option<MockDb>,
}

impl MockEntity {
    fn attached(db: MockDb) -> Self {
        Self {
            db: Some(db),
            ..Self::default()
        }
    }

    fn loaded(db: MockDb, id: u64, attributes: AttributeMap) -> Self {
        Self {
            id: Some(id),
            original: attributes.clone(),
            attributes,
            db: Some(db),
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn backend(&self) -> Result<&MockDb, Error> {
        self.db
            .as_ref()
            .ok_or_else(|| Error::backend("entity is detached from its backend"))
    }
}

impl Entity for MockEntity {
    fn fillable(&self) -> &[String] {
        &FILLABLE
    }

    fn fill(&mut self, attributes: &AttributeMap) {
        for (name, value) in attributes {
            if FILLABLE.contains(name) {
                self.attributes.insert(name.clone(), value.clone());
            }
        }
    }

    fn dirty(&self) -> AttributeMap {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn save(&mut self) -> Result<bool, Error> {
        let db = self.backend()?.clone();
        let id = match self.id {
            Some(id) => id,
            None => {
                let id = db.next_id.get().max(1);
                db.next_id.set(id + 1);
                self.id = Some(id);
                id
            }
        };
        db.rows.borrow_mut().insert(id, self.attributes.clone());
        self.original = self.attributes.clone();

        Ok(true)
    }

    fn delete(&mut self) -> Result<bool, Error> {
        let db = self.backend()?.clone();
        let Some(id) = self.id else {
            return Ok(false);
        };
        match db.rows.borrow_mut().remove(&id) {
            Some(attrs) => {
                db.trashed.borrow_mut().insert(id, attrs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn restore(&mut self) -> Result<bool, Error> {
        let db = self.backend()?.clone();
        let Some(id) = self.id else {
            return Ok(false);
        };
        match db.trashed.borrow_mut().remove(&id) {
            Some(attrs) => {
                db.rows.borrow_mut().insert(id, attrs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_relation(&self, name: &str) -> bool {
        name == "roles" || name == "tags"
    }

    fn sync_relation(&mut self, name: &str, values: &Value, detach: bool) -> Result<(), Error> {
        let db = self.backend()?.clone();
        let id = self
            .id
            .ok_or_else(|| Error::backend("cannot sync relations on an unsaved entity"))?;
        db.relations
            .borrow_mut()
            .push((id, name.to_string(), values.clone(), detach));

        Ok(())
    }
}

///
/// MockQuery
///

#[derive(Clone, Debug, Default)]
pub struct MockQuery {
    pub applied: Vec<String>,
    pub wheres: Vec<WhereClause>,
    pub where_ins: Vec<WhereIn>,
    pub where_not_ins: Vec<WhereNotIn>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub order_bys: Vec<OrderBy>,
}

impl MockQuery {
    fn matches(&self, attrs: &AttributeMap) -> bool {
        let wheres = self.wheres.iter().all(|clause| {
            let actual = attrs.get(&clause.attribute).unwrap_or(&Value::Null);
            match clause.operator.as_deref() {
                None | Some("=") => *actual == clause.value,
                Some("!=") | Some("<>") => *actual != clause.value,
                Some(op) => match (actual.as_f64(), clause.value.as_f64()) {
                    (Some(lhs), Some(rhs)) => match op {
                        ">" => lhs > rhs,
                        ">=" => lhs >= rhs,
                        "<" => lhs < rhs,
                        "<=" => lhs <= rhs,
                        _ => false,
                    },
                    _ => false,
                },
            }
        });

        let ins = self.where_ins.iter().all(|clause| {
            let actual = attrs.get(&clause.attribute).unwrap_or(&Value::Null);
            clause.values.contains(actual) != clause.negate
        });

        let not_ins = self.where_not_ins.iter().all(|clause| {
            let actual = attrs.get(&clause.attribute).unwrap_or(&Value::Null);
            !clause.values.contains(actual)
        });

        wheres && ins && not_ins
    }
}

///
/// MockExecutor
///

#[derive(Clone, Debug, Default)]
pub struct MockExecutor {
    pub db: MockDb,
    pub unresolvable: bool,
}

impl MockExecutor {
    #[must_use]
    pub fn new(db: MockDb) -> Self {
        Self {
            db,
            unresolvable: false,
        }
    }

    fn rows_for(&self, query: &MockQuery) -> Vec<(u64, AttributeMap)> {
        let mut rows: Vec<(u64, AttributeMap)> = self
            .db
            .rows
            .borrow()
            .iter()
            .filter(|(_, attrs)| query.matches(attrs))
            .map(|(id, attrs)| (*id, attrs.clone()))
            .collect();

        for order in query.order_bys.iter().rev() {
            rows.sort_by(|(_, a), (_, b)| {
                let lhs = a.get(&order.attribute).and_then(Value::as_f64);
                let rhs = b.get(&order.attribute).and_then(Value::as_f64);
                let ordering = lhs.partial_cmp(&rhs).unwrap_or(std::cmp::Ordering::Equal);
                match order.direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            });
        }

        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        match query.limit.and_then(|limit| usize::try_from(limit).ok()) {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    fn entities(&self, rows: Vec<(u64, AttributeMap)>) -> Vec<MockEntity> {
        rows.into_iter()
            .map(|(id, attrs)| MockEntity::loaded(self.db.clone(), id, attrs))
            .collect()
    }
}

impl QueryExecutor for MockExecutor {
    type Query = MockQuery;
    type Entity = MockEntity;

    fn new_query(&self) -> Result<MockQuery, RepositoryError> {
        if self.unresolvable {
            return Err(RepositoryError::ModelNotResolvable {
                model: "Missing".to_string(),
            });
        }

        Ok(MockQuery::default())
    }

    fn new_entity(&self) -> Result<MockEntity, RepositoryError> {
        if self.unresolvable {
            return Err(RepositoryError::ModelNotResolvable {
                model: "Missing".to_string(),
            });
        }

        Ok(MockEntity::attached(self.db.clone()))
    }

    fn apply(&self, mut query: MockQuery, constraint: &Constraint) -> Result<MockQuery, Error> {
        match constraint {
            Constraint::EagerLoad { relations } => {
                query.applied.push(format!("with:{}", relations.join(",")));
            }
            Constraint::Where(clause) => {
                query.applied.push(format!("where:{}", clause.attribute));
                query.wheres.push(clause.clone());
            }
            Constraint::WhereIn(clause) => {
                query.applied.push(format!("where_in:{}", clause.attribute));
                query.where_ins.push(clause.clone());
            }
            Constraint::WhereNotIn(clause) => {
                query
                    .applied
                    .push(format!("where_not_in:{}", clause.attribute));
                query.where_not_ins.push(clause.clone());
            }
            Constraint::WhereHas(clause) => {
                query.applied.push(format!("where_has:{}", clause.relation));
            }
            Constraint::Scope(scope) => match scope.name.as_str() {
                // closed dispatch: the only scopes this model exposes
                "adults" => {
                    query.applied.push("scope:adults".to_string());
                    query.wheres.push(WhereClause::new("age", ">=", 18));
                }
                "of_age" => {
                    query.applied.push("scope:of_age".to_string());
                    let min = scope.args.first().cloned().unwrap_or(Value::Null);
                    query.wheres.push(WhereClause::new("age", ">=", min));
                }
                name => {
                    return Err(Error::backend(format!("unknown query scope {name}")));
                }
            },
            Constraint::Offset(offset) => {
                query.applied.push(format!("offset:{offset}"));
                query.offset = Some(*offset);
            }
            Constraint::Limit(limit) => {
                query.applied.push(format!("limit:{limit}"));
                query.limit = Some(*limit);
            }
            Constraint::OrderBy(order) => {
                query
                    .applied
                    .push(format!("order_by:{}:{}", order.attribute, order.direction));
                query.order_bys.push(order.clone());
            }
            Constraint::GroupBy { columns } => {
                query.applied.push(format!("group_by:{}", columns.join(",")));
            }
            Constraint::Having(having) => {
                query.applied.push(format!("having:{}", having.column));
            }
        }

        Ok(query)
    }

    fn find(
        &self,
        query: MockQuery,
        id: &Value,
        _columns: &[String],
    ) -> Result<Option<MockEntity>, Error> {
        self.db.bump();
        let Some(id) = id.as_u64() else {
            return Ok(None);
        };

        Ok(self
            .db
            .rows
            .borrow()
            .get(&id)
            .filter(|attrs| query.matches(attrs))
            .map(|attrs| MockEntity::loaded(self.db.clone(), id, attrs.clone())))
    }

    fn find_many(
        &self,
        query: MockQuery,
        ids: &[Value],
        _columns: &[String],
    ) -> Result<Vec<MockEntity>, Error> {
        self.db.bump();
        let wanted: BTreeSet<u64> = ids.iter().filter_map(Value::as_u64).collect();
        let rows = self
            .rows_for(&query)
            .into_iter()
            .filter(|(id, _)| wanted.contains(id))
            .collect();

        Ok(self.entities(rows))
    }

    fn first(&self, query: MockQuery, _columns: &[String]) -> Result<Option<MockEntity>, Error> {
        self.db.bump();
        let rows = self.rows_for(&query);

        Ok(self.entities(rows).into_iter().next())
    }

    fn get(&self, query: MockQuery, _columns: &[String]) -> Result<Vec<MockEntity>, Error> {
        self.db.bump();
        let rows = self.rows_for(&query);

        Ok(self.entities(rows))
    }

    fn count(&self, query: MockQuery) -> Result<u64, Error> {
        self.db.bump();

        Ok(self.rows_for(&query).len() as u64)
    }

    fn aggregate(
        &self,
        query: MockQuery,
        aggregate: Aggregate,
        attribute: &str,
    ) -> Result<Option<Value>, Error> {
        self.db.bump();
        let values: Vec<f64> = self
            .rows_for(&query)
            .into_iter()
            .filter_map(|(_, attrs)| attrs.get(attribute).and_then(Value::as_f64))
            .collect();

        if values.is_empty() {
            return Ok(None);
        }

        #[expect(clippy::cast_precision_loss)]
        let result = match aggregate {
            Aggregate::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Aggregate::Max => values.iter().copied().fold(f64::MIN, f64::max),
            Aggregate::Min => values.iter().copied().fold(f64::MAX, f64::min),
            Aggregate::Sum => values.iter().sum(),
        };

        Ok(serde_json::Number::from_f64(result).map(Value::Number))
    }

    fn paginate(
        &self,
        query: MockQuery,
        per_page: u32,
        page: u32,
        _columns: &[String],
    ) -> Result<Paged<MockEntity>, Error> {
        self.db.bump();
        let rows = self.rows_for(&query);
        let total = rows.len() as u64;
        let start = (page.max(1) - 1) as usize * per_page as usize;
        let items = self.entities(
            rows.into_iter()
                .skip(start)
                .take(per_page as usize)
                .collect(),
        );

        Ok(Paged {
            items,
            total: Some(total),
            per_page,
            current_page: page.max(1),
        })
    }
}

///
/// ActiveCriterion
///

pub struct ActiveCriterion;

impl Criterion<MockExecutor> for ActiveCriterion {
    fn name(&self) -> &str {
        "Active"
    }

    fn apply(
        &self,
        query: MockQuery,
        repository: &Repository<MockExecutor>,
    ) -> Result<MockQuery, Error> {
        repository
            .executor()
            .apply(query, &Constraint::Where(WhereClause::eq("active", true)))
    }
}

///
/// MinAgeCriterion
///
/// Factory-constructible: one positional or named `min` argument.
///

pub struct MinAgeCriterion {
    pub min: i64,
}

impl Criterion<MockExecutor> for MinAgeCriterion {
    fn name(&self) -> &str {
        "MinAge"
    }

    fn apply(
        &self,
        query: MockQuery,
        repository: &Repository<MockExecutor>,
    ) -> Result<MockQuery, Error> {
        repository.executor().apply(
            query,
            &Constraint::Where(WhereClause::new("age", ">=", self.min)),
        )
    }
}

///
/// RecordingSink
///

#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<RepositoryEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }

    #[must_use]
    pub fn last_entity(&self) -> Option<Value> {
        self.events.borrow().last().and_then(|event| event.entity.clone())
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&self, event: &RepositoryEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

///
/// StubRequest
///

#[derive(Clone, Debug, Default)]
pub struct StubRequest {
    pub flags: BTreeSet<String>,
    pub page: Option<u32>,
}

impl StubRequest {
    #[must_use]
    pub fn flagged(flag: &str) -> Self {
        Self {
            flags: BTreeSet::from([flag.to_string()]),
            page: None,
        }
    }

    #[must_use]
    pub const fn on_page(page: u32) -> Self {
        Self {
            flags: BTreeSet::new(),
            page: Some(page),
        }
    }
}

impl RequestContext for StubRequest {
    fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    fn current_page(&self, _page_name: &str) -> Option<u32> {
        self.page
    }
}

///
/// StubConnection
///

#[derive(Clone, Debug, Default)]
pub struct StubConnection {
    pub log: Rc<RefCell<Vec<String>>>,
    pub fail_commit: Rc<Cell<bool>>,
    pub fail_roll_back: Rc<Cell<bool>>,
}

impl StubConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl Connection for StubConnection {
    fn begin_transaction(&self) -> Result<(), Error> {
        self.log.borrow_mut().push("begin".to_string());

        Ok(())
    }

    fn commit(&self) -> Result<(), Error> {
        self.log.borrow_mut().push("commit".to_string());
        if self.fail_commit.get() {
            return Err(Error::backend("commit failed"));
        }

        Ok(())
    }

    fn roll_back(&self) -> Result<(), Error> {
        self.log.borrow_mut().push("roll_back".to_string());
        if self.fail_roll_back.get() {
            return Err(Error::backend("roll back failed"));
        }

        Ok(())
    }
}

/// Seed three users: 1 alice (30, active), 2 bob (17, inactive),
/// 3 carol (45, active).
#[must_use]
pub fn seeded_db() -> MockDb {
    let db = MockDb::new();
    db.seed([
        (1, attrs(&[("name", "alice".into()), ("age", 30.into()), ("active", true.into())])),
        (2, attrs(&[("name", "bob".into()), ("age", 17.into()), ("active", false.into())])),
        (3, attrs(&[("name", "carol".into()), ("age", 45.into()), ("active", true.into())])),
    ]);

    db
}

#[must_use]
pub fn attrs(pairs: &[(&str, Value)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}
