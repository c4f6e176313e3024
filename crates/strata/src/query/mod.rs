//! Module: query
//! Responsibility: fluent constraint accumulation and deterministic
//! application ordering.
//! Does not own: criteria (applied by the pipeline after `prepare`) or
//! any backend query semantics.

pub mod constraint;


use crate::{
    error::Error,
    traits::QueryExecutor,
    types::{BoolOp, OrderDirection, Value},
};

// re-exports
pub use constraint::{
    Constraint, Having, OrderBy, ScopeCall, WhereClause, WhereHas, WhereIn, WhereNotIn,
};

///
/// QueryAccumulator
///
/// Holds the pending constraints for one logical repository call.
/// Mutators append (or set) and return `&mut Self` for chaining;
/// `prepare` folds everything over a fresh backend query in a fixed
/// order; `reset` clears every list so nothing leaks into the next
/// call on the same instance.
///

#[derive(Debug, Default)]
pub struct QueryAccumulator {
    relations: Vec<String>,
    wheres: Vec<WhereClause>,
    where_ins: Vec<WhereIn>,
    where_not_ins: Vec<WhereNotIn>,
    where_has: Vec<WhereHas>,
    scopes: Vec<ScopeCall>,
    offset: Option<i64>,
    limit: Option<i64>,
    order_bys: Vec<OrderBy>,
    group_bys: Vec<String>,
    havings: Vec<Having>,
}

impl QueryAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Fluent mutators
    // ------------------------------------------------------------------

    /// Set the relations to eager-load on execution.
    pub fn with(&mut self, relations: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.relations = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn where_(
        &mut self,
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(WhereClause::new(attribute, operator, value));
        self
    }

    pub fn or_where(
        &mut self,
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.wheres
            .push(WhereClause::new(attribute, operator, value).boolean(BoolOp::Or));
        self
    }

    /// Append a fully-specified where clause.
    pub fn where_clause(&mut self, clause: WhereClause) -> &mut Self {
        self.wheres.push(clause);
        self
    }

    pub fn where_in(
        &mut self,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        self.where_ins.push(WhereIn::new(attribute, values));
        self
    }

    pub fn where_in_clause(&mut self, clause: WhereIn) -> &mut Self {
        self.where_ins.push(clause);
        self
    }

    pub fn where_not_in(
        &mut self,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        self.where_not_ins.push(WhereNotIn::new(attribute, values));
        self
    }

    pub fn where_not_in_clause(&mut self, clause: WhereNotIn) -> &mut Self {
        self.where_not_ins.push(clause);
        self
    }

    pub fn where_has(
        &mut self,
        relation: impl Into<String>,
        constraints: Vec<WhereClause>,
    ) -> &mut Self {
        self.where_has.push(WhereHas::new(relation, constraints));
        self
    }

    pub fn where_has_clause(&mut self, clause: WhereHas) -> &mut Self {
        self.where_has.push(clause);
        self
    }

    /// Queue a named scope with positional arguments.
    pub fn scope(
        &mut self,
        name: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<Value>>,
    ) -> &mut Self {
        self.scopes.push(ScopeCall::new(name, args));
        self
    }

    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.order_bys
            .push(OrderBy::new(attribute, OrderDirection::Asc));
        self
    }

    pub fn order_by_desc(&mut self, attribute: impl Into<String>) -> &mut Self {
        self.order_bys
            .push(OrderBy::new(attribute, OrderDirection::Desc));
        self
    }

    /// Append one group-by column, deduplicated.
    pub fn group_by(&mut self, column: impl Into<String>) -> &mut Self {
        let column = column.into();
        if !self.group_bys.contains(&column) {
            self.group_bys.push(column);
        }
        self
    }

    pub fn group_by_all(
        &mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        for column in columns {
            self.group_by(column);
        }
        self
    }

    pub fn having(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.havings.push(Having::new(column, operator, value));
        self
    }

    /// Sugar for `having(.., boolean = or)`.
    pub fn or_having(
        &mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.havings
            .push(Having::new(column, operator, value).boolean(BoolOp::Or));
        self
    }

    // ------------------------------------------------------------------
    // Execution support
    // ------------------------------------------------------------------

    /// Fold every pending constraint over `query`, in the fixed order:
    /// eager loads, wheres, where-ins, where-not-ins, where-has,
    /// scopes, offset, limit, order-bys, group-by, havings.
    ///
    /// Offset and limit apply only when positive; non-positive values
    /// are a deliberate no-op, not an error.
    pub fn prepare<X: QueryExecutor>(
        &self,
        executor: &X,
        mut query: X::Query,
    ) -> Result<X::Query, Error> {
        if !self.relations.is_empty() {
            query = executor.apply(
                query,
                &Constraint::EagerLoad {
                    relations: self.relations.clone(),
                },
            )?;
        }

        for clause in &self.wheres {
            query = executor.apply(query, &Constraint::Where(clause.clone()))?;
        }

        for clause in &self.where_ins {
            query = executor.apply(query, &Constraint::WhereIn(clause.clone()))?;
        }

        for clause in &self.where_not_ins {
            query = executor.apply(query, &Constraint::WhereNotIn(clause.clone()))?;
        }

        for clause in &self.where_has {
            query = executor.apply(query, &Constraint::WhereHas(clause.clone()))?;
        }

        for scope in &self.scopes {
            query = executor.apply(query, &Constraint::Scope(scope.clone()))?;
        }

        if let Some(offset) = self.offset
            && offset > 0
        {
            query = executor.apply(query, &Constraint::Offset(offset))?;
        }

        if let Some(limit) = self.limit
            && limit > 0
        {
            query = executor.apply(query, &Constraint::Limit(limit))?;
        }

        for order in &self.order_bys {
            query = executor.apply(query, &Constraint::OrderBy(order.clone()))?;
        }

        if !self.group_bys.is_empty() {
            query = executor.apply(
                query,
                &Constraint::GroupBy {
                    columns: self.group_bys.clone(),
                },
            )?;
        }

        for having in &self.havings {
            query = executor.apply(query, &Constraint::Having(having.clone()))?;
        }

        Ok(query)
    }

    /// Clear every pending constraint.
    pub fn reset(&mut self) {
        self.relations.clear();
        self.wheres.clear();
        self.where_ins.clear();
        self.where_not_ins.clear();
        self.where_has.clear();
        self.scopes.clear();
        self.offset = None;
        self.limit = None;
        self.order_bys.clear();
        self.group_bys.clear();
        self.havings.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
            && self.wheres.is_empty()
            && self.where_ins.is_empty()
            && self.where_not_ins.is_empty()
            && self.where_has.is_empty()
            && self.scopes.is_empty()
            && self.offset.is_none()
            && self.limit.is_none()
            && self.order_bys.is_empty()
            && self.group_bys.is_empty()
            && self.havings.is_empty()
    }

    /// The state slice that feeds the cache-key hash: relations,
    /// wheres, where-ins, where-not-ins, offset, limit, order-bys.
    /// Exactly that field list, in that order. Scopes, grouping and
    /// relation-existence clauses stay out of the key.
    pub(crate) fn hash_fields(&self) -> Result<Vec<Value>, Error> {
        let encode = |v: Result<Value, serde_json::Error>| {
            v.map_err(|err| Error::backend(err.to_string()))
        };

        Ok(vec![
            encode(serde_json::to_value(&self.relations))?,
            encode(serde_json::to_value(&self.wheres))?,
            encode(serde_json::to_value(&self.where_ins))?,
            encode(serde_json::to_value(&self.where_not_ins))?,
            encode(serde_json::to_value(self.offset))?,
            encode(serde_json::to_value(self.limit))?,
            encode(serde_json::to_value(&self.order_bys))?,
        ])
    }
}
