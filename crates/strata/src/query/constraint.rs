//! Module: query::constraint
//! Responsibility: the serialized constraint model handed to the executor.
//! Does not own: application order or any query semantics. The executor
//! interprets each variant against its own query value.

use crate::types::{BoolOp, OrderDirection, Value};
use serde::{Deserialize, Serialize};

///
/// Constraint
///
/// One pending query constraint. Owned by the accumulator for the
/// lifetime of a single logical call and cleared after execution.
/// Serialization feeds the cache-key hash, so the encoding is part of
/// the determinism contract.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Constraint {
    EagerLoad { relations: Vec<String> },
    Where(WhereClause),
    WhereIn(WhereIn),
    WhereNotIn(WhereNotIn),
    WhereHas(WhereHas),
    Scope(ScopeCall),
    Offset(i64),
    Limit(i64),
    OrderBy(OrderBy),
    GroupBy { columns: Vec<String> },
    Having(Having),
}

///
/// WhereClause
///
/// Basic comparison. A missing operator degrades to the executor's
/// permissive default (equality for every backend shipped here), and
/// the boolean defaults to `and`; under-specified clauses never fail.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WhereClause {
    pub attribute: String,
    pub operator: Option<String>,
    pub value: Value,
    pub boolean: BoolOp,
}

impl WhereClause {
    pub fn new(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: Some(operator.into()),
            value: value.into(),
            boolean: BoolOp::And,
        }
    }

    /// Equality comparison with the default boolean.
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: None,
            value: value.into(),
            boolean: BoolOp::And,
        }
    }

    #[must_use]
    pub const fn boolean(mut self, boolean: BoolOp) -> Self {
        self.boolean = boolean;
        self
    }
}

///
/// WhereIn
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WhereIn {
    pub attribute: String,
    pub values: Vec<Value>,
    pub boolean: BoolOp,
    pub negate: bool,
}

impl WhereIn {
    pub fn new(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
            boolean: BoolOp::And,
            negate: false,
        }
    }

    #[must_use]
    pub const fn boolean(mut self, boolean: BoolOp) -> Self {
        self.boolean = boolean;
        self
    }

    #[must_use]
    pub const fn negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }
}

///
/// WhereNotIn
///
/// Kept distinct from a negated `WhereIn`: the two accumulate into
/// separate lists and hash separately.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WhereNotIn {
    pub attribute: String,
    pub values: Vec<Value>,
    pub boolean: BoolOp,
}

impl WhereNotIn {
    pub fn new(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
            boolean: BoolOp::And,
        }
    }

    #[must_use]
    pub const fn boolean(mut self, boolean: BoolOp) -> Self {
        self.boolean = boolean;
        self
    }
}

///
/// WhereHas
///
/// Relation-existence constraint. The nested predicate is a plain
/// clause list so the whole constraint stays serializable.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WhereHas {
    pub relation: String,
    pub constraints: Vec<WhereClause>,
    pub operator: String,
    pub count: u64,
}

impl WhereHas {
    pub fn new(relation: impl Into<String>, constraints: Vec<WhereClause>) -> Self {
        Self {
            relation: relation.into(),
            constraints,
            operator: ">=".to_string(),
            count: 1,
        }
    }

    #[must_use]
    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    #[must_use]
    pub const fn count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }
}

///
/// ScopeCall
///
/// A named query scope with positional arguments. Dispatch is a closed
/// match in the executor.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScopeCall {
    pub name: String,
    pub args: Vec<Value>,
}

impl ScopeCall {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

///
/// OrderBy
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderBy {
    pub attribute: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn new(attribute: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            attribute: attribute.into(),
            direction,
        }
    }
}

///
/// Having
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Having {
    pub column: String,
    pub operator: Option<String>,
    pub value: Value,
    pub boolean: BoolOp,
}

impl Having {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: Some(operator.into()),
            value: value.into(),
            boolean: BoolOp::And,
        }
    }

    #[must_use]
    pub const fn boolean(mut self, boolean: BoolOp) -> Self {
        self.boolean = boolean;
        self
    }
}
