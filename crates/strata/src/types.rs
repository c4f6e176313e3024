use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Attribute values exchanged with the backend are plain JSON values.
pub type Value = serde_json::Value;

/// Named attribute set for an entity (fill payloads, dirty diffs).
pub type AttributeMap = serde_json::Map<String, Value>;

///
/// BoolOp
///
/// How a clause combines with the preceding ones.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    #[default]
    #[display("and")]
    And,
    #[display("or")]
    Or,
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

///
/// Aggregate
///
/// Numeric aggregate terminals delegated to the query executor.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[display("avg")]
    Avg,
    #[display("max")]
    Max,
    #[display("min")]
    Min,
    #[display("sum")]
    Sum,
}

///
/// Lifetime
///
/// Cache lifetime contract: `0` disables caching, `-1` caches forever,
/// any positive value is a TTL in seconds. The integer encoding is the
/// wire/config format.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "i64", into = "i64")]
pub enum Lifetime {
    #[default]
    Disabled,
    Forever,
    Seconds(u64),
}

impl Lifetime {
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled)
    }

    #[must_use]
    pub const fn is_forever(self) -> bool {
        matches!(self, Self::Forever)
    }
}

impl From<i64> for Lifetime {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Disabled,
            v if v < 0 => Self::Forever,
            #[expect(clippy::cast_sign_loss)]
            v => Self::Seconds(v as u64),
        }
    }
}

impl From<Lifetime> for i64 {
    fn from(value: Lifetime) -> Self {
        match value {
            Lifetime::Disabled => 0,
            Lifetime::Forever => -1,
            #[expect(clippy::cast_possible_wrap)]
            Lifetime::Seconds(secs) => secs as Self,
        }
    }
}

///
/// WriteAction
///
/// Write-path actions that can trigger cache invalidation.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
    #[display("create")]
    Create,
    #[display("delete")]
    Delete,
    #[display("update")]
    Update,
}

///
/// Paged
///
/// One page of results. `total` is absent for simple pagination, which
/// skips the count query.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: Option<u64>,
    pub per_page: u32,
    pub current_page: u32,
}

impl<T> Paged<T> {
    /// Last page number, when a total count is available.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn last_page(&self) -> Option<u32> {
        match (self.total, self.per_page) {
            (Some(total), per_page) if per_page > 0 => {
                Some((total.div_ceil(per_page as u64)) as u32)
            }
            _ => None,
        }
    }
}

///
/// TESTS
///
