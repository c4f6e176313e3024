//! Generic repository layer over a pluggable persistence backend.
//!
//! ## Crate layout
//! - `cache`: deterministic cache keys, the remember/forget cycle, and
//!   the manual key index used by stores without tag support.
//! - `config`: static repository and cache configuration.
//! - `criteria`: reusable named query constraints with two-list merge
//!   semantics and skip guards.
//! - `error`: shared error types for the pipeline and its inputs.
//! - `events`: lifecycle event names and the notification payload.
//! - `query`: fluent constraint accumulation and ordered application.
//! - `repository`: the execution pipeline tying everything together.
//! - `traits`: the injected collaborator contracts.
//!
//! The `prelude` module mirrors the surface embedders touch when wiring
//! a repository and issuing calls.

pub mod cache;
pub mod config;
pub mod criteria;
pub mod error;
pub mod events;
pub mod query;
pub mod repository;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod test_fixtures;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;
pub use repository::Repository;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        cache::{FileKeyIndex, MemoryCache, MemoryKeyIndex},
        config::{CacheConfig, RepositoryConfig},
        criteria::{Criterion, CriterionInput, CriterionSpec, FnCriterion},
        error::Error,
        events::{EntityEvent, RepositoryEvent},
        query::{WhereClause, WhereHas, WhereIn, WhereNotIn},
        repository::{Repository, Target},
        traits::{
            CacheStore as _, Connection as _, Entity as _, EventSink as _, KeyIndex as _,
            QueryExecutor, RequestContext as _,
        },
        types::{Aggregate, AttributeMap, Lifetime, OrderDirection, Paged, Value, WriteAction},
    };
    pub use serde::{Deserialize, Serialize};
}
