use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error for repository operations. Collaborator failures are
/// carried opaquely in `Backend` and propagate untouched; everything else
/// is a typed contract violation raised by this crate.
///

#[derive(Clone, Debug, ThisError)]
pub enum Error {
    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Criterion(#[from] CriterionError),

    #[error(transparent)]
    NotFound(#[from] EntityNotFound),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Error {
    /// Wrap a collaborator failure message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

///
/// RepositoryError
///
/// Fatal repository misconfiguration. Never retried.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RepositoryError {
    #[error("no transactional connection configured for this repository")]
    MissingConnection,

    #[error("model {model} does not satisfy the expected persistence contract")]
    ModelContractMismatch { model: String },

    #[error("model {model} does not resolve to a loadable type")]
    ModelNotResolvable { model: String },
}

///
/// CriterionError
///
/// Malformed criterion input, surfaced at push time.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CriterionError {
    #[error("criterion {name} is not registered as a criterion contract")]
    ContractMismatch { name: String },

    #[error(
        "criterion array signature must hold one or two elements, got {len}"
    )]
    InvalidArraySignature { len: usize },

    #[error("criterion input of type {actual} is not allowed")]
    InvalidType { actual: String },
}

///
/// EntityNotFound
///
/// Lookup miss on an or-fail call.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("no results for model [{model}] #{id}")]
pub struct EntityNotFound {
    pub model: String,
    pub id: String,
}

impl EntityNotFound {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
        }
    }
}

///
/// TESTS
///
