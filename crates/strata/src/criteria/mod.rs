//! Module: criteria
//! Responsibility: reusable query constraints with identity-keyed
//! registration, two-list merge semantics and per-call skip guards.
//! Does not own: query execution or the cache key. The repository
//! applies the effective set when it prepares a query.

pub mod input;


pub use input::CriterionSpec;

use crate::{
    error::{CriterionError, Error},
    repository::Repository,
    traits::QueryExecutor,
    types::Value,
};
use std::{collections::BTreeMap, fmt, rc::Rc};

///
/// Criterion
///
/// A named, reusable query constraint. The name is the criterion's
/// identity: registering a second criterion with the same name
/// replaces the first in place.
///

pub trait Criterion<X: QueryExecutor> {
    fn name(&self) -> &str;

    /// Apply this criterion's constraints to the query.
    fn apply(&self, query: X::Query, repository: &Repository<X>) -> Result<X::Query, Error>;
}

///
/// FnCriterion
///
/// A closure criterion. Identity is the allocation, not the code:
/// clones of one `FnCriterion` share a token and replace each other,
/// while two separately built closures always coexist.
///

pub struct FnCriterion<X: QueryExecutor> {
    #[allow(clippy::type_complexity)]
    func: Rc<dyn Fn(X::Query, &Repository<X>) -> Result<X::Query, Error>>,
}

impl<X: QueryExecutor> FnCriterion<X> {
    pub fn new(
        func: impl Fn(X::Query, &Repository<X>) -> Result<X::Query, Error> + 'static,
    ) -> Self {
        Self { func: Rc::new(func) }
    }

    #[must_use]
    pub fn token(&self) -> usize {
        Rc::as_ptr(&self.func).cast::<()>() as usize
    }

    pub fn apply(&self, query: X::Query, repository: &Repository<X>) -> Result<X::Query, Error> {
        (self.func)(query, repository)
    }
}

impl<X: QueryExecutor> Clone for FnCriterion<X> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<X: QueryExecutor> fmt::Debug for FnCriterion<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCriterion")
            .field("token", &self.token())
            .finish()
    }
}

///
/// CriterionKey
///
/// Registry identity. Named criteria key by name, closures by
/// allocation token.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CriterionKey {
    Name(String),
    Token(usize),
}

///
/// CriterionInput
///
/// Every accepted way to hand a criterion to the repository.
///

pub enum CriterionInput<X: QueryExecutor> {
    /// An already-constructed criterion instance.
    Instance(Rc<dyn Criterion<X>>),
    /// A closure criterion.
    Func(FnCriterion<X>),
    /// A parsed name-plus-arguments spec.
    Spec(CriterionSpec),
    /// A raw JSON value, parsed into a spec on registration.
    Raw(Value),
}

impl<X: QueryExecutor> CriterionInput<X> {
    pub fn instance(criterion: impl Criterion<X> + 'static) -> Self {
        Self::Instance(Rc::new(criterion))
    }
}

impl<X: QueryExecutor> From<&str> for CriterionInput<X> {
    fn from(name: &str) -> Self {
        Self::Spec(CriterionSpec::Name(name.to_string()))
    }
}

impl<X: QueryExecutor> From<String> for CriterionInput<X> {
    fn from(name: String) -> Self {
        Self::Spec(CriterionSpec::Name(name))
    }
}

impl<X: QueryExecutor> From<CriterionSpec> for CriterionInput<X> {
    fn from(spec: CriterionSpec) -> Self {
        Self::Spec(spec)
    }
}

impl<X: QueryExecutor> From<Value> for CriterionInput<X> {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl<X: QueryExecutor> From<FnCriterion<X>> for CriterionInput<X> {
    fn from(func: FnCriterion<X>) -> Self {
        Self::Func(func)
    }
}

///
/// StoredCriterion
///
/// What the registry actually holds once an input has been resolved.
///

pub enum StoredCriterion<X: QueryExecutor> {
    Object(Rc<dyn Criterion<X>>),
    Func(FnCriterion<X>),
}

impl<X: QueryExecutor> StoredCriterion<X> {
    pub fn apply(&self, query: X::Query, repository: &Repository<X>) -> Result<X::Query, Error> {
        match self {
            Self::Object(criterion) => criterion.apply(query, repository),
            Self::Func(func) => func.apply(query, repository),
        }
    }
}

impl<X: QueryExecutor> Clone for StoredCriterion<X> {
    fn clone(&self) -> Self {
        match self {
            Self::Object(criterion) => Self::Object(Rc::clone(criterion)),
            Self::Func(func) => Self::Func(func.clone()),
        }
    }
}

///
/// CriterionFactory
///
/// Builds a criterion instance from a parsed spec's arguments. Named
/// arguments are reordered by the declared parameter list before the
/// builder runs, so positional and named specs hit the same builder.
///

pub struct CriterionFactory<X: QueryExecutor> {
    params: Vec<&'static str>,
    #[allow(clippy::type_complexity)]
    build: Box<dyn Fn(Vec<Value>) -> Result<Rc<dyn Criterion<X>>, Error>>,
}

impl<X: QueryExecutor> CriterionFactory<X> {
    pub fn new(
        params: Vec<&'static str>,
        build: impl Fn(Vec<Value>) -> Result<Rc<dyn Criterion<X>>, Error> + 'static,
    ) -> Self {
        Self {
            params,
            build: Box::new(build),
        }
    }
}

///
/// CriteriaRegistry
///
/// Two ordered lists of criteria. Defaults come from configuration
/// and survive the per-call reset; session criteria are pushed by the
/// caller and flushed after every terminal call. The effective set
/// merges defaults first, so a session criterion with the same key
/// overrides its default.
///

pub struct CriteriaRegistry<X: QueryExecutor> {
    defaults: Vec<(CriterionKey, StoredCriterion<X>)>,
    session: Vec<(CriterionKey, StoredCriterion<X>)>,
    skip_all: bool,
    skip_defaults: bool,
    factories: BTreeMap<String, CriterionFactory<X>>,
}

impl<X: QueryExecutor> CriteriaRegistry<X> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            defaults: Vec::new(),
            session: Vec::new(),
            skip_all: false,
            skip_defaults: false,
            factories: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------

    /// Register a named constructor so specs like `["Between", [..]]`
    /// can be resolved. Re-registering a name replaces the factory.
    pub fn register_factory(&mut self, name: impl Into<String>, factory: CriterionFactory<X>) {
        self.factories.insert(name.into(), factory);
    }

    fn instantiate(&self, spec: &CriterionSpec) -> Result<Rc<dyn Criterion<X>>, Error> {
        let factory = self.factories.get(spec.name()).ok_or_else(|| {
            CriterionError::ContractMismatch {
                name: spec.name().to_string(),
            }
        })?;

        let args = match spec {
            CriterionSpec::Name(_) => Vec::new(),
            CriterionSpec::Positional(_, args) => args.clone(),
            CriterionSpec::Named(_, named) => factory
                .params
                .iter()
                .filter_map(|param| named.get(*param).cloned())
                .collect(),
        };

        (factory.build)(args)
    }

    // ------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------

    /// The registry key an input would occupy.
    pub fn key_of(input: &CriterionInput<X>) -> Result<CriterionKey, Error> {
        match input {
            CriterionInput::Instance(criterion) => {
                Ok(CriterionKey::Name(criterion.name().to_string()))
            }
            CriterionInput::Func(func) => Ok(CriterionKey::Token(func.token())),
            CriterionInput::Spec(spec) => Ok(CriterionKey::Name(spec.name().to_string())),
            CriterionInput::Raw(value) => {
                let spec = CriterionSpec::parse(value)?;
                Ok(CriterionKey::Name(spec.name().to_string()))
            }
        }
    }

    fn resolve(
        &self,
        input: CriterionInput<X>,
    ) -> Result<(CriterionKey, StoredCriterion<X>), Error> {
        let key = Self::key_of(&input)?;
        let stored = match input {
            CriterionInput::Instance(criterion) => StoredCriterion::Object(criterion),
            CriterionInput::Func(func) => StoredCriterion::Func(func),
            CriterionInput::Spec(spec) => StoredCriterion::Object(self.instantiate(&spec)?),
            CriterionInput::Raw(value) => {
                let spec = CriterionSpec::parse(&value)?;
                StoredCriterion::Object(self.instantiate(&spec)?)
            }
        };

        Ok((key, stored))
    }

    /// Push a criterion onto the session list. Same key replaces in
    /// place, preserving the original position.
    pub fn push(&mut self, input: impl Into<CriterionInput<X>>) -> Result<(), Error> {
        let (key, stored) = self.resolve(input.into())?;
        Self::upsert(&mut self.session, key, stored);

        Ok(())
    }

    /// Replace the default list wholesale.
    pub fn set_defaults(
        &mut self,
        inputs: impl IntoIterator<Item = CriterionInput<X>>,
    ) -> Result<(), Error> {
        let mut defaults = Vec::new();
        for input in inputs {
            let (key, stored) = self.resolve(input)?;
            Self::upsert(&mut defaults, key, stored);
        }
        self.defaults = defaults;

        Ok(())
    }

    fn upsert(
        list: &mut Vec<(CriterionKey, StoredCriterion<X>)>,
        key: CriterionKey,
        stored: StoredCriterion<X>,
    ) {
        if let Some(pos) = list.iter().position(|(k, _)| *k == key) {
            list[pos].1 = stored;
        } else {
            list.push((key, stored));
        }
    }

    /// Remove a criterion by identity from both lists.
    pub fn remove(&mut self, input: impl Into<CriterionInput<X>>) -> Result<(), Error> {
        let key = Self::key_of(&input.into())?;
        self.session.retain(|(k, _)| *k != key);
        self.defaults.retain(|(k, _)| *k != key);

        Ok(())
    }

    /// Drop all session criteria. Respects the skip guard: while
    /// skipping is active the session list is preserved for the next
    /// call. Defaults are never flushed.
    pub fn flush(&mut self) {
        if !self.skip_all {
            self.session.clear();
        }
    }

    // ------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------

    pub const fn skip(&mut self, flag: bool) {
        self.skip_all = flag;
    }

    pub const fn skip_defaults(&mut self, flag: bool) {
        self.skip_defaults = flag;
    }

    pub const fn is_skipping(&self) -> bool {
        self.skip_all
    }

    // ------------------------------------------------------------
    // Effective set
    // ------------------------------------------------------------

    /// The criteria that would actually run, in application order:
    /// defaults first, then session, with session entries overriding
    /// defaults that share a key in place.
    #[must_use]
    pub fn effective(&self) -> Vec<(CriterionKey, StoredCriterion<X>)> {
        if self.skip_all {
            return Vec::new();
        }

        let mut merged = if self.skip_defaults {
            Vec::new()
        } else {
            self.defaults.clone()
        };
        for (key, stored) in &self.session {
            Self::upsert(&mut merged, key.clone(), stored.clone());
        }

        merged
    }

    pub fn has(&self, input: &CriterionInput<X>) -> Result<bool, Error> {
        let key = Self::key_of(input)?;

        Ok(self.effective().iter().any(|(k, _)| *k == key))
    }

    pub fn get(&self, input: &CriterionInput<X>) -> Result<Option<StoredCriterion<X>>, Error> {
        let key = Self::key_of(input)?;

        Ok(self
            .effective()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, stored)| stored))
    }

    #[must_use]
    pub fn session(&self) -> &[(CriterionKey, StoredCriterion<X>)] {
        &self.session
    }

    #[must_use]
    pub fn defaults(&self) -> &[(CriterionKey, StoredCriterion<X>)] {
        &self.defaults
    }

    /// Fold the effective set over a query.
    pub fn apply(
        &self,
        mut query: X::Query,
        repository: &Repository<X>,
    ) -> Result<X::Query, Error> {
        for (_, criterion) in self.effective() {
            query = criterion.apply(query, repository)?;
        }

        Ok(query)
    }
}

impl<X: QueryExecutor> Default for CriteriaRegistry<X> {
    fn default() -> Self {
        Self::new()
    }
}
