use crate::types::{Lifetime, WriteAction};
use serde::Deserialize;
use std::{collections::BTreeSet, path::PathBuf};

///
/// RepositoryConfig
///
/// Static configuration injected at construction time. There is no
/// ambient configuration source; embedders deserialize this from
/// whatever config layer they run.
///

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Model name, folded into cache keys and not-found errors.
    pub model: String,

    /// Repository identity. Defaults to `<model>Repository` when unset.
    pub repository_id: Option<String>,

    pub cache: CacheConfig,
}

impl RepositoryConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn repository_id(mut self, id: impl Into<String>) -> Self {
        self.repository_id = Some(id.into());
        self
    }
}

///
/// CacheConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default lifetime for cached results. Caching is opt-in: the
    /// default is `Disabled`.
    pub lifetime: Lifetime,

    /// Cache driver to switch to at execution time, when set.
    pub driver: Option<String>,

    /// Write actions that flush this repository's cache.
    pub clear_on: BTreeSet<WriteAction>,

    /// Request flag that skips the cache for one call.
    pub skip_flag: String,

    /// On-disk location for the manual key index, when file-backed.
    pub keys_file: Option<PathBuf>,

    /// Cacheable method names. Empty means every read operation.
    pub methods: BTreeSet<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lifetime: Lifetime::Disabled,
            driver: None,
            clear_on: BTreeSet::from([
                WriteAction::Create,
                WriteAction::Update,
                WriteAction::Delete,
            ]),
            skip_flag: "skipCache".to_string(),
            keys_file: None,
            methods: BTreeSet::new(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    #[must_use]
    pub fn clear_on(mut self, actions: impl IntoIterator<Item = WriteAction>) -> Self {
        self.clear_on = actions.into_iter().collect();
        self
    }

    #[must_use]
    pub fn skip_flag(mut self, flag: impl Into<String>) -> Self {
        self.skip_flag = flag.into();
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_caching_and_clear_on_every_write() {
        let config = RepositoryConfig::new("User");
        assert!(config.cache.lifetime.is_disabled());
        assert_eq!(config.cache.clear_on.len(), 3);
        assert_eq!(config.cache.skip_flag, "skipCache");
        assert!(config.cache.methods.is_empty());
    }

    #[test]
    fn deserializes_from_integer_lifetime() {
        let config: RepositoryConfig = serde_json::from_str(
            r#"{"model":"Post","cache":{"lifetime":-1,"driver":"redis","clear_on":["create"]}}"#,
        )
        .expect("config");

        assert_eq!(config.model, "Post");
        assert!(config.cache.lifetime.is_forever());
        assert_eq!(config.cache.driver.as_deref(), Some("redis"));
        assert_eq!(
            config.cache.clear_on,
            BTreeSet::from([WriteAction::Create])
        );
    }
}
