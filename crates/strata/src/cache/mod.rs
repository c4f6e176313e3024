//! Module: cache
//! Responsibility: deterministic cache keys, the remember/forget
//! cycle, and per-call lifetime and driver overrides.
//! Does not own: what goes into the key. Callers assemble the part
//! list; this module only hashes and stores.

pub mod key_index;
pub mod store;


pub use key_index::{FileKeyIndex, MemoryKeyIndex};
pub use store::MemoryCache;

use crate::{
    config::CacheConfig,
    error::Error,
    traits::{CacheStore, KeyIndex, RequestContext},
    types::{Lifetime, Value, WriteAction},
};
use std::rc::Rc;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_128;

///
/// CacheEngine
///
/// One engine per repository. Overrides set through the fluent surface
/// apply to exactly one terminal call and are cleared alongside the
/// query state.
///

pub struct CacheEngine {
    config: CacheConfig,
    store: Rc<dyn CacheStore>,
    index: Rc<dyn KeyIndex>,
    lifetime_override: Option<Lifetime>,
    driver_override: Option<String>,
    clear_enabled: bool,
}

impl CacheEngine {
    #[must_use]
    pub fn new(config: CacheConfig, store: Rc<dyn CacheStore>, index: Rc<dyn KeyIndex>) -> Self {
        Self {
            config,
            store,
            index,
            lifetime_override: None,
            driver_override: None,
            clear_enabled: true,
        }
    }

    // ------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------

    pub fn set_lifetime(&mut self, lifetime: Lifetime) {
        self.lifetime_override = Some(lifetime);
    }

    pub fn set_driver(&mut self, driver: impl Into<String>) {
        self.driver_override = Some(driver.into());
    }

    pub fn reset_overrides(&mut self) {
        self.lifetime_override = None;
        self.driver_override = None;
    }

    #[must_use]
    pub fn active_lifetime(&self) -> Lifetime {
        self.lifetime_override.unwrap_or(self.config.lifetime)
    }

    #[must_use]
    pub fn active_driver(&self) -> Option<&str> {
        self.driver_override
            .as_deref()
            .or(self.config.driver.as_deref())
    }

    // ------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------

    pub const fn set_clear_enabled(&mut self, enabled: bool) {
        self.clear_enabled = enabled;
    }

    #[must_use]
    pub const fn is_clear_enabled(&self) -> bool {
        self.clear_enabled
    }

    /// Whether a write of this kind invalidates the cache.
    #[must_use]
    pub fn clears_on(&self, action: WriteAction) -> bool {
        self.clear_enabled && self.config.clear_on.contains(&action)
    }

    /// Whether this terminal call goes through the cache at all.
    /// Requires an active lifetime, a method inside the configured
    /// allow list, and no skip flag on the current request.
    #[must_use]
    pub fn is_cacheable(&self, method: &str, request: &dyn RequestContext) -> bool {
        !self.active_lifetime().is_disabled()
            && (self.config.methods.is_empty() || self.config.methods.contains(method))
            && !request.has(&self.config.skip_flag)
    }

    // ------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------

    /// Hash the fully assembled part list. The serialization is
    /// canonical JSON, so two calls with equal parts always collide.
    pub fn hash(parts: Vec<Value>) -> Result<String, Error> {
        let bytes = serde_json::to_vec(&Value::Array(parts))
            .map_err(|err| Error::backend(err.to_string()))?;

        Ok(format!("{:032x}", xxh3_128(&bytes)))
    }

    #[must_use]
    pub fn cache_key(repository_id: &str, method: &str, hash: &str) -> String {
        format!("{repository_id}@{method}.{hash}")
    }

    // ------------------------------------------------------------
    // Remember / forget
    // ------------------------------------------------------------

    /// Look `method.hash` up in the store. Tagged stores group entries
    /// under the repository id; flat stores use the bare key.
    #[must_use]
    pub fn lookup(&self, repository_id: &str, method: &str, hash: &str) -> Option<Value> {
        if let Some(driver) = self.active_driver() {
            self.store.set_default_driver(driver);
        }

        let key = Self::cache_key(repository_id, method, hash);
        if self.store.supports_tags() {
            self.store.tag_get(repository_id, &key)
        } else {
            self.store.get(&key)
        }
    }

    /// Store one computed result. On the flat-store path the key is
    /// also recorded in the manual index so `forget` can find it
    /// later.
    pub fn put(&self, repository_id: &str, method: &str, hash: &str, value: Value) {
        if let Some(driver) = self.active_driver() {
            self.store.set_default_driver(driver);
        }

        let key = Self::cache_key(repository_id, method, hash);
        let lifetime = self.active_lifetime();
        trace!(%key, ?lifetime, "cache put");

        if self.store.supports_tags() {
            self.store.tag_put(repository_id, &key, value, lifetime);
        } else {
            self.store.put(&key, value, lifetime);
            self.index.append(repository_id, &format!("{method}.{hash}"));
        }
    }

    /// Drop every entry written for this repository. Returns whether
    /// a flush actually ran; a disabled lifetime means nothing was
    /// cached in the first place, so the flush is skipped.
    /// `set_clear_enabled(false)` gates write-triggered invalidation
    /// only, see [`clears_on`](Self::clears_on).
    pub fn forget(&self, repository_id: &str) -> bool {
        if self.active_lifetime().is_disabled() {
            return false;
        }

        if let Some(driver) = self.active_driver() {
            self.store.set_default_driver(driver);
        }

        debug!(repository_id, "flushing cached results");
        if self.store.supports_tags() {
            self.store.flush_tag(repository_id);
        } else {
            for entry in self.index.clear(repository_id) {
                self.store.forget(&format!("{repository_id}@{entry}"));
            }
        }

        true
    }
}
