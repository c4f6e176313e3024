//! Module: cache::store
//! Responsibility: in-process cache store with expiry and optional
//! tag grouping.
//! Does not own: key construction or invalidation policy.

use crate::{
    traits::CacheStore,
    types::{Lifetime, Value},
};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    time::{Duration, Instant},
};

///
/// Entry
///

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, lifetime: Lifetime) -> Option<Self> {
        match lifetime {
            Lifetime::Disabled => None,
            Lifetime::Forever => Some(Self {
                value,
                expires_at: None,
            }),
            Lifetime::Seconds(secs) => Some(Self {
                value,
                expires_at: Some(Instant::now() + Duration::from_secs(secs)),
            }),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

///
/// MemoryCache
///
/// Process-local store. Cheap to clone; clones share the same
/// underlying maps. Tag support is opt-in so the untagged key-index
/// fallback path stays exercisable.
///

#[derive(Clone, Default)]
pub struct MemoryCache {
    plain: Rc<RefCell<BTreeMap<String, Entry>>>,
    tagged: Rc<RefCell<BTreeMap<String, BTreeMap<String, Entry>>>>,
    tags: bool,
    driver: Rc<RefCell<Option<String>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that advertises tag support.
    #[must_use]
    pub fn with_tags() -> Self {
        Self {
            tags: true,
            ..Self::default()
        }
    }

    /// The driver name most recently selected, if any.
    #[must_use]
    pub fn active_driver(&self) -> Option<String> {
        self.driver.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plain.borrow().len()
            + self
                .tagged
                .borrow()
                .values()
                .map(BTreeMap::len)
                .sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut plain = self.plain.borrow_mut();
        match plain.get(key) {
            Some(entry) if entry.is_expired() => {
                plain.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn put(&self, key: &str, value: Value, lifetime: Lifetime) {
        if let Some(entry) = Entry::new(value, lifetime) {
            self.plain.borrow_mut().insert(key.to_string(), entry);
        }
    }

    fn forget(&self, key: &str) {
        self.plain.borrow_mut().remove(key);
    }

    fn supports_tags(&self) -> bool {
        self.tags
    }

    fn tag_get(&self, tag: &str, key: &str) -> Option<Value> {
        let mut tagged = self.tagged.borrow_mut();
        let bucket = tagged.get_mut(tag)?;
        match bucket.get(key) {
            Some(entry) if entry.is_expired() => {
                bucket.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn tag_put(&self, tag: &str, key: &str, value: Value, lifetime: Lifetime) {
        if let Some(entry) = Entry::new(value, lifetime) {
            self.tagged
                .borrow_mut()
                .entry(tag.to_string())
                .or_default()
                .insert(key.to_string(), entry);
        }
    }

    fn flush_tag(&self, tag: &str) {
        self.tagged.borrow_mut().remove(tag);
    }

    fn set_default_driver(&self, name: &str) {
        *self.driver.borrow_mut() = Some(name.to_string());
    }
}
