//! Runtime call sites
//!
//! A `CallSite` caches the member resolved for each (receiver class,
//! argument shape) pair it has seen, at most one entry per pair. Entries are
//! stamped with the cache-wide modification count at resolution time; a
//! stale entry is re-resolved and replaced on its next use.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::class::RuntimeClass;
use super::reflect::{ArgShape, MemberHandle, MemberResolver, ReflectionCache};
use super::DispatchError;
use crate::compiler::invocation::CallSiteTable;

/// Name used by constructor call sites
pub const CONSTRUCTOR_SITE_NAME: &str = "<init>";

#[derive(Debug, Clone)]
struct CallSiteEntry {
    handle: MemberHandle,
    stamp: u64,
}

/// Hit/miss counters of a call site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSiteStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// One dynamic call location
pub struct CallSite {
    index: usize,
    name: String,
    entries: DashMap<(u64, ArgShape), CallSiteEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl CallSite {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn constructor(index: usize) -> Self {
        Self::new(index, CONSTRUCTOR_SITE_NAME)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_SITE_NAME
    }

    /// Resolve the member for a receiver class and argument shape
    pub fn resolve(
        &self,
        cache: &ReflectionCache,
        receiver: &Arc<RuntimeClass>,
        shape: ArgShape,
    ) -> Result<MemberHandle, DispatchError> {
        let stamp = cache.modification_count();
        let key = (receiver.id(), shape);

        let cached = self
            .entries
            .get(&key)
            .map(|e| (e.stamp, e.handle.clone()));
        match cached {
            Some((entry_stamp, handle)) if entry_stamp == stamp => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(handle);
            }
            Some(_) => {
                self.invalidations.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(site = self.index, name = %self.name, receiver = %receiver.name(), arity = shape.arity, "call-site miss");

        let info = cache.class_info(receiver)?;
        let resolved = if self.is_constructor() {
            info.resolve_constructor(shape)?
        } else {
            info.resolve_member(&self.name, shape)?
        };
        let handle = resolved.ok_or_else(|| self.missing(receiver, shape))?;

        self.entries.insert(
            key,
            CallSiteEntry {
                handle: handle.clone(),
                stamp,
            },
        );
        Ok(handle)
    }

    fn missing(&self, receiver: &RuntimeClass, shape: ArgShape) -> DispatchError {
        if self.is_constructor() {
            DispatchError::MissingConstructor {
                class: receiver.name().to_string(),
                arity: shape.arity,
            }
        } else {
            DispatchError::MissingMethod {
                class: receiver.name().to_string(),
                name: self.name.clone(),
                arity: shape.arity,
            }
        }
    }

    /// Number of cached (receiver, shape) entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> CallSiteStats {
        CallSiteStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("stats", &self.stats())
            .finish()
    }
}

/// All call sites of one compiled class
#[derive(Debug)]
pub struct CallSiteArray {
    owner: String,
    sites: Vec<CallSite>,
}

impl CallSiteArray {
    /// Build runtime sites from the table the invocation pass produced
    pub fn from_table(table: &CallSiteTable) -> Self {
        let sites = table
            .iter()
            .map(|(index, key)| CallSite::new(index, key.name.clone()))
            .collect();
        Self {
            owner: table.owner().to_string(),
            sites,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn get(&self, index: usize) -> Option<&CallSite> {
        self.sites.get(index)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallSite> {
        self.sites.iter()
    }
}
