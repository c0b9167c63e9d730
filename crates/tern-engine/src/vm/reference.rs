//! Revocable compute-once references
//!
//! A `LazyReference` computes its value on first use and keeps it until the
//! `ReferenceManager` reclaims it. Reclamation resets the slot to uncomputed;
//! the next access recomputes. Values must therefore be pure functions of
//! their inputs.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

/// How eagerly a reference may be reclaimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceStrength {
    /// Reclaimed only under high memory pressure
    Soft,
    /// Reclaimed under any memory pressure
    Weak,
}

/// Simulated memory pressure passed to `ReferenceManager::reclaim`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryPressure {
    /// Clears weak references
    Low,
    /// Clears weak and soft references
    High,
}

impl MemoryPressure {
    fn reclaims(self, strength: ReferenceStrength) -> bool {
        match (self, strength) {
            (MemoryPressure::High, _) => true,
            (MemoryPressure::Low, ReferenceStrength::Weak) => true,
            (MemoryPressure::Low, ReferenceStrength::Soft) => false,
        }
    }
}

/// Something the manager can reset
pub trait Reclaimable: Send + Sync {
    fn strength(&self) -> ReferenceStrength;

    /// Drop the held value; returns whether one was held
    fn reclaim(&self) -> bool;
}

/// Registry of live revocable references
#[derive(Default)]
pub struct ReferenceManager {
    entries: Mutex<Vec<Weak<dyn Reclaimable>>>,
    reclaimed: AtomicU64,
}

impl ReferenceManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, reference: Weak<dyn Reclaimable>) {
        self.entries.lock().push(reference);
    }

    /// Reset every reference the pressure level allows; returns how many
    /// held a value. Dead registrations are pruned on the way.
    pub fn reclaim(&self, pressure: MemoryPressure) -> usize {
        let live: Vec<Arc<dyn Reclaimable>> = {
            let mut entries = self.entries.lock();
            entries.retain(|e| e.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };

        let cleared = live
            .iter()
            .filter(|r| pressure.reclaims(r.strength()))
            .filter(|r| r.reclaim())
            .count();
        self.reclaimed.fetch_add(cleared as u64, Ordering::Relaxed);
        tracing::debug!(?pressure, cleared, registered = live.len(), "reclaimed references");
        cleared
    }

    /// Number of registrations whose reference is still alive
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.strong_count() > 0)
            .count()
    }

    /// Total values reclaimed over the manager's lifetime
    pub fn total_reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ReferenceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceManager")
            .field("entries", &self.entries.lock().len())
            .field("reclaimed", &self.total_reclaimed())
            .finish()
    }
}

/// Compute-once slot with revocable residency
pub struct LazyReference<T> {
    strength: ReferenceStrength,
    value: RwLock<Option<Arc<T>>>,
    /// Serializes computations of this slot
    init: Mutex<()>,
    generation: AtomicU64,
    computations: AtomicU64,
    registered: AtomicBool,
    manager: Arc<ReferenceManager>,
    this: Weak<LazyReference<T>>,
}

impl<T: Send + Sync + 'static> LazyReference<T> {
    pub fn new(strength: ReferenceStrength, manager: Arc<ReferenceManager>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            strength,
            value: RwLock::new(None),
            init: Mutex::new(()),
            generation: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            registered: AtomicBool::new(false),
            manager,
            this: this.clone(),
        })
    }

    /// The held value, without computing
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().clone()
    }

    pub fn get_or_init(&self, compute: impl FnOnce() -> T) -> Arc<T> {
        match self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Return the held value or compute it. Concurrent first callers block on
    /// the slot's init lock and all observe the same `Arc`. A failed
    /// computation leaves the slot empty.
    pub fn get_or_try_init<E>(&self, compute: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let _guard = self.init.lock();
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let value = Arc::new(compute()?);
        self.computations.fetch_add(1, Ordering::Relaxed);
        *self.value.write() = Some(Arc::clone(&value));

        if !self.registered.swap(true, Ordering::AcqRel) {
            let weak: Weak<dyn Reclaimable> = self.this.clone();
            self.manager.register(weak);
        }
        Ok(value)
    }

    /// Drop the held value; the next access recomputes
    pub fn clear(&self) -> bool {
        let had_value = self.value.write().take().is_some();
        if had_value {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        had_value
    }

    pub fn is_computed(&self) -> bool {
        self.value.read().is_some()
    }

    pub fn strength(&self) -> ReferenceStrength {
        self.strength
    }

    /// Incremented every time a held value is dropped
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of completed computations
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }
}

impl<T: Send + Sync + 'static> Reclaimable for LazyReference<T> {
    fn strength(&self) -> ReferenceStrength {
        self.strength
    }

    fn reclaim(&self) -> bool {
        self.clear()
    }
}

impl<T> fmt::Debug for LazyReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReference")
            .field("strength", &self.strength)
            .field("computed", &self.value.read().is_some())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
