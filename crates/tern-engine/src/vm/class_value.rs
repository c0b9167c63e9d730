//! Class-keyed memoized values
//!
//! A `ClassValue` lazily associates one computed value with each runtime
//! class. Two backends exist:
//! - `Slot` stores the value on the `RuntimeClass` itself, so unloading the
//!   class drops it.
//! - `Map` keeps a segmented map keyed by class identity holding only weak
//!   class references; entries of dead or unloaded classes are expunged on
//!   write.
//!
//! The compute function runs outside every lock. When two threads race, the
//! first inserted value wins and both callers return it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::class::RuntimeClass;
use crate::defaults::DEFAULT_CLASS_VALUE_SEGMENTS;
use crate::options::{ClassValueStrategy, RuntimeOptions};

static NEXT_CLASS_VALUE_ID: AtomicU64 = AtomicU64::new(1);

/// Strategy detected once per process
static DETECTED_STRATEGY: Lazy<ClassValueStrategy> = Lazy::new(|| {
    let strategy = ClassValueStrategy::detect();
    tracing::debug!(?strategy, "selected class-value strategy");
    strategy
});

type ComputeFn<T> = dyn Fn(&Arc<RuntimeClass>) -> T + Send + Sync;

struct MapEntry<T> {
    class: Weak<RuntimeClass>,
    value: Arc<T>,
}

impl<T> MapEntry<T> {
    fn is_stale(&self) -> bool {
        self.class.upgrade().map_or(true, |c| !c.is_loaded())
    }
}

struct SegmentedMap<T> {
    segments: Vec<Mutex<FxHashMap<u64, MapEntry<T>>>>,
    mask: u64,
}

impl<T> SegmentedMap<T> {
    fn new(segments: usize) -> Self {
        let count = segments.max(1).next_power_of_two();
        Self {
            segments: (0..count).map(|_| Mutex::new(FxHashMap::default())).collect(),
            mask: (count - 1) as u64,
        }
    }

    fn segment(&self, key: u64) -> &Mutex<FxHashMap<u64, MapEntry<T>>> {
        // Fibonacci hashing spreads sequential class ids across segments
        let hash = key.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32;
        &self.segments[(hash & self.mask) as usize]
    }

    fn get(&self, class: &RuntimeClass) -> Option<Arc<T>> {
        let segment = self.segment(class.id()).lock();
        segment
            .get(&class.id())
            .filter(|e| !e.is_stale())
            .map(|e| Arc::clone(&e.value))
    }

    fn insert_if_absent(&self, class: &Arc<RuntimeClass>, value: Arc<T>) -> Arc<T> {
        let mut segment = self.segment(class.id()).lock();
        segment.retain(|_, e| !e.is_stale());
        let entry = segment.entry(class.id()).or_insert_with(|| MapEntry {
            class: Arc::downgrade(class),
            value,
        });
        Arc::clone(&entry.value)
    }

    fn remove(&self, class: &RuntimeClass) -> Option<Arc<T>> {
        self.segment(class.id())
            .lock()
            .remove(&class.id())
            .map(|e| e.value)
    }

    fn len(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.lock().values().filter(|e| !e.is_stale()).count())
            .sum()
    }
}

enum Backend<T> {
    /// Classes whose slot this value wrote, so dropping the value can clear them
    Slot(Mutex<Vec<Weak<RuntimeClass>>>),
    Map(SegmentedMap<T>),
}

/// Memoized per-class computation
pub struct ClassValue<T> {
    id: u64,
    compute: Box<ComputeFn<T>>,
    backend: Backend<T>,
    computations: AtomicU64,
}

impl<T: Send + Sync + 'static> ClassValue<T> {
    /// Use the process-wide detected strategy
    pub fn new(compute: impl Fn(&Arc<RuntimeClass>) -> T + Send + Sync + 'static) -> Self {
        Self::with_strategy(*DETECTED_STRATEGY, DEFAULT_CLASS_VALUE_SEGMENTS, compute)
    }

    /// Use the strategy pinned by the options, if any
    pub fn from_options(
        options: &RuntimeOptions,
        compute: impl Fn(&Arc<RuntimeClass>) -> T + Send + Sync + 'static,
    ) -> Self {
        let strategy = options.class_value_strategy.unwrap_or(*DETECTED_STRATEGY);
        Self::with_strategy(strategy, options.segments(), compute)
    }

    pub fn with_strategy(
        strategy: ClassValueStrategy,
        segments: usize,
        compute: impl Fn(&Arc<RuntimeClass>) -> T + Send + Sync + 'static,
    ) -> Self {
        let backend = match strategy {
            ClassValueStrategy::Slot => Backend::Slot(Mutex::new(Vec::new())),
            ClassValueStrategy::Map => Backend::Map(SegmentedMap::new(segments)),
        };
        Self {
            id: NEXT_CLASS_VALUE_ID.fetch_add(1, Ordering::Relaxed),
            compute: Box::new(compute),
            backend,
            computations: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> ClassValueStrategy {
        match self.backend {
            Backend::Slot(_) => ClassValueStrategy::Slot,
            Backend::Map(_) => ClassValueStrategy::Map,
        }
    }

    /// Number of times the compute function has run
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    fn run(&self, class: &Arc<RuntimeClass>) -> Arc<T> {
        self.computations.fetch_add(1, Ordering::Relaxed);
        Arc::new((self.compute)(class))
    }

    fn slot_value(&self, class: &RuntimeClass) -> Option<Arc<T>> {
        class.slot(self.id).and_then(|v| v.downcast::<T>().ok())
    }

    /// The memoized value for `class`, computing it on first use
    pub fn get(&self, class: &Arc<RuntimeClass>) -> Arc<T> {
        match &self.backend {
            Backend::Slot(written) => {
                if let Some(value) = self.slot_value(class) {
                    return value;
                }
                let computed = self.run(class);
                let stored: Arc<dyn Any + Send + Sync> = computed.clone();
                let visible = class.slot_insert_if_absent(self.id, stored);
                if class.slot(self.id).is_some() {
                    let mut written = written.lock();
                    written.retain(|c| c.strong_count() > 0);
                    if !written.iter().any(|c| c.as_ptr() == Arc::as_ptr(class)) {
                        written.push(Arc::downgrade(class));
                    }
                }
                visible.downcast::<T>().unwrap_or(computed)
            }
            Backend::Map(map) => {
                if let Some(value) = map.get(class) {
                    return value;
                }
                let computed = self.run(class);
                if !class.is_loaded() {
                    return computed;
                }
                map.insert_if_absent(class, computed)
            }
        }
    }

    /// Evict the value for `class`; the next `get` recomputes
    pub fn remove(&self, class: &RuntimeClass) -> Option<Arc<T>> {
        match &self.backend {
            Backend::Slot(_) => class
                .slot_remove(self.id)
                .and_then(|v| v.downcast::<T>().ok()),
            Backend::Map(map) => map.remove(class),
        }
    }

    /// Whether a value is currently memoized for `class`
    pub fn contains(&self, class: &RuntimeClass) -> bool {
        match &self.backend {
            Backend::Slot(_) => self.slot_value(class).is_some(),
            Backend::Map(map) => map.get(class).is_some(),
        }
    }

    /// Live entries of the map backend; slot values are not enumerable
    pub fn map_len(&self) -> Option<usize> {
        match &self.backend {
            Backend::Slot(_) => None,
            Backend::Map(map) => Some(map.len()),
        }
    }
}

impl<T> Drop for ClassValue<T> {
    fn drop(&mut self) {
        if let Backend::Slot(written) = &mut self.backend {
            for class in written.get_mut().drain(..).filter_map(|c| c.upgrade()) {
                class.slot_remove(self.id);
            }
        }
    }
}

impl<T> fmt::Debug for ClassValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.backend {
            Backend::Slot(_) => "slot",
            Backend::Map(_) => "map",
        };
        f.debug_struct("ClassValue")
            .field("id", &self.id)
            .field("strategy", &strategy)
            .field("computations", &self.computations.load(Ordering::Relaxed))
            .finish()
    }
}
