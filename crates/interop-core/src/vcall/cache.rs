//! Sliding-expiration cache of bound callables.
//!
//! Keyed by function address, so every object whose vtable points at the same
//! function shares one entry. Entries are type-erased: the cache trusts the
//! caller to request one signature per address.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::binding::{self, NativeFn};
use crate::config::ResolverConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
struct Binding {
    signature: &'static str,
    last_access: Instant,
}

#[derive(Debug)]
struct CacheState {
    bindings: HashMap<usize, Binding>,
    last_sweep: Instant,
}

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
pub struct BindingCache {
    state: Mutex<CacheState>,
    window: Duration,
    sweep_interval: Duration,
    check_signatures: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl BindingCache {
    /// Create an empty cache, rejecting configurations that fail
    /// [`ResolverConfig::validate`].
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: &ResolverConfig) -> Self {
        Self {
            state: Mutex::new(CacheState {
                bindings: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            window: config.eviction_window(),
            sweep_interval: config.sweep_interval(),
            check_signatures: config.signature_checks_enabled(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the binding for `address`, creating it on a miss.
    ///
    /// A hit refreshes the entry's last-access time. An entry past the
    /// eviction window is dropped and rebuilt.
    ///
    /// # Safety
    ///
    /// A non-null `address` must point at code matching `F`, and every caller
    /// must request the same `F` for a given address.
    #[track_caller]
    pub unsafe fn get_or_bind<F: NativeFn>(&self, address: usize) -> Result<F> {
        let now = Instant::now();
        let mut state = self.lock();

        if now.saturating_duration_since(state.last_sweep) >= self.sweep_interval {
            self.sweep(&mut state, now);
        }

        let mut expired = false;
        if let Some(entry) = state.bindings.get_mut(&address) {
            if now.saturating_duration_since(entry.last_access) < self.window {
                entry.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                if self.check_signatures && entry.signature != F::signature() {
                    warn!(
                        "Binding at {:#x} cached as `{}` but requested as `{}`",
                        address,
                        entry.signature,
                        F::signature()
                    );
                }
                trace!("Binding cache hit at {:#x}", address);
                return Ok(unsafe { F::from_address(address) });
            }
            expired = true;
        }
        if expired {
            state.bindings.remove(&address);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        let callable = unsafe { binding::bind::<F>(address)? };
        self.misses.fetch_add(1, Ordering::Relaxed);
        state.bindings.insert(
            address,
            Binding {
                signature: F::signature(),
                last_access: now,
            },
        );
        debug!("Bound `{}` at {:#x}", F::signature(), address);
        Ok(callable)
    }

    /// Drop every entry unused for longer than the eviction window.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.lock();
        self.sweep(&mut state, Instant::now())
    }

    pub fn contains(&self, address: usize) -> bool {
        self.lock().bindings.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.lock().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        let removed = state.bindings.len();
        state.bindings.clear();
        debug!("Cleared {} cached bindings", removed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn eviction_window(&self) -> Duration {
        self.window
    }

    fn sweep(&self, state: &mut CacheState, now: Instant) -> usize {
        let before = state.bindings.len();
        let window = self.window;
        state
            .bindings
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) < window);
        state.last_sweep = now;

        let removed = before - state.bindings.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Evicted {} expired bindings", removed);
        }
        removed
    }

    // Entries stay consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BindingCache {
    fn default() -> Self {
        Self::with_validated(&ResolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::thread;

    extern "C" fn one() -> i32 {
        1
    }

    extern "C" fn two() -> i32 {
        2
    }

    type Getter = extern "C" fn() -> i32;

    fn short_lived() -> BindingCache {
        BindingCache::new(
            &ResolverConfig::builder()
                .eviction_window(Duration::from_millis(100))
                .sweep_interval(Duration::from_secs(3600))
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = BindingCache::default();
        let address = (one as Getter).address();

        let first: Getter = unsafe { cache.get_or_bind(address) }.unwrap();
        let second: Getter = unsafe { cache.get_or_bind(address) }.unwrap();

        assert_eq!(first(), 1);
        assert_eq!(second.address(), first.address());
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_distinct_addresses_get_distinct_entries() {
        let cache = BindingCache::default();
        let a: Getter = unsafe { cache.get_or_bind((one as Getter).address()) }.unwrap();
        let b: Getter = unsafe { cache.get_or_bind((two as Getter).address()) }.unwrap();
        assert_eq!((a(), b()), (1, 2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_null_address_is_not_cached() {
        let cache = BindingCache::default();
        assert!(unsafe { cache.get_or_bind::<Getter>(0) }.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_expired_entry_is_rebuilt() {
        let cache = short_lived();
        let address = (one as Getter).address();

        let before: Getter = unsafe { cache.get_or_bind(address) }.unwrap();
        thread::sleep(Duration::from_millis(150));
        let after: Getter = unsafe { cache.get_or_bind(address) }.unwrap();

        assert_eq!(after.address(), before.address());
        assert_eq!(after(), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = short_lived();
        let _: Getter = unsafe { cache.get_or_bind((one as Getter).address()) }.unwrap();
        assert_eq!(cache.purge_expired(), 0);

        thread::sleep(Duration::from_millis(150));
        let _: Getter = unsafe { cache.get_or_bind((two as Getter).address()) }.unwrap();

        assert_eq!(cache.purge_expired(), 1);
        assert!(!cache.contains((one as Getter).address()));
        assert!(cache.contains((two as Getter).address()));
    }

    #[test]
    fn test_access_slides_expiration() {
        let cache = BindingCache::new(
            &ResolverConfig::builder()
                .eviction_window(Duration::from_millis(500))
                .build()
                .unwrap(),
        )
        .unwrap();
        let address = (one as Getter).address();
        let _: Getter = unsafe { cache.get_or_bind(address) }.unwrap();
        for _ in 0..4 {
            thread::sleep(Duration::from_millis(80));
            let _: Getter = unsafe { cache.get_or_bind(address) }.unwrap();
        }
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 4);
    }

    #[test]
    fn test_clear() {
        let cache = BindingCache::default();
        let _: Getter = unsafe { cache.get_or_bind((one as Getter).address()) }.unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_new_rejects_zero_window() {
        let config = ResolverConfig {
            eviction_window_ms: 0,
            ..ResolverConfig::default()
        };
        let err = BindingCache::new(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_one_millisecond_window_still_hits() {
        let cache = BindingCache::new(
            &ResolverConfig::builder()
                .eviction_window(Duration::from_millis(1))
                .sweep_interval(Duration::from_secs(3600))
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(cache.eviction_window(), Duration::from_millis(1));
        let address = (one as Getter).address();
        let _: Getter = unsafe { cache.get_or_bind(address) }.unwrap();
        assert!(cache.contains(address));
    }

    #[test]
    fn test_signature_mismatch_still_returns_requested_type() {
        type Widened = extern "C" fn(i32) -> i32;

        let cache = BindingCache::new(
            &ResolverConfig::builder()
                .check_signatures(true)
                .build()
                .unwrap(),
        )
        .unwrap();
        let address = (one as Getter).address();

        let first: Getter = unsafe { cache.get_or_bind(address) }.unwrap();
        let second: Widened = unsafe { cache.get_or_bind(address) }.unwrap();

        assert_eq!(second.address(), first.address());
        assert_eq!(Widened::signature(), std::any::type_name::<Widened>());
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.evictions, 0);
    }
}
