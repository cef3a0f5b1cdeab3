//! Virtual function resolution.
//!
//! Native objects modeled here start with a pointer to their vtable, an array
//! of function pointers shared by every instance of the same type:
//!
//! ```text
//! object ──► [ vtable* | fields... ]
//!                 │
//!                 ▼
//!            [ fn0 | fn1 | fn2 | fn3 | ... ]
//! ```
//!
//! [`VirtualCallResolver::resolve`] follows both levels and binds the slot's
//! function address as a typed function pointer, caching the binding by
//! function address with a sliding expiration.
//!
//! ## Example
//!
//! ```ignore
//! type GetHealth = unsafe extern "thiscall" fn(this: *mut c_void) -> i32;
//!
//! let get_health: GetHealth = unsafe { vcall::resolve(object, 12)? };
//! let health = unsafe { get_health(object.as_ptr()) };
//! ```

mod binding;
mod cache;

use std::ffi::c_void;
use std::sync::OnceLock;

use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::pointer::RawPointer;

pub use binding::{CallingConvention, NativeFn, bind};
pub use cache::{BindingCache, CacheStats};

static GLOBAL: OnceLock<VirtualCallResolver> = OnceLock::new();

/// Resolves vtable slots to typed callables through a shared binding cache.
#[derive(Debug, Default)]
pub struct VirtualCallResolver {
    cache: BindingCache,
}

impl VirtualCallResolver {
    /// Create a resolver with its own cache. Fails if `config` does not
    /// validate.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Ok(Self {
            cache: BindingCache::new(config)?,
        })
    }

    /// The process-wide resolver, created with default settings on first use
    /// unless [`init_global`] ran earlier.
    pub fn global() -> &'static VirtualCallResolver {
        GLOBAL.get_or_init(|| {
            debug!("Initializing global resolver with default config");
            VirtualCallResolver::default()
        })
    }

    /// Pointer to the object's vtable, read from its first word.
    ///
    /// # Safety
    ///
    /// `object` must point to a live object whose first field is its vtable
    /// pointer.
    pub unsafe fn vtable_of(object: RawPointer<c_void>) -> RawPointer<RawPointer<c_void>> {
        unsafe { object.cast::<RawPointer<RawPointer<c_void>>>().read() }
    }

    /// Function address stored in vtable slot `slot` of `object`.
    ///
    /// # Safety
    ///
    /// As for [`vtable_of`](Self::vtable_of), and `slot` must lie within the
    /// vtable. Nothing is bounds checked.
    pub unsafe fn vtable_slot_address(object: RawPointer<c_void>, slot: usize) -> RawPointer<c_void> {
        unsafe { Self::vtable_of(object).element_at(slot as isize).read() }
    }

    /// Resolve vtable slot `slot` of `object` as a callable of type `F`.
    ///
    /// Instances of one native type share a vtable, so they resolve to the
    /// same cached binding.
    ///
    /// # Safety
    ///
    /// As for [`vtable_slot_address`](Self::vtable_slot_address). The slot must
    /// hold a function with signature `F`, and callers must use the same `F`
    /// for a given function.
    #[track_caller]
    pub unsafe fn resolve<F: NativeFn>(&self, object: RawPointer<c_void>, slot: usize) -> Result<F> {
        let address = unsafe { Self::vtable_slot_address(object, slot) };
        unsafe { self.cache.get_or_bind::<F>(address.address()) }
    }

    pub fn cache(&self) -> &BindingCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Install `config` for the process-wide resolver.
///
/// Returns `false` if the global resolver already exists, in which case its
/// configuration is left unchanged.
pub fn init_global(config: &ResolverConfig) -> Result<bool> {
    let resolver = VirtualCallResolver::new(config)?;
    let installed = GLOBAL.set(resolver).is_ok();
    if installed {
        info!(
            "Global resolver initialized (eviction window: {}ms)",
            config.eviction_window_ms
        );
    }
    Ok(installed)
}

/// Drop every binding held by the process-wide resolver.
///
/// The cache is rebuilt on demand afterwards. Does nothing if the global
/// resolver was never used.
pub fn shutdown_global() {
    if let Some(resolver) = GLOBAL.get() {
        resolver.cache.clear();
    }
}

/// [`VirtualCallResolver::resolve`] on the process-wide resolver.
///
/// # Safety
///
/// See [`VirtualCallResolver::resolve`].
#[track_caller]
pub unsafe fn resolve<F: NativeFn>(object: RawPointer<c_void>, slot: usize) -> Result<F> {
    unsafe { VirtualCallResolver::global().resolve(object, slot) }
}

/// [`VirtualCallResolver::vtable_slot_address`].
///
/// # Safety
///
/// See [`VirtualCallResolver::vtable_slot_address`].
pub unsafe fn vtable_slot_address(object: RawPointer<c_void>, slot: usize) -> RawPointer<c_void> {
    unsafe { VirtualCallResolver::vtable_slot_address(object, slot) }
}
