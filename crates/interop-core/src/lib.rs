//! # interop-core
//!
//! Low-level interop with native code living in the current process.
//!
//! This crate provides:
//! - [`RawPointer<T>`]: typed, unchecked views over raw addresses
//! - [`OwnedPointerHandle<T>`]: an owned, system-allocated pointer cell
//! - [`VirtualCallResolver`]: vtable slot resolution with a shared binding cache
//! - Error cause-chain reporting through `tracing`
//!
//! ## Feature Flags
//!
//! - `signature-checks`: keeps binding signature checks active in release builds.
//!   They are otherwise limited to debug builds.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handle;
pub mod pointer;
pub mod prelude;
pub mod vcall;

pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use diagnostics::{ErrorReport, report_error};
pub use error::{Error, ErrorKind, Result};
pub use handle::{OwnedPointerHandle, live_cells};
pub use pointer::{RawPointer, force_convert, unmanaged_ref};
pub use vcall::{
    BindingCache, CacheStats, CallingConvention, NativeFn, VirtualCallResolver, init_global,
    shutdown_global,
};
