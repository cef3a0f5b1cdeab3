//! Prelude module for convenient imports
//!
//! ```ignore
//! use interop_core::prelude::*;
//! ```
//!
//! This brings the following into scope:
//!
//! - Pointers: `RawPointer`, `OwnedPointerHandle`
//! - Virtual calls: `VirtualCallResolver`, `NativeFn`
//! - Error handling: `Error`, `Result`

pub use crate::error::{Error, Result};
pub use crate::handle::OwnedPointerHandle;
pub use crate::pointer::RawPointer;
pub use crate::vcall::{NativeFn, VirtualCallResolver};
