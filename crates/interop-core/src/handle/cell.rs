//! Word-sized cells taken straight from the system allocator.
//!
//! Cells are zero-filled. On Windows they come from `LocalAlloc`, the same heap
//! native code uses for `HLOCAL` buffers; elsewhere from the global allocator.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{trace, warn};

use crate::error::{Error, Result};

static LIVE_CELLS: AtomicUsize = AtomicUsize::new(0);

/// Number of cells currently allocated and not yet freed.
pub fn live_cells() -> usize {
    LIVE_CELLS.load(Ordering::SeqCst)
}

#[track_caller]
pub(crate) fn allocate(size: usize) -> Result<NonNull<u8>> {
    let cell = match sys::allocate(size) {
        Ok(cell) => cell,
        Err(source) => {
            warn!("Failed to allocate {}-byte cell: {}", size, source);
            return Err(Error::allocation(size, Some(source)));
        }
    };

    LIVE_CELLS.fetch_add(1, Ordering::SeqCst);
    trace!("Allocated {}-byte cell at {:p}", size, cell);
    Ok(cell)
}

/// # Safety
///
/// `cell` must come from [`allocate`] with the same `size` and must not have
/// been freed already.
pub(crate) unsafe fn free(cell: NonNull<u8>, size: usize) {
    unsafe { sys::free(cell, size) };
    LIVE_CELLS.fetch_sub(1, Ordering::SeqCst);
    trace!("Freed {}-byte cell at {:p}", size, cell);
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[cfg(target_os = "windows")]
mod sys {
    use std::ptr::NonNull;

    use windows::Win32::Foundation::{HLOCAL, LocalFree};
    use windows::Win32::System::Memory::{LPTR, LocalAlloc};

    use super::BoxError;

    pub(super) fn allocate(size: usize) -> Result<NonNull<u8>, BoxError> {
        let handle = unsafe { LocalAlloc(LPTR, size) }?;
        NonNull::new(handle.0.cast::<u8>()).ok_or_else(|| "LocalAlloc returned null".into())
    }

    pub(super) unsafe fn free(cell: NonNull<u8>, _size: usize) {
        unsafe {
            LocalFree(HLOCAL(cell.as_ptr().cast()));
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod sys {
    use std::alloc::{self, Layout};
    use std::ptr::NonNull;

    use super::BoxError;

    fn layout(size: usize) -> Result<Layout, BoxError> {
        Ok(Layout::from_size_align(size.max(1), align_of::<usize>())?)
    }

    pub(super) fn allocate(size: usize) -> Result<NonNull<u8>, BoxError> {
        let layout = layout(size)?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or_else(|| "global allocator returned null".into())
    }

    pub(super) unsafe fn free(cell: NonNull<u8>, size: usize) {
        // The layout was valid when the cell was allocated.
        if let Ok(layout) = layout(size) {
            unsafe { alloc::dealloc(cell.as_ptr(), layout) };
        }
    }
}
