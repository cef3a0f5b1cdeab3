//! Owned pointer cells.
//!
//! An [`OwnedPointerHandle<T>`] owns one word-sized cell of unmanaged memory
//! holding a [`RawPointer<T>`]. The cell's address is stable for the lifetime of
//! the handle, so it can be handed to native code expecting a `T**`.
//!
//! The cell is freed exactly once: by [`OwnedPointerHandle::release`], or by
//! `Drop` if the handle was never released explicitly.

mod cell;

use std::marker::PhantomData;
use std::ptr::NonNull;

use tracing::debug;

use crate::error::Result;
use crate::pointer::RawPointer;

pub use cell::live_cells;

const CELL_SIZE: usize = size_of::<RawPointer<()>>();

pub struct OwnedPointerHandle<T> {
    cell: NonNull<RawPointer<T>>,
    released: bool,
    _marker: PhantomData<RawPointer<T>>,
}

// The handle owns its cell like a `Box` would; the stored pointer is a plain
// address. Shared mutation still needs external synchronization, so no `Sync`.
unsafe impl<T> Send for OwnedPointerHandle<T> {}

impl<T> OwnedPointerHandle<T> {
    /// Allocate a cell holding a null pointer.
    #[track_caller]
    pub fn new() -> Result<Self> {
        let cell = cell::allocate(CELL_SIZE)?.cast::<RawPointer<T>>();
        Ok(Self {
            cell,
            released: false,
            _marker: PhantomData,
        })
    }

    /// Allocate a cell holding `initial`.
    #[track_caller]
    pub fn with_pointer(initial: RawPointer<T>) -> Result<Self> {
        let mut handle = Self::new()?;
        handle.set_pointer(initial);
        Ok(handle)
    }

    /// The pointer currently stored in the cell. Null once released.
    pub fn pointer(&self) -> RawPointer<T> {
        if self.released {
            return RawPointer::NULL;
        }
        unsafe { self.cell.as_ptr().read() }
    }

    /// Replace the stored pointer. Ignored after release.
    pub fn set_pointer(&mut self, pointer: RawPointer<T>) {
        debug_assert!(!self.released, "set_pointer on a released handle");
        if self.released {
            return;
        }
        unsafe { self.cell.as_ptr().write(pointer) };
    }

    /// Address of the owned cell itself. Null once released.
    pub fn cell(&self) -> RawPointer<RawPointer<T>> {
        if self.released {
            return RawPointer::NULL;
        }
        RawPointer::from_ptr(self.cell.as_ptr())
    }

    pub fn is_null(&self) -> bool {
        self.pointer().is_null()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// # Safety
    ///
    /// See [`RawPointer::as_ref`], applied to the stored pointer.
    pub unsafe fn as_ref<'a>(&self) -> &'a T {
        unsafe { self.pointer().as_ref() }
    }

    /// # Safety
    ///
    /// See [`RawPointer::as_mut`], applied to the stored pointer.
    pub unsafe fn as_mut<'a>(&self) -> &'a mut T {
        unsafe { self.pointer().as_mut() }
    }

    /// # Safety
    ///
    /// See [`RawPointer::read`], applied to the stored pointer.
    pub unsafe fn read(&self) -> T {
        unsafe { self.pointer().read() }
    }

    /// # Safety
    ///
    /// See [`RawPointer::write`], applied to the stored pointer.
    pub unsafe fn write(&self, value: T) {
        unsafe { self.pointer().write(value) }
    }

    /// # Safety
    ///
    /// See [`RawPointer::index`], applied to the stored pointer.
    pub unsafe fn index<'a>(&self, index: isize) -> &'a mut T {
        unsafe { self.pointer().index(index) }
    }

    /// Free the owned cell. Calling this again is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        unsafe { cell::free(self.cell.cast(), CELL_SIZE) };
        debug!("Released pointer cell at {:p}", self.cell);
    }
}

impl<T> Drop for OwnedPointerHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> std::fmt::Debug for OwnedPointerHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedPointerHandle")
            .field("cell", &self.cell())
            .field("pointer", &self.pointer())
            .field("released", &self.released)
            .finish()
    }
}

impl<T> From<&OwnedPointerHandle<T>> for RawPointer<T> {
    fn from(handle: &OwnedPointerHandle<T>) -> Self {
        handle.pointer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_null() {
        let handle = OwnedPointerHandle::<i32>::new().unwrap();
        assert!(handle.is_null());
        assert!(!handle.cell().is_null());
        assert!(!handle.is_released());
    }

    #[test]
    fn test_with_pointer_stores_initial() {
        let initial = RawPointer::<i32>::from_address(0x1000);
        let handle = OwnedPointerHandle::with_pointer(initial).unwrap();
        assert_eq!(handle.pointer(), initial);
        assert_eq!(RawPointer::from(&handle), initial);
    }

    #[test]
    fn test_reassign_stored_pointer() {
        let mut handle = OwnedPointerHandle::<u64>::new().unwrap();
        let cell = handle.cell();
        for address in [0x10usize, 0x20, 0] {
            handle.set_pointer(RawPointer::from_address(address));
            assert_eq!(handle.pointer().address(), address);
            assert_eq!(unsafe { cell.read() }.address(), address);
        }
        assert_eq!(handle.cell(), cell);
    }

    #[test]
    fn test_dereference_goes_through_stored_pointer() {
        let mut values = [7i32, 8, 9];
        let handle =
            OwnedPointerHandle::with_pointer(RawPointer::address_of_mut(&mut values[0])).unwrap();

        unsafe {
            assert_eq!(handle.read(), 7);
            assert_eq!(*handle.as_ref(), 7);
            *handle.index(2) = 90;
            handle.write(70);
            *handle.as_mut() += 1;
        }
        drop(handle);
        assert_eq!(values, [71, 8, 90]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut handle =
            OwnedPointerHandle::with_pointer(RawPointer::<i32>::from_address(0x40)).unwrap();
        handle.release();
        assert!(handle.is_released());
        assert!(handle.pointer().is_null());
        assert!(handle.cell().is_null());
        handle.release();
        assert!(handle.is_released());
    }

    #[test]
    fn test_handle_moves_across_threads() {
        let handle =
            OwnedPointerHandle::with_pointer(RawPointer::<u8>::from_address(0xbeef)).unwrap();
        let address = std::thread::spawn(move || handle.pointer().address())
            .join()
            .unwrap();
        assert_eq!(address, 0xbeef);
    }
}
