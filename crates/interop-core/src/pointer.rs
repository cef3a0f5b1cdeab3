//! Typed views over raw addresses.
//!
//! [`RawPointer<T>`] is a machine word tagged with a pointee type. It never owns
//! the memory it addresses and never validates it: arithmetic is scaled by
//! `size_of::<T>()`, reinterpretation only swaps the type tag, and every
//! dereference is an `unsafe fn` whose preconditions are the caller's to uphold.

use std::any::type_name;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ops::{Add, Sub};
use std::slice;

/// A raw address into native memory, viewed as pointing at a `T`.
///
/// Equality, ordering and hashing look at the address only.
#[repr(transparent)]
pub struct RawPointer<T> {
    address: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RawPointer<T> {
    /// The all-zero address.
    pub const NULL: Self = Self::from_address(0);

    /// Wrap an address. No validation is performed.
    pub const fn from_address(address: usize) -> Self {
        Self {
            address,
            _marker: PhantomData,
        }
    }

    pub const fn null() -> Self {
        Self::NULL
    }

    pub fn from_ptr(ptr: *const T) -> Self {
        Self::from_address(ptr as usize)
    }

    /// Address of an existing value.
    pub fn address_of(value: &T) -> Self {
        Self::from_ptr(value)
    }

    pub fn address_of_mut(value: &mut T) -> Self {
        Self::from_ptr(value)
    }

    pub const fn address(self) -> usize {
        self.address
    }

    pub const fn is_null(self) -> bool {
        self.address == 0
    }

    pub fn as_ptr(self) -> *mut T {
        self.address as *mut T
    }

    /// Size of the pointee in bytes, the stride used by element arithmetic.
    pub const fn type_size() -> usize {
        mem::size_of::<T>()
    }

    /// Pointer to the `index`-th element, `address + index * size_of::<T>()`.
    ///
    /// Wraps on overflow like native pointer arithmetic.
    pub const fn element_at(self, index: isize) -> Self {
        let stride = Self::type_size() as isize;
        Self::from_address(self.address.wrapping_add_signed(index.wrapping_mul(stride)))
    }

    /// Pointer moved by a number of bytes, ignoring the pointee size.
    pub const fn byte_offset(self, bytes: isize) -> Self {
        Self::from_address(self.address.wrapping_add_signed(bytes))
    }

    /// Same address, different pointee type. Always succeeds.
    pub const fn cast<U>(self) -> RawPointer<U> {
        RawPointer::from_address(self.address)
    }

    /// Borrow the pointee.
    ///
    /// # Safety
    ///
    /// The address must be non-null, aligned for `T`, and point to an
    /// initialized `T` that stays live and unaliased by writers for `'a`.
    pub unsafe fn as_ref<'a>(self) -> &'a T {
        unsafe { &*self.as_ptr() }
    }

    /// Mutably borrow the pointee.
    ///
    /// # Safety
    ///
    /// Same as [`as_ref`](Self::as_ref), and no other reference to the pointee
    /// may be used while the returned one is live.
    pub unsafe fn as_mut<'a>(self) -> &'a mut T {
        unsafe { &mut *self.as_ptr() }
    }

    /// Copy the pointee out.
    ///
    /// # Safety
    ///
    /// The address must be valid for reads of `T` and properly aligned.
    pub unsafe fn read(self) -> T {
        unsafe { self.as_ptr().read() }
    }

    /// Overwrite the pointee without dropping the previous value.
    ///
    /// # Safety
    ///
    /// The address must be valid for writes of `T` and properly aligned.
    pub unsafe fn write(self, value: T) {
        unsafe { self.as_ptr().write(value) }
    }

    /// Mutable reference to the `index`-th element.
    ///
    /// # Safety
    ///
    /// See [`as_mut`](Self::as_mut), applied to `self.element_at(index)`.
    pub unsafe fn index<'a>(self, index: isize) -> &'a mut T {
        unsafe { self.element_at(index).as_mut() }
    }

    /// View `len` consecutive elements as a slice.
    ///
    /// # Safety
    ///
    /// The address must be non-null, aligned, and valid for reads of
    /// `len * size_of::<T>()` bytes of initialized `T`s for `'a`.
    pub unsafe fn as_slice<'a>(self, len: usize) -> &'a [T] {
        unsafe { slice::from_raw_parts(self.as_ptr(), len) }
    }

    /// Mutable variant of [`as_slice`](Self::as_slice).
    ///
    /// # Safety
    ///
    /// As for [`as_slice`](Self::as_slice), plus exclusive access for `'a`.
    pub unsafe fn as_mut_slice<'a>(self, len: usize) -> &'a mut [T] {
        unsafe { slice::from_raw_parts_mut(self.as_ptr(), len) }
    }
}

/// Reference to the `index`-th `T` starting at `address`.
///
/// # Safety
///
/// See [`RawPointer::index`].
pub unsafe fn unmanaged_ref<'a, T>(address: usize, index: isize) -> &'a mut T {
    unsafe { RawPointer::<T>::from_address(address).index(index) }
}

/// Reinterpret the bits of `value` as a `Dst`.
///
/// # Safety
///
/// `Dst` must not be larger than `Src`, and the bytes of `value` must form a
/// valid `Dst`. Ownership of `value` moves into the result; it is not dropped.
pub unsafe fn force_convert<Src, Dst>(value: Src) -> Dst {
    debug_assert!(mem::size_of::<Dst>() <= mem::size_of::<Src>());
    let value = ManuallyDrop::new(value);
    unsafe { mem::transmute_copy::<ManuallyDrop<Src>, Dst>(&value) }
}

impl<T> Clone for RawPointer<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RawPointer<T> {}

impl<T> Default for RawPointer<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T> PartialEq for RawPointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl<T> Eq for RawPointer<T> {}

impl<T> PartialOrd for RawPointer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for RawPointer<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl<T> Hash for RawPointer<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl<T> Add<isize> for RawPointer<T> {
    type Output = Self;

    fn add(self, index: isize) -> Self {
        self.element_at(index)
    }
}

impl<T> Sub<isize> for RawPointer<T> {
    type Output = Self;

    fn sub(self, index: isize) -> Self {
        self.element_at(index.wrapping_neg())
    }
}

impl<T> fmt::Debug for RawPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPointer<{}>({:#x})", type_name::<T>(), self.address)
    }
}

impl<T> fmt::Display for RawPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.address)
    }
}

impl<T> fmt::LowerHex for RawPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.address, f)
    }
}

impl<T> fmt::UpperHex for RawPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.address, f)
    }
}

impl<T> From<usize> for RawPointer<T> {
    fn from(address: usize) -> Self {
        Self::from_address(address)
    }
}

impl<T> From<*const T> for RawPointer<T> {
    fn from(ptr: *const T) -> Self {
        Self::from_ptr(ptr)
    }
}

impl<T> From<*mut T> for RawPointer<T> {
    fn from(ptr: *mut T) -> Self {
        Self::from_ptr(ptr)
    }
}

impl<T> From<RawPointer<T>> for usize {
    fn from(ptr: RawPointer<T>) -> Self {
        ptr.address
    }
}
