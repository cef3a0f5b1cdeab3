//! Binding raw function addresses to typed function pointers.

use std::any::type_name;

use strum::{Display, IntoStaticStr};

use crate::error::{Error, Result};

/// Calling convention of a bound function pointer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CallingConvention {
    C,
    /// MSVC member functions on 32-bit x86.
    ThisCall,
    StdCall,
}

/// A function pointer type that can be rebuilt from a bare address.
///
/// # Safety
///
/// Implementors must be exactly one machine word wide and contain nothing but
/// the code address, so that `from_address(f.address())` yields `f` again.
pub unsafe trait NativeFn: Copy + Send + Sync + 'static {
    const CONVENTION: CallingConvention;
    const ARITY: usize;

    /// # Safety
    ///
    /// `address` must be non-null and point at code with this exact signature
    /// and calling convention.
    unsafe fn from_address(address: usize) -> Self;

    fn address(self) -> usize;

    /// Type name used as the signature tag in diagnostics.
    fn signature() -> &'static str {
        type_name::<Self>()
    }
}

/// Bind `address` as `F`.
///
/// Null is the one address no Rust function pointer can hold; it is reported
/// as [`Error::InvalidBinding`] rather than producing an invalid value.
///
/// # Safety
///
/// A non-null `address` must point at code matching `F`.
#[track_caller]
pub unsafe fn bind<F: NativeFn>(address: usize) -> Result<F> {
    if address == 0 {
        return Err(Error::binding(address, F::signature(), "null function address"));
    }
    Ok(unsafe { F::from_address(address) })
}

macro_rules! impl_native_fn {
    ($abi:tt, $conv:expr, $arity:expr; $($arg:ident),*) => {
        unsafe impl<R: 'static, $($arg: 'static),*> NativeFn for extern $abi fn($($arg),*) -> R {
            const CONVENTION: CallingConvention = $conv;
            const ARITY: usize = $arity;

            unsafe fn from_address(address: usize) -> Self {
                unsafe { std::mem::transmute_copy::<usize, Self>(&address) }
            }

            fn address(self) -> usize {
                self as usize
            }
        }

        unsafe impl<R: 'static, $($arg: 'static),*> NativeFn for unsafe extern $abi fn($($arg),*) -> R {
            const CONVENTION: CallingConvention = $conv;
            const ARITY: usize = $arity;

            unsafe fn from_address(address: usize) -> Self {
                unsafe { std::mem::transmute_copy::<usize, Self>(&address) }
            }

            fn address(self) -> usize {
                self as usize
            }
        }
    };
}

macro_rules! impl_native_fn_arities {
    ($abi:tt, $conv:expr) => {
        impl_native_fn!($abi, $conv, 0;);
        impl_native_fn!($abi, $conv, 1; A1);
        impl_native_fn!($abi, $conv, 2; A1, A2);
        impl_native_fn!($abi, $conv, 3; A1, A2, A3);
        impl_native_fn!($abi, $conv, 4; A1, A2, A3, A4);
        impl_native_fn!($abi, $conv, 5; A1, A2, A3, A4, A5);
        impl_native_fn!($abi, $conv, 6; A1, A2, A3, A4, A5, A6);
    };
}

impl_native_fn_arities!("C", CallingConvention::C);

#[cfg(target_arch = "x86")]
impl_native_fn_arities!("thiscall", CallingConvention::ThisCall);

#[cfg(target_arch = "x86")]
impl_native_fn_arities!("stdcall", CallingConvention::StdCall);
