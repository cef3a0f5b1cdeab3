//! Synthetic native objects laid out the way C++ compilers lay out
//! single-inheritance classes: vtable pointer first, fields after.

use std::ffi::c_void;

use interop_core::RawPointer;

pub type UnitMethod = extern "C" fn(this: *mut Unit) -> i32;

#[repr(C)]
pub struct Unit {
    vtable: *const UnitMethod,
    pub health: i32,
    pub armor: i32,
}

extern "C" fn health(this: *mut Unit) -> i32 {
    unsafe { (*this).health }
}

extern "C" fn armor(this: *mut Unit) -> i32 {
    unsafe { (*this).armor }
}

extern "C" fn durability(this: *mut Unit) -> i32 {
    unsafe { (*this).health + (*this).armor }
}

extern "C" fn take_hit(this: *mut Unit) -> i32 {
    unsafe {
        (*this).health -= 10;
        (*this).health
    }
}

pub static UNIT_VTABLE: [UnitMethod; 4] = [health, armor, durability, take_hit];

pub const SLOT_NAMES: [&str; 4] = ["health", "armor", "durability", "take_hit"];

/// Slots that do not modify the object and can be called from any thread.
pub const READ_ONLY_SLOTS: usize = 3;

impl Unit {
    pub fn new(health: i32, armor: i32) -> Self {
        Self {
            vtable: UNIT_VTABLE.as_ptr(),
            health,
            armor,
        }
    }

    pub fn base(&mut self) -> RawPointer<c_void> {
        RawPointer::address_of_mut(self).cast()
    }

    /// Value a read-only slot should return for this object.
    pub fn expected(&self, slot: usize) -> Option<i32> {
        match slot {
            0 => Some(self.health),
            1 => Some(self.armor),
            2 => Some(self.health + self.armor),
            _ => None,
        }
    }

    pub fn vtable(&self) -> RawPointer<UnitMethod> {
        RawPointer::from_ptr(self.vtable)
    }
}
