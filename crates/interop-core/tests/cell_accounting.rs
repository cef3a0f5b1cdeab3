//! Allocation accounting for owned pointer cells.
//!
//! Kept in its own test binary so no other test allocates cells concurrently.

use interop_core::{OwnedPointerHandle, RawPointer, live_cells};

#[test]
fn test_cells_return_to_baseline() {
    let baseline = live_cells();

    let mut handle = OwnedPointerHandle::<i32>::new().unwrap();
    assert_eq!(live_cells(), baseline + 1);
    handle.release();
    assert_eq!(live_cells(), baseline);
    handle.release();
    assert_eq!(live_cells(), baseline);
    drop(handle);
    assert_eq!(live_cells(), baseline);

    {
        let _scoped =
            OwnedPointerHandle::with_pointer(RawPointer::<u64>::from_address(0x1000)).unwrap();
        assert_eq!(live_cells(), baseline + 1);
    }
    assert_eq!(live_cells(), baseline);

    let handles: Vec<_> = (0..16)
        .map(|i| OwnedPointerHandle::with_pointer(RawPointer::<u8>::from_address(i)).unwrap())
        .collect();
    assert_eq!(live_cells(), baseline + 16);
    assert!(handles[0].is_null());
    assert_eq!(handles[15].pointer().address(), 15);
    drop(handles);
    assert_eq!(live_cells(), baseline);
}
