//! Handle command implementation.

use anyhow::{Result, bail};
use interop_core::{OwnedPointerHandle, RawPointer, live_cells, report_error};
use owo_colors::OwoColorize;
use tracing::info;

/// Run the handle command
pub fn run(count: usize) -> Result<()> {
    let baseline = live_cells();
    let mut values: Vec<i32> = (0..count as i32).collect();
    let base = RawPointer::from_ptr(values.as_mut_ptr());

    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        match OwnedPointerHandle::with_pointer(base.element_at(i as isize)) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                report_error(&e);
                return Err(e.into());
            }
        }
    }
    info!("Allocated {} pointer cells", live_cells() - baseline);

    println!("=== Pointer Handles ===");
    for handle in &handles {
        // Each handle points into `values`, which outlives the handles.
        unsafe { handle.write(handle.read() * 100) };
        println!(
            "  cell {} -> {} = {}",
            handle.cell(),
            handle.pointer(),
            unsafe { handle.read() }
        );
    }

    let live_before_release = live_cells() - baseline;
    for handle in &mut handles {
        handle.release();
        handle.release();
    }
    drop(handles);
    let leaked = live_cells() - baseline;

    let written_ok = values.iter().enumerate().all(|(i, v)| *v == i as i32 * 100);
    println!();
    println!(
        "Cells: {} allocated, {} leaked after release",
        live_before_release, leaked
    );

    if leaked != 0 || !written_ok {
        println!("Result: {}", "FAILED".red().bold());
        bail!("Handle check failed ({} leaked cells)", leaked);
    }
    println!("Result: {}", "OK".green().bold());
    Ok(())
}
