//! Probe command implementation.

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::{Result, bail};
use interop_core::vcall::{self, NativeFn};
use interop_core::{CacheStats, RawPointer, VirtualCallResolver, report_error};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info};

use crate::native::{READ_ONLY_SLOTS, SLOT_NAMES, UNIT_VTABLE, Unit, UnitMethod};

#[derive(Debug, Serialize)]
struct SlotReport {
    slot: usize,
    name: &'static str,
    address: String,
    shared: bool,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    instances: usize,
    threads: usize,
    calls: usize,
    mismatches: usize,
    slots: Vec<SlotReport>,
    cache: CacheStats,
}

/// Run the probe command
pub fn run(
    resolver: &VirtualCallResolver,
    instances: usize,
    threads: usize,
    rounds: usize,
    json: bool,
) -> Result<()> {
    let report = collect(resolver, instances, threads, rounds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.mismatches > 0 || report.slots.iter().any(|s| !s.shared) {
        bail!("Probe found {} mismatched calls", report.mismatches);
    }
    Ok(())
}

fn collect(
    resolver: &VirtualCallResolver,
    instances: usize,
    threads: usize,
    rounds: usize,
) -> Result<ProbeReport> {
    if instances == 0 {
        bail!("At least one instance is required");
    }
    let threads = threads.max(1);

    let mut units: Vec<Unit> = (0..instances)
        .map(|i| Unit::new(100 + 10 * i as i32, 5 + i as i32))
        .collect();

    let slots = check_slot_addresses(&mut units);
    let calls = AtomicUsize::new(0);
    let mismatches = AtomicUsize::new(0);

    // Raw object addresses and expected results; `Unit` itself is not `Sync`.
    let targets: Vec<(usize, Vec<i32>)> = units
        .iter_mut()
        .map(|unit| {
            let expected = (0..READ_ONLY_SLOTS)
                .filter_map(|slot| unit.expected(slot))
                .collect();
            (unit.base().address(), expected)
        })
        .collect();

    info!(
        "Resolving {} read-only slots on {} instances from {} threads",
        READ_ONLY_SLOTS, instances, threads
    );

    let (targets, calls_ref, mismatches_ref) = (&targets, &calls, &mismatches);
    thread::scope(|scope| -> Result<()> {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(move || -> Result<()> {
                    for _ in 0..rounds {
                        for (base, expected) in targets {
                            let base = RawPointer::<c_void>::from_address(*base);
                            for (slot, want) in expected.iter().enumerate() {
                                let method = resolve_method(resolver, base, slot)?;
                                let got = method(base.cast().as_ptr());
                                calls_ref.fetch_add(1, Ordering::Relaxed);
                                if got != *want {
                                    mismatches_ref.fetch_add(1, Ordering::Relaxed);
                                    debug!(
                                        "{} returned {}, expected {}",
                                        SLOT_NAMES[slot], got, want
                                    );
                                }
                            }
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        for worker in workers {
            match worker.join() {
                Ok(result) => result?,
                Err(_) => bail!("Probe worker panicked"),
            }
        }
        Ok(())
    })?;

    // Mutating slot, single-threaded.
    let hit_slot = READ_ONLY_SLOTS;
    for unit in &mut units {
        let before = unit.health;
        let base = unit.base();
        let take_hit = resolve_method(resolver, base, hit_slot)?;
        let after = take_hit(base.cast().as_ptr());
        calls.fetch_add(1, Ordering::Relaxed);
        if after != before - 10 || unit.health != after {
            mismatches.fetch_add(1, Ordering::Relaxed);
        }
    }

    Ok(ProbeReport {
        instances,
        threads,
        calls: calls.into_inner(),
        mismatches: mismatches.into_inner(),
        slots,
        cache: resolver.stats(),
    })
}

fn resolve_method(
    resolver: &VirtualCallResolver,
    base: RawPointer<c_void>,
    slot: usize,
) -> Result<UnitMethod> {
    // Every `Unit` starts with a pointer to UNIT_VTABLE, which has a method in each slot.
    match unsafe { resolver.resolve::<UnitMethod>(base, slot) } {
        Ok(method) => Ok(method),
        Err(e) => {
            report_error(&e);
            Err(e.into())
        }
    }
}

fn check_slot_addresses(units: &mut [Unit]) -> Vec<SlotReport> {
    (0..UNIT_VTABLE.len())
        .map(|slot| {
            let expected = UNIT_VTABLE[slot].address();
            let shared = units.iter_mut().all(|unit| {
                let base = unit.base();
                let vtable = unsafe { VirtualCallResolver::vtable_of(base) };
                let address = unsafe { vcall::vtable_slot_address(base, slot) };
                vtable.address() == unit.vtable().address() && address.address() == expected
            });
            SlotReport {
                slot,
                name: SLOT_NAMES[slot],
                address: format!("{:#x}", expected),
                shared,
            }
        })
        .collect()
}

fn print_report(report: &ProbeReport) {
    println!("=== Vtable Probe ===");
    println!(
        "Instances: {}  Threads: {}  Calls: {}",
        report.instances, report.threads, report.calls
    );
    println!();
    println!("Slots:");
    for slot in &report.slots {
        let status = if slot.shared {
            "shared".green().to_string()
        } else {
            "DIVERGED".red().to_string()
        };
        println!("  [{}] {:<10} @ {} {}", slot.slot, slot.name, slot.address, status);
    }
    println!();
    println!(
        "Cache: {} entries, {} hits, {} misses, {} evictions",
        report.cache.entries, report.cache.hits, report.cache.misses, report.cache.evictions
    );
    if report.mismatches == 0 {
        println!("Result: {}", "OK".green().bold());
    } else {
        println!(
            "Result: {} ({} mismatched calls)",
            "FAILED".red().bold(),
            report.mismatches
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_core::ResolverConfig;

    #[test]
    fn test_zero_threads_reports_one_worker() {
        let resolver = VirtualCallResolver::new(&ResolverConfig::default()).unwrap();
        let report = collect(&resolver, 2, 0, 3).unwrap();
        assert_eq!(report.threads, 1);
        assert_eq!(report.mismatches, 0);
        assert_eq!(report.calls, 3 * 2 * READ_ONLY_SLOTS + 2);
    }
}
