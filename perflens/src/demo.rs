//! Built-in demo workloads for trying the profiler end to end.
//!
//! Each workload is instrumented with the marker handles and deliberately
//! exhibits one of the catalogue's inefficiency patterns, so running it
//! produces a recognizable finding:
//!
//! - `fib`: naive recursive Fibonacci → exponential recursion
//! - `growth`: ever-growing log buffer → unbounded allocation growth
//! - `chatty`: per-item lookups in a loop → redundant sequential calls
//! - `nested`: full pairwise scan → quadratic hit scaling

use anyhow::bail;

use crate::adapters::{CallTimer, StmtTracer};

/// Marker handles the demo workloads record through.
pub struct DemoProbes {
    pub calls: CallTimer,
    pub lines: StmtTracer,
}

/// Names accepted by [`run_demo`].
pub const DEMO_NAMES: &[&str] = &["fib", "growth", "chatty", "nested"];

/// Run one named demo workload.
///
/// # Errors
/// Fails on an unknown demo name; the workloads themselves always succeed.
pub fn run_demo(name: &str, probes: &DemoProbes) -> anyhow::Result<()> {
    match name {
        "fib" => {
            std::hint::black_box(fib(probes, 25));
        }
        "growth" => growth(probes),
        "chatty" => chatty(probes),
        "nested" => nested(probes),
        other => bail!("unknown demo '{other}' (expected one of: {})", DEMO_NAMES.join(", ")),
    }
    Ok(())
}

fn fib(probes: &DemoProbes, n: u64) -> u64 {
    let _span = probes.calls.enter("demo::fib");
    if n < 2 {
        n
    } else {
        fib(probes, n - 1) + fib(probes, n - 2)
    }
}

/// Appends to a never-drained buffer; long enough for the allocation
/// sampler to land several samples while it grows.
fn growth(probes: &DemoProbes) {
    let _span = probes.calls.enter("demo::growth::accumulate");
    let mut journal: Vec<String> = Vec::new();
    for i in 0..50_000u64 {
        {
            let _s = probes.lines.statement("demo::growth::accumulate", 62);
            journal.push(format!("entry {i}: {}", "x".repeat(64)));
        }
        let _s = probes.lines.statement("demo::growth::accumulate", 64);
        std::hint::black_box(journal.len());
    }
    std::hint::black_box(&journal);
}

/// Issues one small lookup per item instead of a single batched query.
fn chatty(probes: &DemoProbes) {
    let _span = probes.calls.enter("demo::chatty::sync_all");
    let mut checksum = 0u64;
    for i in 0..200u64 {
        checksum = checksum.wrapping_add(lookup(probes, i));
    }
    std::hint::black_box(checksum);
}

fn lookup(probes: &DemoProbes, key: u64) -> u64 {
    let _span = probes.calls.enter("demo::chatty::lookup");
    (0..500u64).fold(key, |acc, x| acc.wrapping_add(x.rotate_left(7)))
}

/// Compares every element against every other element.
fn nested(probes: &DemoProbes) {
    let _span = probes.calls.enter("demo::nested::pairs");
    let items: Vec<u64> = (0..64u64).map(|i| i % 7).collect();
    let mut duplicates = 0u64;
    for a in &items {
        let _outer = probes.lines.statement("demo::nested::pairs", 94);
        for b in &items {
            let _inner = probes.lines.statement("demo::nested::pairs", 96);
            if a == b {
                duplicates += 1;
            }
        }
    }
    std::hint::black_box(duplicates);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CallTimingAdapter, StmtTimingAdapter};

    fn probes() -> (CallTimingAdapter, StmtTimingAdapter, DemoProbes) {
        let calls = CallTimingAdapter::new();
        let lines = StmtTimingAdapter::new();
        let probes = DemoProbes { calls: calls.timer(), lines: lines.tracer() };
        (calls, lines, probes)
    }

    #[test]
    fn unknown_demo_is_rejected() {
        let (_c, _l, probes) = probes();
        assert!(run_demo("warp-drive", &probes).is_err());
        for name in DEMO_NAMES {
            // Unarmed probes: workloads run as plain code
            run_demo(name, &probes).unwrap();
        }
    }
}
