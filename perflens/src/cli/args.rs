//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "perflens",
    about = "Profile a workload with coordinated call, allocation and statement \
             instrumentation, then derive optimization recommendations",
    after_help = "\
EXAMPLES:
    perflens fib                         Profile the naive-Fibonacci demo
    perflens growth --export out.json    Profile and save the merged report
    perflens --replay out.json           Re-analyze a saved report
    perflens chatty --no-alloc           Run with a subset of the adapters"
)]
pub struct Args {
    /// Built-in demo workload to profile (fib, growth, chatty, nested)
    #[arg(value_name = "DEMO")]
    pub demo: Option<String>,

    /// Re-analyze a previously exported report instead of running a workload
    #[arg(long, value_name = "FILE", conflicts_with = "demo")]
    pub replay: Option<PathBuf>,

    /// Export the merged report to a JSON file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Disable the call-timing adapter
    #[arg(long)]
    pub no_calls: bool,

    /// Disable the allocation-tracking adapter
    #[arg(long)]
    pub no_alloc: bool,

    /// Disable the statement-timing adapter
    #[arg(long)]
    pub no_lines: bool,

    /// Number of hotspot entries to show
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Advisory session timeout in seconds (flags the session, never
    /// interrupts the workload)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suppress the hotspot summary, print recommendations only
    #[arg(short, long)]
    pub quiet: bool,
}
