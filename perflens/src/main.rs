//! # perflens - Main Entry Point
//!
//! Two operational modes:
//! - **Profile** (`perflens <DEMO>`): run a built-in workload under the
//!   enabled adapters and print hotspots + recommendations
//! - **Replay** (`--replay report.json`): re-analyze a previously exported
//!   report without running anything

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use perflens::adapters::{
    AllocTrackingAdapter, CallTimingAdapter, InstrumentationAdapter, StmtTimingAdapter,
};
use perflens::analysis::{match_report, synthesize};
use perflens::cli::Args;
use perflens::demo::{run_demo, DemoProbes};
use perflens::export::text::{render_recommendations, render_summary};
use perflens::export::{load_report, save_report};
use perflens::session::ProfileSession;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("missing required argument")
        || msg.contains("unknown demo")
        || msg.contains("no instrumentation adapters")
    {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    if let Some(ref path) = args.replay {
        return replay(&args, path);
    }

    let Some(ref demo) = args.demo else {
        anyhow::bail!(
            "missing required argument: DEMO or --replay\n\n\
             Usage:\n  \
             perflens fib                 Profile a built-in demo workload\n  \
             perflens --replay out.json   Re-analyze a saved report\n\n\
             Run 'perflens --help' for more options"
        );
    };

    // The marker handles exist either way; a handle whose adapter never
    // joins the session stays unarmed and records nothing.
    let call_adapter = CallTimingAdapter::new();
    let stmt_adapter = StmtTimingAdapter::new();
    let probes = DemoProbes { calls: call_adapter.timer(), lines: stmt_adapter.tracer() };

    let mut adapters: Vec<Box<dyn InstrumentationAdapter>> = Vec::new();
    if !args.no_calls {
        adapters.push(Box::new(call_adapter));
    }
    if !args.no_alloc {
        adapters.push(Box::new(
            AllocTrackingAdapter::new(format!("demo::{demo}"))
                .with_interval(Duration::from_millis(1)),
        ));
    }
    if !args.no_lines {
        adapters.push(Box::new(stmt_adapter));
    }

    let mut session = ProfileSession::new(adapters);
    if let Some(secs) = args.timeout {
        session = session.with_timeout(Duration::from_secs(secs));
    }

    session.start_session(|| run_demo(demo, &probes))?;

    let report = session.report()?;
    if !args.quiet {
        println!("{}", render_summary(report, args.top));
    }
    println!("{}", render_recommendations(session.recommendations()?));

    if let Some(ref path) = args.export {
        save_report(report, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        if !args.quiet {
            println!("report written to {}", path.display());
        }
    }
    Ok(())
}

/// Findings and recommendations are pure views of the report, so a saved
/// report re-analyzes without re-running anything.
fn replay(args: &Args, path: &std::path::Path) -> Result<()> {
    let report = load_report(path)
        .with_context(|| format!("failed to load report from {}", path.display()))?;

    let findings = match_report(&report);
    let recommendations = synthesize(&findings);

    if !args.quiet {
        println!("{}", render_summary(&report, args.top));
    }
    println!("{}", render_recommendations(&recommendations));
    Ok(())
}
