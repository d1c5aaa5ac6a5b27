//! Fill a million-slot vector part way and report its memory state.
//!
//! Reserves 1,000,000 `i32` slots, pushes 0..16,383, prints the counters,
//! then pushes one more value to show the next commit step.
//!
//! ```text
//! RUST_LOG=virtmem_vec=trace cargo run -p virtmem-bench --example fill_and_report
//! ```

use tracing_subscriber::EnvFilter;
use virtmem::pages::system_info;
use virtmem::prelude::*;
use virtmem_bench::{CommitReport, REFERENCE};

fn main() -> Result<(), VecError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let info = system_info();
    tracing::info!(
        page_size = info.page_size,
        allocation_granularity = info.allocation_granularity,
        large_page_minimum = ?info.large_page_minimum,
        "system"
    );

    println!("=== virtmem fill report ===\n");

    let numbers = REFERENCE.build::<Linear>()?;
    println!("after {:>6} pushes: {}", REFERENCE.fill, CommitReport::of(&numbers));

    let first = numbers.at(0)?;
    numbers.push(REFERENCE.fill as i32)?;
    println!("after {:>6} pushes: {}", numbers.len(), CommitReport::of(&numbers));
    println!("first element still at {:p} = {}", first, first);

    let doubling = REFERENCE.build::<Exponential>()?;
    println!("\nexponential policy:   {}", CommitReport::of(&doubling));

    Ok(())
}
