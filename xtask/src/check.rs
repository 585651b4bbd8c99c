use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::{stage, OnFailure};
use crate::TARGET;

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    stage(
        "Checking hardware target (STM32U585)",
        &["check", "-p", "board", "--target", TARGET, "--features", "hardware"],
        OnFailure::Abort,
    )?;
    stage(
        "Checking bringup crate (no_std, defmt)",
        &["check", "-p", "bringup", "--target", TARGET, "--features", "defmt"],
        OnFailure::Abort,
    )?;
    stage(
        "Checking host build (tracing)",
        &["check", "-p", "board", "--features", "tracing"],
        OnFailure::Abort,
    )?;
    stage(
        "Running clippy lints",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;
    if stage("Checking code formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}
