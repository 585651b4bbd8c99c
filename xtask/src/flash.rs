use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::cargo::{stage, OnFailure};
use crate::{CHIP, TARGET};

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!("{}", format!("🔨 Building board binary ({mode} mode)...").cyan().bold());
    println!();

    let mut args = vec!["build", "-p", "board", "--bin", "board", "--target", TARGET, "--features", "hardware"];
    if release {
        args.push("--release");
    }
    stage("Build", &args, OnFailure::Abort)?;

    let binary = binary_path(release);
    show_binary_size(&binary);

    println!("{}", format!("📡 Flashing {CHIP}...").cyan().bold());
    println!("   {}", "Bring-up logs stream over RTT; Ctrl-C to detach".dimmed());

    let flash_start = Instant::now();
    // `probe-rs run` stays attached and prints defmt output until interrupted.
    let status = Command::new("probe-rs")
        .args(["run", "--chip", CHIP, "--probe-index", "0"])
        .arg(&binary)
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        eprintln!("{}", "✗ Flash failed".red().bold());
        anyhow::bail!("Flash failed - check that the probe is connected and the board is powered");
    }

    println!(
        "{}",
        format!("✓ Session ended after {:.2}s", flash_start.elapsed().as_secs_f64()).green()
    );
    println!();

    Ok(())
}

fn binary_path(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/board")
}

fn show_binary_size(binary: &str) {
    let Ok(out) = Command::new("rust-size").arg(binary).arg("-A").output() else {
        println!("   {}", "(install cargo-binutils for a size report)".dimmed());
        println!();
        return;
    };
    if out.status.success() {
        println!("{}", "📊 Binary size:".cyan());
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            println!("   {}", line.dimmed());
        }
        println!();
    }
}
