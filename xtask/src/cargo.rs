use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// How a failing stage affects the task.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Stop the task with an error.
    Abort,
    /// Report and carry on.
    Warn,
}

/// Run `cargo <args>` as one named stage, printing its outcome.
///
/// Returns the captured output when the stage succeeded.
pub fn stage(label: &str, args: &[&str], on_failure: OnFailure) -> Result<Option<Output>> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if output.status.success() {
        println!(
            "{}",
            format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
        );
        println!();
        return Ok(Some(output));
    }

    match on_failure {
        OnFailure::Abort => {
            eprintln!("{}", format!("  ✗ {label} failed").red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            eprintln!("{}", String::from_utf8_lossy(&output.stdout));
            anyhow::bail!("{label} failed");
        }
        OnFailure::Warn => {
            eprintln!("{}", format!("  ⚠ {label} reported problems").yellow().bold());
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            println!();
            Ok(None)
        }
    }
}

/// The `test result:` line of a cargo test run, if any.
pub fn test_summary(output: &Output) -> String {
    last_result_line(&String::from_utf8_lossy(&output.stdout))
}

fn last_result_line(stdout: &str) -> String {
    stdout
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .map(str::trim)
        .last()
        .unwrap_or("(summary not available)")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_takes_last_result_line() {
        let stdout = "running 2 tests\ntest result: ok. 2 passed; 0 failed\n\
                      running 9 tests\ntest result: ok. 9 passed; 0 failed\n";
        assert_eq!(last_result_line(stdout), "ok. 9 passed; 0 failed");
    }

    #[test]
    fn summary_without_result_line() {
        assert_eq!(last_result_line("error: no tests"), "(summary not available)");
    }
}
