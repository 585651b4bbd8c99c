//! Bounded busy-waits
//!
//! Bring-up never yields: a step that waits for a hardware flag spins on it
//! until the flag is met or the deadline passes. The deadline comes from
//! `embassy_time`, so the same code runs on the target time driver and on the
//! host `std` driver in tests.

use embassy_time::{Duration, Instant};

use crate::config::PeripheralId;
use crate::fault::HalError;
use crate::hal::{ReadyCondition, RegisterAccess};

/// Spin until `ready` returns `true` or `timeout_ms` elapses.
///
/// `ready` is evaluated at least once, so a condition that already holds
/// succeeds even with an expired clock.
pub fn wait_until<F>(timeout_ms: u32, mut ready: F) -> Result<(), HalError>
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now()
        .checked_add(Duration::from_millis(u64::from(timeout_ms)))
        .unwrap_or(Instant::MAX);
    loop {
        if ready() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HalError::Timeout);
        }
        core::hint::spin_loop();
    }
}

/// Spin until `condition` holds on `peripheral`.
pub fn wait_ready<H>(
    hal: &mut H,
    peripheral: PeripheralId,
    condition: &ReadyCondition,
    timeout_ms: u32,
) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    let result = wait_until(timeout_ms, || hal.poll(peripheral, condition));
    if result.is_err() {
        warn!(
            "{}: ready wait on offset {} timed out after {} ms",
            peripheral, condition.offset, timeout_ms
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_condition_succeeds() {
        assert_eq!(wait_until(1, || true), Ok(()));
    }

    #[test]
    fn never_ready_times_out() {
        let mut polls = 0u32;
        let result = wait_until(2, || {
            polls = polls.saturating_add(1);
            false
        });
        assert_eq!(result, Err(HalError::Timeout));
        assert!(polls >= 1);
    }

    #[test]
    fn becomes_ready_after_a_few_polls() {
        let mut polls = 0u32;
        let result = wait_until(1_000, || {
            polls = polls.saturating_add(1);
            polls == 3
        });
        assert_eq!(result, Ok(()));
        assert_eq!(polls, 3);
    }
}
