//! Fault taxonomy for peripheral bring-up.
//!
//! Two layers:
//!
//! - [`HalError`]: what the register access layer reports for a single
//!   operation (mirrors the vendor HAL's `ERROR` / `BUSY` / `TIMEOUT` codes).
//! - [`FaultReason`]: what the sequencer escalates. Every reason is fatal;
//!   there is no retryable class at this layer.
//!
//! The mapping between the two depends on the kind of step that failed, see
//! [`StepKind::classify`](crate::StepKind::classify).

use crate::config::PeripheralId;
use crate::sequencer::StepKind;

/// Status reported by the register access layer for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// The operation was rejected or the hardware reported an error flag.
    #[error("hardware reported an error")]
    Error,
    /// The peripheral (or a lock it depends on) is held by someone else.
    #[error("peripheral busy")]
    Busy,
    /// A bounded wait on a hardware-ready condition expired.
    #[error("timed out waiting for hardware")]
    Timeout,
}

/// Reason a bring-up sequence was aborted.
///
/// All variants are treated identically by the sequencer: the first one
/// observed is reported to the fatal handler and returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultReason {
    /// A peripheral or kernel clock could not be enabled from the requested source.
    #[error("clock configuration failed")]
    ClockConfigFailure,
    /// A GPIO pin could not be configured (mode, pull, speed or alternate function).
    #[error("pin configuration failed")]
    PinConfigFailure,
    /// A peripheral register group or interrupt line could not be programmed.
    #[error("peripheral configuration failed")]
    PeripheralConfigFailure,
    /// A DMA descriptor could not be built, linked or made circular.
    #[error("DMA link failed")]
    DmaLinkFailure,
    /// A bounded wait on a hardware-ready condition expired.
    #[error("hardware ready wait timed out")]
    TimeoutFailure,
}

/// Everything the fatal handler is told about the failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultReport {
    /// Peripheral whose bring-up was aborted.
    pub peripheral: PeripheralId,
    /// Name of the step that failed.
    pub step: &'static str,
    /// Zero-based position of the failing step in the routine.
    pub index: usize,
    /// Kind of the failing step.
    pub kind: StepKind,
    /// Classified reason.
    pub reason: FaultReason,
}

impl core::fmt::Display for FaultReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: step {} '{}' ({}) failed: {}",
            self.peripheral, self.index, self.step, self.kind, self.reason
        )
    }
}
