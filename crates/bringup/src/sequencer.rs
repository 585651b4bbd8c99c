//! Bring-up sequencer
//!
//! Runs the ordered steps of one peripheral's bring-up routine, fail-fast:
//!
//! ```text
//! clock enable → pin configuration → peripheral configuration → DMA / interrupt wiring
//! ```
//!
//! The first failing step stops the routine. The sequencer classifies the
//! error, marks the handle `FatalFault`, hands a [`FaultReport`] to the
//! injected [`FatalHandler`] and returns the reason. No later step runs, no
//! step is retried and nothing is rolled back; on target the fatal handler
//! resets the MCU before `run` even returns.
//!
//! Tear-down is the opposite policy: every deinit step runs, failures are
//! logged and ignored, and the handle always ends `Uninitialized`.

use crate::fatal::FatalHandler;
use crate::fault::{FaultReason, FaultReport, HalError};
use crate::handle::{HandleState, HandleStatus, StepContext};
use crate::config::PeripheralId;

/// What a step touches. Decides how its error is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepKind {
    /// RCC clock gating / kernel clock selection
    Clock,
    /// GPIO mode, pull, speed, alternate function
    Pins,
    /// Peripheral register programming and ready waits
    Peripheral,
    /// DMA descriptor build and channel linking
    DmaLink,
    /// NVIC priority and enable
    Interrupt,
}

impl StepKind {
    /// Map a HAL status to the fault escalated for this kind of step.
    ///
    /// A timeout is a timeout whatever the step was doing.
    pub const fn classify(self, error: HalError) -> FaultReason {
        match (error, self) {
            (HalError::Timeout, _) => FaultReason::TimeoutFailure,
            (_, StepKind::Clock) => FaultReason::ClockConfigFailure,
            (_, StepKind::Pins) => FaultReason::PinConfigFailure,
            (_, StepKind::Peripheral | StepKind::Interrupt) => FaultReason::PeripheralConfigFailure,
            (_, StepKind::DmaLink) => FaultReason::DmaLinkFailure,
        }
    }
}

impl core::fmt::Display for StepKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            StepKind::Clock => "clock",
            StepKind::Pins => "pins",
            StepKind::Peripheral => "peripheral",
            StepKind::DmaLink => "dma-link",
            StepKind::Interrupt => "interrupt",
        })
    }
}

/// Step action: one side effect through the register access layer.
pub type StepFn<H, C> = fn(&mut H, &mut StepContext<'_, C>) -> Result<(), HalError>;

/// A named, ordered unit of bring-up work.
pub struct Step<H: ?Sized, C> {
    name: &'static str,
    kind: StepKind,
    action: StepFn<H, C>,
}

impl<H: ?Sized, C> Step<H, C> {
    /// Create a step. `const` so routines can be declared as static tables.
    pub const fn new(name: &'static str, kind: StepKind, action: StepFn<H, C>) -> Self {
        Self { name, kind, action }
    }

    /// Human-readable name, used in logs and fault reports.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Step kind.
    pub const fn kind(&self) -> StepKind {
        self.kind
    }

    fn execute(&self, hal: &mut H, ctx: &mut StepContext<'_, C>) -> Result<(), HalError> {
        (self.action)(hal, ctx)
    }
}

impl<H: ?Sized, C> Clone for Step<H, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<H: ?Sized, C> Copy for Step<H, C> {}

impl<H: ?Sized, C> core::fmt::Debug for Step<H, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The init and deinit step lists of one peripheral.
pub struct Routine<'s, H: ?Sized, C> {
    peripheral: PeripheralId,
    init: &'s [Step<H, C>],
    deinit: &'s [Step<H, C>],
}

impl<'s, H: ?Sized, C> Routine<'s, H, C> {
    /// Bundle a peripheral's init and deinit steps.
    pub const fn new(peripheral: PeripheralId, init: &'s [Step<H, C>], deinit: &'s [Step<H, C>]) -> Self {
        Self {
            peripheral,
            init,
            deinit,
        }
    }

    /// Peripheral the routine brings up.
    pub const fn peripheral(&self) -> PeripheralId {
        self.peripheral
    }

    /// Init steps, in execution order.
    pub const fn init(&self) -> &'s [Step<H, C>] {
        self.init
    }

    /// Deinit steps, in execution order.
    pub const fn deinit(&self) -> &'s [Step<H, C>] {
        self.deinit
    }
}

impl<H: ?Sized, C> Clone for Routine<'_, H, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<H: ?Sized, C> Copy for Routine<'_, H, C> {}

impl<H: ?Sized, C> core::fmt::Debug for Routine<'_, H, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Routine")
            .field("peripheral", &self.peripheral)
            .field("init", &self.init)
            .field("deinit", &self.deinit)
            .finish()
    }
}

/// Executes routines and escalates the first fault.
///
/// Holds no lock and no hardware; the register access layer is borrowed per
/// call.
#[derive(Debug)]
pub struct Sequencer<F> {
    fatal: F,
}

impl<F: FatalHandler> Sequencer<F> {
    /// Sequencer escalating faults to `fatal`.
    pub const fn new(fatal: F) -> Self {
        Self { fatal }
    }

    /// Fatal handler, e.g. to inspect what a test observer recorded.
    pub fn handler(&self) -> &F {
        &self.fatal
    }

    /// Give the fatal handler back.
    pub fn into_handler(self) -> F {
        self.fatal
    }

    /// Bring a peripheral up.
    ///
    /// Runs `routine.init()` in order. Returns a `Ready` handle owning
    /// `config` when every step succeeds. On the first failure the fatal
    /// handler receives a [`FaultReport`], the partially applied handle is
    /// dropped, and the classified reason is returned.
    pub fn run<H, C>(&mut self, hal: &mut H, routine: &Routine<'_, H, C>, config: C) -> Result<HandleState<C>, FaultReason>
    where
        H: ?Sized,
    {
        let peripheral = routine.peripheral();
        let mut handle = HandleState::new(peripheral, config);
        handle.set_status(HandleStatus::Initializing);
        info!("{}: bring-up, {} steps", peripheral, routine.init().len());

        for (index, step) in routine.init().iter().enumerate() {
            debug!("{}: [{}] {}", peripheral, index, step.name());
            let mut ctx = StepContext::new(&mut handle);
            if let Err(error) = step.execute(hal, &mut ctx) {
                let report = FaultReport {
                    peripheral,
                    step: step.name(),
                    index,
                    kind: step.kind(),
                    reason: step.kind().classify(error),
                };
                handle.set_status(HandleStatus::FatalFault);
                error!("{}", report);
                self.fatal.on_fatal(&report);
                return Err(report.reason);
            }
        }

        handle.set_status(HandleStatus::Ready);
        info!("{}: ready", peripheral);
        Ok(handle)
    }

    /// Tear a peripheral down.
    ///
    /// No-op unless the handle is `Ready`. Otherwise runs every deinit step
    /// even if some fail, then leaves the handle `Uninitialized` with its DMA
    /// linkage cleared.
    pub fn teardown<H, C>(&mut self, hal: &mut H, routine: &Routine<'_, H, C>, handle: &mut HandleState<C>)
    where
        H: ?Sized,
    {
        let peripheral = handle.peripheral();
        if !handle.is_ready() {
            debug!("{}: teardown skipped, handle {}", peripheral, handle.status());
            return;
        }

        handle.set_status(HandleStatus::Deinitializing);
        info!("{}: teardown, {} steps", peripheral, routine.deinit().len());

        for (index, step) in routine.deinit().iter().enumerate() {
            debug!("{}: [{}] {}", peripheral, index, step.name());
            let mut ctx = StepContext::new(handle);
            if let Err(error) = step.execute(hal, &mut ctx) {
                warn!(
                    "{}: teardown step {} '{}' failed: {}, continuing",
                    peripheral,
                    index,
                    step.name(),
                    error
                );
            }
        }

        handle.clear_dma();
        handle.set_status(HandleStatus::Uninitialized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_wins_over_step_kind() {
        for kind in [
            StepKind::Clock,
            StepKind::Pins,
            StepKind::Peripheral,
            StepKind::DmaLink,
            StepKind::Interrupt,
        ] {
            assert_eq!(kind.classify(HalError::Timeout), FaultReason::TimeoutFailure);
        }
    }

    #[test]
    fn errors_classify_by_step_kind() {
        for error in [HalError::Error, HalError::Busy] {
            assert_eq!(StepKind::Clock.classify(error), FaultReason::ClockConfigFailure);
            assert_eq!(StepKind::Pins.classify(error), FaultReason::PinConfigFailure);
            assert_eq!(StepKind::Peripheral.classify(error), FaultReason::PeripheralConfigFailure);
            assert_eq!(StepKind::Interrupt.classify(error), FaultReason::PeripheralConfigFailure);
            assert_eq!(StepKind::DmaLink.classify(error), FaultReason::DmaLinkFailure);
        }
    }

    #[test]
    fn step_debug_shows_name_and_kind() {
        fn noop(_: &mut (), _: &mut StepContext<'_, ()>) -> Result<(), HalError> {
            Ok(())
        }
        let step: Step<(), ()> = Step::new("noop", StepKind::Clock, noop);
        let text = format!("{step:?}");
        assert!(text.contains("noop"), "{text}");
        assert!(text.contains("Clock"), "{text}");
    }
}
