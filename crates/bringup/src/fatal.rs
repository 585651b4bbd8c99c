//! Fatal-error escalation.
//!
//! The process-wide "halt or reset" facility is injected into the
//! [`Sequencer`](crate::Sequencer) rather than called as a global function, so
//! host tests can substitute an observer that records the report and returns.
//!
//! On hardware the board crate supplies a handler that logs the report and
//! resets the MCU; that handler never returns.

use crate::fault::FaultReport;

/// Receives the first fault of a bring-up routine.
pub trait FatalHandler {
    /// Called exactly once per failed `run`, before `run` returns the error.
    fn on_fatal(&mut self, report: &FaultReport);
}

impl<F> FatalHandler for F
where
    F: FnMut(&FaultReport),
{
    fn on_fatal(&mut self, report: &FaultReport) {
        self(report);
    }
}
