//! Peripheral bring-up sequencing for STM32-class boards
//!
//! This crate turns "enable the clock, mux the pins, program the registers,
//! wire the DMA and the interrupt" into an explicit, ordered list of fallible
//! steps, executed fail-fast against an injected register access layer.
//!
//! # Architecture Layers
//!
//! ```text
//! Board routines (board crate: GPIO map, OCTOSPI flash, ADC + DMA)
//!         ↓
//! Sequencer (this crate: steps, handle state, fault escalation)
//!         ↓
//! HAL collaborator traits (this crate: RegisterAccess, GpioBank, DescriptorList)
//!         ↓
//! Hardware (MMIO backend on target, RecordingHal in tests)
//! ```
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──run──▶ Initializing ──all ok──▶ Ready ──teardown──▶ Deinitializing ──▶ Uninitialized
//!                              │
//!                              └──first failure──▶ FatalFault (terminal, fatal handler invoked)
//! ```
//!
//! # Features
//!
//! - `defmt`: `defmt::Format` derives and defmt logging (hardware builds)
//! - `tracing`: tracing logging (host builds, integration tests)
//!
//! # Example
//!
//! ```no_run
//! use bringup::{HandleState, PeripheralConfig, Routine, Sequencer, FaultReason};
//! use bringup::hal::RegisterAccess;
//!
//! fn bring_up<H: RegisterAccess, F: bringup::FatalHandler>(
//!     hal: &mut H,
//!     sequencer: &mut Sequencer<F>,
//!     routine: &Routine<'_, H, PeripheralConfig<()>>,
//!     config: PeripheralConfig<()>,
//! ) -> Result<HandleState<PeripheralConfig<()>>, FaultReason> {
//!     sequencer.run(hal, routine, config)
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware crate:
#![allow(clippy::doc_markdown)] // register names and hex addresses in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
mod log;

pub mod clock;
pub mod config;
pub mod dma;
pub mod fatal;
pub mod fault;
pub mod gpio;
pub mod hal;
pub mod handle;
pub mod mocks;
pub mod sequencer;
pub mod wait;

// Re-export the sequencer surface
pub use fatal::FatalHandler;
pub use fault::{FaultReason, FaultReport, HalError};
pub use handle::{HandleState, HandleStatus, StepContext};
pub use sequencer::{Routine, Sequencer, Step, StepKind};

// Re-export configuration types
pub use clock::{ClockRequirement, ClockSource};
pub use config::{
    ClockConfig, ConfigError, InterruptConfig, IrqNumber, PeripheralConfig, PeripheralId,
    PinConfig, PinFunction, Pull, Speed,
};

// Re-export GPIO types
pub use gpio::{
    Alternate, Analog, GpioPin, Input, InterruptMode, OutputType, Output, PinId, PinState, Port,
};

// Re-export DMA types
pub use dma::{
    DataWidth, DmaChannel, DmaConfig, DmaLinkage, DmaNodeConfig, NodeId, NodeQueue, QueueError, QueueId,
    TransferDirection,
};

// Re-export the HAL collaborator traits
pub use hal::{DescriptorList, GpioBank, Hal, ReadyCondition, RegisterAccess};
