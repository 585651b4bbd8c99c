//! STM32U585 board bring-up
//!
//! Board-specific routines for the [`bringup`] sequencer: the GPIO pin map,
//! OCTOSPI1 memory-mapped flash, and ADC4 sampling through a GPDMA1
//! linked-list, plus the display controller's command table and the order in
//! which the board comes up.
//!
//! # Architecture
//!
//! ```text
//! main.rs (hardware entry point)
//!         ↓
//! boot (bring-up order, Board handles)
//!         ↓
//! gpio_init / octospi / adc routines (steps + register images)
//!         ↓
//! bringup::Sequencer  ──▶  bringup::hal traits
//!         ↓                       ↓
//! hardware::MmioHal (target) / bringup::mocks::RecordingHal (host tests)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32U585 target (embassy, defmt, MMIO backend)
//! - `tracing` - Host logging of the sequencing through tracing
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv8m.main-none-eabihf --features hardware
//! ```
//!
//! ## Host tests
//!
//! ```bash
//! cargo test -p board
//! ```

#![cfg_attr(not(test), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
// Pedantic lints too noisy for register-image code:
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unreadable_literal)]
// A bring-up failure must reach the fatal handler, never an unwinding panic.
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(unused_must_use)]

pub mod adc;
pub mod boot;
pub mod config;
pub mod display;
pub mod dma;
pub mod gpio_init;
pub mod octospi;
pub mod pins;
pub mod steps;

#[cfg(feature = "hardware")]
pub mod exception_handlers;
#[cfg(feature = "hardware")]
pub mod hardware;

// Re-export key types
pub use adc::{AdcConfig, AdcSettings};
pub use boot::{bring_up, tear_down, Board, BoardConfig, BRING_UP_ORDER};
pub use gpio_init::GpioConfig;
pub use octospi::{OctospiConfig, OctospiSettings};
