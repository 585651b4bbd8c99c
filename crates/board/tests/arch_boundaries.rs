//! Architecture boundary tests: run with `cargo test -p board --test arch_boundaries`
// Architecture test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
//!
//! These tests enforce the layering and build rules of the workspace:
//!   Rule 1: `bringup` (sequencer + HAL seam) must not depend on `board` or
//!           on a vendor HAL; board knowledge lives in `board` only
//!   Rule 2: the embassy time driver is pinned to TIM2
//!   Rule 3: memory.x and the linker configuration match the STM32U585
//!
//! The checks embed the manifests and linker files at compile time with
//! `include_str!` and scan them, so they run on the host.

/// Verify that `bringup` has no dependency on the board crate or embassy-stm32.
///
/// Architecture rule: the sequencer talks to hardware only through the
/// `RegisterAccess` / `GpioBank` / `DescriptorList` traits. A dependency on
/// the vendor HAL would let routines bypass the seam that the recording HAL
/// tests rely on.
#[test]
fn bringup_is_independent_of_board_and_vendor_hal() {
    let bringup_cargo = include_str!("../../bringup/Cargo.toml");
    let deps = bringup_cargo
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    assert!(!deps.contains("board ="), "bringup must not depend on board");
    assert!(
        !deps.contains("embassy-stm32"),
        "bringup must stay vendor-HAL free; use the hal traits instead"
    );
}

/// Verify that the board Cargo.toml does not contain `time-driver-any`.
///
/// Architecture rule: `time-driver-any` lets Cargo pick a timer that may be
/// claimed by a peripheral later. The workspace pins `time-driver-tim2`.
#[test]
fn no_time_driver_any_in_cargo_toml() {
    let board_cargo = include_str!("../Cargo.toml");
    let workspace_cargo = include_str!("../../../Cargo.toml");
    assert!(!board_cargo.contains("time-driver-any"));
    assert!(!workspace_cargo.contains("time-driver-any"));
    assert!(
        workspace_cargo.contains("time-driver-tim2"),
        "workspace must select `time-driver-tim2` for embassy-stm32"
    );
}

/// Verify that the embassy-stm32 chip feature matches the board MCU.
#[test]
fn embassy_targets_stm32u585() {
    let workspace_cargo = include_str!("../../../Cargo.toml");
    assert!(workspace_cargo.contains("\"stm32u585ai\""));
}

/// Verify that every kernel clock the routines select has a requirement entry.
///
/// A routine whose clock source is not in `CLOCK_REQUIREMENTS` would skip the
/// source check entirely.
#[test]
fn kernel_clocked_peripherals_have_requirements() {
    use bringup::clock::required_source;
    use bringup::PeripheralId;

    for peripheral in [PeripheralId::Adc4, PeripheralId::Octospi1, PeripheralId::Octospim] {
        assert!(
            required_source(board::config::CLOCK_REQUIREMENTS, peripheral).is_some(),
            "{peripheral} has no clock requirement"
        );
    }
}

/// Verify that the default flash prescaler keeps OCTOSPI1 within the
/// MX25LM51245G 200 MHz limit at SYSCLK.
#[test]
fn octospi_clock_within_flash_limit() {
    let settings = board::OctospiSettings::MX25LM51245G;
    let bus_hz = board::octospi::validate_prescaler(board::config::SYSCLK_HZ, settings.prescaler)
        .expect("default prescaler must keep the bus within the flash limit");
    assert!(bus_hz <= board::octospi::FLASH_MAX_HZ);
}

// ─── memory.x and linker tests ───────────────────────────────────────────────

/// Verify that memory.x maps internal flash at 0x08000000.
#[test]
fn memory_x_defines_flash() {
    let memory_x = include_str!("../../../memory.x");
    assert!(memory_x.contains("0x08000000"), "memory.x must define FLASH at 0x08000000");
}

/// Verify that memory.x maps SRAM1..3 contiguously at 0x20000000.
#[test]
fn memory_x_defines_ram() {
    let memory_x = include_str!("../../../memory.x");
    assert!(memory_x.contains("0x20000000"));
    assert!(memory_x.contains("768K"));
}

/// Verify that memory.x names the OCTOSPI1 memory-mapped window.
///
/// Architecture rule: the window base in memory.x and the address the flash
/// routine programs must agree, or assets placed there by the linker are
/// unreachable after bring-up.
#[test]
fn memory_x_defines_ospi_window() {
    let memory_x = include_str!("../../../memory.x");
    let base = format!("0x{:08X}", board::octospi::MEMORY_MAPPED_BASE);
    assert!(memory_x.contains(&base), "memory.x must define OSPI at {base}");
}

/// Verify that memory.x defines `_stack_start` for flip-link.
#[test]
fn memory_x_has_stack_start() {
    let memory_x = include_str!("../../../memory.x");
    assert!(memory_x.contains("_stack_start"));
}

/// Verify that `.cargo/config.toml` uses flip-link for the target.
///
/// Architecture rule: with flip-link a stack overflow faults into the
/// HardFault handler instead of corrupting the DMA sample buffer.
#[test]
fn cargo_config_uses_flip_link_linker() {
    let config = include_str!("../../../.cargo/config.toml");
    assert!(config.contains("[target.thumbv8m.main-none-eabihf]"));
    assert!(
        config.contains("linker = \"flip-link\""),
        ".cargo/config.toml must set flip-link as the linker (cargo install flip-link)"
    );
}

/// Verify that flip-link is not a Cargo dependency.
///
/// flip-link is a linker binary, not a library crate.
#[test]
fn flip_link_is_not_a_cargo_dependency() {
    let manifests = [include_str!("../Cargo.toml"), include_str!("../../../Cargo.toml")];
    for manifest in manifests {
        let has_dep = manifest
            .lines()
            .filter(|l| !l.trim_start().starts_with('#'))
            .any(|l| l.contains("flip-link"));
        assert!(!has_dep, "flip-link must not appear as a dependency");
    }
}
