//! OCTOSPI1 memory-mapped flash.
//!
//! The OCTOSPI controller presents the external flash as a read-only window at
//! `0x9000_0000`. Once memory-mapped mode is entered the controller issues the
//! configured read command for every fetch from the window; this routine only
//! programs it and never performs a transaction itself.
//!
//! ```text
//! kernel clocks → bus pins (AF10 / AF3) → OCTOSPIM port routing
//!   → device configuration + BUSY wait → memory-mapped mode
//! ```
//!
//! # Hardware
//!
//! **Flash chip:** MX25LM51245G (Macronix), 64 MiB, octal DTR, 200 MHz max.
//!
//! **8READ DTR (0xEE11):**
//! - 16-bit instruction, 8 lines, DTR
//! - 32-bit address, 8 lines, DTR
//! - 20 dummy cycles (default for 200 MHz)
//! - data on 8 lines, DTR, strobed by DQS
//!
//! # Sources
//!
//! - MX25LM51245G datasheet rev. 1.3: §9 command set, Table 7 dummy cycles
//! - STM32U585 Reference Manual RM0456: §29 OCTOSPI, §28 OCTOSPIM
//! - B-U585I-IOT02A user manual UM2839: OCTOSPI1 pinout

use core::marker::PhantomData;

use bringup::wait::wait_ready;
use bringup::{
    ClockSource, ConfigError, Hal, HalError, PeripheralConfig, PeripheralId, PinConfig, ReadyCondition,
    Routine, Speed, Step, StepKind,
};

use crate::config::{OCTOSPI_READY_TIMEOUT_MS, SYSCLK_HZ};
use crate::pins;
use crate::steps::{self, Ctx};

/// Configuration of the OCTOSPI routine.
pub type OctospiConfig = PeripheralConfig<OctospiSettings>;

/// MX25LM51245G maximum clock frequency (Hz), STR and DTR.
pub const FLASH_MAX_HZ: u32 = 200_000_000;

/// Base address of the memory-mapped window (RM0456 Table 3).
pub const MEMORY_MAPPED_BASE: u32 = 0x9000_0000;

// ── Register map ─────────────────────────────────────────────────────────────

/// OCTOSPI control register.
pub const CR: u32 = 0x000;
/// Device configuration register 1.
pub const DCR1: u32 = 0x008;
/// Device configuration register 2.
pub const DCR2: u32 = 0x00C;
/// Status register.
pub const SR: u32 = 0x020;
/// Communication configuration register.
pub const CCR: u32 = 0x100;
/// Timing configuration register.
pub const TCR: u32 = 0x108;
/// Instruction register.
pub const IR: u32 = 0x110;

/// OCTOSPIM port 1 configuration register.
pub const OCTOSPIM_PCR1: u32 = 0x004;

/// `CR.EN`
pub const CR_EN: u32 = 1 << 0;
/// `CR.ABORT`
pub const CR_ABORT: u32 = 1 << 1;
/// `CR.FMODE = 11`: memory-mapped mode.
pub const CR_FMODE_MEMORY_MAPPED: u32 = 0b11 << 28;
/// `SR.BUSY`
pub const SR_BUSY: u32 = 1 << 5;

/// Controller idle.
pub const NOT_BUSY: ReadyCondition = ReadyCondition::clear(SR, SR_BUSY);

/// Flash command parameters and controller timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OctospiSettings {
    /// `DCR2.PRESCALER`: bus clock = kernel clock / (prescaler + 1).
    pub prescaler: u8,
    /// `DCR1.DEVSIZE`: device holds 2^(device_size + 1) bytes.
    pub device_size: u8,
    /// Minimum chip-select high time between commands, in bus cycles (1..=64).
    pub cs_high_cycles: u8,
    /// Dummy cycles between address and data.
    pub dummy_cycles: u8,
    /// Read command; values above 0xFF are sent as a 16-bit instruction.
    pub read_command: u16,
    /// Double transfer rate on instruction, address and data phases.
    pub dtr: bool,
}

impl OctospiSettings {
    /// MX25LM51245G in octal DTR at SYSCLK / 2 = 80 MHz.
    pub const MX25LM51245G: Self = Self {
        prescaler: 1,
        device_size: 25,
        cs_high_cycles: 3,
        dummy_cycles: 20,
        read_command: 0xEE11,
        dtr: true,
    };

    /// Addressable bytes.
    pub const fn device_bytes(&self) -> u64 {
        1_u64.wrapping_shl((self.device_size as u32).wrapping_add(1))
    }
}

/// OCTOSPI parameter rejected before touching the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OctospiError {
    /// The bus clock would exceed the flash's maximum frequency.
    #[error("OCTOSPI clock {bus_hz} Hz exceeds flash maximum of {max_hz} Hz")]
    ClockTooFast {
        /// Resulting bus clock.
        bus_hz: u32,
        /// Flash limit.
        max_hz: u32,
    },
}

/// Validate that a prescaler produces a bus clock within the flash's limit.
///
/// Returns the bus clock in Hz.
///
/// ```rust
/// use board::octospi::validate_prescaler;
/// assert_eq!(validate_prescaler(160_000_000, 1), Ok(80_000_000));
/// ```
pub fn validate_prescaler(kernel_hz: u32, prescaler: u8) -> Result<u32, OctospiError> {
    let bus_hz = kernel_hz.wrapping_div(u32::from(prescaler).wrapping_add(1));
    if bus_hz > FLASH_MAX_HZ {
        return Err(OctospiError::ClockTooFast {
            bus_hz,
            max_hz: FLASH_MAX_HZ,
        });
    }
    Ok(bus_hz)
}

/// Flash configuration: SYSCLK kernel clock, the OCTOSPI1 bus pins at very
/// high speed, MX25LM51245G command set.
pub fn default_config() -> Result<OctospiConfig, ConfigError> {
    let bus = [pins::OSPI_CLK, pins::OSPI_NCS, pins::OSPI_DQS]
        .into_iter()
        .chain(pins::OSPI_IO)
        .map(|pin| PinConfig::alternate(pin, pins::OCTOSPI_AF).with_speed(Speed::VeryHigh))
        .chain(core::iter::once(
            PinConfig::alternate(pins::OSPI_IO7, pins::OCTOSPI_IO7_AF).with_speed(Speed::VeryHigh),
        ));

    PeripheralConfig::builder(PeripheralId::Octospi1, OctospiSettings::MX25LM51245G)
        .clock(ClockSource::Sysclk)
        .clock_for(PeripheralId::Octospim, ClockSource::Hclk)
        .pins(bus)
        .ready_timeout_ms(OCTOSPI_READY_TIMEOUT_MS)
        .build()
}

// ── Register images ──────────────────────────────────────────────────────────

/// OCTOSPIM port 1: CLK, DQS, NCS, IO[3:0] and IO[7:4] all from OCTOSPI1.
///
/// `IOHSRC = 01` selects OCTOSPI1 IO[7:4]; every other source field is 0.
pub const fn octospim_pcr1() -> u32 {
    const CLKEN: u32 = 1 << 0;
    const DQSEN: u32 = 1 << 4;
    const NCSEN: u32 = 1 << 8;
    const IOLEN: u32 = 1 << 16;
    const IOHEN: u32 = 1 << 24;
    const IOHSRC_OCTOSPI1_HIGH: u32 = 0b01 << 25;
    CLKEN | DQSEN | NCSEN | IOLEN | IOHEN | IOHSRC_OCTOSPI1_HIGH
}

/// `DCR1`: Macronix memory type, device size, chip-select high time.
pub const fn dcr1(settings: &OctospiSettings) -> u32 {
    const MTYP_MACRONIX: u32 = 0b001 << 24;
    let devsize = (settings.device_size as u32 & 0x1F).wrapping_shl(16);
    let csht = (settings.cs_high_cycles.saturating_sub(1) as u32 & 0x3F).wrapping_shl(8);
    MTYP_MACRONIX | devsize | csht
}

/// `DCR2`: clock prescaler.
pub const fn dcr2(settings: &OctospiSettings) -> u32 {
    settings.prescaler as u32
}

/// `TCR`: dummy cycles, plus a quarter-cycle data hold in DTR mode.
pub const fn tcr(settings: &OctospiSettings) -> u32 {
    const DHQC: u32 = 1 << 28;
    let dcyc = settings.dummy_cycles as u32 & 0x1F;
    if settings.dtr {
        dcyc | DHQC
    } else {
        dcyc
    }
}

/// `CCR`: 8-line instruction, 32-bit address on 8 lines, 8-line data with DQS.
pub const fn ccr(settings: &OctospiSettings) -> u32 {
    const IMODE_8: u32 = 0b100;
    const IDTR: u32 = 1 << 3;
    const ISIZE_16: u32 = 0b01 << 4;
    const ADMODE_8: u32 = 0b100 << 8;
    const ADDTR: u32 = 1 << 11;
    const ADSIZE_32: u32 = 0b11 << 12;
    const DMODE_8: u32 = 0b100 << 24;
    const DDTR: u32 = 1 << 27;
    const DQSE: u32 = 1 << 29;

    let isize = if settings.read_command > 0xFF { ISIZE_16 } else { 0 };
    let lines = IMODE_8 | isize | ADMODE_8 | ADSIZE_32 | DMODE_8;
    if settings.dtr {
        lines | IDTR | ADDTR | DDTR | DQSE
    } else {
        lines
    }
}

/// `CR` once configured: enabled, memory-mapped.
pub const fn cr_memory_mapped() -> u32 {
    CR_FMODE_MEMORY_MAPPED | CR_EN
}

// ── Steps ────────────────────────────────────────────────────────────────────

fn route_port<H: Hal>(hal: &mut H, _ctx: &mut Ctx<'_, OctospiSettings>) -> Result<(), HalError> {
    hal.write_register(PeripheralId::Octospim, OCTOSPIM_PCR1, octospim_pcr1())
}

fn configure_device<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, OctospiSettings>) -> Result<(), HalError> {
    let settings = *ctx.config().settings();
    let timeout = ctx.config().ready_timeout_ms();

    validate_prescaler(SYSCLK_HZ, settings.prescaler).map_err(|_e| {
        #[cfg(feature = "defmt")]
        defmt::error!("OCTOSPI1: {}", _e);
        #[cfg(feature = "tracing")]
        tracing::error!("OCTOSPI1: {}", _e);
        HalError::Error
    })?;

    wait_ready(hal, PeripheralId::Octospi1, &NOT_BUSY, timeout)?;
    hal.write_register(PeripheralId::Octospi1, DCR1, dcr1(&settings))?;
    hal.write_register(PeripheralId::Octospi1, DCR2, dcr2(&settings))?;
    hal.write_register(PeripheralId::Octospi1, TCR, tcr(&settings))?;
    hal.write_register(PeripheralId::Octospi1, CCR, ccr(&settings))?;
    hal.write_register(PeripheralId::Octospi1, IR, u32::from(settings.read_command))?;
    wait_ready(hal, PeripheralId::Octospi1, &NOT_BUSY, timeout)
}

fn enter_memory_mapped<H: Hal>(hal: &mut H, _ctx: &mut Ctx<'_, OctospiSettings>) -> Result<(), HalError> {
    hal.write_register(PeripheralId::Octospi1, CR, cr_memory_mapped())
}

// ABORT also ends memory-mapped mode; the controller clears BUSY once the
// pending fetch is dropped.
fn abort_and_disable<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, OctospiSettings>) -> Result<(), HalError> {
    let timeout = ctx.config().ready_timeout_ms();
    let idle = hal
        .write_register(PeripheralId::Octospi1, CR, cr_memory_mapped() | CR_ABORT)
        .and_then(|()| wait_ready(hal, PeripheralId::Octospi1, &NOT_BUSY, timeout));
    // Cleared even when the abort failed.
    let disabled = hal.write_register(PeripheralId::Octospi1, CR, 0);
    idle.and(disabled)
}

/// Step tables of the OCTOSPI routine for the register access layer `H`.
pub struct OctospiRoutine<H>(PhantomData<fn(&mut H)>);

impl<H: Hal + 'static> OctospiRoutine<H> {
    /// Bring-up steps, in order.
    pub const INIT: &'static [Step<H, OctospiConfig>] = &[
        Step::new("kernel clocks", StepKind::Clock, steps::enable_clocks::<H, OctospiSettings>),
        Step::new("bus pins", StepKind::Pins, steps::configure_pins::<H, OctospiSettings>),
        Step::new("OCTOSPIM port routing", StepKind::Peripheral, route_port::<H>),
        Step::new("device configuration", StepKind::Peripheral, configure_device::<H>),
        Step::new("memory-mapped mode", StepKind::Peripheral, enter_memory_mapped::<H>),
    ];

    /// Tear-down steps, in order.
    pub const DEINIT: &'static [Step<H, OctospiConfig>] = &[
        Step::new("abort and disable", StepKind::Peripheral, abort_and_disable::<H>),
        Step::new("release pins", StepKind::Pins, steps::release_pins::<H, OctospiSettings>),
        Step::new("gate clocks", StepKind::Clock, steps::disable_clocks::<H, OctospiSettings>),
    ];
}

/// The OCTOSPI1 routine.
pub fn routine<H: Hal + 'static>() -> Routine<'static, H, OctospiConfig> {
    Routine::new(PeripheralId::Octospi1, OctospiRoutine::<H>::INIT, OctospiRoutine::<H>::DEINIT)
}
