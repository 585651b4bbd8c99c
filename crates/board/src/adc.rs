//! ADC4 sampling through a GPDMA1 linked list.
//!
//! ADC4 scans the battery and modem-current channels; GPDMA1 channel 0 moves
//! every conversion into a circular [`SampleBuffer`](crate::dma::SampleBuffer)
//! without CPU involvement. Bring-up leaves the ADC enabled and the channel
//! linked but does not start conversions: `ADSTART` belongs to whoever
//! consumes the samples.
//!
//! ```text
//! clocks → analog pins → regulator + LDORDY → calibration → CFGR1/SMPR/CHSELR
//!   → ADEN + ADRDY → build circular node queue → link queue + channel ready
//!   → GPDMA1_CH0 IRQ
//! ```
//!
//! Calibration runs before `CFGR1.DMAEN` is set: the calibration factor lands
//! in `DR` and would otherwise be picked up as a DMA request.
//!
//! # Register map (RM0456 §33.7, ADC4 at 0x4602_1000)
//!
//! | Register | Offset | Fields used |
//! |---|---|---|
//! | ISR | 0x00 | ADRDY (0), LDORDY (12) |
//! | CR | 0x08 | ADEN (0), ADDIS (1), ADSTART (2), ADSTP (4), ADVREGEN (28), ADCAL (31) |
//! | CFGR1 | 0x0C | DMAEN (0), DMACFG (1), RES (3:2), OVRMOD (12), CONT (13) |
//! | SMPR | 0x14 | SMP1 (2:0) |
//! | CHSELR | 0x28 | CHSEL (23:0) |
//! | DR | 0x40 | conversion data |

use core::marker::PhantomData;

use bringup::wait::{wait_ready, wait_until};
use bringup::{
    ClockSource, ConfigError, DataWidth, DmaChannel, DmaConfig, DmaLinkage, DmaNodeConfig, Hal, HalError,
    InterruptConfig, PeripheralConfig, PeripheralId, PinConfig, QueueId, ReadyCondition, Routine, Step,
    StepKind, TransferDirection,
};

use crate::config::{ADC_DMA_IRQ_PRIORITY, ADC_READY_TIMEOUT_MS, GPDMA1_CH0_IRQ};
use crate::pins;
use crate::steps::{self, Ctx};

/// Configuration of the ADC routine.
pub type AdcConfig = PeripheralConfig<AdcSettings>;

/// ADC4 register block base address.
pub const ADC4_BASE: u32 = 0x4602_1000;

/// Interrupt and status register.
pub const ISR: u32 = 0x00;
/// Control register.
pub const CR: u32 = 0x08;
/// Configuration register 1.
pub const CFGR1: u32 = 0x0C;
/// Sampling time register.
pub const SMPR: u32 = 0x14;
/// Channel selection register.
pub const CHSELR: u32 = 0x28;
/// Data register.
pub const DR: u32 = 0x40;

/// `ISR.ADRDY`
pub const ISR_ADRDY: u32 = 1 << 0;
/// `ISR.LDORDY`
pub const ISR_LDORDY: u32 = 1 << 12;

/// `CR.ADEN`
pub const CR_ADEN: u32 = 1 << 0;
/// `CR.ADDIS`
pub const CR_ADDIS: u32 = 1 << 1;
/// `CR.ADSTART`
pub const CR_ADSTART: u32 = 1 << 2;
/// `CR.ADSTP`
pub const CR_ADSTP: u32 = 1 << 4;
/// `CR.ADVREGEN`
pub const CR_ADVREGEN: u32 = 1 << 28;
/// `CR.ADCAL`
pub const CR_ADCAL: u32 = 1 << 31;

/// GPDMA1 request line of ADC4 (RM0456 Table 137).
pub const ADC4_DMA_REQUEST: u8 = 1;

/// GPDMA1 channel carrying the sample stream.
pub const SAMPLE_CHANNEL: DmaChannel = DmaChannel(0);

/// Descriptor queue of the sample stream.
pub const SAMPLE_QUEUE: QueueId = QueueId(0);

/// Voltage regulator ready.
pub const REGULATOR_READY: ReadyCondition = ReadyCondition::set(ISR, ISR_LDORDY);
/// Calibration finished.
pub const CALIBRATION_DONE: ReadyCondition = ReadyCondition::clear(CR, CR_ADCAL);
/// ADC ready to convert.
pub const ADC_READY: ReadyCondition = ReadyCondition::set(ISR, ISR_ADRDY);
/// No conversion ongoing.
pub const CONVERSION_STOPPED: ReadyCondition = ReadyCondition::clear(CR, CR_ADSTART);
/// ADC disabled.
pub const ADC_DISABLED: ReadyCondition = ReadyCondition::clear(CR, CR_ADEN);

/// Conversion resolution (`CFGR1.RES`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 12 bits
    Bits12 = 0b00,
    /// 10 bits
    Bits10 = 0b01,
    /// 8 bits
    Bits8 = 0b10,
    /// 6 bits
    Bits6 = 0b11,
}

/// Sampling time in ADC clock cycles (`SMPR.SMP1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleTime {
    /// 1.5 cycles
    Cycles1_5 = 0b000,
    /// 3.5 cycles
    Cycles3_5 = 0b001,
    /// 7.5 cycles
    Cycles7_5 = 0b010,
    /// 12.5 cycles
    Cycles12_5 = 0b011,
    /// 19.5 cycles
    Cycles19_5 = 0b100,
    /// 39.5 cycles
    Cycles39_5 = 0b101,
    /// 79.5 cycles
    Cycles79_5 = 0b110,
    /// 814.5 cycles
    Cycles814_5 = 0b111,
}

/// ADC4 conversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcSettings {
    /// Scanned channels, one bit per channel (bit 0 = channel 0).
    pub channels: u32,
    /// Conversion resolution.
    pub resolution: Resolution,
    /// Sampling time shared by every channel.
    pub sample_time: SampleTime,
    /// Restart the scan as soon as it ends.
    pub continuous: bool,
}

impl AdcSettings {
    /// Battery divider and modem current sense, 12 bits, continuous.
    ///
    /// 79.5 cycles covers the 100 kΩ battery divider source impedance at
    /// 16 MHz (RM0456 §33.4.12).
    pub const BOARD_SENSORS: Self = Self {
        channels: (1 << pins::VBAT_SENSE_CHANNEL) | (1 << pins::MODEM_ISENSE_CHANNEL),
        resolution: Resolution::Bits12,
        sample_time: SampleTime::Cycles79_5,
        continuous: true,
    };
}

/// Sensor configuration streaming into `buffer_addr`.
///
/// `buffer_bytes` is the circular buffer size; it must be a whole number of
/// half-words.
pub fn default_config(buffer_addr: u32, buffer_bytes: u16) -> Result<AdcConfig, ConfigError> {
    let node = DmaNodeConfig {
        request: ADC4_DMA_REQUEST,
        direction: TransferDirection::PeripheralToMemory,
        src_addr: ADC4_BASE.wrapping_add(DR),
        dst_addr: buffer_addr,
        src_width: DataWidth::HalfWord,
        dst_width: DataWidth::HalfWord,
        src_increment: false,
        dst_increment: true,
        block_bytes: buffer_bytes,
    };

    PeripheralConfig::builder(PeripheralId::Adc4, AdcSettings::BOARD_SENSORS)
        .clock(ClockSource::Hsi16)
        .clock_for(PeripheralId::Gpdma1, ClockSource::Hclk)
        .pin(PinConfig::analog(pins::VBAT_SENSE))
        .pin(PinConfig::analog(pins::MODEM_ISENSE))
        .dma(DmaConfig {
            channel: SAMPLE_CHANNEL,
            queue: SAMPLE_QUEUE,
            node,
            circular: true,
        })
        .interrupt(InterruptConfig {
            irq: GPDMA1_CH0_IRQ,
            priority: ADC_DMA_IRQ_PRIORITY,
        })
        .ready_timeout_ms(ADC_READY_TIMEOUT_MS)
        .build()
}

// ── Register images ──────────────────────────────────────────────────────────

/// `CFGR1`: DMA requests (circular when `circular_dma`), resolution,
/// overrun overwrites, continuous mode.
pub const fn cfgr1(settings: &AdcSettings, circular_dma: bool) -> u32 {
    const DMAEN: u32 = 1 << 0;
    const DMACFG: u32 = 1 << 1;
    const OVRMOD: u32 = 1 << 12;
    const CONT: u32 = 1 << 13;

    let mut value = DMAEN | OVRMOD | (settings.resolution as u32).wrapping_shl(2);
    if circular_dma {
        value |= DMACFG;
    }
    if settings.continuous {
        value |= CONT;
    }
    value
}

/// `SMPR`: every channel on SMP1.
pub const fn smpr(settings: &AdcSettings) -> u32 {
    settings.sample_time as u32
}

/// `CHSELR`: channel bitmap (channels 0..=23).
pub const fn chselr(settings: &AdcSettings) -> u32 {
    settings.channels & 0x00FF_FFFF
}

// ── Steps ────────────────────────────────────────────────────────────────────

fn enable_regulator<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    hal.write_register(PeripheralId::Adc4, CR, CR_ADVREGEN)?;
    wait_ready(hal, PeripheralId::Adc4, &REGULATOR_READY, ctx.config().ready_timeout_ms())
}

fn calibrate<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    hal.write_register(PeripheralId::Adc4, CR, CR_ADVREGEN | CR_ADCAL)?;
    wait_ready(hal, PeripheralId::Adc4, &CALIBRATION_DONE, ctx.config().ready_timeout_ms())
}

fn configure_conversions<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    let settings = ctx.config().settings();
    let circular = ctx.config().dma().is_some_and(|dma| dma.circular);
    hal.write_register(PeripheralId::Adc4, CFGR1, cfgr1(settings, circular))?;
    hal.write_register(PeripheralId::Adc4, SMPR, smpr(settings))?;
    hal.write_register(PeripheralId::Adc4, CHSELR, chselr(settings))
}

fn enable_adc<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    // ADRDY is write-one-to-clear.
    hal.write_register(PeripheralId::Adc4, ISR, ISR_ADRDY)?;
    hal.write_register(PeripheralId::Adc4, CR, CR_ADVREGEN | CR_ADEN)?;
    wait_ready(hal, PeripheralId::Adc4, &ADC_READY, ctx.config().ready_timeout_ms())
}

fn build_node_queue<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    let dma = ctx.config().dma().ok_or(HalError::Error)?;
    let node = hal.build_node(&dma.node)?;
    hal.insert_tail(dma.queue, node)?;
    if dma.circular {
        hal.set_circular(dma.queue, node)?;
    }
    Ok(())
}

fn link_queue<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    let dma = *ctx.config().dma().ok_or(HalError::Error)?;
    hal.link_queue(dma.channel, dma.queue)?;
    wait_until(ctx.config().ready_timeout_ms(), || hal.channel_ready(dma.channel))?;
    ctx.attach_dma(DmaLinkage {
        channel: dma.channel,
        queue: dma.queue,
        nodes: 1,
        circular: dma.circular,
    });
    Ok(())
}

fn unlink_queue<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    if let Some(linkage) = ctx.dma().copied() {
        hal.unlink_queue(linkage.channel);
        hal.reset_queue(linkage.queue);
    }
    Ok(())
}

// Stop any running scan, disable, then switch the regulator off. Every write
// is attempted even if an earlier one or its wait failed; the first error is
// reported.
fn stop_and_disable<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, AdcSettings>) -> Result<(), HalError> {
    let timeout = ctx.config().ready_timeout_ms();

    let stopped = if hal.read_register(PeripheralId::Adc4, CR) & CR_ADSTART == 0 {
        Ok(())
    } else {
        hal.write_register(PeripheralId::Adc4, CR, CR_ADVREGEN | CR_ADEN | CR_ADSTP)
            .and_then(|()| wait_ready(hal, PeripheralId::Adc4, &CONVERSION_STOPPED, timeout))
    };

    let disabled = hal
        .write_register(PeripheralId::Adc4, CR, CR_ADVREGEN | CR_ADEN | CR_ADDIS)
        .and_then(|()| wait_ready(hal, PeripheralId::Adc4, &ADC_DISABLED, timeout));

    let regulator_off = hal.write_register(PeripheralId::Adc4, CR, 0);
    stopped.and(disabled).and(regulator_off)
}

/// Step tables of the ADC routine for the register access layer `H`.
pub struct AdcRoutine<H>(PhantomData<fn(&mut H)>);

impl<H: Hal + 'static> AdcRoutine<H> {
    /// Bring-up steps, in order.
    pub const INIT: &'static [Step<H, AdcConfig>] = &[
        Step::new("ADC4 + GPDMA1 clocks", StepKind::Clock, steps::enable_clocks::<H, AdcSettings>),
        Step::new("analog pins", StepKind::Pins, steps::configure_pins::<H, AdcSettings>),
        Step::new("voltage regulator", StepKind::Peripheral, enable_regulator::<H>),
        Step::new("calibration", StepKind::Peripheral, calibrate::<H>),
        Step::new("conversion configuration", StepKind::Peripheral, configure_conversions::<H>),
        Step::new("enable ADC", StepKind::Peripheral, enable_adc::<H>),
        Step::new("build node queue", StepKind::DmaLink, build_node_queue::<H>),
        Step::new("link node queue", StepKind::DmaLink, link_queue::<H>),
        Step::new("enable DMA IRQ", StepKind::Interrupt, steps::enable_interrupt::<H, AdcSettings>),
    ];

    /// Tear-down steps, in order.
    pub const DEINIT: &'static [Step<H, AdcConfig>] = &[
        Step::new("disable DMA IRQ", StepKind::Interrupt, steps::disable_interrupt::<H, AdcSettings>),
        Step::new("unlink node queue", StepKind::DmaLink, unlink_queue::<H>),
        Step::new("stop and disable ADC", StepKind::Peripheral, stop_and_disable::<H>),
        Step::new("release pins", StepKind::Pins, steps::release_pins::<H, AdcSettings>),
        Step::new("gate clocks", StepKind::Clock, steps::disable_clocks::<H, AdcSettings>),
    ];
}

/// The ADC4 routine.
pub fn routine<H: Hal + 'static>() -> Routine<'static, H, AdcConfig> {
    Routine::new(PeripheralId::Adc4, AdcRoutine::<H>::INIT, AdcRoutine::<H>::DEINIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSORS: AdcSettings = AdcSettings::BOARD_SENSORS;

    #[test]
    fn sensors_select_channels_22_and_23() {
        assert_eq!(chselr(&SENSORS), 0x00C0_0000);
    }

    #[test]
    fn cfgr1_circular_dma_continuous_12_bit() {
        assert_eq!(cfgr1(&SENSORS, true), 0x0000_3003);
    }

    #[test]
    fn cfgr1_one_shot_dma_8_bit_single() {
        let single = AdcSettings {
            resolution: Resolution::Bits8,
            continuous: false,
            ..SENSORS
        };
        assert_eq!(cfgr1(&single, false), 0x0000_1009);
    }

    #[test]
    fn smpr_uses_smp1_code() {
        assert_eq!(smpr(&SENSORS), 0b110);
    }

    #[test]
    fn channels_above_23_are_masked() {
        let bogus = AdcSettings {
            channels: 0xFF00_0001,
            ..SENSORS
        };
        assert_eq!(chselr(&bogus), 1);
    }

    #[test]
    fn default_config_streams_data_register_into_buffer() {
        let config = default_config(0x2000_0100, 128).unwrap();
        let dma = config.dma().unwrap();
        assert_eq!(dma.node.src_addr, 0x4602_1040);
        assert_eq!(dma.node.dst_addr, 0x2000_0100);
        assert_eq!(dma.node.request, ADC4_DMA_REQUEST);
        assert!(dma.circular);
        assert!(!dma.node.src_increment);
        assert!(dma.node.dst_increment);
    }

    #[test]
    fn odd_buffer_size_is_rejected() {
        assert_eq!(default_config(0x2000_0100, 127), Err(ConfigError::InvalidDmaNode));
    }
}
