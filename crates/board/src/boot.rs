//! Board bring-up order.
//!
//! Initialization order (MUST be respected, later routines depend on earlier
//! ones):
//!   1. GPIO: pin map, safe output levels, user button EXTI
//!   2. OCTOSPI1: memory-mapped flash (assets are fetched from the window)
//!   3. ADC4 + GPDMA1: sensor sampling into the circular sample buffer
//!
//! Each routine runs fail-fast through the [`Sequencer`]. The first fault in
//! any routine stops the whole bring-up: routines after it never run and the
//! handles already brought up are dropped without tear-down, because the
//! fatal handler resets the MCU on hardware anyway.
//!
//! [`tear_down`] releases the board in the reverse order.

use bringup::{ConfigError, FatalHandler, FaultReason, Hal, HandleState, PeripheralId, Sequencer};

use crate::adc::{self, AdcConfig};
use crate::gpio_init::{self, GpioConfig};
use crate::octospi::{self, OctospiConfig};

/// Order in which [`bring_up`] runs the board routines.
///
/// # Correctness Invariants
///
/// - GPIO first: the display and modem control lines must be driven to their
///   inactive levels before anything else can glitch them.
/// - OCTOSPI before ADC: nothing in the ADC routine needs the flash, but the
///   flash window must be up before the application starts, and a flash
///   fault is the likelier one. Failing early keeps the ADC unconfigured.
pub const BRING_UP_ORDER: [PeripheralId; 3] = [PeripheralId::Gpio, PeripheralId::Octospi1, PeripheralId::Adc4];

/// Configuration of every board routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// GPIO pin map.
    pub gpio: GpioConfig,
    /// External flash.
    pub flash: OctospiConfig,
    /// Sensor sampling.
    pub adc: AdcConfig,
}

impl BoardConfig {
    /// Default board configuration with ADC4 streaming into the buffer at
    /// `sample_addr` of `sample_bytes` bytes.
    pub fn new(sample_addr: u32, sample_bytes: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            gpio: gpio_init::default_config()?,
            flash: octospi::default_config()?,
            adc: adc::default_config(sample_addr, sample_bytes)?,
        })
    }
}

/// Live handles of a fully brought-up board.
#[derive(Debug)]
pub struct Board {
    /// GPIO handle.
    pub gpio: HandleState<GpioConfig>,
    /// Flash handle.
    pub flash: HandleState<OctospiConfig>,
    /// ADC handle, carrying the DMA linkage.
    pub adc: HandleState<AdcConfig>,
}

impl Board {
    /// Every handle is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.gpio.is_ready() && self.flash.is_ready() && self.adc.is_ready()
    }
}

/// Bring the board up in [`BRING_UP_ORDER`].
///
/// Returns the reason of the first fault; the fatal handler has already seen
/// its report.
pub fn bring_up<H, F>(hal: &mut H, sequencer: &mut Sequencer<F>, config: BoardConfig) -> Result<Board, FaultReason>
where
    H: Hal + 'static,
    F: FatalHandler,
{
    #[cfg(feature = "defmt")]
    defmt::info!("{} v{}: bring-up", crate::config::BOARD_NAME, crate::config::BOARD_VERSION);
    #[cfg(feature = "tracing")]
    tracing::info!("{} v{}: bring-up", crate::config::BOARD_NAME, crate::config::BOARD_VERSION);

    let gpio = sequencer.run(hal, &gpio_init::routine(), config.gpio)?;
    let flash = sequencer.run(hal, &octospi::routine(), config.flash)?;
    let adc = sequencer.run(hal, &adc::routine(), config.adc)?;

    Ok(Board { gpio, flash, adc })
}

/// Tear the board down, reverse of [`BRING_UP_ORDER`]. Best effort.
pub fn tear_down<H, F>(hal: &mut H, sequencer: &mut Sequencer<F>, board: &mut Board)
where
    H: Hal + 'static,
    F: FatalHandler,
{
    sequencer.teardown(hal, &adc::routine(), &mut board.adc);
    sequencer.teardown(hal, &octospi::routine(), &mut board.flash);
    sequencer.teardown(hal, &gpio_init::routine(), &mut board.gpio);
}

// ── RCC clock configuration ───────────────────────────────────────────────────

/// Build the `embassy_stm32::Config` for this board.
///
/// # Clock Tree (HSI16 → 160 MHz core)
///
/// HSI16 → PLL1 (M=1, N=10, R=1) → PLL1_R = 160 MHz (SYSCLK)
/// AHB/APB prescalers: DIV1 → 160 MHz
///
/// | Peripheral | Kernel clock | Frequency |
/// |---|---|---|
/// | OCTOSPI1 | SYSCLK | 160 MHz, PRESCALER=1 → 80 MHz bus |
/// | ADC4 | HSI16 | 16 MHz |
///
/// The kernel clock muxes themselves are programmed by the clock steps of
/// each routine, checked against [`crate::config::CLOCK_REQUIREMENTS`].
#[cfg(feature = "hardware")]
pub fn build_embassy_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::{ClockSrc, PllConfig};

    let mut config = embassy_stm32::Config::default();
    config.rcc.mux = ClockSrc::PLL1_R(PllConfig::hsi_160mhz());
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use bringup::mocks::{RecordingFatal, RecordingHal};

    fn config() -> BoardConfig {
        BoardConfig::new(0x2000_0000, 128).unwrap()
    }

    #[test]
    fn order_is_gpio_flash_adc() {
        assert_eq!(
            BRING_UP_ORDER,
            [PeripheralId::Gpio, PeripheralId::Octospi1, PeripheralId::Adc4]
        );
    }

    #[test]
    fn default_board_comes_up() {
        let mut hal = RecordingHal::new();
        let mut sequencer = Sequencer::new(RecordingFatal::new());

        let board = bring_up(&mut hal, &mut sequencer, config()).unwrap();

        assert!(board.is_ready());
        assert!(board.adc.dma().is_some());
        assert!(sequencer.handler().reports().is_empty());
    }

    #[test]
    fn sample_buffer_must_hold_whole_samples() {
        assert_eq!(BoardConfig::new(0x2000_0000, 3), Err(ConfigError::InvalidDmaNode));
    }
}
