//! Peripheral configuration values
//!
//! A [`PeripheralConfig`] is the immutable description of one peripheral
//! instance: which clocks feed it, which pins it owns, its interrupt line, its
//! DMA node and how long a ready wait may take. It is built once at startup
//! through [`PeripheralConfig::builder`], then moved into the handle that the
//! sequencer produces. Every field is either required or has an explicit
//! default; nothing relies on zero-initialised register structs.

use heapless::Vec;

use crate::clock::ClockSource;
use crate::dma::DmaConfig;
use crate::gpio::{Alternate, Analog, GpioPin, Input, InterruptMode, Output, OutputType, PinId, PinState, Port};

/// Maximum number of clock entries per peripheral.
pub const MAX_CLOCKS: usize = 8;

/// Maximum number of pins per peripheral.
pub const MAX_PINS: usize = 16;

/// Ready-wait timeout used when the builder is not given one.
pub const DEFAULT_READY_TIMEOUT_MS: u32 = 100;

/// Peripheral instances known to the bring-up layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralId {
    /// Board GPIO as a whole (pin map bring-up).
    Gpio,
    /// A single GPIO port (clock gating, register block).
    GpioPort(Port),
    /// Extended interrupt/event controller.
    Exti,
    /// 12-bit low-power ADC.
    Adc4,
    /// General-purpose DMA controller 1.
    Gpdma1,
    /// Octo-SPI interface 1.
    Octospi1,
    /// Octo-SPI I/O manager.
    Octospim,
}

impl core::fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PeripheralId::Gpio => f.write_str("GPIO"),
            PeripheralId::GpioPort(port) => write!(f, "GPIO{}", port.letter()),
            PeripheralId::Exti => f.write_str("EXTI"),
            PeripheralId::Adc4 => f.write_str("ADC4"),
            PeripheralId::Gpdma1 => f.write_str("GPDMA1"),
            PeripheralId::Octospi1 => f.write_str("OCTOSPI1"),
            PeripheralId::Octospim => f.write_str("OCTOSPIM"),
        }
    }
}

/// One clock to enable: the peripheral's bus/kernel clock and its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Peripheral whose clock is gated.
    pub peripheral: PeripheralId,
    /// Source selected in the RCC kernel clock mux.
    pub source: ClockSource,
}

/// Pin multiplexer function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinFunction {
    /// Digital input
    Input,
    /// Digital output
    Output,
    /// Alternate function with its AF number (0..=15)
    Alternate(u8),
    /// Analog
    Analog,
}

/// Internal pull resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// No pull
    None,
    /// Pull-up
    Up,
    /// Pull-down
    Down,
}

/// Output slew rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// Low speed
    Low,
    /// Medium speed
    Medium,
    /// High speed
    High,
    /// Very high speed
    VeryHigh,
}

/// Complete configuration of one pin.
///
/// Constructors take typed pins, so the direction always agrees with the
/// board pin map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    /// Pin identity.
    pub pin: PinId,
    /// Mux function.
    pub function: PinFunction,
    /// Pull resistor.
    pub pull: Pull,
    /// Slew rate.
    pub speed: Speed,
    /// Driver type (outputs and alternate functions).
    pub output_type: OutputType,
    /// Level latched before the pin becomes an output.
    pub initial: PinState,
    /// EXTI trigger, if the pin raises an interrupt.
    pub interrupt: Option<InterruptMode>,
}

impl PinConfig {
    const fn with_function(pin: PinId, function: PinFunction) -> Self {
        Self {
            pin,
            function,
            pull: Pull::None,
            speed: Speed::Low,
            output_type: OutputType::PushPull,
            initial: PinState::Low,
            interrupt: None,
        }
    }

    /// Push-pull output, initially low.
    pub const fn output(pin: GpioPin<Output>) -> Self {
        Self::with_function(pin.id(), PinFunction::Output)
    }

    /// Floating input.
    pub const fn input(pin: GpioPin<Input>) -> Self {
        Self::with_function(pin.id(), PinFunction::Input)
    }

    /// Analog input.
    pub const fn analog(pin: GpioPin<Analog>) -> Self {
        Self::with_function(pin.id(), PinFunction::Analog)
    }

    /// Alternate function `af`.
    pub const fn alternate(pin: GpioPin<Alternate>, af: u8) -> Self {
        Self::with_function(pin.id(), PinFunction::Alternate(af))
    }

    /// Set the pull resistor.
    #[must_use]
    pub const fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    /// Set the slew rate.
    #[must_use]
    pub const fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    /// Set the output driver type.
    #[must_use]
    pub const fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    /// Set the level latched before the pin switches to output.
    #[must_use]
    pub const fn with_initial(mut self, initial: PinState) -> Self {
        self.initial = initial;
        self
    }

    /// Route the pin to EXTI with the given trigger.
    #[must_use]
    pub const fn with_interrupt(mut self, mode: InterruptMode) -> Self {
        self.interrupt = Some(mode);
        self
    }
}

/// NVIC interrupt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqNumber(pub u16);

/// Interrupt line and its NVIC priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptConfig {
    /// NVIC line.
    pub irq: IrqNumber,
    /// Preemption priority (0 = highest; STM32U5 implements the top 4 bits).
    pub priority: u8,
}

/// Configuration rejected by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No clock was configured; every peripheral needs at least one.
    #[error("no clock configured")]
    NoClock,
    /// More clock entries than [`MAX_CLOCKS`].
    #[error("too many clocks")]
    TooManyClocks,
    /// More pin entries than [`MAX_PINS`].
    #[error("too many pins")]
    TooManyPins,
    /// The same pin appears twice.
    #[error("pin {0} assigned twice")]
    DuplicatePin(PinId),
    /// DMA node block size is zero or not a multiple of its data width.
    #[error("invalid DMA node")]
    InvalidDmaNode,
    /// A zero ready timeout would fail every wait.
    #[error("ready timeout must be non-zero")]
    ZeroTimeout,
}

/// Immutable configuration of one peripheral instance.
///
/// `S` carries the peripheral-specific settings (ADC channel and sampling
/// parameters, flash command parameters, ...). Routines read it through
/// [`StepContext::config`](crate::StepContext::config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig<S> {
    peripheral: PeripheralId,
    clocks: Vec<ClockConfig, MAX_CLOCKS>,
    pins: Vec<PinConfig, MAX_PINS>,
    interrupt: Option<InterruptConfig>,
    dma: Option<DmaConfig>,
    ready_timeout_ms: u32,
    settings: S,
}

impl<S> PeripheralConfig<S> {
    /// Start building the configuration of `peripheral`.
    pub fn builder(peripheral: PeripheralId, settings: S) -> PeripheralConfigBuilder<S> {
        PeripheralConfigBuilder {
            peripheral,
            clocks: Vec::new(),
            pins: Vec::new(),
            interrupt: None,
            dma: None,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            settings,
            error: None,
        }
    }

    /// Peripheral this configuration describes.
    pub fn peripheral(&self) -> PeripheralId {
        self.peripheral
    }

    /// Clocks to enable, in order.
    pub fn clocks(&self) -> &[ClockConfig] {
        &self.clocks
    }

    /// Pins owned by the peripheral, in configuration order.
    pub fn pins(&self) -> &[PinConfig] {
        &self.pins
    }

    /// Interrupt line, if any.
    pub fn interrupt(&self) -> Option<&InterruptConfig> {
        self.interrupt.as_ref()
    }

    /// DMA node parameters, if any.
    pub fn dma(&self) -> Option<&DmaConfig> {
        self.dma.as_ref()
    }

    /// Upper bound for every hardware-ready wait of this peripheral.
    pub fn ready_timeout_ms(&self) -> u32 {
        self.ready_timeout_ms
    }

    /// Peripheral-specific settings.
    pub fn settings(&self) -> &S {
        &self.settings
    }
}

/// Builder for [`PeripheralConfig`].
///
/// Errors are sticky: the first rejected entry is reported by
/// [`build`](Self::build) and later calls are ignored.
#[derive(Debug)]
pub struct PeripheralConfigBuilder<S> {
    peripheral: PeripheralId,
    clocks: Vec<ClockConfig, MAX_CLOCKS>,
    pins: Vec<PinConfig, MAX_PINS>,
    interrupt: Option<InterruptConfig>,
    dma: Option<DmaConfig>,
    ready_timeout_ms: u32,
    settings: S,
    error: Option<ConfigError>,
}

impl<S> PeripheralConfigBuilder<S> {
    fn fail(&mut self, error: ConfigError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Enable the peripheral's own clock from `source`.
    #[must_use]
    pub fn clock(self, source: ClockSource) -> Self {
        let peripheral = self.peripheral;
        self.clock_for(peripheral, source)
    }

    /// Enable the clock of a companion peripheral (DMA controller, I/O manager).
    #[must_use]
    pub fn clock_for(mut self, peripheral: PeripheralId, source: ClockSource) -> Self {
        if self.clocks.push(ClockConfig { peripheral, source }).is_err() {
            self.fail(ConfigError::TooManyClocks);
        }
        self
    }

    /// Assign a pin.
    #[must_use]
    pub fn pin(mut self, pin: PinConfig) -> Self {
        if self.pins.iter().any(|p| p.pin == pin.pin) {
            self.fail(ConfigError::DuplicatePin(pin.pin));
        } else if self.pins.push(pin).is_err() {
            self.fail(ConfigError::TooManyPins);
        }
        self
    }

    /// Assign several pins, in order.
    #[must_use]
    pub fn pins<I>(self, pins: I) -> Self
    where
        I: IntoIterator<Item = PinConfig>,
    {
        pins.into_iter().fold(self, Self::pin)
    }

    /// Attach an interrupt line.
    #[must_use]
    pub fn interrupt(mut self, interrupt: InterruptConfig) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Attach DMA node parameters.
    #[must_use]
    pub fn dma(mut self, dma: DmaConfig) -> Self {
        if !dma.node.is_valid() {
            self.fail(ConfigError::InvalidDmaNode);
        }
        self.dma = Some(dma);
        self
    }

    /// Override the ready-wait timeout.
    #[must_use]
    pub fn ready_timeout_ms(mut self, timeout_ms: u32) -> Self {
        if timeout_ms == 0 {
            self.fail(ConfigError::ZeroTimeout);
        }
        self.ready_timeout_ms = timeout_ms;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<PeripheralConfig<S>, ConfigError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.clocks.is_empty() {
            return Err(ConfigError::NoClock);
        }
        Ok(PeripheralConfig {
            peripheral: self.peripheral,
            clocks: self.clocks,
            pins: self.pins,
            interrupt: self.interrupt,
            dma: self.dma,
            ready_timeout_ms: self.ready_timeout_ms,
            settings: self.settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::{DmaChannel, DmaNodeConfig, DataWidth, QueueId, TransferDirection};

    const LED: GpioPin<Output> = GpioPin::output(Port::B, 7);
    const BUTTON: GpioPin<Input> = GpioPin::input(Port::C, 13);

    fn node(block_bytes: u16) -> DmaNodeConfig {
        DmaNodeConfig {
            request: 0,
            direction: TransferDirection::PeripheralToMemory,
            src_addr: 0x4602_1040,
            dst_addr: 0x2000_0000,
            src_width: DataWidth::HalfWord,
            dst_width: DataWidth::HalfWord,
            src_increment: false,
            dst_increment: true,
            block_bytes,
        }
    }

    #[test]
    fn builds_with_defaults() {
        let config = PeripheralConfig::builder(PeripheralId::Gpio, ())
            .clock(ClockSource::Hclk)
            .pin(PinConfig::output(LED))
            .build()
            .unwrap();
        assert_eq!(config.peripheral(), PeripheralId::Gpio);
        assert_eq!(config.clocks().len(), 1);
        assert_eq!(config.pins()[0].function, PinFunction::Output);
        assert_eq!(config.ready_timeout_ms(), DEFAULT_READY_TIMEOUT_MS);
        assert!(config.interrupt().is_none());
        assert!(config.dma().is_none());
    }

    #[test]
    fn rejects_missing_clock() {
        let result = PeripheralConfig::builder(PeripheralId::Adc4, ()).build();
        assert_eq!(result.unwrap_err(), ConfigError::NoClock);
    }

    #[test]
    fn rejects_duplicate_pin() {
        let result = PeripheralConfig::builder(PeripheralId::Gpio, ())
            .clock(ClockSource::Hclk)
            .pin(PinConfig::output(LED))
            .pin(PinConfig::output(LED).with_initial(PinState::High))
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::DuplicatePin(LED.id()));
    }

    #[test]
    fn rejects_too_many_clocks() {
        let mut builder = PeripheralConfig::builder(PeripheralId::Gpio, ());
        for _ in 0..=MAX_CLOCKS {
            builder = builder.clock(ClockSource::Hclk);
        }
        assert_eq!(builder.build().unwrap_err(), ConfigError::TooManyClocks);
    }

    #[test]
    fn rejects_too_many_pins() {
        let pins = Port::ALL
            .iter()
            .take(2)
            .flat_map(|&port| (0..16).map(move |n| PinConfig::output(GpioPin::output(port, n))));
        let result = PeripheralConfig::builder(PeripheralId::Gpio, ())
            .clock(ClockSource::Hclk)
            .pins(pins)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::TooManyPins);
    }

    #[test]
    fn rejects_zero_timeout() {
        let result = PeripheralConfig::builder(PeripheralId::Adc4, ())
            .clock(ClockSource::Hsi16)
            .ready_timeout_ms(0)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::ZeroTimeout);
    }

    #[test]
    fn rejects_misaligned_dma_block() {
        let dma = DmaConfig {
            channel: DmaChannel(0),
            queue: QueueId(0),
            node: node(3),
            circular: true,
        };
        let result = PeripheralConfig::builder(PeripheralId::Adc4, ())
            .clock(ClockSource::Hsi16)
            .dma(dma)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::InvalidDmaNode);
    }

    #[test]
    fn first_error_wins() {
        let result = PeripheralConfig::builder(PeripheralId::Gpio, ())
            .ready_timeout_ms(0)
            .pin(PinConfig::input(BUTTON))
            .pin(PinConfig::input(BUTTON))
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::ZeroTimeout);
    }

    #[test]
    fn pin_modifiers_compose() {
        let pin = PinConfig::input(BUTTON)
            .with_pull(Pull::Up)
            .with_interrupt(InterruptMode::FallingEdge);
        assert_eq!(pin.pull, Pull::Up);
        assert_eq!(pin.interrupt, Some(InterruptMode::FallingEdge));
        assert_eq!(pin.function, PinFunction::Input);
    }

    #[test]
    fn peripheral_names_match_reference_manual() {
        assert_eq!(PeripheralId::Adc4.to_string(), "ADC4");
        assert_eq!(PeripheralId::GpioPort(Port::C).to_string(), "GPIOC");
        assert_eq!(PeripheralId::Octospi1.to_string(), "OCTOSPI1");
    }
}
