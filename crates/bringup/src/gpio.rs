//! GPIO and pin abstraction layer
//!
//! Typed pins (port + pin number + direction) with `set` / `clear` / `read`
//! methods, replacing text-substitution pin macros. The pin values are plain
//! descriptors: every access goes through a [`GpioBank`] so the same pin map
//! drives the MMIO backend on target and the recording mock in tests.
//!
//! ```
//! use bringup::gpio::{GpioPin, Output, Port};
//! use bringup::mocks::RecordingHal;
//!
//! const LED: GpioPin<Output> = GpioPin::output(Port::B, 7);
//!
//! let mut hal = RecordingHal::new();
//! LED.set(&mut hal);
//! assert!(LED.read(&mut hal));
//! LED.clear(&mut hal);
//! assert!(!LED.read(&mut hal));
//! ```

use core::marker::PhantomData;

use crate::hal::GpioBank;

/// GPIO port letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// GPIOA
    A,
    /// GPIOB
    B,
    /// GPIOC
    C,
    /// GPIOD
    D,
    /// GPIOE
    E,
    /// GPIOF
    F,
    /// GPIOG
    G,
    /// GPIOH
    H,
    /// GPIOI
    I,
}

impl Port {
    /// All ports, in register-map order.
    pub const ALL: [Port; 9] = [
        Port::A,
        Port::B,
        Port::C,
        Port::D,
        Port::E,
        Port::F,
        Port::G,
        Port::H,
        Port::I,
    ];

    /// Zero-based index (GPIOA = 0).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Port letter as an ASCII char.
    pub const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
            Port::F => 'F',
            Port::G => 'G',
            Port::H => 'H',
            Port::I => 'I',
        }
    }
}

/// Pin identity: port + number (0..=15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    port: Port,
    number: u8,
}

impl PinId {
    /// Create a pin identity, rejecting numbers above 15.
    pub const fn new(port: Port, number: u8) -> Option<Self> {
        if number < 16 {
            Some(Self { port, number })
        } else {
            None
        }
    }

    /// Port of this pin.
    pub const fn port(self) -> Port {
        self.port
    }

    /// Pin number within the port.
    pub const fn number(self) -> u8 {
        self.number
    }

    /// Single-bit mask in the port's 16-bit data registers.
    pub const fn mask(self) -> u16 {
        1 << self.number
    }
}

impl core::fmt::Display for PinId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "P{}{}", self.port.letter(), self.number)
    }
}

/// Pin state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    /// High (logic 1)
    High,
    /// Low (logic 0)
    Low,
}

impl From<bool> for PinState {
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<PinState> for bool {
    fn from(value: PinState) -> Self {
        matches!(value, PinState::High)
    }
}

/// Output driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    /// Push-pull output
    PushPull,
    /// Open-drain output
    OpenDrain,
}

/// External interrupt configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMode {
    /// Trigger on rising edge
    RisingEdge,
    /// Trigger on falling edge
    FallingEdge,
    /// Trigger on both edges
    BothEdges,
}

/// Pin direction as a value (the typestate markers carry it at compile time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Digital input
    Input,
    /// Digital output
    Output,
    /// Analog (ADC/DAC/COMP)
    Analog,
    /// Alternate function (peripheral-driven)
    Alternate,
}

/// Input mode marker
pub struct Input;

/// Output mode marker
pub struct Output;

/// Analog mode marker
pub struct Analog;

/// Alternate-function mode marker
pub struct Alternate;

/// Pin mode trait
pub trait PinMode {
    /// Direction encoded by this marker.
    const DIRECTION: Direction;
}

impl PinMode for Input {
    const DIRECTION: Direction = Direction::Input;
}
impl PinMode for Output {
    const DIRECTION: Direction = Direction::Output;
}
impl PinMode for Analog {
    const DIRECTION: Direction = Direction::Analog;
}
impl PinMode for Alternate {
    const DIRECTION: Direction = Direction::Alternate;
}

/// GPIO pin with type-state encoding
pub struct GpioPin<MODE> {
    id: PinId,
    _mode: PhantomData<MODE>,
}

// Manual impls: derives would require `MODE: Clone` etc.
impl<MODE> Clone for GpioPin<MODE> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<MODE> Copy for GpioPin<MODE> {}

impl<MODE> PartialEq for GpioPin<MODE> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<MODE> Eq for GpioPin<MODE> {}

impl<MODE> core::fmt::Debug for GpioPin<MODE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GpioPin({})", self.id)
    }
}

impl<MODE: PinMode> GpioPin<MODE> {
    // Meant for `const` pin maps, where an out-of-range number is a build
    // error. Runtime callers use `try_new` or `from_id`.
    const fn at(port: Port, number: u8) -> Self {
        assert!(number < 16, "GPIO pin number must be 0..=15");
        Self::from_id(PinId { port, number })
    }

    /// Pin descriptor for a number only known at runtime; `None` above 15.
    pub const fn try_new(port: Port, number: u8) -> Option<Self> {
        match PinId::new(port, number) {
            Some(id) => Some(Self::from_id(id)),
            None => None,
        }
    }

    /// Pin descriptor for an already validated identity.
    pub const fn from_id(id: PinId) -> Self {
        Self {
            id,
            _mode: PhantomData,
        }
    }

    /// Pin identity.
    pub const fn id(&self) -> PinId {
        self.id
    }

    /// Port of this pin.
    pub const fn port(&self) -> Port {
        self.id.port
    }

    /// Pin number within the port.
    pub const fn number(&self) -> u8 {
        self.id.number
    }

    /// Direction encoded by the type state.
    pub const fn direction(&self) -> Direction {
        MODE::DIRECTION
    }
}

impl GpioPin<Output> {
    /// Output pin descriptor.
    ///
    /// Panics on a number above 15; use [`GpioPin::try_new`] outside `const`.
    pub const fn output(port: Port, number: u8) -> Self {
        Self::at(port, number)
    }

    /// Drive the pin high (atomic BSRR-style set).
    pub fn set<B: GpioBank + ?Sized>(&self, bank: &mut B) {
        bank.set_reset(self.id.port, self.id.mask(), 0);
    }

    /// Drive the pin low (atomic BSRR-style reset).
    pub fn clear<B: GpioBank + ?Sized>(&self, bank: &mut B) {
        bank.set_reset(self.id.port, 0, self.id.mask());
    }

    /// Drive the pin to `state`.
    pub fn write<B: GpioBank + ?Sized>(&self, bank: &mut B, state: PinState) {
        match state {
            PinState::High => self.set(bank),
            PinState::Low => self.clear(bank),
        }
    }

    /// Invert the driven level.
    pub fn toggle<B: GpioBank + ?Sized>(&self, bank: &mut B) {
        if self.read(bank) {
            self.clear(bank);
        } else {
            self.set(bank);
        }
    }

    /// Read back the driven level (output data register).
    pub fn read<B: GpioBank + ?Sized>(&self, bank: &mut B) -> bool {
        bank.read_output(self.id.port) & self.id.mask() != 0
    }

    /// Borrow a bank and expose this pin through `embedded-hal` traits.
    pub fn bind<'b, B: GpioBank>(self, bank: &'b mut B) -> Bound<'b, B, Output> {
        Bound { pin: self, bank }
    }
}

impl GpioPin<Input> {
    /// Input pin descriptor.
    ///
    /// Panics on a number above 15; use [`GpioPin::try_new`] outside `const`.
    pub const fn input(port: Port, number: u8) -> Self {
        Self::at(port, number)
    }

    /// Sample the input data register.
    pub fn read<B: GpioBank + ?Sized>(&self, bank: &mut B) -> bool {
        bank.read_input(self.id.port) & self.id.mask() != 0
    }

    /// Borrow a bank and expose this pin through `embedded-hal` traits.
    pub fn bind<'b, B: GpioBank>(self, bank: &'b mut B) -> Bound<'b, B, Input> {
        Bound { pin: self, bank }
    }
}

impl GpioPin<Analog> {
    /// Analog pin descriptor.
    ///
    /// Panics on a number above 15; use [`GpioPin::try_new`] outside `const`.
    pub const fn analog(port: Port, number: u8) -> Self {
        Self::at(port, number)
    }
}

impl GpioPin<Alternate> {
    /// Alternate-function pin descriptor.
    ///
    /// Panics on a number above 15; use [`GpioPin::try_new`] outside `const`.
    pub const fn alternate(port: Port, number: u8) -> Self {
        Self::at(port, number)
    }
}

/// A pin bound to a bank, usable wherever an `embedded-hal` pin is expected.
pub struct Bound<'b, B, MODE> {
    pin: GpioPin<MODE>,
    bank: &'b mut B,
}

impl<B, MODE> embedded_hal::digital::ErrorType for Bound<'_, B, MODE> {
    type Error = core::convert::Infallible;
}

impl<B: GpioBank> embedded_hal::digital::OutputPin for Bound<'_, B, Output> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set(&mut *self.bank);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.clear(&mut *self.bank);
        Ok(())
    }
}

impl<B: GpioBank> embedded_hal::digital::StatefulOutputPin for Bound<'_, B, Output> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.read(&mut *self.bank))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pin.read(&mut *self.bank))
    }
}

impl<B: GpioBank> embedded_hal::digital::InputPin for Bound<'_, B, Input> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.read(&mut *self.bank))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pin.read(&mut *self.bank))
    }
}
