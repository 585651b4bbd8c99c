//! GPIO bring-up: the board pin map as one routine.
//!
//! ```text
//! port clocks → latch output levels → outputs → inputs → EXTI routing → EXTI IRQ
//! ```
//!
//! Output levels are latched in ODR before the pins leave their analog reset
//! state, so the display stays deselected and the LEDs stay dark while the
//! mode registers change. Tear-down masks the EXTI line first, then returns
//! every pin to analog and gates the port clocks.
//!
//! # EXTI (RM0456 §23.6)
//!
//! | Register | Offset | Per line |
//! |---|---|---|
//! | RTSR1 | 0x000 | rising trigger enable |
//! | FTSR1 | 0x004 | falling trigger enable |
//! | EXTICR1..4 | 0x060 + 4·(line / 4) | 8-bit port select at 8·(line % 4) |
//! | IMR1 | 0x080 | interrupt unmask |

use core::marker::PhantomData;

use bringup::{
    ClockSource, ConfigError, Hal, HalError, InterruptConfig, InterruptMode, PeripheralConfig,
    PeripheralId, PinConfig, PinFunction, PinId, PinState, Port, Pull, Routine, Step, StepKind,
};

use crate::config::{BUTTON_IRQ_PRIORITY, EXTI13_IRQ, GPIO_READY_TIMEOUT_MS};
use crate::pins;
use crate::steps::{self, Ctx};

/// Configuration of the GPIO routine. GPIO has no settings of its own.
pub type GpioConfig = PeripheralConfig<()>;

/// EXTI rising trigger selection register 1.
pub const EXTI_RTSR1: u32 = 0x000;
/// EXTI falling trigger selection register 1.
pub const EXTI_FTSR1: u32 = 0x004;
/// EXTI external interrupt selection register 1.
pub const EXTI_EXTICR1: u32 = 0x060;
/// EXTI CPU wakeup with interrupt mask register 1.
pub const EXTI_IMR1: u32 = 0x080;

/// Pin map configuration.
///
/// | Pin | Function | Initial |
/// |---|---|---|
/// | LCD_CS | output | high (deselected) |
/// | LCD_DC | output | low |
/// | LCD_RST | output | low (held in reset) |
/// | LCD_BL | output | low (backlight off) |
/// | MODEM_PWR_EN | output | low (modem off) |
/// | MODEM_RST | output | low |
/// | MODEM_STATUS | input, pull-down | |
/// | USER_BUTTON | input, falling edge EXTI13 | |
/// | LED_RED, LED_GREEN | output | high (off, active low) |
///
/// Port clocks are derived from the pins, one per port in port order.
pub fn default_config() -> Result<GpioConfig, ConfigError> {
    let pins = [
        PinConfig::output(pins::LCD_CS).with_initial(PinState::High),
        PinConfig::output(pins::LCD_DC),
        PinConfig::output(pins::LCD_RST),
        PinConfig::output(pins::LCD_BL),
        PinConfig::output(pins::MODEM_PWR_EN),
        PinConfig::output(pins::MODEM_RST),
        PinConfig::input(pins::MODEM_STATUS).with_pull(Pull::Down),
        PinConfig::input(pins::USER_BUTTON).with_interrupt(InterruptMode::FallingEdge),
        PinConfig::output(pins::LED_RED).with_initial(PinState::High),
        PinConfig::output(pins::LED_GREEN).with_initial(PinState::High),
    ];

    let builder = Port::ALL
        .iter()
        .filter(|port| pins.iter().any(|p| p.pin.port() == **port))
        .fold(PeripheralConfig::builder(PeripheralId::Gpio, ()), |b, port| {
            b.clock_for(PeripheralId::GpioPort(*port), ClockSource::Hclk)
        });

    builder
        .pins(pins)
        .interrupt(InterruptConfig {
            irq: EXTI13_IRQ,
            priority: BUTTON_IRQ_PRIORITY,
        })
        .ready_timeout_ms(GPIO_READY_TIMEOUT_MS)
        .build()
}

// ── Register images ──────────────────────────────────────────────────────────

/// EXTICR port code (GPIOA = 0 .. GPIOI = 8).
pub const fn exti_port_code(port: Port) -> u32 {
    port.index() as u32
}

/// EXTICR register holding the port select of `line`.
pub const fn exticr_offset(line: u8) -> u32 {
    EXTI_EXTICR1.wrapping_add((line as u32 / 4).wrapping_mul(4))
}

/// `(mask, value)` of the port select field of `pin` in its EXTICR register.
pub const fn exticr_field(pin: PinId) -> (u32, u32) {
    let shift = (pin.number() as u32 % 4).wrapping_mul(8);
    (0xFF_u32.wrapping_shl(shift), exti_port_code(pin.port()).wrapping_shl(shift))
}

/// Rising and falling trigger bits of `line` for `mode`.
pub const fn trigger_bits(mode: InterruptMode, line: u8) -> (u32, u32) {
    let bit = 1_u32.wrapping_shl(line as u32);
    match mode {
        InterruptMode::RisingEdge => (bit, 0),
        InterruptMode::FallingEdge => (0, bit),
        InterruptMode::BothEdges => (bit, bit),
    }
}

/// Per-port `(set, reset)` masks latching the initial level of every output.
fn output_levels(config: &GpioConfig, port: Port) -> (u16, u16) {
    config
        .pins()
        .iter()
        .filter(|p| p.function == PinFunction::Output && p.pin.port() == port)
        .fold((0, 0), |(set, reset), p| match p.initial {
            PinState::High => (set | p.pin.mask(), reset),
            PinState::Low => (set, reset | p.pin.mask()),
        })
}

/// Pins routed to EXTI, with their trigger.
fn exti_pins(config: &GpioConfig) -> impl Iterator<Item = (PinId, InterruptMode)> + '_ {
    config
        .pins()
        .iter()
        .filter_map(|p| p.interrupt.map(|mode| (p.pin, mode)))
}

// ── Steps ────────────────────────────────────────────────────────────────────

fn latch_output_levels<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, ()>) -> Result<(), HalError> {
    for port in Port::ALL {
        let (set, reset) = output_levels(ctx.config(), port);
        if set != 0 || reset != 0 {
            hal.set_reset(port, set, reset);
        }
    }
    Ok(())
}

fn configure_outputs<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, ()>) -> Result<(), HalError> {
    steps::configure_pins_where(hal, ctx, |f| f == PinFunction::Output)
}

fn configure_inputs<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, ()>) -> Result<(), HalError> {
    steps::configure_pins_where(hal, ctx, |f| f == PinFunction::Input)
}

fn route_exti_lines<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, ()>) -> Result<(), HalError> {
    for (pin, mode) in exti_pins(ctx.config()) {
        let line = pin.number();
        let (mask, value) = exticr_field(pin);
        let (rising, falling) = trigger_bits(mode, line);
        let bit = 1_u32.wrapping_shl(u32::from(line));

        steps::modify_register(hal, PeripheralId::Exti, exticr_offset(line), mask, value)?;
        steps::modify_register(hal, PeripheralId::Exti, EXTI_RTSR1, bit, rising)?;
        steps::modify_register(hal, PeripheralId::Exti, EXTI_FTSR1, bit, falling)?;
        steps::modify_register(hal, PeripheralId::Exti, EXTI_IMR1, 0, bit)?;
    }
    Ok(())
}

fn mask_exti_lines<H: Hal>(hal: &mut H, ctx: &mut Ctx<'_, ()>) -> Result<(), HalError> {
    let mask = exti_pins(ctx.config()).fold(0_u32, |m, (pin, _)| m | 1_u32.wrapping_shl(u32::from(pin.number())));
    steps::modify_register(hal, PeripheralId::Exti, EXTI_IMR1, mask, 0)
}

/// Step tables of the GPIO routine for the register access layer `H`.
pub struct GpioRoutine<H>(PhantomData<fn(&mut H)>);

impl<H: Hal + 'static> GpioRoutine<H> {
    /// Bring-up steps, in order.
    pub const INIT: &'static [Step<H, GpioConfig>] = &[
        Step::new("port clocks", StepKind::Clock, steps::enable_clocks::<H, ()>),
        Step::new("latch output levels", StepKind::Pins, latch_output_levels::<H>),
        Step::new("configure outputs", StepKind::Pins, configure_outputs::<H>),
        Step::new("configure inputs", StepKind::Pins, configure_inputs::<H>),
        Step::new("route EXTI lines", StepKind::Peripheral, route_exti_lines::<H>),
        Step::new("enable EXTI IRQ", StepKind::Interrupt, steps::enable_interrupt::<H, ()>),
    ];

    /// Tear-down steps, in order.
    pub const DEINIT: &'static [Step<H, GpioConfig>] = &[
        Step::new("disable EXTI IRQ", StepKind::Interrupt, steps::disable_interrupt::<H, ()>),
        Step::new("mask EXTI lines", StepKind::Peripheral, mask_exti_lines::<H>),
        Step::new("release pins", StepKind::Pins, steps::release_pins::<H, ()>),
        Step::new("gate port clocks", StepKind::Clock, steps::disable_clocks::<H, ()>),
    ];
}

/// The GPIO routine.
pub fn routine<H: Hal + 'static>() -> Routine<'static, H, GpioConfig> {
    Routine::new(PeripheralId::Gpio, GpioRoutine::<H>::INIT, GpioRoutine::<H>::DEINIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = default_config().unwrap();
        assert_eq!(config.pins().len(), 10);
        assert_eq!(config.interrupt().map(|i| i.irq), Some(EXTI13_IRQ));
    }

    #[test]
    fn one_clock_per_used_port_in_port_order() {
        let config = default_config().unwrap();
        let ports: Vec<PeripheralId> = config.clocks().iter().map(|c| c.peripheral).collect();
        assert_eq!(
            ports,
            vec![
                PeripheralId::GpioPort(Port::C),
                PeripheralId::GpioPort(Port::D),
                PeripheralId::GpioPort(Port::E),
                PeripheralId::GpioPort(Port::F),
                PeripheralId::GpioPort(Port::H),
            ]
        );
    }

    #[test]
    fn pc13_selects_exticr4_byte_1() {
        assert_eq!(exticr_offset(13), 0x06C);
        assert_eq!(exticr_field(pins::USER_BUTTON.id()), (0xFF00, 0x0200));
    }

    #[test]
    fn exticr_offsets_step_every_four_lines() {
        assert_eq!(exticr_offset(0), 0x060);
        assert_eq!(exticr_offset(3), 0x060);
        assert_eq!(exticr_offset(4), 0x064);
        assert_eq!(exticr_offset(15), 0x06C);
    }

    #[test]
    fn trigger_bits_by_mode() {
        assert_eq!(trigger_bits(InterruptMode::RisingEdge, 2), (0b100, 0));
        assert_eq!(trigger_bits(InterruptMode::FallingEdge, 13), (0, 1 << 13));
        assert_eq!(trigger_bits(InterruptMode::BothEdges, 0), (1, 1));
    }

    #[test]
    fn output_levels_split_by_port() {
        let config = default_config().unwrap();
        // PD4 high (CS deselected); PD5, PD6 low.
        assert_eq!(output_levels(&config, Port::D), (1 << 4, (1 << 5) | (1 << 6)));
        // LEDs are active low.
        assert_eq!(output_levels(&config, Port::H), ((1 << 6) | (1 << 7), 0));
        // PC13 is an input: nothing to latch on port C.
        assert_eq!(output_levels(&config, Port::C), (0, 0));
    }
}
