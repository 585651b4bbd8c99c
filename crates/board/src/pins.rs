//! Board pin map.
//!
//! Every pin the board drives, samples or hands to a peripheral, as typed
//! `const` descriptors. The direction is part of the type: an input cannot be
//! `set`, an analog pin cannot be read as digital.

use bringup::{Alternate, Analog, GpioPin, Input, Output, PinId, Port};

// ── Display control (ST7789 over SPI) ────────────────────────────────────────

/// LCD chip select, active low.
pub const LCD_CS: GpioPin<Output> = GpioPin::output(Port::D, 4);
/// LCD data/command select (low = command).
pub const LCD_DC: GpioPin<Output> = GpioPin::output(Port::D, 5);
/// LCD reset, active low.
pub const LCD_RST: GpioPin<Output> = GpioPin::output(Port::D, 6);
/// LCD backlight enable.
pub const LCD_BL: GpioPin<Output> = GpioPin::output(Port::E, 1);

// ── Cellular modem control ───────────────────────────────────────────────────

/// Modem supply enable.
pub const MODEM_PWR_EN: GpioPin<Output> = GpioPin::output(Port::F, 0);
/// Modem reset, active low.
pub const MODEM_RST: GpioPin<Output> = GpioPin::output(Port::F, 1);
/// Modem status output (high once the modem has booted).
pub const MODEM_STATUS: GpioPin<Input> = GpioPin::input(Port::F, 2);

// ── User interface ───────────────────────────────────────────────────────────

/// User button, pulled up externally, pressed = low. Raises EXTI13.
pub const USER_BUTTON: GpioPin<Input> = GpioPin::input(Port::C, 13);
/// Red LED, active low.
pub const LED_RED: GpioPin<Output> = GpioPin::output(Port::H, 6);
/// Green LED, active low.
pub const LED_GREEN: GpioPin<Output> = GpioPin::output(Port::H, 7);

// ── OCTOSPI1 flash bus ───────────────────────────────────────────────────────

/// Alternate function of the OCTOSPI1 bus pins.
pub const OCTOSPI_AF: u8 = 10;
/// Alternate function of PC0 as OCTOSPI1_IO7.
pub const OCTOSPI_IO7_AF: u8 = 3;

/// OCTOSPI1_CLK
pub const OSPI_CLK: GpioPin<Alternate> = GpioPin::alternate(Port::B, 10);
/// OCTOSPI1_NCS
pub const OSPI_NCS: GpioPin<Alternate> = GpioPin::alternate(Port::A, 2);
/// OCTOSPI1_DQS
pub const OSPI_DQS: GpioPin<Alternate> = GpioPin::alternate(Port::A, 1);
/// OCTOSPI1_IO0..IO6 (AF10), in IO order.
pub const OSPI_IO: [GpioPin<Alternate>; 7] = [
    GpioPin::alternate(Port::B, 1),
    GpioPin::alternate(Port::B, 0),
    GpioPin::alternate(Port::A, 7),
    GpioPin::alternate(Port::A, 6),
    GpioPin::alternate(Port::C, 1),
    GpioPin::alternate(Port::C, 2),
    GpioPin::alternate(Port::C, 3),
];
/// OCTOSPI1_IO7 (AF3).
pub const OSPI_IO7: GpioPin<Alternate> = GpioPin::alternate(Port::C, 0);

// ── ADC4 analog inputs ───────────────────────────────────────────────────────

/// Battery voltage divider (1:2).
pub const VBAT_SENSE: GpioPin<Analog> = GpioPin::analog(Port::C, 4);
/// ADC4 channel of [`VBAT_SENSE`].
pub const VBAT_SENSE_CHANNEL: u8 = 22;
/// Modem supply current sense amplifier output.
pub const MODEM_ISENSE: GpioPin<Analog> = GpioPin::analog(Port::C, 5);
/// ADC4 channel of [`MODEM_ISENSE`].
pub const MODEM_ISENSE_CHANNEL: u8 = 23;

/// Every pin in the map, for collision checks.
pub fn all() -> [PinId; 23] {
    [
        LCD_CS.id(),
        LCD_DC.id(),
        LCD_RST.id(),
        LCD_BL.id(),
        MODEM_PWR_EN.id(),
        MODEM_RST.id(),
        MODEM_STATUS.id(),
        USER_BUTTON.id(),
        LED_RED.id(),
        LED_GREEN.id(),
        OSPI_CLK.id(),
        OSPI_NCS.id(),
        OSPI_DQS.id(),
        OSPI_IO[0].id(),
        OSPI_IO[1].id(),
        OSPI_IO[2].id(),
        OSPI_IO[3].id(),
        OSPI_IO[4].id(),
        OSPI_IO[5].id(),
        OSPI_IO[6].id(),
        OSPI_IO7.id(),
        VBAT_SENSE.id(),
        MODEM_ISENSE.id(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pin_is_assigned_twice() {
        let mut pins = all().to_vec();
        let total = pins.len();
        pins.sort();
        pins.dedup();
        assert_eq!(pins.len(), total, "pin map has a collision");
    }

    #[test]
    fn user_button_is_pc13() {
        assert_eq!(USER_BUTTON.id().to_string(), "PC13");
    }
}
