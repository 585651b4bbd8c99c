//! Clock source requirements.
//!
//! Encodes which peripherals need which kernel clock, so that a clock step
//! refuses to enable a peripheral from the wrong source instead of leaving it
//! silently unclocked.
//!
//! # Background
//!
//! On STM32U5 most peripherals have a bus clock (HCLK/PCLK) for register
//! access and, for converters and memory interfaces, a separately muxed
//! kernel clock. A peripheral whose kernel clock is not running accepts
//! register writes but never sets its ready flags; the symptom is a timeout
//! several steps later, far from the cause.
//!
//! # Sources
//!
//! - STM32U5 Reference Manual RM0456, §11.4 (RCC kernel clock selection)
//! - RM0456 §33.4.3 (ADC4 clock: `ADCDACSEL`)
//! - RM0456 §27.4.13 (OCTOSPI kernel clock: `OCTOSPISEL`)

use crate::config::PeripheralId;

/// Clock sources available on the STM32U5 clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Internal 16 MHz RC oscillator.
    Hsi16,
    /// Multi-speed internal oscillator, kernel branch.
    Msik,
    /// External high-speed crystal.
    Hse,
    /// PLL1 Q output.
    Pll1Q,
    /// PLL2 R output.
    Pll2R,
    /// System clock.
    Sysclk,
    /// AHB bus clock (register access only, no kernel mux).
    Hclk,
}

impl core::fmt::Display for ClockSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ClockSource::Hsi16 => "HSI16",
            ClockSource::Msik => "MSIK",
            ClockSource::Hse => "HSE",
            ClockSource::Pll1Q => "PLL1Q",
            ClockSource::Pll2R => "PLL2R",
            ClockSource::Sysclk => "SYSCLK",
            ClockSource::Hclk => "HCLK",
        })
    }
}

/// A peripheral and its mandatory clock-source dependency.
///
/// Static records: a board crate declares its table once and every clock
/// step checks against it before touching RCC.
#[derive(Debug, Clone, Copy)]
pub struct ClockRequirement {
    /// Peripheral the requirement applies to.
    pub peripheral: PeripheralId,
    /// The clock source that must feed this peripheral.
    pub required_source: ClockSource,
    /// Human-readable note explaining why, with datasheet references.
    pub note: &'static str,
}

/// Look up the required source for `peripheral` in `table`.
pub fn required_source(table: &[ClockRequirement], peripheral: PeripheralId) -> Option<ClockSource> {
    table
        .iter()
        .find(|r| r.peripheral == peripheral)
        .map(|r| r.required_source)
}

/// Check a requested clock against `table`.
///
/// Peripherals without an entry are unconstrained. Returns the required
/// source on mismatch.
pub fn check(
    table: &[ClockRequirement],
    peripheral: PeripheralId,
    source: ClockSource,
) -> Result<(), ClockSource> {
    match required_source(table, peripheral) {
        Some(required) if required != source => Err(required),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[ClockRequirement] = &[
        ClockRequirement {
            peripheral: PeripheralId::Adc4,
            required_source: ClockSource::Hsi16,
            note: "ADCDACSEL = HSI16",
        },
        ClockRequirement {
            peripheral: PeripheralId::Octospi1,
            required_source: ClockSource::Sysclk,
            note: "OCTOSPISEL = SYSCLK",
        },
    ];

    #[test]
    fn matching_source_passes() {
        assert_eq!(check(TABLE, PeripheralId::Adc4, ClockSource::Hsi16), Ok(()));
    }

    #[test]
    fn mismatched_source_reports_the_required_one() {
        assert_eq!(
            check(TABLE, PeripheralId::Octospi1, ClockSource::Pll2R),
            Err(ClockSource::Sysclk)
        );
    }

    #[test]
    fn unlisted_peripheral_is_unconstrained() {
        assert_eq!(check(TABLE, PeripheralId::Gpdma1, ClockSource::Hclk), Ok(()));
        assert_eq!(required_source(TABLE, PeripheralId::Gpdma1), None);
    }
}
