//! Board configuration and constants
//!
//! Central values used across the board routines. Register addresses live
//! with the routine that programs them; this module holds what several
//! routines share: clock frequencies, timeouts, interrupt lines and the clock
//! requirement table every clock step checks against.

use bringup::{ClockRequirement, ClockSource, IrqNumber, PeripheralId};

/// The board name
pub const BOARD_NAME: &str = "U585 Bring-up Board";

/// Board firmware version (synchronized with Cargo.toml)
pub const BOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// HSI16 oscillator frequency.
pub const HSI16_HZ: u32 = 16_000_000;

/// System clock: HSI16 → PLL1 (M=1, N=10, R=1) → 160 MHz.
pub const SYSCLK_HZ: u32 = 160_000_000;

/// AHB clock (AHB prescaler = 1).
pub const HCLK_HZ: u32 = SYSCLK_HZ;

// ── Timeouts ─────────────────────────────────────────────────────────────────

/// GPIO has no ready flags; the timeout only bounds EXTI register access.
pub const GPIO_READY_TIMEOUT_MS: u32 = 1;

/// OCTOSPI busy-flag timeout (vendor HAL default is 5 s; the device
/// configuration completes in microseconds).
pub const OCTOSPI_READY_TIMEOUT_MS: u32 = 100;

/// ADC4 regulator, calibration and ready-flag timeout.
///
/// RM0456 §33.4.6: LDO start-up `t_ADCVREG_SETUP` ≤ 20 µs; calibration ≤ 1 ms
/// at 16 MHz.
pub const ADC_READY_TIMEOUT_MS: u32 = 10;

// ── Interrupt lines (RM0456 Table 152) ───────────────────────────────────────

/// EXTI line 13 (user button).
pub const EXTI13_IRQ: IrqNumber = IrqNumber(24);

/// GPDMA1 channel 0 (ADC4 sample stream).
pub const GPDMA1_CH0_IRQ: IrqNumber = IrqNumber(29);

/// Priority of the user-button line.
pub const BUTTON_IRQ_PRIORITY: u8 = 6;

/// Priority of the sample-stream DMA (above the button; lower is more urgent).
pub const ADC_DMA_IRQ_PRIORITY: u8 = 3;

// ── Clock requirements ───────────────────────────────────────────────────────

/// Kernel clock sources this board relies on.
///
/// | Peripheral | Required source | Reason |
/// |---|---|---|
/// | ADC4 | HSI16 | ADCDACSEL: HSI16 keeps the ADC clock independent of PLL changes and within 55 MHz |
/// | OCTOSPI1 | SYSCLK | OCTOSPISEL: 160 MHz, prescaler 1 → 80 MHz bus clock |
/// | OCTOSPIM | HCLK | I/O manager has no kernel clock |
/// | GPDMA1 | HCLK | AHB1 master, no kernel clock |
pub const CLOCK_REQUIREMENTS: &[ClockRequirement] = &[
    ClockRequirement {
        peripheral: PeripheralId::Adc4,
        required_source: ClockSource::Hsi16,
        note: "ADCDACSEL = HSI16 (RM0456 §11.8.44); max ADC4 clock 55 MHz",
    },
    ClockRequirement {
        peripheral: PeripheralId::Octospi1,
        required_source: ClockSource::Sysclk,
        note: "OCTOSPISEL = SYSCLK (RM0456 §11.8.43); divided by DCR2.PRESCALER",
    },
    ClockRequirement {
        peripheral: PeripheralId::Octospim,
        required_source: ClockSource::Hclk,
        note: "OCTOSPIM is clocked by AHB2 only",
    },
    ClockRequirement {
        peripheral: PeripheralId::Gpdma1,
        required_source: ClockSource::Hclk,
        note: "GPDMA1 is clocked by AHB1 only",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_name_is_not_empty() {
        assert!(!BOARD_NAME.is_empty());
        assert!(!BOARD_VERSION.is_empty());
    }

    #[test]
    fn every_peripheral_has_at_most_one_requirement() {
        for (i, a) in CLOCK_REQUIREMENTS.iter().enumerate() {
            for b in CLOCK_REQUIREMENTS.iter().skip(i + 1) {
                assert_ne!(a.peripheral, b.peripheral, "duplicate requirement for {}", a.peripheral);
            }
        }
    }

    #[test]
    fn adc_requirement_is_hsi16() {
        assert_eq!(
            bringup::clock::required_source(CLOCK_REQUIREMENTS, PeripheralId::Adc4),
            Some(ClockSource::Hsi16)
        );
    }
}
