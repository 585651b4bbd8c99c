//! Board bring-up entry point.
//!
//! Hardware-only binary for the STM32U585: clocks through embassy, then the
//! GPIO, OCTOSPI1 and ADC4 routines in [`board::BRING_UP_ORDER`] on the MMIO
//! backend. A fault in any routine resets the MCU through
//! [`ResetOnFault`]; a board that comes up blinks the green LED.

#![no_std]
#![no_main]

use bringup::Sequencer;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::StatefulOutputPin;
use panic_probe as _;

use board::dma::SampleBuffer;
use board::hardware::{MmioHal, ResetOnFault};
use board::{boot, pins, BoardConfig};

/// Heartbeat period once the board is up.
const HEARTBEAT: Duration = Duration::from_millis(500);

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    defmt::info!("{=str} v{=str}", board::config::BOARD_NAME, board::config::BOARD_VERSION);

    // PLL1 to 160 MHz and the TIM2 time driver. Peripheral clocks stay gated
    // until the routines enable them.
    let _p = embassy_stm32::init(boot::build_embassy_config());

    let Some(core) = cortex_m::Peripherals::take() else {
        defmt::panic!("core peripherals already taken");
    };
    let Some(mut hal) = MmioHal::new(core.NVIC) else {
        defmt::panic!("DMA item pool already taken");
    };
    let Some(samples) = cortex_m::singleton!(: SampleBuffer = SampleBuffer::zeroed()) else {
        defmt::panic!("sample buffer already taken");
    };
    let Some(sample_bytes) = samples.byte_len() else {
        defmt::panic!("sample buffer exceeds the DMA block counter");
    };

    let config = match BoardConfig::new(samples.address(), sample_bytes) {
        Ok(config) => config,
        Err(e) => defmt::panic!("invalid board configuration: {}", e),
    };

    let mut sequencer = Sequencer::new(ResetOnFault);
    // On a fault ResetOnFault has already reset the MCU; `Err` is not observed.
    let handles = match boot::bring_up(&mut hal, &mut sequencer, config) {
        Ok(handles) => handles,
        Err(reason) => defmt::panic!("bring-up failed: {}", reason),
    };
    defmt::debug_assert!(handles.is_ready());
    defmt::info!(
        "board ready: flash at 0x{:08X}, {=usize} samples at 0x{:08X}",
        board::octospi::MEMORY_MAPPED_BASE,
        board::dma::SAMPLE_COUNT,
        samples.address()
    );

    let mut heartbeat = pins::LED_GREEN.bind(&mut hal);
    loop {
        heartbeat.toggle().unwrap_or(());
        Timer::after(HEARTBEAT).await;
    }
}
