//! Step bodies shared by every routine.
//!
//! Clock gating, pin muxing and NVIC wiring look the same for every
//! peripheral: they read the lists in [`PeripheralConfig`] and apply them in
//! order. Routines put these generic functions in their step tables next to
//! their own register programming.

use bringup::clock;
use bringup::{HalError, PeripheralConfig, PeripheralId, PinFunction, RegisterAccess, StepContext};

use crate::config::CLOCK_REQUIREMENTS;

/// Context of a step whose handle owns a `PeripheralConfig<S>`.
pub type Ctx<'h, S> = StepContext<'h, PeripheralConfig<S>>;

/// Enable every configured clock, in order, refusing sources the board's
/// clock requirement table does not allow.
pub fn enable_clocks<H, S>(hal: &mut H, ctx: &mut Ctx<'_, S>) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    for entry in ctx.config().clocks() {
        clock::check(CLOCK_REQUIREMENTS, entry.peripheral, entry.source).map_err(|_required| {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "{}: kernel clock {} rejected, board requires {}",
                entry.peripheral,
                entry.source,
                _required
            );
            #[cfg(feature = "tracing")]
            tracing::error!(
                "{}: kernel clock {} rejected, board requires {}",
                entry.peripheral,
                entry.source,
                _required
            );
            HalError::Error
        })?;
        hal.enable_clock(entry.peripheral, entry.source)?;
    }
    Ok(())
}

/// Gate every configured clock, last enabled first.
pub fn disable_clocks<H, S>(hal: &mut H, ctx: &mut Ctx<'_, S>) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    for entry in ctx.config().clocks().iter().rev() {
        hal.disable_clock(entry.peripheral);
    }
    Ok(())
}

/// Read-modify-write a register: clear the `clear` bits, then set `set`.
pub fn modify_register<H>(
    hal: &mut H,
    peripheral: PeripheralId,
    offset: u32,
    clear: u32,
    set: u32,
) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    let value = hal.read_register(peripheral, offset);
    hal.write_register(peripheral, offset, (value & !clear) | set)
}

/// Configure every pin whose function satisfies `select`.
pub fn configure_pins_where<H, S>(
    hal: &mut H,
    ctx: &Ctx<'_, S>,
    select: fn(PinFunction) -> bool,
) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    ctx.config()
        .pins()
        .iter()
        .filter(|pin| select(pin.function))
        .try_for_each(|pin| hal.configure_pin(pin))
}

/// Configure every pin of the peripheral, in configuration order.
pub fn configure_pins<H, S>(hal: &mut H, ctx: &mut Ctx<'_, S>) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    configure_pins_where(hal, ctx, |_| true)
}

/// Return every pin of the peripheral to its reset state, last first.
pub fn release_pins<H, S>(hal: &mut H, ctx: &mut Ctx<'_, S>) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    for pin in ctx.config().pins().iter().rev() {
        hal.release_pin(pin.pin);
    }
    Ok(())
}

/// Set priority and unmask the configured interrupt line.
///
/// A peripheral without an interrupt line is a configuration error here: the
/// routine would not have put this step in its table otherwise.
pub fn enable_interrupt<H, S>(hal: &mut H, ctx: &mut Ctx<'_, S>) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    let interrupt = ctx.config().interrupt().ok_or(HalError::Error)?;
    hal.enable_interrupt(interrupt)
}

/// Mask the configured interrupt line, if there is one.
pub fn disable_interrupt<H, S>(hal: &mut H, ctx: &mut Ctx<'_, S>) -> Result<(), HalError>
where
    H: RegisterAccess + ?Sized,
{
    if let Some(interrupt) = ctx.config().interrupt() {
        hal.disable_interrupt(interrupt.irq);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bringup::mocks::{CallKind, HalCall, RecordingFatal, RecordingHal};
    use bringup::sequencer::StepFn;
    use bringup::{ClockSource, FaultReason, Routine, Sequencer, Step, StepKind};

    // Run a lone step through the sequencer, the only way steps get a context.
    fn run_step(
        kind: StepKind,
        action: StepFn<RecordingHal, PeripheralConfig<()>>,
        hal: &mut RecordingHal,
        config: PeripheralConfig<()>,
    ) -> Result<(), FaultReason> {
        let init = [Step::new("under-test", kind, action)];
        let routine = Routine::new(config.peripheral(), &init, &[]);
        let mut sequencer = Sequencer::new(RecordingFatal::new());
        sequencer.run(hal, &routine, config).map(|_| ())
    }

    fn adc_config(source: ClockSource) -> PeripheralConfig<()> {
        PeripheralConfig::builder(PeripheralId::Adc4, ())
            .clock(source)
            .clock_for(PeripheralId::Gpdma1, ClockSource::Hclk)
            .build()
            .unwrap()
    }

    #[test]
    fn wrong_kernel_clock_is_rejected_before_touching_rcc() {
        let mut hal = RecordingHal::new();

        let result = run_step(StepKind::Clock, enable_clocks, &mut hal, adc_config(ClockSource::Pll2R));

        assert_eq!(result, Err(FaultReason::ClockConfigFailure));
        assert_eq!(hal.count(CallKind::EnableClock), 0);
    }

    #[test]
    fn clocks_are_enabled_in_order() {
        let mut hal = RecordingHal::new();

        run_step(StepKind::Clock, enable_clocks, &mut hal, adc_config(ClockSource::Hsi16)).unwrap();

        assert_eq!(
            hal.calls(),
            &[
                HalCall::EnableClock(PeripheralId::Adc4, ClockSource::Hsi16),
                HalCall::EnableClock(PeripheralId::Gpdma1, ClockSource::Hclk),
            ]
        );
    }

    #[test]
    fn clocks_are_disabled_in_reverse() {
        let mut hal = RecordingHal::new();

        run_step(StepKind::Clock, disable_clocks, &mut hal, adc_config(ClockSource::Hsi16)).unwrap();

        assert_eq!(
            hal.calls(),
            &[
                HalCall::DisableClock(PeripheralId::Gpdma1),
                HalCall::DisableClock(PeripheralId::Adc4),
            ]
        );
    }

    #[test]
    fn modify_keeps_unrelated_bits() {
        let mut hal = RecordingHal::new();
        hal.set_register(PeripheralId::Exti, 0x80, 0b1010);

        modify_register(&mut hal, PeripheralId::Exti, 0x80, 0b0010, 0b0100).unwrap();

        assert_eq!(hal.register(PeripheralId::Exti, 0x80), Some(0b1100));
    }

    #[test]
    fn missing_interrupt_fails_enable_but_not_disable() {
        let mut hal = RecordingHal::new();

        assert_eq!(
            run_step(StepKind::Interrupt, enable_interrupt, &mut hal, adc_config(ClockSource::Hsi16)),
            Err(FaultReason::PeripheralConfigFailure)
        );
        assert_eq!(
            run_step(StepKind::Interrupt, disable_interrupt, &mut hal, adc_config(ClockSource::Hsi16)),
            Ok(())
        );
        assert!(hal.calls().is_empty());
    }
}
