//! Sequencer behaviour against the recording HAL.
//!
//! Fail-fast bring-up: steps run in the given order, the first failure stops
//! the routine and reaches the fatal handler exactly once. Tear-down runs every
//! step regardless of failures and is a no-op on a handle that is not Ready.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bringup::mocks::{CallKind, HalCall, RecordingFatal, RecordingHal};
use bringup::wait::wait_until;
use bringup::{
    ClockSource, DataWidth, DescriptorList, DmaChannel, DmaConfig, DmaLinkage, DmaNodeConfig, FaultReason,
    GpioPin, HalError, HandleState, HandleStatus, InterruptConfig, IrqNumber, Output, PeripheralConfig,
    PeripheralId, PinConfig, PinFunction, Port, QueueId, RegisterAccess, Routine, Sequencer, Step,
    StepContext, StepKind, TransferDirection,
};

type Config = PeripheralConfig<()>;
type Ctx<'h> = StepContext<'h, Config>;

const CS: GpioPin<Output> = GpioPin::output(Port::A, 4);
const IRQ: IrqNumber = IrqNumber(113);

fn config() -> Config {
    PeripheralConfig::builder(PeripheralId::Adc4, ())
        .clock(ClockSource::Hsi16)
        .pin(PinConfig::output(CS))
        .interrupt(InterruptConfig { irq: IRQ, priority: 5 })
        .ready_timeout_ms(5)
        .build()
        .unwrap()
}

fn dma_config() -> Config {
    let node = DmaNodeConfig {
        request: 0,
        direction: TransferDirection::PeripheralToMemory,
        src_addr: 0x4602_1040,
        dst_addr: 0x2000_0000,
        src_width: DataWidth::HalfWord,
        dst_width: DataWidth::HalfWord,
        src_increment: false,
        dst_increment: true,
        block_bytes: 64,
    };
    PeripheralConfig::builder(PeripheralId::Adc4, ())
        .clock(ClockSource::Hsi16)
        .dma(DmaConfig {
            channel: DmaChannel(0),
            queue: QueueId(0),
            node,
            circular: true,
        })
        .ready_timeout_ms(5)
        .build()
        .unwrap()
}

fn enable_clock(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    for clock in ctx.config().clocks() {
        hal.enable_clock(clock.peripheral, clock.source)?;
    }
    Ok(())
}

fn configure_pins(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    for pin in ctx.config().pins() {
        hal.configure_pin(pin)?;
    }
    Ok(())
}

fn configure_peripheral(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    hal.write_register(ctx.peripheral(), 0x0C, 0x0000_3000)
}

fn link_dma(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    let dma = *ctx.config().dma().ok_or(HalError::Error)?;
    let node = hal.build_node(&dma.node)?;
    hal.insert_tail(dma.queue, node)?;
    hal.set_circular(dma.queue, node)?;
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

fn enable_interrupt(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    let irq = ctx.config().interrupt().ok_or(HalError::Error)?;
    hal.enable_interrupt(irq)
}

fn disable_interrupt(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    if let Some(irq) = ctx.config().interrupt() {
        hal.disable_interrupt(irq.irq);
    }
    Ok(())
}

fn stop_peripheral(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    hal.write_register(ctx.peripheral(), 0x08, 0)
}

fn release_pins(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    for pin in ctx.config().pins() {
        hal.release_pin(pin.pin);
    }
    Ok(())
}

fn disable_clock(hal: &mut RecordingHal, ctx: &mut Ctx<'_>) -> Result<(), HalError> {
    for clock in ctx.config().clocks() {
        hal.disable_clock(clock.peripheral);
    }
    Ok(())
}

const INIT: &[Step<RecordingHal, Config>] = &[
    Step::new("enable clock", StepKind::Clock, enable_clock),
    Step::new("configure pins", StepKind::Pins, configure_pins),
    Step::new("configure peripheral", StepKind::Peripheral, configure_peripheral),
];

const INIT_WITH_IRQ: &[Step<RecordingHal, Config>] = &[
    Step::new("enable clock", StepKind::Clock, enable_clock),
    Step::new("configure pins", StepKind::Pins, configure_pins),
    Step::new("configure peripheral", StepKind::Peripheral, configure_peripheral),
    Step::new("enable interrupt", StepKind::Interrupt, enable_interrupt),
];

const INIT_WITH_DMA: &[Step<RecordingHal, Config>] = &[
    Step::new("enable clock", StepKind::Clock, enable_clock),
    Step::new("link dma", StepKind::DmaLink, link_dma),
    Step::new("configure peripheral", StepKind::Peripheral, configure_peripheral),
];

const DEINIT: &[Step<RecordingHal, Config>] = &[
    Step::new("disable interrupt", StepKind::Interrupt, disable_interrupt),
    Step::new("stop peripheral", StepKind::Peripheral, stop_peripheral),
    Step::new("release pins", StepKind::Pins, release_pins),
    Step::new("disable clock", StepKind::Clock, disable_clock),
];

fn routine(init: &'static [Step<RecordingHal, Config>]) -> Routine<'static, RecordingHal, Config> {
    Routine::new(PeripheralId::Adc4, init, DEINIT)
}

#[test]
fn all_steps_succeed_in_order() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());

    let handle = sequencer.run(&mut hal, &routine(INIT), config()).unwrap();

    assert_eq!(handle.status(), HandleStatus::Ready);
    assert_eq!(
        hal.calls(),
        &[
            HalCall::EnableClock(PeripheralId::Adc4, ClockSource::Hsi16),
            HalCall::ConfigurePin(CS.id(), PinFunction::Output),
            HalCall::WriteRegister(PeripheralId::Adc4, 0x0C, 0x0000_3000),
        ]
    );
    assert!(sequencer.handler().reports().is_empty());
}

#[test]
fn pin_failure_stops_before_peripheral_configuration() {
    let mut hal = RecordingHal::new();
    hal.fail_on(CallKind::ConfigurePin, HalError::Error);
    let mut sequencer = Sequencer::new(RecordingFatal::new());

    let result = sequencer.run(&mut hal, &routine(INIT), config());

    assert_eq!(result.unwrap_err(), FaultReason::PinConfigFailure);
    assert_eq!(hal.count(CallKind::WriteRegister), 0, "configure peripheral must not run");

    let fatal = sequencer.into_handler();
    assert_eq!(fatal.reports().len(), 1);
    let report = fatal.last().unwrap();
    assert_eq!(report.index, 1);
    assert_eq!(report.step, "configure pins");
    assert_eq!(report.kind, StepKind::Pins);
    assert_eq!(report.peripheral, PeripheralId::Adc4);
}

#[test]
fn dma_link_timeout_escalates_as_timeout() {
    let mut hal = RecordingHal::new();
    hal.stall(PeripheralId::Gpdma1);
    let mut sequencer = Sequencer::new(RecordingFatal::new());

    let result = sequencer.run(&mut hal, &routine(INIT_WITH_DMA), dma_config());

    assert_eq!(result.unwrap_err(), FaultReason::TimeoutFailure);
    assert_eq!(hal.count(CallKind::WriteRegister), 0);
    let report = *sequencer.handler().last().unwrap();
    assert_eq!(report.kind, StepKind::DmaLink);
    assert_eq!(report.reason, FaultReason::TimeoutFailure);
}

#[test]
fn dma_link_failure_classified_by_step_kind() {
    let mut hal = RecordingHal::new();
    hal.fail_on(CallKind::LinkQueue, HalError::Busy);
    let mut sequencer = Sequencer::new(RecordingFatal::new());

    let result = sequencer.run(&mut hal, &routine(INIT_WITH_DMA), dma_config());

    assert_eq!(result.unwrap_err(), FaultReason::DmaLinkFailure);
}

#[test]
fn successful_dma_link_is_recorded_on_handle() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());

    let handle = sequencer.run(&mut hal, &routine(INIT_WITH_DMA), dma_config()).unwrap();

    let linkage = handle.dma().unwrap();
    assert_eq!(linkage.channel, DmaChannel(0));
    assert!(linkage.circular);
    assert_eq!(hal.linked_queue(DmaChannel(0)), Some(QueueId(0)));
    assert!(hal.queue(QueueId(0)).unwrap().is_circular());
}

#[test]
fn clock_failure_reaches_closure_handler() {
    let mut hal = RecordingHal::new();
    hal.fail_on(CallKind::EnableClock, HalError::Error);
    let mut seen = None;

    let result = Sequencer::new(|report: &bringup::FaultReport| seen = Some(report.reason)).run(
        &mut hal,
        &routine(INIT),
        config(),
    );

    assert_eq!(result.unwrap_err(), FaultReason::ClockConfigFailure);
    assert_eq!(seen, Some(FaultReason::ClockConfigFailure));
    assert_eq!(hal.calls().len(), 1);
}

#[test]
fn teardown_runs_every_step_despite_failures() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());
    let routine = routine(INIT_WITH_IRQ);
    let mut handle = sequencer.run(&mut hal, &routine, config()).unwrap();
    hal.clear_calls();
    hal.fail_on(CallKind::WriteRegister, HalError::Error);

    sequencer.teardown(&mut hal, &routine, &mut handle);

    assert_eq!(handle.status(), HandleStatus::Uninitialized);
    assert_eq!(
        hal.calls(),
        &[
            HalCall::DisableInterrupt(IRQ),
            HalCall::WriteRegister(PeripheralId::Adc4, 0x08, 0),
            HalCall::ReleasePin(CS.id()),
            HalCall::DisableClock(PeripheralId::Adc4),
        ]
    );
    assert!(sequencer.handler().reports().is_empty(), "teardown never escalates");
}

#[test]
fn teardown_clears_dma_linkage() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());
    let routine = routine(INIT_WITH_DMA);
    let mut handle = sequencer.run(&mut hal, &routine, dma_config()).unwrap();
    assert!(handle.dma().is_some());

    sequencer.teardown(&mut hal, &routine, &mut handle);

    assert!(handle.dma().is_none());
}

#[test]
fn teardown_of_uninitialized_handle_is_a_noop() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());
    let mut handle = HandleState::new(PeripheralId::Adc4, config());

    sequencer.teardown(&mut hal, &routine(INIT), &mut handle);

    assert_eq!(handle.status(), HandleStatus::Uninitialized);
    assert!(hal.calls().is_empty());
}

#[test]
fn teardown_twice_is_idempotent() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());
    let routine = routine(INIT);
    let mut handle = sequencer.run(&mut hal, &routine, config()).unwrap();

    sequencer.teardown(&mut hal, &routine, &mut handle);
    let after_first = hal.calls().len();
    sequencer.teardown(&mut hal, &routine, &mut handle);

    assert_eq!(hal.calls().len(), after_first);
    assert_eq!(handle.status(), HandleStatus::Uninitialized);
}

#[test]
fn handle_can_be_brought_up_again_after_teardown() {
    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());
    let routine = routine(INIT);
    let mut handle = sequencer.run(&mut hal, &routine, config()).unwrap();
    sequencer.teardown(&mut hal, &routine, &mut handle);

    let handle = sequencer.run(&mut hal, &routine, handle.into_config()).unwrap();

    assert!(handle.is_ready());
    assert_eq!(hal.count(CallKind::EnableClock), 2);
}

// Resolves only while `HandleState` is not `Clone`; a `Clone` impl makes the
// call below ambiguous and the test crate stops compiling.
trait AmbiguousIfClone<A> {
    fn assert_not_clone() {}
}
impl<T: ?Sized> AmbiguousIfClone<()> for T {}
struct IsClone;
impl<T: ?Sized + Clone> AmbiguousIfClone<IsClone> for T {}

#[test]
fn one_brought_up_peripheral_is_torn_down_once() {
    <HandleState<Config> as AmbiguousIfClone<_>>::assert_not_clone();

    let mut hal = RecordingHal::new();
    let mut sequencer = Sequencer::new(RecordingFatal::new());
    let routine = routine(INIT_WITH_DMA);
    let handle = sequencer.run(&mut hal, &routine, dma_config()).unwrap();

    let mut owner = handle;
    sequencer.teardown(&mut hal, &routine, &mut owner);
    sequencer.teardown(&mut hal, &routine, &mut owner);

    assert_eq!(hal.count(CallKind::DisableClock), 1);
    assert!(owner.dma().is_none());
    assert_eq!(owner.status(), HandleStatus::Uninitialized);
}
