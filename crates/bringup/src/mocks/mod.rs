//! Mock implementations for testing
//!
//! [`RecordingHal`] implements every HAL collaborator trait, records each
//! side-effecting call in order, and can be scripted to fail or stall.
//! [`RecordingFatal`] is a fatal handler that remembers reports instead of
//! resetting the MCU.
//!
//! Built for this crate's tests and, through the `std` feature, for the
//! board crate's host tests. Scripting more faults or stalls than the mock
//! holds panics, so a test never runs without the fault it asked for.

#![cfg(any(test, feature = "std"))]

use heapless::{LinearMap, Vec};

use crate::clock::ClockSource;
use crate::config::{InterruptConfig, IrqNumber, PeripheralId, PinConfig, PinFunction};
use crate::dma::{DmaChannel, DmaNodeConfig, NodeId, NodeQueue, QueueId};
use crate::fatal::FatalHandler;
use crate::fault::{FaultReport, HalError};
use crate::gpio::{PinId, Port};
use crate::hal::{DescriptorList, GpioBank, ReadyCondition, RegisterAccess};

/// Recorded call capacity.
pub const MAX_CALLS: usize = 256;

/// Scripted faults and stalled peripherals the mock can hold.
pub const MAX_SCRIPTED: usize = 32;

/// Nodes per mock descriptor queue.
pub const QUEUE_DEPTH: usize = 8;

/// A side-effecting HAL call, as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalCall {
    /// `enable_clock`
    EnableClock(PeripheralId, ClockSource),
    /// `disable_clock`
    DisableClock(PeripheralId),
    /// `configure_pin`
    ConfigurePin(PinId, PinFunction),
    /// `release_pin`
    ReleasePin(PinId),
    /// `write_register(peripheral, offset, value)`
    WriteRegister(PeripheralId, u32, u32),
    /// `enable_interrupt(irq, priority)`
    EnableInterrupt(IrqNumber, u8),
    /// `disable_interrupt`
    DisableInterrupt(IrqNumber),
    /// `set_reset(port, set_mask, reset_mask)`
    SetReset(Port, u16, u16),
    /// `build_node` and the id it returned
    BuildNode(NodeId),
    /// `insert_tail`
    InsertTail(QueueId, NodeId),
    /// `set_circular`
    SetCircular(QueueId, NodeId),
    /// `link_queue`
    LinkQueue(DmaChannel, QueueId),
    /// `unlink_queue`
    UnlinkQueue(DmaChannel),
    /// `reset_queue`
    ResetQueue(QueueId),
}

/// Call category, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `enable_clock`
    EnableClock,
    /// `disable_clock`
    DisableClock,
    /// `configure_pin`
    ConfigurePin,
    /// `release_pin`
    ReleasePin,
    /// `write_register`
    WriteRegister,
    /// `enable_interrupt`
    EnableInterrupt,
    /// `disable_interrupt`
    DisableInterrupt,
    /// `set_reset`
    SetReset,
    /// `build_node`
    BuildNode,
    /// `insert_tail`
    InsertTail,
    /// `set_circular`
    SetCircular,
    /// `link_queue`
    LinkQueue,
    /// `unlink_queue`
    UnlinkQueue,
    /// `reset_queue`
    ResetQueue,
}

impl HalCall {
    /// Category of this call.
    pub const fn kind(&self) -> CallKind {
        match self {
            HalCall::EnableClock(..) => CallKind::EnableClock,
            HalCall::DisableClock(..) => CallKind::DisableClock,
            HalCall::ConfigurePin(..) => CallKind::ConfigurePin,
            HalCall::ReleasePin(..) => CallKind::ReleasePin,
            HalCall::WriteRegister(..) => CallKind::WriteRegister,
            HalCall::EnableInterrupt(..) => CallKind::EnableInterrupt,
            HalCall::DisableInterrupt(..) => CallKind::DisableInterrupt,
            HalCall::SetReset(..) => CallKind::SetReset,
            HalCall::BuildNode(..) => CallKind::BuildNode,
            HalCall::InsertTail(..) => CallKind::InsertTail,
            HalCall::SetCircular(..) => CallKind::SetCircular,
            HalCall::LinkQueue(..) => CallKind::LinkQueue,
            HalCall::UnlinkQueue(..) => CallKind::UnlinkQueue,
            HalCall::ResetQueue(..) => CallKind::ResetQueue,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScriptedFault {
    kind: CallKind,
    // `None` fails every call of the kind.
    nth: Option<usize>,
    error: HalError,
}

/// Recording register access layer.
///
/// Ready conditions and DMA channels report ready immediately unless the
/// peripheral was [`stall`](Self::stall)ed, in which case every wait on it
/// runs into its timeout.
#[derive(Debug, Default)]
pub struct RecordingHal {
    calls: Vec<HalCall, MAX_CALLS>,
    dropped_calls: usize,
    counts: LinearMap<u8, usize, 16>,
    faults: Vec<ScriptedFault, MAX_SCRIPTED>,
    stalled: Vec<PeripheralId, MAX_SCRIPTED>,
    registers: LinearMap<(PeripheralId, u32), u32, 64>,
    odr: [u16; Port::ALL.len()],
    idr: [u16; Port::ALL.len()],
    next_node: u16,
    queues: LinearMap<u8, NodeQueue<QUEUE_DEPTH>, 4>,
    linked: LinearMap<u8, QueueId, 8>,
}

impl RecordingHal {
    /// Fresh mock: no calls, all ports low, nothing stalled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `kind` with `error`.
    ///
    /// # Panics
    /// When [`MAX_SCRIPTED`] faults are already scripted.
    pub fn fail_on(&mut self, kind: CallKind, error: HalError) {
        self.script(ScriptedFault {
            kind,
            nth: None,
            error,
        });
    }

    /// Fail only the `nth` (zero-based) call of `kind` with `error`.
    ///
    /// # Panics
    /// When [`MAX_SCRIPTED`] faults are already scripted.
    pub fn fail_nth(&mut self, kind: CallKind, nth: usize, error: HalError) {
        self.script(ScriptedFault {
            kind,
            nth: Some(nth),
            error,
        });
    }

    fn script(&mut self, fault: ScriptedFault) {
        let scripted = self.faults.push(fault).is_ok();
        assert!(scripted, "more than {MAX_SCRIPTED} scripted faults");
    }

    /// Never report `peripheral` ready.
    ///
    /// # Panics
    /// When [`MAX_SCRIPTED`] peripherals are already stalled.
    pub fn stall(&mut self, peripheral: PeripheralId) {
        if !self.stalled.contains(&peripheral) {
            let stalled = self.stalled.push(peripheral).is_ok();
            assert!(stalled, "more than {MAX_SCRIPTED} stalled peripherals");
        }
    }

    /// Drive an input pin as the outside world would.
    pub fn set_input(&mut self, pin: PinId, high: bool) {
        if let Some(idr) = self.idr.get_mut(pin.port().index()) {
            if high {
                *idr |= pin.mask();
            } else {
                *idr &= !pin.mask();
            }
        }
    }

    /// Preload a register value.
    pub fn set_register(&mut self, peripheral: PeripheralId, offset: u32, value: u32) {
        let _ = self.registers.insert((peripheral, offset), value);
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> &[HalCall] {
        &self.calls
    }

    /// Calls that did not fit in the log.
    pub fn dropped_calls(&self) -> usize {
        self.dropped_calls
    }

    /// Forget recorded calls (scripted faults and state stay).
    pub fn clear_calls(&mut self) {
        self.calls.clear();
        self.dropped_calls = 0;
    }

    /// Number of calls of `kind` so far.
    pub fn count(&self, kind: CallKind) -> usize {
        self.counts.get(&(kind as u8)).copied().unwrap_or(0)
    }

    /// Last value written to a register.
    pub fn register(&self, peripheral: PeripheralId, offset: u32) -> Option<u32> {
        self.registers.get(&(peripheral, offset)).copied()
    }

    /// Driven level of an output pin.
    pub fn output_level(&self, pin: PinId) -> bool {
        self.odr
            .get(pin.port().index())
            .is_some_and(|odr| odr & pin.mask() != 0)
    }

    /// Descriptor queue state.
    pub fn queue(&self, queue: QueueId) -> Option<&NodeQueue<QUEUE_DEPTH>> {
        self.queues.get(&queue.0)
    }

    /// Queue currently loaded into `channel`.
    pub fn linked_queue(&self, channel: DmaChannel) -> Option<QueueId> {
        self.linked.get(&channel.0).copied()
    }

    fn is_stalled(&self, peripheral: PeripheralId) -> bool {
        self.stalled.contains(&peripheral)
    }

    // Record `call` and return the scripted outcome for it.
    fn record(&mut self, call: HalCall) -> Result<(), HalError> {
        let kind = call.kind();
        let nth = self.count(kind);
        let _ = self.counts.insert(kind as u8, nth.saturating_add(1));
        if self.calls.push(call).is_err() {
            self.dropped_calls = self.dropped_calls.saturating_add(1);
        }
        match self
            .faults
            .iter()
            .find(|f| f.kind == kind && f.nth.map_or(true, |n| n == nth))
        {
            Some(fault) => Err(fault.error),
            None => Ok(()),
        }
    }
}

impl RegisterAccess for RecordingHal {
    fn enable_clock(&mut self, peripheral: PeripheralId, source: ClockSource) -> Result<(), HalError> {
        self.record(HalCall::EnableClock(peripheral, source))
    }

    fn disable_clock(&mut self, peripheral: PeripheralId) {
        let _ = self.record(HalCall::DisableClock(peripheral));
    }

    fn configure_pin(&mut self, pin: &PinConfig) -> Result<(), HalError> {
        self.record(HalCall::ConfigurePin(pin.pin, pin.function))
    }

    fn release_pin(&mut self, pin: PinId) {
        let _ = self.record(HalCall::ReleasePin(pin));
    }

    fn write_register(&mut self, peripheral: PeripheralId, offset: u32, value: u32) -> Result<(), HalError> {
        self.record(HalCall::WriteRegister(peripheral, offset, value))?;
        self.set_register(peripheral, offset, value);
        Ok(())
    }

    fn read_register(&mut self, peripheral: PeripheralId, offset: u32) -> u32 {
        self.register(peripheral, offset).unwrap_or(0)
    }

    fn enable_interrupt(&mut self, interrupt: &InterruptConfig) -> Result<(), HalError> {
        self.record(HalCall::EnableInterrupt(interrupt.irq, interrupt.priority))
    }

    fn disable_interrupt(&mut self, irq: IrqNumber) {
        let _ = self.record(HalCall::DisableInterrupt(irq));
    }

    fn poll(&mut self, peripheral: PeripheralId, _condition: &ReadyCondition) -> bool {
        !self.is_stalled(peripheral)
    }
}

impl GpioBank for RecordingHal {
    fn set_reset(&mut self, port: Port, set_mask: u16, reset_mask: u16) {
        let _ = self.record(HalCall::SetReset(port, set_mask, reset_mask));
        if let Some(odr) = self.odr.get_mut(port.index()) {
            *odr = (*odr & !reset_mask) | set_mask;
        }
    }

    fn read_input(&mut self, port: Port) -> u16 {
        self.idr.get(port.index()).copied().unwrap_or(0)
    }

    fn read_output(&mut self, port: Port) -> u16 {
        self.odr.get(port.index()).copied().unwrap_or(0)
    }
}

impl DescriptorList for RecordingHal {
    fn build_node(&mut self, node: &DmaNodeConfig) -> Result<NodeId, HalError> {
        if !node.is_valid() {
            return Err(HalError::Error);
        }
        let id = NodeId(self.next_node);
        self.record(HalCall::BuildNode(id))?;
        self.next_node = self.next_node.saturating_add(1);
        Ok(id)
    }

    fn insert_tail(&mut self, queue: QueueId, node: NodeId) -> Result<(), HalError> {
        self.record(HalCall::InsertTail(queue, node))?;
        if !self.queues.contains_key(&queue.0) {
            self.queues
                .insert(queue.0, NodeQueue::new())
                .map_err(|_| HalError::Error)?;
        }
        self.queues
            .get_mut(&queue.0)
            .ok_or(HalError::Error)?
            .insert_tail(node)
            .map_err(|_| HalError::Error)
    }

    fn set_circular(&mut self, queue: QueueId, first: NodeId) -> Result<(), HalError> {
        self.record(HalCall::SetCircular(queue, first))?;
        self.queues
            .get_mut(&queue.0)
            .ok_or(HalError::Error)?
            .set_circular(first)
            .map_err(|_| HalError::Error)
    }

    fn link_queue(&mut self, channel: DmaChannel, queue: QueueId) -> Result<(), HalError> {
        self.record(HalCall::LinkQueue(channel, queue))?;
        self.queues
            .get(&queue.0)
            .ok_or(HalError::Error)?
            .head()
            .map_err(|_| HalError::Error)?;
        self.linked
            .insert(channel.0, queue)
            .map_err(|_| HalError::Busy)?;
        Ok(())
    }

    fn channel_ready(&mut self, channel: DmaChannel) -> bool {
        !self.is_stalled(PeripheralId::Gpdma1) && self.linked.contains_key(&channel.0)
    }

    fn unlink_queue(&mut self, channel: DmaChannel) {
        let _ = self.record(HalCall::UnlinkQueue(channel));
        let _ = self.linked.remove(&channel.0);
    }

    fn reset_queue(&mut self, queue: QueueId) {
        let _ = self.record(HalCall::ResetQueue(queue));
        if let Some(q) = self.queues.get_mut(&queue.0) {
            q.reset();
        }
    }
}

/// Fatal handler that records reports and returns.
#[derive(Debug, Default)]
pub struct RecordingFatal {
    reports: Vec<FaultReport, 8>,
}

impl RecordingFatal {
    /// No reports yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report received, oldest first.
    pub fn reports(&self) -> &[FaultReport] {
        &self.reports
    }

    /// Most recent report.
    pub fn last(&self) -> Option<&FaultReport> {
        self.reports.last()
    }
}

impl FatalHandler for RecordingFatal {
    fn on_fatal(&mut self, report: &FaultReport) {
        let _ = self.reports.push(*report);
    }
}
