//! Register access layer
//!
//! The vendor HAL is an external collaborator. These traits are the seam the
//! sequencer and the board routines talk through: on target they are
//! implemented by volatile MMIO writes, in tests by
//! `mocks::RecordingHal`.
//!
//! Every fallible operation reports a [`HalError`], mirroring the vendor
//! HAL's `HAL_ERROR` / `HAL_BUSY` / `HAL_TIMEOUT` status codes.

use crate::clock::ClockSource;
use crate::config::{InterruptConfig, IrqNumber, PeripheralId, PinConfig};
use crate::dma::{DmaChannel, DmaNodeConfig, NodeId, QueueId};
use crate::fault::HalError;
use crate::gpio::{PinId, Port};

/// A hardware-ready condition: `(register & mask) == expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadyCondition {
    /// Register offset within the peripheral block.
    pub offset: u32,
    /// Bits to test.
    pub mask: u32,
    /// Value the masked bits must equal.
    pub expected: u32,
}

impl ReadyCondition {
    /// Ready when every bit of `mask` is set.
    pub const fn set(offset: u32, mask: u32) -> Self {
        Self {
            offset,
            mask,
            expected: mask,
        }
    }

    /// Ready when every bit of `mask` is clear.
    pub const fn clear(offset: u32, mask: u32) -> Self {
        Self {
            offset,
            mask,
            expected: 0,
        }
    }

    /// Evaluate against a register value.
    pub const fn is_met(&self, value: u32) -> bool {
        value & self.mask == self.expected
    }
}

/// Clock gating, pin muxing, register and NVIC access.
pub trait RegisterAccess {
    /// Enable the bus/kernel clock of `peripheral` from `source`.
    fn enable_clock(&mut self, peripheral: PeripheralId, source: ClockSource) -> Result<(), HalError>;

    /// Gate the clock of `peripheral`.
    fn disable_clock(&mut self, peripheral: PeripheralId);

    /// Program mode, pull, speed, driver type and alternate function of a pin.
    fn configure_pin(&mut self, pin: &PinConfig) -> Result<(), HalError>;

    /// Return a pin to its reset state (analog, no pull).
    fn release_pin(&mut self, pin: PinId);

    /// Write a 32-bit register at `offset` within the peripheral's block.
    fn write_register(&mut self, peripheral: PeripheralId, offset: u32, value: u32) -> Result<(), HalError>;

    /// Read a 32-bit register at `offset` within the peripheral's block.
    fn read_register(&mut self, peripheral: PeripheralId, offset: u32) -> u32;

    /// Set priority and unmask an interrupt line.
    fn enable_interrupt(&mut self, interrupt: &InterruptConfig) -> Result<(), HalError>;

    /// Mask an interrupt line and clear its pending bit.
    fn disable_interrupt(&mut self, irq: IrqNumber);

    /// Sample a ready condition once.
    fn poll(&mut self, peripheral: PeripheralId, condition: &ReadyCondition) -> bool {
        condition.is_met(self.read_register(peripheral, condition.offset))
    }
}

/// Atomic GPIO port access.
pub trait GpioBank {
    /// Atomically drive `set_mask` bits high and `reset_mask` bits low
    /// (BSRR semantics: set wins when both contain a bit).
    fn set_reset(&mut self, port: Port, set_mask: u16, reset_mask: u16);

    /// Input data register.
    fn read_input(&mut self, port: Port) -> u16;

    /// Output data register.
    fn read_output(&mut self, port: Port) -> u16;
}

/// DMA descriptor-list builder.
pub trait DescriptorList {
    /// Write a node descriptor and return its id.
    fn build_node(&mut self, node: &DmaNodeConfig) -> Result<NodeId, HalError>;

    /// Append a node to a queue.
    fn insert_tail(&mut self, queue: QueueId, node: NodeId) -> Result<(), HalError>;

    /// Link the queue's tail back to `first`.
    fn set_circular(&mut self, queue: QueueId, first: NodeId) -> Result<(), HalError>;

    /// Load the queue head into a channel's link register.
    fn link_queue(&mut self, channel: DmaChannel, queue: QueueId) -> Result<(), HalError>;

    /// Channel has accepted the queue and is idle or running.
    fn channel_ready(&mut self, channel: DmaChannel) -> bool;

    /// Suspend the channel and clear its link register.
    fn unlink_queue(&mut self, channel: DmaChannel);

    /// Forget every node of a queue.
    fn reset_queue(&mut self, queue: QueueId);
}

/// Everything a board routine needs.
pub trait Hal: RegisterAccess + GpioBank + DescriptorList {}

impl<T> Hal for T where T: RegisterAccess + GpioBank + DescriptorList + ?Sized {}
