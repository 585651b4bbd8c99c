//! Volatile MMIO backend for the STM32U585.
//!
//! [`MmioHal`] implements the [`bringup`] register access traits on the real
//! memory map: RCC clock gates and kernel muxes, GPIO port registers, NVIC,
//! and GPDMA1 linked-list channels. [`ResetOnFault`] is the fatal handler
//! used on target.
//!
//! Every register address this module touches is formed from a base in the
//! memory map below plus an offset checked against the block size, so the
//! volatile accesses stay inside peripheral blocks.
//!
//! # Memory map (RM0456 §2.3, non-secure aliases)
//!
//! | Block | Base |
//! |---|---|
//! | GPDMA1 | 0x4002_0000 |
//! | GPIOA..GPIOI | 0x4202_0000 + 0x400 × port |
//! | OCTOSPIM | 0x420C_4000 |
//! | OCTOSPI1 | 0x420D_1400 |
//! | RCC | 0x4602_0C00 |
//! | ADC4 | 0x4602_1000 |
//! | EXTI | 0x4602_2000 |

use core::ptr;

use bringup::dma::NodeQueue;
use bringup::{
    ClockSource, DescriptorList, DmaChannel, DmaNodeConfig, FatalHandler, FaultReport, GpioBank, HalError,
    InterruptConfig, IrqNumber, NodeId, OutputType, PeripheralId, PinConfig, PinFunction, PinId, Port,
    Pull, QueueId, RegisterAccess, Speed,
};
use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::{NVIC, SCB};

use crate::dma::{link_to, same_window, LinkedListItem};

const GPDMA1_BASE: usize = 0x4002_0000;
const GPIO_BASE: usize = 0x4202_0000;
const GPIO_STRIDE: usize = 0x400;
const OCTOSPIM_BASE: usize = 0x420C_4000;
const OCTOSPI1_BASE: usize = 0x420D_1400;
const RCC_BASE: usize = 0x4602_0C00;
const ADC4_BASE: usize = 0x4602_1000;
const EXTI_BASE: usize = 0x4602_2000;

/// Size of one peripheral register block.
const BLOCK_SIZE: u32 = 0x400;
/// GPDMA1 spans 16 channels of 0x80 bytes after its common registers.
const GPDMA1_BLOCK_SIZE: u32 = 0x1000;

// RCC (RM0456 §11.8)
const RCC_AHB1ENR: usize = 0x088;
const RCC_AHB2ENR1: usize = 0x08C;
const RCC_AHB2ENR2: usize = 0x090;
const RCC_AHB3ENR: usize = 0x094;
const RCC_CCIPR2: usize = 0x0E4;
const RCC_CCIPR3: usize = 0x0E8;

const AHB1ENR_GPDMA1EN: u32 = 1 << 0;
const AHB2ENR1_OCTOSPIMEN: u32 = 1 << 21;
const AHB2ENR2_OCTOSPI1EN: u32 = 1 << 4;
const AHB3ENR_ADC4EN: u32 = 1 << 5;

const CCIPR2_OCTOSPISEL_SHIFT: u32 = 20;
const CCIPR2_OCTOSPISEL_MASK: u32 = 0b11;
const CCIPR3_ADCDACSEL_SHIFT: u32 = 12;
const CCIPR3_ADCDACSEL_MASK: u32 = 0b111;

// GPIO (RM0456 §13.4)
const GPIO_MODER: usize = 0x00;
const GPIO_OTYPER: usize = 0x04;
const GPIO_OSPEEDR: usize = 0x08;
const GPIO_PUPDR: usize = 0x0C;
const GPIO_IDR: usize = 0x10;
const GPIO_ODR: usize = 0x14;
const GPIO_BSRR: usize = 0x18;
const GPIO_AFRL: usize = 0x20;
const GPIO_AFRH: usize = 0x24;

// GPDMA1 channel registers, relative to the channel (RM0456 §17.8)
const GPDMA_CHANNELS: u8 = 16;
const CH_FIRST: usize = 0x50;
const CH_STRIDE: usize = 0x80;
const CH_LBAR: usize = 0x00;
const CH_FCR: usize = 0x0C;
const CH_SR: usize = 0x10;
const CH_CR: usize = 0x14;
const CH_BR1: usize = 0x48;
const CH_LLR: usize = 0x7C;

const CR_EN: u32 = 1 << 0;
const CR_RESET: u32 = 1 << 1;
const CR_SUSP: u32 = 1 << 2;
const CR_TCIE: u32 = 1 << 8;
const CR_HTIE: u32 = 1 << 9;
const CR_DTEIE: u32 = 1 << 10;
const CR_ULEIE: u32 = 1 << 11;
const CR_USEIE: u32 = 1 << 12;

const SR_IDLEF: u32 = 1 << 0;
const SR_DTEF: u32 = 1 << 10;
const SR_ULEF: u32 = 1 << 11;
const SR_USEF: u32 = 1 << 12;
const SR_SUSPF: u32 = 1 << 13;
const SR_ERRORS: u32 = SR_DTEF | SR_ULEF | SR_USEF;
/// Every clearable flag of CxFCR.
const FCR_ALL: u32 = 0x7F00;

/// Polls of CxSR while waiting for a channel to suspend during unlink.
const SUSPEND_POLLS: u32 = 10_000;

/// Linked-list items available to all queues.
pub const NODE_POOL: usize = 4;
/// Queues the backend tracks.
pub const QUEUES: usize = 2;
const NODES_PER_QUEUE: usize = NODE_POOL;

/// NVIC lines implemented by the STM32U585.
const IRQ_LINES: u16 = 141;
/// Priority levels implemented by the NVIC (top 4 bits of the byte).
const PRIORITY_LEVELS: u8 = 16;
const PRIORITY_SHIFT: u32 = 4;

/// NVIC line number as seen by `cortex-m`.
#[derive(Debug, Clone, Copy)]
struct Irq(u16);

// SAFETY: `Irq` is only built from numbers checked against `IRQ_LINES`, all
// of which are valid STM32U585 interrupt lines.
unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0
    }
}

fn irq(number: IrqNumber) -> Result<Irq, HalError> {
    if number.0 < IRQ_LINES {
        Ok(Irq(number.0))
    } else {
        Err(HalError::Error)
    }
}

fn read(addr: usize) -> u32 {
    // SAFETY: callers pass a word-aligned address inside one of the
    // peripheral blocks of the memory map above.
    unsafe { ptr::read_volatile(addr as *const u32) }
}

fn write(addr: usize, value: u32) {
    // SAFETY: as for `read`.
    unsafe { ptr::write_volatile(addr as *mut u32, value) }
}

fn modify(addr: usize, clear: u32, set: u32) {
    write(addr, (read(addr) & !clear) | set);
}

fn block(peripheral: PeripheralId) -> Option<(usize, u32)> {
    Some(match peripheral {
        PeripheralId::Gpio => return None,
        PeripheralId::GpioPort(port) => (gpio_base(port), BLOCK_SIZE),
        PeripheralId::Exti => (EXTI_BASE, BLOCK_SIZE),
        PeripheralId::Adc4 => (ADC4_BASE, BLOCK_SIZE),
        PeripheralId::Gpdma1 => (GPDMA1_BASE, GPDMA1_BLOCK_SIZE),
        PeripheralId::Octospi1 => (OCTOSPI1_BASE, BLOCK_SIZE),
        PeripheralId::Octospim => (OCTOSPIM_BASE, BLOCK_SIZE),
    })
}

fn register(peripheral: PeripheralId, offset: u32) -> Option<usize> {
    let (base, size) = block(peripheral)?;
    (offset < size && offset & 0b11 == 0).then(|| base.wrapping_add(offset as usize))
}

fn gpio_base(port: Port) -> usize {
    GPIO_BASE.wrapping_add(port.index().wrapping_mul(GPIO_STRIDE))
}

fn gpio_register(port: Port, offset: usize) -> usize {
    gpio_base(port).wrapping_add(offset)
}

fn rcc(offset: usize) -> usize {
    RCC_BASE.wrapping_add(offset)
}

fn channel_register(channel: DmaChannel, offset: usize) -> Result<usize, HalError> {
    if channel.0 >= GPDMA_CHANNELS {
        return Err(HalError::Error);
    }
    Ok(GPDMA1_BASE
        .wrapping_add(CH_FIRST)
        .wrapping_add(usize::from(channel.0).wrapping_mul(CH_STRIDE))
        .wrapping_add(offset))
}

/// `OCTOSPISEL` encoding.
fn octospi_kernel(source: ClockSource) -> Result<u32, HalError> {
    match source {
        ClockSource::Sysclk => Ok(0b00),
        ClockSource::Msik => Ok(0b01),
        ClockSource::Pll1Q => Ok(0b10),
        _ => Err(HalError::Error),
    }
}

/// `ADCDACSEL` encoding.
fn adc_kernel(source: ClockSource) -> Result<u32, HalError> {
    match source {
        ClockSource::Hclk => Ok(0b000),
        ClockSource::Sysclk => Ok(0b001),
        ClockSource::Pll2R => Ok(0b010),
        ClockSource::Hse => Ok(0b011),
        ClockSource::Hsi16 => Ok(0b100),
        ClockSource::Msik => Ok(0b101),
        ClockSource::Pll1Q => Err(HalError::Error),
    }
}

/// Two-bit per pin field: `(mask, value)` for pin `number`.
fn field2(number: u8, value: u32) -> (u32, u32) {
    let shift = u32::from(number).wrapping_mul(2);
    (0b11u32.wrapping_shl(shift), value.wrapping_shl(shift))
}

/// Set an enable bit and read it back (RM0456 §11.4.17: the read-back
/// provides the delay before the peripheral is accessible).
fn gate_on(offset: usize, bit: u32) -> Result<(), HalError> {
    modify(rcc(offset), 0, bit);
    if read(rcc(offset)) & bit == bit {
        Ok(())
    } else {
        Err(HalError::Error)
    }
}

fn select_kernel(offset: usize, shift: u32, mask: u32, value: u32) -> Result<(), HalError> {
    modify(rcc(offset), mask.wrapping_shl(shift), value.wrapping_shl(shift));
    if read(rcc(offset)).wrapping_shr(shift) & mask == value {
        Ok(())
    } else {
        Err(HalError::Error)
    }
}

/// Bus-only peripherals take HCLK and nothing else.
fn bus_clock(source: ClockSource) -> Result<(), HalError> {
    if source == ClockSource::Hclk {
        Ok(())
    } else {
        Err(HalError::Error)
    }
}

/// Register-level implementation of the bring-up traits.
pub struct MmioHal {
    nvic: NVIC,
    items: &'static mut [LinkedListItem; NODE_POOL],
    used: [bool; NODE_POOL],
    queues: [NodeQueue<NODES_PER_QUEUE>; QUEUES],
}

impl MmioHal {
    /// Take ownership of the NVIC and the linked-list item pool.
    ///
    /// Returns `None` on a second call: the item pool is a singleton.
    pub fn new(nvic: NVIC) -> Option<Self> {
        let items = cortex_m::singleton!(: [LinkedListItem; NODE_POOL] = [LinkedListItem::EMPTY; NODE_POOL])?;
        Some(Self {
            nvic,
            items,
            used: [false; NODE_POOL],
            queues: [NodeQueue::new(), NodeQueue::new()],
        })
    }

    fn queue(&mut self, queue: QueueId) -> Result<&mut NodeQueue<NODES_PER_QUEUE>, HalError> {
        self.queues.get_mut(usize::from(queue.0)).ok_or(HalError::Error)
    }

    fn item_address(&self, node: NodeId) -> Result<u32, HalError> {
        let item = self.items.get(usize::from(node.0)).ok_or(HalError::Error)?;
        Ok(item as *const LinkedListItem as usize as u32)
    }

    /// Rewrite every item's link word from the queue order.
    fn relink(&mut self, queue: QueueId) -> Result<(), HalError> {
        let index = usize::from(queue.0);
        let order = self.queues.get(index).ok_or(HalError::Error)?.clone();
        for &node in order.nodes() {
            let llr = match order.next(node) {
                Some(next) => link_to(self.item_address(next)?),
                None => 0,
            };
            let item = self.items.get_mut(usize::from(node.0)).ok_or(HalError::Error)?;
            item.llr = llr;
        }
        cortex_m::asm::dsb();
        Ok(())
    }
}

impl RegisterAccess for MmioHal {
    fn enable_clock(&mut self, peripheral: PeripheralId, source: ClockSource) -> Result<(), HalError> {
        match peripheral {
            // Port clocks are gated per port; EXTI sits on APB3 with no gate.
            PeripheralId::Gpio | PeripheralId::Exti => bus_clock(source),
            PeripheralId::GpioPort(port) => {
                bus_clock(source)?;
                gate_on(RCC_AHB2ENR1, 1u32.wrapping_shl(port.index() as u32))
            }
            PeripheralId::Gpdma1 => {
                bus_clock(source)?;
                gate_on(RCC_AHB1ENR, AHB1ENR_GPDMA1EN)
            }
            PeripheralId::Octospim => {
                bus_clock(source)?;
                gate_on(RCC_AHB2ENR1, AHB2ENR1_OCTOSPIMEN)
            }
            PeripheralId::Octospi1 => {
                let sel = octospi_kernel(source)?;
                select_kernel(RCC_CCIPR2, CCIPR2_OCTOSPISEL_SHIFT, CCIPR2_OCTOSPISEL_MASK, sel)?;
                gate_on(RCC_AHB2ENR2, AHB2ENR2_OCTOSPI1EN)
            }
            PeripheralId::Adc4 => {
                let sel = adc_kernel(source)?;
                select_kernel(RCC_CCIPR3, CCIPR3_ADCDACSEL_SHIFT, CCIPR3_ADCDACSEL_MASK, sel)?;
                gate_on(RCC_AHB3ENR, AHB3ENR_ADC4EN)
            }
        }
    }

    fn disable_clock(&mut self, peripheral: PeripheralId) {
        let (offset, bit) = match peripheral {
            PeripheralId::Gpio | PeripheralId::Exti => return,
            PeripheralId::GpioPort(port) => (RCC_AHB2ENR1, 1u32.wrapping_shl(port.index() as u32)),
            PeripheralId::Gpdma1 => (RCC_AHB1ENR, AHB1ENR_GPDMA1EN),
            PeripheralId::Octospim => (RCC_AHB2ENR1, AHB2ENR1_OCTOSPIMEN),
            PeripheralId::Octospi1 => (RCC_AHB2ENR2, AHB2ENR2_OCTOSPI1EN),
            PeripheralId::Adc4 => (RCC_AHB3ENR, AHB3ENR_ADC4EN),
        };
        modify(rcc(offset), bit, 0);
    }

    fn configure_pin(&mut self, pin: &PinConfig) -> Result<(), HalError> {
        let port = pin.pin.port();
        let number = pin.pin.number();

        let mode = match pin.function {
            PinFunction::Input => 0b00,
            PinFunction::Output => 0b01,
            PinFunction::Alternate(af) => {
                if af > 15 {
                    return Err(HalError::Error);
                }
                // AF first so the pin never drives the wrong function.
                let (afr, slot) = if number < 8 { (GPIO_AFRL, number) } else { (GPIO_AFRH, number.wrapping_sub(8)) };
                let shift = u32::from(slot).wrapping_mul(4);
                modify(gpio_register(port, afr), 0xFu32.wrapping_shl(shift), u32::from(af).wrapping_shl(shift));
                0b10
            }
            PinFunction::Analog => 0b11,
        };

        let open_drain = u32::from(pin.output_type == OutputType::OpenDrain);
        modify(gpio_register(port, GPIO_OTYPER), u32::from(pin.pin.mask()), open_drain.wrapping_shl(u32::from(number)));

        let speed = match pin.speed {
            Speed::Low => 0b00,
            Speed::Medium => 0b01,
            Speed::High => 0b10,
            Speed::VeryHigh => 0b11,
        };
        let (mask, value) = field2(number, speed);
        modify(gpio_register(port, GPIO_OSPEEDR), mask, value);

        let pull = match pin.pull {
            Pull::None => 0b00,
            Pull::Up => 0b01,
            Pull::Down => 0b10,
        };
        let (mask, value) = field2(number, pull);
        modify(gpio_register(port, GPIO_PUPDR), mask, value);

        let (mask, value) = field2(number, mode);
        modify(gpio_register(port, GPIO_MODER), mask, value);
        Ok(())
    }

    fn release_pin(&mut self, pin: PinId) {
        let (mask, analog) = field2(pin.number(), 0b11);
        modify(gpio_register(pin.port(), GPIO_MODER), mask, analog);
        modify(gpio_register(pin.port(), GPIO_PUPDR), mask, 0);
    }

    fn write_register(&mut self, peripheral: PeripheralId, offset: u32, value: u32) -> Result<(), HalError> {
        let addr = register(peripheral, offset).ok_or(HalError::Error)?;
        write(addr, value);
        Ok(())
    }

    fn read_register(&mut self, peripheral: PeripheralId, offset: u32) -> u32 {
        register(peripheral, offset).map_or(0, read)
    }

    fn enable_interrupt(&mut self, interrupt: &InterruptConfig) -> Result<(), HalError> {
        let line = irq(interrupt.irq)?;
        if interrupt.priority >= PRIORITY_LEVELS {
            return Err(HalError::Error);
        }
        let priority = interrupt.priority.wrapping_shl(PRIORITY_SHIFT);
        // SAFETY: bring-up runs before any priority-based critical section
        // exists, and the handler for `line` is linked by embassy-stm32.
        unsafe {
            self.nvic.set_priority(line, priority);
            NVIC::unmask(line);
        }
        Ok(())
    }

    fn disable_interrupt(&mut self, irq_number: IrqNumber) {
        if let Ok(line) = irq(irq_number) {
            NVIC::mask(line);
            NVIC::unpend(line);
        }
    }
}

impl GpioBank for MmioHal {
    fn set_reset(&mut self, port: Port, set_mask: u16, reset_mask: u16) {
        write(
            gpio_register(port, GPIO_BSRR),
            u32::from(reset_mask).wrapping_shl(16) | u32::from(set_mask),
        );
    }

    fn read_input(&mut self, port: Port) -> u16 {
        (read(gpio_register(port, GPIO_IDR)) & 0xFFFF) as u16
    }

    fn read_output(&mut self, port: Port) -> u16 {
        (read(gpio_register(port, GPIO_ODR)) & 0xFFFF) as u16
    }
}

impl DescriptorList for MmioHal {
    fn build_node(&mut self, node: &DmaNodeConfig) -> Result<NodeId, HalError> {
        if !node.is_valid() {
            return Err(HalError::Error);
        }
        let slot = self.used.iter().position(|used| !used).ok_or(HalError::Busy)?;
        let item = self.items.get_mut(slot).ok_or(HalError::Error)?;
        *item = LinkedListItem::from_node(node);
        if let Some(used) = self.used.get_mut(slot) {
            *used = true;
        }
        u16::try_from(slot).map(NodeId).map_err(|_| HalError::Error)
    }

    fn insert_tail(&mut self, queue: QueueId, node: NodeId) -> Result<(), HalError> {
        self.queue(queue)?.insert_tail(node).map_err(|_| HalError::Error)?;
        self.relink(queue)
    }

    fn set_circular(&mut self, queue: QueueId, first: NodeId) -> Result<(), HalError> {
        self.queue(queue)?.set_circular(first).map_err(|_| HalError::Error)?;
        self.relink(queue)
    }

    fn link_queue(&mut self, channel: DmaChannel, queue: QueueId) -> Result<(), HalError> {
        let order = self.queue(queue)?.clone();
        let head = self.item_address(order.head().map_err(|_| HalError::Error)?)?;
        for &node in order.nodes() {
            if !same_window(head, self.item_address(node)?) {
                return Err(HalError::Error);
            }
        }

        let cr = channel_register(channel, CH_CR)?;
        if read(cr) & CR_EN != 0 {
            return Err(HalError::Busy);
        }
        write(channel_register(channel, CH_FCR)?, FCR_ALL);
        write(channel_register(channel, CH_LBAR)?, head & 0xFFFF_0000);
        // BNDT = 0 with a non-zero LLR: the channel loads the head item on enable.
        write(channel_register(channel, CH_BR1)?, 0);
        write(channel_register(channel, CH_LLR)?, link_to(head));
        write(cr, CR_TCIE | CR_HTIE | CR_DTEIE | CR_ULEIE | CR_USEIE);
        modify(cr, 0, CR_EN);
        Ok(())
    }

    fn channel_ready(&mut self, channel: DmaChannel) -> bool {
        let (Ok(cr), Ok(sr)) = (channel_register(channel, CH_CR), channel_register(channel, CH_SR)) else {
            return false;
        };
        read(cr) & CR_EN != 0 && read(sr) & SR_ERRORS == 0
    }

    fn unlink_queue(&mut self, channel: DmaChannel) {
        let (Ok(cr), Ok(sr), Ok(llr), Ok(fcr)) = (
            channel_register(channel, CH_CR),
            channel_register(channel, CH_SR),
            channel_register(channel, CH_LLR),
            channel_register(channel, CH_FCR),
        ) else {
            return;
        };
        if read(cr) & CR_EN != 0 {
            modify(cr, 0, CR_SUSP);
            let mut polls = 0u32;
            while read(sr) & (SR_SUSPF | SR_IDLEF) == 0 && polls < SUSPEND_POLLS {
                polls = polls.wrapping_add(1);
            }
        }
        write(cr, CR_RESET);
        write(llr, 0);
        write(fcr, FCR_ALL);
    }

    fn reset_queue(&mut self, queue: QueueId) {
        let Some(order) = self.queues.get_mut(usize::from(queue.0)) else {
            return;
        };
        for &node in order.nodes() {
            let slot = usize::from(node.0);
            if let Some(used) = self.used.get_mut(slot) {
                *used = false;
            }
            if let Some(item) = self.items.get_mut(slot) {
                *item = LinkedListItem::EMPTY;
            }
        }
        order.reset();
    }
}

/// Fatal handler for the target: log the report over RTT, then reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResetOnFault;

impl FatalHandler for ResetOnFault {
    fn on_fatal(&mut self, report: &FaultReport) {
        defmt::error!("bring-up aborted: {}", report);
        SCB::sys_reset();
    }
}
