//! DMA buffer placement.
//!
//! GPDMA1 writes the ADC4 sample stream straight into SRAM, one half-word per
//! conversion, wrapping at the end of the buffer. The buffer must therefore
//! live for the whole program (a `static`), keep a fixed address once its
//! address is handed to the descriptor, and be aligned so that bursts never
//! straddle a 32-byte line (DCACHE1 line size, GPDMA burst boundary).
//!
//! The second half of this module encodes GPDMA1 linked-list items (LLI):
//! the register words a channel reloads from SRAM at the end of each block.
//!
//! # References
//! - RM0456 §17.4.8: GPDMA linked-list item alignment
//! - RM0456 §17.8: GPDMA channel registers (CxTR1, CxTR2, CxBR1, CxLLR)
//! - RM0456 §8.2: DCACHE1 organisation (32-byte lines)

use bringup::dma::{DmaNodeConfig, TransferDirection};

/// A `#[repr(align(32))]` wrapper for DMA-accessible buffers.
///
/// # Example
///
/// ```ignore
/// use board::dma::{Align32, SampleBuffer};
///
/// static mut ADC_SAMPLES: SampleBuffer = Align32([0; board::dma::SAMPLE_COUNT]);
/// ```
#[derive(Clone, Copy)]
#[repr(align(32))]
pub struct Align32<T>(
    /// The wrapped buffer.
    pub T,
);

/// Samples per circular ADC4 buffer: 32 rounds of the two scanned channels.
pub const SAMPLE_COUNT: usize = 64;

/// Circular ADC4 sample buffer.
pub type SampleBuffer = Align32<[u16; SAMPLE_COUNT]>;

impl<const N: usize> Align32<[u16; N]> {
    /// Zeroed buffer.
    pub const fn zeroed() -> Self {
        Self([0; N])
    }

    /// Bus address of the first sample.
    ///
    /// Only meaningful on the target, where addresses are 32 bits wide.
    #[allow(clippy::cast_possible_truncation)]
    pub fn address(&self) -> u32 {
        self.0.as_ptr() as usize as u32
    }

    /// Size in bytes, as programmed into the block counter.
    ///
    /// `None` if the buffer does not fit the 16-bit counter.
    pub const fn byte_len(&self) -> Option<u16> {
        let bytes = N.saturating_mul(2);
        if bytes > u16::MAX as usize {
            None
        } else {
            Some(bytes as u16)
        }
    }
}

// ── Linked-list items ─────────────────────────────────────────────────────────

/// CxTR1.SINC: source address incremented after each beat.
const TR1_SINC: u32 = 1 << 3;
/// CxTR1.DINC: destination address incremented after each beat.
const TR1_DINC: u32 = 1 << 19;
/// CxTR2.SWREQ: software request (memory-to-memory).
const TR2_SWREQ: u32 = 1 << 9;
/// CxTR2.DREQ: the request comes from the destination peripheral.
const TR2_DREQ: u32 = 1 << 10;
/// CxTR2.REQSEL field.
const TR2_REQSEL_MASK: u32 = 0x7F;

/// CxLLR update bits: reload TR1, TR2, BR1, SAR, DAR and LLR from the next item.
pub const LLR_UPDATE_ALL: u32 = (1 << 31) | (1 << 30) | (1 << 29) | (1 << 28) | (1 << 27) | (1 << 16);
/// CxLLR.LA: low 16 bits of the next item's address, word aligned.
const LLR_LA_MASK: u32 = 0xFFFC;

/// One GPDMA1 linked-list item, in the channel's reload order.
///
/// Items are loaded relative to the channel's `CxLBAR`, so every item of a
/// queue must sit in the same 64 KiB window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, align(32))]
pub struct LinkedListItem {
    /// Transfer register 1 (widths, increments).
    pub tr1: u32,
    /// Transfer register 2 (request routing).
    pub tr2: u32,
    /// Block register 1 (bytes per block).
    pub br1: u32,
    /// Source address.
    pub sar: u32,
    /// Destination address.
    pub dar: u32,
    /// Link to the next item; zero ends the list.
    pub llr: u32,
}

impl LinkedListItem {
    /// All-zero item.
    pub const EMPTY: Self = Self {
        tr1: 0,
        tr2: 0,
        br1: 0,
        sar: 0,
        dar: 0,
        llr: 0,
    };

    /// Item for one node, not yet linked.
    pub fn from_node(node: &DmaNodeConfig) -> Self {
        Self {
            tr1: tr1(node),
            tr2: tr2(node),
            br1: u32::from(node.block_bytes),
            sar: node.src_addr,
            dar: node.dst_addr,
            llr: 0,
        }
    }
}

/// CxTR1 image: data widths and address increments.
pub fn tr1(node: &DmaNodeConfig) -> u32 {
    let mut value = node.src_width.log2() | node.dst_width.log2().wrapping_shl(16);
    if node.src_increment {
        value |= TR1_SINC;
    }
    if node.dst_increment {
        value |= TR1_DINC;
    }
    value
}

/// CxTR2 image: hardware request selection and its side.
pub fn tr2(node: &DmaNodeConfig) -> u32 {
    let request = u32::from(node.request) & TR2_REQSEL_MASK;
    match node.direction {
        TransferDirection::PeripheralToMemory => request,
        TransferDirection::MemoryToPeripheral => request | TR2_DREQ,
        TransferDirection::MemoryToMemory => TR2_SWREQ,
    }
}

/// CxLLR image pointing at the item stored at `next_addr`.
pub const fn link_to(next_addr: u32) -> u32 {
    LLR_UPDATE_ALL | (next_addr & LLR_LA_MASK)
}

/// Both addresses fall in the same 64 KiB `CxLBAR` window.
pub const fn same_window(a: u32, b: u32) -> bool {
    a & 0xFFFF_0000 == b & 0xFFFF_0000
}
