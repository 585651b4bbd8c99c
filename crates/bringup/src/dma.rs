//! DMA linked-list descriptors
//!
//! GPDMA on STM32U5 executes a chain of linked-list items (nodes). A node
//! describes one block transfer; the link register of each node points at the
//! next one, and pointing the last node back at the first makes the transfer
//! circular.
//!
//! This module holds the pure data side: node parameters, queue/channel ids,
//! and [`NodeQueue`], a fixed-capacity queue that computes link targets. The
//! hardware side (writing descriptors into SRAM, programming `CxLLR`) sits
//! behind [`DescriptorList`](crate::hal::DescriptorList).

use heapless::Vec;

/// Transfer direction of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    /// Peripheral data register → memory buffer
    PeripheralToMemory,
    /// Memory buffer → peripheral data register
    MemoryToPeripheral,
    /// Memory → memory
    MemoryToMemory,
}

/// Data width of one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataWidth {
    /// 8 bits
    Byte,
    /// 16 bits
    HalfWord,
    /// 32 bits
    Word,
}

impl DataWidth {
    /// Width in bytes.
    pub const fn bytes(self) -> u16 {
        match self {
            DataWidth::Byte => 1,
            DataWidth::HalfWord => 2,
            DataWidth::Word => 4,
        }
    }

    /// `CxTR1.SDW_LOG2` / `DDW_LOG2` encoding.
    pub const fn log2(self) -> u32 {
        match self {
            DataWidth::Byte => 0,
            DataWidth::HalfWord => 1,
            DataWidth::Word => 2,
        }
    }
}

/// Parameters of one linked-list node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaNodeConfig {
    /// GPDMA request line (`CxTR2.REQSEL`).
    pub request: u8,
    /// Transfer direction.
    pub direction: TransferDirection,
    /// Source address.
    pub src_addr: u32,
    /// Destination address.
    pub dst_addr: u32,
    /// Source beat width.
    pub src_width: DataWidth,
    /// Destination beat width.
    pub dst_width: DataWidth,
    /// Increment the source address after each beat.
    pub src_increment: bool,
    /// Increment the destination address after each beat.
    pub dst_increment: bool,
    /// Block size in bytes (`CxBR1.BNDT`).
    pub block_bytes: u16,
}

impl DmaNodeConfig {
    /// Block size is non-zero and a whole number of source and destination beats.
    pub const fn is_valid(&self) -> bool {
        self.block_bytes != 0
            && self.block_bytes % self.src_width.bytes() == 0
            && self.block_bytes % self.dst_width.bytes() == 0
    }
}

/// GPDMA channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannel(pub u8);

/// Linked-list queue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueId(pub u8);

/// Node identifier returned by the descriptor-list builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(pub u16);

/// DMA wiring requested by a peripheral configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaConfig {
    /// Channel that executes the queue.
    pub channel: DmaChannel,
    /// Queue the node is inserted into.
    pub queue: QueueId,
    /// Node parameters.
    pub node: DmaNodeConfig,
    /// Link the last node back to the first.
    pub circular: bool,
}

/// DMA wiring recorded on a handle once the queue is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaLinkage {
    /// Channel executing the queue.
    pub channel: DmaChannel,
    /// Linked queue.
    pub queue: QueueId,
    /// Number of nodes in the queue.
    pub nodes: u16,
    /// Whether the queue wraps.
    pub circular: bool,
}

/// Queue manipulation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// The queue already holds its maximum number of nodes.
    #[error("node queue full")]
    Full,
    /// The node is not part of the queue.
    #[error("node not in queue")]
    UnknownNode,
    /// The queue has no nodes to link.
    #[error("node queue empty")]
    Empty,
}

/// Fixed-capacity linked-list queue.
///
/// Tracks node order and the circular wrap point; `next` answers what each
/// node's link register must point at.
#[derive(Debug, Clone, Default)]
pub struct NodeQueue<const N: usize> {
    nodes: Vec<NodeId, N>,
    wrap_to: Option<usize>,
}

impl<const N: usize> NodeQueue<N> {
    /// Empty, non-circular queue.
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            wrap_to: None,
        }
    }

    /// Append `node` after the current tail.
    pub fn insert_tail(&mut self, node: NodeId) -> Result<(), QueueError> {
        self.nodes.push(node).map_err(|_| QueueError::Full)
    }

    /// Make the tail link back to `first`, closing the loop.
    pub fn set_circular(&mut self, first: NodeId) -> Result<(), QueueError> {
        let position = self
            .nodes
            .iter()
            .position(|&n| n == first)
            .ok_or(QueueError::UnknownNode)?;
        self.wrap_to = Some(position);
        Ok(())
    }

    /// Node linked after `node`, `None` at the end of a linear queue.
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        let position = self.nodes.iter().position(|&n| n == node)?;
        match self.nodes.get(position.saturating_add(1)) {
            Some(&next) => Some(next),
            None => self.wrap_to.and_then(|w| self.nodes.get(w).copied()),
        }
    }

    /// First node, the one a channel's link register is loaded with.
    pub fn head(&self) -> Result<NodeId, QueueError> {
        self.nodes.first().copied().ok_or(QueueError::Empty)
    }

    /// Nodes in link order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No nodes queued.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the tail wraps.
    pub fn is_circular(&self) -> bool {
        self.wrap_to.is_some()
    }

    /// Drop every node and the wrap point.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.wrap_to = None;
    }
}
