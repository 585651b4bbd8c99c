//! Live peripheral handles
//!
//! A [`HandleState`] is the owned replacement for the vendor HAL's global
//! `hadc4` / `hospi1` structs: one value per peripheral instance, passed
//! explicitly to whoever needs it. Its status is written only by the
//! [`Sequencer`](crate::Sequencer); steps see it through a [`StepContext`]
//! that exposes the configuration and lets them record DMA wiring.

use crate::config::PeripheralId;
use crate::dma::DmaLinkage;

/// Lifecycle of a handle.
///
/// ```text
/// Uninitialized → Initializing → Ready → Deinitializing → Uninitialized
///                      └──────→ FatalFault (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandleStatus {
    /// Reset state, nothing configured.
    Uninitialized,
    /// Init steps are running.
    Initializing,
    /// Every init step succeeded.
    Ready,
    /// Deinit steps are running.
    Deinitializing,
    /// An init step failed; the fatal handler has been invoked.
    FatalFault,
}

impl core::fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            HandleStatus::Uninitialized => "uninitialized",
            HandleStatus::Initializing => "initializing",
            HandleStatus::Ready => "ready",
            HandleStatus::Deinitializing => "deinitializing",
            HandleStatus::FatalFault => "fatal fault",
        })
    }
}

/// Owned hardware handle of one peripheral.
///
/// Not `Clone`: only the single owner of a handle can tear its peripheral
/// down.
#[derive(Debug, PartialEq, Eq)]
pub struct HandleState<C> {
    peripheral: PeripheralId,
    status: HandleStatus,
    config: C,
    dma: Option<DmaLinkage>,
}

impl<C> HandleState<C> {
    /// A handle in `Uninitialized` state owning `config`.
    pub fn new(peripheral: PeripheralId, config: C) -> Self {
        Self {
            peripheral,
            status: HandleStatus::Uninitialized,
            config,
            dma: None,
        }
    }

    /// Peripheral this handle controls.
    pub fn peripheral(&self) -> PeripheralId {
        self.peripheral
    }

    /// Current lifecycle state.
    pub fn status(&self) -> HandleStatus {
        self.status
    }

    /// `status() == Ready`.
    pub fn is_ready(&self) -> bool {
        self.status == HandleStatus::Ready
    }

    /// Configuration the handle was brought up with.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// DMA wiring recorded during bring-up.
    pub fn dma(&self) -> Option<&DmaLinkage> {
        self.dma.as_ref()
    }

    /// Give the configuration back, e.g. to run the routine again after teardown.
    pub fn into_config(self) -> C {
        self.config
    }

    pub(crate) fn set_status(&mut self, status: HandleStatus) {
        trace!("{}: {} -> {}", self.peripheral, self.status, status);
        self.status = status;
    }

    pub(crate) fn clear_dma(&mut self) {
        self.dma = None;
    }
}

/// What a step may see and touch of the handle being brought up.
pub struct StepContext<'h, C> {
    handle: &'h mut HandleState<C>,
}

impl<'h, C> StepContext<'h, C> {
    pub(crate) fn new(handle: &'h mut HandleState<C>) -> Self {
        Self { handle }
    }

    /// Peripheral being brought up.
    pub fn peripheral(&self) -> PeripheralId {
        self.handle.peripheral
    }

    /// Configuration owned by the handle.
    pub fn config(&self) -> &C {
        &self.handle.config
    }

    /// DMA wiring recorded by an earlier step.
    pub fn dma(&self) -> Option<&DmaLinkage> {
        self.handle.dma.as_ref()
    }

    /// Record the DMA wiring established by this step.
    pub fn attach_dma(&mut self, linkage: DmaLinkage) {
        self.handle.dma = Some(linkage);
    }
}
