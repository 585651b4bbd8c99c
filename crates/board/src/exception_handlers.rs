//! Cortex-M33 fault handler.
//!
//! A HardFault during bring-up means a step touched a peripheral whose clock
//! is still gated (bus fault), or the stack ran into `.bss` (flip-link puts
//! the stack below the static data, so an overflow faults instead of
//! corrupting the sample buffer).
//!
//! The handler reports the stacked frame and the fault status register over
//! defmt/RTT and halts through `defmt::panic!`, which `panic-probe` turns into
//! a debugger breakpoint.

/// HardFault exception handler.
///
/// # Behavior
///
/// Logs the stacked PC, LR and xPSR and `SCB.CFSR` (RM0456 §B3.2.15 of the
/// Armv8-M ARM: MMFSR, BFSR, UFSR packed), then halts. Returning from a
/// HardFault is undefined behavior; `-> !` enforces it.
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    // SAFETY: read-only access to a memory-mapped status register; the core
    // is in handler mode and nothing else runs.
    let cfsr = unsafe { (*cortex_m::peripheral::SCB::PTR).cfsr.read() };
    defmt::panic!(
        "HardFault: pc=0x{:08X} lr=0x{:08X} xpsr=0x{:08X} cfsr=0x{:08X}. \
         Bus fault on a gated peripheral clock or stack overflow (flip-link).",
        ef.pc(),
        ef.lr(),
        ef.xpsr(),
        cfsr
    );
}
