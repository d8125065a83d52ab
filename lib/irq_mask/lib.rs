//!
//! @file lib.rs
//! @author Andrew Spaulding (Kasplat)
//! @brief Scoped masking of callback trigger sources.
//! @bug No known bugs.
//!
//! A trampoline which is registered with an interrupt-driven API may be
//! invoked at any instant. Rewriting its method binding while the source is
//! live is a race, so every such update must happen with the source masked.
//! This crate provides the masking protocol: a trait for anything that can
//! suppress its own triggering event, a guard that restores the previous
//! mask state when dropped, and a closure wrapper for the common case.
//!
//! Masking is not a lock. Two threads (or cores) mutating the same binding
//! still race; the only thing being excluded is the asynchronous invoker.
//!

#![no_std]

///
/// A source of asynchronous callback invocations which can be suppressed.
///
/// mask() must prevent any new invocation from beginning before it returns,
/// and must report whether the source was previously unmasked so that nested
/// guards restore the outer state rather than unconditionally re-enabling.
///
pub trait TriggerSource {
    /// Masks the source, returning whether it was previously unmasked.
    fn mask(&mut self) -> bool;

    /// Restores the source to the given pre-mask state.
    fn restore(&mut self, was_unmasked: bool);
}

/// Masks a trigger source until dropped.
pub struct MaskGuard<'a, S: TriggerSource> {
    src: &'a mut S,
    was_unmasked: bool
}

impl<'a, S: TriggerSource> MaskGuard<'a, S> {
    /// Masks the given source, returning a guard which will unmask it.
    pub fn new(
        src: &'a mut S
    ) -> Self {
        let was_unmasked = src.mask();
        Self { src, was_unmasked }
    }
}

impl<'a, S: TriggerSource> Drop for MaskGuard<'a, S> {
    fn drop(
        &mut self
    ) {
        self.src.restore(self.was_unmasked);
    }
}

/// Masks the given trigger source, then calls the given fn.
pub fn masked<S: TriggerSource, R>(
    src: &mut S,
    func: impl FnOnce() -> R
) -> R {
    let guard = MaskGuard::new(src);
    let res = func();
    drop(guard);
    res
}

///
/// The global exception mask of an ARMv6-M core.
///
/// Masking through PRIMASK suppresses every configurable-priority exception,
/// which is a bigger hammer than masking the one IRQ a trampoline is wired
/// to; platform crates can implement TriggerSource for their own NVIC lines
/// when that matters.
///
pub struct Primask;

#[cfg(target_arch = "arm")]
impl TriggerSource for Primask {
    fn mask(
        &mut self
    ) -> bool {
        let was_unmasked = cortex_m::register::primask::read().is_active();
        cortex_m::interrupt::disable();
        was_unmasked
    }

    fn restore(
        &mut self,
        was_unmasked: bool
    ) {
        if was_unmasked {
            unsafe {
                // SAFETY: The source was unmasked when the guard was taken,
                //         so no masked critical section is being broken open.
                cortex_m::interrupt::enable();
            }
        }
    }
}
