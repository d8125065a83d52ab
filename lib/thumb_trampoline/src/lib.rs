//!
//! @file lib.rs
//! @author Andrew Spaulding (Kasplat)
//! @brief Adapts bound instance methods for use with bare C callback APIs.
//! @bug No known bugs.
//!
//! Vendor C APIs on the RP2040 take a bare function pointer with no
//! user-data slot, which locks out anything that wants to dispatch to a
//! method on an object. The trampoline in this crate closes that gap: each
//! instance owns a few halfwords of ARMv6-M Thumb code followed by the
//! address of the bound object and the address of the bound method. Jumping
//! into the code with the C API's arguments in place lands in the method
//! with the object prepended as the first argument. No heap, no vtable.
//!
//! The generated code is data as far as the toolchain is concerned, so this
//! only works while the MPU permits execution from the region holding the
//! trampoline (the RP2040 boots that way). It is also ARMv6-M Thumb only;
//! the opcode tables are meaningless anywhere else.
//!

#![no_std]

mod abi;
mod thumb;
mod trampoline;

pub use abi::*;
pub use thumb::{CodeBlock, THUMB_BIT};
pub use trampoline::*;

///
/// Drains any in-flight fetch of a retiring trampoline's code.
///
/// Tearing a trampoline down safely is a three step protocol: unregister the
/// callback from its source, call this function, and only then invalidate
/// the trampoline's storage. Without the barrier, a fetch started just
/// before unregistration could still be walking the soon-to-be-dead block.
///
pub fn retire_barrier() {
    #[cfg(target_arch = "arm")]
    {
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}
