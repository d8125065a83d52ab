//!
//! @file abi.rs
//! @author Andrew Spaulding (Kasplat)
//! @brief Build-time validation of the callback shapes a trampoline can carry.
//! @bug No known bugs.
//!
//! The entry sequences only know how to move whole core registers around,
//! so the set of signatures they can adapt is narrow: at most three
//! arguments, each one register wide, and a return that fits the r0/r0:r1
//! convention. Everything in this module exists to turn a violation of
//! those limits into a missing-impl build error instead of a register
//! getting silently torn at invocation time.
//!

use crate::thumb;
use crate::thumb::CodeBlock;

///
/// Marks types which AAPCS passes to a callback in a single core register.
///
/// In order to implement this trait safely, the type must be at most four
/// bytes wide and must be passed in a core register under AAPCS (no
/// floating-point registers, no aggregate splitting). Anything wider would
/// spill into the next argument slot and shear the register shift done by
/// the entry sequences.
///
pub unsafe trait RegisterArg: Copy {}

unsafe impl RegisterArg for u8 {}
unsafe impl RegisterArg for u16 {}
unsafe impl RegisterArg for u32 {}
unsafe impl RegisterArg for i8 {}
unsafe impl RegisterArg for i16 {}
unsafe impl RegisterArg for i32 {}
unsafe impl RegisterArg for usize {}
unsafe impl RegisterArg for isize {}
unsafe impl RegisterArg for bool {}
unsafe impl<T> RegisterArg for *const T {}
unsafe impl<T> RegisterArg for *mut T {}

///
/// Marks types which AAPCS returns in r0 or the r0:r1 pair.
///
/// The trampoline never touches the return path (the method returns
/// straight to the C caller), so the only requirement is that the bound
/// method and the raw callback agree on it, which holds exactly when the
/// value travels in core registers.
///
pub unsafe trait RegisterRet {}

unsafe impl RegisterRet for () {}
unsafe impl RegisterRet for u8 {}
unsafe impl RegisterRet for u16 {}
unsafe impl RegisterRet for u32 {}
unsafe impl RegisterRet for u64 {}
unsafe impl RegisterRet for i8 {}
unsafe impl RegisterRet for i16 {}
unsafe impl RegisterRet for i32 {}
unsafe impl RegisterRet for i64 {}
unsafe impl RegisterRet for usize {}
unsafe impl RegisterRet for isize {}
unsafe impl RegisterRet for bool {}
unsafe impl<T> RegisterRet for *const T {}
unsafe impl<T> RegisterRet for *mut T {}

///
/// Ties a bare C callback shape to the pieces a trampoline needs: the
/// adapted method type with the bound object prepended, and the entry
/// sequence for the shape's arity.
///
/// Implementations exist only for `unsafe extern "C" fn` types of arity
/// zero through three whose arguments are [`RegisterArg`] and whose return
/// is [`RegisterRet`]. Instantiating a trampoline over any other shape is a
/// build failure, which is the whole point; see the module docs.
///
/// A fourth argument does not build:
///
/// ```compile_fail
/// use thumb_trampoline::Trampoline;
///
/// fn reject(_: Trampoline<u32, unsafe extern "C" fn(u32, u32, u32, u32)>) {}
/// ```
///
/// Neither does an argument wider than one register:
///
/// ```compile_fail
/// use thumb_trampoline::Trampoline;
///
/// fn reject(_: Trampoline<u32, unsafe extern "C" fn(u64)>) {}
/// ```
///
/// # Safety
///
/// An implementation asserts that executing `CODE` with `Raw`'s arguments
/// in r0 onward tail-calls a `Method` whose first argument is the word
/// stored directly behind the code. Getting that wrong is not a detectable
/// error, it is a corrupted interrupt handler.
///
pub unsafe trait CallbackShape<T>: Copy {
    /// The bare function pointer type handed to the C API.
    type Raw: Copy;

    /// The adapted method type, with the bound object prepended.
    type Method: Copy;

    /// The instruction block type for this shape's arity.
    type Code: Copy;

    /// The entry sequence which performs the adaptation.
    const CODE: Self::Code;
}

unsafe impl<T, R: RegisterRet> CallbackShape<T> for unsafe extern "C" fn() -> R {
    type Raw = Self;
    type Method = unsafe extern "C" fn(*mut T) -> R;
    type Code = CodeBlock<4>;
    const CODE: CodeBlock<4> = thumb::ENTRY0;
}

unsafe impl<T, R: RegisterRet, A: RegisterArg> CallbackShape<T>
    for unsafe extern "C" fn(A) -> R
{
    type Raw = Self;
    type Method = unsafe extern "C" fn(*mut T, A) -> R;
    type Code = CodeBlock<4>;
    const CODE: CodeBlock<4> = thumb::ENTRY1;
}

unsafe impl<T, R: RegisterRet, A: RegisterArg, B: RegisterArg> CallbackShape<T>
    for unsafe extern "C" fn(A, B) -> R
{
    type Raw = Self;
    type Method = unsafe extern "C" fn(*mut T, A, B) -> R;
    type Code = CodeBlock<6>;
    const CODE: CodeBlock<6> = thumb::ENTRY2;
}

unsafe impl<T, R: RegisterRet, A: RegisterArg, B: RegisterArg, C: RegisterArg> CallbackShape<T>
    for unsafe extern "C" fn(A, B, C) -> R
{
    type Raw = Self;
    type Method = unsafe extern "C" fn(*mut T, A, B, C) -> R;
    type Code = CodeBlock<8>;
    const CODE: CodeBlock<8> = thumb::ENTRY3;
}

#[cfg(test)]
mod tests {
    use core::mem::size_of;

    use super::*;

    struct Probe;

    fn code_size<S: CallbackShape<Probe>>() -> usize {
        size_of::<S::Code>()
    }

    #[test]
    fn shape_selects_arity_code() {
        assert_eq!(code_size::<unsafe extern "C" fn()>(), 8);
        assert_eq!(code_size::<unsafe extern "C" fn(u32)>(), 8);
        assert_eq!(code_size::<unsafe extern "C" fn(u32, u32)>(), 12);
        assert_eq!(code_size::<unsafe extern "C" fn(u32, u32, u32)>(), 16);
    }

    #[test]
    fn return_width_does_not_change_code() {
        // Returns ride r0/r0:r1 straight from the method; only argument
        // count selects a sequence.
        assert_eq!(code_size::<unsafe extern "C" fn(i32, *mut ()) -> i64>(), 12);
        assert_eq!(code_size::<unsafe extern "C" fn(*mut ()) -> bool>(), 8);
    }
}
