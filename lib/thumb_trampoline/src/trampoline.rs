//!
//! @file trampoline.rs
//! @author Andrew Spaulding (Kasplat)
//! @brief The instance-bound trampoline object and its accessors.
//! @bug No known bugs.
//!
//! A trampoline is three things laid out back to back: the entry sequence
//! for its arity, the address of the object it is bound to, and the address
//! of the method it dispatches to. The entry sequence finds the two data
//! words by fixed pc-relative offsets, which is why the layout below is
//! repr(C) and must never be reordered or padded. Nothing will diagnose a
//! violation; the generated loads just start returning garbage.
//!
//! The object binding is permanent. There is deliberately no setter for it:
//! a trampoline lives inside the object it serves, so relocating the object
//! means reconstructing the trampoline, and that is the container's job. The
//! method binding may be retargeted at any time through set_method(), which
//! is the cheap path - it rewrites one word instead of materializing a whole
//! new block.
//!
//! Destruction is the dangerous edge. The hardware has a raw pointer into
//! this object and will happily jump through it after the object is gone;
//! nothing here can check for that. Unregister the callback from its source
//! and run retire_barrier() before letting a trampoline go out of scope.
//!

use core::marker::PhantomPinned;
use core::mem::size_of;
use core::pin::Pin;
use core::ptr::NonNull;

use irq_mask::TriggerSource;

use crate::abi::CallbackShape;
use crate::thumb::THUMB_BIT;

///
/// Adapts a non-static method for use with a bare C callback API.
///
/// The shape parameter is the callback type the C API expects, e.g.
/// `unsafe extern "C" fn(u32, u32)` for a GPIO event handler. The method
/// bound into the trampoline takes `*mut T` prepended to that shape's
/// arguments; adapt_method!() produces one from an inherent method.
///
/// A trampoline cannot be cloned or copied: a copy would still carry the
/// original object's address in its data words. It also refuses to hand out
/// its entry pointer except through Pin, since the pointer dies the moment
/// the block moves.
///
#[repr(C)]
pub struct Trampoline<T, S: CallbackShape<T>> {
    /// The entry sequence the C API will jump into. Must stay first.
    code: S::Code,

    /// The bound object. DO NOT reorder; the code reaches this by offset.
    this: *mut T,

    /// The bound method. DO NOT reorder; the code reaches this by offset.
    method: S::Method,

    /// An exposed trampoline must never move.
    _pin: PhantomPinned
}

impl<T, S: CallbackShape<T>> Trampoline<T, S> {
    /// Creates a trampoline bound to the given object and method.
    pub fn new(
        this: NonNull<T>,
        method: S::Method
    ) -> Self {
        Self {
            code: S::CODE,
            this: this.as_ptr(),
            method,
            _pin: PhantomPinned
        }
    }

    /// Gets the length of this trampoline's entry sequence, in bytes.
    pub const fn code_size() -> usize {
        size_of::<S::Code>()
    }

    ///
    /// Returns the function pointer to register with whatever wants a legit
    /// callback.
    ///
    /// The value is the code block's address plus one; the set low bit keeps
    /// the core in Thumb state when it jumps here. Calling this repeatedly
    /// on one instance always yields the same pointer.
    ///
    pub fn callback(
        self: Pin<&Self>
    ) -> S::Raw {
        assert!(size_of::<S::Raw>() == size_of::<usize>());

        let entry = &self.code as *const S::Code as usize + THUMB_BIT;
        // SAFETY: We know Raw is of the correct size for this transmute, and
        //         the address is the entry of the block this object owns.
        unsafe { core::mem::transmute_copy::<usize, S::Raw>(&entry) }
    }

    ///
    /// Changes the method this trampoline dispatches to.
    ///
    /// Only the method word is rewritten; the code and the object binding
    /// are untouched. If the trampoline is registered with a live source,
    /// use set_method_masked() instead - the source could fire mid-update
    /// and jump through the old pointer with the new one half-visible.
    ///
    pub fn set_method(
        self: Pin<&mut Self>,
        method: S::Method
    ) {
        // SAFETY: The method word is not structurally pinned; the pin only
        //         guards the address of the block itself.
        unsafe { self.get_unchecked_mut().method = method; }
    }

    /// set_method(), performed with the trampoline's trigger source masked.
    pub fn set_method_masked<M: TriggerSource>(
        self: Pin<&mut Self>,
        src: &mut M,
        method: S::Method
    ) {
        irq_mask::masked(src, move || self.set_method(method));
    }

    /// Returns the currently bound method.
    pub fn get_method(
        &self
    ) -> S::Method {
        self.method
    }

    /// Returns the object this trampoline is bound to.
    pub fn bound_object(
        &self
    ) -> NonNull<T> {
        // SAFETY: The binding was built from a NonNull and never rewritten.
        unsafe { NonNull::new_unchecked(self.this) }
    }
}

///
/// Wraps an inherent method of a type into the prepended-object callback
/// shape a trampoline binds.
///
/// The method is named with its argument list and return type, which become
/// the forwarded part of the shape:
///
/// ```ignore
/// let cb = adapt_method!(Counter, fn on_event(a: u32, b: u32) -> bool);
/// let tramp = Trampoline::new(NonNull::from(&mut counter), cb);
/// ```
///
#[macro_export]
macro_rules! adapt_method {
    ( $class:ty, fn $method:ident ( $($argn:ident: $argt:ty),* ) $(-> $ret:ty)? ) => {{
        unsafe extern "C" fn adapter(
            this: *mut $class
            $(, $argn: $argt)*
        ) $(-> $ret)? {
            (*this).$method($($argn),*)
        }
        adapter as unsafe extern "C" fn(*mut $class $(, $argt)*) $(-> $ret)?
    }};
}

#[cfg(test)]
mod tests {
    use core::pin::pin;

    use super::*;

    /// Mirrors a method-dispatched event consumer.
    struct Counter {
        hits: u32,
        last: (u32, u32)
    }

    impl Counter {
        fn new() -> Self {
            Self { hits: 0, last: (0, 0) }
        }

        fn on_event(&mut self, a: u32, b: u32) -> bool {
            self.hits += 1;
            self.last = (a, b);
            true
        }

        fn on_other(&mut self, _a: u32, _b: u32) -> bool {
            false
        }
    }

    type EventShape = unsafe extern "C" fn(u32, u32) -> bool;

    #[test]
    fn callback_is_code_base_plus_thumb_bit() {
        let mut c = Counter::new();
        let m = adapt_method!(Counter, fn on_event(a: u32, b: u32) -> bool);
        let t = pin!(Trampoline::<Counter, EventShape>::new(NonNull::from(&mut c), m));

        let base = &t.code as *const _ as usize;
        assert_eq!(t.as_ref().callback() as usize, base + 1);
    }

    #[test]
    fn callback_is_stable_across_calls() {
        let mut c = Counter::new();
        let m = adapt_method!(Counter, fn on_event(a: u32, b: u32) -> bool);
        let t = pin!(Trampoline::<Counter, EventShape>::new(NonNull::from(&mut c), m));

        assert_eq!(t.as_ref().callback() as usize, t.as_ref().callback() as usize);
    }

    #[test]
    fn bindings_read_back_as_constructed() {
        let mut c = Counter::new();
        let obj = NonNull::from(&mut c);
        let m = adapt_method!(Counter, fn on_event(a: u32, b: u32) -> bool);
        let t = pin!(Trampoline::<Counter, EventShape>::new(obj, m));

        assert_eq!(t.bound_object(), obj);
        assert_eq!(t.get_method() as usize, m as usize);
    }

    #[test]
    fn set_method_retargets_only_the_method() {
        let mut c = Counter::new();
        let obj = NonNull::from(&mut c);
        let m1 = adapt_method!(Counter, fn on_event(a: u32, b: u32) -> bool);
        let m2 = adapt_method!(Counter, fn on_other(a: u32, b: u32) -> bool);
        let mut t = pin!(Trampoline::<Counter, EventShape>::new(obj, m1));

        let code_before = *t.code.halfwords();
        let entry_before = t.as_ref().callback() as usize;

        t.as_mut().set_method(m2);

        assert_eq!(t.get_method() as usize, m2 as usize);
        assert_eq!(t.bound_object(), obj);
        assert_eq!(*t.code.halfwords(), code_before);
        assert_eq!(t.as_ref().callback() as usize, entry_before);
    }

    #[test]
    fn masked_set_method_masks_around_the_update() {
        struct FakeIrq {
            unmasked: bool,
            masks: u32
        }

        impl TriggerSource for FakeIrq {
            fn mask(&mut self) -> bool {
                self.masks += 1;
                core::mem::replace(&mut self.unmasked, false)
            }

            fn restore(&mut self, was_unmasked: bool) {
                self.unmasked = was_unmasked;
            }
        }

        let mut c = Counter::new();
        let m1 = adapt_method!(Counter, fn on_event(a: u32, b: u32) -> bool);
        let m2 = adapt_method!(Counter, fn on_other(a: u32, b: u32) -> bool);
        let mut t = pin!(Trampoline::<Counter, EventShape>::new(NonNull::from(&mut c), m1));

        let mut irq = FakeIrq { unmasked: true, masks: 0 };
        t.as_mut().set_method_masked(&mut irq, m2);

        assert_eq!(irq.masks, 1);
        assert!(irq.unmasked);
        assert_eq!(t.get_method() as usize, m2 as usize);
    }

    #[test]
    fn code_size_tracks_arity() {
        assert_eq!(Trampoline::<Counter, unsafe extern "C" fn()>::code_size(), 8);
        assert_eq!(Trampoline::<Counter, unsafe extern "C" fn(u32)>::code_size(), 8);
        assert_eq!(Trampoline::<Counter, EventShape>::code_size(), 12);
        assert_eq!(
            Trampoline::<Counter, unsafe extern "C" fn(u32, u32, u32)>::code_size(),
            16
        );
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn data_words_sit_directly_behind_the_code() {
        use core::mem::offset_of;

        type Gpio = Trampoline<Counter, EventShape>;
        assert_eq!(offset_of!(Gpio, code), 0);
        assert_eq!(offset_of!(Gpio, this), 12);
        assert_eq!(offset_of!(Gpio, method), 16);

        type Irq = Trampoline<Counter, unsafe extern "C" fn()>;
        assert_eq!(offset_of!(Irq, this), 8);
        assert_eq!(offset_of!(Irq, method), 12);
    }
}
