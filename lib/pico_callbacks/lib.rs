//!
//! @file lib.rs
//! @author Andrew Spaulding (Kasplat)
//! @brief Trampoline shapes for the RP2040 SDK callback APIs.
//! @bug No known bugs.
//!
//! Nothing in here is mechanism; each alias just pins the generic
//! trampoline to the signature one SDK registration function expects, so
//! consumers name the handler they want instead of spelling out a C
//! function pointer type.
//!

#![no_std]

use core::ffi::c_void;
use core::marker::{PhantomData, PhantomPinned};

use thumb_trampoline::Trampoline;

///
/// The SDK's repeating_timer structure. Its layout belongs to the SDK, so
/// it is opaque here; the timer pool hands callbacks a pointer to one.
///
#[repr(C)]
pub struct RepeatingTimer {
    // Stop construction - without this anyone can construct.
    _private: [u8; 0],

    // Prevent the compiler from marking as Send, Sync, or Unpin.
    _marker: PhantomData<(*mut u8, PhantomPinned)>
}

/// irq_handler_t
pub type IrqHandler<T> = Trampoline<T, unsafe extern "C" fn()>;

/// exception_handler_t
pub type ExceptionHandler<T> = Trampoline<T, unsafe extern "C" fn()>;

/// resus_callback_t
pub type ResusCallback<T> = Trampoline<T, unsafe extern "C" fn()>;

/// rtc_callback_t
pub type RtcCallback<T> = Trampoline<T, unsafe extern "C" fn()>;

/// hardware_alarm_callback_t
pub type HardwareAlarmCallback<T> = Trampoline<T, unsafe extern "C" fn(u32)>;

/// gpio_irq_callback_t
pub type GpioIrqCallback<T> = Trampoline<T, unsafe extern "C" fn(u32, u32)>;

/// repeating_timer_callback_t
pub type RepeatingTimerCallback<T> =
    Trampoline<T, unsafe extern "C" fn(*mut RepeatingTimer) -> bool>;

/// alarm_callback_t
pub type AlarmCallback<T> = Trampoline<T, unsafe extern "C" fn(i32, *mut c_void) -> i64>;

#[cfg(test)]
mod tests {
    use core::pin::pin;
    use core::ptr::NonNull;

    use thumb_trampoline::{adapt_method, THUMB_BIT};

    use super::*;

    struct Device;

    #[test]
    fn alias_code_sizes_match_their_arity() {
        assert_eq!(IrqHandler::<Device>::code_size(), 8);
        assert_eq!(ExceptionHandler::<Device>::code_size(), 8);
        assert_eq!(ResusCallback::<Device>::code_size(), 8);
        assert_eq!(RtcCallback::<Device>::code_size(), 8);
        assert_eq!(HardwareAlarmCallback::<Device>::code_size(), 8);
        assert_eq!(GpioIrqCallback::<Device>::code_size(), 12);
        assert_eq!(RepeatingTimerCallback::<Device>::code_size(), 8);
        assert_eq!(AlarmCallback::<Device>::code_size(), 12);
    }

    #[test]
    fn gpio_alias_binds_like_the_generic() {
        struct Pin25 {
            events: u32
        }

        impl Pin25 {
            fn on_gpio(&mut self, _gpio: u32, events: u32) {
                self.events |= events;
            }
        }

        let mut dev = Pin25 { events: 0 };
        let m = adapt_method!(Pin25, fn on_gpio(gpio: u32, events: u32));
        let t = pin!(GpioIrqCallback::<Pin25>::new(NonNull::from(&mut dev), m));

        assert_eq!(t.get_method() as usize, m as usize);
        assert_eq!(t.as_ref().callback() as usize & THUMB_BIT, THUMB_BIT);
    }
}
