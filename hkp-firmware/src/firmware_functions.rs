//! Board specific actions the firmware can trigger but not perform itself.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;

pub type ResetFn = &'static (dyn Fn() + Sync);

struct Hooks {
    reset: Option<ResetFn>,
    reset_to_usb_boot: Option<ResetFn>,
}

static HOOKS: CriticalSectionMutex<RefCell<Hooks>> = CriticalSectionMutex::new(RefCell::new(Hooks {
    reset: None,
    reset_to_usb_boot: None,
}));

/// Runs the registered reset hook once. Returns false if none was registered.
pub fn reset() -> bool {
    run(|hooks| hooks.reset.take())
}

/// Runs the registered reset-to-bootloader hook once. Returns false if none was registered.
pub fn reset_to_usb_boot() -> bool {
    run(|hooks| hooks.reset_to_usb_boot.take())
}

fn run(take: impl FnOnce(&mut Hooks) -> Option<ResetFn>) -> bool {
    let hook = HOOKS.lock(|hooks| take(&mut hooks.borrow_mut()));
    match hook {
        Some(f) => {
            f();
            true
        }
        None => false,
    }
}

/// Registers the function [reset] calls.
///
/// ```
/// use hkp_firmware::firmware_functions::{handle_reset, reset};
/// # pub mod cortex_m { pub mod peripheral {pub mod SCB {pub fn sys_reset() {}}}}
///
/// fn sys_reset() {
///     cortex_m::peripheral::SCB::sys_reset();
/// }
///
/// handle_reset(Some(&sys_reset));
/// assert!(reset());
/// ```
pub fn handle_reset(value: Option<ResetFn>) {
    HOOKS.lock(|hooks| hooks.borrow_mut().reset = value);
}

/// Registers the function [reset_to_usb_boot] calls; the `boot` command ends up here.
pub fn handle_reset_to_usb_boot(value: Option<ResetFn>) {
    HOOKS.lock(|hooks| hooks.borrow_mut().reset_to_usb_boot = value);
}

#[cfg(all(not(test), feature = "reset-on-panic", target_os = "none"))]
mod panic {
    #[panic_handler]
    fn panic(_info: &core::panic::PanicInfo) -> ! {
        super::reset();

        loop {}
    }
}
