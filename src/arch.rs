//! The two registers the walker needs from the calling context.
//!
//! Both functions are `#[inline(always)]`: the value must come from the
//! frame of the function that calls them, not from a frame of their own.

use core::arch::asm;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("fpwalk only supports x86_64 and aarch64");

/// Address of the current frame's saved-frame-pointer slot.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub(crate) fn frame_pointer() -> usize {
    let out;
    // SAFETY: only copies a register.
    unsafe {
        asm!(
            "mov {out}, rbp",
            out = out(reg) out,
            options(nomem, nostack, preserves_flags)
        );
    }
    out
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub(crate) fn stack_pointer() -> usize {
    let out;
    // SAFETY: only copies a register.
    unsafe {
        asm!(
            "mov {out}, rsp",
            out = out(reg) out,
            options(nomem, nostack, preserves_flags)
        );
    }
    out
}

/// Address of the current frame record (x29 points at `[fp, lr]`).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub(crate) fn frame_pointer() -> usize {
    let out;
    // SAFETY: only copies a register.
    unsafe {
        asm!(
            "mov {out}, x29",
            out = out(reg) out,
            options(nomem, nostack, preserves_flags)
        );
    }
    out
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub(crate) fn stack_pointer() -> usize {
    let out;
    // SAFETY: only copies a register.
    unsafe {
        asm!(
            "mov {out}, sp",
            out = out(reg) out,
            options(nomem, nostack, preserves_flags)
        );
    }
    out
}
