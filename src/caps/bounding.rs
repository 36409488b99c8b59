//! The current thread's bounding set.
//!
//! Every call here goes through the installed [syscall provider](../../syscall/index.html).

use crate::constants::CAP_MAXBITS;
use crate::syscall::{self, Syscalls};

/// Drop the given capability from the current thread's bounding capability set.
#[inline]
pub fn drop(cap: u32) -> crate::Result<()> {
    drop_via(&*syscall::current(), cap)
}

/// Like [`drop()`], but using the given provider instead of the installed one.
pub fn drop_via(sys: &dyn Syscalls, cap: u32) -> crate::Result<()> {
    crate::raw_prctl(sys, libc::PR_CAPBSET_DROP, cap as libc::c_ulong, 0)?;

    Ok(())
}

/// Check if the given capability is raised in the current thread's bounding capability set.
///
/// Fails with `EINVAL` if the kernel does not support the capability.
#[inline]
pub fn read(cap: u32) -> crate::Result<bool> {
    read_via(&*syscall::current(), cap)
}

/// Like [`read()`], but using the given provider instead of the installed one.
pub fn read_via(sys: &dyn Syscalls, cap: u32) -> crate::Result<bool> {
    let res = crate::raw_prctl(sys, libc::PR_CAPBSET_READ, cap as libc::c_ulong, 0)?;

    Ok(res != 0)
}

/// Drop every capability supported by the kernel from the current thread's bounding set.
///
/// Capabilities that are already lowered are tolerated even when the thread lacks
/// `CAP_SETPCAP`.
#[inline]
pub fn clear() -> crate::Result<()> {
    clear_via(&*syscall::current())
}

/// Like [`clear()`], but using the given provider instead of the installed one.
pub fn clear_via(sys: &dyn Syscalls) -> crate::Result<()> {
    for cap in 0..CAP_MAXBITS {
        match drop_via(sys, cap) {
            Ok(()) => (),
            Err(e) if e.code() == libc::EINVAL && cap != 0 => return Ok(()),
            Err(e) if e.code() == libc::EPERM && matches!(read_via(sys, cap), Ok(false)) => (),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
