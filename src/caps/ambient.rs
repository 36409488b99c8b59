//! The current thread's ambient set.

use crate::syscall::{self, Syscalls};

#[inline]
fn ambient(sys: &dyn Syscalls, op: libc::c_int, cap: u32) -> crate::Result<libc::c_int> {
    crate::raw_prctl6(
        sys,
        libc::PR_CAP_AMBIENT,
        op as libc::c_ulong,
        cap as libc::c_ulong,
        0,
        0,
    )
}

#[inline]
pub fn raise(cap: u32) -> crate::Result<()> {
    raise_via(&*syscall::current(), cap)
}

pub fn raise_via(sys: &dyn Syscalls, cap: u32) -> crate::Result<()> {
    ambient(sys, libc::PR_CAP_AMBIENT_RAISE, cap)?;

    Ok(())
}

#[inline]
pub fn lower(cap: u32) -> crate::Result<()> {
    lower_via(&*syscall::current(), cap)
}

pub fn lower_via(sys: &dyn Syscalls, cap: u32) -> crate::Result<()> {
    ambient(sys, libc::PR_CAP_AMBIENT_LOWER, cap)?;

    Ok(())
}

/// Check whether the given capability is raised in the current thread's ambient set.
///
/// This returns `None` if the capability (or ambient capabilities as a whole) is not
/// supported.
#[inline]
pub fn is_set(cap: u32) -> Option<bool> {
    is_set_via(&*syscall::current(), cap)
}

pub fn is_set_via(sys: &dyn Syscalls, cap: u32) -> Option<bool> {
    match ambient(sys, libc::PR_CAP_AMBIENT_IS_SET, cap) {
        Ok(x) => Some(x != 0),
        Err(_) => None,
    }
}

#[inline]
pub fn clear() -> crate::Result<()> {
    clear_via(&*syscall::current())
}

pub fn clear_via(sys: &dyn Syscalls) -> crate::Result<()> {
    ambient(sys, libc::PR_CAP_AMBIENT_CLEAR_ALL, 0)?;

    Ok(())
}

#[inline]
pub fn is_supported() -> bool {
    is_set(super::Cap::CHOWN as u32).is_some()
}
