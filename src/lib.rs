//! Linux capability state as data.
//!
//! This crate models the two kinds of capability state that privilege-aware programs compute
//! before (or after) changing the privileges of a thread:
//!
//! - [`CapSet`]: the effective, permitted and inheritable vectors of a thread.
//! - [`Iab`]: the inheritable, ambient and (inverted) bounding vectors that a launched
//!   program should end up with.
//!
//! Both can be converted to and from the text form used by `libcap` (`cap_chown,cap_kill=ep`,
//! `!cap_sys_admin,^cap_chown`), and a `CapSet` can be exported to (and imported from) the
//! portable binary form that `libcap` uses to move capability sets between processes.
//!
//! All kernel-facing calls go through the replaceable provider in [`syscall`].

use libc::{c_int, c_long, c_ulong};

mod constants;
mod err;
mod externs;

pub mod caps;
pub mod object;
pub mod syscall;

pub use caps::*;
pub use err::{Error, Result};
pub use object::{release, CapString, Object, ObjectKind};

use syscall::Syscalls;

/// Perform the one-time kernel probes up front.
///
/// The maximum capability count and the kernel's preferred capability ABI version are
/// otherwise probed lazily the first time they are needed. Programs that install a custom
/// syscall provider should call this (after [`syscall::install()`]) before spawning the threads
/// that use this crate.
pub fn init() {
    let bits = caps::max_bits();
    let version = caps::kernel_version();
    log::debug!(
        "capability probes done: max_bits={} version={:#x}",
        bits,
        version
    );
}

#[inline]
fn raw_prctl(
    sys: &dyn Syscalls,
    option: c_int,
    arg2: c_ulong,
    arg3: c_ulong,
) -> Result<c_int> {
    let res = sys.syscall3(
        libc::SYS_prctl,
        option as c_long,
        arg2 as c_long,
        arg3 as c_long,
    );

    if res >= 0 {
        Ok(res as c_int)
    } else {
        Err(Error::from_code(-res as i32))
    }
}

#[inline]
fn raw_prctl6(
    sys: &dyn Syscalls,
    option: c_int,
    arg2: c_ulong,
    arg3: c_ulong,
    arg4: c_ulong,
    arg5: c_ulong,
) -> Result<c_int> {
    let res = sys.syscall6(
        libc::SYS_prctl,
        option as c_long,
        arg2 as c_long,
        arg3 as c_long,
        arg4 as c_long,
        arg5 as c_long,
        0,
    );

    if res >= 0 {
        Ok(res as c_int)
    } else {
        Err(Error::from_code(-res as i32))
    }
}
