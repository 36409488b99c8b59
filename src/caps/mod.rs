use std::fmt;

use once_cell::sync::OnceCell;

use crate::syscall::Syscalls;
use crate::constants::{
    CAP_MAXBITS, _LINUX_CAPABILITY_U32S_1, _LINUX_CAPABILITY_U32S_2, _LINUX_CAPABILITY_U32S_3,
    _LINUX_CAPABILITY_VERSION_1, _LINUX_CAPABILITY_VERSION_2, _LINUX_CAPABILITY_VERSION_3,
};

mod capset;
mod ext;
mod iab;
mod launch;
mod proc;
mod text;

pub mod ambient;
pub mod bounding;
pub use capset::CapSet;
pub use iab::Iab;
pub use launch::{LaunchCallback, Launcher};
pub use proc::proc_root;
pub use text::{cap_from_name, cap_to_name, ParseTextError};

/// An enum representing all of the Linux capabilities this library has names for.
///
/// Capabilities are passed around as plain `u32` values so that capabilities added to the kernel
/// after this library was built can still be represented; `Cap::X as u32` gives the value of a
/// named capability.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
#[allow(non_camel_case_types)]
#[non_exhaustive]
pub enum Cap {
    CHOWN = 0,
    DAC_OVERRIDE = 1,
    DAC_READ_SEARCH = 2,
    FOWNER = 3,
    FSETID = 4,
    KILL = 5,
    SETGID = 6,
    SETUID = 7,
    SETPCAP = 8,
    LINUX_IMMUTABLE = 9,
    NET_BIND_SERVICE = 10,
    NET_BROADCAST = 11,
    NET_ADMIN = 12,
    NET_RAW = 13,
    IPC_LOCK = 14,
    IPC_OWNER = 15,
    SYS_MODULE = 16,
    SYS_RAWIO = 17,
    SYS_CHROOT = 18,
    SYS_PTRACE = 19,
    SYS_PACCT = 20,
    SYS_ADMIN = 21,
    SYS_BOOT = 22,
    SYS_NICE = 23,
    SYS_RESOURCE = 24,
    SYS_TIME = 25,
    SYS_TTY_CONFIG = 26,
    MKNOD = 27,
    LEASE = 28,
    AUDIT_WRITE = 29,
    AUDIT_CONTROL = 30,
    SETFCAP = 31,
    MAC_OVERRIDE = 32,
    MAC_ADMIN = 33,
    SYSLOG = 34,
    WAKE_ALARM = 35,
    BLOCK_SUSPEND = 36,
    AUDIT_READ = 37,
    PERFMON = 38,
    BPF = 39,
    CHECKPOINT_RESTORE = 40,
    // Note: When adding a new capability, make sure to update LAST_CAP and CAPS_BY_NAME
}

// *** WARNING WARNING WARNING ***
// This MUST be set to the last capability from the above list!
const LAST_CAP: Cap = Cap::CHECKPOINT_RESTORE;

const CAP_MAX: u8 = LAST_CAP as u8;
/// The number of capabilities that have names.
pub(crate) const NUM_CAPS: u8 = CAP_MAX + 1;

// The names used by the text representations, indexed by capability value.
static CAPS_BY_NAME: [(&str, Cap); NUM_CAPS as usize] = [
    ("cap_chown", Cap::CHOWN),
    ("cap_dac_override", Cap::DAC_OVERRIDE),
    ("cap_dac_read_search", Cap::DAC_READ_SEARCH),
    ("cap_fowner", Cap::FOWNER),
    ("cap_fsetid", Cap::FSETID),
    ("cap_kill", Cap::KILL),
    ("cap_setgid", Cap::SETGID),
    ("cap_setuid", Cap::SETUID),
    ("cap_setpcap", Cap::SETPCAP),
    ("cap_linux_immutable", Cap::LINUX_IMMUTABLE),
    ("cap_net_bind_service", Cap::NET_BIND_SERVICE),
    ("cap_net_broadcast", Cap::NET_BROADCAST),
    ("cap_net_admin", Cap::NET_ADMIN),
    ("cap_net_raw", Cap::NET_RAW),
    ("cap_ipc_lock", Cap::IPC_LOCK),
    ("cap_ipc_owner", Cap::IPC_OWNER),
    ("cap_sys_module", Cap::SYS_MODULE),
    ("cap_sys_rawio", Cap::SYS_RAWIO),
    ("cap_sys_chroot", Cap::SYS_CHROOT),
    ("cap_sys_ptrace", Cap::SYS_PTRACE),
    ("cap_sys_pacct", Cap::SYS_PACCT),
    ("cap_sys_admin", Cap::SYS_ADMIN),
    ("cap_sys_boot", Cap::SYS_BOOT),
    ("cap_sys_nice", Cap::SYS_NICE),
    ("cap_sys_resource", Cap::SYS_RESOURCE),
    ("cap_sys_time", Cap::SYS_TIME),
    ("cap_sys_tty_config", Cap::SYS_TTY_CONFIG),
    ("cap_mknod", Cap::MKNOD),
    ("cap_lease", Cap::LEASE),
    ("cap_audit_write", Cap::AUDIT_WRITE),
    ("cap_audit_control", Cap::AUDIT_CONTROL),
    ("cap_setfcap", Cap::SETFCAP),
    ("cap_mac_override", Cap::MAC_OVERRIDE),
    ("cap_mac_admin", Cap::MAC_ADMIN),
    ("cap_syslog", Cap::SYSLOG),
    ("cap_wake_alarm", Cap::WAKE_ALARM),
    ("cap_block_suspend", Cap::BLOCK_SUSPEND),
    ("cap_audit_read", Cap::AUDIT_READ),
    ("cap_perfmon", Cap::PERFMON),
    ("cap_bpf", Cap::BPF),
    ("cap_checkpoint_restore", Cap::CHECKPOINT_RESTORE),
];

impl Cap {
    /// Return an iterator over all of the capabilities enumerated by `Cap`.
    #[inline]
    pub fn iter() -> CapIter {
        CapIter { i: 0 }
    }

    /// Look up the named capability with the given value.
    #[inline]
    pub fn from_value(val: u32) -> Option<Self> {
        CAPS_BY_NAME.get(val as usize).map(|(_, cap)| *cap)
    }

    /// The lowercase name used by the text representations (for example `cap_chown`).
    #[inline]
    pub fn name(self) -> &'static str {
        CAPS_BY_NAME[self as usize].0
    }

    /// Checks whether the specified capability is supported on the current kernel.
    pub fn is_supported(self) -> bool {
        bounding::read(self as u32).is_ok()
    }
}

/// Represents an error when parsing a `Cap` from a string.
#[derive(Clone, Eq, PartialEq)]
pub struct ParseCapError(());

impl ParseCapError {
    #[inline]
    pub(crate) fn new() -> Self {
        Self(())
    }
}

impl fmt::Debug for ParseCapError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unknown capability")
    }
}

impl fmt::Display for ParseCapError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for ParseCapError {}

impl From<ParseCapError> for crate::Error {
    #[inline]
    fn from(_: ParseCapError) -> Self {
        Self::einval()
    }
}

impl std::str::FromStr for Cap {
    type Err = ParseCapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 4 && s.as_bytes()[..4].eq_ignore_ascii_case(b"CAP_") {
            for (cap_name, cap) in CAPS_BY_NAME.iter() {
                if cap_name.eq_ignore_ascii_case(s) {
                    return Ok(*cap);
                }
            }
        }

        Err(ParseCapError(()))
    }
}

impl fmt::Display for Cap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CAP_")?;
        fmt::Debug::fmt(self, f)
    }
}

impl From<Cap> for u32 {
    #[inline]
    fn from(cap: Cap) -> u32 {
        cap as u32
    }
}

/// An iterator over all the capabilities enumerated in `Cap`.
///
/// This is constructed by [`Cap::iter()`].
///
/// [`Cap::iter()`]: ./enum.Cap.html#method.iter
#[derive(Clone)]
pub struct CapIter {
    i: u8,
}

impl Iterator for CapIter {
    type Item = Cap;

    fn next(&mut self) -> Option<Cap> {
        debug_assert!(self.i <= NUM_CAPS);

        let cap = Cap::from_value(self.i as u32)?;
        self.i += 1;
        Some(cap)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

impl ExactSizeIterator for CapIter {
    #[inline]
    fn len(&self) -> usize {
        debug_assert!(self.i <= NUM_CAPS);
        (NUM_CAPS - self.i) as usize
    }
}

impl std::iter::FusedIterator for CapIter {}

/// One of the three vectors of a [`CapSet`].
///
/// The discriminants match the kernel's (and libcap's) ordering of the vectors.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Flag {
    Effective = 0,
    Permitted = 1,
    Inheritable = 2,
}

impl Flag {
    /// All three vectors, in kernel order.
    pub const ALL: [Flag; 3] = [Flag::Effective, Flag::Permitted, Flag::Inheritable];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// The single-vector mask for this flag.
    #[inline]
    pub fn mask(self) -> Flags {
        match self {
            Self::Effective => Flags::EFFECTIVE,
            Self::Permitted => Flags::PERMITTED,
            Self::Inheritable => Flags::INHERITABLE,
        }
    }
}

bitflags::bitflags! {
    /// A selection of [`CapSet`] vectors.
    ///
    /// Returned by [`CapSet::compare()`] to report which vectors differ, and used by the text
    /// form to describe which vectors a capability is raised in.
    pub struct Flags: u32 {
        const EFFECTIVE = 1 << 0;
        const PERMITTED = 1 << 1;
        const INHERITABLE = 1 << 2;
    }
}

/// One of the three vectors of an [`Iab`] tuple.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum IabVector {
    Inheritable = 2,
    Ambient = 3,
    /// The bounding set. Raising a value in this vector means the capability will be *dropped*
    /// from the bounding set.
    Bound = 4,
}

impl IabVector {
    pub const ALL: [IabVector; 3] = [IabVector::Inheritable, IabVector::Ambient, IabVector::Bound];

    #[inline]
    pub fn mask(self) -> IabFlags {
        IabFlags::from_bits_truncate(1 << (self as u32))
    }
}

bitflags::bitflags! {
    /// A selection of [`Iab`] vectors.
    pub struct IabFlags: u32 {
        const INHERITABLE = 1 << (IabVector::Inheritable as u32);
        const AMBIENT = 1 << (IabVector::Ambient as u32);
        const NOT_BOUNDING = 1 << (IabVector::Bound as u32);
    }
}

/// The named privilege "modes" a process can be described as being in.
///
/// Only the names are modelled here; detecting or entering a mode is left to the caller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
    Uncertain = 0,
    NoPriv = 1,
    Pure1eInit = 2,
    Pure1e = 3,
    Hybrid = 4,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Uncertain,
        Mode::NoPriv,
        Mode::Pure1eInit,
        Mode::Pure1e,
        Mode::Hybrid,
    ];

    pub fn from_value(val: u32) -> Option<Self> {
        Self::ALL.get(val as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Uncertain => "UNCERTAIN",
            Self::NoPriv => "NOPRIV",
            Self::Pure1eInit => "PURE1E_INIT",
            Self::Pure1e => "PURE1E",
            Self::Hybrid => "HYBRID",
        }
    }

    /// Look up a mode by its exact (upper-case) name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.name() == name)
    }
}

impl fmt::Display for Mode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The name of the mode with the given value, or `"UNKNOWN"`.
pub fn mode_name(val: u32) -> &'static str {
    Mode::from_value(val).map_or("UNKNOWN", Mode::name)
}

/// Find the first value in `[low, high]` for which `supported` is false, assuming that
/// `supported` is true for every value below it and false for every value above it.
///
/// Returns `None` if nothing is supported, or if everything up to and including `high` is.
pub(crate) fn binary_search<F: Fn(u32) -> bool>(supported: F, low: u32, high: u32) -> Option<u32> {
    let mut min = low as i64;
    let mut max = high as i64;

    while min <= max {
        let mid = (min + max) / 2;
        if supported(mid as u32) {
            min = mid + 1;
        } else {
            max = mid - 1;
        }
    }

    if min != 0 && min <= high as i64 {
        Some(min as u32)
    } else {
        None
    }
}

/// Count the capabilities supported through `sys` by searching the bounding set.
pub(crate) fn probe_max_bits(sys: &dyn Syscalls) -> Option<u32> {
    binary_search(|v| bounding::read_via(sys, v).is_ok(), 0, CAP_MAXBITS)
}

static MAX_BITS: OnceCell<u32> = OnceCell::new();
static KERNEL_VERSION: OnceCell<u32> = OnceCell::new();

/// The number of capabilities supported by the running kernel.
///
/// This is determined the first time it is needed by a binary search over the bounding set
/// (through the installed [syscall provider](../syscall/index.html)) and cached for the life of
/// the process. If the kernel cannot be probed, the number of capabilities this library has
/// names for is used instead. The result never exceeds 64.
pub fn max_bits() -> u32 {
    *MAX_BITS.get_or_init(|| {
        match probe_max_bits(&*crate::syscall::current()) {
            Some(bits) => {
                log::debug!("kernel supports {} capabilities", bits);
                bits
            }
            None => {
                log::debug!(
                    "unable to probe the bounding set; assuming {} capabilities",
                    NUM_CAPS
                );
                NUM_CAPS as u32
            }
        }
    })
}

/// The capability ABI version preferred by the running kernel.
///
/// This is probed once (with a `capget()` call that transfers no data) and cached.
pub fn kernel_version() -> u32 {
    *KERNEL_VERSION.get_or_init(|| {
        let mut header = crate::externs::cap_user_header_t {
            version: _LINUX_CAPABILITY_VERSION_3,
            pid: 0,
        };

        // A kernel that doesn't know the version we asked for rewrites it to the one it prefers
        // (and fails the call), so the result code doesn't matter here.
        crate::syscall::DirectSyscalls.syscall3(
            libc::SYS_capget,
            &mut header as *mut _ as libc::c_long,
            0,
            0,
        );

        if version_u32s(header.version).is_some() {
            header.version
        } else {
            log::warn!(
                "unrecognized kernel capability version {:#x}; using {:#x}",
                header.version,
                _LINUX_CAPABILITY_VERSION_3
            );
            _LINUX_CAPABILITY_VERSION_3
        }
    })
}

/// The number of 32-bit words per vector used by the given ABI version.
pub(crate) fn version_u32s(version: u32) -> Option<usize> {
    match version {
        _LINUX_CAPABILITY_VERSION_1 => Some(_LINUX_CAPABILITY_U32S_1),
        _LINUX_CAPABILITY_VERSION_2 => Some(_LINUX_CAPABILITY_U32S_2),
        _LINUX_CAPABILITY_VERSION_3 => Some(_LINUX_CAPABILITY_U32S_3),
        _ => None,
    }
}

/// The bits of word `word` that correspond to capabilities below `max_bits`.
#[inline]
pub(crate) fn valid_mask(word: usize, max_bits: u32) -> u32 {
    let base = 32 * word as u32;
    if max_bits >= base + 32 {
        !0
    } else if max_bits > base {
        ((1u64 << (max_bits % 32)) - 1) as u32
    } else {
        0
    }
}
