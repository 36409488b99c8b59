use core::fmt;

use zeroize::Zeroize;

use super::{kernel_version, max_bits, Flag, Flags};
use crate::constants::CAP_U32S;
use crate::externs::{cap_user_data_t, cap_user_header_t};
use crate::syscall::{self, Syscalls};

pub(crate) type Words = [cap_user_data_t; CAP_U32S];

/// The effective, permitted and inheritable capability vectors of a thread.
///
/// A `CapSet` is plain data: changing one has no effect on any thread until it is applied with
/// [`set_proc()`](#method.set_proc). Every method takes `&self`; the vectors are guarded by an
/// internal lock, so a `CapSet` can be shared between threads and mutated concurrently.
pub struct CapSet {
    version: u32,
    data: spin::Mutex<Words>,
}

impl CapSet {
    /// Create a `CapSet` with every vector cleared.
    #[inline]
    pub fn empty() -> Self {
        Self::from_words(kernel_version(), Words::default())
    }

    #[inline]
    pub(crate) fn from_words(version: u32, words: Words) -> Self {
        Self {
            version,
            data: spin::Mutex::new(words),
        }
    }

    /// A copy of all three vectors, taken under the lock.
    #[inline]
    pub(crate) fn snapshot(&self) -> Words {
        *self.data.lock()
    }

    /// A copy of one vector, taken under the lock.
    pub(crate) fn flat(&self, flag: Flag) -> [u32; CAP_U32S] {
        let data = self.data.lock();
        let mut out = [0; CAP_U32S];
        for (o, word) in out.iter_mut().zip(data.iter()) {
            *o = word.flat(flag.index());
        }
        out
    }

    /// The kernel capability ABI version this set was created for.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Check whether `value` is raised in the given vector.
    ///
    /// Fails with `EINVAL` if `value` is not below [`max_bits()`](../fn.max_bits.html).
    pub fn get_flag(&self, value: u32, flag: Flag) -> crate::Result<bool> {
        if value >= max_bits() {
            return Err(crate::Error::einval());
        }

        let data = self.data.lock();
        let word = data[(value / 32) as usize].flat(flag.index());
        Ok(word & (1 << (value % 32)) != 0)
    }

    /// Raise (or lower) every value in `values` in the given vector.
    ///
    /// Values that are not below `max_bits()` are skipped.
    pub fn set_flags<I: IntoIterator<Item = u32>>(
        &self,
        flag: Flag,
        values: I,
        raise: bool,
    ) -> crate::Result<()> {
        let bits = max_bits();
        let mut data = self.data.lock();

        for value in values {
            if value >= bits {
                log::debug!("weird capability ({}) - skipped", value);
                continue;
            }

            let word = data[(value / 32) as usize].flat_mut(flag.index());
            if raise {
                *word |= 1 << (value % 32);
            } else {
                *word &= !(1 << (value % 32));
            }
        }

        Ok(())
    }

    /// Raise (or lower) a single value in the given vector.
    ///
    /// Unlike [`set_flags()`](#method.set_flags), an out-of-range value is an error (`EINVAL`).
    pub fn set_flag(&self, flag: Flag, value: u32, raise: bool) -> crate::Result<()> {
        if value >= max_bits() {
            return Err(crate::Error::einval());
        }

        self.set_flags(flag, core::iter::once(value), raise)
    }

    /// Lower every value in every vector.
    pub fn clear(&self) {
        self.data.lock().zeroize();
    }

    /// Lower every value in one vector.
    pub fn clear_flag(&self, flag: Flag) {
        for word in self.data.lock().iter_mut() {
            *word.flat_mut(flag.index()) = 0;
        }
    }

    /// Report which vectors differ between `self` and `other`.
    ///
    /// An empty result means the two sets are identical.
    pub fn compare(&self, other: &CapSet) -> Flags {
        // Copy `other` first so that only one lock is ever held at a time (`other` may be `self`).
        let theirs = other.snapshot();
        let ours = self.data.lock();

        let mut result = Flags::empty();
        for (a, b) in ours.iter().zip(theirs.iter()) {
            for flag in Flag::ALL.iter() {
                if a.flat(flag.index()) != b.flat(flag.index()) {
                    result |= flag.mask();
                }
            }
        }
        result
    }

    /// Overwrite vector `to` of this set with vector `from` of `src`.
    ///
    /// `src` may be `self`.
    pub fn fill(&self, to: Flag, src: &CapSet, from: Flag) {
        let words = src.flat(from);

        let mut data = self.data.lock();
        for (word, value) in data.iter_mut().zip(words.iter()) {
            *word.flat_mut(to.index()) = *value;
        }
    }

    /// Overwrite vector `to` of this set with its own vector `from`.
    #[inline]
    pub fn fill_within(&self, to: Flag, from: Flag) {
        self.fill(to, self, from)
    }

    /// Whether every vector is cleared.
    pub fn is_empty(&self) -> bool {
        self.data.lock().iter().all(|word| word.union() == 0)
    }

    /// Get the capability state of the current thread.
    #[inline]
    pub fn get_proc() -> crate::Result<Self> {
        Self::get_pid(0)
    }

    /// Like [`get_proc()`](#method.get_proc), but using the given provider.
    #[inline]
    pub fn get_proc_via(sys: &dyn Syscalls) -> crate::Result<Self> {
        Self::get_pid_via(sys, 0)
    }

    /// Get the capability state of the process (or thread) with the given PID (or TID).
    ///
    /// If `pid` is 0, this gets the capability state of the current thread.
    #[inline]
    pub fn get_pid(pid: libc::pid_t) -> crate::Result<Self> {
        Self::get_pid_via(&*syscall::current(), pid)
    }

    /// Like [`get_pid()`](#method.get_pid), but using the given provider.
    pub fn get_pid_via(sys: &dyn Syscalls, pid: libc::pid_t) -> crate::Result<Self> {
        let version = kernel_version();
        let mut header = cap_user_header_t {
            version,
            pid: pid as libc::c_int,
        };
        let mut words = Words::default();

        let res = sys.syscall3(
            libc::SYS_capget,
            &mut header as *mut _ as libc::c_long,
            words.as_mut_ptr() as libc::c_long,
            0,
        );
        if res < 0 {
            return Err(crate::Error::from_code(-res as i32));
        }

        Ok(Self::from_words(version, words))
    }

    /// Apply this set to the current thread.
    #[inline]
    pub fn set_proc(&self) -> crate::Result<()> {
        self.set_proc_via(&*syscall::current())
    }

    /// Like [`set_proc()`](#method.set_proc), but using the given provider.
    pub fn set_proc_via(&self, sys: &dyn Syscalls) -> crate::Result<()> {
        let mut header = cap_user_header_t {
            version: self.version,
            pid: 0,
        };
        // The lock is not held across the system call
        let mut words = self.snapshot();

        let res = sys.syscall3(
            libc::SYS_capset,
            &mut header as *mut _ as libc::c_long,
            words.as_ptr() as libc::c_long,
            0,
        );
        words.zeroize();

        if res < 0 {
            return Err(crate::Error::from_code(-res as i32));
        }
        Ok(())
    }
}

impl Clone for CapSet {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_words(self.version, self.snapshot())
    }
}

impl Default for CapSet {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for CapSet {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.compare(other).is_empty()
    }
}

impl Eq for CapSet {}

impl fmt::Debug for CapSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("CapSet").field(&self.to_string()).finish()
    }
}

impl Drop for CapSet {
    fn drop(&mut self) {
        self.data.get_mut().zeroize();
    }
}
