use core::fmt;

use zeroize::Zeroize;

use super::{
    ambient, bounding, max_bits, probe_max_bits, valid_mask, CapSet, Flag, IabFlags, IabVector,
};
use crate::constants::CAP_U32S;
use crate::syscall::{self, Syscalls};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Zeroize)]
pub(crate) struct IabData {
    pub i: [u32; CAP_U32S],
    pub a: [u32; CAP_U32S],
    pub nb: [u32; CAP_U32S],
}

impl IabData {
    #[inline]
    fn vector(&self, vec: IabVector) -> &[u32; CAP_U32S] {
        match vec {
            IabVector::Inheritable => &self.i,
            IabVector::Ambient => &self.a,
            IabVector::Bound => &self.nb,
        }
    }

    /// Raise or lower one value, keeping the ambient vector inside the inheritable one.
    pub(crate) fn set(&mut self, vec: IabVector, value: u32, raised: bool) {
        let o = (value / 32) as usize;
        let mask = 1u32 << (value % 32);
        let on = if raised { mask } else { 0 };

        match vec {
            IabVector::Inheritable => {
                self.i[o] = (self.i[o] & !mask) | on;
                self.a[o] &= self.i[o];
            }
            IabVector::Ambient => {
                self.a[o] = (self.a[o] & !mask) | on;
                self.i[o] |= self.a[o];
            }
            IabVector::Bound => {
                self.nb[o] = (self.nb[o] & !mask) | on;
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, vec: IabVector, value: u32) -> bool {
        self.vector(vec)[(value / 32) as usize] & (1 << (value % 32)) != 0
    }
}

/// The inheritable, ambient and bounding ("IAB") state that a launched program should inherit.
///
/// The bounding vector is stored inverted: a raised [`IabVector::Bound`] value means the
/// capability is (to be) *dropped* from the bounding set. Every mutator keeps the ambient vector
/// a subset of the inheritable one.
pub struct Iab {
    data: spin::Mutex<IabData>,
}

impl Iab {
    /// Create an `Iab` with every vector cleared (nothing inheritable or ambient, a full bounding
    /// set).
    #[inline]
    pub fn empty() -> Self {
        Self::from_data(IabData::default())
    }

    #[inline]
    pub(crate) fn from_data(data: IabData) -> Self {
        Self {
            data: spin::Mutex::new(data),
        }
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> IabData {
        *self.data.lock()
    }

    /// Check whether `value` is raised in the given vector.
    ///
    /// Fails with `EINVAL` if `value` is not below [`max_bits()`](../fn.max_bits.html).
    pub fn get_vector(&self, vec: IabVector, value: u32) -> crate::Result<bool> {
        if value >= max_bits() {
            return Err(crate::Error::einval());
        }

        Ok(self.data.lock().get(vec, value))
    }

    /// Raise or lower `value` in the given vector.
    ///
    /// Raising an ambient value also raises it in the inheritable vector, and lowering an
    /// inheritable value also lowers it in the ambient vector.
    pub fn set_vector(&self, vec: IabVector, value: u32, raised: bool) -> crate::Result<()> {
        if value >= max_bits() {
            return Err(crate::Error::einval());
        }

        self.data.lock().set(vec, value, raised);
        Ok(())
    }

    /// Overwrite one vector from vector `flag` of `set`.
    ///
    /// Filling [`IabVector::Bound`] stores the complement of the source vector: capabilities
    /// missing from `set` are marked to be dropped.
    pub fn fill(&self, vec: IabVector, set: &CapSet, flag: Flag) {
        let src = set.flat(flag);
        let bits = max_bits();

        let mut data = self.data.lock();
        for (o, flat) in src.iter().enumerate() {
            let mask = valid_mask(o, bits);
            match vec {
                IabVector::Inheritable => {
                    data.i[o] = flat & mask;
                    data.a[o] &= flat;
                }
                IabVector::Ambient => {
                    data.a[o] = flat & mask;
                    data.i[o] |= flat & mask;
                }
                IabVector::Bound => {
                    data.nb[o] = !flat & mask;
                }
            }
        }
    }

    /// Report which vectors differ between `self` and `other`.
    pub fn compare(&self, other: &Iab) -> IabFlags {
        let theirs = other.snapshot();
        let ours = self.data.lock();

        let mut result = IabFlags::empty();
        for vec in IabVector::ALL.iter() {
            if ours.vector(*vec) != theirs.vector(*vec) {
                result |= vec.mask();
            }
        }
        result
    }

    /// Whether every vector is cleared.
    pub fn is_empty(&self) -> bool {
        let data = self.data.lock();
        IabVector::ALL
            .iter()
            .all(|vec| data.vector(*vec).iter().all(|word| *word == 0))
    }

    /// Get the IAB state of the current thread.
    #[inline]
    pub fn get_proc() -> crate::Result<Self> {
        Self::get_proc_via(&*syscall::current())
    }

    /// Like [`get_proc()`](#method.get_proc), but using the given provider.
    pub fn get_proc_via(sys: &dyn Syscalls) -> crate::Result<Self> {
        let current = CapSet::get_proc_via(sys)?;
        // Only ask `sys` about the values it knows
        let bits = probe_max_bits(sys).map_or_else(max_bits, |b| b.min(max_bits()));

        let mut data = IabData::default();
        for (o, flat) in current.flat(Flag::Inheritable).iter().enumerate() {
            data.i[o] = flat & valid_mask(o, bits);
        }

        for c in 0..bits {
            if !matches!(bounding::read_via(sys, c), Ok(true)) {
                data.set(IabVector::Bound, c, true);
            }
            if ambient::is_set_via(sys, c) == Some(true) {
                data.set(IabVector::Ambient, c, true);
            }
        }

        Ok(Self::from_data(data))
    }

    /// Get the IAB state of the process (or thread) with the given PID (or TID).
    ///
    /// The kernel has no system call for this, so it is parsed out of the `status` file under
    /// the current [`proc_root()`](../fn.proc_root.html). If `pid` is 0, the calling thread's
    /// file is used.
    pub fn get_pid(pid: libc::pid_t) -> crate::Result<Self> {
        let vecs = super::proc::read_status(pid)?;

        let mut data = IabData {
            i: vecs.inh,
            a: vecs.amb,
            nb: vecs.nb,
        };
        for (a, i) in data.a.iter_mut().zip(data.i.iter()) {
            *a &= *i;
        }

        Ok(Self::from_data(data))
    }
}

impl Clone for Iab {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_data(self.snapshot())
    }
}

impl Default for Iab {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Iab {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.compare(other).is_empty()
    }
}

impl Eq for Iab {}

impl fmt::Debug for Iab {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Iab").field(&self.to_string()).finish()
    }
}

impl Drop for Iab {
    fn drop(&mut self) {
        self.data.get_mut().zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::Cap;
    use crate::syscall::fake::FakeKernel;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_iab_empty() {
        let iab = Iab::empty();
        assert!(iab.is_empty());
        assert_eq!(iab, Iab::default());
        for vec in IabVector::ALL.iter() {
            assert!(!iab.get_vector(*vec, Cap::CHOWN as u32).unwrap());
        }
    }

    #[test]
    fn test_iab_ambient_subset() {
        let iab = Iab::empty();

        iab.set_vector(IabVector::Ambient, Cap::NET_RAW as u32, true)
            .unwrap();
        assert!(iab
            .get_vector(IabVector::Inheritable, Cap::NET_RAW as u32)
            .unwrap());
        assert!(iab.get_vector(IabVector::Ambient, Cap::NET_RAW as u32).unwrap());

        iab.set_vector(IabVector::Inheritable, Cap::NET_RAW as u32, false)
            .unwrap();
        assert!(!iab.get_vector(IabVector::Ambient, Cap::NET_RAW as u32).unwrap());
        assert!(iab.is_empty());

        // Lowering ambient leaves inheritable alone
        iab.set_vector(IabVector::Ambient, 33, true).unwrap();
        iab.set_vector(IabVector::Ambient, 33, false).unwrap();
        assert!(iab.get_vector(IabVector::Inheritable, 33).unwrap());
        assert!(!iab.get_vector(IabVector::Ambient, 33).unwrap());
    }

    #[test]
    fn test_iab_bound_independent() {
        let iab = Iab::empty();
        iab.set_vector(IabVector::Bound, Cap::SYS_ADMIN as u32, true)
            .unwrap();
        assert!(iab.get_vector(IabVector::Bound, Cap::SYS_ADMIN as u32).unwrap());
        assert!(!iab
            .get_vector(IabVector::Inheritable, Cap::SYS_ADMIN as u32)
            .unwrap());
        assert_eq!(iab.compare(&Iab::empty()), IabFlags::NOT_BOUNDING);
    }

    #[test]
    fn test_iab_out_of_range() {
        let iab = Iab::empty();
        let bits = max_bits();
        assert_eq!(
            iab.get_vector(IabVector::Ambient, bits).unwrap_err().code(),
            libc::EINVAL
        );
        assert_eq!(
            iab.set_vector(IabVector::Bound, bits, true)
                .unwrap_err()
                .code(),
            libc::EINVAL
        );
    }

    #[test]
    fn test_iab_fill() {
        let set = CapSet::empty();
        set.set_flags(Flag::Permitted, vec![1, 2, 3], true).unwrap();
        set.set_flags(Flag::Inheritable, vec![2], true).unwrap();

        let iab = Iab::empty();
        iab.fill(IabVector::Ambient, &set, Flag::Permitted);
        for c in 1..=3 {
            assert!(iab.get_vector(IabVector::Ambient, c).unwrap());
            assert!(iab.get_vector(IabVector::Inheritable, c).unwrap());
        }

        // Narrowing inheritable narrows ambient too
        iab.fill(IabVector::Inheritable, &set, Flag::Inheritable);
        assert!(iab.get_vector(IabVector::Ambient, 2).unwrap());
        assert!(!iab.get_vector(IabVector::Ambient, 1).unwrap());
        assert!(!iab.get_vector(IabVector::Inheritable, 3).unwrap());

        iab.fill(IabVector::Bound, &set, Flag::Permitted);
        assert!(!iab.get_vector(IabVector::Bound, 2).unwrap());
        assert!(iab.get_vector(IabVector::Bound, 0).unwrap());
        assert!(iab.get_vector(IabVector::Bound, max_bits() - 1).unwrap());

        // Nothing beyond the supported range is marked
        let data = iab.snapshot();
        let bits = max_bits();
        for (o, word) in data.nb.iter().enumerate() {
            assert_eq!(word & !valid_mask(o, bits), 0);
        }
    }

    #[test]
    fn test_iab_compare() {
        let a = Iab::empty();
        let b = Iab::empty();
        assert_eq!(a.compare(&b), IabFlags::empty());

        b.set_vector(IabVector::Ambient, 4, true).unwrap();
        assert_eq!(
            a.compare(&b),
            IabFlags::INHERITABLE | IabFlags::AMBIENT
        );

        let c = b.clone();
        assert_eq!(b, c);
        assert_eq!(c.compare(&c), IabFlags::empty());
    }

    #[test]
    fn test_iab_get_proc_via() {
        let kernel = FakeKernel::new(41);
        {
            let mut st = kernel.state.lock();
            st.caps[0].inheritable = (1 << 5) | (1 << 7);
            st.ambient = 1 << 7;
            st.bounding &= !(1 << 21);
        }

        let iab = Iab::get_proc_via(&kernel).unwrap();
        assert!(iab.get_vector(IabVector::Inheritable, 5).unwrap());
        assert!(iab.get_vector(IabVector::Ambient, 7).unwrap());
        assert!(!iab.get_vector(IabVector::Ambient, 5).unwrap());
        assert!(iab.get_vector(IabVector::Bound, 21).unwrap());
        assert!(!iab.get_vector(IabVector::Bound, 20).unwrap());

        let kernel = FakeKernel::failing(libc::EPERM);
        assert_eq!(Iab::get_proc_via(&kernel).unwrap_err().code(), libc::EPERM);
    }

    #[test]
    fn test_iab_get_proc_via_fewer_bits() {
        // A provider that knows fewer capabilities than the running kernel
        let kernel = FakeKernel::new(20);
        {
            let mut st = kernel.state.lock();
            st.caps[0].inheritable = (1 << 3) | (1 << 30);
            st.bounding &= !(1 << 10);
        }

        let iab = Iab::get_proc_via(&kernel).unwrap();
        assert!(iab.get_vector(IabVector::Inheritable, 3).unwrap());
        assert!(!iab.get_vector(IabVector::Inheritable, 30).unwrap());
        assert!(iab.get_vector(IabVector::Bound, 10).unwrap());
        assert!(!iab.get_vector(IabVector::Bound, 19).unwrap());
        // Values past the provider's range are not reported as dropped
        assert!(!iab.get_vector(IabVector::Bound, 25).unwrap());
        assert!(!iab.get_vector(IabVector::Bound, 31).unwrap());
    }

    #[test]
    fn test_iab_compare_threads() {
        let a = Arc::new(Iab::from_text("cap_chown,^cap_kill").unwrap());
        let b = Arc::new(Iab::from_text("!cap_sys_time").unwrap());

        let handles: Vec<_> = vec![(a.clone(), b.clone()), (b.clone(), a.clone())]
            .into_iter()
            .map(|(x, y)| {
                thread::spawn(move || {
                    for _ in 0..5000 {
                        assert_eq!(x.compare(&y), IabFlags::all());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_iab_get_pid() {
        let _guard = crate::caps::proc::TEST_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let iab = Iab::get_pid(0).unwrap();
        let again = Iab::get_pid(std::process::id() as libc::pid_t).unwrap();
        assert_eq!(
            iab.compare(&again) & IabFlags::INHERITABLE,
            IabFlags::empty()
        );

        assert_eq!(
            Iab::get_pid(libc::pid_t::MAX).unwrap_err().code(),
            libc::ESRCH
        );
    }
}
