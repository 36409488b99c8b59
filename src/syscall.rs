//! The indirection every kernel-facing capability operation goes through.
//!
//! By default system calls are made directly, which only affects the calling thread. A program
//! that needs capability changes to apply to all of its threads (POSIX semantics) can install a
//! provider that broadcasts each call to every thread before returning.
//!
//! # Installation contract
//!
//! There is exactly one process-wide provider slot. It must be written before the process fans
//! out into threads that use this crate (typically at the top of `main()`, followed by
//! [`crate::init()`]). Replacing the provider while other threads are in the middle of a
//! capability operation is memory safe, but those operations may complete through either
//! provider.
//!
//! A provider must not call back into this crate's capability model.
//!
//! Kernel-facing call sites:
//!
//! - [`CapSet::get_proc()`](../caps/struct.CapSet.html#method.get_proc),
//!   [`CapSet::get_pid()`](../caps/struct.CapSet.html#method.get_pid) and
//!   [`CapSet::set_proc()`](../caps/struct.CapSet.html#method.set_proc)
//! - [`bounding`](../caps/bounding/index.html) reads and drops
//! - [`ambient`](../caps/ambient/index.html) reads, raises, lowers and clears

use std::sync::Arc;

use libc::c_long;

/// The "3 argument" system call shape.
pub type Syscall3Fn = fn(c_long, c_long, c_long, c_long) -> c_long;

/// The "6 argument" system call shape.
pub type Syscall6Fn = fn(c_long, c_long, c_long, c_long, c_long, c_long, c_long) -> c_long;

/// A provider of the two system call shapes used to read and change capability state.
///
/// Both methods follow the raw kernel convention: a non-negative return value is a success,
/// and a negative value is the negated `errno` code.
pub trait Syscalls: Send + Sync {
    fn syscall3(&self, nr: c_long, arg1: c_long, arg2: c_long, arg3: c_long) -> c_long;

    #[allow(clippy::too_many_arguments)]
    fn syscall6(
        &self,
        nr: c_long,
        arg1: c_long,
        arg2: c_long,
        arg3: c_long,
        arg4: c_long,
        arg5: c_long,
        arg6: c_long,
    ) -> c_long;
}

/// Makes system calls directly from the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct DirectSyscalls;

cfg_if::cfg_if! {
    if #[cfg(feature = "sc")] {
        impl Syscalls for DirectSyscalls {
            fn syscall3(&self, nr: c_long, arg1: c_long, arg2: c_long, arg3: c_long) -> c_long {
                unsafe {
                    sc::syscall3(nr as usize, arg1 as usize, arg2 as usize, arg3 as usize)
                        as isize as c_long
                }
            }

            fn syscall6(
                &self,
                nr: c_long,
                arg1: c_long,
                arg2: c_long,
                arg3: c_long,
                arg4: c_long,
                arg5: c_long,
                arg6: c_long,
            ) -> c_long {
                unsafe {
                    sc::syscall6(
                        nr as usize,
                        arg1 as usize,
                        arg2 as usize,
                        arg3 as usize,
                        arg4 as usize,
                        arg5 as usize,
                        arg6 as usize,
                    ) as isize as c_long
                }
            }
        }
    } else {
        #[inline]
        fn errno_result(res: c_long) -> c_long {
            if res < 0 {
                -(crate::Error::last().code() as c_long)
            } else {
                res
            }
        }

        impl Syscalls for DirectSyscalls {
            fn syscall3(&self, nr: c_long, arg1: c_long, arg2: c_long, arg3: c_long) -> c_long {
                errno_result(unsafe { libc::syscall(nr, arg1, arg2, arg3) })
            }

            fn syscall6(
                &self,
                nr: c_long,
                arg1: c_long,
                arg2: c_long,
                arg3: c_long,
                arg4: c_long,
                arg5: c_long,
                arg6: c_long,
            ) -> c_long {
                errno_result(unsafe { libc::syscall(nr, arg1, arg2, arg3, arg4, arg5, arg6) })
            }
        }
    }
}

/// A provider built from a pair of plain function pointers.
///
/// This is the shape a thread-synchronizing library usually exposes.
#[derive(Copy, Clone)]
pub struct FnSyscalls {
    pub syscall3: Syscall3Fn,
    pub syscall6: Syscall6Fn,
}

impl Syscalls for FnSyscalls {
    #[inline]
    fn syscall3(&self, nr: c_long, arg1: c_long, arg2: c_long, arg3: c_long) -> c_long {
        (self.syscall3)(nr, arg1, arg2, arg3)
    }

    #[inline]
    fn syscall6(
        &self,
        nr: c_long,
        arg1: c_long,
        arg2: c_long,
        arg3: c_long,
        arg4: c_long,
        arg5: c_long,
        arg6: c_long,
    ) -> c_long {
        (self.syscall6)(nr, arg1, arg2, arg3, arg4, arg5, arg6)
    }
}

// `None` means "use DirectSyscalls".
static PROVIDER: spin::RwLock<Option<Arc<dyn Syscalls>>> = spin::RwLock::new(None);

/// Replace the process-wide syscall provider.
///
/// See the [module documentation](index.html#installation-contract) for when this may be
/// called.
pub fn install(provider: Arc<dyn Syscalls>) {
    log::trace!("installing custom capability syscall provider");
    *PROVIDER.write() = Some(provider);
}

/// Replace both function-pointer slots of the process-wide syscall provider.
#[inline]
pub fn install_fns(syscall3: Syscall3Fn, syscall6: Syscall6Fn) {
    install(Arc::new(FnSyscalls { syscall3, syscall6 }));
}

/// Go back to making system calls directly.
pub fn restore_default() {
    log::trace!("restoring direct capability syscalls");
    *PROVIDER.write() = None;
}

/// Whether a provider other than [`DirectSyscalls`] is installed.
pub fn is_overridden() -> bool {
    PROVIDER.read().is_some()
}

/// Get the currently installed provider.
pub fn current() -> Arc<dyn Syscalls> {
    match PROVIDER.read().as_ref() {
        Some(provider) => Arc::clone(provider),
        None => Arc::new(DirectSyscalls),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use libc::{c_int, c_long};

    use super::Syscalls;
    use crate::constants::CAP_U32S;
    use crate::externs::cap_user_data_t;

    /// In-memory stand-in for the kernel's capability state of one thread.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct FakeState {
        pub caps: [cap_user_data_t; CAP_U32S],
        pub bounding: u64,
        pub ambient: u64,
        pub max_bits: u32,
        pub calls: Vec<c_long>,
        pub fail: Option<i32>,
    }

    pub(crate) struct FakeKernel {
        pub state: spin::Mutex<FakeState>,
    }

    impl FakeKernel {
        pub fn new(max_bits: u32) -> Self {
            Self {
                state: spin::Mutex::new(FakeState {
                    bounding: (1u64 << max_bits) - 1,
                    max_bits,
                    ..FakeState::default()
                }),
            }
        }

        pub fn failing(code: i32) -> Self {
            let kernel = Self::new(40);
            kernel.state.lock().fail = Some(code);
            kernel
        }

        fn supported(st: &FakeState, cap: c_long) -> bool {
            cap >= 0 && (cap as u32) < st.max_bits
        }
    }

    impl Syscalls for FakeKernel {
        fn syscall3(&self, nr: c_long, arg1: c_long, arg2: c_long, _arg3: c_long) -> c_long {
            let mut st = self.state.lock();
            st.calls.push(nr);
            if let Some(code) = st.fail {
                return -(code as c_long);
            }

            if nr == libc::SYS_capget {
                let data = arg2 as *mut cap_user_data_t;
                if !data.is_null() {
                    for (i, word) in st.caps.iter().enumerate() {
                        unsafe { *data.add(i) = *word };
                    }
                }
                0
            } else if nr == libc::SYS_capset {
                let data = arg2 as *const cap_user_data_t;
                for i in 0..CAP_U32S {
                    st.caps[i] = unsafe { *data.add(i) };
                }
                0
            } else if nr == libc::SYS_prctl {
                match arg1 as c_int {
                    libc::PR_CAPBSET_READ if Self::supported(&st, arg2) => {
                        ((st.bounding >> arg2) & 1) as c_long
                    }
                    libc::PR_CAPBSET_DROP if Self::supported(&st, arg2) => {
                        st.bounding &= !(1u64 << arg2);
                        0
                    }
                    _ => -(libc::EINVAL as c_long),
                }
            } else {
                -(libc::ENOSYS as c_long)
            }
        }

        fn syscall6(
            &self,
            nr: c_long,
            arg1: c_long,
            arg2: c_long,
            arg3: c_long,
            _arg4: c_long,
            _arg5: c_long,
            _arg6: c_long,
        ) -> c_long {
            let mut st = self.state.lock();
            st.calls.push(nr);
            if let Some(code) = st.fail {
                return -(code as c_long);
            }

            if nr != libc::SYS_prctl || arg1 as c_int != libc::PR_CAP_AMBIENT {
                return -(libc::EINVAL as c_long);
            }

            match arg2 as c_int {
                libc::PR_CAP_AMBIENT_CLEAR_ALL => {
                    st.ambient = 0;
                    0
                }
                _ if !Self::supported(&st, arg3) => -(libc::EINVAL as c_long),
                libc::PR_CAP_AMBIENT_IS_SET => ((st.ambient >> arg3) & 1) as c_long,
                libc::PR_CAP_AMBIENT_RAISE => {
                    st.ambient |= 1u64 << arg3;
                    0
                }
                libc::PR_CAP_AMBIENT_LOWER => {
                    st.ambient &= !(1u64 << arg3);
                    0
                }
                _ => -(libc::EINVAL as c_long),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_eperm3(_nr: c_long, _a1: c_long, _a2: c_long, _a3: c_long) -> c_long {
        -(libc::EPERM as c_long)
    }

    fn always_zero6(
        _nr: c_long,
        _a1: c_long,
        _a2: c_long,
        _a3: c_long,
        _a4: c_long,
        _a5: c_long,
        _a6: c_long,
    ) -> c_long {
        0
    }

    #[test]
    fn test_fn_syscalls() {
        let sys = FnSyscalls {
            syscall3: always_eperm3,
            syscall6: always_zero6,
        };

        assert_eq!(sys.syscall3(0, 0, 0, 0), -(libc::EPERM as c_long));
        assert_eq!(sys.syscall6(0, 0, 0, 0, 0, 0, 0), 0);
    }

    #[test]
    fn test_direct_errno() {
        // PR_CAPBSET_READ on a capability that can never exist
        let res = DirectSyscalls.syscall3(
            libc::SYS_prctl,
            libc::PR_CAPBSET_READ as c_long,
            c_long::from(i32::MAX),
            0,
        );
        assert_eq!(res, -(libc::EINVAL as c_long));
    }

    #[test]
    fn test_direct_success() {
        let res = DirectSyscalls.syscall3(
            libc::SYS_prctl,
            libc::PR_CAPBSET_READ as c_long,
            0,
            0,
        );
        assert!(res == 0 || res == 1);
    }

    #[test]
    fn test_fake_kernel() {
        let kernel = fake::FakeKernel::new(38);

        assert_eq!(
            kernel.syscall3(libc::SYS_prctl, libc::PR_CAPBSET_READ as c_long, 37, 0),
            1
        );
        assert_eq!(
            kernel.syscall3(libc::SYS_prctl, libc::PR_CAPBSET_READ as c_long, 38, 0),
            -(libc::EINVAL as c_long)
        );
        assert_eq!(kernel.state.lock().calls.len(), 2);

        let kernel = fake::FakeKernel::failing(libc::EPERM);
        assert_eq!(
            kernel.syscall6(libc::SYS_prctl, libc::PR_CAP_AMBIENT as c_long, 0, 0, 0, 0, 0),
            -(libc::EPERM as c_long)
        );
    }
}
