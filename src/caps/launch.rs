use core::fmt;

use zeroize::Zeroize;

use super::Iab;
use crate::object::CapString;

/// A setup function run in the child before the target program is executed (or instead of it,
/// for a launcher built with [`Launcher::with_callback()`]).
///
/// A non-zero return value aborts the launch.
pub type LaunchCallback = Box<dyn FnMut() -> i32 + Send>;

/// Describes how a program should be launched: what to run and which privilege changes to make
/// on the way.
///
/// This type only records the description. It owns its [`Iab`] and chroot path and scrubs them
/// when it is released.
#[derive(Default)]
pub struct Launcher {
    arg0: Option<CapString>,
    argv: Vec<String>,
    envp: Vec<String>,
    callback: Option<LaunchCallback>,
    chroot: Option<CapString>,
    uid: Option<libc::uid_t>,
    gid: Option<libc::gid_t>,
    groups: Vec<libc::gid_t>,
    iab: Option<Iab>,
}

impl Launcher {
    /// Create a launcher that runs `arg0` with the given arguments and environment, making no
    /// privilege changes.
    pub fn new<A, E>(arg0: &str, argv: A, envp: E) -> crate::Result<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let mut launcher = Self::default();
        launcher.arg0 = Some(CapString::new(arg0)?);
        launcher.argv = argv.into_iter().map(Into::into).collect();
        launcher.envp = envp.into_iter().map(Into::into).collect();
        Ok(launcher)
    }

    /// Create a launcher that runs `callback` in the child instead of executing a program.
    pub fn with_callback(callback: LaunchCallback) -> Self {
        let mut launcher = Self::default();
        launcher.callback = Some(callback);
        launcher
    }

    #[inline]
    pub fn arg0(&self) -> Option<&str> {
        self.arg0.as_deref()
    }

    #[inline]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    #[inline]
    pub fn envp(&self) -> &[String] {
        &self.envp
    }

    /// Replace the setup callback, returning the old one.
    pub fn set_callback(&mut self, callback: Option<LaunchCallback>) -> Option<LaunchCallback> {
        core::mem::replace(&mut self.callback, callback)
    }

    #[inline]
    pub fn callback_mut(&mut self) -> Option<&mut LaunchCallback> {
        self.callback.as_mut()
    }

    /// Replace the IAB tuple to apply, returning the old one.
    pub fn set_iab(&mut self, iab: Option<Iab>) -> Option<Iab> {
        core::mem::replace(&mut self.iab, iab)
    }

    #[inline]
    pub fn iab(&self) -> Option<&Iab> {
        self.iab.as_ref()
    }

    /// Set the directory to chroot into.
    pub fn set_chroot(&mut self, path: &str) -> crate::Result<()> {
        self.chroot = Some(CapString::new(path)?);
        Ok(())
    }

    #[inline]
    pub fn chroot(&self) -> Option<&str> {
        self.chroot.as_deref()
    }

    #[inline]
    pub fn set_uid(&mut self, uid: libc::uid_t) {
        self.uid = Some(uid);
    }

    #[inline]
    pub fn uid(&self) -> Option<libc::uid_t> {
        self.uid
    }

    /// Set the primary group and the supplementary group list.
    pub fn set_groups(&mut self, gid: libc::gid_t, groups: &[libc::gid_t]) -> crate::Result<()> {
        let mut list = Vec::new();
        list.try_reserve_exact(groups.len())
            .map_err(|_| crate::Error::enomem())?;
        list.extend_from_slice(groups);

        self.gid = Some(gid);
        self.groups = list;
        Ok(())
    }

    #[inline]
    pub fn gid(&self) -> Option<libc::gid_t> {
        self.gid
    }

    #[inline]
    pub fn groups(&self) -> &[libc::gid_t] {
        &self.groups
    }

    /// Release the owned IAB tuple and chroot path, then scrub everything else.
    pub(crate) fn release(mut self) -> crate::Result<()> {
        if let Some(iab) = self.iab.take() {
            crate::object::release(iab.into())?;
        }
        if let Some(chroot) = self.chroot.take() {
            crate::object::release(chroot.into())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Launcher")
            .field("arg0", &self.arg0())
            .field("argv", &self.argv)
            .field("envp", &self.envp)
            .field("callback", &self.callback.is_some())
            .field("chroot", &self.chroot())
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("groups", &self.groups)
            .field("iab", &self.iab)
            .finish()
    }
}

impl Drop for Launcher {
    fn drop(&mut self) {
        self.argv.zeroize();
        self.envp.zeroize();
        self.groups.zeroize();
        self.uid = None;
        self.gid = None;
    }
}
