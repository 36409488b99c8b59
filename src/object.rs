//! Uniform allocation and release for every kind of object this library hands out.
//!
//! Each capability object is an ordinary owned Rust value, so most programs never need this
//! module. It exists for callers that want to treat capability sets, IAB tuples, launchers and
//! strings as one handle type: allocate by kind, duplicate, check the kind before use and
//! release through a single function that scrubs the payload.

use core::fmt;
use core::ops::Deref;

use zeroize::Zeroize;

use crate::caps::{CapSet, Iab, Launcher};
use crate::constants::CAP_STRING_MAX;

/// The kinds of object that can be allocated.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum ObjectKind {
    CapSet,
    Iab,
    Launcher,
    String,
}

/// A string owned by this library, scrubbed when dropped.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct CapString(String);

impl CapString {
    /// Copy `s` into a new `CapString`.
    ///
    /// Fails with `EINVAL` if `s` is implausibly long, and with `ENOMEM` if the copy cannot be
    /// allocated.
    pub fn new(s: &str) -> crate::Result<Self> {
        if s.len() & CAP_STRING_MAX != s.len() {
            return Err(crate::Error::einval());
        }

        let mut buf = String::new();
        buf.try_reserve_exact(s.len())
            .map_err(|_| crate::Error::enomem())?;
        buf.push_str(s);
        Ok(Self(buf))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for CapString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CapString {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CapString {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CapString {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for CapString {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CapString {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl Drop for CapString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// One object of any [`ObjectKind`].
#[derive(Debug)]
pub enum Object {
    CapSet(CapSet),
    Iab(Iab),
    Launcher(Launcher),
    String(CapString),
}

impl Object {
    /// Allocate a cleared object of the given kind: an empty capability set or IAB tuple, a
    /// launcher with nothing to run, or an empty string.
    pub fn allocate(kind: ObjectKind) -> crate::Result<Self> {
        Ok(match kind {
            ObjectKind::CapSet => Self::CapSet(CapSet::empty()),
            ObjectKind::Iab => Self::Iab(Iab::empty()),
            ObjectKind::Launcher => Self::Launcher(Launcher::default()),
            ObjectKind::String => Self::String(CapString::new("")?),
        })
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::CapSet(_) => ObjectKind::CapSet,
            Self::Iab(_) => ObjectKind::Iab,
            Self::Launcher(_) => ObjectKind::Launcher,
            Self::String(_) => ObjectKind::String,
        }
    }

    /// Make an independent deep copy of this object.
    ///
    /// Launchers cannot be duplicated (`EINVAL`).
    pub fn duplicate(&self) -> crate::Result<Self> {
        match self {
            Self::CapSet(set) => Ok(Self::CapSet(set.clone())),
            Self::Iab(iab) => Ok(Self::Iab(iab.clone())),
            Self::Launcher(_) => Err(crate::Error::einval()),
            Self::String(s) => Ok(Self::String(CapString::new(s)?)),
        }
    }

    pub fn as_capset(&self) -> crate::Result<&CapSet> {
        match self {
            Self::CapSet(set) => Ok(set),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn as_iab(&self) -> crate::Result<&Iab> {
        match self {
            Self::Iab(iab) => Ok(iab),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn as_launcher(&self) -> crate::Result<&Launcher> {
        match self {
            Self::Launcher(launcher) => Ok(launcher),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn as_launcher_mut(&mut self) -> crate::Result<&mut Launcher> {
        match self {
            Self::Launcher(launcher) => Ok(launcher),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn as_str(&self) -> crate::Result<&str> {
        match self {
            Self::String(s) => Ok(s.as_str()),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn into_capset(self) -> crate::Result<CapSet> {
        match self {
            Self::CapSet(set) => Ok(set),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn into_iab(self) -> crate::Result<Iab> {
        match self {
            Self::Iab(iab) => Ok(iab),
            _ => Err(crate::Error::einval()),
        }
    }

    pub fn into_launcher(self) -> crate::Result<Launcher> {
        match self {
            Self::Launcher(launcher) => Ok(launcher),
            _ => Err(crate::Error::einval()),
        }
    }
}

impl From<CapSet> for Object {
    #[inline]
    fn from(set: CapSet) -> Self {
        Self::CapSet(set)
    }
}

impl From<Iab> for Object {
    #[inline]
    fn from(iab: Iab) -> Self {
        Self::Iab(iab)
    }
}

impl From<Launcher> for Object {
    #[inline]
    fn from(launcher: Launcher) -> Self {
        Self::Launcher(launcher)
    }
}

impl From<CapString> for Object {
    #[inline]
    fn from(s: CapString) -> Self {
        Self::String(s)
    }
}

/// Scrub and free an object.
///
/// A launcher's IAB tuple and chroot path are released first.
pub fn release(obj: Object) -> crate::Result<()> {
    log::trace!("releasing {:?} object", obj.kind());

    match obj {
        Object::Launcher(launcher) => launcher.release(),
        // Everything else scrubs itself when dropped
        _ => Ok(()),
    }
}
