use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Represents an error encountered when performing an operation.
///
/// Errors are identified by an `errno` code: `EINVAL` for bad arguments (out-of-range
/// capability values, malformed text, truncated binary records), `ENOMEM` for allocation
/// failures, and otherwise whatever the kernel reported for a failed system call.
///
/// Note: Parsing errors (i.e. errors returned by `FromStr` implementations) have their own types;
/// for example [`ParseCapError`] and [`ParseTextError`]. Both convert into an `EINVAL` `Error`.
///
/// [`ParseCapError`]: ./caps/struct.ParseCapError.html
/// [`ParseTextError`]: ./caps/struct.ParseTextError.html
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct Error(i32);

impl Error {
    /// Get the last OS error that occured (i.e. the current `errno` value).
    #[inline]
    pub fn last() -> Self {
        Self(unsafe { *libc::__errno_location() })
    }

    /// Construct an `Error` from an `errno` code.
    #[inline]
    pub fn from_code(eno: i32) -> Self {
        Self(eno)
    }

    /// Get the `errno` code represented by this `Error` object.
    #[inline]
    pub fn code(&self) -> i32 {
        self.0
    }

    /// Whether this error reports an invalid argument (`EINVAL`).
    #[inline]
    pub fn is_invalid_argument(&self) -> bool {
        self.0 == libc::EINVAL
    }

    #[inline]
    pub(crate) fn einval() -> Self {
        Self(libc::EINVAL)
    }

    #[inline]
    pub(crate) fn enomem() -> Self {
        Self(libc::ENOMEM)
    }

    fn strerror(&self) -> &'static str {
        let msg = unsafe { libc::strerror(self.0) };
        if msg.is_null() {
            return "Unknown error";
        }

        unsafe { std::ffi::CStr::from_ptr(msg) }
            .to_str()
            .unwrap_or("Unknown error")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.strerror())?;
        write!(f, " (code {})", self.0)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Error")
            .field("code", &self.0)
            .field("message", &self.strerror())
            .finish()
    }
}

impl std::error::Error for Error {}

impl From<Error> for std::io::Error {
    #[inline]
    fn from(e: Error) -> Self {
        Self::from_raw_os_error(e.0)
    }
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(e: std::io::Error) -> Self {
        Self(e.raw_os_error().unwrap_or(libc::EIO))
    }
}
