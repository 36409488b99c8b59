use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use super::{max_bits, valid_mask};
use crate::constants::CAP_U32S;

// `None` means "/proc".
static PROC_ROOT: spin::RwLock<Option<PathBuf>> = spin::RwLock::new(None);

// Held by tests that change the proc root or read status files through it.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Read (and optionally replace) the directory this library treats as the root of the mounted
/// `/proc` filesystem.
///
/// If `root` is `Some`, it becomes the new root. The previous override is returned either way;
/// `None` means the default (`/proc`) was in effect.
///
/// This is a process-wide setting. Changing it while other threads are reading process status
/// files through this library gives unspecified (but memory safe) results, so callers must
/// serialize changes against those reads themselves.
pub fn proc_root(root: Option<&Path>) -> Option<PathBuf> {
    match root {
        Some(root) => {
            log::trace!("proc root set to {}", root.display());
            PROC_ROOT.write().replace(root.to_path_buf())
        }
        None => PROC_ROOT.read().clone(),
    }
}

fn status_path(pid: libc::pid_t) -> PathBuf {
    let root = PROC_ROOT.read();
    root.as_deref()
        .unwrap_or_else(|| Path::new("/proc"))
        .join(pid.to_string())
        .join("status")
}

/// The inheritable, ambient and not-bounding vectors reported in a process status file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct StatusVectors {
    pub inh: [u32; CAP_U32S],
    pub amb: [u32; CAP_U32S],
    pub nb: [u32; CAP_U32S],
}

// Exactly eight hex digits.
fn parse_hex32(s: &[u8]) -> u32 {
    let mut val = 0u32;
    for ch in s {
        let digit = match (*ch as char).to_digit(16) {
            Some(digit) => digit,
            None => return 0,
        };
        val = (val << 4) | digit;
    }
    val
}

/// Parse one `Cap*:` hex dump into words, most significant word first in the text.
///
/// Bits beyond `max_bits` are dropped. Returns `None` if the dump is longer than the words this
/// library holds.
fn parse_vec(s: &str, invert: bool, max_bits: u32) -> Option<[u32; CAP_U32S]> {
    let s = s.trim_end().as_bytes();
    let words = s.len() / 8;
    if words > CAP_U32S {
        return None;
    }

    let mut vals = [0; CAP_U32S];
    for (i, val) in vals.iter_mut().enumerate().take(words) {
        let start = 8 * (words - 1 - i);
        let mut word = parse_hex32(&s[start..start + 8]);
        if invert {
            word = !word;
        }
        *val = word & valid_mask(i, max_bits);
    }
    Some(vals)
}

/// Extract the IAB vectors from the contents of a status file.
///
/// All three of `CapInh`, `CapAmb` and `CapBnd` must be present.
pub(crate) fn parse_status<R: BufRead>(
    mut reader: R,
    max_bits: u32,
) -> crate::Result<StatusVectors> {
    let mut res = StatusVectors::default();
    let (mut inh, mut amb, mut bnd) = (false, false, false);

    let mut line = String::new();
    while reader.read_line(&mut line)? > 0 {
        if let Some(rest) = line.strip_prefix("Cap") {
            let (dest, seen, invert) = if let Some(val) = rest.strip_prefix("Inh:\t") {
                (val, &mut inh, false)
            } else if let Some(val) = rest.strip_prefix("Amb:\t") {
                (val, &mut amb, false)
            } else if let Some(val) = rest.strip_prefix("Bnd:\t") {
                (val, &mut bnd, true)
            } else {
                line.clear();
                continue;
            };

            if let Some(vals) = parse_vec(dest, invert, max_bits) {
                *seen = true;
                match &rest[..3] {
                    "Inh" => res.inh = vals,
                    "Amb" => res.amb = vals,
                    _ => res.nb = vals,
                }
            }
        }

        line.clear();
    }

    if inh && amb && bnd {
        Ok(res)
    } else {
        log::debug!("incomplete capability status");
        Err(crate::Error::einval())
    }
}

/// Read the IAB vectors of the process (or thread) with the given PID (or TID) from its status
/// file under the current proc root.
///
/// A `pid` of 0 means the calling thread.
pub(crate) fn read_status(mut pid: libc::pid_t) -> crate::Result<StatusVectors> {
    match pid.cmp(&0) {
        std::cmp::Ordering::Less => return Err(crate::Error::einval()),
        std::cmp::Ordering::Equal => {
            pid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::pid_t
        }
        std::cmp::Ordering::Greater => (),
    }

    let f = match fs::File::open(status_path(pid)) {
        Ok(f) => f,
        Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {
            return Err(crate::Error::from_code(libc::ESRCH))
        }
        Err(e) => return Err(e.into()),
    };

    parse_status(io::BufReader::new(f), max_bits())
}
