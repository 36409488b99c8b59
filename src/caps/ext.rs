//! The portable binary form of a [`CapSet`].
//!
//! ```text
//! 90 c2 01 51 | L | e0 p0 i0 | e1 p1 i1 | ... | e(L-1) p(L-1) i(L-1)
//! ```
//!
//! Row `j` holds byte `j` (least significant first) of the effective, permitted and inheritable
//! vectors. Readers are expected to cope with a different `L` than the one they would write.

use super::capset::Words;
use super::{kernel_version, CapSet, Flag};
use crate::constants::{
    CAP_EXT_HEADER_SIZE, CAP_EXT_MAGIC, CAP_EXT_MAGIC_SIZE, CAP_EXT_MAX_SIZE, CAP_EXT_MIN_FLAG_SIZE,
    CAP_SET_SIZE, NUMBER_OF_CAP_SETS,
};

#[inline]
fn byte_of(words: &Words, flag: usize, j: usize) -> u8 {
    (words[j / 4].flat(flag) >> (8 * (j % 4))) as u8
}

/// The number of bytes per vector needed to hold every raised bit of `words`.
fn used_length(words: &Words) -> usize {
    let mut len = CAP_SET_SIZE;
    while len > CAP_EXT_MIN_FLAG_SIZE
        && (0..NUMBER_OF_CAP_SETS).all(|flag| byte_of(words, flag, len - 1) == 0)
    {
        len -= 1;
    }
    len
}

impl CapSet {
    /// The number of bytes [`to_ext()`](#method.to_ext) would produce for this set.
    pub fn ext_size(&self) -> usize {
        CAP_EXT_HEADER_SIZE + NUMBER_OF_CAP_SETS * used_length(&self.snapshot())
    }

    /// Encode this set in the portable binary form.
    pub fn to_ext(&self) -> Vec<u8> {
        let words = self.snapshot();
        let len = used_length(&words);

        let mut buf = Vec::with_capacity(CAP_EXT_MAX_SIZE);
        buf.extend_from_slice(&CAP_EXT_MAGIC);
        buf.push(len as u8);
        for j in 0..len {
            for flag in Flag::ALL.iter() {
                buf.push(byte_of(&words, flag.index(), j));
            }
        }
        buf
    }

    /// Encode this set into `buf`, returning the number of bytes written.
    ///
    /// Fails with `EINVAL` if `buf` is shorter than [`ext_size()`](#method.ext_size).
    pub fn copy_ext(&self, buf: &mut [u8]) -> crate::Result<usize> {
        let ext = self.to_ext();
        let dest = buf
            .get_mut(..ext.len())
            .ok_or_else(crate::Error::einval)?;
        dest.copy_from_slice(&ext);
        Ok(ext.len())
    }

    /// Decode a set from the portable binary form, trusting the embedded length.
    ///
    /// Bytes that the embedded length promises but `buf` does not contain read as zero. Use
    /// [`from_ext_checked()`](#method.from_ext_checked) for input that may be truncated.
    pub fn from_ext(buf: &[u8]) -> crate::Result<Self> {
        if buf.len() < CAP_EXT_HEADER_SIZE || buf[..CAP_EXT_MAGIC_SIZE] != CAP_EXT_MAGIC {
            log::debug!("invalid external capability set header");
            return Err(crate::Error::einval());
        }

        let blen = (buf[CAP_EXT_MAGIC_SIZE] as usize).min(CAP_SET_SIZE);
        let body = &buf[CAP_EXT_HEADER_SIZE..];

        let mut words = Words::default();
        for flag in Flag::ALL.iter() {
            for bno in 0..blen {
                let byte = body
                    .get(bno * NUMBER_OF_CAP_SETS + flag.index())
                    .copied()
                    .unwrap_or(0);
                *words[bno / 4].flat_mut(flag.index()) |= (byte as u32) << (8 * (bno % 4));
            }
        }

        Ok(Self::from_words(kernel_version(), words))
    }

    /// Decode a set from the portable binary form, rejecting input shorter than its embedded
    /// length says it is.
    pub fn from_ext_checked(buf: &[u8]) -> crate::Result<Self> {
        if buf.len() < CAP_EXT_HEADER_SIZE {
            return Err(crate::Error::einval());
        }

        let len = buf[CAP_EXT_MAGIC_SIZE] as usize;
        if buf.len() < CAP_EXT_HEADER_SIZE + len * NUMBER_OF_CAP_SETS {
            log::debug!(
                "external capability set truncated: {} bytes, length byte {}",
                buf.len(),
                len
            );
            return Err(crate::Error::einval());
        }

        Self::from_ext(buf)
    }
}
