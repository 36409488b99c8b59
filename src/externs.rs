#![allow(non_camel_case_types)]

use zeroize::Zeroize;

#[repr(C)]
pub struct cap_user_header_t {
    pub version: u32,
    pub pid: libc::c_int,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Zeroize)]
#[repr(C)]
pub struct cap_user_data_t {
    pub effective: u32,
    pub permitted: u32,
    pub inheritable: u32,
}

impl cap_user_data_t {
    /// Get the field for the vector with the given index (0 = effective, 1 = permitted,
    /// 2 = inheritable).
    #[inline]
    pub fn flat(&self, index: usize) -> u32 {
        match index {
            0 => self.effective,
            1 => self.permitted,
            _ => self.inheritable,
        }
    }

    #[inline]
    pub fn flat_mut(&mut self, index: usize) -> &mut u32 {
        match index {
            0 => &mut self.effective,
            1 => &mut self.permitted,
            _ => &mut self.inheritable,
        }
    }

    /// The union of all three vectors.
    #[inline]
    pub fn union(&self) -> u32 {
        self.effective | self.permitted | self.inheritable
    }
}
