// WARNING: Supporting a newer ABI version may change the number of 32-bit words per
// capability vector (CAP_U32S) and with it the wire format's 8-byte legacy floor.
pub const _LINUX_CAPABILITY_VERSION_1: u32 = 0x1998_0330;
pub const _LINUX_CAPABILITY_U32S_1: usize = 1;
pub const _LINUX_CAPABILITY_VERSION_2: u32 = 0x2007_1026;
pub const _LINUX_CAPABILITY_U32S_2: usize = 2;
pub const _LINUX_CAPABILITY_VERSION_3: u32 = 0x2008_0522;
pub const _LINUX_CAPABILITY_U32S_3: usize = 2;

// Words per vector in every in-memory capability object
pub const CAP_U32S: usize = _LINUX_CAPABILITY_U32S_3;
// Hard ceiling on capability values, whatever the kernel reports
pub const CAP_MAXBITS: u32 = (CAP_U32S * 32) as u32;

pub const NUMBER_OF_CAP_SETS: usize = 3;

// Exported capability sets
pub const CAP_EXT_MAGIC: [u8; 4] = [0x90, 0xc2, 0x01, 0x51];
pub const CAP_EXT_MAGIC_SIZE: usize = 4;
pub const CAP_EXT_HEADER_SIZE: usize = CAP_EXT_MAGIC_SIZE + 1;
pub const CAP_SET_SIZE: usize = CAP_U32S * 4;
// Older readers expect at least this many bytes per vector
pub const CAP_EXT_MIN_FLAG_SIZE: usize = if CAP_SET_SIZE < 8 { CAP_SET_SIZE } else { 8 };
pub const CAP_EXT_MAX_SIZE: usize = CAP_EXT_HEADER_SIZE + NUMBER_OF_CAP_SETS * CAP_SET_SIZE;

// Largest string CapString will hold
pub const CAP_STRING_MAX: usize = 0x3fff_ffff;
