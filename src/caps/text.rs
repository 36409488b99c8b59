//! The text forms of [`CapSet`] and [`Iab`], compatible with `libcap`.
//!
//! A capability set is written as whitespace-separated clauses, each naming some capabilities
//! (or, with no names, all of them), an operator and the vectors it applies to:
//!
//! ```text
//! cap_chown,cap_kill=ep cap_setuid+i
//! = cap_setfcap,cap_chown+iep cap_chown-i
//! all=p cap_sys_admin-p
//! ```
//!
//! An IAB tuple is a comma-separated list of names, each with optional prefixes: `!` (drop from
//! the bounding set), `^` (ambient, which implies inheritable) and `%` (inheritable):
//!
//! ```text
//! !cap_sys_admin,^cap_chown
//! ```

use core::fmt;
use core::str::FromStr;

use super::capset::Words;
use super::iab::IabData;
use super::{
    kernel_version, max_bits, valid_mask, version_u32s, CapSet, Flag, Flags, Iab, IabFlags,
    ParseCapError, CAPS_BY_NAME, NUM_CAPS,
};
use crate::constants::{CAP_MAXBITS, CAP_U32S};

/// Represents an error when parsing the text form of a [`CapSet`] or [`Iab`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseTextError {
    offset: usize,
}

impl ParseTextError {
    /// The byte offset in the input at which parsing failed.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParseTextError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid capability text at offset {}", self.offset)
    }
}

impl std::error::Error for ParseTextError {}

impl From<ParseTextError> for crate::Error {
    #[inline]
    fn from(_: ParseTextError) -> Self {
        Self::einval()
    }
}

#[inline]
fn is_space(c: u8) -> bool {
    c == b' ' || (b'\t'..=b'\r').contains(&c)
}

#[inline]
fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

struct Scanner<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            s: s.as_bytes(),
            pos: 0,
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, i: usize) -> Option<u8> {
        self.s.get(self.pos + i).copied()
    }

    #[inline]
    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    #[inline]
    fn rest(&self) -> &'a [u8] {
        &self.s[self.pos.min(self.s.len())..]
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(c) if is_space(c)) {
            self.pos += 1;
        }
    }

    fn error(&self) -> ParseTextError {
        ParseTextError { offset: self.pos }
    }

    fn error_at(&self, offset: usize) -> ParseTextError {
        ParseTextError { offset }
    }
}

/// Match `name` (lowercase) at the start of `s`, ignoring case. The match must end at a name
/// boundary. Returns the number of bytes matched.
fn namcmp(s: &[u8], name: &str) -> Option<usize> {
    let len = name.len();
    if s.len() < len || !s[..len].eq_ignore_ascii_case(name.as_bytes()) {
        return None;
    }

    match s.get(len) {
        Some(c) if is_name_char(*c) => None,
        _ => Some(len),
    }
}

/// Parse an unsigned number the way `strtoul(s, &end, 0)` does: `0x` for hex, a leading `0` for
/// octal, decimal otherwise. Anything that doesn't fit below `CAP_MAXBITS` is `None`.
fn scan_number(sc: &mut Scanner) -> Option<u32> {
    let radix = if sc.peek() == Some(b'0') {
        match (sc.peek_at(1), sc.peek_at(2)) {
            (Some(b'x'), Some(c)) | (Some(b'X'), Some(c)) if c.is_ascii_hexdigit() => {
                sc.pos += 2;
                16
            }
            _ => 8,
        }
    } else {
        10
    };

    let mut val: u32 = 0;
    while let Some(digit) = sc.peek().and_then(|c| (c as char).to_digit(radix)) {
        sc.pos += 1;
        val = val.saturating_mul(radix).saturating_add(digit);
    }

    if val < CAP_MAXBITS {
        Some(val)
    } else {
        None
    }
}

/// Read one capability (a name or a number) at the current position.
///
/// Only names of capabilities below `bits` are recognized; numbers only have to be below 64.
fn lookupname(sc: &mut Scanner, bits: u32) -> Option<u32> {
    match sc.peek() {
        Some(c) if c.is_ascii_digit() => scan_number(sc),
        Some(_) => {
            let n = bits.min(NUM_CAPS as u32) as usize;
            CAPS_BY_NAME[..n]
                .iter()
                .enumerate()
                .find_map(|(i, (name, _))| {
                    namcmp(sc.rest(), name).map(|len| (i as u32, len))
                })
                .map(|(i, len)| {
                    sc.pos += len;
                    i
                })
        }
        None => None,
    }
}

/// The name of a capability as used in the text forms: the lowercase name for a capability this
/// library knows, or the decimal number for anything else.
pub fn cap_to_name(cap: u32) -> String {
    match super::Cap::from_value(cap) {
        Some(cap) => cap.name().to_string(),
        None => cap.to_string(),
    }
}

/// Look up a capability by name (case-insensitively) or by number.
///
/// Names are only recognized for capabilities the running kernel supports; numbers may be
/// anything below 64. The whole string must be consumed.
pub fn cap_from_name(name: &str) -> Result<u32, ParseCapError> {
    let mut sc = Scanner::new(name);
    match lookupname(&mut sc, max_bits()) {
        Some(cap) if sc.peek().is_none() => Ok(cap),
        _ => Err(ParseCapError::new()),
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Op {
    Assign,
    Add,
    Remove,
    // `=+`
    AssignAdd,
    // `=-`
    AssignRemove,
}

fn forceall(list: &mut [u32; CAP_U32S], blks: usize, bits: u32) {
    for (n, word) in list.iter_mut().enumerate().take(blks) {
        *word = valid_mask(n, bits);
    }
}

fn apply(words: &mut Words, list: &[u32; CAP_U32S], blks: usize, op: Op, flags: Flags) {
    let clear = |words: &mut Words, flag: Flag| {
        for (word, mask) in words.iter_mut().zip(list.iter()).take(blks) {
            *word.flat_mut(flag.index()) &= !mask;
        }
    };
    let set = |words: &mut Words, flag: Flag| {
        for (word, mask) in words.iter_mut().zip(list.iter()).take(blks) {
            *word.flat_mut(flag.index()) |= mask;
        }
    };

    if matches!(op, Op::Assign | Op::AssignAdd | Op::AssignRemove) {
        for flag in Flag::ALL.iter() {
            clear(words, *flag);
        }
    }

    for flag in Flag::ALL.iter() {
        if flags.contains(flag.mask()) {
            match op {
                Op::Assign | Op::AssignAdd | Op::Add => set(words, *flag),
                Op::AssignRemove | Op::Remove => clear(words, *flag),
            }
        }
    }
}

fn parse_capset(text: &str) -> Result<CapSet, ParseTextError> {
    let version = kernel_version();
    let blks = version_u32s(version).unwrap_or(CAP_U32S);
    let bits = max_bits();

    let mut words = Words::default();
    let mut sc = Scanner::new(text);

    loop {
        let mut list = [0u32; CAP_U32S];
        let mut flags = Flags::empty();
        let mut listed = false;

        sc.skip_spaces();
        let c = match sc.peek() {
            Some(c) => c,
            None => return Ok(CapSet::from_words(version, words)),
        };

        // Which capabilities this clause is about
        if is_name_char(c) {
            loop {
                if let Some(len) = namcmp(sc.rest(), "all") {
                    sc.pos += len;
                    forceall(&mut list, blks, bits);
                } else {
                    let start = sc.pos;
                    let n = lookupname(&mut sc, bits).ok_or_else(|| sc.error_at(start))?;
                    list[(n / 32) as usize] |= 1 << (n % 32);
                }

                if sc.peek() != Some(b',') {
                    break;
                }
                sc.pos += 1;
                if !matches!(sc.peek(), Some(c) if is_name_char(c)) {
                    return Err(sc.error());
                }
            }
            listed = true;
        } else if c == b'+' || c == b'-' {
            // `+` and `-` need an explicit list
            return Err(sc.error());
        } else {
            forceall(&mut list, blks, bits);
        }

        let op_pos = sc.pos;
        let mut op = match sc.bump() {
            Some(b'=') => match sc.peek() {
                Some(c @ b'+') | Some(c @ b'-') => {
                    if !listed {
                        return Err(sc.error());
                    }
                    sc.pos += 1;
                    if c == b'+' {
                        Op::AssignAdd
                    } else {
                        Op::AssignRemove
                    }
                }
                _ => Op::Assign,
            },
            Some(b'+') => Op::Add,
            Some(b'-') => Op::Remove,
            _ => return Err(sc.error_at(op_pos)),
        };

        loop {
            match sc.peek() {
                Some(c) if !is_space(c) => {
                    flags |= match c {
                        b'e' => Flags::EFFECTIVE,
                        b'i' => Flags::INHERITABLE,
                        b'p' => Flags::PERMITTED,
                        _ => return Err(sc.error()),
                    };
                    sc.pos += 1;
                }
                // Only `=` may stand alone
                _ if op != Op::Assign => return Err(sc.error()),
                _ => (),
            }

            apply(&mut words, &list, blks, op, flags);

            if let Some(c @ b'+') | Some(c @ b'-') = sc.peek() {
                if !listed {
                    return Err(sc.error());
                }
                flags = Flags::empty();
                op = if c == b'+' { Op::Add } else { Op::Remove };
                sc.pos += 1;
                if !matches!(sc.peek(), Some(c) if c.is_ascii_alphabetic()) {
                    return Err(sc.error());
                }
            }

            if !matches!(sc.peek(), Some(c) if !is_space(c)) {
                break;
            }
        }
    }
}

// Which vectors `cap` is raised in, as a `Flags` bit pattern.
#[inline]
fn state_flags(words: &Words, cap: u32) -> usize {
    let word = &words[(cap / 32) as usize];
    let mask = 1 << (cap % 32);

    let mut f = Flags::empty();
    for flag in Flag::ALL.iter() {
        if word.flat(flag.index()) & mask != 0 {
            f |= flag.mask();
        }
    }
    f.bits() as usize
}

fn push_letters(buf: &mut String, pattern: usize) {
    let flags = Flags::from_bits_truncate(pattern as u32);
    if flags.contains(Flags::EFFECTIVE) {
        buf.push('e');
    }
    if flags.contains(Flags::INHERITABLE) {
        buf.push('i');
    }
    if flags.contains(Flags::PERMITTED) {
        buf.push('p');
    }
}

fn push_names<I: Iterator<Item = u32>>(buf: &mut String, caps: I) {
    buf.push(' ');
    for (i, cap) in caps.enumerate() {
        if i != 0 {
            buf.push(',');
        }
        buf.push_str(&cap_to_name(cap));
    }
}

fn capset_to_text(words: &Words, bits: u32) -> String {
    let bits = bits.min(CAP_MAXBITS);

    let mut histo = [0usize; 8];
    for n in 0..bits {
        histo[state_flags(words, n)] += 1;
    }

    // The most common pattern becomes the `=` prefix. Ties go to the lower pattern, so that an
    // all-clear vector wins when it can.
    let mut m = 7;
    for t in (0..7).rev() {
        if histo[t] >= histo[m] {
            m = t;
        }
    }

    let mut buf = String::from("=");
    push_letters(&mut buf, m);
    let mut start = 0;

    for t in (0..8).rev() {
        if t == m || histo[t] == 0 {
            continue;
        }
        push_names(&mut buf, (0..bits).filter(|n| state_flags(words, *n) == t));

        let raised = t & !m;
        if raised != 0 {
            let mut op = '+';
            if buf[start..].starts_with("= ") {
                // "= foo+e" is better written "foo=e"
                start += 2;
                op = '=';
            }
            buf.push(op);
            push_letters(&mut buf, raised);
        }

        let lowered = !t & m;
        if lowered != 0 {
            buf.push('-');
            push_letters(&mut buf, lowered);
        }
    }

    // Bits the kernel doesn't know about can only be raised
    let mut histo = [0usize; 8];
    for n in bits..CAP_MAXBITS {
        histo[state_flags(words, n)] += 1;
    }
    for t in (1..8).rev() {
        if histo[t] == 0 {
            continue;
        }
        buf.push(' ');
        let caps: Vec<String> = (bits..CAP_MAXBITS)
            .filter(|n| state_flags(words, *n) == t)
            .map(|n| n.to_string())
            .collect();
        buf.push_str(&caps.join(","));
        buf.push('+');
        push_letters(&mut buf, t);
    }

    buf.split_off(start)
}

impl CapSet {
    /// Parse the text form of a capability set.
    ///
    /// This is the same as `text.parse::<CapSet>()`, except that failures are reported as
    /// `EINVAL`.
    pub fn from_text(text: &str) -> crate::Result<Self> {
        Ok(text.parse()?)
    }

    /// Render this set in its canonical text form.
    pub fn to_text(&self) -> String {
        capset_to_text(&self.snapshot(), max_bits())
    }
}

impl FromStr for CapSet {
    type Err = ParseTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_capset(s).map_err(|e| {
            log::debug!("rejected capability text {:?} at offset {}", s, e.offset);
            e
        })
    }
}

impl fmt::Display for CapSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn parse_iab(text: &str) -> Result<Iab, ParseTextError> {
    let bits = max_bits();
    let mut data = IabData::default();
    let mut sc = Scanner::new(text);
    let mut flags = IabFlags::empty();

    while let Some(c) = sc.peek() {
        match c {
            b'!' => {
                flags |= IabFlags::NOT_BOUNDING;
                sc.pos += 1;
                continue;
            }
            b'^' => {
                flags |= IabFlags::INHERITABLE | IabFlags::AMBIENT;
                sc.pos += 1;
                continue;
            }
            b'%' => {
                flags |= IabFlags::INHERITABLE;
                sc.pos += 1;
                continue;
            }
            _ => (),
        }
        if flags.is_empty() {
            flags = IabFlags::INHERITABLE;
        }

        let start = sc.pos;
        let cap = lookupname(&mut sc, bits)
            .filter(|cap| *cap < bits)
            .ok_or_else(|| sc.error_at(start))?;

        let o = (cap / 32) as usize;
        let mask = 1u32 << (cap % 32);
        if flags.contains(IabFlags::INHERITABLE) {
            data.i[o] |= mask;
        }
        if flags.contains(IabFlags::AMBIENT) {
            data.a[o] |= mask;
        }
        if flags.contains(IabFlags::NOT_BOUNDING) {
            data.nb[o] |= mask;
        }

        match sc.peek() {
            None => break,
            Some(b',') => {
                sc.pos += 1;
                flags = IabFlags::empty();
            }
            Some(_) => return Err(sc.error()),
        }
    }

    Ok(Iab::from_data(data))
}

fn iab_to_text(data: &IabData, bits: u32) -> String {
    let mut buf = String::new();
    let mut first = true;

    for c in 0..bits.min(CAP_MAXBITS) {
        let ib = data.get(super::IabVector::Inheritable, c);
        let ab = data.get(super::IabVector::Ambient, c);
        let nbb = data.get(super::IabVector::Bound, c);
        if !(ib || ab || nbb) {
            continue;
        }

        if !first {
            buf.push(',');
        }
        let mut keep = false;
        if nbb {
            buf.push('!');
            keep = true;
        }
        if ab {
            buf.push('^');
            keep = true;
        } else if nbb && ib {
            buf.push('%');
        }
        if keep || ib {
            buf.push_str(&cap_to_name(c));
            first = false;
        }
    }

    buf
}

impl Iab {
    /// Parse the text form of an IAB tuple, reporting failures as `EINVAL`.
    pub fn from_text(text: &str) -> crate::Result<Self> {
        Ok(text.parse()?)
    }

    /// Render this tuple in its canonical text form.
    pub fn to_text(&self) -> String {
        iab_to_text(&self.snapshot(), max_bits())
    }
}

impl FromStr for Iab {
    type Err = ParseTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_iab(s).map_err(|e| {
            log::debug!("rejected IAB text {:?} at offset {}", s, e.offset);
            e
        })
    }
}

impl fmt::Display for Iab {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{CapSet, Iab};

    impl Serialize for CapSet {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.to_text().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for CapSet {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(serde::de::Error::custom)
        }
    }

    impl Serialize for Iab {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.to_text().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Iab {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::{Cap, IabVector};

    fn canon(text: &str) -> String {
        text.parse::<CapSet>().unwrap().to_string()
    }

    fn offset(text: &str) -> usize {
        text.parse::<CapSet>().unwrap_err().offset()
    }

    #[test]
    fn test_cap_names() {
        assert_eq!(cap_to_name(0), "cap_chown");
        assert_eq!(cap_to_name(Cap::SYS_ADMIN as u32), "cap_sys_admin");
        assert_eq!(cap_to_name(NUM_CAPS as u32), NUM_CAPS.to_string());
        assert_eq!(cap_to_name(63), "63");

        assert_eq!(cap_from_name("cap_kill"), Ok(5));
        assert_eq!(cap_from_name("CAP_KILL"), Ok(5));
        assert_eq!(cap_from_name("7"), Ok(7));
        assert_eq!(cap_from_name("0x10"), Ok(16));
        assert_eq!(cap_from_name("010"), Ok(8));
        assert_eq!(cap_from_name("63"), Ok(63));
        assert!(cap_from_name("64").is_err());
        assert!(cap_from_name("").is_err());
        assert!(cap_from_name("kill").is_err());
        assert!(cap_from_name("cap_kill,").is_err());
        assert!(cap_from_name("cap_killer").is_err());
    }

    #[test]
    fn test_scan_number() {
        let mut sc = Scanner::new("0x");
        assert_eq!(scan_number(&mut sc), Some(0));
        assert_eq!(sc.pos, 1);

        let mut sc = Scanner::new("09");
        assert_eq!(scan_number(&mut sc), Some(0));
        assert_eq!(sc.pos, 1);

        let mut sc = Scanner::new("99999999999999999999");
        assert_eq!(scan_number(&mut sc), None);
    }

    #[test]
    fn test_canonical_text() {
        assert_eq!(
            canon("cap_chown,cap_kill=ep cap_setuid+i"),
            "cap_setuid=i cap_chown,cap_kill+ep"
        );
        assert_eq!(
            canon("= cap_setfcap,cap_chown+iep cap_chown-i"),
            "cap_setfcap=eip cap_chown+ep"
        );
        assert_eq!(canon("cap_chown=p"), "cap_chown=p");
        assert_eq!(canon("cap_chown+e cap_chown+p"), "cap_chown=ep");
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(CapSet::empty().to_string(), "=");
        assert!("".parse::<CapSet>().unwrap().is_empty());
        assert!("   \t".parse::<CapSet>().unwrap().is_empty());
        assert!("=".parse::<CapSet>().unwrap().is_empty());
        assert_eq!(canon("="), "=");
    }

    #[test]
    fn test_all_text() {
        let set: CapSet = "all=ep".parse().unwrap();
        assert!(set.get_flag(0, Flag::Effective).unwrap());
        assert!(set.get_flag(max_bits() - 1, Flag::Permitted).unwrap());
        assert!(!set.get_flag(0, Flag::Inheritable).unwrap());
        assert_eq!(set.to_string(), "=ep");

        assert_eq!(canon("=ep"), "=ep");
        assert_eq!(canon("all=ep cap_chown-e"), "=ep cap_chown-e");
        assert_eq!(canon("=eip cap_kill-eip"), "=eip cap_kill-eip");
        assert_eq!(canon("ALL=i"), "=i");
    }

    #[test]
    fn test_assign_ops() {
        // `=+` and `=-` clear first
        assert_eq!(canon("cap_chown=eip cap_chown=+e"), "cap_chown=e");
        assert_eq!(canon("cap_chown=eip cap_chown=-e"), "=");
        // chained directives
        assert_eq!(canon("cap_chown=e+p-e"), "cap_chown=p");
        assert_eq!(canon("cap_chown+ei-e"), "cap_chown=i");
        assert_eq!(canon("cap_chown=ep cap_chown-p"), "cap_chown=e");
    }

    #[test]
    fn test_numbers_and_case() {
        assert_eq!(canon("0x5=e"), "cap_kill=e");
        assert_eq!(canon("010=e"), "cap_setpcap=e");
        assert_eq!(canon("5,CAP_CHOWN=e"), "cap_chown,cap_kill=e");
        assert_eq!(canon("Cap_Kill=p"), "cap_kill=p");
    }

    #[test]
    fn test_trailing_bits() {
        let bits = max_bits();
        if bits < CAP_MAXBITS {
            let set: CapSet = "63=e".parse().unwrap();
            assert_eq!(set.to_string(), "= 63+e");
            assert_eq!(canon("= 63+e"), "= 63+e");
        }
    }

    #[test]
    fn test_bad_text() {
        assert_eq!(offset("+e"), 0);
        assert_eq!(offset("-e"), 0);
        assert_eq!(offset("cap_chown"), 9);
        assert_eq!(offset("cap_chown=x"), 10);
        assert_eq!(offset("cap_chown=+"), 11);
        assert_eq!(offset("=+e"), 1);
        assert_eq!(offset("cap_chown,=e"), 10);
        assert_eq!(offset("cap_chown=e+"), 12);
        assert_eq!(offset("=e+p"), 2);
        assert_eq!(offset("cap_chownx=e"), 0);
        assert_eq!(offset("cap_chown=e cap_bogus=e"), 12);
        assert_eq!(offset("64=e"), 0);
        assert_eq!(offset("cap_chown+"), 10);
        assert_eq!(offset("cap_chown=e,"), 11);

        assert_eq!(
            CapSet::from_text("cap_chown=x").unwrap_err().code(),
            libc::EINVAL
        );
        assert_eq!(
            ParseTextError { offset: 3 }.to_string(),
            "Invalid capability text at offset 3"
        );
    }

    #[test]
    fn test_text_roundtrip() {
        for text in [
            "=",
            "cap_chown=e",
            "=ep cap_setuid-p",
            "cap_setuid=i cap_chown,cap_kill+ep",
            "cap_setfcap=eip cap_chown+ep",
            "=i cap_net_raw+ep",
        ]
        .iter()
        {
            assert_eq!(canon(text), *text);
            let set = CapSet::from_text(text).unwrap();
            assert_eq!(CapSet::from_text(&set.to_text()).unwrap(), set);
        }
    }

    #[test]
    fn test_fill_roundtrip() {
        let set = CapSet::from_text("cap_chown,cap_kill=p cap_setuid=i").unwrap();
        set.fill_within(Flag::Effective, Flag::Permitted);
        assert_eq!(set.to_string(), "cap_setuid=i cap_chown,cap_kill+ep");

        set.fill_within(Flag::Inheritable, Flag::Permitted);
        assert_eq!(set.to_string(), "cap_chown,cap_kill=eip");
        assert_eq!(CapSet::from_text(&set.to_string()).unwrap(), set);
    }

    #[test]
    fn test_iab_text() {
        let iab: Iab = "!cap_sys_admin,^cap_chown".parse().unwrap();
        assert!(iab.get_vector(IabVector::Bound, Cap::SYS_ADMIN as u32).unwrap());
        assert!(!iab
            .get_vector(IabVector::Inheritable, Cap::SYS_ADMIN as u32)
            .unwrap());
        assert!(iab.get_vector(IabVector::Ambient, Cap::CHOWN as u32).unwrap());
        assert!(iab
            .get_vector(IabVector::Inheritable, Cap::CHOWN as u32)
            .unwrap());
        assert_eq!(iab.to_string(), "^cap_chown,!cap_sys_admin");

        assert_eq!(Iab::empty().to_string(), "");
        assert!("".parse::<Iab>().unwrap().is_empty());

        let iab: Iab = "cap_kill,%cap_setuid,!%cap_net_raw,!^cap_sys_time"
            .parse()
            .unwrap();
        assert_eq!(
            iab.to_string(),
            "cap_kill,cap_setuid,!%cap_net_raw,!^cap_sys_time"
        );
        assert_eq!(iab.to_string().parse::<Iab>().unwrap(), iab);

        // A trailing comma is tolerated
        assert_eq!(
            "cap_kill,".parse::<Iab>().unwrap(),
            "cap_kill".parse::<Iab>().unwrap()
        );
        assert_eq!("5".parse::<Iab>().unwrap().to_string(), "cap_kill");
    }

    #[test]
    fn test_bad_iab_text() {
        assert_eq!("cap_bogus".parse::<Iab>().unwrap_err().offset(), 0);
        assert_eq!("cap_kill;".parse::<Iab>().unwrap_err().offset(), 8);
        assert_eq!("cap_kill,,".parse::<Iab>().unwrap_err().offset(), 9);
        assert_eq!("63".parse::<Iab>().is_err(), max_bits() <= 63);
        assert_eq!(
            Iab::from_text("!!x").unwrap_err().code(),
            libc::EINVAL
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() {
        use serde_test::{assert_de_tokens_error, assert_tokens, Token};

        let set = CapSet::from_text("cap_chown=ep").unwrap();
        assert_tokens(&set, &[Token::Str("cap_chown=ep")]);

        let iab = Iab::from_text("^cap_kill").unwrap();
        assert_tokens(&iab, &[Token::Str("^cap_kill")]);

        assert_de_tokens_error::<CapSet>(
            &[Token::Str("cap_chown=x")],
            "Invalid capability text at offset 10",
        );
    }
}
