use core::{fmt::Debug, mem::MaybeUninit, mem::size_of, ptr::addr_of_mut};

use crate::{Error, ReplaceErr};

/// Size of one cell in bytes.
pub const CELL: usize = size_of::<Word>();

// A union rather than an enum: nothing in a cell says what it holds, the
// slot it lives in does. A float and a pointer share the same 64 bits, and
// reinterpreting one as the other is free.
#[repr(C)]
#[derive(Copy, Clone)]
pub union Word {
    pub uval: u64,
    pub ival: i64,
    pub fval: f64,
    pub ptr: *mut (),
}

const _: () = assert!(size_of::<Word>() == 8);

// SAFETY: a Word is plain bits. The pointer view is only dereferenced by the
// heap natives, after checking it against the engine's live block registry.
unsafe impl Send for Word {}
unsafe impl Sync for Word {}

impl Debug for Word {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Word({:#018x})", self.as_u64())
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.as_u64() == other.as_u64()
    }
}

impl Eq for Word {}

impl Default for Word {
    fn default() -> Self {
        Word::uint(0)
    }
}

impl TryFrom<usize> for Word {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        let val = u64::try_from(value).replace_err(Error::InvalidAddress(Word::uint(u64::MAX)))?;
        Ok(Word::uint(val))
    }
}

impl TryFrom<Word> for usize {
    type Error = Error;

    fn try_from(word: Word) -> Result<Self, Self::Error> {
        usize::try_from(word.as_u64()).replace_err(Error::InvalidAddress(word))
    }
}

impl Word {
    #[inline]
    fn zeroed() -> MaybeUninit<Word> {
        MaybeUninit::zeroed()
    }

    /// A signed integer.
    #[inline]
    pub fn data(data: i64) -> Self {
        let mut mu_word = Self::zeroed();
        unsafe {
            addr_of_mut!((*mu_word.as_mut_ptr()).ival).write(data);
            mu_word.assume_init()
        }
    }

    /// An unsigned integer, also used for cell offsets and callback ids.
    #[inline]
    pub fn uint(uval: u64) -> Self {
        let mut mu_word = Self::zeroed();
        unsafe {
            addr_of_mut!((*mu_word.as_mut_ptr()).uval).write(uval);
            mu_word.assume_init()
        }
    }

    #[inline]
    pub fn float(f: f64) -> Self {
        let mut mu_word = Self::zeroed();
        unsafe {
            addr_of_mut!((*mu_word.as_mut_ptr()).fval).write(f);
            mu_word.assume_init()
        }
    }

    #[inline]
    pub fn ptr<T>(ptr: *mut T) -> Self {
        // Zeroing first keeps the upper half defined on 32-bit targets.
        let mut mu_word = Self::zeroed();
        unsafe {
            addr_of_mut!((*mu_word.as_mut_ptr()).ptr).write(ptr.cast());
            mu_word.assume_init()
        }
    }

    /// A cell offset into the arena.
    #[inline]
    pub fn cell(index: usize) -> Self {
        Word::uint(index as u64)
    }

    #[inline]
    pub fn flag(b: bool) -> Self {
        Word::data(if b { -1 } else { 0 })
    }

    // SAFETY (for all readers below): every constructor starts from a zeroed
    // word, so all eight bytes are always initialized, and every bit pattern
    // is a valid u64, i64, f64 or raw pointer.

    #[inline]
    pub fn as_u64(self) -> u64 {
        unsafe { self.uval }
    }

    #[inline]
    pub fn as_i64(self) -> i64 {
        unsafe { self.ival }
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        unsafe { self.fval }
    }

    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        unsafe { self.ptr.cast() }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.as_u64() == 0
    }

    #[inline]
    pub fn to_ne_bytes(self) -> [u8; CELL] {
        self.as_u64().to_ne_bytes()
    }

    #[inline]
    pub fn from_ne_bytes(bytes: [u8; CELL]) -> Self {
        Word::uint(u64::from_ne_bytes(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reinterpretation_is_bit_for_bit() {
        let w = Word::float(1.5);
        assert_eq!(w.as_u64(), 1.5f64.to_bits());
        assert_eq!(Word::uint(w.as_u64()).as_f64(), 1.5);

        let w = Word::data(-1);
        assert_eq!(w.as_u64(), u64::MAX);

        let mut x = 7u32;
        let p = Word::ptr(&mut x as *mut u32);
        assert_eq!(p.as_ptr::<u32>(), &mut x as *mut u32);
        assert_eq!(p.as_u64(), &mut x as *mut u32 as usize as u64);
    }

    #[test]
    fn equality_compares_bits() {
        assert_eq!(Word::data(0), Word::uint(0));
        assert_eq!(Word::float(0.0), Word::uint(0));
        // -0.0 and 0.0 differ in their bit pattern
        assert_ne!(Word::float(-0.0), Word::float(0.0));
        assert_eq!(Word::flag(true), Word::data(-1));
    }

    #[test]
    fn usize_conversions() {
        assert_eq!(usize::try_from(Word::cell(12)).unwrap(), 12);
        assert_eq!(Word::try_from(12usize).unwrap(), Word::cell(12));
    }
}
