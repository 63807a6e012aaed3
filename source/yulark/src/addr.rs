//! Bounds-checked cell addresses.
//!
//! A [`CellAddr`] can only be obtained from [`Bounds::check`] or by moving an
//! existing `CellAddr` with [`CellAddr::advance`]/[`CellAddr::retreat`], each
//! of which re-validates the result. Holding a `CellAddr` therefore means the
//! offset was inside a live boundary when it was produced.

use core::ops::Range;

use crate::{
    word::{Word, CELL},
    Error,
};

/// Half-open range of cell offsets `[lo, hi)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Bounds {
    lo: usize,
    hi: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddr(usize);

impl Bounds {
    pub const fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    /// Every cell of a region holding `fill` valid bytes.
    pub const fn of_fill(fill: usize) -> Self {
        Self::new(0, fill / CELL)
    }

    #[inline]
    pub fn lo(&self) -> usize {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> usize {
        self.hi
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.lo <= index && index < self.hi
    }

    /// Interpret `raw` as a cell offset and accept it only if it falls inside
    /// these bounds. Negative values are huge when read unsigned and fail.
    #[inline]
    pub fn check(&self, raw: Word) -> Result<CellAddr, Error> {
        match usize::try_from(raw.as_u64()) {
            Ok(index) if self.contains(index) => Ok(CellAddr(index)),
            _ => Err(Error::InvalidAddress(raw)),
        }
    }
}

impl CellAddr {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    #[inline]
    pub fn to_word(self) -> Word {
        Word::cell(self.0)
    }

    #[inline]
    pub fn byte_range(self) -> Range<usize> {
        let start = self.0 * CELL;
        start..start + CELL
    }

    /// One cell up, validated against `bounds`.
    #[inline]
    pub fn advance(self, bounds: Bounds) -> Result<CellAddr, Error> {
        bounds.check(Word::uint((self.0 as u64).wrapping_add(1)))
    }

    /// One cell down, validated against `bounds`. Retreating from zero wraps
    /// to `u64::MAX`, which no bounds accept.
    #[inline]
    pub fn retreat(self, bounds: Bounds) -> Result<CellAddr, Error> {
        bounds.check(Word::uint((self.0 as u64).wrapping_sub(1)))
    }

    /// Move by a signed number of cells, validated against `bounds`.
    #[inline]
    pub fn offset(self, cells: i64, bounds: Bounds) -> Result<CellAddr, Error> {
        bounds.check(Word::uint((self.0 as u64).wrapping_add(cells as u64)))
    }

    pub(crate) fn read(self, bytes: &[u8]) -> Result<Word, Error> {
        let cell = bytes
            .get(self.byte_range())
            .ok_or(Error::InvalidAddress(self.to_word()))?;
        let mut buf = [0u8; CELL];
        buf.copy_from_slice(cell);
        Ok(Word::from_ne_bytes(buf))
    }

    pub(crate) fn write(self, bytes: &mut [u8], word: Word) -> Result<(), Error> {
        let cell = bytes
            .get_mut(self.byte_range())
            .ok_or(Error::InvalidAddress(self.to_word()))?;
        cell.copy_from_slice(&word.to_ne_bytes());
        Ok(())
    }
}
