//! Partition of the arena into dictionary, parameter stack and return stack.
//!
//! ```text
//!  cell 0                                                      cells-1
//!  | header | dictionary ->  ...  <- param stack | return stack | guard |
//!  ^                      ^HERE             ^return_base          ^guard
//! ```
//!
//! The first [`HEADER_CELLS`] cells form the boot header. The return stack is
//! `return_cells` cells directly below the guard cell and is empty when its
//! pointer sits on the guard. The parameter stack is empty when its pointer
//! sits on `return_base` and may grow down until it meets `HERE`.

use core::fmt;

use crate::{addr::Bounds, word::CELL};

/// Code-field address of the word to run first. Execution starts with
/// `WP = ENTRY_CELL`.
pub const ENTRY_CELL: usize = 0;
/// Code-field address of `halt`; fetched when the entry word exits.
pub const HALT_CELL: usize = 1;
/// Link address of the most recently defined entry.
pub const LATEST_CELL: usize = 2;
/// First free dictionary cell.
pub const HERE_CELL: usize = 3;
pub const HEADER_CELLS: usize = 4;

/// Link value meaning "no previous entry". Cell 0 is part of the header, so
/// no entry can ever start there.
pub const NO_LINK: usize = 0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    cells: usize,
    return_base: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The arena cannot hold the header, the return stack and the guard.
    TooSmall { capacity: usize, required: usize },
    /// The image does not fit below the return stack.
    ImageTooLarge { image_cells: usize, available: usize },
    /// An arena was asked to commit more bytes than it owns.
    CapacityExceeded { requested: usize, capacity: usize },
}

impl Layout {
    pub fn new(capacity: usize, return_stack_size: usize) -> Result<Self, LayoutError> {
        let cells = capacity / CELL;
        let return_cells = return_stack_size / CELL;
        let required = return_cells
            .checked_add(HEADER_CELLS + 1)
            .and_then(|n| n.checked_mul(CELL))
            .unwrap_or(usize::MAX);
        let return_base = cells
            .checked_sub(1)
            .and_then(|n| n.checked_sub(return_cells))
            .filter(|&base| base >= HEADER_CELLS);
        match return_base {
            Some(return_base) if capacity >= required => Ok(Self { cells, return_base }),
            _ => Err(LayoutError::TooSmall { capacity, required }),
        }
    }

    /// Total number of addressable cells.
    #[inline]
    pub fn cells(&self) -> usize {
        self.cells
    }

    #[inline]
    pub fn guard(&self) -> usize {
        self.cells - 1
    }

    #[inline]
    pub fn return_base(&self) -> usize {
        self.return_base
    }

    #[inline]
    pub fn return_cells(&self) -> usize {
        self.guard() - self.return_base
    }

    /// Where the return stack pointer sits when nothing is saved.
    #[inline]
    pub fn return_empty(&self) -> usize {
        self.guard()
    }

    /// Where the parameter stack pointer sits when the stack is empty.
    #[inline]
    pub fn param_empty(&self) -> usize {
        self.return_base
    }

    /// Cells a return stack entry may occupy.
    #[inline]
    pub fn return_slots(&self) -> Bounds {
        Bounds::new(self.return_base, self.guard())
    }

    /// Values the return stack pointer may take, including its empty position.
    #[inline]
    pub fn return_positions(&self) -> Bounds {
        Bounds::new(self.return_base, self.guard() + 1)
    }

    /// Cells a parameter stack entry may occupy when the dictionary ends at
    /// `here`.
    #[inline]
    pub fn param_slots(&self, here: usize) -> Bounds {
        Bounds::new(here, self.return_base)
    }

    #[inline]
    pub fn param_positions(&self, here: usize) -> Bounds {
        Bounds::new(here, self.return_base + 1)
    }

    pub fn check_image(&self, image_cells: usize) -> Result<(), LayoutError> {
        if image_cells > self.return_base {
            return Err(LayoutError::ImageTooLarge {
                image_cells,
                available: self.return_base,
            });
        }
        Ok(())
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::TooSmall { capacity, required } => {
                write!(f, "arena of {capacity} bytes is too small, need at least {required}")
            }
            LayoutError::ImageTooLarge { image_cells, available } => write!(
                f,
                "image of {image_cells} cells does not fit in {available} dictionary cells"
            ),
            LayoutError::CapacityExceeded { requested, capacity } => {
                write!(f, "cannot commit {requested} bytes in an arena of {capacity}")
            }
        }
    }
}
