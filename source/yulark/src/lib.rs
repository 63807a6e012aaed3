//! # yulark
//!
//! An indirect-threaded Forth virtual machine.
//!
//! The whole machine lives inside one [`MemoryArena`]: a dictionary that
//! grows up from cell zero, a parameter stack that grows down towards it,
//! and a fixed-size return stack carved from the top. Every register is a
//! [`Word`] holding a cell offset, and every offset is validated before it is
//! dereferenced or accepted as the new value of a register.
//!
//! Execution is driven by three operations on [`Engine`]:
//!
//! * [`Engine::next`] fetches the next code-field address from `WP`,
//!   advances `WP`, and schedules the callback stored in that code field.
//! * [`Engine::docol`] saves `WP` on the return stack and enters a composed
//!   definition.
//! * [`Engine::exit`] restores `WP` from the return stack.
//!
//! Primitive words are native callbacks that finish by calling
//! [`Engine::next`] themselves; a primitive that does not (such as `halt`)
//! stops the dispatch loop.
//!
//! ```rust
//! use yulark::{dictionary::ImageBuilder, Engine, EngineParams, Word};
//!
//! let mut builder = ImageBuilder::new();
//! let two_star = builder.cfa("2*").unwrap();
//! let quad = builder.colon("quad", &[two_star, two_star]).unwrap();
//! builder.set_entry(quad);
//! let image = builder.finish();
//!
//! let mut engine = Engine::new(EngineParams::default(), Some(&image), (), &[]).unwrap();
//! engine.push(Word::data(21)).unwrap();
//! engine.run().unwrap();
//! assert_eq!(engine.pop().unwrap(), Word::data(84));
//! ```

pub mod addr;
pub mod arena;
pub mod dictionary;
pub mod engine;
pub mod io;
pub mod keyword;
pub mod layout;
pub mod natives;
pub mod normalize;
pub mod output;
pub mod testutil;
pub mod word;

use core::fmt;

pub use crate::{
    addr::{Bounds, CellAddr},
    arena::MemoryArena,
    engine::{run, Engine, EngineParams, Step},
    natives::{Callback, CoreCallback, NativeEntry},
    word::Word,
};
use crate::{dictionary::ImageError, layout::LayoutError, output::OutputError};

#[derive(Debug, PartialEq)]
pub enum Error {
    /// A register or a computed address left the committed region.
    ///
    /// Carries the raw offending value. The engine that raised it is
    /// corrupted and refuses to continue.
    InvalidAddress(Word),
    /// A code field held a value that names no callback.
    UnknownCallback(Word),
    Layout(LayoutError),
    Image(ImageError),
    Output(OutputError),
    DivideByZero,
    /// `p@`/`p!`/`xfree` on a pointer outside every live heap block.
    BadHeapPointer(Word),
    /// `xalloc` with a negative or unrepresentable size.
    BadAllocSize(Word),
    UnknownRegex(Word),
    RegexCompile {
        pattern: String,
        message: String,
    },
}

impl Error {
    /// Errors after which the engine state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidAddress(_) | Error::RegexCompile { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidAddress(w) => write!(f, "Bad FORTH pointer: {:016x}", w.as_u64()),
            Error::UnknownCallback(w) => {
                write!(f, "unknown callback in code field: {:016x}", w.as_u64())
            }
            Error::Layout(e) => write!(f, "invalid memory layout: {e}"),
            Error::Image(e) => write!(f, "invalid dictionary image: {e}"),
            Error::Output(e) => write!(f, "output failed: {e:?}"),
            Error::DivideByZero => f.write_str("division by zero"),
            Error::BadHeapPointer(w) => write!(
                f,
                "pointer {:016x} is not inside a live heap block",
                w.as_u64()
            ),
            Error::BadAllocSize(w) => write!(f, "cannot allocate {} bytes", w.as_i64()),
            Error::UnknownRegex(w) => write!(f, "no compiled regex with handle {}", w.as_u64()),
            Error::RegexCompile { pattern, message } => {
                write!(f, "failed to compile regex '{pattern}': {message}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<LayoutError> for Error {
    fn from(le: LayoutError) -> Self {
        Error::Layout(le)
    }
}

impl From<ImageError> for Error {
    fn from(ie: ImageError) -> Self {
        Error::Image(ie)
    }
}

impl From<OutputError> for Error {
    fn from(oe: OutputError) -> Self {
        Error::Output(oe)
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::Output(OutputError::FormattingErr)
    }
}

trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}
