//! Buffered text input for the host side.
//!
//! [`IoBuffer`] refills a [`MemoryArena`](crate::MemoryArena) from any
//! [`Read`](std::io::Read) source, and [`TextInfile`] splits what it reads
//! into lines.

mod infile;
mod iobuf;

pub use self::{
    infile::{TextInfile, MIN_MAX_LINE},
    iobuf::IoBuffer,
};
