//! Source text normalisation.
//!
//! Strips `( ... )` comments and `\` line comments, and collapses every run of
//! whitespace into a single space. Text between double quotes passes through
//! untouched. A comment counts as whitespace, so `a(x)b` becomes `a b`.

use std::io::{self, Read, Write};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
enum State {
    #[default]
    Code,
    Quoted,
    Comment,
    LineComment,
}

/// Byte-at-a-time normaliser. Feed it input with [`Normalizer::feed`] and
/// flush the pending space with [`Normalizer::finish`].
#[derive(Debug, Default)]
pub struct Normalizer {
    state: State,
    space: bool,
}

#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\0')
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_space(&mut self, out: &mut Vec<u8>) {
        if self.space {
            out.push(b' ');
            self.space = false;
        }
    }

    pub fn feed(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            match (self.state, b) {
                (State::Code, b'"') => {
                    self.flush_space(out);
                    out.push(b);
                    self.state = State::Quoted;
                }
                (State::Code, b'(') => {
                    self.space = true;
                    self.state = State::Comment;
                }
                (State::Code, b'\\') => {
                    self.space = true;
                    self.state = State::LineComment;
                }
                (State::Code, b) if is_space(b) => self.space = true,
                (State::Code, b) => {
                    self.flush_space(out);
                    out.push(b);
                }
                (State::Quoted, b) => {
                    out.push(b);
                    if b == b'"' {
                        self.state = State::Code;
                    }
                }
                (State::Comment, b')') | (State::LineComment, b'\n') => self.state = State::Code,
                (State::Comment | State::LineComment, _) => {}
            }
        }
    }

    /// End of input. An unterminated comment is dropped; an unterminated
    /// string is kept as it is.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        self.flush_space(out);
        *self = Self::default();
    }
}

pub fn normalize_str(src: &str) -> String {
    let mut out = Vec::with_capacity(src.len());
    let mut norm = Normalizer::new();
    norm.feed(src.as_bytes(), &mut out);
    norm.finish(&mut out);
    // only ASCII is ever removed or inserted
    String::from_utf8_lossy(&out).into_owned()
}

/// Normalise all of `input` into `output`. Returns the number of bytes
/// written.
pub fn normalize<R: Read, W: Write>(mut input: R, mut output: W) -> io::Result<u64> {
    let mut norm = Normalizer::new();
    let mut chunk = [0u8; 4096];
    let mut out = Vec::with_capacity(chunk.len());
    let mut written = 0u64;
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        norm.feed(&chunk[..n], &mut out);
        output.write_all(&out)?;
        written += out.len() as u64;
        out.clear();
    }
    norm.finish(&mut out);
    output.write_all(&out)?;
    written += out.len() as u64;
    output.flush()?;
    Ok(written)
}
