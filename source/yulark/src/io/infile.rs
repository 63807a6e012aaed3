use std::{
    fs::File,
    io::{self, ErrorKind, Read, Seek},
    path::{Path, PathBuf},
};

use super::IoBuffer;

/// Smallest accepted cap on the length of one line, in bytes.
pub const MIN_MAX_LINE: usize = 65535;

/// Reads a text source one line at a time.
///
/// Lines are split at `\n`, which is not part of the line. A last line with
/// no trailing newline is still delivered. Lines longer than the configured
/// maximum are truncated.
#[derive(Debug)]
pub struct TextInfile<R = File> {
    path: Option<PathBuf>,
    buf: Option<IoBuffer<R>>,
    /// Read position inside `buf`.
    pos: usize,
    eof: bool,
    line: Vec<u8>,
    max_line: usize,
}

impl TextInfile<File> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "opened text file");
        let mut infile = Self::from_reader(file);
        infile.path = Some(path.to_path_buf());
        Ok(infile)
    }
}

impl<R: Read> TextInfile<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_buffer(IoBuffer::new(reader))
    }

    pub fn with_buffer(buf: IoBuffer<R>) -> Self {
        Self {
            path: None,
            buf: Some(buf),
            pos: 0,
            eof: false,
            line: Vec::new(),
            max_line: usize::MAX,
        }
    }

    /// Cap the line length at `max` bytes, but never below [`MIN_MAX_LINE`].
    pub fn with_max_line(mut self, max: usize) -> Self {
        self.max_line = max.max(MIN_MAX_LINE);
        self
    }

    /// Read the next line into [`TextInfile::line`]. Returns `false` once the
    /// input is exhausted.
    pub fn read_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        let Some(buf) = self.buf.as_mut() else {
            return Err(closed());
        };

        let mut partial = false;
        loop {
            let data = &buf.as_bytes()[self.pos..];
            if let Some(nl) = data.iter().position(|&b| b == b'\n') {
                scale_append(&mut self.line, &data[..nl], self.max_line);
                self.pos += nl + 1;
                return Ok(true);
            }
            if !data.is_empty() {
                partial = true;
                scale_append(&mut self.line, data, self.max_line);
                self.pos = buf.fill();
            }
            if self.eof {
                return Ok(partial);
            }
            self.pos = 0;
            if buf.read()? == 0 {
                self.eof = true;
            }
        }
    }

    /// The line read by the last successful [`TextInfile::read_line`].
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.buf.is_some()
    }

    /// Release the source. Later reads fail.
    pub fn close(&mut self) {
        self.buf = None;
    }
}

impl<R: Read + Seek> TextInfile<R> {
    /// Offset of the underlying source, which runs ahead of the line position
    /// by whatever is still buffered.
    pub fn file_pos(&mut self) -> io::Result<u64> {
        self.buf
            .as_mut()
            .ok_or_else(closed)?
            .get_mut()
            .stream_position()
    }
}

fn closed() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "text file is closed")
}

/// Append `bytes` to `line`, growing its capacity threefold at a time but
/// never past `max`. What does not fit under `max` is dropped.
fn scale_append(line: &mut Vec<u8>, bytes: &[u8], max: usize) {
    let len = bytes.len().min(max.saturating_sub(line.len()));
    if len < bytes.len() {
        tracing::warn!(max, dropped = bytes.len() - len, "line truncated");
    }
    if len == 0 {
        return;
    }
    let need = line.len() + len;
    if need > line.capacity() {
        let grown = line.capacity().saturating_mul(3).min(max).max(need);
        line.reserve_exact(grown - line.len());
    }
    line.extend_from_slice(&bytes[..len]);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{Cursor, Write};

    fn lines<R: Read>(mut infile: TextInfile<R>) -> Vec<String> {
        let mut out = Vec::new();
        while infile.read_line().unwrap() {
            out.push(String::from_utf8(infile.line().to_vec()).unwrap());
        }
        out
    }

    #[test]
    fn splits_lines_across_refills() {
        let src = Cursor::new(b"alpha\nbe\n\ngamma-delta\nlast".to_vec());
        let infile = TextInfile::with_buffer(IoBuffer::with_capacity(src, 4));
        assert_eq!(lines(infile), vec!["alpha", "be", "", "gamma-delta", "last"]);
    }

    #[test]
    fn trailing_newline_ends_input() {
        let infile = TextInfile::from_reader(Cursor::new(b"one\ntwo\n".to_vec()));
        assert_eq!(lines(infile), vec!["one", "two"]);
        let infile = TextInfile::from_reader(Cursor::new(Vec::new()));
        assert!(lines(infile).is_empty());
    }

    #[test]
    fn long_lines_are_truncated() {
        let mut text = vec![b'a'; MIN_MAX_LINE + 100];
        text.extend_from_slice(b"\nok\n");
        let src = IoBuffer::with_capacity(Cursor::new(text), 1000);
        // a cap below the minimum is raised to it
        let mut infile = TextInfile::with_buffer(src).with_max_line(10);
        assert!(infile.read_line().unwrap());
        assert_eq!(infile.line().len(), MIN_MAX_LINE);
        assert!(infile.read_line().unwrap());
        assert_eq!(infile.line(), b"ok");
    }

    #[test]
    fn growth_is_threefold() {
        let mut line = Vec::with_capacity(10);
        scale_append(&mut line, &[1; 10], 1000);
        assert_eq!(line.capacity(), 10);
        scale_append(&mut line, &[2; 5], 1000);
        assert!(line.capacity() >= 30);
        assert_eq!(line.len(), 15);
    }

    #[test]
    fn open_read_close() {
        let path = std::env::temp_dir().join(format!("yulark-infile-{}.txt", std::process::id()));
        File::create(&path).unwrap().write_all(b"first\nsecond").unwrap();

        let mut infile = TextInfile::open(&path).unwrap();
        assert_eq!(infile.path(), Some(path.as_path()));
        assert!(infile.read_line().unwrap());
        assert_eq!(infile.line(), b"first");
        assert_eq!(infile.file_pos().unwrap(), 12);
        assert!(infile.read_line().unwrap());
        assert_eq!(infile.line(), b"second");
        assert!(!infile.read_line().unwrap());

        infile.close();
        assert!(!infile.is_open());
        assert_eq!(infile.read_line().unwrap_err().kind(), ErrorKind::NotConnected);
        std::fs::remove_file(&path).unwrap();
    }
}
