use std::borrow::Cow;

/// Bytes printed by natives, waiting for the embedder to drain them.
///
/// Writes past the capacity fail instead of growing the buffer. Bytes are kept
/// as printed; text views decode them lossily.
#[derive(Debug, Clone, Default)]
pub struct OutputBuf {
    buf: Vec<u8>,
    capacity: usize,
}

#[derive(Debug, PartialEq)]
pub enum OutputError {
    OutputFull,
    FormattingErr,
}

impl OutputBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push_str(&mut self, stir: &str) -> Result<(), OutputError> {
        self.push_bytes(stir.as_bytes())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        if self.buf.len() + bytes.len() > self.capacity {
            return Err(OutputError::OutputFull);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    /// Drain everything printed so far.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buf)
    }

    /// Drain everything printed so far as text.
    pub fn take(&mut self) -> String {
        match String::from_utf8(self.take_bytes()) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

impl core::fmt::Write for OutputBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.push_str(s).map_err(|_| core::fmt::Error)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn refuses_past_capacity() {
        let mut out = OutputBuf::new(8);
        out.push_str("hello").unwrap();
        assert_eq!(out.push_str("world"), Err(OutputError::OutputFull));
        assert_eq!(out.as_str(), "hello");
        write!(&mut out, "{}", 42).unwrap();
        assert_eq!(out.take(), "hello42");
        assert!(out.is_empty());
    }

    #[test]
    fn split_characters_are_joined() {
        let mut out = OutputBuf::new(8);
        out.push_bytes(&[0xC3]).unwrap();
        out.push_bytes(&[0xA9]).unwrap();
        assert_eq!(out.as_bytes(), "é".as_bytes());
        assert_eq!(out.take(), "é");

        out.push_bytes(&[200]).unwrap();
        assert_eq!(out.as_bytes(), &[200]);
        assert_eq!(out.take_bytes(), vec![200]);
    }
}
