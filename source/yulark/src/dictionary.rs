//! Dictionary entries, images, and the builder that lays them out.
//!
//! An entry is a run of cells, low to high:
//!
//! ```text
//! | link | len+flags, name bytes, padding | code field | parameter field ... |
//! ```
//!
//! * `link` holds the link address of the previous entry, or [`NO_LINK`].
//! * The first name byte packs [`FLAG_IMMEDIATE`], [`FLAG_HIDDEN`] and the
//!   name length (low five bits); the name follows and is zero padded to the
//!   next cell boundary.
//! * The code field holds a callback id (see [`crate::natives`]).
//! * For composed words the parameter field is a list of code-field
//!   addresses ending in the one for `exit`.
//!
//! Entries are only ever appended and never move, so code-field addresses
//! stay valid for as long as the image is loaded at offset zero.

use core::fmt;

use crate::{
    layout::{ENTRY_CELL, HALT_CELL, HEADER_CELLS, HERE_CELL, LATEST_CELL, NO_LINK},
    natives::{host_id, CoreCallback, NativeEntry},
    word::{Word, CELL},
};

pub const FLAG_IMMEDIATE: u8 = 0x80;
pub const FLAG_HIDDEN: u8 = 0x40;
pub const LEN_MASK: u8 = 0x1F;
pub const MAX_NAME_LEN: usize = LEN_MASK as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    EmptyName,
    NameTooLong(String),
    UnknownWord(String),
    /// Image length in bytes is not a whole number of cells.
    Misaligned(usize),
    /// Image is shorter than the boot header.
    TooShort(usize),
    BadHeader { cell: usize, value: u64 },
    BadLink { at: usize, link: u64 },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::EmptyName => f.write_str("word names may not be empty"),
            ImageError::NameTooLong(name) => {
                write!(f, "word name '{name}' is longer than {MAX_NAME_LEN} bytes")
            }
            ImageError::UnknownWord(name) => write!(f, "no word named '{name}'"),
            ImageError::Misaligned(len) => {
                write!(f, "image length {len} is not a multiple of {CELL}")
            }
            ImageError::TooShort(len) => write!(f, "image of {len} bytes has no boot header"),
            ImageError::BadHeader { cell, value } => {
                write!(f, "boot header cell {cell} holds {value:#x}")
            }
            ImageError::BadLink { at, link } => {
                write!(f, "entry at cell {at} links to {link:#x}")
            }
        }
    }
}

impl std::error::Error for ImageError {}

#[inline]
fn name_cells(len: usize) -> usize {
    (1 + len + CELL - 1) / CELL
}

fn cell_at(bytes: &[u8], idx: usize) -> Option<Word> {
    let start = idx.checked_mul(CELL)?;
    let chunk = bytes.get(start..start.checked_add(CELL)?)?;
    let mut buf = [0u8; CELL];
    buf.copy_from_slice(chunk);
    Some(Word::from_ne_bytes(buf))
}

// ----- read side -----

/// A read-only view of the dictionary stored in an image or arena.
#[derive(Clone, Copy)]
pub struct Dictionary<'a> {
    bytes: &'a [u8],
}

/// One decoded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef<'a> {
    link: usize,
    prev: u64,
    flags: u8,
    name: &'a str,
    cfa: usize,
    code: Word,
}

impl<'a> EntryRef<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Cell offset of the link cell, which is also the entry's address.
    pub fn link(&self) -> usize {
        self.link
    }

    pub fn cfa(&self) -> Word {
        Word::cell(self.cfa)
    }

    pub fn pfa(&self) -> Word {
        Word::cell(self.cfa + 1)
    }

    /// Contents of the code field.
    pub fn code(&self) -> Word {
        self.code
    }

    pub fn is_immediate(&self) -> bool {
        self.flags & FLAG_IMMEDIATE != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.flags & FLAG_HIDDEN != 0
    }

    /// The core callback in the code field, if it holds one.
    pub fn core_callback(&self) -> Option<CoreCallback> {
        CoreCallback::from_id(self.code.as_u64())
    }
}

impl<'a> Dictionary<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn cells(&self) -> usize {
        self.bytes.len() / CELL
    }

    fn header(&self, cell: usize) -> Option<usize> {
        usize::try_from(cell_at(self.bytes, cell)?.as_u64()).ok()
    }

    /// Link address of the most recent entry, [`NO_LINK`] when empty.
    pub fn latest(&self) -> usize {
        self.header(LATEST_CELL).unwrap_or(NO_LINK)
    }

    pub fn here(&self) -> Option<usize> {
        self.header(HERE_CELL)
    }

    /// Decode the entry whose link cell is at `link`.
    pub fn entry_at(&self, link: usize) -> Option<EntryRef<'a>> {
        if link < HEADER_CELLS {
            return None;
        }
        let prev = cell_at(self.bytes, link)?.as_u64();
        let name_start = (link + 1) * CELL;
        let len_flags = *self.bytes.get(name_start)?;
        let len = usize::from(len_flags & LEN_MASK);
        let name = self.bytes.get(name_start + 1..name_start + 1 + len)?;
        let name = core::str::from_utf8(name).ok()?;
        let cfa = link + 1 + name_cells(len);
        let code = cell_at(self.bytes, cfa)?;
        Some(EntryRef {
            link,
            prev,
            flags: len_flags & !LEN_MASK,
            name,
            cfa,
            code,
        })
    }

    /// Every entry, most recent first. Stops at the first entry that
    /// cannot be decoded or whose link does not point strictly backwards.
    pub fn entries(&self) -> Entries<'a> {
        Entries {
            dict: *self,
            cur: self.latest(),
        }
    }

    /// The most recent visible entry called `name`.
    pub fn find(&self, name: &str) -> Option<EntryRef<'a>> {
        self.entries()
            .find(|entry| !entry.is_hidden() && entry.name == name)
    }

    /// The entry whose code field is at `cfa`.
    pub fn by_cfa(&self, cfa: Word) -> Option<EntryRef<'a>> {
        self.entries().find(|entry| entry.cfa() == cfa)
    }

    fn validate(&self) -> Result<(), ImageError> {
        let cells = self.cells();
        let header = |cell: usize| cell_at(self.bytes, cell).map(|w| w.as_u64()).unwrap_or(0);
        let bad = |cell: usize| ImageError::BadHeader {
            cell,
            value: header(cell),
        };

        if self.here() != Some(cells) {
            return Err(bad(HERE_CELL));
        }
        for cell in [ENTRY_CELL, HALT_CELL] {
            match self.header(cell) {
                Some(cfa) if (HEADER_CELLS..cells).contains(&cfa) => {}
                _ => return Err(bad(cell)),
            }
        }
        let latest = self.latest();
        if latest != NO_LINK && !(HEADER_CELLS..cells).contains(&latest) {
            return Err(bad(LATEST_CELL));
        }

        let mut cur = latest;
        while cur != NO_LINK {
            let link = cell_at(self.bytes, cur).map(|w| w.as_u64()).unwrap_or(u64::MAX);
            let entry = self
                .entry_at(cur)
                .ok_or(ImageError::BadLink { at: cur, link })?;
            match usize::try_from(entry.prev) {
                Ok(prev) if prev < cur => cur = prev,
                _ => return Err(ImageError::BadLink { at: cur, link }),
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Dictionary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries().map(|e| e.name)).finish()
    }
}

pub struct Entries<'a> {
    dict: Dictionary<'a>,
    cur: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = EntryRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NO_LINK {
            return None;
        }
        let entry = self.dict.entry_at(self.cur)?;
        self.cur = match usize::try_from(entry.prev) {
            Ok(prev) if prev < self.cur => prev,
            _ => NO_LINK,
        };
        Some(entry)
    }
}

// ----- images -----

/// A dictionary image, ready to be spliced into an arena at offset zero.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    /// Accept raw image bytes, checking the boot header and the link chain.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        if bytes.len() % CELL != 0 {
            return Err(ImageError::Misaligned(bytes.len()));
        }
        if bytes.len() < HEADER_CELLS * CELL {
            return Err(ImageError::TooShort(bytes.len()));
        }
        Dictionary::new(&bytes).validate()?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len_cells(&self) -> usize {
        self.bytes.len() / CELL
    }

    pub fn dictionary(&self) -> Dictionary<'_> {
        Dictionary::new(&self.bytes)
    }

    /// Code-field address the engine starts from.
    pub fn entry(&self) -> Word {
        cell_at(&self.bytes, ENTRY_CELL).unwrap_or_default()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("cells", &self.len_cells())
            .field("entry", &self.entry())
            .finish()
    }
}

// ----- write side -----

/// Appends entries to a fresh image.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    bytes: Vec<u8>,
    exit_cfa: Word,
}

/// One entry under construction, see [`ImageBuilder::build_entry`].
#[must_use]
pub struct EntryBuilder<'a> {
    image: &'a mut ImageBuilder,
    name: String,
    flags: u8,
    params: Vec<Word>,
}

impl<'a> EntryBuilder<'a> {
    pub fn immediate(mut self) -> Self {
        self.flags |= FLAG_IMMEDIATE;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.flags |= FLAG_HIDDEN;
        self
    }

    /// Append one cell to the parameter field.
    pub fn write_word(mut self, word: Word) -> Self {
        self.params.push(word);
        self
    }

    /// Write the entry with `code` in its code field and return its
    /// code-field address.
    pub fn finish(self, code: Word) -> Word {
        self.image
            .emit_entry(self.name.as_bytes(), self.flags, code, &self.params)
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    /// An image holding the boot header and an entry for every core word.
    /// The entry cell starts out pointing at `halt`.
    pub fn new() -> Self {
        let mut builder = Self {
            bytes: vec![0u8; HEADER_CELLS * CELL],
            exit_cfa: Word::default(),
        };
        builder.set_cell(HERE_CELL, Word::cell(HEADER_CELLS));

        for cb in CoreCallback::ALL.iter().filter(|cb| !cb.is_continuation()) {
            let cfa = builder.emit_entry(cb.name().as_bytes(), 0, cb.id(), &[]);
            match cb {
                CoreCallback::Exit => builder.exit_cfa = cfa,
                CoreCallback::Halt => {
                    builder.set_cell(HALT_CELL, cfa);
                    builder.set_cell(ENTRY_CELL, cfa);
                }
                _ => {}
            }
        }
        builder
    }

    /// [`ImageBuilder::new`] plus one primitive entry per host native.
    pub fn with_natives<T>(natives: &[NativeEntry<T>]) -> Result<Self, ImageError> {
        let mut builder = Self::new();
        for (idx, native) in natives.iter().enumerate() {
            builder.primitive(native.name, host_id(idx))?;
        }
        Ok(builder)
    }

    fn set_cell(&mut self, idx: usize, word: Word) {
        let start = idx * CELL;
        self.bytes[start..start + CELL].copy_from_slice(&word.to_ne_bytes());
    }

    fn push_cell(&mut self, word: Word) {
        self.bytes.extend_from_slice(&word.to_ne_bytes());
    }

    /// Next free cell.
    pub fn here(&self) -> usize {
        self.bytes.len() / CELL
    }

    pub fn dictionary(&self) -> Dictionary<'_> {
        Dictionary::new(&self.bytes)
    }

    fn emit_entry(&mut self, name: &[u8], flags: u8, code: Word, params: &[Word]) -> Word {
        let link = self.here();
        let prev = self.dictionary().latest();
        self.push_cell(Word::cell(prev));

        self.bytes.push(flags | name.len() as u8);
        self.bytes.extend_from_slice(name);
        let padded = (link + 1 + name_cells(name.len())) * CELL;
        self.bytes.resize(padded, 0);

        let cfa = self.here();
        self.push_cell(code);
        params.iter().for_each(|w| self.push_cell(*w));

        self.set_cell(LATEST_CELL, Word::cell(link));
        self.set_cell(HERE_CELL, Word::cell(self.here()));
        Word::cell(cfa)
    }

    pub fn build_entry(&mut self, name: &str) -> Result<EntryBuilder<'_>, ImageError> {
        if name.is_empty() {
            return Err(ImageError::EmptyName);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ImageError::NameTooLong(name.to_string()));
        }
        Ok(EntryBuilder {
            image: self,
            name: name.to_string(),
            flags: 0,
            params: Vec::new(),
        })
    }

    /// An entry whose code field is the native callback `id`.
    pub fn primitive(&mut self, name: &str, id: Word) -> Result<Word, ImageError> {
        Ok(self.build_entry(name)?.finish(id))
    }

    /// A composed word calling each of `body` in turn, then `exit`.
    pub fn colon(&mut self, name: &str, body: &[Word]) -> Result<Word, ImageError> {
        let exit = self.exit_cfa;
        let entry = body
            .iter()
            .fold(self.build_entry(name)?, |entry, w| entry.write_word(*w));
        Ok(entry.write_word(exit).finish(CoreCallback::Docol.id()))
    }

    /// A word that pushes the address of its one-cell parameter field.
    pub fn variable(&mut self, name: &str, init: Word) -> Result<Word, ImageError> {
        Ok(self
            .build_entry(name)?
            .write_word(init)
            .finish(CoreCallback::Dovar.id()))
    }

    pub fn constant(&mut self, name: &str, val: Word) -> Result<Word, ImageError> {
        Ok(self
            .build_entry(name)?
            .write_word(val)
            .finish(CoreCallback::Doconst.id()))
    }

    /// Code-field address of the visible word called `name`.
    pub fn cfa(&self, name: &str) -> Result<Word, ImageError> {
        self.dictionary()
            .find(name)
            .map(|entry| entry.cfa())
            .ok_or_else(|| ImageError::UnknownWord(name.to_string()))
    }

    /// Start execution at `cfa`.
    pub fn set_entry(&mut self, cfa: Word) {
        self.set_cell(ENTRY_CELL, cfa);
    }

    pub fn finish(self) -> Image {
        Image { bytes: self.bytes }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn core_words_are_defined() {
        let builder = ImageBuilder::new();
        let dict = builder.dictionary();
        for cb in CoreCallback::ALL {
            let found = dict.find(cb.name());
            if cb.is_continuation() {
                assert!(found.is_none(), "{} has an entry", cb.name());
            } else {
                assert_eq!(found.unwrap().code(), cb.id());
            }
        }
        assert_eq!(
            builder.cfa("halt").unwrap(),
            cell_at(&builder.bytes, HALT_CELL).unwrap()
        );
    }

    #[test]
    fn entry_layout() {
        let mut builder = ImageBuilder::new();
        let prev = builder.dictionary().latest();
        let link = builder.here();
        // 1 length byte + 9 name bytes spans two cells
        let cfa = builder.primitive("long-name", Word::uint(99)).unwrap();
        assert_eq!(cfa, Word::cell(link + 3));

        let dict = builder.dictionary();
        let entry = dict.entry_at(link).unwrap();
        assert_eq!(entry.name(), "long-name");
        assert_eq!(entry.prev, prev as u64);
        assert_eq!(entry.code(), Word::uint(99));
        assert_eq!(dict.latest(), link);
        assert_eq!(dict.here(), Some(link + 4));
    }

    #[test]
    fn colon_appends_exit() {
        let mut builder = ImageBuilder::new();
        let noop = builder.cfa("noop").unwrap();
        let exit = builder.cfa("exit").unwrap();
        let cfa = builder.colon("twice", &[noop, noop]).unwrap();
        let image = builder.finish();
        let body: Vec<_> = (1..4)
            .map(|i| cell_at(image.as_bytes(), cfa.as_u64() as usize + i).unwrap())
            .collect();
        assert_eq!(body, vec![noop, noop, exit]);
        assert_eq!(
            image.dictionary().find("twice").unwrap().core_callback(),
            Some(CoreCallback::Docol)
        );
    }

    #[test]
    fn hidden_and_shadowed_words() {
        let mut builder = ImageBuilder::new();
        let first = builder.constant("k", Word::data(1)).unwrap();
        let second = builder.constant("k", Word::data(2)).unwrap();
        assert_eq!(builder.cfa("k").unwrap(), second);
        builder
            .build_entry("k")
            .unwrap()
            .hidden()
            .write_word(Word::data(3))
            .finish(CoreCallback::Doconst.id());
        assert_eq!(builder.cfa("k").unwrap(), second);
        assert_ne!(first, second);

        let imm = builder.build_entry("now").unwrap().immediate().finish(Word::uint(0));
        assert!(builder.dictionary().by_cfa(imm).unwrap().is_immediate());
    }

    #[test]
    fn names_are_validated() {
        let mut builder = ImageBuilder::new();
        assert_eq!(builder.primitive("", Word::uint(0)), Err(ImageError::EmptyName));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            builder.primitive(&long, Word::uint(0)),
            Err(ImageError::NameTooLong(long.clone()))
        );
        assert!(builder.primitive(&long[1..], Word::uint(0)).is_ok());
        assert_eq!(builder.cfa("nope"), Err(ImageError::UnknownWord("nope".into())));
    }

    #[test]
    fn image_bytes_round_trip_through_validation() {
        let mut builder = ImageBuilder::new();
        let noop = builder.cfa("noop").unwrap();
        let main = builder.colon("main", &[noop]).unwrap();
        builder.set_entry(main);
        let image = builder.finish();

        let again = Image::from_bytes(image.as_bytes().to_vec()).unwrap();
        assert_eq!(again, image);
        assert_eq!(again.entry(), main);
    }

    #[test]
    fn image_validation_failures() {
        let good = ImageBuilder::new().finish().as_bytes().to_vec();

        assert_eq!(
            Image::from_bytes(good[..good.len() - 1].to_vec()),
            Err(ImageError::Misaligned(good.len() - 1))
        );
        assert_eq!(Image::from_bytes(vec![0; 16]), Err(ImageError::TooShort(16)));

        // truncated by one cell: HERE no longer matches the length
        let short = good[..good.len() - CELL].to_vec();
        assert!(matches!(
            Image::from_bytes(short),
            Err(ImageError::BadHeader { cell: HERE_CELL, .. })
        ));

        // entry pointing past the end
        let mut bad_entry = good.clone();
        bad_entry[..CELL].copy_from_slice(&Word::cell(1 << 20).to_ne_bytes());
        assert!(matches!(
            Image::from_bytes(bad_entry),
            Err(ImageError::BadHeader { cell: ENTRY_CELL, .. })
        ));

        // latest entry linking forwards
        let mut cyclic = good;
        let latest = Dictionary::new(&cyclic).latest();
        let start = latest * CELL;
        cyclic[start..start + CELL].copy_from_slice(&Word::cell(latest).to_ne_bytes());
        assert!(matches!(
            Image::from_bytes(cyclic),
            Err(ImageError::BadLink { .. })
        ));
    }

    #[test]
    fn corrupt_latest_is_an_empty_dictionary() {
        let mut bytes = ImageBuilder::new().finish().as_bytes().to_vec();
        let start = LATEST_CELL * CELL;
        for bad in [usize::MAX / CELL, usize::MAX, bytes.len() / CELL] {
            bytes[start..start + CELL].copy_from_slice(&Word::cell(bad).to_ne_bytes());
            let dict = Dictionary::new(&bytes);
            assert_eq!(dict.latest(), bad);
            assert!(dict.entry_at(bad).is_none());
            assert_eq!(dict.entries().count(), 0);
            assert!(dict.find("dup").is_none());
        }
        assert!(cell_at(&bytes, usize::MAX / CELL).is_none());
    }
}
