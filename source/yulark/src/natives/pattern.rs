use regex::bytes::{Regex, RegexBuilder};

use crate::{Engine, Error, Word};

/// `re-compile` flag: match without regard to case.
pub const RE_ICASE: i64 = 0b01;
/// `re-compile` flag: newline-sensitive matching. `.` stops matching `\n`
/// and `^`/`$` match at line boundaries.
pub const RE_NEWLINE: i64 = 0b10;

/// Compiled expressions, addressed by handle. Handle 0 is never issued.
#[derive(Debug, Default)]
pub(crate) struct Patterns {
    slots: Vec<Option<Regex>>,
}

impl Patterns {
    fn insert(&mut self, re: Regex) -> Word {
        let idx = match self.slots.iter().position(Option::is_none) {
            Some(idx) => {
                self.slots[idx] = Some(re);
                idx
            }
            None => {
                self.slots.push(Some(re));
                self.slots.len() - 1
            }
        };
        Word::cell(idx + 1)
    }

    fn slot(&self, handle: Word) -> Option<usize> {
        usize::try_from(handle.as_u64()).ok()?.checked_sub(1)
    }

    fn get(&self, handle: Word) -> Result<&Regex, Error> {
        self.slot(handle)
            .and_then(|idx| self.slots.get(idx))
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownRegex(handle))
    }

    fn remove(&mut self, handle: Word) -> Result<(), Error> {
        self.slot(handle)
            .and_then(|idx| self.slots.get_mut(idx))
            .and_then(Option::take)
            .map(drop)
            .ok_or(Error::UnknownRegex(handle))
    }
}

fn compile(pattern: &[u8], flags: i64) -> Result<Regex, Error> {
    let text = core::str::from_utf8(pattern).map_err(|e| Error::RegexCompile {
        pattern: String::from_utf8_lossy(pattern).into_owned(),
        message: e.to_string(),
    })?;
    let newline = flags & RE_NEWLINE != 0;
    RegexBuilder::new(text)
        .case_insensitive(flags & RE_ICASE != 0)
        .multi_line(newline)
        .dot_matches_new_line(!newline)
        .build()
        .map_err(|e| Error::RegexCompile {
            pattern: text.to_string(),
            message: e.to_string(),
        })
}

impl<T: 'static> Engine<T> {
    /// `( c-addr flags -- handle )`: compile the counted string at byte
    /// address `c-addr`. A pattern that does not compile halts the engine.
    pub fn re_compile(&mut self) -> Result<(), Error> {
        let flags = self.pop()?.as_i64();
        let addr = self.pop()?;
        let len = usize::from(self.bytes(addr, 1)?[0]);
        let start = Word::uint(addr.as_u64().wrapping_add(1));
        let re = compile(self.bytes(start, len)?, flags)?;
        tracing::trace!(pattern = re.as_str(), flags, "re-compile");
        let handle = self.patterns.insert(re);
        self.push(handle)?;
        self.next()
    }

    /// `( buf len handle out n -- flag )`: match against `len` bytes at byte
    /// address `buf`.
    ///
    /// On a match, writes `n + 1` start/end offset pairs to the cells at
    /// `out` (the whole match, then each group; `-1 -1` for groups that did
    /// not participate) and pushes -1. Pushes 0 and writes nothing when
    /// there is no match. `n = -1` only reports whether the buffer matches.
    pub fn re_exec(&mut self) -> Result<(), Error> {
        let n = self.pop()?.as_i64();
        let out = self.pop()?;
        let handle = self.pop()?;
        let len = self.pop()?;
        let buf = self.pop()?;

        let pairs = usize::try_from(n.saturating_add(1)).unwrap_or(0);
        if pairs > 0 {
            // the whole output area must be addressable before matching
            let last = pairs
                .checked_mul(2)
                .and_then(|cells| cells.checked_add(usize::try_from(out.as_u64()).ok()?))
                .and_then(|end| end.checked_sub(1))
                .ok_or(Error::InvalidAddress(out))?;
            self.bounds().check(Word::cell(last))?;
        }

        let re = self.patterns.get(handle)?;
        let haystack = self.bytes(buf, usize::try_from(len)?)?;
        let offsets: Option<Vec<i64>> = re.captures(haystack).map(|caps| {
            (0..pairs)
                .flat_map(|i| match caps.get(i) {
                    Some(m) => [m.start() as i64, m.end() as i64],
                    None => [-1, -1],
                })
                .collect()
        });

        match offsets {
            Some(offsets) => {
                let base = out.as_u64();
                for (i, off) in offsets.into_iter().enumerate() {
                    self.write_cell(Word::uint(base + i as u64), Word::data(off))?;
                }
                self.push(Word::flag(true))?;
            }
            None => self.push(Word::flag(false))?,
        }
        self.next()
    }

    /// `( handle -- )`
    pub fn re_free(&mut self) -> Result<(), Error> {
        let handle = self.pop()?;
        self.patterns.remove(handle)?;
        self.next()
    }
}

#[cfg(test)]
mod test {
    use super::{compile, Patterns, RE_ICASE, RE_NEWLINE};
    use crate::{dictionary::ImageBuilder, Engine, EngineParams, Error, Word};

    #[test]
    fn flags() {
        let re = compile(b"^b.c$", 0).unwrap();
        assert!(re.is_match(b"b\nc"));
        assert!(!re.is_match(b"a\nb-c"));

        let re = compile(b"^b.c$", RE_NEWLINE).unwrap();
        assert!(!re.is_match(b"b\nc"));
        assert!(re.is_match(b"a\nb-c"));

        assert!(compile(b"hello", RE_ICASE).unwrap().is_match(b"HeLLo"));
        assert!(!compile(b"hello", 0).unwrap().is_match(b"HeLLo"));
    }

    #[test]
    fn leftmost_first_semantics() {
        // the first alternative that matches wins, not the longest
        let re = compile(b"a|ab", 0).unwrap();
        assert_eq!(re.find(b"ab").map(|m| m.range()), Some(0..1));
        let caps = compile(b"(a|ab)(c|bcd)", 0).unwrap().captures(b"abcd").unwrap();
        assert_eq!(caps.get(0).map(|m| m.range()), Some(0..4));
        assert_eq!(caps.get(1).map(|m| m.range()), Some(0..1));

        // negated classes still match a newline in newline-sensitive mode
        let re = compile(b"a[^x]b", RE_NEWLINE).unwrap();
        assert!(re.is_match(b"a\nb"));
    }

    #[test]
    fn compile_failure_is_reported() {
        match compile(b"(unclosed", 0) {
            Err(Error::RegexCompile { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn handles_are_reused() {
        let mut pats = Patterns::default();
        let a = pats.insert(compile(b"a", 0).unwrap());
        let b = pats.insert(compile(b"b", 0).unwrap());
        assert_eq!(a, Word::cell(1));
        assert_eq!(b, Word::cell(2));
        pats.remove(a).unwrap();
        assert_eq!(pats.remove(a), Err(Error::UnknownRegex(a)));
        assert!(pats.get(Word::cell(0)).is_err());
        assert_eq!(pats.insert(compile(b"c", 0).unwrap()), a);
    }

    #[test]
    fn compile_and_exec_through_the_stack() {
        // scratch cells well above the image and below the parameter stack
        const PAT: usize = 600;
        const SUBJECT: usize = 610;
        const OUT: usize = 620;

        let mut builder = ImageBuilder::new();
        let cfa = |b: &ImageBuilder, name| b.cfa(name).unwrap();
        let lit = cfa(&builder, "(literal)");
        #[rustfmt::skip]
        let body = [
            lit, Word::cell(PAT * 8), lit, Word::data(RE_ICASE), cfa(&builder, "re-compile"),
            cfa(&builder, ">r"),
            lit, Word::cell(SUBJECT * 8), lit, Word::data(11), cfa(&builder, "r@"),
            lit, Word::cell(OUT), lit, Word::data(2), cfa(&builder, "re-exec"),
            cfa(&builder, "r>"), cfa(&builder, "re-free"),
        ];
        let main = builder.colon("main", &body).unwrap();
        builder.set_entry(main);
        let image = builder.finish();

        let mut engine = Engine::new(EngineParams::new(8192, 512), Some(&image), (), &[]).unwrap();
        assert!(engine.here().unwrap() < PAT);

        let pat = b"(\\w+)@(\\d+)?X";
        let dst = engine.bytes_mut(Word::cell(PAT * 8), pat.len() + 1).unwrap();
        dst[0] = pat.len() as u8;
        dst[1..].copy_from_slice(pat);
        engine
            .bytes_mut(Word::cell(SUBJECT * 8), 11)
            .unwrap()
            .copy_from_slice(b"mail: joe@x");

        engine.run().unwrap();
        assert_eq!(engine.param_stack().unwrap(), vec![Word::flag(true)]);

        let cells: Vec<i64> = (OUT..OUT + 6)
            .map(|i| engine.read_cell(Word::cell(i)).unwrap().as_i64())
            .collect();
        assert_eq!(cells, vec![6, 11, 6, 9, -1, -1]);
    }

    #[test]
    fn bad_pattern_halts_the_engine() {
        let mut builder = ImageBuilder::new();
        let lit = builder.cfa("(literal)").unwrap();
        let comp = builder.cfa("re-compile").unwrap();
        let main = builder
            .colon("main", &[lit, Word::cell(600 * 8), lit, Word::data(0), comp])
            .unwrap();
        builder.set_entry(main);
        let image = builder.finish();

        let mut engine = Engine::new(EngineParams::new(8192, 512), Some(&image), (), &[]).unwrap();
        engine
            .bytes_mut(Word::cell(600 * 8), 3)
            .unwrap()
            .copy_from_slice(b"\x02a(");
        let err = engine.run().unwrap_err();
        assert!(matches!(err, Error::RegexCompile { .. }));
        assert!(err.is_fatal());
        assert!(!engine.is_pending());
    }
}
