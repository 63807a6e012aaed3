use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    addr::{Bounds, CellAddr},
    arena::MemoryArena,
    dictionary::{Dictionary, Image, ImageBuilder},
    layout::{Layout, LayoutError, ENTRY_CELL, HEADER_CELLS, HERE_CELL},
    natives::{Callback, CoreCallback, Heap, NativeEntry, Patterns},
    output::OutputBuf,
    word::Word,
    Error,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EngineParams {
    /// Total arena size in bytes.
    #[serde(default = "EngineParams::default_capacity")]
    pub capacity: usize,
    /// Bytes carved from the top of the arena for the return stack.
    #[serde(default = "EngineParams::default_return_stack_size")]
    pub return_stack_size: usize,
    /// Bytes of printed output held before `emit` and friends fail.
    #[serde(default = "EngineParams::default_output_buf_size")]
    pub output_buf_size: usize,
}

impl EngineParams {
    pub const DEFAULT_CAPACITY: usize = 1024 * 1024;
    pub const DEFAULT_RETURN_STACK_SIZE: usize = 64 * 1024;
    pub const DEFAULT_OUTPUT_BUF_SIZE: usize = 64 * 1024;

    pub const fn new(capacity: usize, return_stack_size: usize) -> Self {
        Self {
            capacity,
            return_stack_size,
            output_buf_size: Self::DEFAULT_OUTPUT_BUF_SIZE,
        }
    }

    const fn default_capacity() -> usize {
        Self::DEFAULT_CAPACITY
    }
    const fn default_return_stack_size() -> usize {
        Self::DEFAULT_RETURN_STACK_SIZE
    }
    const fn default_output_buf_size() -> usize {
        Self::DEFAULT_OUTPUT_BUF_SIZE
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_RETURN_STACK_SIZE)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Done,
    NotDone,
}

/// The inner interpreter.
///
/// Owns one [`MemoryArena`], committed in full when the engine is built, and
/// the four registers that walk it. Registers are cell offsets; none of them
/// is ever assigned a value that failed validation.
pub struct Engine<T: 'static> {
    arena: MemoryArena,
    layout: Layout,

    psp: Word,
    rsp: Word,
    wa: Word,
    wp: Word,

    /// Callback scheduled by the last `next`.
    pending: Option<Word>,
    cycles: u64,
    /// Offending value of the address fault that corrupted this engine.
    fault: Option<Word>,

    pub output: OutputBuf,
    pub host_ctxt: T,
    natives: &'static [NativeEntry<T>],
    pub(crate) heap: Heap,
    pub(crate) patterns: Patterns,
}

/// Build an engine over a fresh arena of `capacity` bytes, load `image` (or
/// the default image with the core words and `natives`) and run it from the
/// entry cell until a primitive halts it.
pub fn run<T: 'static>(
    capacity: usize,
    return_stack_size: usize,
    image: Option<&Image>,
    host_ctxt: T,
    natives: &'static [NativeEntry<T>],
) -> Result<Engine<T>, Error> {
    let params = EngineParams::new(capacity, return_stack_size);
    let mut engine = Engine::new(params, image, host_ctxt, natives)?;
    engine.run()?;
    Ok(engine)
}

impl<T: 'static> Engine<T> {
    pub fn new(
        params: EngineParams,
        image: Option<&Image>,
        host_ctxt: T,
        natives: &'static [NativeEntry<T>],
    ) -> Result<Self, Error> {
        let arena = MemoryArena::with_capacity(params.capacity);
        Self::with_arena(arena, params, image, host_ctxt, natives)
    }

    /// Like [`Engine::new`], but reuses the storage of `arena`. The arena's
    /// capacity takes precedence over `params.capacity`.
    pub fn with_arena(
        mut arena: MemoryArena,
        params: EngineParams,
        image: Option<&Image>,
        host_ctxt: T,
        natives: &'static [NativeEntry<T>],
    ) -> Result<Self, Error> {
        let layout = Layout::new(arena.capacity(), params.return_stack_size)?;

        let default_image;
        let image = match image {
            Some(image) => image,
            None => {
                default_image = ImageBuilder::with_natives(natives)?.finish();
                &default_image
            }
        };
        layout.check_image(image.len_cells())?;

        arena.commit(arena.capacity())?;
        let bytes = arena.as_bytes_mut();
        bytes.fill(0);
        let src = image.as_bytes();
        bytes
            .get_mut(..src.len())
            .ok_or(LayoutError::ImageTooLarge {
                image_cells: image.len_cells(),
                available: layout.return_base(),
            })?
            .copy_from_slice(src);

        tracing::debug!(
            capacity = arena.capacity(),
            return_cells = layout.return_cells(),
            image_cells = image.len_cells(),
            natives = natives.len(),
            "engine loaded"
        );

        let mut engine = Self {
            arena,
            layout,
            psp: Word::cell(layout.param_empty()),
            rsp: Word::cell(layout.return_empty()),
            wa: Word::cell(ENTRY_CELL),
            wp: Word::cell(ENTRY_CELL),
            pending: None,
            cycles: 0,
            fault: None,
            output: OutputBuf::new(params.output_buf_size),
            host_ctxt,
            natives,
            heap: Heap::default(),
            patterns: Patterns::default(),
        };
        engine.boot()?;
        Ok(engine)
    }

    /// Point `WP` at the entry cell with an empty return stack and schedule
    /// the entry word.
    fn boot(&mut self) -> Result<(), Error> {
        self.rsp = Word::cell(self.layout.return_empty());
        self.wp = Word::cell(ENTRY_CELL);
        self.next()
    }

    // ----- inner interpreter -----

    /// Fetch the code-field address at `WP` into `WA`, advance `WP` by one
    /// cell and schedule the callback held in the code field at `WA`.
    pub fn next(&mut self) -> Result<(), Error> {
        let bounds = self.bounds();
        let wp = bounds.check(self.wp)?;
        let wa = self.read(wp)?;
        self.wp = wp.advance(bounds)?.to_word();
        self.enter(wa)
    }

    /// Make `wa` the current word and schedule its code field.
    pub(crate) fn enter(&mut self, wa: Word) -> Result<(), Error> {
        let cfa = self.bounds().check(wa)?;
        self.wa = wa;
        self.pending = Some(self.read(cfa)?);
        Ok(())
    }

    /// Read the operand cell at `WP` and step over it.
    pub(crate) fn take_inline(&mut self) -> Result<Word, Error> {
        let bounds = self.bounds();
        let wp = bounds.check(self.wp)?;
        let val = self.read(wp)?;
        self.wp = wp.advance(bounds)?.to_word();
        Ok(val)
    }

    /// Move `WP` by `offset` cells.
    pub(crate) fn jump(&mut self, offset: i64) -> Result<(), Error> {
        let bounds = self.bounds();
        self.wp = bounds.check(self.wp)?.offset(offset, bounds)?.to_word();
        Ok(())
    }

    /// Call: save `WP` on the return stack and continue with the first cell
    /// of the parameter field at `WA`.
    pub fn docol(&mut self) -> Result<(), Error> {
        self.rpush(self.wp)?;
        let bounds = self.bounds();
        self.wp = bounds.check(self.wa)?.advance(bounds)?.to_word();
        self.next()
    }

    /// Return: restore `WP` from the return stack.
    pub fn exit(&mut self) -> Result<(), Error> {
        let wp = self.rpop()?;
        self.wp = self.bounds().check(wp)?.to_word();
        self.next()
    }

    /// Run the pending callback, if any.
    pub fn step(&mut self) -> Result<Step, Error> {
        if let Some(raw) = self.fault {
            return Err(Error::InvalidAddress(raw));
        }
        let Some(code) = self.pending.take() else {
            return Ok(Step::Done);
        };
        self.cycles += 1;
        tracing::trace!(wa = ?self.wa, wp = ?self.wp, callback = code.as_u64(), "dispatch");

        match self.callback(code).and_then(|func| func(self)) {
            Ok(()) if self.pending.is_some() => Ok(Step::NotDone),
            Ok(()) => Ok(Step::Done),
            Err(err) => Err(self.fail(err)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(cycles))]
    pub fn run(&mut self) -> Result<(), Error> {
        while let Step::NotDone = self.step()? {}
        tracing::Span::current().record("cycles", self.cycles);
        Ok(())
    }

    /// Re-point the entry cell at `cfa` and run again. The parameter stack
    /// is left as it is.
    pub fn run_from(&mut self, cfa: Word) -> Result<(), Error> {
        if let Some(raw) = self.fault {
            return Err(Error::InvalidAddress(raw));
        }
        let booted = self
            .write_cell(Word::cell(ENTRY_CELL), cfa)
            .and_then(|()| self.boot());
        if let Err(err) = booted {
            return Err(self.fail(err));
        }
        self.run()
    }

    fn callback(&self, code: Word) -> Result<Callback<T>, Error> {
        let id = code.as_u64();
        if let Some(core) = CoreCallback::from_id(id) {
            return Ok(core.func());
        }
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(CoreCallback::COUNT))
            .and_then(|idx| self.natives.get(idx))
            .map(|entry| entry.func)
            .ok_or(Error::UnknownCallback(code))
    }

    fn fail(&mut self, err: Error) -> Error {
        self.pending = None;
        if let Error::InvalidAddress(raw) = err {
            self.fault = Some(raw);
        }
        if err.is_fatal() {
            tracing::error!(
                ?err,
                wa = ?self.wa,
                wp = ?self.wp,
                cycles = self.cycles,
                "engine halted"
            );
        } else {
            tracing::warn!(?err, wa = ?self.wa, wp = ?self.wp, "engine halted");
        }
        err
    }

    // ----- memory -----

    /// Every cell of committed memory.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::of_fill(self.arena.fill())
    }

    #[inline]
    fn read(&self, addr: CellAddr) -> Result<Word, Error> {
        addr.read(self.arena.as_bytes())
    }

    #[inline]
    fn write(&mut self, addr: CellAddr, word: Word) -> Result<(), Error> {
        addr.write(self.arena.as_bytes_mut(), word)
    }

    /// Read the cell at offset `raw`.
    pub fn read_cell(&self, raw: Word) -> Result<Word, Error> {
        self.read(self.bounds().check(raw)?)
    }

    /// Write the cell at offset `raw`.
    pub fn write_cell(&mut self, raw: Word, word: Word) -> Result<(), Error> {
        let addr = self.bounds().check(raw)?;
        self.write(addr, word)
    }

    fn byte_range(&self, addr: Word, len: usize) -> Result<core::ops::Range<usize>, Error> {
        let start = usize::try_from(addr)?;
        match start.checked_add(len) {
            Some(end) if end <= self.arena.fill() => Ok(start..end),
            _ => Err(Error::InvalidAddress(addr)),
        }
    }

    /// `len` bytes starting at byte address `addr`.
    pub fn bytes(&self, addr: Word, len: usize) -> Result<&[u8], Error> {
        let range = self.byte_range(addr, len)?;
        Ok(&self.arena.as_bytes()[range])
    }

    pub fn bytes_mut(&mut self, addr: Word, len: usize) -> Result<&mut [u8], Error> {
        let range = self.byte_range(addr, len)?;
        Ok(&mut self.arena.as_bytes_mut()[range])
    }

    /// First free dictionary cell.
    pub fn here(&self) -> Result<usize, Error> {
        let raw = self.read_cell(Word::cell(HERE_CELL))?;
        match usize::try_from(raw.as_u64()) {
            Ok(here) if (HEADER_CELLS..=self.layout.param_empty()).contains(&here) => Ok(here),
            _ => Err(Error::InvalidAddress(raw)),
        }
    }

    /// Move `HERE`. The dictionary may not grow into the live parameter stack.
    pub(crate) fn set_here(&mut self, here: usize) -> Result<(), Error> {
        let psp = self.bounds().check(self.psp)?.index();
        if !(HEADER_CELLS..=psp).contains(&here) {
            return Err(Error::InvalidAddress(Word::cell(here)));
        }
        self.write_cell(Word::cell(HERE_CELL), Word::cell(here))
    }

    // ----- stacks -----

    pub fn push(&mut self, word: Word) -> Result<(), Error> {
        let slots = self.layout.param_slots(self.here()?);
        let sp = self.bounds().check(self.psp)?.retreat(slots)?;
        self.write(sp, word)?;
        self.psp = sp.to_word();
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word, Error> {
        let here = self.here()?;
        let sp = self.layout.param_slots(here).check(self.psp)?;
        let word = self.read(sp)?;
        self.psp = sp.advance(self.layout.param_positions(here))?.to_word();
        Ok(word)
    }

    pub fn peek(&self) -> Result<Word, Error> {
        let sp = self.layout.param_slots(self.here()?).check(self.psp)?;
        self.read(sp)
    }

    pub fn rpush(&mut self, word: Word) -> Result<(), Error> {
        let rp = self
            .layout
            .return_positions()
            .check(self.rsp)?
            .retreat(self.layout.return_slots())?;
        self.write(rp, word)?;
        self.rsp = rp.to_word();
        Ok(())
    }

    pub fn rpop(&mut self) -> Result<Word, Error> {
        let rp = self.layout.return_slots().check(self.rsp)?;
        let word = self.read(rp)?;
        self.rsp = rp.advance(self.layout.return_positions())?.to_word();
        Ok(word)
    }

    pub fn rpeek(&self) -> Result<Word, Error> {
        let rp = self.layout.return_slots().check(self.rsp)?;
        self.read(rp)
    }

    pub fn param_depth(&self) -> usize {
        self.layout
            .param_empty()
            .saturating_sub(self.psp.as_u64() as usize)
    }

    pub fn return_depth(&self) -> usize {
        self.layout
            .return_empty()
            .saturating_sub(self.rsp.as_u64() as usize)
    }

    /// The parameter stack, bottom first.
    pub fn param_stack(&self) -> Result<Vec<Word>, Error> {
        let top = self.bounds().check(self.psp)?.index();
        (top..self.layout.param_empty())
            .rev()
            .map(|idx| self.read_cell(Word::cell(idx)))
            .collect()
    }

    // ----- inspection -----

    #[inline]
    pub fn wp(&self) -> Word {
        self.wp
    }

    #[inline]
    pub fn wa(&self) -> Word {
        self.wa
    }

    #[inline]
    pub fn psp(&self) -> Word {
        self.psp
    }

    #[inline]
    pub fn rsp(&self) -> Word {
        self.rsp
    }

    /// Callbacks dispatched so far.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[inline]
    pub fn is_corrupted(&self) -> bool {
        self.fault.is_some()
    }

    /// True when a callback is scheduled and [`Engine::step`] will run it.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn arena(&self) -> &MemoryArena {
        &self.arena
    }

    pub fn dictionary(&self) -> Dictionary<'_> {
        Dictionary::new(self.arena.as_bytes())
    }

    /// Code-field address of the visible word called `name`.
    pub fn find_word(&self, name: &str) -> Option<Word> {
        self.dictionary().find(name).map(|entry| entry.cfa())
    }

    pub fn take_output(&mut self) -> String {
        self.output.take()
    }

    /// Printed output exactly as the natives wrote it.
    pub fn take_output_bytes(&mut self) -> Vec<u8> {
        self.output.take_bytes()
    }

    /// Tear the engine down, handing back the arena storage.
    pub fn into_arena(self) -> MemoryArena {
        self.arena
    }
}

impl<T: 'static> fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("arena", &self.arena)
            .field("psp", &self.psp)
            .field("rsp", &self.rsp)
            .field("wa", &self.wa)
            .field("wp", &self.wp)
            .field("cycles", &self.cycles)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}
