use crate::{Engine, Error, Word};

impl<T: 'static> Engine<T> {
    /// Code field of a variable: push the address of its parameter field.
    pub fn dovar(&mut self) -> Result<(), Error> {
        let bounds = self.bounds();
        let pfa = bounds.check(self.wa())?.advance(bounds)?;
        self.push(pfa.to_word())?;
        self.next()
    }

    /// Code field of a constant: push the value in its parameter field.
    pub fn doconst(&mut self) -> Result<(), Error> {
        let bounds = self.bounds();
        let pfa = bounds.check(self.wa())?.advance(bounds)?;
        let val = self.read_cell(pfa.to_word())?;
        self.push(val)?;
        self.next()
    }

    /// Stop dispatching. The only core word that does not call `next`.
    pub fn halt(&mut self) -> Result<(), Error> {
        tracing::debug!(cycles = self.cycles(), depth = self.param_depth(), "halt");
        Ok(())
    }

    pub fn noop(&mut self) -> Result<(), Error> {
        self.next()
    }

    /// `(literal) n`: push the inline cell `n`.
    pub fn literal(&mut self) -> Result<(), Error> {
        let val = self.take_inline()?;
        self.push(val)?;
        self.next()
    }

    /// `(branch) n`: continue `n` cells after the operand.
    pub fn branch(&mut self) -> Result<(), Error> {
        let offset = self.take_inline()?.as_i64();
        self.jump(offset)?;
        self.next()
    }

    /// `(0branch) n`: like `(branch)` when the popped flag is zero,
    /// otherwise fall through.
    pub fn branch_if_zero(&mut self) -> Result<(), Error> {
        let offset = self.take_inline()?.as_i64();
        if self.pop()?.is_zero() {
            self.jump(offset)?;
        }
        self.next()
    }

    /// `( cfa -- )`: dispatch the word at `cfa` as if it were the next cell.
    pub fn execute(&mut self) -> Result<(), Error> {
        let cfa = self.pop()?;
        self.enter(cfa)
    }
}
