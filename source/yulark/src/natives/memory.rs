use core::fmt::Write;

use crate::{word::CELL, Engine, Error, Word};

// Cell words (`@ ! , here allot`) take cell offsets. Byte words (`c@ c!
// type`) take byte offsets; `cells` converts the former into the latter.

impl<T: 'static> Engine<T> {
    pub fn fetch(&mut self) -> Result<(), Error> {
        let addr = self.pop()?;
        let val = self.read_cell(addr)?;
        self.push(val)?;
        self.next()
    }

    /// `( w addr -- )`
    pub fn store(&mut self) -> Result<(), Error> {
        let addr = self.pop()?;
        let val = self.pop()?;
        self.write_cell(addr, val)?;
        self.next()
    }

    pub fn byte_fetch(&mut self) -> Result<(), Error> {
        let addr = self.pop()?;
        let byte = self.bytes(addr, 1)?[0];
        self.push(Word::data(i64::from(byte)))?;
        self.next()
    }

    /// `( c c-addr -- )`
    pub fn byte_store(&mut self) -> Result<(), Error> {
        let addr = self.pop()?;
        let val = self.pop()?.as_i64();
        self.bytes_mut(addr, 1)?[0] = val as u8;
        self.next()
    }

    pub fn push_here(&mut self) -> Result<(), Error> {
        let here = self.here()?;
        self.push(Word::cell(here))?;
        self.next()
    }

    /// `( w -- )`: store `w` at `HERE` and move `HERE` up one cell.
    pub fn comma(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        let here = self.here()?;
        self.set_here(here + 1)?;
        self.write_cell(Word::cell(here), val)?;
        self.next()
    }

    /// `( n -- )`: move `HERE` by `n` cells, which may be negative.
    pub fn allot(&mut self) -> Result<(), Error> {
        let n = self.pop()?.as_i64();
        let here = self.here()? as i64;
        let new = here.wrapping_add(n);
        let new = usize::try_from(new).map_err(|_| Error::InvalidAddress(Word::data(new)))?;
        self.set_here(new)?;
        self.next()
    }

    pub fn cells(&mut self) -> Result<(), Error> {
        let n = self.pop()?.as_i64();
        self.push(Word::data(n.wrapping_mul(CELL as i64)))?;
        self.next()
    }

    pub fn emit(&mut self) -> Result<(), Error> {
        let val = self.pop()?.as_i64();
        self.output.push_bytes(&[val as u8])?;
        self.next()
    }

    pub fn pop_print(&mut self) -> Result<(), Error> {
        let val = self.pop()?.as_i64();
        write!(&mut self.output, "{val} ")?;
        self.next()
    }

    pub fn cr(&mut self) -> Result<(), Error> {
        self.output.push_str("\n")?;
        self.next()
    }

    /// `( c-addr len -- )`
    pub fn type_bytes(&mut self) -> Result<(), Error> {
        let len = self.pop()?;
        let addr = self.pop()?;
        let len = usize::try_from(len)?;
        let text = self.bytes(addr, len)?.to_vec();
        self.output.push_bytes(&text)?;
        self.next()
    }
}

#[cfg(test)]
mod test {
    use crate::testutil::all_runtest;

    #[test]
    fn cells_and_bytes() {
        all_runtest(
            r#"
            : poke 99 here ! here @ ;
            > poke
            = 99
            : bytes 65 here cells c! here cells c@ ;
            > bytes
            = 65
            > 3 cells
            = 24
            "#,
        );
    }

    #[test]
    fn dictionary_growth() {
        all_runtest(
            r#"
            : grow here 5 , here swap - ;
            > grow
            = 1
            : shrink here 2 allot -2 allot here = ;
            > shrink
            = -1
            x -1000000 allot
            "#,
        );
    }

    #[test]
    fn printing() {
        all_runtest(
            r#"
            > 1 2 . .
            < 2 1
            > 72 emit 105 emit cr
            < Hi
            > 195 emit 169 emit
            < é
            : greet 72 here cells c! 105 here cells 1+ c! here cells 2 type ;
            > greet
            < Hi
            "#,
        );
    }
}
