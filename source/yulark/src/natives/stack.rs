use crate::{Engine, Error, Word};

impl<T: 'static> Engine<T> {
    fn binary_int(&mut self, op: impl FnOnce(i64, i64) -> i64) -> Result<(), Error> {
        let a = self.pop()?.as_i64();
        let b = self.pop()?.as_i64();
        self.push(Word::data(op(b, a)))?;
        self.next()
    }

    fn unary_int(&mut self, op: impl FnOnce(i64) -> i64) -> Result<(), Error> {
        let a = self.pop()?.as_i64();
        self.push(Word::data(op(a)))?;
        self.next()
    }

    fn compare(&mut self, op: impl FnOnce(i64, i64) -> bool) -> Result<(), Error> {
        let a = self.pop()?.as_i64();
        let b = self.pop()?.as_i64();
        self.push(Word::flag(op(b, a)))?;
        self.next()
    }

    pub fn dup(&mut self) -> Result<(), Error> {
        let val = self.peek()?;
        self.push(val)?;
        self.next()
    }

    pub fn discard(&mut self) -> Result<(), Error> {
        self.pop()?;
        self.next()
    }

    pub fn swap(&mut self) -> Result<(), Error> {
        let a = self.pop()?;
        let b = self.pop()?;
        self.push(a)?;
        self.push(b)?;
        self.next()
    }

    pub fn over(&mut self) -> Result<(), Error> {
        let a = self.pop()?;
        let b = self.peek()?;
        self.push(a)?;
        self.push(b)?;
        self.next()
    }

    /// `( a b c -- b c a )`
    pub fn rot(&mut self) -> Result<(), Error> {
        let c = self.pop()?;
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(c)?;
        self.push(a)?;
        self.next()
    }

    pub fn data_to_return_stack(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        self.rpush(val)?;
        self.next()
    }

    pub fn return_to_data_stack(&mut self) -> Result<(), Error> {
        let val = self.rpop()?;
        self.push(val)?;
        self.next()
    }

    pub fn return_peek(&mut self) -> Result<(), Error> {
        let val = self.rpeek()?;
        self.push(val)?;
        self.next()
    }

    pub fn depth(&mut self) -> Result<(), Error> {
        let depth = self.param_depth();
        self.push(Word::cell(depth))?;
        self.next()
    }

    pub fn add(&mut self) -> Result<(), Error> {
        self.binary_int(i64::wrapping_add)
    }

    pub fn sub(&mut self) -> Result<(), Error> {
        self.binary_int(i64::wrapping_sub)
    }

    pub fn mul(&mut self) -> Result<(), Error> {
        self.binary_int(i64::wrapping_mul)
    }

    pub fn div(&mut self) -> Result<(), Error> {
        let a = self.pop()?.as_i64();
        let b = self.pop()?.as_i64();
        if a == 0 {
            return Err(Error::DivideByZero);
        }
        self.push(Word::data(b.wrapping_div(a)))?;
        self.next()
    }

    pub fn modu(&mut self) -> Result<(), Error> {
        let a = self.pop()?.as_i64();
        let b = self.pop()?.as_i64();
        if a == 0 {
            return Err(Error::DivideByZero);
        }
        self.push(Word::data(b.wrapping_rem(a)))?;
        self.next()
    }

    pub fn negate(&mut self) -> Result<(), Error> {
        self.unary_int(i64::wrapping_neg)
    }

    pub fn incr(&mut self) -> Result<(), Error> {
        self.unary_int(|a| a.wrapping_add(1))
    }

    pub fn decr(&mut self) -> Result<(), Error> {
        self.unary_int(|a| a.wrapping_sub(1))
    }

    pub fn twice(&mut self) -> Result<(), Error> {
        self.unary_int(|a| a.wrapping_mul(2))
    }

    pub fn invert(&mut self) -> Result<(), Error> {
        self.unary_int(|a| !a)
    }

    pub fn and(&mut self) -> Result<(), Error> {
        self.binary_int(|b, a| b & a)
    }

    pub fn or(&mut self) -> Result<(), Error> {
        self.binary_int(|b, a| b | a)
    }

    pub fn xor(&mut self) -> Result<(), Error> {
        self.binary_int(|b, a| b ^ a)
    }

    pub fn equal(&mut self) -> Result<(), Error> {
        self.compare(|b, a| b == a)
    }

    pub fn less(&mut self) -> Result<(), Error> {
        self.compare(|b, a| b < a)
    }

    pub fn greater(&mut self) -> Result<(), Error> {
        self.compare(|b, a| b > a)
    }

    pub fn zero_equal(&mut self) -> Result<(), Error> {
        let a = self.pop()?;
        self.push(Word::flag(a.is_zero()))?;
        self.next()
    }
}

#[cfg(test)]
mod test {
    use crate::testutil::all_runtest;

    #[test]
    fn stack_words() {
        all_runtest(
            r#"
            > 1 2 dup
            = 1 2 2
            > 1 2 3 drop
            = 1 2
            > 1 2 swap
            = 2 1
            > 1 2 over
            = 1 2 1
            > 1 2 3 rot
            = 2 3 1
            > 1 2 3 depth
            = 1 2 3 3
            "#,
        );
    }

    #[test]
    fn return_stack_words() {
        all_runtest(
            r#"
            : stash >r 10 r@ r> ;
            > 7 stash
            = 10 7 7
            "#,
        );
    }

    #[test]
    fn arithmetic() {
        all_runtest(
            r#"
            > 2 3 +
            = 5
            > 2 3 -
            = -1
            > 6 7 *
            = 42
            > 7 2 /
            = 3
            > -7 2 /
            = -3
            > 7 2 mod
            = 1
            > 5 negate
            = -5
            > 5 1+ 1-
            = 5
            > 21 2*
            = 42
            > 12 10 and
            = 8
            > 12 10 or
            = 14
            > 12 10 xor
            = 6
            > 0 invert
            = -1
            x 1 0 /
            x 1 0 mod
            "#,
        );
    }

    #[test]
    fn comparisons() {
        all_runtest(
            r#"
            > 3 3 =
            = -1
            > 3 4 =
            = 0
            > 3 4 <
            = -1
            > 3 4 >
            = 0
            > 0 0=
            = -1
            > 9 0=
            = 0
            "#,
        );
    }
}
