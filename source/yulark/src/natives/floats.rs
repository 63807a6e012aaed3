use crate::{word::Word, Engine, Error};
use core::ops::Neg;

impl<T: 'static> Engine<T> {
    fn binary_float(&mut self, op: impl FnOnce(f64, f64) -> f64) -> Result<(), Error> {
        let a = self.pop()?.as_f64();
        let b = self.pop()?.as_f64();
        self.push(Word::float(op(b, a)))?;
        self.next()
    }

    fn unary_float(&mut self, op: impl FnOnce(f64) -> f64) -> Result<(), Error> {
        let a = self.pop()?.as_f64();
        self.push(Word::float(op(a)))?;
        self.next()
    }

    pub fn float_add(&mut self) -> Result<(), Error> {
        self.binary_float(|b, a| b + a)
    }

    pub fn float_sub(&mut self) -> Result<(), Error> {
        self.binary_float(|b, a| b - a)
    }

    pub fn float_mul(&mut self) -> Result<(), Error> {
        self.binary_float(|b, a| b * a)
    }

    pub fn float_div(&mut self) -> Result<(), Error> {
        let a = self.pop()?.as_f64();
        let b = self.pop()?.as_f64();
        if a == 0.0 {
            return Err(Error::DivideByZero);
        }
        self.push(Word::float(b / a))?;
        self.next()
    }

    pub fn float_negate(&mut self) -> Result<(), Error> {
        self.unary_float(f64::neg)
    }

    pub fn float_abs(&mut self) -> Result<(), Error> {
        self.unary_float(f64::abs)
    }

    pub fn float_min(&mut self) -> Result<(), Error> {
        self.binary_float(f64::min)
    }

    pub fn float_max(&mut self) -> Result<(), Error> {
        self.binary_float(f64::max)
    }

    pub fn int_to_float(&mut self) -> Result<(), Error> {
        let a = self.pop()?.as_i64();
        self.push(Word::float(a as f64))?;
        self.next()
    }

    /// Truncates towards zero, saturating at the `i64` range. NaN becomes 0.
    pub fn float_to_int(&mut self) -> Result<(), Error> {
        let a = self.pop()?.as_f64();
        self.push(Word::data(a as i64))?;
        self.next()
    }

    /// Print the packed float like C's `"%g "`.
    pub fn float_pop_print(&mut self) -> Result<(), Error> {
        let a = self.pop()?.as_f64();
        let text = format_g(a);
        self.output.push_str(&text)?;
        self.output.push_str(" ")?;
        self.next()
    }
}

/// Format `val` the way C's `%g` does: six significant digits, scientific
/// notation when the exponent is below -4 or at least 6, trailing zeros
/// removed.
pub fn format_g(val: f64) -> String {
    const PRECISION: i32 = 6;

    if val.is_nan() {
        return if val.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if val.is_infinite() {
        return if val < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if val == 0.0 {
        return if val.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to the target precision can bump the exponent (999999.7 is
    // 1e+06), so take the exponent from the rounded form.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, val);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_zeros(mantissa), exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        strip_zeros(&format!("{val:.decimals$}")).to_string()
    }
}

fn strip_zeros(num: &str) -> &str {
    if num.contains('.') {
        num.trim_end_matches('0').trim_end_matches('.')
    } else {
        num
    }
}

#[cfg(test)]
mod test {
    use super::format_g;
    use crate::{testutil::all_runtest, Engine, EngineParams, Word};

    #[test]
    fn g_formatting() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(-2.5), "-2.5");
        assert_eq!(format_g(0.1), "0.1");
        assert_eq!(format_g(1.0 / 3.0), "0.333333");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(999999.7), "1e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(6.02e23), "6.02e+23");
        assert_eq!(format_g(1e100), "1e+100");
        assert_eq!(format_g(f64::INFINITY), "inf");
        assert_eq!(format_g(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_g(f64::NAN), "nan");
    }

    #[test]
    fn float_words() {
        all_runtest(
            r#"
            > 3 s>f 4 s>f f+ f>s
            = 7
            > 3 s>f 4 s>f f- f>s
            = -1
            > 3 s>f 4 s>f f* f>s
            = 12
            > 7 s>f 2 s>f f/ f.
            < 3.5
            > 1 s>f 3 s>f f/ f.
            < 0.333333
            > 5 s>f fnegate fabs f>s
            = 5
            > 2 s>f 9 s>f fmin f>s
            = 2
            > 2 s>f 9 s>f fmax f>s
            = 9
            x 1 s>f 0 s>f f/
            "#,
        );
    }

    #[test]
    fn packed_float_bits_survive_the_stack() {
        let mut engine = Engine::new(EngineParams::new(4096, 256), None, (), &[]).unwrap();
        engine.push(Word::float(-0.25)).unwrap();
        assert_eq!(engine.pop().unwrap().as_f64(), -0.25);
    }
}
