// Double-number words
//
// A double occupies two stack cells, high cell on top. Mixed words (M*, UM/MOD, ...) take
// their cell operands above the double.

use crate::error::ForthError;
use crate::internals::builtin::{BuiltInFn, Inline};
use crate::kernel::*;
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    fn pop2_double(&mut self) -> Result<(DCell, DCell), ForthError> {
        self.kernel.stack_check(4)?;
        let b = self.kernel.pop_double()?;
        let a = self.kernel.pop_double()?;
        Ok((a, b))
    }

    pub fn f_s_to_d(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop()?;
        self.kernel.push_double(n as DCell)
    }

    pub fn f_d_to_s(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push(truncate_to_cell(d))
    }

    /// 2LITERAL ( x1 x2 -- ) compiles a double
    pub fn f_2literal(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.compile_2literal(d)
    }

    pub fn f_2constant(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        if !self.define("2CONSTANT")? {
            return Ok(());
        }
        self.comma((d >> 32) as Cell)?;
        self.comma(d as Cell)
    }

    pub fn f_2variable(&mut self) -> Result<(), ForthError> {
        if !self.define("2VARIABLE")? {
            return Ok(());
        }
        self.comma(0)?;
        self.comma(0)
    }

    pub fn f_d_plus(&mut self) -> Result<(), ForthError> {
        let (a, b) = self.pop2_double()?;
        self.kernel.push_double(a.wrapping_add(b))
    }

    pub fn f_d_minus(&mut self) -> Result<(), ForthError> {
        let (a, b) = self.pop2_double()?;
        self.kernel.push_double(a.wrapping_sub(b))
    }

    pub fn f_dnegate(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push_double(d.wrapping_neg())
    }

    pub fn f_dabs(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push_double(d.wrapping_abs())
    }

    pub fn f_d_equal(&mut self) -> Result<(), ForthError> {
        let (a, b) = self.pop2_double()?;
        self.kernel.push_flag(a == b)
    }

    pub fn f_d_less(&mut self) -> Result<(), ForthError> {
        let (a, b) = self.pop2_double()?;
        self.kernel.push_flag(a < b)
    }

    pub fn f_d_zero_equal(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push_flag(d == 0)
    }

    pub fn f_d_zero_less(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push_flag(d < 0)
    }

    pub fn f_d_two_star(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push_double(d.wrapping_shl(1))
    }

    pub fn f_d_two_slash(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.kernel.push_double(d >> 1)
    }

    pub fn f_dmax(&mut self) -> Result<(), ForthError> {
        let (a, b) = self.pop2_double()?;
        self.kernel.push_double(a.max(b))
    }

    pub fn f_dmin(&mut self) -> Result<(), ForthError> {
        let (a, b) = self.pop2_double()?;
        self.kernel.push_double(a.min(b))
    }

    /// M* ( n1 n2 -- d )
    pub fn f_m_star(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let b = self.kernel.pop()? as DCell;
        let a = self.kernel.pop()? as DCell;
        self.kernel.push_double(a * b)
    }

    /// UM* ( u1 u2 -- ud )
    pub fn f_um_star(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let b = self.kernel.pop()? as UCell as UDCell;
        let a = self.kernel.pop()? as UCell as UDCell;
        self.kernel.push_double((a * b) as DCell)
    }

    /// UM/MOD ( ud u1 -- urem uquot )
    pub fn f_um_slash_mod(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let d = self.kernel.pop()? as UCell as UDCell;
        let n = self.kernel.pop_double()? as UDCell;
        if d == 0 {
            return Err(ForthError::DivisionByZero);
        }
        self.kernel.push((n % d) as Cell)?;
        self.kernel.push((n / d) as Cell)
    }

    /// SM/REM ( d n -- rem quot ) symmetric
    pub fn f_sm_slash_rem(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let d = self.kernel.pop()? as DCell;
        let n = self.kernel.pop_double()?;
        if d == 0 {
            return Err(ForthError::DivisionByZero);
        }
        self.kernel.push(truncate_to_cell(n.wrapping_rem(d)))?;
        self.kernel.push(truncate_to_cell(n.wrapping_div(d)))
    }

    /// FM/MOD ( d n -- rem quot ) floored
    pub fn f_fm_slash_mod(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let d = self.kernel.pop()? as DCell;
        let n = self.kernel.pop_double()?;
        if d == 0 {
            return Err(ForthError::DivisionByZero);
        }
        let mut quot = n.wrapping_div(d);
        let mut rem = n.wrapping_rem(d);
        if rem != 0 && (rem < 0) != (d < 0) {
            quot -= 1;
            rem += d;
        }
        self.kernel.push(truncate_to_cell(rem))?;
        self.kernel.push(truncate_to_cell(quot))
    }

    /// M+ ( d n -- d' )
    pub fn f_m_plus(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let n = self.kernel.pop()? as DCell;
        let d = self.kernel.pop_double()?;
        self.kernel.push_double(d.wrapping_add(n))
    }

    /// M- ( d n -- d' )
    pub fn f_m_minus(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let n = self.kernel.pop()? as DCell;
        let d = self.kernel.pop_double()?;
        self.kernel.push_double(d.wrapping_sub(n))
    }

    /// M/ ( d n -- quot ) symmetric
    pub fn f_m_slash(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let n = self.kernel.pop()? as DCell;
        let d = self.kernel.pop_double()?;
        if n == 0 {
            return Err(ForthError::DivisionByZero);
        }
        self.kernel.push(truncate_to_cell(d.wrapping_div(n)))
    }

    /// M*/ ( d1 n1 +n2 -- d2 ) with a triple-width intermediate
    pub fn f_m_star_slash(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(4)?;
        let div = self.kernel.pop()? as i128;
        let mul = self.kernel.pop()? as i128;
        let d = self.kernel.pop_double()? as i128;
        if div == 0 {
            return Err(ForthError::DivisionByZero);
        }
        self.kernel.push_double((d * mul / div) as DCell)
    }
}

pub(crate) static DOUBLE_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("2LITERAL", ForthRuntime::f_2literal, "( x1 x2 -- )", "Compile a double; at run time push it")
        .runtime(ForthRuntime::i_2literal)
        .immediate()
        .compile_only()
        .inline(Inline::Double),
    BuiltInFn::new("2CONSTANT", ForthRuntime::f_2constant, "( x1 x2 \"name\" -- )", "Define a double constant")
        .runtime(ForthRuntime::i_2constant),
    BuiltInFn::new("2VARIABLE", ForthRuntime::f_2variable, "( \"name\" -- )", "Define a two-cell variable")
        .runtime(ForthRuntime::i_create),
    BuiltInFn::new("D+", ForthRuntime::f_d_plus, "( d1 d2 -- d3 )", "Add doubles"),
    BuiltInFn::new("D-", ForthRuntime::f_d_minus, "( d1 d2 -- d3 )", "Subtract doubles"),
    BuiltInFn::new("DNEGATE", ForthRuntime::f_dnegate, "( d -- -d )", "Negate a double"),
    BuiltInFn::new("DABS", ForthRuntime::f_dabs, "( d -- ud )", "Absolute value of a double"),
    BuiltInFn::new("D=", ForthRuntime::f_d_equal, "( d1 d2 -- flag )", "True if equal"),
    BuiltInFn::new("D<", ForthRuntime::f_d_less, "( d1 d2 -- flag )", "True if d1 < d2"),
    BuiltInFn::new("D0=", ForthRuntime::f_d_zero_equal, "( d -- flag )", "True if zero"),
    BuiltInFn::new("D0<", ForthRuntime::f_d_zero_less, "( d -- flag )", "True if negative"),
    BuiltInFn::new("D2*", ForthRuntime::f_d_two_star, "( d -- d*2 )", "Shift a double left one bit"),
    BuiltInFn::new("D2/", ForthRuntime::f_d_two_slash, "( d -- d/2 )", "Arithmetic shift a double right one bit"),
    BuiltInFn::new("DMAX", ForthRuntime::f_dmax, "( d1 d2 -- d3 )", "Larger of two doubles"),
    BuiltInFn::new("DMIN", ForthRuntime::f_dmin, "( d1 d2 -- d3 )", "Smaller of two doubles"),
    BuiltInFn::new("D>S", ForthRuntime::f_d_to_s, "( d -- n )", "Convert a double to a single"),
    BuiltInFn::new("M+", ForthRuntime::f_m_plus, "( d n -- d' )", "Add a single to a double"),
    BuiltInFn::new("M*/", ForthRuntime::f_m_star_slash, "( d1 n1 +n2 -- d2 )", "d1*n1/n2 with a triple-width product"),
];

pub(crate) static DOUBLE_CORE_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("S>D", ForthRuntime::f_s_to_d, "( n -- d )", "Sign-extend a single to a double"),
    BuiltInFn::new("M*", ForthRuntime::f_m_star, "( n1 n2 -- d )", "Signed double-width product"),
    BuiltInFn::new("UM*", ForthRuntime::f_um_star, "( u1 u2 -- ud )", "Unsigned double-width product"),
    BuiltInFn::new("UM/MOD", ForthRuntime::f_um_slash_mod, "( ud u1 -- urem uquot )", "Unsigned double by single division"),
    BuiltInFn::new("SM/REM", ForthRuntime::f_sm_slash_rem, "( d n -- rem quot )", "Symmetric double by single division"),
    BuiltInFn::new("FM/MOD", ForthRuntime::f_fm_slash_mod, "( d n -- rem quot )", "Floored double by single division"),
];

pub(crate) static DOUBLE_COMMON_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("M-", ForthRuntime::f_m_minus, "( d n -- d' )", "Subtract a single from a double"),
    BuiltInFn::new("M/", ForthRuntime::f_m_slash, "( d n -- quot )", "Divide a double by a single"),
];

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;

    fn forth() -> ForthRuntime {
        ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap()
    }

    #[test]
    fn test_double_arithmetic() {
        let mut f = forth();
        f.interpret_line("1.5 2.5 d+").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 40);
        f.interpret_line("4294967296. 1. d-").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 4294967295);
        f.interpret_line("-7 s>d dabs").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 7);
    }

    #[test]
    fn test_mixed_products() {
        let mut f = forth();
        f.interpret_line("100000 100000 m*").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 10_000_000_000);
        f.interpret_line("-1 2 um*").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 0x1_FFFF_FFFE);
    }

    #[test]
    fn test_division_flavors() {
        let mut f = forth();
        f.interpret_line("-7 s>d 2 sm/rem").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), -3);
        assert_eq!(f.kernel.pop().unwrap(), -1);
        f.interpret_line("-7 s>d 2 fm/mod").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), -4);
        assert_eq!(f.kernel.pop().unwrap(), 1);
        f.interpret_line("10. 3 um/mod").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 3);
        assert_eq!(f.kernel.pop().unwrap(), 1);
        assert!(f.interpret_line("10. 0 m/").is_err());
    }

    #[test]
    fn test_two_constant_and_literal() {
        let mut f = forth();
        f.interpret_line("123456789012. 2constant big big").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 123456789012);
        f.interpret_line(": lit [ 5. ] 2literal ; lit").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 5);
        f.interpret_line("2variable pair 7. pair 2! pair 2@").unwrap();
        assert_eq!(f.kernel.pop_double().unwrap(), 7);
    }

    #[test]
    fn test_double_comparisons() {
        let mut f = forth();
        f.interpret_line("1. 2. d< 2. 1. d< 0. d0= -1. d0<").unwrap();
        let flags: Vec<Cell> = f.kernel.data_stack().iter_from_bottom().copied().collect();
        assert_eq!(flags, vec![-1, 0, -1, -1]);
    }
}
