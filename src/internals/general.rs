// General-purpose builtin words

use crate::error::ForthError;
use crate::internals::builtin::BuiltInFn;
use crate::kernel::*;
use crate::runtime::{ForthRuntime, FALSE, TRUE};

fn flag(b: bool) -> Cell {
    if b {
        TRUE
    } else {
        FALSE
    }
}

/// Symmetric division, remainder takes the sign of the dividend.
fn sym_divmod(n: DCell, d: DCell) -> Result<(DCell, DCell), ForthError> {
    if d == 0 {
        return Err(ForthError::DivisionByZero);
    }
    Ok((n.wrapping_div(d), n.wrapping_rem(d)))
}

impl ForthRuntime {
    /// Basic Forth operations on the stack.
    ///
    pub fn f_plus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a.wrapping_add(b))
    }

    pub fn f_minus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a.wrapping_sub(b))
    }

    pub fn f_times(&mut self) -> Result<(), ForthError> {
        self.kernel
            .pop2_push1(|a, b| truncate_to_cell(a as DCell * b as DCell))
    }

    pub fn f_divide(&mut self) -> Result<(), ForthError> {
        let (quot, _) = self.divmod()?;
        self.kernel.push(quot)
    }

    pub fn f_mod(&mut self) -> Result<(), ForthError> {
        let (_, rem) = self.divmod()?;
        self.kernel.push(rem)
    }

    /// /MOD ( n1 n2 -- rem quot )
    pub fn f_slash_mod(&mut self) -> Result<(), ForthError> {
        let (quot, rem) = self.divmod()?;
        self.kernel.push(rem)?;
        self.kernel.push(quot)
    }

    fn divmod(&mut self) -> Result<(Cell, Cell), ForthError> {
        self.kernel.stack_check(2)?;
        let d = self.kernel.pop()?;
        let n = self.kernel.pop()?;
        let (quot, rem) = sym_divmod(n as DCell, d as DCell)?;
        Ok((truncate_to_cell(quot), truncate_to_cell(rem)))
    }

    /// */ ( n1 n2 n3 -- n4 ) with a double-width intermediate
    pub fn f_star_slash(&mut self) -> Result<(), ForthError> {
        let (quot, _) = self.star_slash_mod()?;
        self.kernel.push(quot)
    }

    pub fn f_star_slash_mod(&mut self) -> Result<(), ForthError> {
        let (quot, rem) = self.star_slash_mod()?;
        self.kernel.push(rem)?;
        self.kernel.push(quot)
    }

    fn star_slash_mod(&mut self) -> Result<(Cell, Cell), ForthError> {
        self.kernel.stack_check(3)?;
        let d = self.kernel.pop()? as DCell;
        let b = self.kernel.pop()? as DCell;
        let a = self.kernel.pop()? as DCell;
        let (quot, rem) = sym_divmod(a * b, d)?;
        Ok((truncate_to_cell(quot), truncate_to_cell(rem)))
    }

    pub fn f_negate(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_neg())
    }

    pub fn f_abs(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_abs())
    }

    pub fn f_min(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a.min(b))
    }

    pub fn f_max(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a.max(b))
    }

    pub fn f_one_plus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_add(1))
    }

    pub fn f_one_minus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_sub(1))
    }

    pub fn f_two_plus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_add(2))
    }

    pub fn f_two_minus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_sub(2))
    }

    pub fn f_two_star(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_shl(1))
    }

    pub fn f_two_slash(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a >> 1)
    }

    pub fn f_and(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a & b)
    }

    pub fn f_or(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a | b)
    }

    pub fn f_xor(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| a ^ b)
    }

    pub fn f_invert(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| !a)
    }

    /// LSHIFT and RSHIFT are logical; shifts of 32 or more give zero
    pub fn f_lshift(&mut self) -> Result<(), ForthError> {
        self.kernel
            .pop2_push1(|a, n| (a as UCell).checked_shl(n as u32).unwrap_or(0) as Cell)
    }

    pub fn f_rshift(&mut self) -> Result<(), ForthError> {
        self.kernel
            .pop2_push1(|a, n| (a as UCell).checked_shr(n as u32).unwrap_or(0) as Cell)
    }

    pub fn f_equal(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| flag(a == b))
    }

    pub fn f_not_equal(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| flag(a != b))
    }

    pub fn f_less(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| flag(a < b))
    }

    pub fn f_greater(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| flag(a > b))
    }

    pub fn f_u_less(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| flag((a as UCell) < (b as UCell)))
    }

    pub fn f_u_greater(&mut self) -> Result<(), ForthError> {
        self.kernel.pop2_push1(|a, b| flag((a as UCell) > (b as UCell)))
    }

    pub fn f_0equal(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| flag(a == 0))
    }

    pub fn f_0not_equal(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| flag(a != 0))
    }

    pub fn f_0less(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| flag(a < 0))
    }

    pub fn f_0greater(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| flag(a > 0))
    }

    /// WITHIN ( n lo hi -- flag ) true if lo <= n < hi, with wraparound
    pub fn f_within(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let hi = self.kernel.pop()?;
        let lo = self.kernel.pop()?;
        let n = self.kernel.pop()?;
        let inside = (n.wrapping_sub(lo) as UCell) < (hi.wrapping_sub(lo) as UCell);
        self.kernel.push_flag(inside)
    }

    pub fn f_true(&mut self) -> Result<(), ForthError> {
        self.kernel.push(TRUE)
    }

    pub fn f_false(&mut self) -> Result<(), ForthError> {
        self.kernel.push(FALSE)
    }

    // Stack manipulation

    pub fn f_dup(&mut self) -> Result<(), ForthError> {
        self.kernel.pick(0)
    }

    pub fn f_drop(&mut self) -> Result<(), ForthError> {
        self.kernel.pop()?;
        Ok(())
    }

    pub fn f_swap(&mut self) -> Result<(), ForthError> {
        self.kernel.roll(1)
    }

    pub fn f_over(&mut self) -> Result<(), ForthError> {
        self.kernel.pick(1)
    }

    pub fn f_rot(&mut self) -> Result<(), ForthError> {
        self.kernel.roll(2)
    }

    pub fn f_nip(&mut self) -> Result<(), ForthError> {
        self.kernel.roll(1)?;
        self.kernel.pop()?;
        Ok(())
    }

    pub fn f_tuck(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        self.kernel.roll(1)?;
        self.kernel.pick(1)
    }

    /// PICK ( xu ... x0 u -- xu ... x0 xu ); 0 PICK is DUP
    pub fn f_pick(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop()?;
        if n < 0 {
            return Err(ForthError::DataStackUnderflow);
        }
        self.kernel.pick(n as usize)
    }

    pub fn f_roll(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop()?;
        if n < 0 {
            return Err(ForthError::DataStackUnderflow);
        }
        self.kernel.roll(n as usize)
    }

    pub fn f_question_dup(&mut self) -> Result<(), ForthError> {
        if self.kernel.top()? != 0 {
            self.kernel.pick(0)?;
        }
        Ok(())
    }

    pub fn f_depth(&mut self) -> Result<(), ForthError> {
        let depth = self.kernel.stack_len();
        self.kernel.push(depth as Cell)
    }

    pub fn f_2dup(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        self.kernel.pick(1)?;
        self.kernel.pick(1)
    }

    pub fn f_2drop(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        self.kernel.pop()?;
        self.kernel.pop()?;
        Ok(())
    }

    pub fn f_2swap(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(4)?;
        self.kernel.roll(3)?;
        self.kernel.roll(3)
    }

    pub fn f_2over(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(4)?;
        self.kernel.pick(3)?;
        self.kernel.pick(3)
    }

    // Return stack

    pub fn f_to_r(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop()?;
        self.kernel.push_r(val)
    }

    pub fn f_r_from(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop_r()?;
        self.kernel.push(val)
    }

    pub fn f_r_fetch(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.peek_r(0)?;
        self.kernel.push(val)
    }

    pub fn f_2to_r(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let hi = self.kernel.pop()?;
        let lo = self.kernel.pop()?;
        self.kernel.push_r(lo)?;
        self.kernel.push_r(hi)
    }

    pub fn f_2r_from(&mut self) -> Result<(), ForthError> {
        let hi = self.kernel.pop_r()?;
        let lo = self.kernel.pop_r()?;
        self.kernel.push(lo)?;
        self.kernel.push(hi)
    }

    pub fn f_2r_fetch(&mut self) -> Result<(), ForthError> {
        let hi = self.kernel.peek_r(0)?;
        let lo = self.kernel.peek_r(1)?;
        self.kernel.push(lo)?;
        self.kernel.push(hi)
    }

    // Memory

    pub fn f_fetch(&mut self) -> Result<(), ForthError> {
        let addr = self.kernel.pop_addr()?;
        let val = self.kernel.get(addr)?;
        self.kernel.push(val)
    }

    pub fn f_store(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let addr = self.kernel.pop_addr()?;
        let val = self.kernel.pop()?;
        self.kernel.set(addr, val)
    }

    pub fn f_c_fetch(&mut self) -> Result<(), ForthError> {
        let addr = self.kernel.pop_addr()?;
        let val = self.kernel.memory.get_byte(addr)?;
        self.kernel.push(val as Cell)
    }

    pub fn f_c_store(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let addr = self.kernel.pop_addr()?;
        let val = self.kernel.pop()?;
        self.kernel.memory.set_byte(addr, val as u8)
    }

    /// 2@ ( a-addr -- x1 x2 ) x2 is stored at a-addr
    pub fn f_2fetch(&mut self) -> Result<(), ForthError> {
        let addr = self.kernel.pop_addr()?;
        let val = self.kernel.memory.get_dcell(addr)?;
        self.kernel.push_double(val)
    }

    pub fn f_2store(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let addr = self.kernel.pop_addr()?;
        let val = self.kernel.pop_double()?;
        self.kernel.memory.set_dcell(addr, val)
    }

    pub fn f_plus_store(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let addr = self.kernel.pop_addr()?;
        let n = self.kernel.pop()?;
        let val = self.kernel.get(addr)?;
        self.kernel.set(addr, val.wrapping_add(n))
    }

    pub fn f_cells(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|n| n.wrapping_mul(CELL as Cell))
    }

    pub fn f_cell_plus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_add(CELL as Cell))
    }

    pub fn f_chars(&mut self) -> Result<(), ForthError> {
        self.kernel.top()?;
        Ok(())
    }

    pub fn f_char_plus(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|a| a.wrapping_add(1))
    }

    /// FILL ( c-addr u char -- )
    pub fn f_fill(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let c = self.kernel.pop()? as u8;
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        self.kernel.memory.fill(addr, len, c)
    }

    /// MOVE ( addr1 addr2 u -- )
    pub fn f_move(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let len = self.kernel.pop_len()?;
        let dst = self.kernel.pop_addr()?;
        let src = self.kernel.pop_addr()?;
        self.kernel.memory.copy(src, dst, len)
    }

    pub fn f_pad(&mut self) -> Result<(), ForthError> {
        self.kernel.push(PAD_START as Cell)
    }

    pub fn f_bye(&mut self) -> Result<(), ForthError> {
        self.request_exit();
        Ok(())
    }
}

pub(crate) static GENERAL_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("+", ForthRuntime::f_plus, "( n1 n2 -- n3 )", "Add"),
    BuiltInFn::new("-", ForthRuntime::f_minus, "( n1 n2 -- n3 )", "Subtract n2 from n1"),
    BuiltInFn::new("*", ForthRuntime::f_times, "( n1 n2 -- n3 )", "Multiply"),
    BuiltInFn::new("/", ForthRuntime::f_divide, "( n1 n2 -- n3 )", "Divide, truncating toward zero"),
    BuiltInFn::new("MOD", ForthRuntime::f_mod, "( n1 n2 -- n3 )", "Remainder of n1 / n2"),
    BuiltInFn::new("/MOD", ForthRuntime::f_slash_mod, "( n1 n2 -- rem quot )", "Remainder and quotient"),
    BuiltInFn::new("*/", ForthRuntime::f_star_slash, "( n1 n2 n3 -- n4 )", "n1*n2/n3 with a double-width product"),
    BuiltInFn::new("*/MOD", ForthRuntime::f_star_slash_mod, "( n1 n2 n3 -- rem quot )", "n1*n2/n3 with remainder"),
    BuiltInFn::new("NEGATE", ForthRuntime::f_negate, "( n -- -n )", "Negate"),
    BuiltInFn::new("ABS", ForthRuntime::f_abs, "( n -- u )", "Absolute value"),
    BuiltInFn::new("MIN", ForthRuntime::f_min, "( n1 n2 -- n3 )", "Smaller of two numbers"),
    BuiltInFn::new("MAX", ForthRuntime::f_max, "( n1 n2 -- n3 )", "Larger of two numbers"),
    BuiltInFn::new("1+", ForthRuntime::f_one_plus, "( n -- n+1 )", "Add one"),
    BuiltInFn::new("1-", ForthRuntime::f_one_minus, "( n -- n-1 )", "Subtract one"),
    BuiltInFn::new("2*", ForthRuntime::f_two_star, "( x -- x*2 )", "Shift left one bit"),
    BuiltInFn::new("2/", ForthRuntime::f_two_slash, "( x -- x/2 )", "Arithmetic shift right one bit"),
    BuiltInFn::new("AND", ForthRuntime::f_and, "( x1 x2 -- x3 )", "Bitwise and"),
    BuiltInFn::new("OR", ForthRuntime::f_or, "( x1 x2 -- x3 )", "Bitwise or"),
    BuiltInFn::new("XOR", ForthRuntime::f_xor, "( x1 x2 -- x3 )", "Bitwise exclusive or"),
    BuiltInFn::new("INVERT", ForthRuntime::f_invert, "( x -- ~x )", "Bitwise complement"),
    BuiltInFn::new("LSHIFT", ForthRuntime::f_lshift, "( x u -- x' )", "Logical shift left"),
    BuiltInFn::new("RSHIFT", ForthRuntime::f_rshift, "( x u -- x' )", "Logical shift right"),
    BuiltInFn::new("=", ForthRuntime::f_equal, "( x1 x2 -- flag )", "True if equal"),
    BuiltInFn::new("<", ForthRuntime::f_less, "( n1 n2 -- flag )", "True if n1 < n2"),
    BuiltInFn::new(">", ForthRuntime::f_greater, "( n1 n2 -- flag )", "True if n1 > n2"),
    BuiltInFn::new("U<", ForthRuntime::f_u_less, "( u1 u2 -- flag )", "Unsigned less than"),
    BuiltInFn::new("0=", ForthRuntime::f_0equal, "( x -- flag )", "True if zero"),
    BuiltInFn::new("0<", ForthRuntime::f_0less, "( n -- flag )", "True if negative"),
    BuiltInFn::new("DUP", ForthRuntime::f_dup, "( x -- x x )", "Duplicate the top item"),
    BuiltInFn::new("DROP", ForthRuntime::f_drop, "( x -- )", "Discard the top item"),
    BuiltInFn::new("SWAP", ForthRuntime::f_swap, "( x1 x2 -- x2 x1 )", "Exchange the top two items"),
    BuiltInFn::new("OVER", ForthRuntime::f_over, "( x1 x2 -- x1 x2 x1 )", "Copy the second item"),
    BuiltInFn::new("ROT", ForthRuntime::f_rot, "( x1 x2 x3 -- x2 x3 x1 )", "Rotate the third item to the top"),
    BuiltInFn::new("?DUP", ForthRuntime::f_question_dup, "( x -- 0 | x x )", "Duplicate if nonzero"),
    BuiltInFn::new("DEPTH", ForthRuntime::f_depth, "( -- +n )", "Number of items on the data stack"),
    BuiltInFn::new("2DUP", ForthRuntime::f_2dup, "( x1 x2 -- x1 x2 x1 x2 )", "Duplicate the top pair"),
    BuiltInFn::new("2DROP", ForthRuntime::f_2drop, "( x1 x2 -- )", "Discard the top pair"),
    BuiltInFn::new("2SWAP", ForthRuntime::f_2swap, "( x1 x2 x3 x4 -- x3 x4 x1 x2 )", "Exchange the top two pairs"),
    BuiltInFn::new("2OVER", ForthRuntime::f_2over, "( x1 x2 x3 x4 -- x1 x2 x3 x4 x1 x2 )", "Copy the second pair"),
    BuiltInFn::new(">R", ForthRuntime::f_to_r, "( x -- ) ( R: -- x )", "Move to the return stack"),
    BuiltInFn::new("R>", ForthRuntime::f_r_from, "( -- x ) ( R: x -- )", "Move from the return stack"),
    BuiltInFn::new("R@", ForthRuntime::f_r_fetch, "( -- x ) ( R: x -- x )", "Copy the top of the return stack"),
    BuiltInFn::new("@", ForthRuntime::f_fetch, "( a-addr -- x )", "Fetch a cell"),
    BuiltInFn::new("!", ForthRuntime::f_store, "( x a-addr -- )", "Store a cell"),
    BuiltInFn::new("C@", ForthRuntime::f_c_fetch, "( c-addr -- char )", "Fetch a byte"),
    BuiltInFn::new("C!", ForthRuntime::f_c_store, "( char c-addr -- )", "Store a byte"),
    BuiltInFn::new("2@", ForthRuntime::f_2fetch, "( a-addr -- x1 x2 )", "Fetch a cell pair"),
    BuiltInFn::new("2!", ForthRuntime::f_2store, "( x1 x2 a-addr -- )", "Store a cell pair"),
    BuiltInFn::new("+!", ForthRuntime::f_plus_store, "( n a-addr -- )", "Add n to the cell at a-addr"),
    BuiltInFn::new("CELLS", ForthRuntime::f_cells, "( n1 -- n2 )", "Size in bytes of n1 cells"),
    BuiltInFn::new("CELL+", ForthRuntime::f_cell_plus, "( a-addr1 -- a-addr2 )", "Add the size of a cell"),
    BuiltInFn::new("CHARS", ForthRuntime::f_chars, "( n1 -- n2 )", "Size in bytes of n1 characters"),
    BuiltInFn::new("CHAR+", ForthRuntime::f_char_plus, "( c-addr1 -- c-addr2 )", "Add the size of a character"),
    BuiltInFn::new("FILL", ForthRuntime::f_fill, "( c-addr u char -- )", "Fill u bytes with char"),
    BuiltInFn::new("MOVE", ForthRuntime::f_move, "( addr1 addr2 u -- )", "Copy u bytes from addr1 to addr2"),
];

pub(crate) static GENERAL_EXT_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("<>", ForthRuntime::f_not_equal, "( x1 x2 -- flag )", "True if not equal"),
    BuiltInFn::new("U>", ForthRuntime::f_u_greater, "( u1 u2 -- flag )", "Unsigned greater than"),
    BuiltInFn::new("0<>", ForthRuntime::f_0not_equal, "( x -- flag )", "True if nonzero"),
    BuiltInFn::new("0>", ForthRuntime::f_0greater, "( n -- flag )", "True if positive"),
    BuiltInFn::new("WITHIN", ForthRuntime::f_within, "( n lo hi -- flag )", "True if lo <= n < hi"),
    BuiltInFn::new("TRUE", ForthRuntime::f_true, "( -- true )", "All bits set"),
    BuiltInFn::new("FALSE", ForthRuntime::f_false, "( -- false )", "All bits clear"),
    BuiltInFn::new("NIP", ForthRuntime::f_nip, "( x1 x2 -- x2 )", "Discard the second item"),
    BuiltInFn::new("TUCK", ForthRuntime::f_tuck, "( x1 x2 -- x2 x1 x2 )", "Copy the top item below the second"),
    BuiltInFn::new("PICK", ForthRuntime::f_pick, "( xu ... x0 u -- xu ... x0 xu )", "Copy the u-th item; 0 PICK is DUP"),
    BuiltInFn::new("ROLL", ForthRuntime::f_roll, "( xu ... x0 u -- xu-1 ... x0 xu )", "Move the u-th item to the top"),
    BuiltInFn::new("2>R", ForthRuntime::f_2to_r, "( x1 x2 -- ) ( R: -- x1 x2 )", "Move a pair to the return stack"),
    BuiltInFn::new("2R>", ForthRuntime::f_2r_from, "( -- x1 x2 ) ( R: x1 x2 -- )", "Move a pair from the return stack"),
    BuiltInFn::new("2R@", ForthRuntime::f_2r_fetch, "( -- x1 x2 ) ( R: x1 x2 -- x1 x2 )", "Copy a pair from the return stack"),
    BuiltInFn::new("PAD", ForthRuntime::f_pad, "( -- c-addr )", "Scratch buffer address"),
    BuiltInFn::new("BYE", ForthRuntime::f_bye, "( -- )", "Leave the interpreter"),
];

pub(crate) static COMMON_USE_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("NOT", ForthRuntime::f_0equal, "( x -- flag )", "Logical not, same as 0="),
    BuiltInFn::new("2+", ForthRuntime::f_two_plus, "( n -- n+2 )", "Add two"),
    BuiltInFn::new("2-", ForthRuntime::f_two_minus, "( n -- n-2 )", "Subtract two"),
];

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;

    fn run(line: &str) -> Vec<Cell> {
        let mut f = ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap();
        f.interpret_line(line).unwrap();
        f.kernel.data_stack().iter_from_bottom().copied().collect()
    }

    fn fails(line: &str) -> ForthError {
        let mut f = ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap();
        f.interpret_line(line).unwrap_err()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("2 3 + 10 4 - 6 7 *"), vec![5, 6, 42]);
        assert_eq!(run("7 2 / -7 2 / 7 2 mod -7 2 mod"), vec![3, -3, 1, -1]);
        assert_eq!(run("13 5 /mod"), vec![3, 2]);
        assert_eq!(run("100000 100000 100000 */"), vec![100000]);
        assert_eq!(run("2147483647 1 +"), vec![i32::MIN]);
        assert!(matches!(fails("1 0 /"), ForthError::DivisionByZero));
    }

    #[test]
    fn test_logic_and_comparison() {
        assert_eq!(run("1 2 < 2 1 < 3 3 = -1 1 u<"), vec![-1, 0, -1, 0]);
        assert_eq!(run("1 4 lshift -1 28 rshift 1 32 lshift"), vec![16, 15, 0]);
        assert_eq!(run("5 0 10 within 10 0 10 within"), vec![-1, 0]);
        assert_eq!(run("0 not 7 not"), vec![-1, 0]);
    }

    #[test]
    fn test_stack_words() {
        assert_eq!(run("1 2 3 rot"), vec![2, 3, 1]);
        assert_eq!(run("1 2 tuck"), vec![2, 1, 2]);
        assert_eq!(run("10 20 30 0 pick"), vec![10, 20, 30, 30]);
        assert_eq!(run("10 20 30 2 pick"), vec![10, 20, 30, 10]);
        assert_eq!(run("1 2 3 1 roll"), vec![1, 3, 2]);
        assert_eq!(run("1 2 3 2 roll"), vec![2, 3, 1]);
        assert_eq!(run("1 2 3 4 2swap"), vec![3, 4, 1, 2]);
        assert_eq!(run("1 2 3 4 2over"), vec![1, 2, 3, 4, 1, 2]);
        assert_eq!(run("0 ?dup 5 ?dup"), vec![0, 5, 5]);
        assert_eq!(run("7 8 depth"), vec![7, 8, 2]);
    }

    #[test]
    fn test_return_stack_words() {
        assert_eq!(run(": t 1 2 >r r@ r> ; t"), vec![1, 2, 2]);
        assert_eq!(run(": t 3 4 2>r 2r@ 2r> ; t"), vec![3, 4, 3, 4]);
        assert!(matches!(fails("r>"), ForthError::ReturnStackUnderflow));
    }

    #[test]
    fn test_memory_words() {
        assert_eq!(run("variable x 5 x ! 3 x +! x @"), vec![8]);
        assert_eq!(run("pad 65 over c! c@"), vec![65]);
        assert_eq!(run("create d 2 cells allot 1 2 d 2! d 2@"), vec![1, 2]);
        assert_eq!(run("pad 4 42 fill pad 3 + c@"), vec![42]);
        assert!(matches!(fails("-4 @"), ForthError::InvalidAddress(_)));
        assert!(matches!(fails("131072 @"), ForthError::InvalidAddress(_)));
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut f = ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap();
        let line = "1 ".repeat(DATA_STACK_SIZE + 1);
        assert!(matches!(f.interpret_line(&line), Err(ForthError::DataStackOverflow)));
        assert_eq!(f.kernel.stack_len(), 0);
    }
}
