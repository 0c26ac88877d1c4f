// Console output and string words

use crate::error::ForthError;
use crate::internals::builtin::BuiltInFn;
use crate::kernel::*;
use crate::runtime::ForthRuntime;

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// format_number renders a value in the given base with a leading '-' when negative.
pub fn format_number(value: i128, base: u32) -> String {
    let mut digits = Vec::new();
    let mut v = value.unsigned_abs();
    let base = base as u128;
    loop {
        digits.push(DIGITS[(v % base) as usize]);
        v /= base;
        if v == 0 {
            break;
        }
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

impl ForthRuntime {
    fn print_number(&mut self, value: i128) -> Result<(), ForthError> {
        let text = format_number(value, self.base()?);
        self.write(&text);
        self.write(" ");
        Ok(())
    }

    /// . ( n -- ) print a signed number and a space
    pub fn f_dot(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop()?;
        self.print_number(n as i128)
    }

    pub fn f_u_dot(&mut self) -> Result<(), ForthError> {
        let u = self.kernel.pop()? as UCell;
        self.print_number(u as i128)
    }

    pub fn f_d_dot(&mut self) -> Result<(), ForthError> {
        let d = self.kernel.pop_double()?;
        self.print_number(d as i128)
    }

    /// .S ( -- ) print the stack, bottom first
    pub fn f_dot_s(&mut self) -> Result<(), ForthError> {
        let base = self.base()?;
        let mut text = String::new();
        for &v in self.kernel.data_stack().iter_from_bottom() {
            text.push_str(&format_number(v as i128, base));
            text.push(' ');
        }
        text.push_str("<-Top");
        self.write(&text);
        Ok(())
    }

    pub fn f_emit(&mut self) -> Result<(), ForthError> {
        let c = self.kernel.pop()? as u8;
        self.write(&(c as char).to_string());
        Ok(())
    }

    pub fn f_cr(&mut self) -> Result<(), ForthError> {
        self.write("\n");
        Ok(())
    }

    pub fn f_space(&mut self) -> Result<(), ForthError> {
        self.write(" ");
        Ok(())
    }

    pub fn f_spaces(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop_len()?;
        self.write(&" ".repeat(n));
        Ok(())
    }

    pub fn f_bl(&mut self) -> Result<(), ForthError> {
        self.kernel.push(b' ' as Cell)
    }

    /// TYPE ( c-addr u -- )
    pub fn f_type(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        let text = self.kernel.memory.text(addr, len)?;
        self.write(&text);
        Ok(())
    }

    /// COUNT ( c-addr1 -- c-addr2 u )
    pub fn f_count(&mut self) -> Result<(), ForthError> {
        let addr = self.kernel.pop_addr()?;
        let len = self.kernel.memory.get_byte(addr)?;
        self.kernel.push((addr + 1) as Cell)?;
        self.kernel.push(len as Cell)
    }

    /// COMPARE ( c-addr1 u1 c-addr2 u2 -- n )
    pub fn f_compare(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(4)?;
        let len2 = self.kernel.pop_len()?;
        let addr2 = self.kernel.pop_addr()?;
        let len1 = self.kernel.pop_len()?;
        let addr1 = self.kernel.pop_addr()?;
        let a = self.kernel.memory.bytes(addr1, len1)?;
        let b = self.kernel.memory.bytes(addr2, len2)?;
        let result = match a.cmp(b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        };
        self.kernel.push(result)
    }

    fn move_args(&mut self) -> Result<(Addr, Addr, usize), ForthError> {
        self.kernel.stack_check(3)?;
        let len = self.kernel.pop_len()?;
        let dst = self.kernel.pop_addr()?;
        let src = self.kernel.pop_addr()?;
        Ok((src, dst, len))
    }

    /// CMOVE copies from low addresses upward, one byte at a time
    pub fn f_cmove(&mut self) -> Result<(), ForthError> {
        let (src, dst, len) = self.move_args()?;
        for i in 0..len {
            let b = self.kernel.memory.get_byte(src + i)?;
            self.kernel.memory.set_byte(dst + i, b)?;
        }
        Ok(())
    }

    /// CMOVE> copies from high addresses downward
    pub fn f_cmove_up(&mut self) -> Result<(), ForthError> {
        let (src, dst, len) = self.move_args()?;
        for i in (0..len).rev() {
            let b = self.kernel.memory.get_byte(src + i)?;
            self.kernel.memory.set_byte(dst + i, b)?;
        }
        Ok(())
    }
}

pub(crate) static CONSOLE_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new(".", ForthRuntime::f_dot, "( n -- )", "Print n in BASE followed by a space"),
    BuiltInFn::new("U.", ForthRuntime::f_u_dot, "( u -- )", "Print u unsigned"),
    BuiltInFn::new("EMIT", ForthRuntime::f_emit, "( char -- )", "Print one character"),
    BuiltInFn::new("CR", ForthRuntime::f_cr, "( -- )", "Start a new line"),
    BuiltInFn::new("SPACE", ForthRuntime::f_space, "( -- )", "Print a space"),
    BuiltInFn::new("SPACES", ForthRuntime::f_spaces, "( n -- )", "Print n spaces"),
    BuiltInFn::new("BL", ForthRuntime::f_bl, "( -- char )", "The space character"),
    BuiltInFn::new("TYPE", ForthRuntime::f_type, "( c-addr u -- )", "Print a string"),
    BuiltInFn::new("COUNT", ForthRuntime::f_count, "( c-addr1 -- c-addr2 u )", "Address and length of a counted string"),
];

pub(crate) static CONSOLE_DOUBLE_WORDS: &[BuiltInFn] = &[BuiltInFn::new(
    "D.",
    ForthRuntime::f_d_dot,
    "( d -- )",
    "Print a double followed by a space",
)];

pub(crate) static CONSOLE_TOOLS_WORDS: &[BuiltInFn] = &[BuiltInFn::new(
    ".S",
    ForthRuntime::f_dot_s,
    "( -- )",
    "Print the data stack, bottom first, without changing it",
)];

pub(crate) static STRING_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("COMPARE", ForthRuntime::f_compare, "( c-addr1 u1 c-addr2 u2 -- n )", "Compare two strings: -1, 0 or 1"),
    BuiltInFn::new("CMOVE", ForthRuntime::f_cmove, "( c-addr1 c-addr2 u -- )", "Copy u bytes, low addresses first"),
    BuiltInFn::new("CMOVE>", ForthRuntime::f_cmove_up, "( c-addr1 c-addr2 u -- )", "Copy u bytes, high addresses first"),
];

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;

    fn forth() -> (ForthRuntime, SharedBuffer) {
        let out = SharedBuffer::new();
        let f = ForthRuntime::boot(Box::new(out.clone())).unwrap();
        (f, out)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0, 10), "0");
        assert_eq!(format_number(-42, 10), "-42");
        assert_eq!(format_number(255, 16), "FF");
        assert_eq!(format_number(5, 2), "101");
        assert_eq!(format_number(i64::MIN as i128, 10), "-9223372036854775808");
    }

    #[test]
    fn test_number_output() {
        let (mut f, out) = forth();
        f.interpret_line("-1 . -1 u. hex 255 . decimal").unwrap();
        assert_eq!(out.take(), "-1 4294967295 FF  ok\n");
        f.interpret_line("-5. d.").unwrap();
        assert_eq!(out.take(), "-5  ok\n");
    }

    #[test]
    fn test_dot_s_leaves_stack() {
        let (mut f, out) = forth();
        f.interpret_line("1 2 3 .s").unwrap();
        assert_eq!(out.take(), "1 2 3 <-Top ok\n");
        assert_eq!(f.kernel.stack_len(), 3);
    }

    #[test]
    fn test_emit_type_spaces() {
        let (mut f, out) = forth();
        f.interpret_line("72 emit 105 emit 2 spaces s\" yo\" type cr").unwrap();
        assert_eq!(out.take(), "Hi  yo\n ok\n");
    }

    #[test]
    fn test_compare() {
        let (mut f, _) = forth();
        f.interpret_line("s\" abc\" pad swap cmove").unwrap();
        f.interpret_line("pad 3 pad 3 compare pad 2 pad 3 compare pad 3 s\" abd\" compare").unwrap();
        let results: Vec<Cell> = f.kernel.data_stack().iter_from_bottom().copied().collect();
        assert_eq!(results, vec![0, -1, -1]);
    }

    #[test]
    fn test_cmove_directions() {
        let (mut f, _) = forth();
        f.kernel.memory.write_bytes(PAD_START, b"ab....").unwrap();
        f.interpret_line("pad pad 1+ 4 cmove").unwrap();
        assert_eq!(f.kernel.memory.bytes(PAD_START, 5).unwrap(), b"aaaaa");
        f.kernel.memory.write_bytes(PAD_START, b"abcd..").unwrap();
        f.interpret_line("pad pad 2 + 4 cmove>").unwrap();
        assert_eq!(f.kernel.memory.bytes(PAD_START, 6).unwrap(), b"ababcd");
    }
}
