/// Input parsing and number conversion
///
/// The current Source names a span of RAM and the cell holding its >IN. Parsing advances >IN;
/// a parsed name is returned as an address and length inside the source, never copied.
///
use crate::error::ForthError;
use crate::internals::builtin::BuiltInFn;
use crate::kernel::*;
use crate::runtime::ForthRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Single(Cell),
    Double(DCell),
}

fn is_space(b: u8) -> bool {
    b <= b' '
}

/// parse_number converts text in the given base. A single embedded '.' makes it a double.
///
/// Singles accept anything that fits in 32 bits signed or unsigned, so FFFFFFFF in hex is -1.
pub fn parse_number(text: &str, base: u32) -> Option<Number> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let dots = digits.matches('.').count();
    if dots > 1 {
        return None;
    }
    let mut value: u128 = 0;
    let mut seen = false;
    for c in digits.chars().filter(|&c| c != '.') {
        let d = c.to_digit(base)?;
        value = value * base as u128 + d as u128;
        if value > u64::MAX as u128 {
            return None;
        }
        seen = true;
    }
    if !seen {
        return None;
    }
    if dots == 1 {
        if negative {
            if value > 1u128 << 63 {
                return None;
            }
            Some(Number::Double((value as i128).wrapping_neg() as DCell))
        } else {
            Some(Number::Double(value as u64 as DCell))
        }
    } else if negative {
        if value > 1u128 << 31 {
            return None;
        }
        Some(Number::Single((value as i64).wrapping_neg() as Cell))
    } else {
        if value > u32::MAX as u128 {
            return None;
        }
        Some(Number::Single(value as u32 as Cell))
    }
}

impl ForthRuntime {
    fn to_in(&self) -> Result<usize, ForthError> {
        Ok(self.kernel.get(self.source.to_in)?.max(0) as usize)
    }

    fn set_to_in(&mut self, pos: usize) -> Result<(), ForthError> {
        self.kernel.set(self.source.to_in, pos as Cell)
    }

    /// parse_name skips leading whitespace and returns the next blank-delimited name.
    /// A zero length means the source is exhausted.
    pub fn parse_name(&mut self) -> Result<(Addr, usize), ForthError> {
        let src = self.source;
        let mut pos = self.to_in()?.min(src.len);
        while pos < src.len && is_space(self.kernel.memory.get_byte(src.addr + pos)?) {
            pos += 1;
        }
        let start = pos;
        while pos < src.len && !is_space(self.kernel.memory.get_byte(src.addr + pos)?) {
            pos += 1;
        }
        let len = pos - start;
        if pos < src.len {
            pos += 1;
        }
        self.set_to_in(pos)?;
        Ok((src.addr + start, len))
    }

    /// parse_name_bytes is parse_name returning a copy of the name's raw bytes.
    pub fn parse_name_bytes(&mut self) -> Result<Vec<u8>, ForthError> {
        let (addr, len) = self.parse_name()?;
        Ok(self.kernel.memory.bytes(addr, len)?.to_vec())
    }

    /// parse_name_text is parse_name returning an owned string.
    pub fn parse_name_text(&mut self) -> Result<String, ForthError> {
        let (addr, len) = self.parse_name()?;
        self.kernel.memory.text(addr, len)
    }

    /// parse collects text up to (not including) the delimiter, consuming the delimiter.
    pub fn parse(&mut self, delim: u8) -> Result<(Addr, usize), ForthError> {
        let src = self.source;
        let start = self.to_in()?.min(src.len);
        let mut pos = start;
        while pos < src.len && self.kernel.memory.get_byte(src.addr + pos)? != delim {
            pos += 1;
        }
        let len = pos - start;
        if pos < src.len {
            pos += 1;
        }
        self.set_to_in(pos)?;
        Ok((src.addr + start, len))
    }

    /// word skips leading delimiters and leaves a counted string in the WORD buffer.
    pub fn word(&mut self, delim: u8) -> Result<Addr, ForthError> {
        let src = self.source;
        let mut pos = self.to_in()?.min(src.len);
        while pos < src.len {
            let b = self.kernel.memory.get_byte(src.addr + pos)?;
            if b != delim && !(delim == b' ' && is_space(b)) {
                break;
            }
            pos += 1;
        }
        self.set_to_in(pos)?;
        let (addr, len) = if delim == b' ' {
            self.parse_name()?
        } else {
            self.parse(delim)?
        };
        let len = len.min(WORD_BUFF_SIZE - 1);
        self.kernel.memory.copy(addr, WORD_BUFF_START + 1, len)?;
        self.kernel.memory.set_byte(WORD_BUFF_START, len as u8)?;
        Ok(WORD_BUFF_START)
    }

    /// skip_source abandons the rest of the current input source.
    pub fn skip_source(&mut self) -> Result<(), ForthError> {
        let len = self.source.len;
        self.set_to_in(len)
    }

    // Parsing words

    /// SOURCE ( -- c-addr u )
    pub fn f_source(&mut self) -> Result<(), ForthError> {
        self.kernel.push(self.source.addr as Cell)?;
        self.kernel.push(self.source.len as Cell)
    }

    /// >IN ( -- a-addr )
    pub fn f_to_in(&mut self) -> Result<(), ForthError> {
        self.kernel.push(self.source.to_in as Cell)
    }

    pub fn f_source_id(&mut self) -> Result<(), ForthError> {
        self.kernel.push(self.source.id)
    }

    pub fn f_parse(&mut self) -> Result<(), ForthError> {
        let delim = self.kernel.pop()? as u8;
        let (addr, len) = self.parse(delim)?;
        self.kernel.push(addr as Cell)?;
        self.kernel.push(len as Cell)
    }

    pub fn f_parse_name(&mut self) -> Result<(), ForthError> {
        let (addr, len) = self.parse_name()?;
        self.kernel.push(addr as Cell)?;
        self.kernel.push(len as Cell)
    }

    pub fn f_word(&mut self) -> Result<(), ForthError> {
        let delim = self.kernel.pop()? as u8;
        let addr = self.word(delim)?;
        self.kernel.push(addr as Cell)
    }

    /// CHAR ( "name" -- char )
    pub fn f_char(&mut self) -> Result<(), ForthError> {
        let (addr, len) = self.parse_name()?;
        if len == 0 {
            return Err(ForthError::MissingName);
        }
        let c = self.kernel.memory.get_byte(addr)?;
        self.kernel.push(c as Cell)
    }

    /// [CHAR] compiles the first character of the next name as a literal
    pub fn f_bracket_char(&mut self) -> Result<(), ForthError> {
        self.f_char()?;
        let c = self.kernel.pop()?;
        self.compile_literal(c)
    }

    pub fn f_base(&mut self) -> Result<(), ForthError> {
        self.kernel.push(BASE_ADDR as Cell)
    }

    pub fn f_decimal(&mut self) -> Result<(), ForthError> {
        self.kernel.set(BASE_ADDR, 10)
    }

    pub fn f_hex(&mut self) -> Result<(), ForthError> {
        self.kernel.set(BASE_ADDR, 16)
    }

    /// NUMBER? ( c-addr u -- 0 | n 1 | d 2 )
    pub fn f_number_q(&mut self) -> Result<(), ForthError> {
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        let text = self.kernel.memory.text(addr, len)?;
        match parse_number(&text, self.base()?) {
            Some(Number::Single(n)) => {
                self.kernel.push(n)?;
                self.kernel.push(1)
            }
            Some(Number::Double(d)) => {
                self.kernel.push_double(d)?;
                self.kernel.push(2)
            }
            None => self.kernel.push(0),
        }
    }

    /// ( comment up to the closing paren
    pub fn f_paren(&mut self) -> Result<(), ForthError> {
        self.parse(b')')?;
        Ok(())
    }

    /// \ comment to end of line
    pub fn f_backslash(&mut self) -> Result<(), ForthError> {
        self.skip_source()
    }

    /// .( prints up to the closing paren, immediately
    pub fn f_dot_paren(&mut self) -> Result<(), ForthError> {
        let (addr, len) = self.parse(b')')?;
        let text = self.kernel.memory.text(addr, len)?;
        self.write(&text);
        Ok(())
    }
}

pub(crate) static PARSER_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("SOURCE", ForthRuntime::f_source, "( -- c-addr u )", "Address and length of the input source"),
    BuiltInFn::new(">IN", ForthRuntime::f_to_in, "( -- a-addr )", "Address of the parse offset into the input source"),
    BuiltInFn::new("SOURCE-ID", ForthRuntime::f_source_id, "( -- n )", "-1 for a string, 0 for the default input, otherwise a file id"),
    BuiltInFn::new("PARSE", ForthRuntime::f_parse, "( char \"ccc<char>\" -- c-addr u )", "Parse text delimited by char"),
    BuiltInFn::new("PARSE-NAME", ForthRuntime::f_parse_name, "( \"name\" -- c-addr u )", "Parse a blank-delimited name"),
    BuiltInFn::new("WORD", ForthRuntime::f_word, "( char \"ccc<char>\" -- c-addr )", "Parse into the WORD buffer as a counted string"),
    BuiltInFn::new("CHAR", ForthRuntime::f_char, "( \"name\" -- char )", "First character of the next name"),
    BuiltInFn::new("[CHAR]", ForthRuntime::f_bracket_char, "( \"name\" -- )", "Compile the first character of the next name as a literal")
        .immediate()
        .compile_only(),
    BuiltInFn::new("BASE", ForthRuntime::f_base, "( -- a-addr )", "Address of the number conversion radix"),
    BuiltInFn::new("DECIMAL", ForthRuntime::f_decimal, "( -- )", "Set BASE to 10"),
    BuiltInFn::new("HEX", ForthRuntime::f_hex, "( -- )", "Set BASE to 16"),
    BuiltInFn::new("(", ForthRuntime::f_paren, "( \"ccc<paren>\" -- )", "Comment to the closing paren").immediate(),
    BuiltInFn::new("\\", ForthRuntime::f_backslash, "( \"ccc<eol>\" -- )", "Comment to the end of the line").immediate(),
    BuiltInFn::new(".(", ForthRuntime::f_dot_paren, "( \"ccc<paren>\" -- )", "Print text up to the closing paren").immediate(),
];

pub(crate) static COMMON_PARSER_WORDS: &[BuiltInFn] = &[BuiltInFn::new(
    "NUMBER?",
    ForthRuntime::f_number_q,
    "( c-addr u -- 0 | n 1 | d 2 )",
    "Convert a string in BASE to a single or double number",
)];

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;
    use crate::runtime::Source;

    fn forth_with(text: &str) -> ForthRuntime {
        let mut f = ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap();
        f.kernel.memory.write_bytes(SOURCE_BUFF_START, text.as_bytes()).unwrap();
        f.source = Source::string(SOURCE_BUFF_START, text.len());
        f.kernel.set(SOURCE_TO_IN, 0).unwrap();
        f
    }

    #[test]
    fn test_parse_number_bases() {
        assert_eq!(parse_number("42", 10), Some(Number::Single(42)));
        assert_eq!(parse_number("-17", 10), Some(Number::Single(-17)));
        assert_eq!(parse_number("ff", 16), Some(Number::Single(255)));
        assert_eq!(parse_number("FFFFFFFF", 16), Some(Number::Single(-1)));
        assert_eq!(parse_number("101", 2), Some(Number::Single(5)));
        assert_eq!(parse_number("12a", 10), None);
        assert_eq!(parse_number("-", 10), None);
        assert_eq!(parse_number("4294967296", 10), None);
    }

    #[test]
    fn test_parse_number_doubles() {
        assert_eq!(parse_number("1.5", 10), Some(Number::Double(15)));
        assert_eq!(parse_number("12.", 10), Some(Number::Double(12)));
        assert_eq!(parse_number("-4294967296.", 10), Some(Number::Double(-4294967296)));
        assert_eq!(parse_number("1.2.3", 10), None);
        assert_eq!(parse_number(".", 10), None);
    }

    #[test]
    fn test_parse_name_advances_to_in() {
        let mut f = forth_with("  dup  swap");
        assert_eq!(f.parse_name_text().unwrap(), "dup");
        assert_eq!(f.kernel.get(SOURCE_TO_IN).unwrap(), 6);
        assert_eq!(f.parse_name_text().unwrap(), "swap");
        assert_eq!(f.parse_name_text().unwrap(), "");
    }

    #[test]
    fn test_parse_delimited() {
        let mut f = forth_with("hello world\" rest");
        let (addr, len) = f.parse(b'"').unwrap();
        assert_eq!(f.kernel.memory.text(addr, len).unwrap(), "hello world");
        assert_eq!(f.parse_name_text().unwrap(), "rest");
    }

    #[test]
    fn test_word_counted_string() {
        let mut f = forth_with(",,,abc,def");
        let addr = f.word(b',').unwrap();
        assert_eq!(f.kernel.memory.get_byte(addr).unwrap(), 3);
        assert_eq!(f.kernel.memory.text(addr + 1, 3).unwrap(), "abc");
    }
}
