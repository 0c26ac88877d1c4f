/// Outer interpreter and compiler
///
/// EVALUATE parses names from the current source and, for each one:
///
///     1. looks it up in the dictionary, then among the built-ins by upcased name;
///        compiles its token if compiling and the word is not immediate, otherwise executes it
///     2. otherwise tries to convert it as a number in BASE (a '.' makes a double) and pushes
///        it, or compiles it as LITERAL / 2LITERAL
///     3. otherwise fails with "WORD ?"
///
/// Any error unwinds a half-built definition and abandons the rest of the buffer.
///
use tracing::debug;

use crate::error::ForthError;
use crate::internals::builtin::{BuiltInFn, Inline};
use crate::internals::dictionary::NAME_LENGTH_MASK;
use crate::internals::parser::{parse_number, Number};
use crate::kernel::*;
use crate::runtime::{CompileState, ForthRuntime, Source};

/// Display form of a name or token taken from source text.
fn name_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl ForthRuntime {
    /// evaluate interprets len bytes at addr as a string source.
    pub fn evaluate(&mut self, addr: Addr, len: usize) -> Result<(), ForthError> {
        self.evaluate_source(Source::string(addr, len))
    }

    pub(crate) fn evaluate_source(&mut self, source: Source) -> Result<(), ForthError> {
        let saved = self.source;
        let saved_to_in = self.kernel.get(source.to_in)?;
        self.source = source;
        self.kernel.set(source.to_in, 0)?;
        let result = self.interpret_source();
        self.source = saved;
        self.kernel.set(source.to_in, saved_to_in)?;
        if let Err(err) = &result {
            self.recover(err);
        }
        result
    }

    fn interpret_source(&mut self) -> Result<(), ForthError> {
        loop {
            let (addr, len) = self.parse_name()?;
            if len == 0 {
                return Ok(());
            }
            let token = self.kernel.memory.bytes(addr, len)?.to_vec();
            self.interpret_token(&token)?;
            if self.should_exit() {
                return Ok(());
            }
        }
    }

    /// interpret_token handles one parsed name in the current state.
    pub fn interpret_token(&mut self, token: &[u8]) -> Result<(), ForthError> {
        if let Some(found) = self.find_word(token)? {
            if self.state.compiling && !found.immediate {
                return self.comma(found.xt);
            }
            if found.compile_only && !self.state.compiling {
                return Err(ForthError::CompileOnly(name_text(&token.to_ascii_uppercase())));
            }
            return self.execute(found.xt);
        }
        let token = name_text(token);
        match parse_number(&token, self.base()?) {
            Some(Number::Single(n)) if self.state.compiling => self.compile_literal(n),
            Some(Number::Single(n)) => self.kernel.push(n),
            Some(Number::Double(d)) if self.state.compiling => self.compile_2literal(d),
            Some(Number::Double(d)) => self.kernel.push_double(d),
            None => Err(ForthError::UnknownWord(token)),
        }
    }

    /// recover restores a consistent state after an interpreter error.
    fn recover(&mut self, err: &ForthError) {
        if err.is_stack_fault() {
            self.kernel.reset();
        }
        if self.state.entry.is_some() {
            debug!(%err, "unwinding compilation");
        }
        self.unwind_compile();
    }

    pub fn compile_literal(&mut self, val: Cell) -> Result<(), ForthError> {
        let literal = self.registry.xt_compiled("LITERAL")?;
        self.comma(literal)?;
        self.comma(val)
    }

    /// compile_2literal lays down the high cell first
    pub fn compile_2literal(&mut self, val: DCell) -> Result<(), ForthError> {
        let literal = self.registry.xt_compiled("2LITERAL")?;
        self.comma(literal)?;
        self.comma((val >> 32) as Cell)?;
        self.comma(val as Cell)
    }

    /// compile_runtime appends the compiled token of a built-in
    pub fn compile_runtime(&mut self, name: &str) -> Result<(), ForthError> {
        let xt = self.registry.xt_compiled(name)?;
        self.comma(xt)
    }

    /// define starts a non-smudged entry whose code field runs the named built-in's runtime.
    ///
    /// Returns false, having created nothing, when the name is too long.
    pub(crate) fn define(&mut self, runtime: &str) -> Result<bool, ForthError> {
        if self.begin_entry(false)?.is_none() {
            return Ok(false);
        }
        self.compile_runtime(runtime)?;
        Ok(true)
    }

    /// parse_found parses a name and looks it up, failing with "name ?" if absent.
    pub(crate) fn parse_found(&mut self) -> Result<Cell, ForthError> {
        let name = self.parse_name_bytes()?;
        if name.is_empty() {
            return Err(ForthError::MissingName);
        }
        match self.find_word(&name)? {
            Some(found) => Ok(found.xt),
            None => Err(ForthError::UnknownWord(name_text(&name))),
        }
    }

    // Defining words

    /// : ( "name" -- ) starts a smudged definition and enters compile state
    pub fn f_colon(&mut self) -> Result<(), ForthError> {
        let Some(smudge) = self.begin_entry(true)? else {
            return Ok(());
        };
        let entry = to_addr(self.latest()?)?;
        self.compile_runtime(":")?;
        self.control.clear();
        self.leaves.clear();
        self.state = CompileState {
            compiling: true,
            smudge: Some(smudge),
            entry: Some(entry),
        };
        Ok(())
    }

    /// ; ends a definition; leftover control-flow entries abandon it instead
    pub fn f_semicolon(&mut self) -> Result<(), ForthError> {
        if !self.control.is_empty() || !self.leaves.is_empty() {
            self.unwind_compile();
            return Err(ForthError::UnbalancedControl);
        }
        self.compile_runtime(";")?;
        if let Some(smudge) = self.state.smudge {
            self.clear_smudge(smudge)?;
        }
        self.state = CompileState::default();
        Ok(())
    }

    pub fn f_immediate(&mut self) -> Result<(), ForthError> {
        self.set_immediate()
    }

    pub fn f_left_bracket(&mut self) -> Result<(), ForthError> {
        self.state.compiling = false;
        Ok(())
    }

    pub fn f_right_bracket(&mut self) -> Result<(), ForthError> {
        self.state.compiling = true;
        Ok(())
    }

    /// LITERAL ( x -- ) compiles x
    pub fn f_literal(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop()?;
        self.compile_literal(val)
    }

    /// POSTPONE ( "name" -- ) appends the compilation semantics of name
    pub fn f_postpone(&mut self) -> Result<(), ForthError> {
        let name = self.parse_name_bytes()?;
        let found = self
            .find_word(&name)?
            .ok_or_else(|| ForthError::UnknownWord(name_text(&name)))?;
        if found.immediate {
            self.comma(found.xt)
        } else {
            self.compile_literal(found.xt)?;
            let compile = self.registry.xt("COMPILE,")?;
            self.comma(compile)
        }
    }

    /// COMPILE, ( xt -- )
    pub fn f_compile_comma(&mut self) -> Result<(), ForthError> {
        let xt = self.kernel.pop()?;
        self.comma(xt)
    }

    /// ' ( "name" -- xt )
    pub fn f_tick(&mut self) -> Result<(), ForthError> {
        let xt = self.parse_found()?;
        self.kernel.push(xt)
    }

    pub fn f_bracket_tick(&mut self) -> Result<(), ForthError> {
        let xt = self.parse_found()?;
        self.compile_literal(xt)
    }

    /// EVALUATE ( i*x c-addr u -- j*x )
    pub fn f_evaluate(&mut self) -> Result<(), ForthError> {
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        self.evaluate(addr, len)
    }

    /// RECURSE compiles a call to the definition being built
    pub fn f_recurse(&mut self) -> Result<(), ForthError> {
        let entry = self.state.entry.ok_or(ForthError::UnbalancedControl)?;
        let flags = self.kernel.memory.get_byte(entry + CELL)?;
        let xt = align(entry + CELL + 1 + (flags & NAME_LENGTH_MASK) as usize);
        self.comma(xt as Cell)
    }

    /// CREATE ( "name" -- )
    pub fn f_create(&mut self) -> Result<(), ForthError> {
        self.define("CREATE")?;
        Ok(())
    }

    pub fn f_variable(&mut self) -> Result<(), ForthError> {
        if self.define("VARIABLE")? {
            self.comma(0)?;
        }
        Ok(())
    }

    /// CONSTANT ( x "name" -- )
    pub fn f_constant(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop()?;
        if self.define("CONSTANT")? {
            self.comma(val)?;
        }
        Ok(())
    }

    /// VALUE ( x "name" -- )
    pub fn f_value(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop()?;
        if self.define("VALUE")? {
            self.comma(val)?;
        }
        Ok(())
    }

    /// TO ( x "name" -- ) stores into a VALUE, now or at run time when compiling
    pub fn f_to(&mut self) -> Result<(), ForthError> {
        let xt = self.parse_found()?;
        let body = to_addr(xt)? + CELL;
        if self.state.compiling {
            self.compile_runtime("TO")?;
            self.comma(body as Cell)
        } else {
            let val = self.kernel.pop()?;
            self.kernel.set(body, val)
        }
    }

    pub fn i_to(&mut self) -> Result<(), ForthError> {
        let body = to_addr(self.next_cell()?)?;
        let val = self.kernel.pop()?;
        self.kernel.set(body, val)
    }

    /// MARKER ( "name" -- ) defines a word that forgets itself and everything after it
    pub fn f_marker(&mut self) -> Result<(), ForthError> {
        self.align_here()?;
        let link = self.here()?;
        if self.define("MARKER")? {
            self.comma(link as Cell)?;
        }
        Ok(())
    }

    pub fn i_marker(&mut self) -> Result<(), ForthError> {
        let link = to_addr(self.kernel.get(self.w + CELL)?)?;
        let previous = self.kernel.get(link)?;
        self.truncate_at(link, previous)
    }

    // Data space

    pub fn f_here(&mut self) -> Result<(), ForthError> {
        let here = self.here()?;
        self.kernel.push(here as Cell)
    }

    pub fn f_allot(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop()?;
        self.allot(n)
    }

    pub fn f_comma(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop()?;
        self.comma(val)
    }

    pub fn f_c_comma(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.pop()?;
        self.c_comma(val as u8)
    }

    pub fn f_align(&mut self) -> Result<(), ForthError> {
        self.align_here()
    }

    pub fn f_aligned(&mut self) -> Result<(), ForthError> {
        let addr = self.kernel.pop_addr()?;
        self.kernel.push(align(addr) as Cell)
    }

    /// >BODY ( xt -- a-addr )
    pub fn f_to_body(&mut self) -> Result<(), ForthError> {
        self.kernel.pop1_push1(|xt| xt + CELL as Cell)
    }

    /// UNUSED ( -- u ) bytes left in the dictionary
    pub fn f_unused(&mut self) -> Result<(), ForthError> {
        let here = self.here()?;
        self.kernel.push((DICT_TOP - here) as Cell)
    }

    // Strings

    /// S" ( "ccc<quote>" -- c-addr u )
    pub fn f_s_quote(&mut self) -> Result<(), ForthError> {
        let (addr, len) = self.parse(b'"')?;
        let text = self.kernel.memory.bytes(addr, len)?.to_vec();
        if self.state.compiling {
            self.compile_runtime("S\"")?;
            self.compile_counted_string(&text)?;
            Ok(())
        } else {
            // transient copy just above HERE
            let here = self.here()?;
            if here + text.len() > DICT_TOP {
                return Err(ForthError::DictionaryFull);
            }
            self.kernel.memory.write_bytes(here, &text)?;
            self.kernel.push(here as Cell)?;
            self.kernel.push(text.len() as Cell)
        }
    }

    /// ." ( "ccc<quote>" -- )
    pub fn f_dot_quote(&mut self) -> Result<(), ForthError> {
        let (addr, len) = self.parse(b'"')?;
        let text = self.kernel.memory.bytes(addr, len)?.to_vec();
        if self.state.compiling {
            self.compile_runtime(".\"")?;
            self.compile_counted_string(&text)?;
        } else {
            self.write(&String::from_utf8_lossy(&text));
        }
        Ok(())
    }
}

pub(crate) static COMPILER_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new(":", ForthRuntime::f_colon, "( \"name\" -- )", "Start a new definition")
        .runtime(ForthRuntime::i_enter),
    BuiltInFn::new(";", ForthRuntime::f_semicolon, "( -- )", "End the current definition")
        .runtime(ForthRuntime::i_exit)
        .immediate()
        .compile_only(),
    BuiltInFn::new("IMMEDIATE", ForthRuntime::f_immediate, "( -- )", "Make the most recent definition immediate"),
    BuiltInFn::new("[", ForthRuntime::f_left_bracket, "( -- )", "Enter interpretation state").immediate(),
    BuiltInFn::new("]", ForthRuntime::f_right_bracket, "( -- )", "Enter compilation state"),
    BuiltInFn::new("LITERAL", ForthRuntime::f_literal, "( x -- )", "Compile x; at run time push x")
        .runtime(ForthRuntime::i_literal)
        .immediate()
        .compile_only()
        .inline(Inline::Cell),
    BuiltInFn::new("POSTPONE", ForthRuntime::f_postpone, "( \"name\" -- )", "Append the compilation semantics of name")
        .immediate()
        .compile_only(),
    BuiltInFn::new("COMPILE,", ForthRuntime::f_compile_comma, "( xt -- )", "Append xt to the current definition"),
    BuiltInFn::new("'", ForthRuntime::f_tick, "( \"name\" -- xt )", "Execution token of name"),
    BuiltInFn::new("[']", ForthRuntime::f_bracket_tick, "( \"name\" -- )", "Compile the execution token of name as a literal")
        .immediate()
        .compile_only(),
    BuiltInFn::new("EXECUTE", ForthRuntime::f_execute, "( i*x xt -- j*x )", "Execute xt"),
    BuiltInFn::new("EVALUATE", ForthRuntime::f_evaluate, "( i*x c-addr u -- j*x )", "Interpret the string"),
    BuiltInFn::new("EXIT", ForthRuntime::i_exit, "( -- )", "Return from the current definition").compile_only(),
    BuiltInFn::new("RECURSE", ForthRuntime::f_recurse, "( -- )", "Compile a call to the current definition")
        .immediate()
        .compile_only(),
    BuiltInFn::new("CREATE", ForthRuntime::f_create, "( \"name\" -- )", "Define name; name pushes its data field address")
        .runtime(ForthRuntime::i_create),
    BuiltInFn::new("VARIABLE", ForthRuntime::f_variable, "( \"name\" -- )", "Define a one-cell variable")
        .runtime(ForthRuntime::i_create),
    BuiltInFn::new("CONSTANT", ForthRuntime::f_constant, "( x \"name\" -- )", "Define a constant")
        .runtime(ForthRuntime::i_constant),
    BuiltInFn::new("HERE", ForthRuntime::f_here, "( -- addr )", "Next free dictionary address"),
    BuiltInFn::new("ALLOT", ForthRuntime::f_allot, "( n -- )", "Reserve n bytes of data space"),
    BuiltInFn::new(",", ForthRuntime::f_comma, "( x -- )", "Append a cell to data space"),
    BuiltInFn::new("C,", ForthRuntime::f_c_comma, "( char -- )", "Append a byte to data space"),
    BuiltInFn::new("ALIGN", ForthRuntime::f_align, "( -- )", "Align HERE to a cell boundary"),
    BuiltInFn::new("ALIGNED", ForthRuntime::f_aligned, "( addr -- a-addr )", "Round addr up to a cell boundary"),
    BuiltInFn::new(">BODY", ForthRuntime::f_to_body, "( xt -- a-addr )", "Data field address of a CREATEd word"),
    BuiltInFn::new("S\"", ForthRuntime::f_s_quote, "( \"ccc<quote>\" -- c-addr u )", "String literal")
        .runtime(ForthRuntime::i_s_quote)
        .immediate()
        .inline(Inline::CountedString),
    BuiltInFn::new(".\"", ForthRuntime::f_dot_quote, "( \"ccc<quote>\" -- )", "Print a string literal")
        .runtime(ForthRuntime::i_dot_quote)
        .immediate()
        .inline(Inline::CountedString),
];

pub(crate) static COMPILER_EXT_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("VALUE", ForthRuntime::f_value, "( x \"name\" -- )", "Define a value, changed with TO")
        .runtime(ForthRuntime::i_constant),
    BuiltInFn::new("TO", ForthRuntime::f_to, "( x \"name\" -- )", "Store x into a value")
        .runtime(ForthRuntime::i_to)
        .immediate()
        .inline(Inline::Cell),
    BuiltInFn::new("MARKER", ForthRuntime::f_marker, "( \"name\" -- )", "Define a word that removes itself and all later definitions")
        .runtime(ForthRuntime::i_marker),
    BuiltInFn::new("UNUSED", ForthRuntime::f_unused, "( -- u )", "Bytes left in the dictionary"),
];

//////////////////////////////////////////////////////////////
/// TESTS
///
