// Debugging help: inspecting memory, the dictionary and the built-in documentation

use crate::error::ForthError;
use crate::internals::builtin::{BuiltInFn, Inline, RegisteredWord, Xt};
use crate::internals::console::format_number;
use crate::kernel::*;
use crate::runtime::ForthRuntime;

const NOT_FOUND: &str = "(not found)";

impl ForthRuntime {
    /// ? ( a-addr -- ) print the cell at a-addr
    ///
    pub fn f_question(&mut self) -> Result<(), ForthError> {
        let addr = self.kernel.pop_addr()?;
        let value = self.kernel.get(addr)?;
        let text = format_number(value as i128, self.base()?);
        self.write(&text);
        self.write(" ");
        Ok(())
    }

    /// DUMP ( addr u -- ) print u bytes from addr, sixteen to a line, in hex and as text
    ///
    pub fn f_dump(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        let bytes = self.kernel.memory.bytes(addr, len)?.to_vec();
        let mut text = String::new();
        for (row, chunk) in bytes.chunks(16).enumerate() {
            text.push_str(&format!("\n{:05X}:", addr + row * 16));
            for b in chunk {
                text.push_str(&format!(" {:02X}", b));
            }
            text.push_str(&"   ".repeat(16 - chunk.len()));
            text.push_str("  ");
            text.extend(chunk.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' }));
        }
        text.push('\n');
        self.write(&text);
        Ok(())
    }

    /// WORDS ( -- ) list the dictionary, newest first, then the built-ins
    ///
    pub fn f_words(&mut self) -> Result<(), ForthError> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|entry| !entry.smudged)
            .map(|entry| entry.name)
            .collect();
        names.extend(self.registry.iter().map(|w| w.word.name.to_string()));
        let mut text = String::new();
        let mut column = 0;
        for name in names {
            if column + name.len() > 78 {
                text.push('\n');
                column = 0;
            }
            column += name.len() + 1;
            text.push_str(&name);
            text.push(' ');
        }
        self.write(&text);
        Ok(())
    }

    /// SEE ( "name" -- ) decompile a word
    ///
    pub fn f_see(&mut self) -> Result<(), ForthError> {
        let xt = self.parse_found()?;
        let text = self.decompile(xt)?;
        self.write(&text);
        Ok(())
    }

    /// decompile renders a word back into source-like text.
    ///     Built-ins show their stack comment; colon definitions are walked cell by cell
    ///     up to the compiled `;`, stepping over inline operands as each run-time token declares.
    pub fn decompile(&self, xt: Cell) -> Result<String, ForthError> {
        let addr = match Xt::decode(xt) {
            Some(Xt::Address(addr)) => addr,
            Some(_) => {
                let word = self.registry.resolve(xt).ok_or(ForthError::InvalidXt(xt))?;
                return Ok(format!("{} {} built-in", word.word.name, word.word.stack));
            }
            None => return Err(ForthError::InvalidXt(xt)),
        };
        let entry = self.entry_for_xt(addr).ok_or(ForthError::InvalidXt(xt))?;
        let definer = self
            .registry
            .resolve(self.kernel.get(addr)?)
            .ok_or(ForthError::InvalidXt(xt))?
            .word
            .name;
        let base = self.base()?;
        let mut text = format!("{} {}", definer, entry.name);
        match definer {
            ":" => {}
            "CONSTANT" | "VALUE" => {
                let value = self.kernel.get(addr + CELL)?;
                text = format!("{} {} {}", format_number(value as i128, base), definer, entry.name);
            }
            _ => return Ok(text),
        }
        if definer == ":" {
            let end = self.here()?;
            let mut ip = addr + CELL;
            while ip < end {
                let token = self.kernel.get(ip)?;
                ip += CELL;
                text.push(' ');
                match Xt::decode(token) {
                    Some(Xt::Compiled(i)) => {
                        let word = self.registry.get(i).ok_or(ForthError::InvalidXt(token))?.word;
                        match (word.name, word.inline) {
                            (";", _) => {
                                text.push(';');
                                break;
                            }
                            ("LITERAL", _) => {
                                let value = self.kernel.get(ip)?;
                                text.push_str(&format_number(value as i128, base));
                                ip += CELL;
                            }
                            ("2LITERAL", _) => {
                                let value = self.kernel.memory.get_dcell(ip)?;
                                text.push_str(&format_number(value as i128, base));
                                text.push('.');
                                ip += 2 * CELL;
                            }
                            ("TO", _) => {
                                let body = to_addr(self.kernel.get(ip)?)?;
                                let target = self.entry_for_xt(body - CELL).map(|e| e.name).unwrap_or_default();
                                text.push_str(&format!("TO {}", target));
                                ip += CELL;
                            }
                            (name, Inline::Branch) => {
                                text.push_str(&format!("{}:{:#x}", name, self.kernel.get(ip)?));
                                ip += CELL;
                            }
                            (name, Inline::CountedString) => {
                                let len = self.kernel.memory.get_byte(ip)? as usize;
                                let s = self.kernel.memory.text(ip + 1, len)?;
                                text.push_str(&format!("{} {}\"", name, s));
                                ip = align(ip + 1 + len);
                            }
                            (name, Inline::Cell) => {
                                text.push_str(&format!("{} {}", name, self.kernel.get(ip)?));
                                ip += CELL;
                            }
                            (name, Inline::Double) => {
                                text.push_str(&format!("{} {}", name, self.kernel.memory.get_dcell(ip)?));
                                ip += 2 * CELL;
                            }
                            (name, Inline::Nothing) => text.push_str(name),
                        }
                    }
                    Some(Xt::Interpreted(i)) => {
                        let word = self.registry.get(i).ok_or(ForthError::InvalidXt(token))?;
                        text.push_str(word.word.name);
                    }
                    Some(Xt::Address(call)) => match self.entry_for_xt(call) {
                        Some(callee) => text.push_str(&callee.name),
                        None => text.push_str(&format!("{:#x}", call)),
                    },
                    None => text.push_str(&format!("{:#x}", token)),
                }
            }
        }
        if entry.immediate {
            text.push_str(" IMMEDIATE");
        }
        Ok(text)
    }

    fn help_with(&mut self, describe: fn(&RegisteredWord) -> String) -> Result<(), ForthError> {
        let name = self.parse_name_text()?.to_ascii_uppercase();
        let text = match self.registry.lookup(&name) {
            Some(word) => describe(word),
            None => NOT_FOUND.to_string(),
        };
        self.write(" ");
        self.write(&text);
        Ok(())
    }

    /// HELP ( "name" -- ) print a built-in's description
    pub fn f_help(&mut self) -> Result<(), ForthError> {
        self.help_with(|w| w.word.doc.to_string())
    }

    /// HELPS ( "name" -- ) print a built-in's stack comment
    pub fn f_helps(&mut self) -> Result<(), ForthError> {
        self.help_with(|w| w.word.stack.to_string())
    }

    /// HELPWS ( "name" -- ) print the word set a built-in belongs to
    pub fn f_helpws(&mut self) -> Result<(), ForthError> {
        self.help_with(|w| w.set.title().to_string())
    }

    pub fn f_save_snap(&mut self) -> Result<(), ForthError> {
        let path = self.snapshot_path.clone().ok_or(ForthError::NoSnapshotFile)?;
        self.save_snapshot(&path)
    }

    /// LOAD-SNAP replaces RAM, input buffers included, so the rest of the line is dropped.
    /// Called from a definition, it also ends the current EXECUTE: the body it was
    /// running is gone.
    pub fn f_load_snap(&mut self) -> Result<(), ForthError> {
        let path = self.snapshot_path.clone().ok_or(ForthError::NoSnapshotFile)?;
        self.load_snapshot(&path)?;
        self.frames.truncate(self.frame_floor);
        self.skip_source()
    }
}

pub(crate) static TOOLS_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("?", ForthRuntime::f_question, "( a-addr -- )", "Print the cell at a-addr"),
    BuiltInFn::new("DUMP", ForthRuntime::f_dump, "( addr u -- )", "Print u bytes of memory in hex and as text"),
    BuiltInFn::new("WORDS", ForthRuntime::f_words, "( -- )", "List every word, newest definitions first"),
    BuiltInFn::new("SEE", ForthRuntime::f_see, "( \"name\" -- )", "Decompile a word"),
];

pub(crate) static HELP_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("HELP", ForthRuntime::f_help, "( \"name\" -- )", "Print the description of a built-in word"),
    BuiltInFn::new("HELPS", ForthRuntime::f_helps, "( \"name\" -- )", "Print the stack comment of a built-in word"),
    BuiltInFn::new("HELPWS", ForthRuntime::f_helpws, "( \"name\" -- )", "Print the word set of a built-in word"),
    BuiltInFn::new("SAVE-SNAP", ForthRuntime::f_save_snap, "( -- )", "Save RAM to the snapshot file"),
    BuiltInFn::new("LOAD-SNAP", ForthRuntime::f_load_snap, "( -- )", "Restore RAM from the snapshot file"),
];

//////////////////////////////////////////////////////////////
/// TESTS
///
