/// Registry for builtins
///
/// Every built-in word is a static BuiltInFn record: a name, an interpreted behavior, an optional
/// compiled (run-time) behavior, flags, and the documentation used by HELP and worddoc.
/// At cold start the word-set tables are registered in order and each word receives two
/// execution tokens:
///
///     interpreted token = XT_INTERPRETED | index
///     compiled token    = XT_COMPILED | index
///
/// Dictionary addresses are always below DICT_TOP, far below either mask, so a cell can be
/// classified as a token without any other context.
///
use std::collections::HashMap;

use crate::error::ForthError;
use crate::kernel::{Addr, Cell, DICT_START, DICT_TOP};
use crate::runtime::ForthRuntime;

pub const XT_INTERPRETED: Cell = 0x4000_0000;
pub const XT_COMPILED: Cell = 0x2000_0000;
pub const XT_INDEX_MASK: Cell = 0x1FFF_FFFF;

pub type WordFn = fn(&mut ForthRuntime) -> Result<(), ForthError>;

/// Operands compiled inline after a run-time token; SEE uses this to step over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inline {
    Nothing,
    Cell,
    Double,
    Branch,
    CountedString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordSet {
    Core,
    CoreExt,
    Double,
    String,
    Tools,
    ToolsExt,
    File,
    Facility,
    CommonUse,
    Extended,
}

impl WordSet {
    pub fn title(&self) -> &'static str {
        match self {
            WordSet::Core => "Core",
            WordSet::CoreExt => "Core extensions",
            WordSet::Double => "Double-number",
            WordSet::String => "String",
            WordSet::Tools => "Programming tools",
            WordSet::ToolsExt => "Programming tools extensions",
            WordSet::File => "File access",
            WordSet::Facility => "Facility",
            WordSet::CommonUse => "Common use",
            WordSet::Extended => "Host extensions",
        }
    }
}

// The internal format for builtins: a name, code pointers, and documentation for HELP and SEE
#[derive(Clone, Copy)]
pub struct BuiltInFn {
    pub name: &'static str,
    pub code: WordFn,
    pub runtime: Option<WordFn>,
    pub immediate: bool,
    pub compile_only: bool,
    pub inline: Inline,
    pub stack: &'static str,
    pub doc: &'static str,
}

impl BuiltInFn {
    pub const fn new(
        name: &'static str,
        code: WordFn,
        stack: &'static str,
        doc: &'static str,
    ) -> BuiltInFn {
        BuiltInFn {
            name,
            code,
            runtime: None,
            immediate: false,
            compile_only: false,
            inline: Inline::Nothing,
            stack,
            doc,
        }
    }

    /// runtime sets the behavior executed when the compiled token is found in a definition.
    pub const fn runtime(mut self, f: WordFn) -> BuiltInFn {
        self.runtime = Some(f);
        self
    }

    pub const fn immediate(mut self) -> BuiltInFn {
        self.immediate = true;
        self
    }

    pub const fn compile_only(mut self) -> BuiltInFn {
        self.compile_only = true;
        self
    }

    pub const fn inline(mut self, inline: Inline) -> BuiltInFn {
        self.inline = inline;
        self
    }

    /// The behavior for the compiled token; words without one reuse the interpreted behavior.
    pub fn compiled_code(&self) -> WordFn {
        self.runtime.unwrap_or(self.code)
    }
}

/// The three things a cell can mean when it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xt {
    Interpreted(usize),
    Compiled(usize),
    Address(Addr),
}

impl Xt {
    pub fn decode(token: Cell) -> Option<Xt> {
        if token <= 0 {
            return None;
        }
        let index = (token & XT_INDEX_MASK) as usize;
        match (token & XT_INTERPRETED != 0, token & XT_COMPILED != 0) {
            (true, false) => Some(Xt::Interpreted(index)),
            (false, true) => Some(Xt::Compiled(index)),
            (false, false) if (DICT_START..DICT_TOP).contains(&(token as Addr)) => {
                Some(Xt::Address(token as Addr))
            }
            _ => None,
        }
    }
}

pub struct RegisteredWord {
    pub word: &'static BuiltInFn,
    pub set: WordSet,
    pub xt: Cell,
    pub xt_compiled: Cell,
}

#[derive(Default)]
pub struct Registry {
    words: Vec<RegisteredWord>,
    names: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// register assigns the next pair of tokens. A repeated name is a fatal startup error.
    pub fn register(&mut self, set: WordSet, word: &'static BuiltInFn) -> Result<Cell, ForthError> {
        if self.names.contains_key(word.name) {
            return Err(ForthError::DuplicateWord(word.name.to_string()));
        }
        let index = self.words.len();
        if index > XT_INDEX_MASK as usize {
            return Err(ForthError::TokenSpaceExhausted);
        }
        let xt = XT_INTERPRETED | index as Cell;
        self.words.push(RegisteredWord {
            word,
            set,
            xt,
            xt_compiled: XT_COMPILED | index as Cell,
        });
        self.names.insert(word.name, index);
        Ok(xt)
    }

    pub fn register_table(&mut self, set: WordSet, table: &'static [BuiltInFn]) -> Result<(), ForthError> {
        for word in table {
            self.register(set, word)?;
        }
        Ok(())
    }

    /// lookup expects the upcased name.
    pub fn lookup(&self, name: &str) -> Option<&RegisteredWord> {
        self.names.get(name).map(|&i| &self.words[i])
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredWord> {
        self.words.get(index)
    }

    /// resolve maps either token of a word back to its record.
    pub fn resolve(&self, token: Cell) -> Option<&RegisteredWord> {
        match Xt::decode(token)? {
            Xt::Interpreted(i) | Xt::Compiled(i) => self.words.get(i),
            Xt::Address(_) => None,
        }
    }

    pub fn xt(&self, name: &str) -> Result<Cell, ForthError> {
        self.lookup(name)
            .map(|w| w.xt)
            .ok_or_else(|| ForthError::UnknownWord(name.to_string()))
    }

    pub fn xt_compiled(&self, name: &str) -> Result<Cell, ForthError> {
        self.lookup(name)
            .map(|w| w.xt_compiled)
            .ok_or_else(|| ForthError::UnknownWord(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredWord> {
        self.words.iter()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut ForthRuntime) -> Result<(), ForthError> {
        Ok(())
    }

    static TABLE: &[BuiltInFn] = &[
        BuiltInFn::new("ALPHA", nop, "( -- )", "First"),
        BuiltInFn::new("BETA", nop, "( -- )", "Second").runtime(nop).immediate(),
    ];

    static CLASH: &[BuiltInFn] = &[BuiltInFn::new("ALPHA", nop, "( -- )", "Again")];

    #[test]
    fn test_sequential_tokens() {
        let mut reg = Registry::new();
        reg.register_table(WordSet::Core, TABLE).unwrap();
        assert_eq!(reg.xt("ALPHA").unwrap(), XT_INTERPRETED);
        assert_eq!(reg.xt("BETA").unwrap(), XT_INTERPRETED | 1);
        assert_eq!(reg.xt_compiled("BETA").unwrap(), XT_COMPILED | 1);
        assert!(reg.lookup("BETA").unwrap().word.immediate);
        assert_eq!(reg.resolve(XT_COMPILED | 1).unwrap().word.name, "BETA");
        assert!(reg.resolve(XT_INTERPRETED | 2).is_none());
    }

    #[test]
    fn test_duplicate_name_is_fatal() {
        let mut reg = Registry::new();
        reg.register_table(WordSet::Core, TABLE).unwrap();
        let err = reg.register_table(WordSet::Core, CLASH).unwrap_err();
        assert!(matches!(err, ForthError::DuplicateWord(name) if name == "ALPHA"));
    }

    #[test]
    fn test_decode_classifies_tokens() {
        assert_eq!(Xt::decode(XT_INTERPRETED | 5), Some(Xt::Interpreted(5)));
        assert_eq!(Xt::decode(XT_COMPILED | 5), Some(Xt::Compiled(5)));
        assert_eq!(Xt::decode(DICT_START as Cell + 8), Some(Xt::Address(DICT_START + 8)));
        assert_eq!(Xt::decode(0), None);
        assert_eq!(Xt::decode(-1), None);
        assert_eq!(Xt::decode(DICT_TOP as Cell), None);
        assert_eq!(Xt::decode(XT_INTERPRETED | XT_COMPILED), None);
    }
}
