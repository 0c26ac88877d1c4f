// Interpreter internals: the registry, dictionary, both interpreters and the built-in word sets

pub mod builtin;
pub mod compiler;
pub mod console;
pub mod control;
pub mod debug;
pub mod dictionary;
pub mod double;
pub mod facility;
pub mod files;
pub mod general;
pub mod inner;
pub mod parser;

use builtin::{BuiltInFn, WordSet};

/// builtin_tables lists every word table in registration order.
///
/// A word's tokens are its position in this sequence, and snapshots depend on that,
/// so new tables go at the end.
pub fn builtin_tables() -> Vec<(WordSet, &'static [BuiltInFn])> {
    vec![
        (WordSet::Core, general::GENERAL_WORDS),
        (WordSet::Core, compiler::COMPILER_WORDS),
        (WordSet::Core, control::CONTROL_WORDS),
        (WordSet::Core, parser::PARSER_WORDS),
        (WordSet::Core, console::CONSOLE_WORDS),
        (WordSet::Core, double::DOUBLE_CORE_WORDS),
        (WordSet::CoreExt, general::GENERAL_EXT_WORDS),
        (WordSet::CoreExt, compiler::COMPILER_EXT_WORDS),
        (WordSet::CoreExt, control::CONTROL_EXT_WORDS),
        (WordSet::Double, double::DOUBLE_WORDS),
        (WordSet::Double, console::CONSOLE_DOUBLE_WORDS),
        (WordSet::String, console::STRING_WORDS),
        (WordSet::Tools, console::CONSOLE_TOOLS_WORDS),
        (WordSet::Tools, debug::TOOLS_WORDS),
        (WordSet::ToolsExt, control::CONTROL_TOOLS_WORDS),
        (WordSet::File, files::FILE_WORDS),
        (WordSet::Facility, facility::FACILITY_WORDS),
        (WordSet::CommonUse, general::COMMON_USE_WORDS),
        (WordSet::CommonUse, parser::COMMON_PARSER_WORDS),
        (WordSet::CommonUse, double::DOUBLE_COMMON_WORDS),
        (WordSet::Extended, facility::HOST_IO_WORDS),
        (WordSet::Extended, debug::HELP_WORDS),
    ]
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use builtin::Registry;

    #[test]
    fn test_tables_register_without_duplicates() {
        let mut registry = Registry::new();
        for (set, table) in builtin_tables() {
            registry.register_table(set, table).unwrap();
        }
        let total: usize = builtin_tables().iter().map(|(_, t)| t.len()).sum();
        assert_eq!(registry.len(), total);
    }

    #[test]
    fn test_every_word_is_documented() {
        for (_, table) in builtin_tables() {
            for word in table {
                assert!(!word.doc.is_empty(), "{} has no description", word.name);
                assert!(word.stack.starts_with('('), "{} has no stack comment", word.name);
                assert_eq!(word.name, word.name.to_ascii_uppercase());
            }
        }
    }

    #[test]
    fn test_inline_words_have_runtimes() {
        for (_, table) in builtin_tables() {
            for word in table {
                if word.inline != builtin::Inline::Nothing {
                    assert!(word.runtime.is_some(), "{} reads operands but has no runtime", word.name);
                }
            }
        }
    }
}
