// worddoc: render the built-in word tables as Markdown
//
// Reads the same static tables the interpreter registers at cold start, so the tokens shown
// are the ones a running image uses.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use argh::FromArgs;
use cellforth::internals::builtin_tables;
use cellforth::{ForthError, Registry, WordSet};

#[derive(FromArgs)]
/// write documentation for the cellforth built-in words.
struct Args {
    /// output file; standard output if omitted.
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// only document this word set (e.g. Core, CoreExt, Double, File).
    #[argh(option, short = 'w')]
    word_set: Option<String>,
}

fn matches_set(set: WordSet, filter: &str) -> bool {
    format!("{:?}", set).eq_ignore_ascii_case(filter) || set.title().eq_ignore_ascii_case(filter)
}

fn build_registry() -> Result<Registry, ForthError> {
    let mut registry = Registry::new();
    for (set, table) in builtin_tables() {
        registry.register_table(set, table)?;
    }
    Ok(registry)
}

/// render produces one section per word set, in registration order.
fn render(registry: &Registry, filter: Option<&str>) -> String {
    let mut sets: Vec<WordSet> = Vec::new();
    for word in registry.iter() {
        if !sets.contains(&word.set) {
            sets.push(word.set);
        }
    }
    let mut doc = String::from("# cellforth built-in words\n");
    for set in sets {
        if filter.is_some_and(|f| !matches_set(set, f)) {
            continue;
        }
        doc.push_str(&format!("\n## {}\n\n", set.title()));
        doc.push_str("| Word | Stack | Description | Tokens |\n");
        doc.push_str("|------|-------|-------------|--------|\n");
        for word in registry.iter().filter(|w| w.set == set) {
            let mut flags = String::new();
            if word.word.immediate {
                flags.push_str(" *immediate*");
            }
            if word.word.compile_only {
                flags.push_str(" *compile-only*");
            }
            doc.push_str(&format!(
                "| `{}` | `{}` | {}{} | {:#x} / {:#x} |\n",
                word.word.name, word.word.stack, word.word.doc, flags, word.xt, word.xt_compiled
            ));
        }
    }
    doc
}

fn main() {
    let args: Args = argh::from_env();
    let registry = match build_registry() {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("worddoc: {err}");
            std::process::exit(1);
        }
    };
    let doc = render(&registry, args.word_set.as_deref());
    let written = match &args.output {
        Some(path) => fs::write(path, doc),
        None => io::stdout().write_all(doc.as_bytes()),
    };
    if let Err(err) = written {
        eprintln!("worddoc: {err}");
        std::process::exit(1);
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///
