/// The user dictionary
///
/// Entries are laid out in RAM from DICT_START upward as a singly linked list, newest first:
///
///     link cell      address of the previous entry's link cell, or NO_ENTRY
///     length byte    name length | SMUDGE_FLAG | IMMEDIATE_FLAG
///     name bytes     padded to the next cell boundary
///     code field     token of the defining word's run-time behavior   <- the entry's xt
///     parameters     body cells, constants, data space
///
/// LATEST_ADDR holds the newest link cell, HERE_ADDR the next free byte.
///
use tracing::debug;

use crate::error::ForthError;
use crate::kernel::*;
use crate::runtime::{ForthRuntime, NO_ENTRY};

pub const SMUDGE_FLAG: u8 = 0x80;
pub const IMMEDIATE_FLAG: u8 = 0x40;
pub const NAME_LENGTH_MASK: u8 = 0x3F;

/// The result of a successful dictionary or registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub xt: Cell,
    pub immediate: bool,
    pub compile_only: bool,
}

/// A decoded dictionary entry, used by WORDS and SEE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub link: Addr,
    pub name: String,
    pub xt: Addr,
    pub immediate: bool,
    pub smudged: bool,
}

impl ForthRuntime {
    pub fn here(&self) -> Result<Addr, ForthError> {
        to_addr(self.kernel.get(HERE_ADDR)?)
    }

    pub fn set_here(&mut self, addr: Addr) -> Result<(), ForthError> {
        if !(DICT_START..=DICT_TOP).contains(&addr) {
            return Err(ForthError::DictionaryFull);
        }
        self.kernel.set(HERE_ADDR, addr as Cell)
    }

    pub fn latest(&self) -> Result<Cell, ForthError> {
        self.kernel.get(LATEST_ADDR)
    }

    pub fn set_latest(&mut self, link: Cell) -> Result<(), ForthError> {
        self.kernel.set(LATEST_ADDR, link)
    }

    fn reserve(&mut self, bytes: usize) -> Result<Addr, ForthError> {
        let here = self.here()?;
        if here + bytes > DICT_TOP {
            return Err(ForthError::DictionaryFull);
        }
        self.set_here(here + bytes)?;
        Ok(here)
    }

    /// comma appends a cell at HERE
    pub fn comma(&mut self, val: Cell) -> Result<(), ForthError> {
        let addr = self.reserve(CELL)?;
        self.kernel.set(addr, val)
    }

    pub fn c_comma(&mut self, byte: u8) -> Result<(), ForthError> {
        let addr = self.reserve(1)?;
        self.kernel.memory.set_byte(addr, byte)
    }

    /// allot moves HERE by n bytes; negative n gives space back.
    pub fn allot(&mut self, n: Cell) -> Result<(), ForthError> {
        let here = self.here()? as i64 + n as i64;
        if here < DICT_START as i64 || here > DICT_TOP as i64 {
            return Err(ForthError::DictionaryFull);
        }
        self.set_here(here as Addr)
    }

    pub fn align_here(&mut self) -> Result<(), ForthError> {
        let here = self.here()?;
        self.set_here(align(here))
    }

    /// compile_counted_string appends a length byte and the text, then aligns HERE.
    pub fn compile_counted_string(&mut self, text: &[u8]) -> Result<Addr, ForthError> {
        let len = text.len().min(u8::MAX as usize);
        let start = self.reserve(len + 1)?;
        self.kernel.memory.set_byte(start, len as u8)?;
        self.kernel.memory.write_bytes(start + 1, &text[..len])?;
        self.align_here()?;
        Ok(start)
    }

    fn entry_at(&self, link: Addr) -> Result<Entry, ForthError> {
        let flags = self.kernel.memory.get_byte(link + CELL)?;
        let len = (flags & NAME_LENGTH_MASK) as usize;
        let name = self.kernel.memory.text(link + CELL + 1, len)?;
        Ok(Entry {
            link,
            name,
            xt: align(link + CELL + 1 + len),
            immediate: flags & IMMEDIATE_FLAG != 0,
            smudged: flags & SMUDGE_FLAG != 0,
        })
    }

    /// entries walks the chain from the newest entry back to the oldest.
    pub fn entries(&self) -> Result<Vec<Entry>, ForthError> {
        let mut found = Vec::new();
        let mut link = self.latest()?;
        while link != NO_ENTRY {
            let addr = to_addr(link)?;
            if !(DICT_START..DICT_TOP).contains(&addr) || found.len() > DICT_SIZE / CELL {
                return Err(ForthError::InvalidAddress(link as i64));
            }
            found.push(self.entry_at(addr)?);
            link = self.kernel.get(addr)?;
        }
        Ok(found)
    }

    /// entry_for_xt finds the entry whose code field is at xt.
    pub fn entry_for_xt(&self, xt: Addr) -> Option<Entry> {
        self.entries()
            .ok()?
            .into_iter()
            .find(|entry| entry.xt == xt)
    }

    /// find searches the dictionary for an exact name, skipping entries still being defined.
    pub fn find(&self, name: &[u8]) -> Result<Option<Found>, ForthError> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Ok(None);
        }
        let mut link = self.latest()?;
        let mut steps = 0;
        while link != NO_ENTRY {
            let addr = to_addr(link)?;
            steps += 1;
            if !(DICT_START..DICT_TOP).contains(&addr) || steps > DICT_SIZE / CELL {
                return Err(ForthError::InvalidAddress(link as i64));
            }
            let flags = self.kernel.memory.get_byte(addr + CELL)?;
            let len = (flags & NAME_LENGTH_MASK) as usize;
            if flags & SMUDGE_FLAG == 0
                && len == name.len()
                && self.kernel.memory.bytes(addr + CELL + 1, len)? == name
            {
                return Ok(Some(Found {
                    xt: align(addr + CELL + 1 + len) as Cell,
                    immediate: flags & IMMEDIATE_FLAG != 0,
                    compile_only: false,
                }));
            }
            link = self.kernel.get(addr)?;
        }
        Ok(None)
    }

    /// find_word looks in the dictionary first, then among the built-ins by upcased name.
    pub fn find_word(&self, name: &[u8]) -> Result<Option<Found>, ForthError> {
        if let Some(found) = self.find(name)? {
            return Ok(Some(found));
        }
        let upper = name.to_ascii_uppercase();
        Ok(std::str::from_utf8(&upper)
            .ok()
            .and_then(|upper| self.registry.lookup(upper))
            .map(|w| Found {
                xt: w.xt,
                immediate: w.word.immediate,
                compile_only: w.word.compile_only,
            }))
    }

    /// begin_entry parses the next name from the input and starts an entry for it.
    ///
    /// Returns the address of the length byte, or None (and creates nothing) when the name
    /// is longer than MAX_NAME_LENGTH. A missing name is an error.
    pub fn begin_entry(&mut self, smudge: bool) -> Result<Option<Addr>, ForthError> {
        let (addr, len) = self.parse_name()?;
        if len == 0 {
            return Err(ForthError::MissingName);
        }
        let name = self.kernel.memory.bytes(addr, len)?.to_vec();
        self.create_entry(&name, smudge)
    }

    /// create_entry writes link, length byte and name, leaving HERE at the code field.
    pub fn create_entry(&mut self, name: &[u8], smudge: bool) -> Result<Option<Addr>, ForthError> {
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Ok(None);
        }
        self.align_here()?;
        let link = self.here()?;
        if align(link + CELL + 1 + name.len()) + CELL > DICT_TOP {
            return Err(ForthError::DictionaryFull);
        }
        let previous = self.latest()?;
        self.comma(previous)?;
        let len_addr = self.here()?;
        let flags = name.len() as u8 | if smudge { SMUDGE_FLAG } else { 0 };
        self.c_comma(flags)?;
        for &b in name {
            self.c_comma(b)?;
        }
        self.align_here()?;
        self.set_latest(link as Cell)?;
        debug!(name = %String::from_utf8_lossy(name), link, "new dictionary entry");
        Ok(Some(len_addr))
    }

    pub fn clear_smudge(&mut self, len_addr: Addr) -> Result<(), ForthError> {
        let flags = self.kernel.memory.get_byte(len_addr)?;
        self.kernel.memory.set_byte(len_addr, flags & !SMUDGE_FLAG)
    }

    /// set_immediate flags the newest entry
    pub fn set_immediate(&mut self) -> Result<(), ForthError> {
        let link = self.latest()?;
        if link == NO_ENTRY {
            return Ok(());
        }
        let addr = to_addr(link)? + CELL;
        let flags = self.kernel.memory.get_byte(addr)?;
        self.kernel.memory.set_byte(addr, flags | IMMEDIATE_FLAG)
    }

    /// unwind_compile abandons a definition in progress, restoring HERE and LATEST.
    pub fn unwind_compile(&mut self) {
        if let Some(entry) = self.state.entry {
            if let Ok(previous) = self.kernel.get(entry) {
                let restored = self
                    .set_here(entry)
                    .and_then(|_| self.set_latest(previous));
                if restored.is_ok() {
                    debug!(entry, "abandoned definition");
                }
            }
        }
        self.state = Default::default();
        self.control.clear();
        self.leaves.clear();
    }

    /// truncate_at rolls the dictionary back to a saved HERE and LATEST (MARKER).
    pub fn truncate_at(&mut self, here: Addr, latest: Cell) -> Result<(), ForthError> {
        self.set_here(here)?;
        self.set_latest(latest)?;
        self.release_handlers_from(here)
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///
