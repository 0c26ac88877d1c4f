////////////////////////////
/// File: src/internals/files.rs
///
/// File access words and the file-buffer pool.
///
///     Each open file owns one of FILE_BUFF_QTY slots in RAM. The slot's address is the
///     Forth file id; its first cell holds the open mode (zero when free), the second the >IN
///     used while interpreting a line from the file, the rest the line text itself.
///     The host-side handle (the std::fs::File) lives in FileTable, keyed by the same id.
///
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ForthError;
use crate::internals::builtin::BuiltInFn;
use crate::kernel::*;
use crate::runtime::ForthRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    RO = 1, // Read-only
    WO = 2, // Write-only
    RW = 3, // Read-write
}

impl FileMode {
    pub fn from_cell(val: Cell) -> Option<FileMode> {
        match val {
            1 => Some(FileMode::RO),
            2 => Some(FileMode::WO),
            3 => Some(FileMode::RW),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FType {
    BReader(BufReader<File>), // read-only and read-write files
    File(File),               // write-only files
}

#[derive(Debug)]
pub struct FileHandle {
    pub source: FType,
    pub file_mode: FileMode,
    pub path: PathBuf,
    pending: String, // unread remainder of a line longer than the caller's buffer
}

impl FileHandle {
    fn open(path: &Path, mode: FileMode) -> std::io::Result<FileHandle> {
        let source = match mode {
            FileMode::RO => FType::BReader(BufReader::new(File::open(path)?)),
            FileMode::WO => FType::File(File::create(path)?),
            FileMode::RW => FType::BReader(BufReader::new(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)?,
            )),
        };
        Ok(FileHandle {
            source,
            file_mode: mode,
            path: path.to_path_buf(),
            pending: String::new(),
        })
    }

    /// read_line returns at most max bytes of the next line, without its terminator.
    pub fn read_line(&mut self, max: usize) -> std::io::Result<Option<String>> {
        if self.pending.is_empty() {
            let reader = match &mut self.source {
                FType::BReader(reader) => reader,
                FType::File(_) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        "file is write-only",
                    ))
                }
            };
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim_end_matches(['\n', '\r']).len();
            line.truncate(trimmed);
            self.pending = line;
        }
        let mut cut = self.pending.len().min(max);
        while !self.pending.is_char_boundary(cut) {
            cut -= 1;
        }
        let rest = self.pending.split_off(cut);
        Ok(Some(std::mem::replace(&mut self.pending, rest)))
    }

    pub fn write_line(&mut self, text: &[u8]) -> std::io::Result<()> {
        let file = match &mut self.source {
            FType::BReader(reader) => reader.get_mut(),
            FType::File(file) => file,
        };
        if self.file_mode == FileMode::RO {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "file is read-only",
            ));
        }
        file.write_all(text)?;
        file.write_all(b"\n")
    }
}

/// Host handles of open files, keyed by file id (the slot address).
#[derive(Debug, Default)]
pub struct FileTable {
    handles: HashMap<Addr, FileHandle>,
}

impl FileTable {
    pub fn new() -> FileTable {
        FileTable::default()
    }

    pub fn is_open(&self, id: Addr) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn get_mut(&mut self, id: Addr) -> Option<&mut FileHandle> {
        self.handles.get_mut(&id)
    }

    pub fn close_all(&mut self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

fn ior_of(err: &std::io::Error) -> Cell {
    err.raw_os_error().map(|code| -code.abs()).unwrap_or(-1)
}

impl ForthRuntime {
    /// open_file claims a free buffer slot and opens path in it, returning the file id.
    pub fn open_file(&mut self, path: &Path, mode: FileMode) -> Result<Addr, ForthError> {
        let mut slot = None;
        for i in 0..FILE_BUFF_QTY {
            let id = FILE_BUFF_START + i * FILE_BUFF_SIZE;
            if self.kernel.get(id + FILE_BUFF_MODE_OFFSET)? == 0 && !self.files.is_open(id) {
                slot = Some(id);
                break;
            }
        }
        let id = slot.ok_or(ForthError::FileBuffersExhausted)?;
        let handle = FileHandle::open(path, mode)?;
        self.kernel.set(id + FILE_BUFF_MODE_OFFSET, mode as Cell)?;
        self.kernel.set(id + FILE_BUFF_TO_IN_OFFSET, 0)?;
        self.files.handles.insert(id, handle);
        info!(path = %path.display(), id, "opened file");
        Ok(id)
    }

    pub fn close_file(&mut self, id: Addr) -> Result<(), ForthError> {
        if self.files.handles.remove(&id).is_none() {
            return Err(ForthError::InvalidFileId(id as Cell));
        }
        self.kernel.set(id + FILE_BUFF_MODE_OFFSET, 0)
    }

    /// read_file_line reads the next line of an open file, or None at end of file.
    pub fn read_file_line(&mut self, id: Addr, max: usize) -> Result<Option<String>, ForthError> {
        let handle = self
            .files
            .get_mut(id)
            .ok_or(ForthError::InvalidFileId(id as Cell))?;
        Ok(handle.read_line(max)?)
    }

    /// include_file interprets a source file line by line, stopping at the first error.
    /// Lines are read whole; one too long for the file buffer is an error, not split.
    pub fn include_file(&mut self, path: &Path) -> Result<(), ForthError> {
        let id = self.open_file(path, FileMode::RO)?;
        let mut result = Ok(());
        loop {
            match self.read_file_line(id, usize::MAX) {
                Ok(Some(line)) => {
                    result = self.interpret_file_line(id, &line);
                    if result.is_err() || self.should_exit() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.close_file(id)?;
        result
    }

    fn pop_file_id(&mut self) -> Result<Addr, ForthError> {
        let id = self.kernel.pop()?;
        match to_addr(id) {
            Ok(addr) if self.files.is_open(addr) => Ok(addr),
            _ => Err(ForthError::InvalidFileId(id)),
        }
    }

    pub fn f_r_o(&mut self) -> Result<(), ForthError> {
        self.kernel.push(FileMode::RO as Cell)
    }

    pub fn f_w_o(&mut self) -> Result<(), ForthError> {
        self.kernel.push(FileMode::WO as Cell)
    }

    pub fn f_r_w(&mut self) -> Result<(), ForthError> {
        self.kernel.push(FileMode::RW as Cell)
    }

    /// OPEN-FILE ( c-addr u fam -- fileid ior )
    pub fn f_open_file(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let fam = self.kernel.pop()?;
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        let path = PathBuf::from(self.kernel.memory.text(addr, len)?);
        let mode = match FileMode::from_cell(fam) {
            Some(mode) => mode,
            None => {
                self.kernel.push(0)?;
                return self.kernel.push(-1);
            }
        };
        match self.open_file(&path, mode) {
            Ok(id) => {
                self.kernel.push(id as Cell)?;
                self.kernel.push(0)
            }
            Err(ForthError::Io(err)) => {
                self.kernel.push(0)?;
                self.kernel.push(ior_of(&err))
            }
            Err(ForthError::FileBuffersExhausted) => {
                self.write(" File buffers exhausted");
                self.kernel.push(0)?;
                self.kernel.push(-1)
            }
            Err(err) => Err(err),
        }
    }

    /// CLOSE-FILE ( fileid -- ior )
    pub fn f_close_file(&mut self) -> Result<(), ForthError> {
        let id = self.kernel.pop()?;
        let ior = match to_addr(id).and_then(|addr| self.close_file(addr)) {
            Ok(()) => 0,
            Err(_) => -1,
        };
        self.kernel.push(ior)
    }

    /// READ-LINE ( c-addr u1 fileid -- u2 flag ior )
    pub fn f_read_line(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let id = self.pop_file_id()?;
        let max = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        match self.read_file_line(id, max) {
            Ok(Some(line)) => {
                let bytes = line.as_bytes();
                self.kernel.memory.write_bytes(addr, bytes)?;
                self.kernel.push(bytes.len() as Cell)?;
                self.kernel.push(-1)?;
                self.kernel.push(0)
            }
            Ok(None) => {
                self.kernel.push(0)?;
                self.kernel.push(0)?;
                self.kernel.push(0)
            }
            Err(ForthError::Io(err)) => {
                self.kernel.push(0)?;
                self.kernel.push(0)?;
                self.kernel.push(ior_of(&err))
            }
            Err(err) => Err(err),
        }
    }

    /// WRITE-LINE ( c-addr u fileid -- ior )
    pub fn f_write_line(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(3)?;
        let id = self.pop_file_id()?;
        let len = self.kernel.pop_len()?;
        let addr = self.kernel.pop_addr()?;
        let text = self.kernel.memory.bytes(addr, len)?.to_vec();
        let ior = match self.files.get_mut(id).map(|h| h.write_line(&text)) {
            Some(Ok(())) => 0,
            Some(Err(err)) => ior_of(&err),
            None => -1,
        };
        self.kernel.push(ior)
    }
}

pub(crate) static FILE_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("R/O", ForthRuntime::f_r_o, "( -- fam )", "Read-only access method"),
    BuiltInFn::new("W/O", ForthRuntime::f_w_o, "( -- fam )", "Write-only access method"),
    BuiltInFn::new("R/W", ForthRuntime::f_r_w, "( -- fam )", "Read-write access method"),
    BuiltInFn::new("OPEN-FILE", ForthRuntime::f_open_file, "( c-addr u fam -- fileid ior )", "Open the named file"),
    BuiltInFn::new("CLOSE-FILE", ForthRuntime::f_close_file, "( fileid -- ior )", "Close a file and free its buffer"),
    BuiltInFn::new("READ-LINE", ForthRuntime::f_read_line, "( c-addr u1 fileid -- u2 flag ior )", "Read the next line into c-addr"),
    BuiltInFn::new("WRITE-LINE", ForthRuntime::f_write_line, "( c-addr u fileid -- ior )", "Write a line to a file"),
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

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cellforth-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_pool_exhaustion() {
        let (mut f, out) = forth();
        let path = temp_path("pool.txt");
        std::fs::write(&path, "x\n").unwrap();
        let mut ids = Vec::new();
        for _ in 0..FILE_BUFF_QTY {
            ids.push(f.open_file(&path, FileMode::RO).unwrap());
        }
        assert!(matches!(f.open_file(&path, FileMode::RO), Err(ForthError::FileBuffersExhausted)));
        let line = format!("s\" {}\" r/o open-file", path.display());
        f.interpret_line(&line).unwrap();
        assert!(out.take().contains("File buffers exhausted"));
        assert_eq!(f.kernel.pop().unwrap(), -1);
        f.close_file(ids[3]).unwrap();
        assert_eq!(f.open_file(&path, FileMode::RO).unwrap(), ids[3]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_then_read_lines() {
        let (mut f, _) = forth();
        let path = temp_path("lines.txt");
        let open = format!("s\" {}\" w/o open-file drop", path.display());
        f.interpret_line(&open).unwrap();
        f.interpret_line("dup s\" first\" rot write-line drop").unwrap();
        f.interpret_line("dup s\" second line\" rot write-line drop close-file").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond line\n");

        let open = format!("s\" {}\" r/o open-file drop", path.display());
        f.interpret_line(&open).unwrap();
        let id = f.kernel.pop().unwrap();
        f.kernel.push(id).unwrap();
        f.interpret_line("pad 6 rot read-line").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 0);
        assert_eq!(f.kernel.pop().unwrap(), -1);
        assert_eq!(f.kernel.pop().unwrap(), 5);
        assert_eq!(f.kernel.memory.text(PAD_START, 5).unwrap(), "first");

        let handle_line = f.read_file_line(id as Addr, 6).unwrap();
        assert_eq!(handle_line.as_deref(), Some("second"));
        assert_eq!(f.read_file_line(id as Addr, 80).unwrap().as_deref(), Some(" line"));
        assert_eq!(f.read_file_line(id as Addr, 80).unwrap(), None);
        f.close_file(id as Addr).unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_returns_ior() {
        let (mut f, _) = forth();
        let line = format!("s\" {}\" r/o open-file", temp_path("absent.txt").display());
        f.interpret_line(&line).unwrap();
        assert_ne!(f.kernel.pop().unwrap(), 0);
        assert_eq!(f.kernel.pop().unwrap(), 0);
        assert!(f.files.is_empty());
    }

    #[test]
    fn test_file_source_id() {
        let (mut f, _) = forth();
        let path = temp_path("source.fs");
        std::fs::write(&path, ": from-file 99 ;\nsource-id\n").unwrap();
        let id = f.open_file(&path, FileMode::RO).unwrap();
        while let Some(line) = f.read_file_line(id, FILE_BUFF_DATA_SIZE).unwrap() {
            f.interpret_file_line(id, &line).unwrap();
        }
        assert_eq!(f.kernel.pop().unwrap(), id as Cell);
        f.interpret_line("from-file source-id").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), -1);
        assert_eq!(f.kernel.pop().unwrap(), 99);
        f.close_file(id).unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_include_file_stops_at_error() {
        let (mut f, out) = forth();
        let path = temp_path("include.fs");
        std::fs::write(&path, ": twice 2 * ;\n21 twice\nbogus\n99\n").unwrap();
        assert!(matches!(f.include_file(&path), Err(ForthError::UnknownWord(_))));
        assert_eq!(out.take(), " bogus ?\n");
        assert_eq!(f.kernel.pop().unwrap(), 42);
        assert!(f.files.is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_include_file_rejects_long_line() {
        let (mut f, out) = forth();
        let path = temp_path("long.fs");
        let long = format!("1 {}2\n3\n", " ".repeat(FILE_BUFF_DATA_SIZE));
        std::fs::write(&path, long).unwrap();
        assert!(matches!(f.include_file(&path), Err(ForthError::LineTooLong(_))));
        assert!(out.take().starts_with(" Line too long"));
        assert_eq!(f.kernel.stack_len(), 0);
        assert!(f.files.is_empty());
        std::fs::remove_file(&path).unwrap();
    }
}
