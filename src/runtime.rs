//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// This module defines the ForthRuntime struct, the single context object that owns all VM state:
/// the kernel (RAM and stacks), the word registry, compile state, the current input source,
/// the inner interpreter's frames, and the host collaborators (output sink, timers, port
/// listeners, open files). Word behaviors are methods on ForthRuntime and receive it by
/// &mut self, so nothing is shared behind the interpreter's back.
///
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ForthError;
use crate::events::{EventQueue, TimerHost};
use crate::internals::builtin::Registry;
use crate::internals::builtin_tables;
use crate::internals::files::FileTable;
use crate::kernel::*;
use crate::output::Output;
use crate::stack::{ControlFlowStack, LeaveStack};

// GENERAL constants
pub const TRUE: Cell = -1; // forth convention for true and false
pub const FALSE: Cell = 0;
pub const NO_ENTRY: Cell = -1; // link value terminating the dictionary chain
pub const MAX_CALL_DEPTH: usize = 1024;

// SOURCE-ID values
pub const SOURCE_STRING: Cell = -1;
pub const SOURCE_DEFAULT: Cell = 0;

/// The input source being parsed: where its text lives and which cell holds its >IN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub id: Cell,
    pub addr: Addr,
    pub len: usize,
    pub to_in: Addr,
}

impl Source {
    pub fn string(addr: Addr, len: usize) -> Source {
        Source {
            id: SOURCE_STRING,
            addr,
            len,
            to_in: SOURCE_TO_IN,
        }
    }

    pub fn file(file_id: Addr, len: usize) -> Source {
        Source {
            id: file_id as Cell,
            addr: file_id + FILE_BUFF_DATA_OFFSET,
            len,
            to_in: file_id + FILE_BUFF_TO_IN_OFFSET,
        }
    }
}

/// Compile state: whether we are inside a definition and which entry is being built.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompileState {
    pub compiling: bool,
    pub smudge: Option<Addr>, // name-length byte of the entry being defined
    pub entry: Option<Addr>,  // link field of that entry
}

pub type PortListener = Box<dyn FnMut(u8, Cell) + Send>;

pub struct ForthRuntime {
    pub kernel: Kernel,
    pub registry: Registry,
    pub control: ControlFlowStack,
    pub leaves: LeaveStack,
    pub state: CompileState,
    pub source: Source,
    pub ip: Addr,              // next cell of the current colon body
    pub w: Addr,               // code field of the word being executed
    pub(crate) frames: Vec<Addr>, // saved ip per active colon definition
    pub(crate) frame_floor: usize,
    pub files: FileTable,
    pub snapshot_path: Option<PathBuf>,
    output: Box<dyn Output>,
    timers: Option<Box<dyn TimerHost>>,
    queue: Option<Arc<EventQueue>>,
    port_listeners: Vec<PortListener>,
    exit_requested: bool,
}

impl ForthRuntime {
    pub fn new(output: Box<dyn Output>) -> ForthRuntime {
        ForthRuntime {
            kernel: Kernel::new(),
            registry: Registry::new(),
            control: ControlFlowStack::new(),
            leaves: LeaveStack::new(),
            state: CompileState::default(),
            source: Source::string(SOURCE_BUFF_START, 0),
            ip: 0,
            w: 0,
            frames: Vec::new(),
            frame_floor: 0,
            files: FileTable::new(),
            snapshot_path: None,
            output,
            timers: None,
            queue: None,
            port_listeners: Vec::new(),
            exit_requested: false,
        }
    }

    /// boot builds a runtime and cold-starts it in one step.
    pub fn boot(output: Box<dyn Output>) -> Result<ForthRuntime, ForthError> {
        let mut forth = ForthRuntime::new(output);
        forth.cold_start()?;
        Ok(forth)
    }

    /// cold_start registers every built-in word set and resets memory to an empty dictionary.
    ///
    pub fn cold_start(&mut self) -> Result<(), ForthError> {
        let mut registry = Registry::new();
        for (set, table) in builtin_tables() {
            registry.register_table(set, table)?;
        }
        debug!(words = registry.len(), "registered built-in words");
        self.registry = registry;

        self.kernel.memory.clear();
        self.kernel.reset();
        self.kernel.set(BASE_ADDR, 10)?;
        self.kernel.set(HERE_ADDR, DICT_START as Cell)?;
        self.kernel.set(LATEST_ADDR, NO_ENTRY)?;
        self.control.clear();
        self.leaves.clear();
        self.state = CompileState::default();
        self.source = Source::string(SOURCE_BUFF_START, 0);
        self.frames.clear();
        self.frame_floor = 0;
        self.files.close_all();
        self.exit_requested = false;
        Ok(())
    }

    pub fn set_timer_host(&mut self, timers: Box<dyn TimerHost>) {
        self.timers = Some(timers);
    }

    pub fn timers(&mut self) -> Option<&mut (dyn TimerHost + 'static)> {
        self.timers.as_deref_mut()
    }

    /// attach_queue connects the event queue whose port modes LISTEN keeps up to date.
    pub fn attach_queue(&mut self, queue: Arc<EventQueue>) {
        self.queue = Some(queue);
    }

    pub fn queue(&self) -> Option<&Arc<EventQueue>> {
        self.queue.as_ref()
    }

    /// add_port_listener registers a host callback run whenever OUT writes a port.
    pub fn add_port_listener(&mut self, listener: PortListener) {
        self.port_listeners.push(listener);
    }

    pub(crate) fn notify_port(&mut self, port: u8, value: Cell) {
        for listener in self.port_listeners.iter_mut() {
            listener(port, value);
        }
    }

    pub fn write(&mut self, text: &str) {
        self.output.write(text);
    }

    pub fn flush(&mut self) {
        self.output.flush();
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn should_exit(&self) -> bool {
        self.exit_requested
    }

    pub fn is_compiling(&self) -> bool {
        self.state.compiling
    }

    pub fn base(&self) -> Result<u32, ForthError> {
        let base = self.kernel.get(BASE_ADDR)?;
        if (2..=36).contains(&base) {
            Ok(base as u32)
        } else {
            Err(ForthError::InvalidBase(base))
        }
    }

    /// report prints a recovered error the way the outer interpreter shows it.
    pub fn report(&mut self, err: &ForthError) {
        warn!(%err, "interpreter error");
        self.write(&format!(" {}\n", err));
    }

    /// abort discards everything in flight: stacks, frames and any half-built definition.
    pub fn abort(&mut self) {
        self.kernel.reset();
        self.frames.clear();
        self.frame_floor = 0;
        self.unwind_compile();
    }

    /// interpret_line runs one line of terminal input from the string source buffer.
    ///
    /// Errors are reported through the output sink and also returned to the caller. A line
    /// that doesn't fit the buffer is rejected whole.
    pub fn interpret_line(&mut self, line: &str) -> Result<(), ForthError> {
        let bytes = line.as_bytes();
        if bytes.len() > SOURCE_BUFF_SIZE {
            return self.reject_line(bytes.len());
        }
        self.kernel.memory.write_bytes(SOURCE_BUFF_START, bytes)?;
        self.run_source(Source::string(SOURCE_BUFF_START, bytes.len()), true)
    }

    /// interpret_file_line runs one line read from a file through that file's own buffer.
    ///
    /// Only errors are reported; a loaded file doesn't echo " ok" per line.
    pub fn interpret_file_line(&mut self, file_id: Addr, line: &str) -> Result<(), ForthError> {
        let bytes = line.as_bytes();
        if !self.files.is_open(file_id) {
            return Err(ForthError::InvalidFileId(file_id as Cell));
        }
        if bytes.len() > FILE_BUFF_DATA_SIZE {
            return self.reject_line(bytes.len());
        }
        self.kernel
            .memory
            .write_bytes(file_id + FILE_BUFF_DATA_OFFSET, bytes)?;
        self.run_source(Source::file(file_id, bytes.len()), false)
    }

    fn reject_line(&mut self, len: usize) -> Result<(), ForthError> {
        let err = ForthError::LineTooLong(len);
        self.report(&err);
        self.flush();
        Err(err)
    }

    fn run_source(&mut self, source: Source, echo_ok: bool) -> Result<(), ForthError> {
        match self.evaluate_source(source) {
            Ok(()) => {
                if echo_ok {
                    self.write(" ok\n");
                }
                self.flush();
                Ok(())
            }
            Err(err) => {
                self.report(&err);
                self.flush();
                Err(err)
            }
        }
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;

    #[test]
    fn test_cold_start_state() {
        let forth = ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap();
        assert_eq!(forth.kernel.get(BASE_ADDR).unwrap(), 10);
        assert_eq!(forth.kernel.get(HERE_ADDR).unwrap(), DICT_START as Cell);
        assert_eq!(forth.kernel.get(LATEST_ADDR).unwrap(), NO_ENTRY);
        assert!(!forth.is_compiling());
        assert!(forth.registry.len() > 100);
    }

    #[test]
    fn test_interpret_line_reports_ok() {
        let out = SharedBuffer::new();
        let mut forth = ForthRuntime::boot(Box::new(out.clone())).unwrap();
        forth.interpret_line("1 2 +").unwrap();
        assert_eq!(out.take(), " ok\n");
        assert_eq!(forth.kernel.pop().unwrap(), 3);
    }

    #[test]
    fn test_interpret_line_reports_error() {
        let out = SharedBuffer::new();
        let mut forth = ForthRuntime::boot(Box::new(out.clone())).unwrap();
        assert!(forth.interpret_line("drop").is_err());
        assert_eq!(out.take(), " Data stack underflow\n");
    }

    #[test]
    fn test_overlong_line_is_rejected() {
        let out = SharedBuffer::new();
        let mut forth = ForthRuntime::boot(Box::new(out.clone())).unwrap();
        let line = format!("{}7", " ".repeat(SOURCE_BUFF_SIZE));
        assert!(matches!(
            forth.interpret_line(&line),
            Err(ForthError::LineTooLong(n)) if n == SOURCE_BUFF_SIZE + 1
        ));
        assert_eq!(out.take(), format!(" Line too long ({} bytes)\n", SOURCE_BUFF_SIZE + 1));
        assert_eq!(forth.kernel.stack_len(), 0);
        let fits = format!("{}7", " ".repeat(SOURCE_BUFF_SIZE - 1));
        forth.interpret_line(&fits).unwrap();
        assert_eq!(forth.kernel.pop().unwrap(), 7);
    }

    #[test]
    fn test_base_validation() {
        let mut forth = ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap();
        assert_eq!(forth.base().unwrap(), 10);
        forth.kernel.set(BASE_ADDR, 1).unwrap();
        assert!(matches!(forth.base(), Err(ForthError::InvalidBase(1))));
    }
}
