//////////////////////////////////////////////////////////////
/// output.rs
///
/// The output sink. All printing words and all diagnostics go through Output::write.
///
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

pub trait Output: Send {
    fn write(&mut self, text: &str);
    fn flush(&mut self) {}
}

/// Stdout writes straight to the process's standard output.
pub struct Stdout;

impl Output for Stdout {
    fn write(&mut self, text: &str) {
        print!("{}", text);
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

/// SharedBuffer collects output in memory; clones share the same buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    text: Arc<Mutex<String>>,
}

impl SharedBuffer {
    pub fn new() -> SharedBuffer {
        SharedBuffer::default()
    }

    pub fn contents(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// take returns everything written so far and empties the buffer.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.text.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Output for SharedBuffer {
    fn write(&mut self, text: &str) {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }
}
