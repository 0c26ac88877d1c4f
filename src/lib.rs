//! cellforth: a Forth virtual machine over a flat, cell-addressed RAM image.
//!
//! `ForthRuntime` owns everything: RAM, the stacks, the built-in registry and the
//! dictionary that lives inside RAM. Hosts feed it lines with `interpret_line`, or
//! run it from an `EventQueue` alongside port and timer events.

pub mod error;
pub mod events;
pub mod internals;
pub mod kernel;
pub mod output;
pub mod runtime;
pub mod snapshot;
pub mod stack;

pub use error::ForthError;
pub use events::{run_events, Event, EventQueue, QueueMode, ThreadTimers, TimerHost};
pub use internals::builtin::{BuiltInFn, Registry, WordSet};
pub use internals::files::FileMode;
pub use output::{Output, SharedBuffer, Stdout};
pub use runtime::ForthRuntime;
pub use snapshot::Snapshot;
