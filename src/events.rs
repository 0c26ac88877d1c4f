//////////////////////////////////////////////////////////////
/// events.rs
///
/// Event queue for the interpreter thread
///
/// Input ports, periodic timers and the terminal all produce work on their own threads. They
/// post it here; the interpreter thread blocks in `EventQueue::next` and handles one event to
/// completion before asking for the next. Pending port events are served first, then timer
/// expirations, then terminal lines.
///
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::ForthError;
use crate::kernel::{Cell, IO_PORTS};
use crate::runtime::ForthRuntime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Port { port: u8, value: Cell },
    Timer(u8),
    Line(String),
}

/// How a new value on a listened port is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    #[default]
    Always = 0, // every value is queued
    Changes = 1, // only values that differ from the newest one known
    Replace = 2, // a pending event for the port is overwritten in place
}

impl QueueMode {
    pub fn from_cell(val: Cell) -> Option<QueueMode> {
        match val {
            0 => Some(QueueMode::Always),
            1 => Some(QueueMode::Changes),
            2 => Some(QueueMode::Replace),
            _ => None,
        }
    }
}

struct Pending {
    ports: VecDeque<(u8, Cell)>,
    timers: VecDeque<u8>,
    lines: VecDeque<String>,
    modes: [QueueMode; IO_PORTS],
    delivered: [Cell; IO_PORTS], // last value handed to the interpreter, per port
    closed: bool,
}

impl Pending {
    fn take(&mut self) -> Option<Event> {
        if let Some((port, value)) = self.ports.pop_front() {
            self.delivered[port as usize] = value;
            return Some(Event::Port { port, value });
        }
        if let Some(id) = self.timers.pop_front() {
            return Some(Event::Timer(id));
        }
        self.lines.pop_front().map(Event::Line)
    }
}

pub struct EventQueue {
    pending: Mutex<Pending>,
    ready: Condvar,
}

impl Default for EventQueue {
    fn default() -> Self {
        EventQueue::new()
    }
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue {
            pending: Mutex::new(Pending {
                ports: VecDeque::new(),
                timers: VecDeque::new(),
                lines: VecDeque::new(),
                modes: [QueueMode::Always; IO_PORTS],
                delivered: [0; IO_PORTS],
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_port_mode(&self, port: u8, mode: QueueMode) {
        self.lock().modes[port as usize] = mode;
    }

    pub fn port_mode(&self, port: u8) -> QueueMode {
        self.lock().modes[port as usize]
    }

    /// port_event posts a new input-port value under the port's queue mode.
    ///
    /// Returns true if a new event was queued.
    pub fn port_event(&self, port: u8, value: Cell) -> bool {
        let mut guard = self.lock();
        let pending = &mut *guard;
        if pending.closed {
            return false;
        }
        let mode = pending.modes[port as usize];
        let enqueue = match mode {
            QueueMode::Always => true,
            _ => match pending.ports.iter_mut().rev().find(|(p, _)| *p == port) {
                Some(queued) if mode == QueueMode::Changes => queued.1 != value,
                Some(queued) => {
                    queued.1 = value;
                    false
                }
                None => pending.delivered[port as usize] != value,
            },
        };
        if enqueue {
            pending.ports.push_back((port, value));
            self.ready.notify_one();
        }
        trace!(port, value, ?mode, enqueue, "port event");
        enqueue
    }

    /// timer_expired posts a timer event unless one for the same id is still pending.
    ///
    /// Returns false once the queue is closed, which tells the timer to stop.
    pub fn timer_expired(&self, id: u8) -> bool {
        let mut pending = self.lock();
        if pending.closed {
            return false;
        }
        if !pending.timers.contains(&id) {
            pending.timers.push_back(id);
            self.ready.notify_one();
        }
        true
    }

    pub fn push_line(&self, line: String) {
        let mut pending = self.lock();
        if !pending.closed {
            pending.lines.push_back(line);
            self.ready.notify_one();
        }
    }

    /// close wakes every waiter; events already queued are still delivered.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn try_next(&self) -> Option<Event> {
        self.lock().take()
    }

    /// next blocks until an event is available, or returns None once closed and drained.
    pub fn next(&self) -> Option<Event> {
        let mut pending = self.lock();
        loop {
            if let Some(event) = pending.take() {
                return Some(event);
            }
            if pending.closed {
                return None;
            }
            pending = self
                .ready
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// The host side of P-TIMER and P-STOP.
pub trait TimerHost: Send {
    fn start(&mut self, id: u8, interval_ms: u32);
    fn stop(&mut self, id: u8);
}

/// ThreadTimers runs each periodic timer on its own thread, posting expirations to a queue.
pub struct ThreadTimers {
    queue: Arc<EventQueue>,
    running: HashMap<u8, Arc<AtomicBool>>,
}

impl ThreadTimers {
    pub fn new(queue: Arc<EventQueue>) -> ThreadTimers {
        ThreadTimers {
            queue,
            running: HashMap::new(),
        }
    }

    pub fn active(&self) -> usize {
        self.running.len()
    }
}

impl TimerHost for ThreadTimers {
    fn start(&mut self, id: u8, interval_ms: u32) {
        self.stop(id);
        let alive = Arc::new(AtomicBool::new(true));
        self.running.insert(id, alive.clone());
        let queue = self.queue.clone();
        let interval = Duration::from_millis(interval_ms.max(1) as u64);
        debug!(id, interval_ms, "starting timer");
        thread::spawn(move || loop {
            thread::sleep(interval);
            if !alive.load(Ordering::Acquire) || !queue.timer_expired(id) {
                break;
            }
        });
    }

    fn stop(&mut self, id: u8) {
        if let Some(alive) = self.running.remove(&id) {
            debug!(id, "stopping timer");
            alive.store(false, Ordering::Release);
        }
    }
}

impl Drop for ThreadTimers {
    fn drop(&mut self) {
        for alive in self.running.values() {
            alive.store(false, Ordering::Release);
        }
    }
}

impl ForthRuntime {
    /// handle_event runs one event to completion. Errors have already been reported.
    pub fn handle_event(&mut self, event: Event) -> Result<(), ForthError> {
        let result = match event {
            Event::Line(line) => return self.interpret_line(&line),
            Event::Port { port, value } => self.handle_port(port, value),
            Event::Timer(id) => self.handle_timer(id),
        };
        if let Err(err) = &result {
            self.report(err);
            if err.is_stack_fault() {
                self.kernel.reset();
            }
            self.flush();
        }
        result
    }
}

/// run_events is the interpreter thread's loop. after_line runs once each terminal line is done.
pub fn run_events<F>(forth: &mut ForthRuntime, queue: &EventQueue, mut after_line: F)
where
    F: FnMut(&mut ForthRuntime),
{
    while let Some(event) = queue.next() {
        let is_line = matches!(event, Event::Line(_));
        if let Err(err) = forth.handle_event(event) {
            debug!(%err, "event failed");
        }
        let exiting = forth.should_exit();
        if exiting {
            queue.close();
        }
        if is_line {
            after_line(forth);
        }
        if exiting {
            break;
        }
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///
