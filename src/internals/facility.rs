////////////////////////////
/// Facility and host I/O words
///
/// The high end of RAM is shared with the host:
///
///     IO_OUT      one cell per output port, written by OUT; port listeners are told
///     IO_IN       one cell per input port, written when a port event is handled
///     IO_IN_MAP   (xt, queue mode) per input port, set by LISTEN
///     PERIODIC    (msec, xt) per timer id, set by P-TIMER
///
/// A zero xt means nothing is attached.
///
use tracing::debug;

use crate::error::ForthError;
use crate::events::QueueMode;
use crate::internals::builtin::{BuiltInFn, Xt};
use crate::kernel::*;
use crate::runtime::ForthRuntime;

fn out_port_addr(port: u8) -> Addr {
    IO_OUT_START + port as usize * CELL
}

fn in_port_addr(port: u8) -> Addr {
    IO_IN_START + port as usize * CELL
}

fn listener_addr(port: u8) -> Addr {
    IO_IN_MAP_START + port as usize * 2 * CELL
}

fn timer_addr(id: u8) -> Addr {
    PERIODIC_START + id as usize * 2 * CELL
}

/// Does xt name a dictionary word at or above addr?
fn defined_from(xt: Cell, addr: Addr) -> bool {
    matches!(Xt::decode(xt), Some(Xt::Address(a)) if a >= addr)
}

impl ForthRuntime {
    fn pop_port(&mut self) -> Result<u8, ForthError> {
        let p = self.kernel.pop()?;
        u8::try_from(p).map_err(|_| ForthError::InvalidPort(p))
    }

    fn pop_timer_id(&mut self) -> Result<u8, ForthError> {
        let id = self.kernel.pop()?;
        match u8::try_from(id) {
            Ok(id) if (id as usize) < PERIODIC_QTY => Ok(id),
            _ => Err(ForthError::InvalidTimerId(id)),
        }
    }

    /// OUT ( x p -- ) store x to output port p and notify the host
    pub fn f_out(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let port = self.pop_port()?;
        let value = self.kernel.pop()?;
        self.kernel.set(out_port_addr(port), value)?;
        self.notify_port(port, value);
        Ok(())
    }

    /// IN ( p -- x ) the last value received on input port p
    pub fn f_in(&mut self) -> Result<(), ForthError> {
        let port = self.pop_port()?;
        let value = self.kernel.get(in_port_addr(port))?;
        self.kernel.push(value)
    }

    /// LISTEN ( p q "name" -- ) run name with each value arriving on port p, queued by mode q
    pub fn f_listen(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let q = self.kernel.pop()?;
        let port = self.pop_port()?;
        let mode = QueueMode::from_cell(q).ok_or(ForthError::InvalidQueueMode(q))?;
        let xt = self.parse_found()?;
        let addr = listener_addr(port);
        self.kernel.set(addr, xt)?;
        self.kernel.set(addr + CELL, mode as Cell)?;
        if let Some(queue) = self.queue() {
            queue.set_port_mode(port, mode);
        }
        debug!(port, xt, ?mode, "listening");
        Ok(())
    }

    /// UNLISTEN ( p -- )
    pub fn f_unlisten(&mut self) -> Result<(), ForthError> {
        let port = self.pop_port()?;
        self.clear_listener(port)
    }

    fn clear_listener(&mut self, port: u8) -> Result<(), ForthError> {
        let addr = listener_addr(port);
        self.kernel.set(addr, 0)?;
        self.kernel.set(addr + CELL, QueueMode::Always as Cell)?;
        if let Some(queue) = self.queue() {
            queue.set_port_mode(port, QueueMode::Always);
        }
        Ok(())
    }

    /// P-TIMER ( id msec "name" -- ) start periodic timer id unless msec is 0 or id is in use
    pub fn f_p_timer(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let msec = self.kernel.pop()?;
        let id = self.pop_timer_id()?;
        let xt = self.parse_found()?;
        let addr = timer_addr(id);
        if msec != 0 && self.kernel.get(addr)? == 0 {
            self.kernel.set(addr, msec)?;
            self.kernel.set(addr + CELL, xt)?;
            if let Some(timers) = self.timers() {
                timers.start(id, msec as UCell);
            }
        }
        Ok(())
    }

    /// P-STOP ( id -- )
    pub fn f_p_stop(&mut self) -> Result<(), ForthError> {
        let id = self.pop_timer_id()?;
        self.stop_timer(id)
    }

    fn stop_timer(&mut self, id: u8) -> Result<(), ForthError> {
        let addr = timer_addr(id);
        self.kernel.set(addr, 0)?;
        self.kernel.set(addr + CELL, 0)?;
        if let Some(timers) = self.timers() {
            timers.stop(id);
        }
        Ok(())
    }

    /// PAGE ( -- ) clear the screen
    pub fn f_page(&mut self) -> Result<(), ForthError> {
        self.write("\x1b[2J\x1b[H");
        Ok(())
    }

    /// AT-XY ( x y -- ) move the cursor to column x, row y, both from 0
    pub fn f_at_xy(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let y = self.kernel.pop_len()?;
        let x = self.kernel.pop_len()?;
        self.write(&format!("\x1b[{};{}H", y + 1, x + 1));
        Ok(())
    }

    /// handle_port records a port value and runs its listener, if any, with the value on the stack.
    pub fn handle_port(&mut self, port: u8, value: Cell) -> Result<(), ForthError> {
        self.kernel.set(in_port_addr(port), value)?;
        let xt = self.kernel.get(listener_addr(port))?;
        if xt == 0 {
            return Ok(());
        }
        self.kernel.push(value)?;
        self.execute(xt)
    }

    /// handle_timer runs the word bound to a timer id; a timer whose entry is gone is stopped.
    pub fn handle_timer(&mut self, id: u8) -> Result<(), ForthError> {
        if id as usize >= PERIODIC_QTY {
            return Err(ForthError::InvalidTimerId(id as Cell));
        }
        let xt = self.kernel.get(timer_addr(id) + CELL)?;
        if xt == 0 {
            if let Some(timers) = self.timers() {
                timers.stop(id);
            }
            return Ok(());
        }
        self.execute(xt)
    }

    /// release_handlers_from drops listeners and timers bound to words at or above addr.
    pub(crate) fn release_handlers_from(&mut self, addr: Addr) -> Result<(), ForthError> {
        for port in 0..IO_PORTS {
            let port = port as u8;
            if defined_from(self.kernel.get(listener_addr(port))?, addr) {
                debug!(port, "releasing listener");
                self.clear_listener(port)?;
            }
        }
        for id in 0..PERIODIC_QTY {
            let id = id as u8;
            if defined_from(self.kernel.get(timer_addr(id) + CELL)?, addr) {
                debug!(id, "releasing timer");
                self.stop_timer(id)?;
            }
        }
        Ok(())
    }

    /// resume_handlers pushes the listener modes and timer table in RAM out to the host,
    /// after RAM has been replaced wholesale.
    pub(crate) fn resume_handlers(&mut self) -> Result<(), ForthError> {
        for port in 0..IO_PORTS {
            let port = port as u8;
            let mode = self.kernel.get(listener_addr(port) + CELL)?;
            let mode = QueueMode::from_cell(mode).unwrap_or_default();
            if let Some(queue) = self.queue() {
                queue.set_port_mode(port, mode);
            }
        }
        for id in 0..PERIODIC_QTY {
            let id = id as u8;
            let msec = self.kernel.get(timer_addr(id))?;
            let xt = self.kernel.get(timer_addr(id) + CELL)?;
            if let Some(timers) = self.timers() {
                if msec != 0 && xt != 0 {
                    timers.start(id, msec as UCell);
                } else {
                    timers.stop(id);
                }
            }
        }
        Ok(())
    }
}

pub(crate) static FACILITY_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("PAGE", ForthRuntime::f_page, "( -- )", "Clear the screen and home the cursor"),
    BuiltInFn::new("AT-XY", ForthRuntime::f_at_xy, "( x y -- )", "Move the cursor to column x, row y"),
];

pub(crate) static HOST_IO_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("OUT", ForthRuntime::f_out, "( x p -- )", "Write x to output port p, notifying the host"),
    BuiltInFn::new("IN", ForthRuntime::f_in, "( p -- x )", "Last value received on input port p"),
    BuiltInFn::new(
        "LISTEN",
        ForthRuntime::f_listen,
        "( p q \"name\" -- )",
        "Run name for each event on input port p. q = 0 always queue, 1 only changed values, 2 replace pending",
    ),
    BuiltInFn::new("UNLISTEN", ForthRuntime::f_unlisten, "( p -- )", "Remove the handler for input port p"),
    BuiltInFn::new(
        "P-TIMER",
        ForthRuntime::f_p_timer,
        "( id msec \"name\" -- )",
        "Run name every msec milliseconds. Does nothing if msec is 0 or id is in use",
    ),
    BuiltInFn::new("P-STOP", ForthRuntime::f_p_stop, "( id -- )", "Stop periodic timer id"),
];

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventQueue, TimerHost};
    use crate::output::SharedBuffer;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingTimers(Arc<Mutex<Vec<(u8, Option<u32>)>>>);

    impl TimerHost for RecordingTimers {
        fn start(&mut self, id: u8, interval_ms: u32) {
            self.0.lock().unwrap().push((id, Some(interval_ms)));
        }
        fn stop(&mut self, id: u8) {
            self.0.lock().unwrap().push((id, None));
        }
    }

    fn forth() -> (ForthRuntime, SharedBuffer) {
        let out = SharedBuffer::new();
        let f = ForthRuntime::boot(Box::new(out.clone())).unwrap();
        (f, out)
    }

    #[test]
    fn test_out_notifies_listeners() {
        let (mut f, _) = forth();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        f.add_port_listener(Box::new(move |port, value| sink.lock().unwrap().push((port, value))));
        f.interpret_line("77 3 out").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(3, 77)]);
        assert_eq!(f.kernel.get(IO_OUT_START + 3 * CELL).unwrap(), 77);
        assert!(f.interpret_line("1 256 out").is_err());
    }

    #[test]
    fn test_listen_and_port_event() {
        let (mut f, out) = forth();
        let queue = Arc::new(EventQueue::new());
        f.attach_queue(queue.clone());
        f.interpret_line(": show 10 * . ;").unwrap();
        f.interpret_line("5 1 listen show").unwrap();
        assert_eq!(queue.port_mode(5), QueueMode::Changes);
        out.take();
        f.handle_port(5, 4).unwrap();
        assert_eq!(out.take(), "40 ");
        f.interpret_line("5 in").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 4);
        f.interpret_line("5 unlisten").unwrap();
        assert_eq!(queue.port_mode(5), QueueMode::Always);
        out.take();
        f.handle_port(5, 6).unwrap();
        assert_eq!(out.take(), "");
        assert!(f.interpret_line("5 7 listen show").is_err());
    }

    #[test]
    fn test_p_timer_and_p_stop() {
        let (mut f, out) = forth();
        let timers = RecordingTimers::default();
        f.set_timer_host(Box::new(timers.clone()));
        f.interpret_line(": tick 42 emit ;").unwrap();
        f.interpret_line("2 100 p-timer tick").unwrap();
        f.interpret_line("2 50 p-timer tick").unwrap(); // in use, ignored
        f.interpret_line("3 0 p-timer tick").unwrap(); // zero interval, ignored
        assert_eq!(*timers.0.lock().unwrap(), vec![(2, Some(100))]);
        out.take();
        f.handle_timer(2).unwrap();
        assert_eq!(out.take(), "*");
        f.interpret_line("2 p-stop").unwrap();
        f.handle_timer(2).unwrap();
        assert_eq!(out.take(), " ok\n");
        assert_eq!(timers.0.lock().unwrap().last(), Some(&(2, None)));
        assert!(f.interpret_line("200 10 p-timer tick").is_err());
    }

    #[test]
    fn test_marker_releases_handlers() {
        let (mut f, _) = forth();
        let timers = RecordingTimers::default();
        f.set_timer_host(Box::new(timers.clone()));
        f.interpret_line(": keep ;").unwrap();
        f.interpret_line("1 0 listen keep").unwrap();
        f.interpret_line("marker gone : handler ;").unwrap();
        f.interpret_line("2 0 listen handler 4 10 p-timer handler").unwrap();
        f.interpret_line("gone").unwrap();
        assert_ne!(f.kernel.get(listener_addr(1)).unwrap(), 0);
        assert_eq!(f.kernel.get(listener_addr(2)).unwrap(), 0);
        assert_eq!(f.kernel.get(timer_addr(4) + CELL).unwrap(), 0);
        assert_eq!(timers.0.lock().unwrap().last(), Some(&(4, None)));
    }

    #[test]
    fn test_page_and_at_xy() {
        let (mut f, out) = forth();
        f.interpret_line("page 4 2 at-xy").unwrap();
        assert_eq!(out.take(), "\x1b[2J\x1b[H\x1b[3;5H ok\n");
    }
}
