// cellforth main program
//
// Boots the interpreter, restores a snapshot and loads any specified file, then runs the REPL.
// The interpreter runs on its own thread and takes terminal lines, port events and timer
// events from one queue. The main thread only reads lines, and waits for each one to finish
// before prompting again. Errors during boot stop the program; a panic while running resets
// the interpreter to the prompt, clearing the data and return stacks.

mod config;
mod tui;

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;

use cellforth::{run_events, EventQueue, ForthError, ForthRuntime, Output, Stdout, ThreadTimers};
use config::{Config, VERSION};
use tracing::{error, info, warn};
use tui::{LineEditor, TerminalOutput};

const WELCOME_MESSAGE: &str = "Welcome to cellforth.";
const EXIT_MESSAGE: &str = "Finished";

fn init_tracing(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(config.log_level)
        .try_init();
}

fn boot_forth(config: &Config, queue: &Arc<EventQueue>, output: Box<dyn Output>) -> Result<ForthRuntime, ForthError> {
    let mut forth = ForthRuntime::boot(output)?;
    forth.snapshot_path = config.snapshot.clone();
    forth.attach_queue(queue.clone());
    forth.set_timer_host(Box::new(ThreadTimers::new(queue.clone())));

    if config.restore {
        let path = config.snapshot.clone().ok_or(ForthError::NoSnapshotFile)?;
        forth.load_snapshot(&path)?;
    }
    if let Some(path) = &config.file {
        info!(path = %path.display(), "loading file");
        match forth.include_file(path) {
            Err(err @ ForthError::Io(_)) => return Err(err),
            Err(err) => warn!(%err, "file stopped early"), // already reported on the console
            Ok(()) => {}
        }
    }
    Ok(forth)
}

/// run_forth is the interpreter thread. Every finished line is acknowledged on `done`.
fn run_forth(mut forth: ForthRuntime, queue: Arc<EventQueue>, done: mpsc::Sender<()>) {
    loop {
        let result = catch_unwind(AssertUnwindSafe(|| {
            run_events(&mut forth, &queue, |_| {
                let _ = done.send(());
            });
        }));
        match result {
            Ok(()) => break,
            Err(_) => {
                error!("panic while running; resetting interpreter");
                eprintln!("Error during execution. Resetting interpreter to prompt.");
                forth.abort();
                let _ = done.send(());
            }
        }
    }
    queue.close();
}

/// Feed lines to the interpreter until input ends or the interpreter stops.
fn read_lines(config: &Config, queue: &EventQueue, done: &mpsc::Receiver<()>) {
    let mut editor = LineEditor::new();
    let mut stdin = io::stdin().lines();
    while !queue.is_closed() {
        let line = if config.plain {
            stdin.next().and_then(Result::ok)
        } else {
            match editor.read_line() {
                Ok(line) => line,
                Err(err) => {
                    error!(%err, "terminal error");
                    None
                }
            }
        };
        let Some(line) = line else { break };
        queue.push_line(line);
        if done.recv().is_err() {
            break; // interpreter has exited
        }
    }
}

fn main() {
    let config = Config::from_env();
    init_tracing(&config);

    let output: Box<dyn Output> = if config.plain {
        Box::new(Stdout)
    } else {
        Box::new(TerminalOutput)
    };
    let queue = Arc::new(EventQueue::new());
    let forth = match boot_forth(&config, &queue, output) {
        Ok(forth) => forth,
        Err(err) => {
            eprintln!("Fatal error during initialization: {err}");
            std::process::exit(1);
        }
    };

    if !config.quiet {
        println!("{WELCOME_MESSAGE} Version {VERSION}");
    }

    let (done_tx, done_rx) = mpsc::channel();
    let interpreter = {
        let queue = queue.clone();
        thread::spawn(move || run_forth(forth, queue, done_tx))
    };

    read_lines(&config, &queue, &done_rx);
    queue.close();
    let _ = interpreter.join();

    if !config.quiet {
        println!("{EXIT_MESSAGE}");
    }
}
