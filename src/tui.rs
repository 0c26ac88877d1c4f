// Terminal line editor for the REPL
//
// Raw mode is on only while a line is being edited, so interpreter output in between
// goes to a normal terminal. TerminalOutput still sends "\r\n" so that event output
// arriving mid-edit does not stair-step.

use std::io::{self, stdout, Write};

use cellforth::Output;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};

const PROMPT: &str = "ok> ";
const HISTORY_LIMIT: usize = 100;

/// Output sink for an interactive terminal.
pub struct TerminalOutput;

impl Output for TerminalOutput {
    fn write(&mut self, text: &str) {
        print!("{}", text.replace('\n', "\r\n"));
    }

    fn flush(&mut self) {
        let _ = stdout().flush();
    }
}

#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
    history: Vec<String>,
    recall: Option<usize>, // index into history while browsing with Up / Down
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn redraw(&self) -> io::Result<()> {
        let line: String = self.buffer.iter().collect();
        print!("\r\x1b[K{}{}", PROMPT, line);
        let back = self.buffer.len() - self.cursor;
        if back > 0 {
            print!("\x1b[{}D", back);
        }
        stdout().flush()
    }

    fn set_line(&mut self, line: &str) {
        self.buffer = line.chars().collect();
        self.cursor = self.buffer.len();
    }

    fn remember(&mut self, line: &str) {
        if line.trim().is_empty() || self.history.last().map(String::as_str) == Some(line) {
            return;
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(line.to_string());
    }

    /// read_line edits one line. None means the user asked to leave (Esc or Ctrl-D).
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        self.cursor = 0;
        self.recall = None;

        enable_raw_mode()?;
        let result = self.edit();
        disable_raw_mode()?;
        result
    }

    fn edit(&mut self) -> io::Result<Option<String>> {
        self.redraw()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
            match key.code {
                KeyCode::Char('a') if ctrl => self.cursor = 0,
                KeyCode::Char('e') if ctrl => self.cursor = self.buffer.len(),
                KeyCode::Char('k') if ctrl => self.buffer.truncate(self.cursor),
                KeyCode::Char('d') if ctrl && self.buffer.is_empty() => {
                    print!("\r\n");
                    return Ok(None);
                }
                KeyCode::Char(c) if !ctrl => {
                    self.buffer.insert(self.cursor, c);
                    self.cursor += 1;
                }
                KeyCode::Backspace if self.cursor > 0 => {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                }
                KeyCode::Delete if self.cursor < self.buffer.len() => {
                    self.buffer.remove(self.cursor);
                }
                KeyCode::Left if self.cursor > 0 => self.cursor -= 1,
                KeyCode::Right if self.cursor < self.buffer.len() => self.cursor += 1,
                KeyCode::Home => self.cursor = 0,
                KeyCode::End => self.cursor = self.buffer.len(),
                KeyCode::Up if !self.history.is_empty() => {
                    let i = match self.recall {
                        Some(i) => i.saturating_sub(1),
                        None => self.history.len() - 1,
                    };
                    self.recall = Some(i);
                    let line = self.history[i].clone();
                    self.set_line(&line);
                }
                KeyCode::Down => match self.recall {
                    Some(i) if i + 1 < self.history.len() => {
                        self.recall = Some(i + 1);
                        let line = self.history[i + 1].clone();
                        self.set_line(&line);
                    }
                    Some(_) => {
                        self.recall = None;
                        self.set_line("");
                    }
                    None => {}
                },
                KeyCode::Enter => {
                    let line: String = self.buffer.iter().collect();
                    self.remember(&line);
                    print!("\r\n");
                    stdout().flush()?;
                    return Ok(Some(line));
                }
                KeyCode::Esc => {
                    print!("\r\n");
                    stdout().flush()?;
                    return Ok(None);
                }
                _ => continue,
            }
            self.redraw()?;
        }
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_skips_blanks_and_repeats() {
        let mut editor = LineEditor::new();
        editor.remember("1 2 +");
        editor.remember("1 2 +");
        editor.remember("   ");
        editor.remember(": sq dup * ;");
        assert_eq!(editor.history, vec!["1 2 +", ": sq dup * ;"]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut editor = LineEditor::new();
        for i in 0..HISTORY_LIMIT + 5 {
            editor.remember(&i.to_string());
        }
        assert_eq!(editor.history.len(), HISTORY_LIMIT);
        assert_eq!(editor.history[0], "5");
    }
}
