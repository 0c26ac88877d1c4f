/// Inner Interpreter
///
/// A colon definition's body is a run of cells, each an execution token:
///
///     interpreted token   call the built-in's interpreted behavior
///     compiled token      call the built-in's run-time behavior; it may read inline
///                         operands at ip and move ip
///     dictionary address  set w to the code field and run the token stored there
///
/// Nothing recurses on the host stack: entering a colon definition pushes the caller's ip onto
/// `frames` and the loop in `run` keeps stepping until the frame depth drops back to where the
/// outermost execute started.
///
use tracing::trace;

use crate::error::ForthError;
use crate::internals::builtin::Xt;
use crate::kernel::*;
use crate::runtime::{ForthRuntime, MAX_CALL_DEPTH};

impl ForthRuntime {
    /// execute runs one execution token to completion.
    ///
    /// An invalid token is reported as an error for this execute only; the caller's state
    /// (frames, ip) is put back as it was.
    pub fn execute(&mut self, xt: Cell) -> Result<(), ForthError> {
        let base = self.frames.len();
        let saved_ip = self.ip;
        let saved_floor = self.frame_floor;
        self.frame_floor = base;
        let result = self.dispatch(xt).and_then(|_| self.run(base));
        self.frame_floor = saved_floor;
        if result.is_err() {
            self.frames.truncate(base);
        }
        self.ip = saved_ip;
        result
    }

    /// dispatch performs a single token without stepping through any body it enters.
    pub(crate) fn dispatch(&mut self, xt: Cell) -> Result<(), ForthError> {
        let code = match Xt::decode(xt) {
            Some(Xt::Interpreted(i)) => self.registry.get(i).map(|w| w.word.code),
            Some(Xt::Compiled(i)) => self.registry.get(i).map(|w| w.word.compiled_code()),
            Some(Xt::Address(addr)) => {
                let token = self.kernel.get(addr)?;
                let code = match Xt::decode(token) {
                    Some(Xt::Interpreted(i)) | Some(Xt::Compiled(i)) => {
                        self.registry.get(i).map(|w| w.word.compiled_code())
                    }
                    _ => None,
                };
                self.w = addr;
                code
            }
            None => None,
        };
        match code {
            Some(code) => code(self),
            None => Err(ForthError::InvalidXt(xt)),
        }
    }

    fn run(&mut self, base: usize) -> Result<(), ForthError> {
        while self.frames.len() > base {
            let token = self.kernel.get(self.ip)?;
            trace!(ip = self.ip, token, "step");
            self.ip += CELL;
            self.dispatch(token)?;
        }
        Ok(())
    }

    /// Inline operand at ip, consumed.
    pub(crate) fn next_cell(&mut self) -> Result<Cell, ForthError> {
        let val = self.kernel.get(self.ip)?;
        self.ip += CELL;
        Ok(val)
    }

    // Run-time behaviors for code fields and compiled tokens

    /// i_enter is the code field behavior of a colon definition
    pub fn i_enter(&mut self) -> Result<(), ForthError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(ForthError::CallDepthExceeded);
        }
        self.frames.push(self.ip);
        self.ip = self.w + CELL;
        Ok(())
    }

    /// i_exit returns from the current colon definition
    pub fn i_exit(&mut self) -> Result<(), ForthError> {
        if self.frames.len() > self.frame_floor {
            if let Some(ip) = self.frames.pop() {
                self.ip = ip;
            }
        }
        Ok(())
    }

    pub fn i_literal(&mut self) -> Result<(), ForthError> {
        let val = self.next_cell()?;
        self.kernel.push(val)
    }

    /// i_2literal reads the high cell then the low cell
    pub fn i_2literal(&mut self) -> Result<(), ForthError> {
        let hi = self.next_cell()?;
        let lo = self.next_cell()?;
        self.kernel.push(lo)?;
        self.kernel.push(hi)
    }

    /// CREATE and VARIABLE words push their parameter field address
    pub fn i_create(&mut self) -> Result<(), ForthError> {
        self.kernel.push((self.w + CELL) as Cell)
    }

    /// CONSTANT and VALUE words push the cell in their parameter field
    pub fn i_constant(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.get(self.w + CELL)?;
        self.kernel.push(val)
    }

    pub fn i_2constant(&mut self) -> Result<(), ForthError> {
        let val = self.kernel.memory.get_dcell(self.w + CELL)?;
        self.kernel.push_double(val)
    }

    /// Inline counted string: push its address and length, skip past it.
    pub fn i_s_quote(&mut self) -> Result<(), ForthError> {
        let len = self.kernel.memory.get_byte(self.ip)? as usize;
        self.kernel.push((self.ip + 1) as Cell)?;
        self.kernel.push(len as Cell)?;
        self.ip = align(self.ip + 1 + len);
        Ok(())
    }

    /// Inline counted string: print it, skip past it.
    pub fn i_dot_quote(&mut self) -> Result<(), ForthError> {
        let len = self.kernel.memory.get_byte(self.ip)? as usize;
        let text = self.kernel.memory.text(self.ip + 1, len)?;
        self.write(&text);
        self.ip = align(self.ip + 1 + len);
        Ok(())
    }

    /// EXECUTE ( i*x xt -- j*x )
    ///
    /// A token that names nothing is reported and skipped; the caller carries on.
    pub fn f_execute(&mut self) -> Result<(), ForthError> {
        let xt = self.kernel.pop()?;
        match self.dispatch(xt) {
            Err(err @ ForthError::InvalidXt(_)) => {
                self.report(&err);
                Ok(())
            }
            result => result,
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

    fn forth() -> ForthRuntime {
        ForthRuntime::boot(Box::new(SharedBuffer::new())).unwrap()
    }

    #[test]
    fn test_execute_builtin() {
        let mut f = forth();
        f.kernel.push(2).unwrap();
        f.kernel.push(3).unwrap();
        let plus = f.registry.xt("+").unwrap();
        f.execute(plus).unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 5);
    }

    #[test]
    fn test_execute_invalid_token() {
        let mut f = forth();
        assert!(matches!(f.execute(0x7fff_ffff), Err(ForthError::InvalidXt(_))));
        assert!(matches!(f.execute(0), Err(ForthError::InvalidXt(0))));
        // a dictionary address whose code field holds garbage
        let here = f.here().unwrap();
        f.comma(12345).unwrap();
        assert!(matches!(f.execute(here as Cell), Err(ForthError::InvalidXt(_))));
        assert!(f.frames.is_empty());
    }

    #[test]
    fn test_hand_built_colon_definition() {
        let mut f = forth();
        f.create_entry(b"twice", false).unwrap();
        let xt = f.here().unwrap() as Cell;
        let enter = f.registry.xt_compiled(":").unwrap();
        let dup = f.registry.xt("DUP").unwrap();
        let plus = f.registry.xt("+").unwrap();
        let exit = f.registry.xt_compiled(";").unwrap();
        for cell in [enter, dup, plus, exit] {
            f.comma(cell).unwrap();
        }
        f.kernel.push(21).unwrap();
        f.execute(xt).unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 42);
        assert!(f.frames.is_empty());
    }

    #[test]
    fn test_execute_word_inside_body() {
        let mut f = forth();
        f.interpret_line(": apply execute ;").unwrap();
        f.interpret_line("4 ' negate apply").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), -4);
    }

    #[test]
    fn test_execute_word_skips_invalid_token() {
        let out = SharedBuffer::new();
        let mut f = ForthRuntime::boot(Box::new(out.clone())).unwrap();
        f.interpret_line("1 0 execute 2").unwrap();
        assert_eq!(out.take(), " Invalid execution token 0x0\n ok\n");
        assert_eq!(f.kernel.pop().unwrap(), 2);
        assert_eq!(f.kernel.pop().unwrap(), 1);
        f.interpret_line(": t 0 execute 5 ; t").unwrap();
        assert_eq!(f.kernel.pop().unwrap(), 5);
        assert_eq!(f.kernel.stack_len(), 0);
        assert!(f.frames.is_empty());
    }

    #[test]
    fn test_runaway_recursion_is_bounded() {
        let mut f = forth();
        f.interpret_line(": forever recurse ;").unwrap();
        let xt = f.find(b"forever").unwrap().unwrap().xt;
        assert!(matches!(f.execute(xt), Err(ForthError::CallDepthExceeded)));
        assert!(f.frames.is_empty());
    }
}
