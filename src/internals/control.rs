/// Control structures
///
/// Compile-time halves push and resolve control-flow stack entries; run-time halves are the
/// compiled tokens, whose branch operand is an absolute address in the cell after the token.
///
///     IF    cond branch, push Orig          THEN   resolve Orig to HERE
///     AHEAD branch, push Orig               ELSE   AHEAD, 1 CS-ROLL, THEN
///     BEGIN push Dest                       UNTIL  cond branch to Dest
///     AGAIN branch to Dest                  WHILE  IF (Orig over Dest)
///     REPEAT 1 CS-ROLL, AGAIN, THEN
///     DO / ?DO open a leave bracket and push Dest; LOOP / +LOOP branch back and
///     resolve every LEAVE in the bracket to just past themselves.
///
use crate::error::ForthError;
use crate::internals::builtin::{BuiltInFn, Inline};
use crate::kernel::*;
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// forward_branch compiles a run-time token and a placeholder, returning the placeholder.
    fn forward_branch(&mut self, runtime: &str) -> Result<Addr, ForthError> {
        self.compile_runtime(runtime)?;
        let orig = self.here()?;
        self.comma(0)?;
        Ok(orig)
    }

    fn backward_branch(&mut self, runtime: &str) -> Result<(), ForthError> {
        let dest = self.control.pop_dest()?;
        self.compile_runtime(runtime)?;
        self.comma(dest as Cell)
    }

    fn resolve_leaves(&mut self) -> Result<(), ForthError> {
        let here = self.here()? as Cell;
        for addr in self.leaves.close_loop()? {
            self.kernel.set(addr, here)?;
        }
        Ok(())
    }

    pub fn f_if(&mut self) -> Result<(), ForthError> {
        let orig = self.forward_branch("IF")?;
        self.control.push_orig(orig);
        Ok(())
    }

    pub fn f_ahead(&mut self) -> Result<(), ForthError> {
        let orig = self.forward_branch("AHEAD")?;
        self.control.push_orig(orig);
        Ok(())
    }

    pub fn f_then(&mut self) -> Result<(), ForthError> {
        let orig = self.control.pop_orig()?;
        let here = self.here()?;
        self.kernel.set(orig, here as Cell)
    }

    pub fn f_else(&mut self) -> Result<(), ForthError> {
        self.f_ahead()?;
        self.control.roll(1)?;
        self.f_then()
    }

    pub fn f_begin(&mut self) -> Result<(), ForthError> {
        let here = self.here()?;
        self.control.push_dest(here);
        Ok(())
    }

    pub fn f_until(&mut self) -> Result<(), ForthError> {
        self.backward_branch("UNTIL")
    }

    pub fn f_again(&mut self) -> Result<(), ForthError> {
        self.backward_branch("AGAIN")
    }

    pub fn f_while(&mut self) -> Result<(), ForthError> {
        self.f_if()
    }

    pub fn f_repeat(&mut self) -> Result<(), ForthError> {
        self.control.roll(1)?;
        self.f_again()?;
        self.f_then()
    }

    pub fn f_do(&mut self) -> Result<(), ForthError> {
        self.compile_runtime("DO")?;
        self.leaves.open_loop();
        self.f_begin()
    }

    /// ?DO's skip branch is resolved with the LEAVEs of its loop
    pub fn f_question_do(&mut self) -> Result<(), ForthError> {
        let skip = self.forward_branch("?DO")?;
        self.leaves.open_loop();
        self.leaves.push(skip)?;
        self.f_begin()
    }

    pub fn f_loop(&mut self) -> Result<(), ForthError> {
        self.backward_branch("LOOP")?;
        self.resolve_leaves()
    }

    pub fn f_plus_loop(&mut self) -> Result<(), ForthError> {
        self.backward_branch("+LOOP")?;
        self.resolve_leaves()
    }

    pub fn f_leave(&mut self) -> Result<(), ForthError> {
        let orig = self.forward_branch("LEAVE")?;
        self.leaves.push(orig)
    }

    /// CS-PICK ( u -- )
    pub fn f_cs_pick(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop_len()?;
        self.control.pick(n)
    }

    /// CS-ROLL ( u -- )
    pub fn f_cs_roll(&mut self) -> Result<(), ForthError> {
        let n = self.kernel.pop_len()?;
        self.control.roll(n)
    }

    // Run-time behaviors

    pub fn i_branch(&mut self) -> Result<(), ForthError> {
        self.ip = to_addr(self.kernel.get(self.ip)?)?;
        Ok(())
    }

    pub fn i_branch0(&mut self) -> Result<(), ForthError> {
        if self.kernel.pop()? == 0 {
            self.i_branch()
        } else {
            self.ip += CELL;
            Ok(())
        }
    }

    /// (DO) ( limit index -- ) R: ( -- limit index )
    pub fn i_do(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let index = self.kernel.pop()?;
        let limit = self.kernel.pop()?;
        self.kernel.push_r(limit)?;
        self.kernel.push_r(index)
    }

    pub fn i_question_do(&mut self) -> Result<(), ForthError> {
        self.kernel.stack_check(2)?;
        let index = self.kernel.pop()?;
        let limit = self.kernel.pop()?;
        if index == limit {
            return self.i_branch();
        }
        self.kernel.push_r(limit)?;
        self.kernel.push_r(index)?;
        self.ip += CELL;
        Ok(())
    }

    fn loop_exit(&mut self) -> Result<(), ForthError> {
        self.kernel.pop_r()?;
        self.kernel.pop_r()?;
        self.ip += CELL;
        Ok(())
    }

    /// (LOOP) increments the index and finishes when it reaches the limit
    pub fn i_loop(&mut self) -> Result<(), ForthError> {
        let index = self.kernel.peek_r(0)?.wrapping_add(1);
        let limit = self.kernel.peek_r(1)?;
        if index == limit {
            self.loop_exit()
        } else {
            self.kernel.poke_r(0, index)?;
            self.i_branch()
        }
    }

    /// (+LOOP) ( n -- ) finishes when the index crosses the limit-1/limit boundary
    pub fn i_plus_loop(&mut self) -> Result<(), ForthError> {
        let step = self.kernel.pop()?;
        let index = self.kernel.peek_r(0)?;
        let limit = self.kernel.peek_r(1)?;
        let before = index.wrapping_sub(limit);
        let after = before.wrapping_add(step);
        if (before ^ after) < 0 && (before ^ step) < 0 {
            self.loop_exit()
        } else {
            self.kernel.poke_r(0, index.wrapping_add(step))?;
            self.i_branch()
        }
    }

    pub fn i_leave(&mut self) -> Result<(), ForthError> {
        self.kernel.pop_r()?;
        self.kernel.pop_r()?;
        self.i_branch()
    }

    pub fn f_unloop(&mut self) -> Result<(), ForthError> {
        self.kernel.pop_r()?;
        self.kernel.pop_r()?;
        Ok(())
    }

    pub fn f_i(&mut self) -> Result<(), ForthError> {
        let index = self.kernel.peek_r(0)?;
        self.kernel.push(index)
    }

    pub fn f_j(&mut self) -> Result<(), ForthError> {
        let index = self.kernel.peek_r(2)?;
        self.kernel.push(index)
    }
}

pub(crate) static CONTROL_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("IF", ForthRuntime::f_if, "( x -- )", "Continue if x is nonzero, else skip to ELSE or THEN")
        .runtime(ForthRuntime::i_branch0)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("ELSE", ForthRuntime::f_else, "( -- )", "Start the false branch of an IF")
        .immediate()
        .compile_only(),
    BuiltInFn::new("THEN", ForthRuntime::f_then, "( -- )", "End an IF structure")
        .immediate()
        .compile_only(),
    BuiltInFn::new("BEGIN", ForthRuntime::f_begin, "( -- )", "Start a loop")
        .immediate()
        .compile_only(),
    BuiltInFn::new("UNTIL", ForthRuntime::f_until, "( x -- )", "Loop back to BEGIN while x is zero")
        .runtime(ForthRuntime::i_branch0)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("WHILE", ForthRuntime::f_while, "( x -- )", "Leave a BEGIN loop when x is zero")
        .immediate()
        .compile_only(),
    BuiltInFn::new("REPEAT", ForthRuntime::f_repeat, "( -- )", "Loop back to BEGIN and resolve WHILE")
        .immediate()
        .compile_only(),
    BuiltInFn::new("DO", ForthRuntime::f_do, "( limit index -- )", "Start a counted loop")
        .runtime(ForthRuntime::i_do)
        .immediate()
        .compile_only(),
    BuiltInFn::new("LOOP", ForthRuntime::f_loop, "( -- )", "Add one to the index and loop until it reaches the limit")
        .runtime(ForthRuntime::i_loop)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("+LOOP", ForthRuntime::f_plus_loop, "( n -- )", "Add n to the index and loop until it crosses the limit")
        .runtime(ForthRuntime::i_plus_loop)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("LEAVE", ForthRuntime::f_leave, "( -- )", "Exit the innermost loop")
        .runtime(ForthRuntime::i_leave)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("UNLOOP", ForthRuntime::f_unloop, "( -- )", "Discard the loop parameters before EXIT").compile_only(),
    BuiltInFn::new("I", ForthRuntime::f_i, "( -- n )", "Index of the innermost loop").compile_only(),
    BuiltInFn::new("J", ForthRuntime::f_j, "( -- n )", "Index of the next outer loop").compile_only(),
];

pub(crate) static CONTROL_EXT_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("?DO", ForthRuntime::f_question_do, "( limit index -- )", "Start a counted loop, skipped if limit equals index")
        .runtime(ForthRuntime::i_question_do)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("AGAIN", ForthRuntime::f_again, "( -- )", "Loop back to BEGIN unconditionally")
        .runtime(ForthRuntime::i_branch)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
];

pub(crate) static CONTROL_TOOLS_WORDS: &[BuiltInFn] = &[
    BuiltInFn::new("AHEAD", ForthRuntime::f_ahead, "( -- )", "Branch forward to a later THEN")
        .runtime(ForthRuntime::i_branch)
        .immediate()
        .compile_only()
        .inline(Inline::Branch),
    BuiltInFn::new("CS-PICK", ForthRuntime::f_cs_pick, "( u -- )", "Copy the u-th control-flow entry to the top"),
    BuiltInFn::new("CS-ROLL", ForthRuntime::f_cs_roll, "( u -- )", "Move the u-th control-flow entry to the top"),
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

    fn stack(f: &ForthRuntime) -> Vec<Cell> {
        f.kernel.data_stack().iter_from_bottom().copied().collect()
    }

    #[test]
    fn test_if_else_then() {
        let (mut f, _) = forth();
        f.interpret_line(": pick-one if 1 else 2 then ;").unwrap();
        f.interpret_line("-1 pick-one 0 pick-one").unwrap();
        assert_eq!(stack(&f), vec![1, 2]);
    }

    #[test]
    fn test_countdown() {
        let (mut f, out) = forth();
        f.interpret_line(": countdown begin dup . 1- dup 0< until drop ;").unwrap();
        out.take();
        f.interpret_line("0 countdown").unwrap();
        assert_eq!(out.take(), "0  ok\n");
        f.interpret_line("3 countdown").unwrap();
        assert_eq!(out.take(), "3 2 1 0  ok\n");
    }

    #[test]
    fn test_begin_while_repeat() {
        let (mut f, _) = forth();
        f.interpret_line(": sum-down 0 swap begin dup while tuck + swap 1- repeat drop ;").unwrap();
        f.interpret_line("4 sum-down").unwrap();
        assert_eq!(stack(&f), vec![10]);
    }

    #[test]
    fn test_do_loop_and_index() {
        let (mut f, _) = forth();
        f.interpret_line(": squares 4 0 do i i * loop ;").unwrap();
        f.interpret_line("squares").unwrap();
        assert_eq!(stack(&f), vec![0, 1, 4, 9]);
    }

    #[test]
    fn test_question_do_skips_empty_range() {
        let (mut f, _) = forth();
        f.interpret_line(": count-up 0 ?do i loop ;").unwrap();
        f.interpret_line("0 count-up").unwrap();
        assert!(stack(&f).is_empty());
        f.interpret_line("3 count-up").unwrap();
        assert_eq!(stack(&f), vec![0, 1, 2]);
        assert_eq!(f.kernel.return_len(), 0);
    }

    #[test]
    fn test_plus_loop_both_directions() {
        let (mut f, _) = forth();
        f.interpret_line(": evens 10 0 do i 2 +loop ;").unwrap();
        f.interpret_line("evens").unwrap();
        assert_eq!(stack(&f), vec![0, 2, 4, 6, 8]);
        f.kernel.reset();
        f.interpret_line(": down 0 3 do i -1 +loop ;").unwrap();
        f.interpret_line("down").unwrap();
        assert_eq!(stack(&f), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_nested_loops_with_leave() {
        let (mut f, _) = forth();
        f.interpret_line(": grid 3 0 do 10 0 do i 2 = if leave then i j 10 * + loop loop ;").unwrap();
        f.interpret_line("grid").unwrap();
        assert_eq!(stack(&f), vec![0, 1, 10, 11, 20, 21]);
        assert_eq!(f.kernel.return_len(), 0);
    }

    #[test]
    fn test_leave_from_outer_loop_after_inner() {
        let (mut f, _) = forth();
        f.interpret_line(": outer 5 0 do 2 0 do loop i 1 = if leave then i loop ;").unwrap();
        f.interpret_line("outer").unwrap();
        assert_eq!(stack(&f), vec![0]);
    }

    #[test]
    fn test_unbalanced_semicolon() {
        let (mut f, out) = forth();
        let here = f.here().unwrap();
        assert!(f.interpret_line(": bad 1 if 2 ;").is_err());
        assert!(out.take().contains("Unbalanced control structure"));
        assert!(!f.is_compiling());
        assert_eq!(f.here().unwrap(), here);
        assert!(f.find(b"bad").unwrap().is_none());
    }

    #[test]
    fn test_mismatched_then() {
        let (mut f, out) = forth();
        assert!(f.interpret_line(": bad begin then ;").is_err());
        assert!(out.take().contains("Unbalanced control structure"));
    }

    #[test]
    fn test_cs_roll_builds_else() {
        let (mut f, _) = forth();
        f.interpret_line(": my-else postpone ahead 1 cs-roll postpone then ; immediate").unwrap();
        f.interpret_line(": t if 1 my-else 2 then ;").unwrap();
        f.interpret_line("0 t 5 t").unwrap();
        assert_eq!(stack(&f), vec![2, 1]);
    }

    #[test]
    fn test_unloop_exit() {
        let (mut f, _) = forth();
        f.interpret_line(": find3 10 0 do i 3 = if i unloop exit then loop -1 ;").unwrap();
        f.interpret_line("find3").unwrap();
        assert_eq!(stack(&f), vec![3]);
        assert_eq!(f.kernel.return_len(), 0);
    }
}
