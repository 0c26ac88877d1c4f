//////////////////////////////////////////////////////////////
/// stack.rs
///
/// The three kinds of stack the interpreter keeps.
///
///     Stack            - fixed-capacity cell stack used for data and return stacks.
///                        The index counts downward from the capacity, so an empty
///                        stack has ptr == capacity and the top lives at cells[ptr].
///     ControlFlowStack - typed origin/destination entries used while compiling.
///     LeaveStack       - forward references from LEAVE and ?DO, bracketed per loop.
///
use crate::error::ForthError;
use crate::kernel::{Addr, Cell, DCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Underflow,
    Overflow,
}

#[derive(Debug, Clone)]
pub struct Stack {
    cells: Vec<Cell>,
    ptr: usize,
}

impl Stack {
    pub fn new(capacity: usize) -> Stack {
        Stack {
            cells: vec![0; capacity],
            ptr: capacity,
        }
    }

    #[inline(always)]
    pub fn push(&mut self, val: Cell) -> Result<(), StackError> {
        if self.ptr == 0 {
            return Err(StackError::Overflow);
        }
        self.ptr -= 1;
        self.cells[self.ptr] = val;
        Ok(())
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<Cell, StackError> {
        if self.ptr >= self.cells.len() {
            return Err(StackError::Underflow);
        }
        let val = self.cells[self.ptr];
        self.ptr += 1;
        Ok(val)
    }

    /// peek(0) is the top of stack.
    #[inline(always)]
    pub fn peek(&self, n: usize) -> Result<Cell, StackError> {
        if n >= self.depth() {
            return Err(StackError::Underflow);
        }
        Ok(self.cells[self.ptr + n])
    }

    /// Overwrite the n-th item from the top in place.
    pub fn poke(&mut self, n: usize, val: Cell) -> Result<(), StackError> {
        if n >= self.depth() {
            return Err(StackError::Underflow);
        }
        self.cells[self.ptr + n] = val;
        Ok(())
    }

    /// Double cells go on low first, so the high cell is on top.
    pub fn push_double(&mut self, val: DCell) -> Result<(), StackError> {
        if self.ptr < 2 {
            return Err(StackError::Overflow);
        }
        self.push(val as Cell)?;
        self.push((val >> 32) as Cell)
    }

    pub fn pop_double(&mut self) -> Result<DCell, StackError> {
        if self.depth() < 2 {
            return Err(StackError::Underflow);
        }
        let hi = self.pop()? as DCell;
        let lo = self.pop()? as u32 as DCell;
        Ok((hi << 32) | lo)
    }

    /// pick copies the n-th item to the top; 0 PICK is DUP.
    pub fn pick(&mut self, n: usize) -> Result<(), StackError> {
        let val = self.peek(n)?;
        self.push(val)
    }

    /// roll moves the n-th item to the top; 1 ROLL is SWAP, 2 ROLL is ROT.
    pub fn roll(&mut self, n: usize) -> Result<(), StackError> {
        if n >= self.depth() {
            return Err(StackError::Underflow);
        }
        self.cells[self.ptr..=self.ptr + n].rotate_right(1);
        Ok(())
    }

    /// Check that n items are available without consuming them.
    #[inline(always)]
    pub fn require(&self, n: usize) -> Result<(), StackError> {
        if self.depth() < n {
            Err(StackError::Underflow)
        } else {
            Ok(())
        }
    }

    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.cells.len() - self.ptr
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.ptr = self.cells.len();
    }

    /// Items from the bottom of the stack up to the top.
    pub fn iter_from_bottom(&self) -> impl Iterator<Item = &Cell> {
        self.cells[self.ptr..].iter().rev()
    }
}

/// Entries left on the control-flow stack by IF, AHEAD, WHILE (Orig) and BEGIN, DO (Dest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Orig(Addr), // unresolved forward branch cell
    Dest(Addr), // backward branch target
}

#[derive(Debug, Default)]
pub struct ControlFlowStack {
    entries: Vec<ControlFlow>,
}

impl ControlFlowStack {
    pub fn new() -> ControlFlowStack {
        ControlFlowStack { entries: Vec::new() }
    }

    pub fn push_orig(&mut self, addr: Addr) {
        self.entries.push(ControlFlow::Orig(addr));
    }

    pub fn push_dest(&mut self, addr: Addr) {
        self.entries.push(ControlFlow::Dest(addr));
    }

    pub fn pop_orig(&mut self) -> Result<Addr, ForthError> {
        match self.entries.last() {
            Some(ControlFlow::Orig(addr)) => {
                let addr = *addr;
                self.entries.pop();
                Ok(addr)
            }
            _ => Err(ForthError::UnbalancedControl),
        }
    }

    pub fn pop_dest(&mut self) -> Result<Addr, ForthError> {
        match self.entries.last() {
            Some(ControlFlow::Dest(addr)) => {
                let addr = *addr;
                self.entries.pop();
                Ok(addr)
            }
            _ => Err(ForthError::UnbalancedControl),
        }
    }

    /// Copy the n-th entry to the top (CS-PICK).
    pub fn pick(&mut self, n: usize) -> Result<(), ForthError> {
        let len = self.entries.len();
        if n >= len {
            return Err(ForthError::UnbalancedControl);
        }
        let entry = self.entries[len - 1 - n];
        self.entries.push(entry);
        Ok(())
    }

    /// Move the n-th entry to the top (CS-ROLL).
    pub fn roll(&mut self, n: usize) -> Result<(), ForthError> {
        let len = self.entries.len();
        if n >= len {
            return Err(ForthError::UnbalancedControl);
        }
        let entry = self.entries.remove(len - 1 - n);
        self.entries.push(entry);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaveEntry {
    Loop,
    Leave(Addr),
}

/// Unresolved forward branches out of DO loops.
///
/// Each DO or ?DO opens a bracket; LEAVE records the address of its branch cell inside the
/// innermost bracket; LOOP and +LOOP close the bracket and hand back only their own entries.
#[derive(Debug, Default)]
pub struct LeaveStack {
    entries: Vec<LeaveEntry>,
}

impl LeaveStack {
    pub fn new() -> LeaveStack {
        LeaveStack { entries: Vec::new() }
    }

    pub fn open_loop(&mut self) {
        self.entries.push(LeaveEntry::Loop);
    }

    pub fn push(&mut self, addr: Addr) -> Result<(), ForthError> {
        if !self.entries.contains(&LeaveEntry::Loop) {
            return Err(ForthError::UnbalancedControl);
        }
        self.entries.push(LeaveEntry::Leave(addr));
        Ok(())
    }

    pub fn close_loop(&mut self) -> Result<Vec<Addr>, ForthError> {
        let mut pending = Vec::new();
        loop {
            match self.entries.pop() {
                Some(LeaveEntry::Leave(addr)) => pending.push(addr),
                Some(LeaveEntry::Loop) => return Ok(pending),
                None => return Err(ForthError::UnbalancedControl),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_pop_underflow() {
        let mut stack = Stack::new(4);
        assert_eq!(stack.pop(), Err(StackError::Underflow));
        stack.push(7).unwrap();
        stack.push(8).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), Ok(8));
        assert_eq!(stack.pop(), Ok(7));
        assert_eq!(stack.pop(), Err(StackError::Underflow));
    }

    #[test]
    fn test_overflow() {
        let mut stack = Stack::new(2);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.push(3), Err(StackError::Overflow));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.push_double(5), Err(StackError::Overflow));
    }

    #[test]
    fn test_double_has_high_cell_on_top() {
        let mut stack = Stack::new(8);
        stack.push_double(-2).unwrap();
        assert_eq!(stack.peek(0), Ok(-1));
        assert_eq!(stack.peek(1), Ok(-2));
        stack.push_double(0x1_0000_0002).unwrap();
        assert_eq!(stack.peek(0), Ok(1));
        assert_eq!(stack.peek(1), Ok(2));
        assert_eq!(stack.pop_double(), Ok(0x1_0000_0002));
        assert_eq!(stack.pop_double(), Ok(-2));
    }

    #[test]
    fn test_pick_and_roll() {
        let mut stack = Stack::new(8);
        for v in [1, 2, 3] {
            stack.push(v).unwrap();
        }
        stack.pick(0).unwrap();
        assert_eq!(stack.pop(), Ok(3));
        stack.pick(2).unwrap();
        assert_eq!(stack.pop(), Ok(1));
        stack.roll(2).unwrap();
        let items: Vec<Cell> = stack.iter_from_bottom().copied().collect();
        assert_eq!(items, vec![2, 3, 1]);
        assert_eq!(stack.roll(3), Err(StackError::Underflow));
    }

    #[test]
    fn test_control_flow_kinds() {
        let mut cf = ControlFlowStack::new();
        cf.push_dest(0x100);
        cf.push_orig(0x200);
        assert!(matches!(cf.pop_dest(), Err(ForthError::UnbalancedControl)));
        cf.roll(1).unwrap();
        assert_eq!(cf.pop_dest().unwrap(), 0x100);
        assert_eq!(cf.pop_orig().unwrap(), 0x200);
        assert!(cf.is_empty());
        assert!(matches!(cf.pop_orig(), Err(ForthError::UnbalancedControl)));
    }

    #[test]
    fn test_control_flow_pick() {
        let mut cf = ControlFlowStack::new();
        cf.push_dest(0x10);
        cf.push_orig(0x20);
        cf.pick(1).unwrap();
        assert_eq!(cf.len(), 3);
        assert_eq!(cf.pop_dest().unwrap(), 0x10);
        assert!(cf.pick(5).is_err());
    }

    #[test]
    fn test_leave_stack_brackets_nested_loops() {
        let mut leaves = LeaveStack::new();
        assert!(leaves.push(0x40).is_err());
        leaves.open_loop();
        leaves.push(0x100).unwrap();
        leaves.open_loop();
        leaves.push(0x200).unwrap();
        leaves.push(0x204).unwrap();
        assert_eq!(leaves.close_loop().unwrap(), vec![0x204, 0x200]);
        assert_eq!(leaves.close_loop().unwrap(), vec![0x100]);
        assert!(leaves.is_empty());
        assert!(leaves.close_loop().is_err());
    }

    proptest! {
        #[test]
        fn prop_pop_reverses_push(values in proptest::collection::vec(any::<i32>(), 0..64)) {
            let mut stack = Stack::new(64);
            for v in &values {
                stack.push(*v).unwrap();
            }
            prop_assert_eq!(stack.depth(), values.len());
            for v in values.iter().rev() {
                prop_assert_eq!(stack.pop(), Ok(*v));
            }
            prop_assert_eq!(stack.pop(), Err(StackError::Underflow));
        }

        #[test]
        fn prop_double_preserves_value(value in any::<i64>(), below in any::<i32>()) {
            let mut stack = Stack::new(8);
            stack.push(below).unwrap();
            stack.push_double(value).unwrap();
            prop_assert_eq!(stack.pop_double(), Ok(value));
            prop_assert_eq!(stack.pop(), Ok(below));
        }
    }
}
