//////////////////////////////////////////////////////////////
/// Forth Interpreter Kernel
///
/// This module contains the memory map and the lowest-level data structures of the interpreter:
/// the byte-addressed RAM image and the data and return stacks.
///
/// Everything Forth can see lives in one flat RAM image of RAM_SIZE bytes. The dictionary grows
/// up from DICT_START; interpreter buffers and control cells sit just above it; the I/O port
/// region is laid out downward from the top of RAM. Cells are four bytes, little-endian.
///
use crate::error::ForthError;
use crate::stack::{Stack, StackError};

pub type Cell = i32;
pub type UCell = u32;
pub type DCell = i64;
pub type UDCell = u64;
pub type Addr = usize;

pub const CELL: usize = 4;
pub const RAM_SIZE: usize = 0x20000;

// DICTIONARY AREA
pub const DICT_START: Addr = 0x0100;
pub const DICT_SIZE: usize = 0x8000;
pub const DICT_TOP: Addr = DICT_START + DICT_SIZE;
pub const MAX_NAME_LENGTH: usize = 0x3F;

// BUFFERS AND CONTROL CELLS above the dictionary
pub const PAD_START: Addr = DICT_TOP;
pub const PAD_SIZE: usize = 0x40;
pub const SOURCE_BUFF_START: Addr = PAD_START + PAD_SIZE; // string/terminal input buffer
pub const SOURCE_BUFF_SIZE: usize = 0x100;
pub const FILE_BUFF_START: Addr = SOURCE_BUFF_START + SOURCE_BUFF_SIZE;
pub const FILE_BUFF_QTY: usize = 8;
pub const FILE_BUFF_SIZE: usize = 0x100;
pub const FILE_BUFF_MODE_OFFSET: usize = 0; // nonzero while the slot is in use
pub const FILE_BUFF_TO_IN_OFFSET: usize = CELL; // >IN for this file's line
pub const FILE_BUFF_DATA_OFFSET: usize = 2 * CELL;
pub const FILE_BUFF_DATA_SIZE: usize = FILE_BUFF_SIZE - FILE_BUFF_DATA_OFFSET;
pub const FILE_BUFF_TOP: Addr = FILE_BUFF_START + FILE_BUFF_QTY * FILE_BUFF_SIZE;
pub const SOURCE_TO_IN: Addr = FILE_BUFF_TOP; // >IN for the string buffer
pub const WORD_BUFF_START: Addr = SOURCE_TO_IN + CELL;
pub const WORD_BUFF_SIZE: usize = 0x100;
pub const BASE_ADDR: Addr = WORD_BUFF_START + WORD_BUFF_SIZE;
pub const HERE_ADDR: Addr = BASE_ADDR + CELL; // next free dictionary byte
pub const LATEST_ADDR: Addr = HERE_ADDR + CELL; // link field of the newest entry
pub const SYSTEM_TOP: Addr = LATEST_ADDR + CELL;

// I/O REGION, from the top of RAM downward
pub const IO_PORTS: usize = 0x100;
pub const IO_OUT_TOP: Addr = RAM_SIZE;
pub const IO_OUT_START: Addr = IO_OUT_TOP - IO_PORTS * CELL;
pub const IO_IN_TOP: Addr = IO_OUT_START;
pub const IO_IN_START: Addr = IO_IN_TOP - IO_PORTS * CELL;
pub const IO_IN_MAP_TOP: Addr = IO_IN_START; // (xt, queue mode) per input port
pub const IO_IN_MAP_START: Addr = IO_IN_MAP_TOP - IO_PORTS * 2 * CELL;
pub const PERIODIC_QTY: usize = 0x80;
pub const PERIODIC_TOP: Addr = IO_IN_MAP_START; // (msec, xt) per timer id
pub const PERIODIC_START: Addr = PERIODIC_TOP - PERIODIC_QTY * 2 * CELL;

const _: () = assert!(SYSTEM_TOP <= PERIODIC_START, "dictionary overlaps the I/O region");

pub const DATA_STACK_SIZE: usize = 100;
pub const RETURN_STACK_SIZE: usize = 100;

/// LAYOUT_STAMP changes whenever the memory map changes, so stale snapshots are refused.
pub const LAYOUT_STAMP: u32 = layout_stamp(&[
    CELL,
    RAM_SIZE,
    DICT_START,
    DICT_SIZE,
    PAD_SIZE,
    SOURCE_BUFF_SIZE,
    FILE_BUFF_QTY,
    FILE_BUFF_SIZE,
    WORD_BUFF_SIZE,
    IO_PORTS,
    PERIODIC_QTY,
    MAX_NAME_LENGTH,
]);

const fn layout_stamp(values: &[usize]) -> u32 {
    // FNV-1a over the low 32 bits of each constant
    let mut hash: u32 = 0x811c_9dc5;
    let mut i = 0;
    while i < values.len() {
        let mut v = values[i] as u32;
        let mut b = 0;
        while b < 4 {
            hash ^= v & 0xff;
            hash = hash.wrapping_mul(0x0100_0193);
            v >>= 8;
            b += 1;
        }
        i += 1;
    }
    hash
}

/// align rounds an address up to the next cell boundary.
pub fn align(addr: Addr) -> Addr {
    (addr + CELL - 1) & !(CELL - 1)
}

/// truncate_to_cell keeps the low 32 bits of a double-width result.
pub fn truncate_to_cell(value: DCell) -> Cell {
    value as Cell
}

/// to_addr converts a cell to a byte address, rejecting negative values.
pub fn to_addr(value: Cell) -> Result<Addr, ForthError> {
    if value < 0 {
        Err(ForthError::InvalidAddress(value as i64))
    } else {
        Ok(value as Addr)
    }
}

/// The RAM image
///
///     Every accessor checks its range and fails with InvalidAddress rather than clamping.
///     Double cells are stored high cell first, matching 2@ and 2!.
///
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            bytes: vec![0; RAM_SIZE],
        }
    }

    fn range(&self, addr: Addr, len: usize) -> Result<std::ops::Range<usize>, ForthError> {
        match addr.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(addr..end),
            _ => Err(ForthError::InvalidAddress(addr as i64)),
        }
    }

    pub fn get_byte(&self, addr: Addr) -> Result<u8, ForthError> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(ForthError::InvalidAddress(addr as i64))
    }

    pub fn set_byte(&mut self, addr: Addr, val: u8) -> Result<(), ForthError> {
        match self.bytes.get_mut(addr) {
            Some(b) => {
                *b = val;
                Ok(())
            }
            None => Err(ForthError::InvalidAddress(addr as i64)),
        }
    }

    pub fn get_cell(&self, addr: Addr) -> Result<Cell, ForthError> {
        let r = self.range(addr, CELL)?;
        let mut raw = [0u8; CELL];
        raw.copy_from_slice(&self.bytes[r]);
        Ok(Cell::from_le_bytes(raw))
    }

    pub fn set_cell(&mut self, addr: Addr, val: Cell) -> Result<(), ForthError> {
        let r = self.range(addr, CELL)?;
        self.bytes[r].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn get_ucell(&self, addr: Addr) -> Result<UCell, ForthError> {
        Ok(self.get_cell(addr)? as UCell)
    }

    pub fn set_ucell(&mut self, addr: Addr, val: UCell) -> Result<(), ForthError> {
        self.set_cell(addr, val as Cell)
    }

    pub fn get_dcell(&self, addr: Addr) -> Result<DCell, ForthError> {
        Ok(self.get_udcell(addr)? as DCell)
    }

    pub fn set_dcell(&mut self, addr: Addr, val: DCell) -> Result<(), ForthError> {
        self.set_udcell(addr, val as UDCell)
    }

    pub fn get_udcell(&self, addr: Addr) -> Result<UDCell, ForthError> {
        self.range(addr, 2 * CELL)?;
        let hi = self.get_ucell(addr)? as UDCell;
        let lo = self.get_ucell(addr + CELL)? as UDCell;
        Ok((hi << 32) | lo)
    }

    pub fn set_udcell(&mut self, addr: Addr, val: UDCell) -> Result<(), ForthError> {
        self.range(addr, 2 * CELL)?;
        self.set_ucell(addr, (val >> 32) as UCell)?;
        self.set_ucell(addr + CELL, val as UCell)
    }

    pub fn bytes(&self, addr: Addr, len: usize) -> Result<&[u8], ForthError> {
        let r = self.range(addr, len)?;
        Ok(&self.bytes[r])
    }

    pub fn write_bytes(&mut self, addr: Addr, data: &[u8]) -> Result<(), ForthError> {
        let r = self.range(addr, data.len())?;
        self.bytes[r].copy_from_slice(data);
        Ok(())
    }

    /// copy moves len bytes from src to dst; overlapping ranges behave like memmove.
    pub fn copy(&mut self, src: Addr, dst: Addr, len: usize) -> Result<(), ForthError> {
        let r = self.range(src, len)?;
        self.range(dst, len)?;
        self.bytes.copy_within(r, dst);
        Ok(())
    }

    pub fn fill(&mut self, addr: Addr, len: usize, val: u8) -> Result<(), ForthError> {
        let r = self.range(addr, len)?;
        self.bytes[r].fill(val);
        Ok(())
    }

    /// text reads bytes as UTF-8 for display; invalid sequences become U+FFFD.
    pub fn text(&self, addr: Addr, len: usize) -> Result<String, ForthError> {
        Ok(String::from_utf8_lossy(self.bytes(addr, len)?).into_owned())
    }

    pub fn image(&self) -> &[u8] {
        &self.bytes
    }

    pub fn load_image(&mut self, image: &[u8]) -> Result<(), ForthError> {
        if image.len() != self.bytes.len() {
            return Err(ForthError::InvalidAddress(image.len() as i64));
        }
        self.bytes.copy_from_slice(image);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

/// The primary data structure for the Forth engine
///
///     The kernel owns the RAM image and both stacks. Stack faults surface as ForthError,
///     with return-stack faults distinguished from data-stack faults.
///
pub struct Kernel {
    pub memory: Memory,
    data: Stack,
    ret: Stack,
}

fn return_fault(err: StackError) -> ForthError {
    match err {
        StackError::Underflow => ForthError::ReturnStackUnderflow,
        StackError::Overflow => ForthError::ReturnStackOverflow,
    }
}

impl Kernel {
    pub fn new() -> Kernel {
        Kernel {
            memory: Memory::new(),
            data: Stack::new(DATA_STACK_SIZE),
            ret: Stack::new(RETURN_STACK_SIZE),
        }
    }

    /// reset() clears the stacks.
    ///
    pub fn reset(&mut self) {
        self.data.clear();
        self.ret.clear();
    }

    /// get returns the cell stored at a byte address
    pub fn get(&self, addr: Addr) -> Result<Cell, ForthError> {
        self.memory.get_cell(addr)
    }

    /// set stores a cell at a byte address
    pub fn set(&mut self, addr: Addr, val: Cell) -> Result<(), ForthError> {
        self.memory.set_cell(addr, val)
    }

    /// Safe stack accessors
    #[inline(always)]
    pub fn push(&mut self, val: Cell) -> Result<(), ForthError> {
        Ok(self.data.push(val)?)
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<Cell, ForthError> {
        Ok(self.data.pop()?)
    }

    #[inline(always)]
    pub fn top(&self) -> Result<Cell, ForthError> {
        Ok(self.data.peek(0)?)
    }

    #[inline(always)]
    pub fn peek(&self, n: usize) -> Result<Cell, ForthError> {
        Ok(self.data.peek(n)?)
    }

    pub fn push_flag(&mut self, flag: bool) -> Result<(), ForthError> {
        self.push(if flag { -1 } else { 0 })
    }

    pub fn push_double(&mut self, val: DCell) -> Result<(), ForthError> {
        Ok(self.data.push_double(val)?)
    }

    pub fn pop_double(&mut self) -> Result<DCell, ForthError> {
        Ok(self.data.pop_double()?)
    }

    /// pop_addr pops a cell that must be a valid (non-negative) address
    pub fn pop_addr(&mut self) -> Result<Addr, ForthError> {
        to_addr(self.pop()?)
    }

    /// pop_len pops a count; negative counts are treated as zero
    pub fn pop_len(&mut self) -> Result<usize, ForthError> {
        Ok(self.pop()?.max(0) as usize)
    }

    pub fn pick(&mut self, n: usize) -> Result<(), ForthError> {
        Ok(self.data.pick(n)?)
    }

    pub fn roll(&mut self, n: usize) -> Result<(), ForthError> {
        Ok(self.data.roll(n)?)
    }

    #[inline(always)]
    pub fn stack_len(&self) -> usize {
        self.data.depth()
    }

    /// stack_check checks if there are enough items on the stack for an operation
    #[inline(always)]
    pub fn stack_check(&self, needed: usize) -> Result<(), ForthError> {
        Ok(self.data.require(needed)?)
    }

    pub fn data_stack(&self) -> &Stack {
        &self.data
    }

    pub fn pop2_push1<F>(&mut self, f: F) -> Result<(), ForthError>
    where
        F: Fn(Cell, Cell) -> Cell,
    {
        self.stack_check(2)?;
        let j = self.pop()?;
        let k = self.pop()?;
        self.push(f(k, j))
    }

    pub fn pop1_push1<F>(&mut self, f: F) -> Result<(), ForthError>
    where
        F: Fn(Cell) -> Cell,
    {
        let x = self.pop()?;
        self.push(f(x))
    }

    // Return stack
    #[inline(always)]
    pub fn push_r(&mut self, val: Cell) -> Result<(), ForthError> {
        self.ret.push(val).map_err(return_fault)
    }

    #[inline(always)]
    pub fn pop_r(&mut self) -> Result<Cell, ForthError> {
        self.ret.pop().map_err(return_fault)
    }

    pub fn peek_r(&self, n: usize) -> Result<Cell, ForthError> {
        self.ret.peek(n).map_err(return_fault)
    }

    pub fn poke_r(&mut self, n: usize, val: Cell) -> Result<(), ForthError> {
        self.ret.poke(n, val).map_err(return_fault)
    }

    pub fn return_len(&self) -> usize {
        self.ret.depth()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::new()
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_access_is_little_endian() {
        let mut mem = Memory::new();
        mem.set_cell(0x200, 0x0102_0304).unwrap();
        assert_eq!(mem.get_byte(0x200).unwrap(), 0x04);
        assert_eq!(mem.get_byte(0x203).unwrap(), 0x01);
        mem.set_cell(0x204, -1).unwrap();
        assert_eq!(mem.get_ucell(0x204).unwrap(), u32::MAX);
    }

    #[test]
    fn test_double_cell_high_first() {
        let mut mem = Memory::new();
        mem.set_dcell(0x300, 0x0000_0007_0000_0009).unwrap();
        assert_eq!(mem.get_cell(0x300).unwrap(), 7);
        assert_eq!(mem.get_cell(0x304).unwrap(), 9);
        assert_eq!(mem.get_dcell(0x300).unwrap(), 0x0000_0007_0000_0009);
        mem.set_dcell(0x308, -5).unwrap();
        assert_eq!(mem.get_dcell(0x308).unwrap(), -5);
        assert_eq!(mem.get_udcell(0x308).unwrap(), (-5i64) as u64);
    }

    #[test]
    fn test_out_of_range_fails() {
        let mut mem = Memory::new();
        assert!(mem.get_cell(RAM_SIZE - 2).is_err());
        assert!(mem.set_byte(RAM_SIZE, 1).is_err());
        assert!(mem.get_dcell(RAM_SIZE - 4).is_err());
        assert!(mem.bytes(RAM_SIZE - 1, 2).is_err());
        assert!(mem.get_cell(RAM_SIZE - 4).is_ok());
        assert!(to_addr(-1).is_err());
    }

    #[test]
    fn test_align_and_truncate() {
        assert_eq!(align(0x100), 0x100);
        assert_eq!(align(0x101), 0x104);
        assert_eq!(align(0x103), 0x104);
        assert_eq!(truncate_to_cell(0x1_0000_0005), 5);
        assert_eq!(truncate_to_cell(-1), -1);
        assert_eq!(truncate_to_cell(0x8000_0000), i32::MIN);
    }

    #[test]
    fn test_copy_overlapping() {
        let mut mem = Memory::new();
        mem.write_bytes(0x400, b"abcdef").unwrap();
        mem.copy(0x400, 0x402, 4).unwrap();
        assert_eq!(mem.bytes(0x400, 6).unwrap(), b"ababcd");
    }

    #[test]
    fn test_layout_regions_do_not_overlap() {
        assert!(SYSTEM_TOP <= PERIODIC_START);
        assert_eq!(PERIODIC_TOP, IO_IN_MAP_START);
        assert_eq!(IO_OUT_TOP, RAM_SIZE);
        assert_eq!(FILE_BUFF_START % CELL, 0);
        assert_eq!(BASE_ADDR % CELL, 0);
    }

    #[test]
    fn test_kernel_stacks() {
        let mut k = Kernel::new();
        k.push(3).unwrap();
        k.push(4).unwrap();
        k.pop2_push1(|a, b| a - b).unwrap();
        assert_eq!(k.pop().unwrap(), -1);
        assert!(matches!(k.pop(), Err(ForthError::DataStackUnderflow)));
        assert!(matches!(k.pop_r(), Err(ForthError::ReturnStackUnderflow)));
        k.push_r(9).unwrap();
        assert_eq!(k.peek_r(0).unwrap(), 9);
    }
}
