//////////////////////////////////////////////////////////////
/// snapshot.rs
///
/// Saving and restoring the whole RAM image.
///
/// File format, all integers little-endian:
///
///     magic   4 bytes  "CFSN"
///     stamp   u32      layout stamp mixed with the number of built-in words
///     length  u32      image length in bytes
///     image   length bytes of RAM
///
/// The image holds built-in tokens, and those are indices into the registration table, so the
/// stamp covers the registry size as well as the memory map.
///
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::ForthError;
use crate::kernel::*;
use crate::runtime::{CompileState, ForthRuntime};

pub const SNAPSHOT_MAGIC: &[u8; 4] = b"CFSN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub stamp: u32,
    pub image: Vec<u8>,
}

/// snapshot_stamp identifies a memory map together with a registry of `words` built-ins.
pub fn snapshot_stamp(words: usize) -> u32 {
    LAYOUT_STAMP ^ (words as u32).wrapping_mul(0x9E37_79B1)
}

impl Snapshot {
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), ForthError> {
        w.write_all(SNAPSHOT_MAGIC)?;
        w.write_all(&self.stamp.to_le_bytes())?;
        w.write_all(&(self.image.len() as u32).to_le_bytes())?;
        w.write_all(&self.image)?;
        w.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Snapshot, ForthError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a snapshot file",
            )
            .into());
        }
        let mut word = [0u8; 4];
        r.read_exact(&mut word)?;
        let stamp = u32::from_le_bytes(word);
        r.read_exact(&mut word)?;
        let len = u32::from_le_bytes(word) as usize;
        if len != RAM_SIZE {
            return Err(ForthError::SnapshotMismatch {
                expected: RAM_SIZE as u32,
                found: len as u32,
            });
        }
        let mut image = vec![0u8; len];
        r.read_exact(&mut image)?;
        Ok(Snapshot { stamp, image })
    }
}

impl ForthRuntime {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            stamp: snapshot_stamp(self.registry.len()),
            image: self.kernel.memory.image().to_vec(),
        }
    }

    /// restore replaces RAM with a snapshot taken by a runtime with the same layout and words.
    ///
    /// Stacks and compile state are reset, file slots are made to match the files actually
    /// open, and timers and port modes recorded in the image are handed back to the host.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), ForthError> {
        let expected = snapshot_stamp(self.registry.len());
        if snapshot.stamp != expected {
            return Err(ForthError::SnapshotMismatch {
                expected,
                found: snapshot.stamp,
            });
        }
        self.kernel.memory.load_image(&snapshot.image)?;
        self.kernel.reset();
        self.control.clear();
        self.leaves.clear();
        self.state = CompileState::default();
        for i in 0..FILE_BUFF_QTY {
            let id = FILE_BUFF_START + i * FILE_BUFF_SIZE;
            let mode = match self.files.get_mut(id) {
                Some(handle) => handle.file_mode as Cell,
                None => 0,
            };
            self.kernel.set(id + FILE_BUFF_MODE_OFFSET, mode)?;
        }
        self.resume_handlers()
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), ForthError> {
        let file = BufWriter::new(File::create(path)?);
        self.snapshot().write_to(file)?;
        info!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    pub fn load_snapshot(&mut self, path: &Path) -> Result<(), ForthError> {
        let snapshot = Snapshot::read_from(BufReader::new(File::open(path)?))?;
        self.restore(&snapshot)?;
        info!(path = %path.display(), "loaded snapshot");
        Ok(())
    }
}

//////////////////////////////////////////////////////////////
/// TESTS
///
