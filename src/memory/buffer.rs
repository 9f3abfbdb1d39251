//! This module contains a target memory space backed by an owned heap buffer

use std::ops::Range;
use std::sync::Mutex;

use super::{MemoryError, TargetMemory};

/// Target memory space over an owned byte buffer mapped at a fixed base address.
///
/// Nothing real is patched: the buffer stands in for a target process, which makes
/// this the memory space of choice for tests and for dry-running a patch set before
/// pointing it at a live target. Access outside the mapped range is rejected with
/// [`MemoryError::AccessDenied`], just as a real target would reject an unmapped
/// address.
pub struct BufferMemory {
    /// Address the first buffer byte is mapped at
    base: usize,
    /// Backing bytes, locked so concurrent transitions stay serialized
    bytes: Mutex<Vec<u8>>,
}

impl BufferMemory {
    /// Creates a buffer memory space covering `base..base + bytes.len()`
    pub fn new(base: usize, bytes: Vec<u8>) -> Self {
        Self {
            base,
            bytes: Mutex::new(bytes),
        }
    }

    /// Returns a snapshot of the backing bytes
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }
}

impl TargetMemory for BufferMemory {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), MemoryError> {
        let bytes = self.bytes.lock().unwrap();
        let span = span(self.base, bytes.len(), address, buf.len())?;
        buf.copy_from_slice(&bytes[span]);
        Ok(())
    }

    fn write(&self, address: usize, data: &[u8]) -> Result<(), MemoryError> {
        let mut bytes = self.bytes.lock().unwrap();
        let span = span(self.base, bytes.len(), address, data.len())?;
        bytes[span].copy_from_slice(data);
        Ok(())
    }
}

/// Translates an address range into buffer offsets, rejecting anything outside the mapping
fn span(base: usize, size: usize, address: usize, len: usize) -> Result<Range<usize>, MemoryError> {
    let denied = MemoryError::AccessDenied { address, len };
    let start = address.checked_sub(base).ok_or_else(|| denied.clone())?;
    let end = start.checked_add(len).ok_or_else(|| denied.clone())?;
    if end > size {
        return Err(denied);
    }
    Ok(start..end)
}
