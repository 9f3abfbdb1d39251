//! # Memory
//!
//! This module covers target memory spaces, which provide byte-range access to the
//! address space being instrumented

use thiserror::Error;

pub mod buffer;
pub mod local;

pub use buffer::BufferMemory;
pub use local::LocalMemory;

/// Errors when reading or writing a target memory space
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The range cannot be accessed (page protection, missing handle rights)
    #[error("access denied for {len} bytes at {address:#x}")]
    AccessDenied {
        /// Start of the rejected range
        address: usize,
        /// Length of the rejected range
        len: usize,
    },
    /// The target process is gone; no byte operation can complete anymore
    #[error("target process has exited")]
    ProcessExited,
}

/// Byte-range access to the address space of the process being instrumented.
///
/// Calls are blocking and fallible, with no timeout and no cancellation. Patches
/// resolve their target through this trait on every transition, so a target that
/// went away surfaces as an error on the next call rather than going unnoticed.
pub trait TargetMemory {
    /// Reads `buf.len()` bytes starting at `address` into `buf`
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Writes all of `bytes` starting at `address`
    fn write(&self, address: usize, bytes: &[u8]) -> Result<(), MemoryError>;
}
