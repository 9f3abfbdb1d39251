//! # Patch
//!
//! This module covers patches, which are named, reversible byte-range modifications
//! applied to a target memory space

use std::sync::{Arc, Mutex, Weak};

use tracing::trace;

use crate::lifecycle::Lifecycle;
use crate::memory::{MemoryError, TargetMemory};

pub mod registry;

pub use registry::PatchRegistry;

/// Where a patch stands relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchState {
    /// The target span holds its original bytes
    Unapplied,
    /// The target span holds the replacement bytes
    Applied,
    /// A write failed partway; the target span may hold a torn mix of original and
    /// replacement bytes. Both `enable` and `disable` rewrite the full span from
    /// here, repairing the tear.
    Indeterminate,
}

/// Mutable interior of a patch, guarded as one unit so a transition's
/// read-check-write sequence cannot interleave with another
struct PatchInner {
    /// Bytes found at the address before the first write; captured exactly once
    /// and never overwritten afterwards
    original: Option<Vec<u8>>,
    /// Current state of the target span
    state: PatchState,
}

/// A named, reversible byte-range modification against a target memory space.
///
/// A patch holds only a weak handle to its target: tracking a patch never keeps the
/// target alive, and a target that went away surfaces as
/// [`MemoryError::ProcessExited`] on the next transition instead of going unnoticed.
///
/// Enabling reads the current bytes (capturing them the first time), then writes the
/// replacement; disabling writes the captured originals back. Both directions are
/// idempotent.
pub struct Patch {
    /// Identity key within a registry
    name: String,
    /// Start of the patched span in the target address space
    address: usize,
    /// Bytes written over the span when the patch is enabled
    replacement: Vec<u8>,
    /// Weak handle to the target, resolved on every transition
    memory: Weak<dyn TargetMemory + Send + Sync>,
    /// State and captured originals
    inner: Mutex<PatchInner>,
}

impl Patch {
    /// Creates an unapplied patch covering `replacement.len()` bytes at `address`
    pub fn new(
        name: impl Into<String>,
        address: usize,
        replacement: Vec<u8>,
        memory: Weak<dyn TargetMemory + Send + Sync>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            replacement,
            memory,
            inner: Mutex::new(PatchInner {
                original: None,
                state: PatchState::Unapplied,
            }),
        }
    }

    /// Start of the patched span in the target address space
    pub fn address(&self) -> usize {
        self.address
    }

    /// Bytes written over the span when the patch is enabled
    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }

    /// Bytes captured from the target before the first write, if the patch has ever
    /// been enabled
    pub fn original(&self) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().original.clone()
    }

    /// Resolves the weak target handle for one transition
    fn memory(&self) -> Result<Arc<dyn TargetMemory + Send + Sync>, MemoryError> {
        self.memory.upgrade().ok_or(MemoryError::ProcessExited)
    }
}

impl Lifecycle for Patch {
    type Error = MemoryError;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().state == PatchState::Applied
    }

    fn enable(&self) -> Result<(), MemoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PatchState::Applied {
            return Ok(());
        }
        let memory = self.memory()?;

        // The first enable captures the true originals; a re-enable after a manual
        // disable or a failed write must not overwrite them
        if inner.original.is_none() {
            let mut current = vec![0u8; self.replacement.len()];
            memory.read(self.address, &mut current)?;
            inner.original = Some(current);
        }

        match memory.write(self.address, &self.replacement) {
            Ok(()) => {
                trace!(name = self.name.as_str(), address = self.address, "patch applied");
                inner.state = PatchState::Applied;
                Ok(())
            }
            Err(e) => {
                // The write may have landed partially; the next enable or disable
                // rewrites the full span and repairs it
                inner.state = PatchState::Indeterminate;
                Err(e)
            }
        }
    }

    fn disable(&self) -> Result<(), MemoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PatchState::Unapplied {
            return Ok(());
        }
        let memory = self.memory()?;

        // `state` only leaves `Unapplied` after a successful capture
        let original = inner
            .original
            .as_ref()
            .expect("applied patch with no captured originals");
        memory.write(self.address, original)?;

        trace!(name = self.name.as_str(), address = self.address, "patch restored");
        inner.state = PatchState::Unapplied;
        Ok(())
    }
}

impl Drop for Patch {
    fn drop(&mut self) {
        // Safety-net teardown: if the last handle drops while the target still holds
        // replacement bytes, put the originals back. Failures are ignored; nobody is
        // left to report them to.
        let Ok(inner) = self.inner.get_mut() else {
            return;
        };
        if inner.state == PatchState::Unapplied {
            return;
        }
        if let (Some(original), Some(memory)) = (inner.original.as_ref(), self.memory.upgrade()) {
            let _ = memory.write(self.address, original);
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Failure-injecting target memory shared by the patch and registry tests

    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::memory::{BufferMemory, MemoryError, TargetMemory};

    /// Target memory that can be told to reject reads or writes, optionally tearing
    /// a rejected write partway through the span first
    pub(crate) struct FlakyMemory {
        /// Backing memory serving the calls that are allowed through
        inner: BufferMemory,
        /// When set, reads fail
        fail_reads: AtomicBool,
        /// When set, writes fail
        fail_writes: AtomicBool,
        /// When set together with `fail_writes`, half the span lands before the failure
        tear_writes: AtomicBool,
    }

    impl FlakyMemory {
        /// Creates a well-behaved memory space over `bytes` at `base`
        pub(crate) fn new(base: usize, bytes: Vec<u8>) -> Self {
            Self {
                inner: BufferMemory::new(base, bytes),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                tear_writes: AtomicBool::new(false),
            }
        }

        /// Makes subsequent reads fail (or succeed again)
        pub(crate) fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// Makes subsequent writes fail (or succeed again)
        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Makes subsequent failing writes land their first half before failing
        pub(crate) fn tear_writes(&self, tear: bool) {
            self.tear_writes.store(tear, Ordering::SeqCst);
        }

        /// Returns a snapshot of the backing bytes
        pub(crate) fn bytes(&self) -> Vec<u8> {
            self.inner.bytes()
        }
    }

    impl TargetMemory for FlakyMemory {
        fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), MemoryError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(MemoryError::AccessDenied {
                    address,
                    len: buf.len(),
                });
            }
            self.inner.read(address, buf)
        }

        fn write(&self, address: usize, bytes: &[u8]) -> Result<(), MemoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                if self.tear_writes.load(Ordering::SeqCst) {
                    let half = bytes.len() / 2;
                    self.inner.write(address, &bytes[..half])?;
                }
                return Err(MemoryError::AccessDenied {
                    address,
                    len: bytes.len(),
                });
            }
            self.inner.write(address, bytes)
        }
    }
}
