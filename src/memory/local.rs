//! This module contains a target memory space backed by the current process

use std::ptr;

use region::Protection;

use super::{MemoryError, TargetMemory};

/// Target memory space over the current process's own address space.
///
/// Reads copy straight out of the address space. Writes temporarily lift page
/// protections for the written span, so read-only data (string tables, vtables)
/// can be patched as well; the previous protection is reinstated once the write
/// completes.
///
/// # Safety
///
/// `LocalMemory` performs raw pointer reads and writes against whatever address it
/// is handed. The creator promises that every address passed through this instance
/// is valid for the full length of the access.
///
/// As always, casting a `&T` or `&mut T` to an address for use with `LocalMemory`
/// can result in undefined behavior because rust assumes `&T` will never change and
/// `&mut T` will only be changed via that reference. Addresses **MUST** refer to
/// memory not tracked by Rust, or the creator must ensure that reading from and
/// writing to tracked data cannot trigger undefined behavior.
pub struct LocalMemory(());

impl LocalMemory {
    /// Creates a target memory space over the current process
    ///
    /// # Safety
    ///
    /// See the [type-level docs](LocalMemory) for the contract on addresses used
    /// with the returned instance.
    pub unsafe fn new() -> Self {
        Self(())
    }
}

impl TargetMemory for LocalMemory {
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), MemoryError> {
        // Safety: creator promised `address` is valid for the full length of the access
        unsafe {
            ptr::copy(address as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn write(&self, address: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        // Safety: creator promised `address` is valid for the full length of the access,
        // and the span is writable while the protection guard is held
        unsafe {
            // Make the span writable for the duration of the copy; the handle
            // reinstates the previous protection when dropped
            let _guard = region::protect_with_handle(
                address as *const u8,
                bytes.len(),
                Protection::READ_WRITE,
            )
            .map_err(|_| MemoryError::AccessDenied {
                address,
                len: bytes.len(),
            })?;

            ptr::copy(bytes.as_ptr(), address as *mut u8, bytes.len());
        }
        Ok(())
    }
}
