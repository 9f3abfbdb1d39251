//! This module contains the patch registry, which creates and tracks every patch
//! installed against one target memory space

use std::sync::Arc;

use tracing::debug;

use crate::lifecycle::Lifecycle;
use crate::memory::{MemoryError, TargetMemory};
use crate::registry::{NotFound, Registry};

use super::Patch;

/// Factory and tracker for the patches installed against one target.
///
/// Patches are deduplicated by name: creating a name twice hands back the patch
/// already registered under it, unchanged, whatever address or bytes the second
/// call asked for. The registry holds the only strong handle to the target memory
/// handed to it; the patches themselves hold weak ones.
pub struct PatchRegistry {
    /// Target memory every created patch is bound to
    memory: Arc<dyn TargetMemory + Send + Sync>,
    /// Tracked patches, keyed by name
    patches: Registry<Patch>,
}

impl PatchRegistry {
    /// Creates a patch registry bound to `memory`
    pub fn new(memory: Arc<dyn TargetMemory + Send + Sync>) -> Self {
        Self {
            memory,
            patches: Registry::new(),
        }
    }

    /// Returns the patch registered under `name`, creating it unapplied if the
    /// name is new
    pub fn create(&self, address: usize, replacement: &[u8], name: &str) -> Arc<Patch> {
        self.patches.get_or_insert_with(name, || {
            debug!(name, address, len = replacement.len(), "registered patch");
            Patch::new(
                name,
                address,
                replacement.to_vec(),
                Arc::downgrade(&self.memory),
            )
        })
    }

    /// Returns the patch registered under `name`, creating it if needed, enabled.
    ///
    /// Re-affirming an existing, already-applied patch is a no-op.
    pub fn create_and_apply(
        &self,
        address: usize,
        replacement: &[u8],
        name: &str,
    ) -> Result<Arc<Patch>, MemoryError> {
        let patch = self.create(address, replacement, name);
        patch.enable()?;
        Ok(patch)
    }

    /// Returns the patch registered under `name`
    pub fn lookup(&self, name: &str) -> Result<Arc<Patch>, NotFound> {
        self.patches.lookup(name)
    }

    /// Enables every tracked patch. See [`Registry::enable_all`] for the failure policy.
    pub fn enable_all(&self) -> Result<(), MemoryError> {
        self.patches.enable_all()
    }

    /// Disables every tracked patch. See [`Registry::disable_all`] for the failure policy.
    pub fn disable_all(&self) -> Result<(), MemoryError> {
        self.patches.disable_all()
    }

    /// Removes the patch registered under `name`, restoring its bytes.
    ///
    /// An unknown name is a silent no-op; a known name always leaves the registry,
    /// even when the restore fails. See [`Registry::remove`].
    pub fn remove(&self, name: &str) -> Result<(), MemoryError> {
        self.patches.remove(name)
    }

    /// Removes `patch` from the registry by its name. See [`PatchRegistry::remove`].
    pub fn remove_patch(&self, patch: &Patch) -> Result<(), MemoryError> {
        self.patches.remove_item(patch)
    }

    /// Removes every tracked patch, restoring each one's bytes
    pub fn remove_all(&self) -> Result<(), MemoryError> {
        self.patches.remove_all()
    }

    /// Tears the registry down: restores and discards every tracked patch
    pub fn dispose(&self) -> Result<(), MemoryError> {
        self.remove_all()
    }

    /// Number of tracked patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether no patches are tracked
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Names of every tracked patch, in no particular order
    pub fn names(&self) -> Vec<String> {
        self.patches.names()
    }

    /// Snapshot of every tracked patch, in no particular order
    pub fn snapshot(&self) -> Vec<Arc<Patch>> {
        self.patches.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::lifecycle::Lifecycle;
    use crate::memory::BufferMemory;
    use crate::patch::testutil::FlakyMemory;

    use super::PatchRegistry;

    #[test]
    /// Test the full scenario: apply a named patch, then restore it in bulk
    fn test_create_and_apply_then_disable_all() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![0x90, 0x90]));
        let registry = PatchRegistry::new(memory.clone());

        let skip = registry
            .create_and_apply(0x1000, &[0xEB, 0xFE], "skip")
            .unwrap();
        assert!(skip.is_enabled());
        assert_eq!(memory.bytes(), [0xEB, 0xFE]);

        registry.disable_all().unwrap();
        assert!(!skip.is_enabled());
        assert_eq!(memory.bytes(), [0x90, 0x90]);
    }

    #[test]
    /// Test that creating a registered name returns the existing patch unchanged
    fn test_create_dedups_by_name() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![0; 8]));
        let registry = PatchRegistry::new(memory);

        let first = registry.create(0x1000, &[1, 1], "p");
        // different address and bytes, same name
        let second = registry.create(0x1004, &[2, 2, 2], "p");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.address(), 0x1000);
        assert_eq!(second.replacement(), [1, 1]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    /// Test that re-affirming an applied patch through create_and_apply is a no-op
    fn test_create_and_apply_reaffirms() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![1, 2]));
        let registry = PatchRegistry::new(memory.clone());

        let first = registry.create_and_apply(0x1000, &[9, 9], "p").unwrap();
        let second = registry.create_and_apply(0x1000, &[3, 3], "p").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(memory.bytes(), [9, 9]);
        assert_eq!(second.original(), Some(vec![1, 2]));
    }

    #[test]
    /// Test lookup of registered and unknown names
    fn test_lookup() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![0; 4]));
        let registry = PatchRegistry::new(memory);
        registry.create(0x1000, &[1], "p");

        assert_eq!(registry.lookup("p").unwrap().name(), "p");
        assert!(registry.lookup("ghost").is_err());
    }

    #[test]
    /// Test that removal restores the patch's bytes and forgets the name
    fn test_remove_restores() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![1, 2, 3]));
        let registry = PatchRegistry::new(memory.clone());
        registry.create_and_apply(0x1000, &[9, 9], "p").unwrap();

        registry.remove("p").unwrap();
        assert_eq!(memory.bytes(), [1, 2, 3]);
        assert!(registry.lookup("p").is_err());

        // removing again is a silent no-op
        registry.remove("p").unwrap();
    }

    #[test]
    /// Test removal by patch reference instead of name
    fn test_remove_patch() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![1, 2]));
        let registry = PatchRegistry::new(memory.clone());
        let patch = registry.create_and_apply(0x1000, &[9, 9], "p").unwrap();

        registry.remove_patch(&patch).unwrap();
        assert!(registry.is_empty());
        assert_eq!(memory.bytes(), [1, 2]);
    }

    #[test]
    /// Test that a patch leaves the registry even when its restore fails
    fn test_remove_is_unconditional() {
        let memory = Arc::new(FlakyMemory::new(0x1000, vec![1, 2]));
        let registry = PatchRegistry::new(memory.clone());
        registry.create_and_apply(0x1000, &[9, 9], "p").unwrap();

        memory.fail_writes(true);
        assert!(registry.remove("p").is_err());

        // the entry is gone regardless of the failed restore
        assert!(registry.lookup("p").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    /// Test that bulk clear restores every patch and empties the registry
    fn test_remove_all_restores_everything() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![1, 2, 3, 4, 5, 6]));
        let registry = PatchRegistry::new(memory.clone());

        registry.create_and_apply(0x1000, &[0xA, 0xA], "a").unwrap();
        registry.create_and_apply(0x1002, &[0xB, 0xB], "b").unwrap();
        registry.create_and_apply(0x1004, &[0xC, 0xC], "c").unwrap();
        assert_eq!(memory.bytes(), [0xA, 0xA, 0xB, 0xB, 0xC, 0xC]);

        registry.remove_all().unwrap();
        assert!(registry.is_empty());
        assert_eq!(memory.bytes(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    /// Test that dispose is a full teardown of the tracked set
    fn test_dispose() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![1, 2]));
        let registry = PatchRegistry::new(memory.clone());
        registry.create_and_apply(0x1000, &[9, 9], "p").unwrap();

        registry.dispose().unwrap();
        assert!(registry.is_empty());
        assert_eq!(memory.bytes(), [1, 2]);
    }

    #[test]
    /// Test enabling a created-but-unapplied set in bulk
    fn test_enable_all() {
        let memory = Arc::new(BufferMemory::new(0x1000, vec![0, 0, 0, 0]));
        let registry = PatchRegistry::new(memory.clone());

        registry.create(0x1000, &[1, 1], "a");
        registry.create(0x1002, &[2, 2], "b");
        assert_eq!(memory.bytes(), [0, 0, 0, 0]);

        registry.enable_all().unwrap();
        assert_eq!(memory.bytes(), [1, 1, 2, 2]);

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(registry.snapshot().len(), 2);
    }
}
