//! # Lifecycle
//!
//! This module covers the lifecycle capability: the minimal contract shared by every
//! named, reversible modification a registry can track

/// Capability for named elements that can be switched on and off and torn down.
///
/// The contract is deliberately minimal so that unrelated element kinds (byte patches,
/// keyboard hooks) can share one registry implementation. Every transition takes `&self`;
/// implementors carry their own interior mutability so a single element can be shared
/// between a registry and its callers behind an [`Arc`](std::sync::Arc).
pub trait Lifecycle {
    /// Error type that can occur during a transition. If transitions always succeed, use `()`.
    type Error;

    /// Unique name of this element within its registry
    fn name(&self) -> &str;

    /// Whether the element is currently active
    fn is_enabled(&self) -> bool;

    /// Activates the element. Enabling an already-active element is a no-op.
    fn enable(&self) -> Result<(), Self::Error>;

    /// Deactivates the element. Disabling an already-inactive element is a no-op.
    fn disable(&self) -> Result<(), Self::Error>;

    /// Tears the element down before it is discarded.
    ///
    /// The default implementation deactivates the element; implementors holding
    /// resources beyond their active state can override it.
    fn dispose(&self) -> Result<(), Self::Error> {
        self.disable()
    }
}
