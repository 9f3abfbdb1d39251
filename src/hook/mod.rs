//! # Hook
//!
//! This module covers OS-level hooks: lifecycle elements that register with the
//! operating system and receive events until deregistered

use std::sync::Arc;

use thiserror::Error;

pub mod keyboard;

pub use keyboard::KeyboardHook;

/// Errors when installing or removing an OS hook
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The OS rejected the hook call
    #[error("hook call failed with OS error {0}")]
    Os(i32),
    /// The backend could not service the request
    #[error("hook backend failure: {0}")]
    Backend(String),
}

/// Whether a key went down or came back up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Key pressed
    Press,
    /// Key released
    Release,
}

/// One low-level keyboard event, carrying the raw virtual-key code undecoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Raw virtual-key code as delivered by the OS
    pub code: u16,
    /// Press or release
    pub action: KeyAction,
}

/// Callback receiving hook events.
///
/// The OS delivers events on a dispatcher thread of its own choosing; sinks must
/// be shareable across threads and must not assume they run on the thread that
/// enabled the hook.
pub type EventSink = Arc<dyn Fn(KeyEvent) + Send + Sync>;

/// Token identifying one installed hook with its backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookToken(pub u64);

/// Capability for registering low-level keyboard hooks with the operating system.
///
/// Implementations own the actual OS callback marshaling; the lifecycle layer only
/// ever installs and removes through this trait and carries no OS-specific logic.
pub trait KeyboardBackend: Send + Sync {
    /// Registers `sink` to receive key events until the returned token is removed
    fn install(&self, sink: EventSink) -> Result<HookToken, HookError>;

    /// Deregisters the hook identified by `token`
    fn remove(&self, token: HookToken) -> Result<(), HookError>;
}
