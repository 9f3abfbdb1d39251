//! This module contains the keyboard hook lifecycle element

use std::sync::{Arc, Mutex};

use crate::lifecycle::Lifecycle;

use super::{EventSink, HookError, HookToken, KeyboardBackend};

/// Named lifecycle element wrapping one low-level keyboard hook.
///
/// Enabling registers the sink with the backend; disabling deregisters it. Dropping
/// an enabled hook deregisters it as a safety net, so a hook cannot keep delivering
/// events after its owner is gone.
pub struct KeyboardHook {
    /// Identity key within a registry
    name: String,
    /// OS capability the hook registers with
    backend: Arc<dyn KeyboardBackend>,
    /// Callback handed to the backend on each enable
    sink: EventSink,
    /// Live registration token while enabled
    token: Mutex<Option<HookToken>>,
}

impl KeyboardHook {
    /// Creates a disabled keyboard hook that will deliver events to `sink`
    pub fn new(name: impl Into<String>, backend: Arc<dyn KeyboardBackend>, sink: EventSink) -> Self {
        Self {
            name: name.into(),
            backend,
            sink,
            token: Mutex::new(None),
        }
    }
}

impl Lifecycle for KeyboardHook {
    type Error = HookError;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.token.lock().unwrap().is_some()
    }

    fn enable(&self) -> Result<(), HookError> {
        let mut token = self.token.lock().unwrap();
        if token.is_none() {
            *token = Some(self.backend.install(Arc::clone(&self.sink))?);
        }
        Ok(())
    }

    fn disable(&self) -> Result<(), HookError> {
        let mut token = self.token.lock().unwrap();
        if let Some(t) = token.take() {
            // put the token back on failure so the removal can be retried
            if let Err(e) = self.backend.remove(t) {
                *token = Some(t);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        // Deregistration must happen even without an explicit dispose; failures are
        // ignored since nobody is left to report them to
        if let Ok(token) = self.token.get_mut() {
            if let Some(t) = token.take() {
                let _ = self.backend.remove(t);
            }
        }
    }
}
