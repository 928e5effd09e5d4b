//! Isolated desktop sessions addressed by a well-known name.
//!
//! A session is a named OS object, not process state: every invocation
//! reopens it by name through [`SessionManager`], and the object outlives
//! the handle this process holds. Thread association is per OS thread; only
//! the thread that called [`SessionHandle::switch_in`] runs inside the
//! session, threads spawned afterwards start on their process default.

use crate::errors::AutomationError;
use crate::platforms::DesktopBackend;
use crate::types::DesktopHandle;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// This process's handle on a named desktop session.
///
/// Dropping the handle switches the thread back if needed and releases the
/// handle. The named desktop itself is only torn down by
/// [`SessionManager::cleanup`].
pub struct SessionHandle {
    name: String,
    desktop: DesktopHandle,
    original: DesktopHandle,
    active: bool,
    released: bool,
    backend: Arc<dyn DesktopBackend>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("name", &self.name)
            .field("desktop", &self.desktop)
            .field("active", &self.active)
            .finish()
    }
}

impl SessionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desktop(&self) -> DesktopHandle {
        self.desktop
    }

    /// Whether the calling thread was switched in through this handle.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Associate the calling OS thread with the session desktop.
    pub fn switch_in(&mut self) -> Result<(), AutomationError> {
        if self.active {
            return Ok(());
        }
        self.backend.set_thread_desktop(self.desktop)?;
        self.active = true;
        debug!("thread switched into desktop '{}'", self.name);
        Ok(())
    }

    /// Put the calling thread back on the desktop it had when the handle was opened.
    pub fn restore_original(&mut self) -> Result<(), AutomationError> {
        if !self.active {
            return Ok(());
        }
        self.backend.set_thread_desktop(self.original)?;
        self.active = false;
        debug!("thread restored from desktop '{}'", self.name);
        Ok(())
    }

    fn release(&mut self) -> Result<(), AutomationError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.backend.close_desktop(self.desktop)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.restore_original() {
            warn!("failed to restore thread desktop: {}", e);
        }
        if let Err(e) = self.release() {
            warn!("failed to close desktop '{}': {}", self.name, e);
        }
    }
}

/// Opens, creates and removes named desktop sessions.
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn DesktopBackend>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn DesktopBackend>) -> Self {
        Self { backend }
    }

    fn handle(&self, name: &str, desktop: DesktopHandle) -> Result<SessionHandle, AutomationError> {
        let original = match self.backend.thread_desktop() {
            Ok(original) => original,
            Err(e) => {
                let _ = self.backend.close_desktop(desktop);
                return Err(e);
            }
        };
        Ok(SessionHandle {
            name: name.to_string(),
            desktop,
            original,
            active: false,
            released: false,
            backend: self.backend.clone(),
        })
    }

    /// Open the named desktop, creating it if it does not exist yet.
    #[instrument(level = "debug", skip(self))]
    pub fn open_or_create(&self, name: &str) -> Result<SessionHandle, AutomationError> {
        if let Some(handle) = self.open_existing(name)? {
            return Ok(handle);
        }
        let desktop = self.backend.create_desktop(name)?;
        info!("created desktop session '{}'", name);
        self.handle(name, desktop)
    }

    /// Open the named desktop without creating it.
    #[instrument(level = "debug", skip(self))]
    pub fn open_existing(&self, name: &str) -> Result<Option<SessionHandle>, AutomationError> {
        match self.backend.open_desktop(name)? {
            Some(desktop) => Ok(Some(self.handle(name, desktop)?)),
            None => Ok(None),
        }
    }

    /// Make sure the named session exists. The local handle is released on
    /// return; the named object persists.
    pub fn ensure(&self, name: &str) -> Result<(), AutomationError> {
        self.open_or_create(name).map(drop)
    }

    /// Tear the named session down. Returns `false` when there was nothing to remove.
    #[instrument(level = "debug", skip(self))]
    pub fn cleanup(&self, name: &str) -> Result<bool, AutomationError> {
        let Some(mut handle) = self.open_existing(name)? else {
            debug!("no desktop '{}' to clean up", name);
            return Ok(false);
        };
        handle.restore_original()?;
        handle.released = true;
        self.backend.remove_desktop(handle.desktop)?;
        info!("removed desktop session '{}'", name);
        Ok(true)
    }
}
