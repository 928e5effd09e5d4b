//! RAII wrappers and thread-safety shims for native handles

use crate::errors::AutomationError;
use crate::types::DesktopHandle;
use std::sync::Arc;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::StationsAndDesktops::HDESK;

/// RAII wrapper for a kernel HANDLE
pub(crate) struct HandleGuard(pub(crate) HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        unsafe {
            if !self.0.is_invalid() {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

/// Thread-safe wrapper for a UI Automation element
#[derive(Clone)]
pub(crate) struct ThreadSafeWinUIElement(pub(crate) Arc<uiautomation::UIElement>);

// Safety: elements are only used from the single engine thread after COM is
// initialised in the multithreaded apartment.
unsafe impl Send for ThreadSafeWinUIElement {}
unsafe impl Sync for ThreadSafeWinUIElement {}

/// Thread-safe wrapper for the UI Automation client
pub(crate) struct ThreadSafeWinUIAutomation(pub(crate) uiautomation::UIAutomation);

// Safety: UIAutomation is free-threaded once COM is initialised.
unsafe impl Send for ThreadSafeWinUIAutomation {}
unsafe impl Sync for ThreadSafeWinUIAutomation {}

pub(crate) fn to_hdesk(handle: DesktopHandle) -> HDESK {
    HDESK(handle.0 as *mut std::ffi::c_void)
}

pub(crate) fn from_hdesk(handle: HDESK) -> DesktopHandle {
    DesktopHandle(handle.0 as isize)
}

impl From<uiautomation::Error> for AutomationError {
    fn from(error: uiautomation::Error) -> Self {
        AutomationError::PlatformError(format!("UIAutomation error: {error}"))
    }
}
