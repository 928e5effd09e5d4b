use crate::errors::AutomationError;
use crate::types::{DesktopHandle, RawInput, Rect, WindowHandle, WindowRef};
use crate::UIElement;
use std::sync::Arc;

pub mod memory;
#[cfg(target_os = "windows")]
pub mod windows;

/// Window-station level primitives: named desktops, window enumeration and
/// process creation.
pub trait DesktopBackend: Send + Sync {
    /// Open an existing desktop by name; `None` when no such desktop exists.
    fn open_desktop(&self, name: &str) -> Result<Option<DesktopHandle>, AutomationError>;

    /// Create the named desktop, or open it if it already exists.
    fn create_desktop(&self, name: &str) -> Result<DesktopHandle, AutomationError>;

    /// The desktop the calling OS thread is currently assigned to.
    fn thread_desktop(&self) -> Result<DesktopHandle, AutomationError>;

    /// Assign the calling OS thread to `desktop`. Other threads are unaffected.
    fn set_thread_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError>;

    /// Release this process's handle. The named object outlives it.
    fn close_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError>;

    /// Release the handle and tear the named object down where the platform allows it.
    fn remove_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError>;

    /// Top-level windows of `desktop`, or of the interactive desktop when `None`.
    fn enumerate_windows(
        &self,
        desktop: Option<DesktopHandle>,
    ) -> Result<Vec<WindowRef>, AutomationError>;

    /// Client area of `window` in screen coordinates.
    fn client_rect(&self, window: WindowHandle) -> Result<Rect, AutomationError>;

    /// Native activation, used when accessibility focus fails.
    fn activate_window(&self, window: WindowHandle) -> Result<(), AutomationError>;

    /// Spawn `path` with `args` on the named desktop and return its pid.
    fn launch_process(
        &self,
        path: &str,
        args: &[String],
        desktop_name: &str,
    ) -> Result<u32, AutomationError>;
}

/// Accessibility-tree entry points.
pub trait AccessibilityEngine: Send + Sync {
    /// Root element of a top-level window.
    fn element_from_window(&self, window: WindowHandle) -> Result<UIElement, AutomationError>;

    /// The element holding keyboard focus on the calling thread's desktop.
    fn focused_element(&self) -> Result<UIElement, AutomationError>;
}

/// Delivery of low-level input events. Only the legacy fallback path uses this.
pub trait InputSink: Send + Sync {
    fn post(&self, window: WindowHandle, input: RawInput) -> Result<(), AutomationError>;
}

/// The three platform seams bundled together.
#[derive(Clone)]
pub struct Platform {
    pub desktops: Arc<dyn DesktopBackend>,
    pub accessibility: Arc<dyn AccessibilityEngine>,
    pub input: Arc<dyn InputSink>,
}

impl Platform {
    /// Wire every seam to the same backend object.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: DesktopBackend + AccessibilityEngine + InputSink + 'static,
    {
        Self {
            desktops: backend.clone(),
            accessibility: backend.clone(),
            input: backend,
        }
    }
}

/// Create the native platform for the current OS
pub fn create_platform() -> Result<Platform, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        windows::create_platform()
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "isolated desktops are only implemented for Windows".to_string(),
        ))
    }
}
