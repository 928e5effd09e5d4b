//! Windows platform implementation
//!
//! Desktop objects and process creation go through Win32, the element tree
//! through UI Automation (the `uiautomation` crate), and legacy input through
//! posted window messages.

pub mod desktop;
pub mod element;
pub mod engine;
pub mod input;
pub(crate) mod types;
pub(crate) mod utils;

pub use desktop::WindowsDesktops;
pub use element::WindowsUIElement;
pub use engine::WindowsEngine;
pub use input::PostMessageInput;

use crate::errors::AutomationError;
use crate::platforms::Platform;
use std::sync::Arc;

pub fn create_platform() -> Result<Platform, AutomationError> {
    Ok(Platform {
        desktops: Arc::new(WindowsDesktops::new()),
        accessibility: Arc::new(WindowsEngine::new()),
        input: Arc::new(PostMessageInput::new()),
    })
}
