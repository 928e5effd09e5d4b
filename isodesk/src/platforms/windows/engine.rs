#![allow(clippy::arc_with_non_send_sync)]

use super::element::WindowsUIElement;
use super::types::ThreadSafeWinUIAutomation;
use super::utils::create_ui_automation_with_com_init;
use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::platforms::AccessibilityEngine;
use crate::types::WindowHandle;
use std::sync::{Arc, Mutex, PoisonError};
use uiautomation::types::Handle;

/// UI Automation client bound to the calling thread's desktop.
///
/// The client is created on first use, after the command has switched the
/// thread into the session desktop: UI Automation only sees its thread's desktop.
#[derive(Default)]
pub struct WindowsEngine {
    automation: Mutex<Option<Arc<ThreadSafeWinUIAutomation>>>,
}

impl WindowsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn automation(&self) -> Result<Arc<ThreadSafeWinUIAutomation>, AutomationError> {
        let mut slot = self.automation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(automation) = slot.as_ref() {
            return Ok(automation.clone());
        }
        let automation = Arc::new(ThreadSafeWinUIAutomation(
            create_ui_automation_with_com_init()?,
        ));
        *slot = Some(automation.clone());
        Ok(automation)
    }

    fn wrap(automation: Arc<ThreadSafeWinUIAutomation>, element: uiautomation::UIElement) -> UIElement {
        UIElement::new(Box::new(WindowsUIElement::new(element, automation)))
    }
}

impl AccessibilityEngine for WindowsEngine {
    fn element_from_window(&self, window: WindowHandle) -> Result<UIElement, AutomationError> {
        let automation = self.automation()?;
        let element = automation
            .0
            .element_from_handle(Handle::from(window.0))
            .map_err(|e| {
                AutomationError::WindowNotFound(format!("no element for window {window}: {e}"))
            })?;
        Ok(Self::wrap(automation, element))
    }

    fn focused_element(&self) -> Result<UIElement, AutomationError> {
        let automation = self.automation()?;
        let element = automation
            .0
            .get_focused_element()
            .map_err(|e| AutomationError::ElementNotFound(e.to_string()))?;
        Ok(Self::wrap(automation, element))
    }
}
