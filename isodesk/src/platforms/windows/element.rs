#![allow(clippy::arc_with_non_send_sync)]

use super::types::{ThreadSafeWinUIAutomation, ThreadSafeWinUIElement};
use crate::element::{UIElement, UIElementImpl};
use crate::errors::AutomationError;
use crate::types::{Capability, Rect, ScrollDirection};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;
use uiautomation::patterns;
use uiautomation::types::ScrollAmount;

/// MSAA state bit marking the default push button of a dialog.
const STATE_SYSTEM_DEFAULT: u32 = 0x100;

#[derive(Clone)]
pub struct WindowsUIElement {
    pub(crate) element: ThreadSafeWinUIElement,
    pub(crate) automation: Arc<ThreadSafeWinUIAutomation>,
}

impl Debug for WindowsUIElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsUIElement")
            .field("name", &self.element.0.get_name().ok())
            .field("control_type", &self.control_type())
            .finish()
    }
}

fn non_empty(value: uiautomation::Result<String>) -> Option<String> {
    value.ok().filter(|s| !s.is_empty())
}

/// Pattern lookup failures mean "not supported"; anything after that is a platform error.
fn unsupported<E: std::fmt::Display>(pattern: &str) -> impl FnOnce(E) -> AutomationError + '_ {
    move |e| AutomationError::UnsupportedOperation(format!("{pattern} not available: {e}"))
}

fn platform(e: uiautomation::Error) -> AutomationError {
    AutomationError::PlatformError(e.to_string())
}

impl WindowsUIElement {
    pub(crate) fn new(
        element: uiautomation::UIElement,
        automation: Arc<ThreadSafeWinUIAutomation>,
    ) -> Self {
        Self {
            element: ThreadSafeWinUIElement(Arc::new(element)),
            automation,
        }
    }

    fn wrap(&self, element: uiautomation::UIElement) -> UIElement {
        UIElement::new(Box::new(Self::new(element, self.automation.clone())))
    }

    fn value_pattern(&self) -> Result<patterns::UIValuePattern, AutomationError> {
        self.element
            .0
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(unsupported("ValuePattern"))
    }
}

impl UIElementImpl for WindowsUIElement {
    fn name(&self) -> Option<String> {
        non_empty(self.element.0.get_name())
    }

    fn automation_id(&self) -> Option<String> {
        non_empty(self.element.0.get_automation_id())
    }

    fn class_name(&self) -> Option<String> {
        non_empty(self.element.0.get_classname())
    }

    fn control_type(&self) -> String {
        self.element
            .0
            .get_control_type()
            .map(|t| t.to_string())
            .unwrap_or_default()
    }

    fn bounds(&self) -> Result<Rect, AutomationError> {
        let rect = self
            .element
            .0
            .get_bounding_rectangle()
            .map_err(|e| AutomationError::ElementNotFound(e.to_string()))?;
        Ok(Rect::new(
            rect.get_left(),
            rect.get_top(),
            rect.get_width(),
            rect.get_height(),
        ))
    }

    fn process_id(&self) -> Result<u32, AutomationError> {
        self.element.0.get_process_id().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to get process ID for element: {e}"))
        })
    }

    fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        let walker = self.automation.0.get_control_view_walker().map_err(platform)?;
        let mut out = Vec::new();
        let mut next = walker.get_first_child(&self.element.0).ok();
        while let Some(child) = next {
            next = walker.get_next_sibling(&child).ok();
            out.push(self.wrap(child));
        }
        Ok(out)
    }

    fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        let walker = self.automation.0.get_control_view_walker().map_err(platform)?;
        match walker.get_parent(&self.element.0) {
            Ok(parent) => Ok(Some(self.wrap(parent))),
            Err(e) => {
                debug!("control view parent lookup failed: {}", e);
                Ok(None)
            }
        }
    }

    fn has_capability(&self, capability: Capability) -> bool {
        let el = &self.element.0;
        match capability {
            Capability::Invoke => el.get_pattern::<patterns::UIInvokePattern>().is_ok(),
            Capability::SelectItem => el.get_pattern::<patterns::UISelectionItemPattern>().is_ok(),
            Capability::Toggle => el.get_pattern::<patterns::UITogglePattern>().is_ok(),
            Capability::LegacyDefaultAction => {
                el.get_pattern::<patterns::UILegacyIAccessiblePattern>().is_ok()
            }
            Capability::SetValue => el.get_pattern::<patterns::UIValuePattern>().is_ok(),
            Capability::Scroll => el.get_pattern::<patterns::UIScrollPattern>().is_ok(),
        }
    }

    fn focus(&self) -> Result<(), AutomationError> {
        self.element.0.set_focus().map_err(platform)
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        self.element
            .0
            .get_pattern::<patterns::UIInvokePattern>()
            .map_err(unsupported("InvokePattern"))?
            .invoke()
            .map_err(platform)
    }

    fn select(&self) -> Result<(), AutomationError> {
        self.element
            .0
            .get_pattern::<patterns::UISelectionItemPattern>()
            .map_err(unsupported("SelectionItemPattern"))?
            .select()
            .map_err(platform)
    }

    fn toggle(&self) -> Result<(), AutomationError> {
        self.element
            .0
            .get_pattern::<patterns::UITogglePattern>()
            .map_err(unsupported("TogglePattern"))?
            .toggle()
            .map_err(platform)
    }

    fn do_default_action(&self) -> Result<(), AutomationError> {
        self.element
            .0
            .get_pattern::<patterns::UILegacyIAccessiblePattern>()
            .map_err(unsupported("LegacyIAccessiblePattern"))?
            .do_default_action()
            .map_err(platform)
    }

    fn value(&self) -> Result<String, AutomationError> {
        self.value_pattern()?.get_value().map_err(platform)
    }

    fn is_read_only(&self) -> Result<bool, AutomationError> {
        self.value_pattern()?.is_readonly().map_err(platform)
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        let pattern = self.value_pattern()?;
        if pattern.is_readonly().unwrap_or(false) {
            return Err(AutomationError::ReadOnly(self.name().unwrap_or_default()));
        }
        pattern.set_value(value).map_err(platform)
    }

    fn scroll(&self, direction: ScrollDirection) -> Result<(), AutomationError> {
        let vertical = match direction {
            ScrollDirection::Decrement => ScrollAmount::SmallDecrement,
            ScrollDirection::Increment => ScrollAmount::SmallIncrement,
        };
        self.element
            .0
            .get_pattern::<patterns::UIScrollPattern>()
            .map_err(unsupported("ScrollPattern"))?
            .scroll(ScrollAmount::NoAmount, vertical)
            .map_err(platform)
    }

    fn is_default_button(&self) -> bool {
        if !self.control_type().eq_ignore_ascii_case("button") {
            return false;
        }
        self.element
            .0
            .get_pattern::<patterns::UILegacyIAccessiblePattern>()
            .and_then(|p| p.get_state())
            .map(|state| state & STATE_SYSTEM_DEFAULT != 0)
            .unwrap_or(false)
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
