use crate::errors::AutomationError;
use crate::selector::Query;
use crate::types::{Capability, Rect, ScrollDirection};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Represents a node in an application's accessibility tree.
///
/// A `UIElement` is a live reference: properties and capabilities are read
/// from the platform on every call and never cached.
#[derive(Debug)]
pub struct UIElement {
    inner: Box<dyn UIElementImpl>,
}

/// Property snapshot of an element, emitted as JSON by the inspection commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializableUIElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "automationId", skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(rename = "className", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(rename = "controlType")]
    pub control_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(rename = "processId", skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub capabilities: Vec<String>,
}

impl From<&UIElement> for SerializableUIElement {
    fn from(element: &UIElement) -> Self {
        const ALL: [Capability; 6] = [
            Capability::Invoke,
            Capability::SelectItem,
            Capability::Toggle,
            Capability::LegacyDefaultAction,
            Capability::SetValue,
            Capability::Scroll,
        ];
        Self {
            name: element.name(),
            automation_id: element.automation_id(),
            class_name: element.class_name(),
            control_type: element.control_type(),
            bounds: element.bounds().ok(),
            process_id: element.process_id().ok(),
            capabilities: ALL
                .iter()
                .filter(|c| element.has_capability(**c))
                .map(|c| format!("{c:?}"))
                .collect(),
        }
    }
}

/// Interface for platform-specific element implementations.
///
/// Capability methods return `AutomationError::UnsupportedOperation` when the
/// element does not expose the corresponding pattern.
pub trait UIElementImpl: Send + Sync + Debug {
    fn name(&self) -> Option<String>;
    fn automation_id(&self) -> Option<String>;
    fn class_name(&self) -> Option<String>;
    fn control_type(&self) -> String;
    fn bounds(&self) -> Result<Rect, AutomationError>;
    fn process_id(&self) -> Result<u32, AutomationError>;

    fn children(&self) -> Result<Vec<UIElement>, AutomationError>;
    /// Parent in the control view of the tree; `None` at the root.
    fn parent(&self) -> Result<Option<UIElement>, AutomationError>;

    /// Pre-order descendants (the element itself excluded), at most `limit`.
    fn descendants(&self, limit: usize) -> Result<Vec<UIElement>, AutomationError> {
        let mut out = Vec::new();
        let mut stack: Vec<UIElement> = self.children()?.into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if out.len() >= limit {
                break;
            }
            // A failing subtree is skipped, not fatal.
            if let Ok(children) = next.children() {
                stack.extend(children.into_iter().rev());
            }
            out.push(next);
        }
        Ok(out)
    }

    /// Descendants matching the structured keys of `query`, in pre-order, at most `limit`.
    fn find_all(&self, query: &Query, limit: usize) -> Result<Vec<UIElement>, AutomationError> {
        let mut out = Vec::new();
        let mut stack: Vec<UIElement> = self.children()?.into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if out.len() >= limit {
                break;
            }
            if let Ok(children) = next.children() {
                stack.extend(children.into_iter().rev());
            }
            if query.matches_structured(&next) {
                out.push(next);
            }
        }
        Ok(out)
    }

    fn has_capability(&self, capability: Capability) -> bool;

    fn focus(&self) -> Result<(), AutomationError>;
    fn invoke(&self) -> Result<(), AutomationError>;
    fn select(&self) -> Result<(), AutomationError>;
    fn toggle(&self) -> Result<(), AutomationError>;
    fn do_default_action(&self) -> Result<(), AutomationError>;
    fn value(&self) -> Result<String, AutomationError>;
    fn is_read_only(&self) -> Result<bool, AutomationError>;
    fn set_value(&self, value: &str) -> Result<(), AutomationError>;
    fn scroll(&self, direction: ScrollDirection) -> Result<(), AutomationError>;

    /// Whether the element is the default push button of its dialog.
    fn is_default_button(&self) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl>;
    fn as_any(&self) -> &dyn std::any::Any;
}

impl UIElement {
    pub fn new(impl_: Box<dyn UIElementImpl>) -> Self {
        Self { inner: impl_ }
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name()
    }

    pub fn automation_id(&self) -> Option<String> {
        self.inner.automation_id()
    }

    pub fn class_name(&self) -> Option<String> {
        self.inner.class_name()
    }

    pub fn control_type(&self) -> String {
        self.inner.control_type()
    }

    pub fn bounds(&self) -> Result<Rect, AutomationError> {
        self.inner.bounds()
    }

    pub fn process_id(&self) -> Result<u32, AutomationError> {
        self.inner.process_id()
    }

    pub fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.children()
    }

    pub fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        self.inner.parent()
    }

    pub fn descendants(&self, limit: usize) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.descendants(limit)
    }

    pub fn find_all(&self, query: &Query, limit: usize) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.find_all(query, limit)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.inner.has_capability(capability)
    }

    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner.focus()
    }

    pub fn invoke(&self) -> Result<(), AutomationError> {
        self.inner.invoke()
    }

    pub fn select(&self) -> Result<(), AutomationError> {
        self.inner.select()
    }

    pub fn toggle(&self) -> Result<(), AutomationError> {
        self.inner.toggle()
    }

    pub fn do_default_action(&self) -> Result<(), AutomationError> {
        self.inner.do_default_action()
    }

    pub fn value(&self) -> Result<String, AutomationError> {
        self.inner.value()
    }

    pub fn is_read_only(&self) -> Result<bool, AutomationError> {
        self.inner.is_read_only()
    }

    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value)
    }

    pub fn scroll(&self, direction: ScrollDirection) -> Result<(), AutomationError> {
        self.inner.scroll(direction)
    }

    pub fn is_default_button(&self) -> bool {
        self.inner.is_default_button()
    }

    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }

    pub fn to_serializable(&self) -> SerializableUIElement {
        SerializableUIElement::from(self)
    }
}

impl Clone for UIElement {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}
