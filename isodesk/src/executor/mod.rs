//! Action execution: resolve a target, try accessibility capabilities in
//! order, then fall back to gated legacy input.
//!
//! Public operations report success as `bool`; errors are logged here and
//! never returned to the caller.

pub mod legacy;

use crate::coords::CoordinateTransform;
use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::keys::KeyChord;
use crate::locator::ElementLocator;
use crate::platforms::AccessibilityEngine;
use crate::resolver::WindowResolver;
use crate::selector::Query;
use crate::types::{Capability, MouseButton, Point, ScrollDirection, WindowRef};
use legacy::{LegacyInput, PathPoint, MAX_SCROLL_NOTCHES};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// What to do with a resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Press, pick or flip the element, whichever it supports.
    Activate,
    SetValue { text: String, append: bool },
    Scroll { direction: ScrollDirection, notches: u32 },
}

/// A strategy could not carry out the action; the chain moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("not supported: {0}")]
pub struct NotSupported(pub String);

impl From<AutomationError> for NotSupported {
    fn from(error: AutomationError) -> Self {
        NotSupported(error.to_string())
    }
}

/// One tier of capability dispatch.
pub trait ActionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this tier handles `action` at all.
    fn accepts(&self, action: &Action) -> bool;

    fn try_execute(&self, target: &UIElement, action: &Action) -> Result<(), NotSupported>;
}

fn require(target: &UIElement, capability: Capability) -> Result<(), NotSupported> {
    if target.has_capability(capability) {
        Ok(())
    } else {
        Err(NotSupported(format!("{capability:?} not exposed")))
    }
}

pub struct InvokeStrategy;

impl ActionStrategy for InvokeStrategy {
    fn name(&self) -> &'static str {
        "invoke"
    }

    fn accepts(&self, action: &Action) -> bool {
        matches!(action, Action::Activate)
    }

    fn try_execute(&self, target: &UIElement, _action: &Action) -> Result<(), NotSupported> {
        require(target, Capability::Invoke)?;
        Ok(target.invoke()?)
    }
}

pub struct SelectItemStrategy;

impl ActionStrategy for SelectItemStrategy {
    fn name(&self) -> &'static str {
        "select-item"
    }

    fn accepts(&self, action: &Action) -> bool {
        matches!(action, Action::Activate)
    }

    fn try_execute(&self, target: &UIElement, _action: &Action) -> Result<(), NotSupported> {
        require(target, Capability::SelectItem)?;
        Ok(target.select()?)
    }
}

pub struct ToggleStrategy;

impl ActionStrategy for ToggleStrategy {
    fn name(&self) -> &'static str {
        "toggle"
    }

    fn accepts(&self, action: &Action) -> bool {
        matches!(action, Action::Activate)
    }

    fn try_execute(&self, target: &UIElement, _action: &Action) -> Result<(), NotSupported> {
        require(target, Capability::Toggle)?;
        Ok(target.toggle()?)
    }
}

pub struct LegacyDefaultActionStrategy;

impl ActionStrategy for LegacyDefaultActionStrategy {
    fn name(&self) -> &'static str {
        "default-action"
    }

    fn accepts(&self, action: &Action) -> bool {
        matches!(action, Action::Activate)
    }

    fn try_execute(&self, target: &UIElement, _action: &Action) -> Result<(), NotSupported> {
        require(target, Capability::LegacyDefaultAction)?;
        Ok(target.do_default_action()?)
    }
}

pub struct SetValueStrategy;

impl ActionStrategy for SetValueStrategy {
    fn name(&self) -> &'static str {
        "set-value"
    }

    fn accepts(&self, action: &Action) -> bool {
        matches!(action, Action::SetValue { .. })
    }

    fn try_execute(&self, target: &UIElement, action: &Action) -> Result<(), NotSupported> {
        let Action::SetValue { text, append } = action else {
            return Err(NotSupported("not a value action".to_string()));
        };
        require(target, Capability::SetValue)?;
        if target.is_read_only()? {
            return Err(NotSupported("control is read-only".to_string()));
        }
        let value = if *append {
            format!("{}{}", target.value()?, text)
        } else {
            text.clone()
        };
        Ok(target.set_value(&value)?)
    }
}

/// Scrolls the nearest scrollable ancestor of the target, one notch per step.
pub struct ScrollStrategy {
    locator: ElementLocator,
}

impl ScrollStrategy {
    pub fn new(locator: ElementLocator) -> Self {
        Self { locator }
    }
}

impl ActionStrategy for ScrollStrategy {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn accepts(&self, action: &Action) -> bool {
        matches!(action, Action::Scroll { .. })
    }

    fn try_execute(&self, target: &UIElement, action: &Action) -> Result<(), NotSupported> {
        let Action::Scroll { direction, notches } = action else {
            return Err(NotSupported("not a scroll action".to_string()));
        };
        if *notches > MAX_SCROLL_NOTCHES {
            return Err(NotSupported(format!("{notches} notches exceed {MAX_SCROLL_NOTCHES}")));
        }
        let scrollable = self
            .locator
            .find_scrollable_ancestor(target)
            .ok_or_else(|| NotSupported("no scrollable ancestor".to_string()))?;
        for _ in 0..*notches {
            scrollable.scroll(*direction)?;
        }
        Ok(())
    }
}

/// Ordered capability tiers; the first that succeeds wins.
pub struct CapabilityChain {
    strategies: Vec<Box<dyn ActionStrategy>>,
}

impl CapabilityChain {
    pub fn new(strategies: Vec<Box<dyn ActionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Invoke, SelectItem, Toggle, LegacyDefaultAction, SetValue, Scroll.
    pub fn standard(locator: ElementLocator) -> Self {
        Self::new(vec![
            Box::new(InvokeStrategy),
            Box::new(SelectItemStrategy),
            Box::new(ToggleStrategy),
            Box::new(LegacyDefaultActionStrategy),
            Box::new(SetValueStrategy),
            Box::new(ScrollStrategy::new(locator)),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Name of the tier that carried out `action`.
    pub fn execute(&self, target: &UIElement, action: &Action) -> Result<&'static str, NotSupported> {
        let mut reasons = Vec::new();
        for strategy in self.strategies.iter().filter(|s| s.accepts(action)) {
            if let Err(e) = target.focus() {
                debug!("focus before {} failed: {}", strategy.name(), e);
            }
            match strategy.try_execute(target, action) {
                Ok(()) => {
                    debug!("{:?} handled by {}", action, strategy.name());
                    return Ok(strategy.name());
                }
                Err(NotSupported(reason)) => reasons.push(format!("{}: {}", strategy.name(), reason)),
            }
        }
        Err(NotSupported(reasons.join("; ")))
    }
}

pub struct ActionExecutor {
    resolver: WindowResolver,
    locator: ElementLocator,
    chain: CapabilityChain,
    transform: CoordinateTransform,
    legacy: LegacyInput,
    accessibility: Arc<dyn AccessibilityEngine>,
}

fn report(operation: &str, pid: u32, result: Result<(), AutomationError>) -> bool {
    match result {
        Ok(()) => {
            info!("{} on pid {} succeeded", operation, pid);
            true
        }
        Err(e) => {
            warn!("{} on pid {} failed: {}", operation, pid, e);
            false
        }
    }
}

fn unsupported(e: NotSupported) -> AutomationError {
    AutomationError::UnsupportedOperation(e.0)
}

impl ActionExecutor {
    pub fn new(
        resolver: WindowResolver,
        locator: ElementLocator,
        transform: CoordinateTransform,
        legacy: LegacyInput,
        accessibility: Arc<dyn AccessibilityEngine>,
    ) -> Self {
        Self {
            resolver,
            chain: CapabilityChain::standard(locator),
            locator,
            transform,
            legacy,
            accessibility,
        }
    }

    pub fn resolver(&self) -> &WindowResolver {
        &self.resolver
    }

    pub fn locator(&self) -> &ElementLocator {
        &self.locator
    }

    fn target(&self, pid: u32) -> Result<(WindowRef, UIElement), AutomationError> {
        self.resolver.root_for_pid(pid)
    }

    fn resolve_query(&self, pid: u32, query: &Query) -> Result<UIElement, AutomationError> {
        let (_, root) = self.target(pid)?;
        self.locator
            .find_by_query(&root, query)?
            .ok_or_else(|| AutomationError::ElementNotFound(format!("no element matches '{query}'")))
    }

    /// Focused element of the calling thread's desktop, if it belongs to `pid`.
    fn focused_in(&self, pid: u32) -> Option<UIElement> {
        let focused = self.accessibility.focused_element().ok()?;
        (focused.process_id().ok() == Some(pid)).then_some(focused)
    }

    pub fn focus(&self, pid: u32) -> bool {
        report("focus", pid, self.resolver.focus_window(pid).map(drop))
    }

    /// Activate the element matching `query` (the window root when empty).
    #[instrument(level = "debug", skip(self), fields(query = %query))]
    pub fn invoke(&self, pid: u32, query: &Query) -> bool {
        let result = self.resolve_query(pid, query).and_then(|el| {
            self.chain
                .execute(&el, &Action::Activate)
                .map(drop)
                .map_err(unsupported)
        });
        report("invoke", pid, result)
    }

    /// Replace the value of the element matching `query`.
    #[instrument(level = "debug", skip(self, text), fields(query = %query))]
    pub fn set_value(&self, pid: u32, query: &Query, text: &str) -> bool {
        let action = Action::SetValue {
            text: text.to_string(),
            append: false,
        };
        let result = self.resolve_query(pid, query).and_then(|el| {
            self.chain.execute(&el, &action).map(drop).map_err(unsupported)
        });
        report("set-value", pid, result)
    }

    /// Activate the element under the point, else click through legacy input.
    #[instrument(level = "debug", skip(self))]
    pub fn click(&self, pid: u32, x: i32, y: i32) -> bool {
        let result = self.target(pid).and_then(|(window, root)| {
            let screen = self.transform.target_to_screen(window.handle, x, y)?;
            if let Some(element) = self.locator.find_at_point(&root, screen.x, screen.y)? {
                match self.chain.execute(&element, &Action::Activate) {
                    Ok(_) => return Ok(()),
                    Err(e) => debug!("capability click failed: {}", e),
                }
            } else {
                debug!("no element at ({}, {})", screen.x, screen.y);
            }
            self.legacy.click(window.handle, x, y, MouseButton::Left)
        });
        report("click", pid, result)
    }

    /// Append `text` to the focused or first editable control, else type it
    /// through legacy character input.
    #[instrument(level = "debug", skip(self, text))]
    pub fn type_text(&self, pid: u32, text: &str, delay_ms: u64) -> bool {
        let result = self.target(pid).and_then(|(window, root)| {
            let action = Action::SetValue {
                text: text.to_string(),
                append: true,
            };
            let candidates = self
                .focused_in(pid)
                .into_iter()
                .chain(self.locator.find_editable(&root)?);
            for element in candidates {
                match self.chain.execute(&element, &action) {
                    Ok(_) => return Ok(()),
                    Err(e) => debug!("capability typing failed: {}", e),
                }
            }
            self.legacy.type_text(window.handle, text, delay_ms)
        });
        report("type", pid, result)
    }

    /// A lone Enter activates the focused element or the default button;
    /// everything else is legacy key input.
    #[instrument(level = "debug", skip(self, chords))]
    pub fn hotkey(&self, pid: u32, chords: &[KeyChord]) -> bool {
        let result = self.target(pid).and_then(|(window, root)| {
            if let [chord] = chords {
                if chord.is_plain_enter() {
                    let candidates = self
                        .focused_in(pid)
                        .into_iter()
                        .chain(self.locator.find_default_button(&root)?);
                    for element in candidates {
                        if self.chain.execute(&element, &Action::Activate).is_ok() {
                            return Ok(());
                        }
                    }
                }
            }
            self.legacy.hotkeys(window.handle, chords)
        });
        report("hotkey", pid, result)
    }

    #[instrument(level = "debug", skip(self, path))]
    pub fn mouse_path(&self, pid: u32, path: &[PathPoint]) -> bool {
        let result = self
            .target(pid)
            .and_then(|(window, _)| self.legacy.mouse_path(window.handle, path));
        report("mouse-path", pid, result)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn drag(&self, pid: u32, from: Point, to: Point) -> bool {
        let result = self
            .target(pid)
            .and_then(|(window, _)| self.legacy.drag(window.handle, from, to));
        report("drag", pid, result)
    }

    /// Scroll by `delta` notches at a point: positive scrolls up. The element
    /// under the point, or the window root, is the starting point for the
    /// scrollable-ancestor search.
    #[instrument(level = "debug", skip(self))]
    pub fn scroll(&self, pid: u32, delta: i32, x: i32, y: i32) -> bool {
        let result = self.target(pid).and_then(|(window, root)| {
            if delta == 0 {
                return Ok(());
            }
            if delta.unsigned_abs() > MAX_SCROLL_NOTCHES {
                return Err(AutomationError::InvalidArgument(format!(
                    "scroll of {delta} notches exceeds {MAX_SCROLL_NOTCHES}"
                )));
            }
            let direction = if delta > 0 {
                ScrollDirection::Decrement
            } else {
                ScrollDirection::Increment
            };
            let screen = self.transform.target_to_screen(window.handle, x, y)?;
            let start = self
                .locator
                .find_at_point(&root, screen.x, screen.y)?
                .unwrap_or(root);
            let action = Action::Scroll {
                direction,
                notches: delta.unsigned_abs(),
            };
            match self.chain.execute(&start, &action) {
                Ok(_) => Ok(()),
                Err(e) => {
                    debug!("capability scroll failed: {}", e);
                    self.legacy.wheel(window.handle, x, y, delta)
                }
            }
        });
        report("scroll", pid, result)
    }
}
