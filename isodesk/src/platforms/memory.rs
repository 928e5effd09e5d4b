//! Scriptable in-memory desktop.
//!
//! Implements every platform seam against plain data so the engine can be
//! driven end to end without a window system. Desktops, windows and element
//! trees live in a shared state that outlives individual [`crate::Engine`]
//! instances, which is how tests model separate process invocations.

use crate::element::{UIElement, UIElementImpl};
use crate::errors::AutomationError;
use crate::platforms::{AccessibilityEngine, DesktopBackend, InputSink};
use crate::types::{
    Capability, DesktopHandle, RawInput, Rect, ScrollDirection, WindowHandle, WindowRef,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::ThreadId;
use tracing::debug;

const INTERACTIVE_DESKTOP: DesktopHandle = DesktopHandle(1);
const ERROR_FILE_NOT_FOUND: i32 = 2;
const ERROR_ACCESS_DENIED: i32 = 5;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Something that happened to an element, recorded for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Focused,
    Invoked,
    Selected,
    Toggled,
    DefaultAction,
    ValueSet(String),
    Scrolled(ScrollDirection),
}

struct MemoryNode {
    name: Option<String>,
    automation_id: Option<String>,
    class_name: Option<String>,
    control_type: String,
    bounds: Rect,
    process_id: u32,
    capabilities: HashSet<Capability>,
    failing: HashSet<Capability>,
    value: String,
    unreadable: bool,
    read_only: bool,
    default_button: bool,
    children: Vec<MemoryElement>,
    parent: Weak<Mutex<MemoryNode>>,
    actions: Vec<ElementAction>,
}

/// A node of an in-memory accessibility tree. Cloning shares the node.
#[derive(Clone)]
pub struct MemoryElement {
    node: Arc<Mutex<MemoryNode>>,
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = lock(&self.node);
        f.debug_struct("MemoryElement")
            .field("control_type", &node.control_type)
            .field("name", &node.name)
            .field("bounds", &node.bounds)
            .finish()
    }
}

impl MemoryElement {
    pub fn new(control_type: &str) -> Self {
        Self {
            node: Arc::new(Mutex::new(MemoryNode {
                name: None,
                automation_id: None,
                class_name: None,
                control_type: control_type.to_string(),
                bounds: Rect::default(),
                process_id: 0,
                capabilities: HashSet::new(),
                failing: HashSet::new(),
                value: String::new(),
                unreadable: false,
                read_only: false,
                default_button: false,
                children: Vec::new(),
                parent: Weak::new(),
                actions: Vec::new(),
            })),
        }
    }

    pub fn name(self, name: &str) -> Self {
        lock(&self.node).name = Some(name.to_string());
        self
    }

    pub fn automation_id(self, id: &str) -> Self {
        lock(&self.node).automation_id = Some(id.to_string());
        self
    }

    pub fn class_name(self, class: &str) -> Self {
        lock(&self.node).class_name = Some(class.to_string());
        self
    }

    pub fn bounds(self, bounds: Rect) -> Self {
        lock(&self.node).bounds = bounds;
        self
    }

    pub fn capability(self, capability: Capability) -> Self {
        lock(&self.node).capabilities.insert(capability);
        self
    }

    /// Advertise `capability` but fail when it is used.
    pub fn failing(self, capability: Capability) -> Self {
        {
            let mut node = lock(&self.node);
            node.capabilities.insert(capability);
            node.failing.insert(capability);
        }
        self
    }

    pub fn value(self, value: &str) -> Self {
        lock(&self.node).value = value.to_string();
        self
    }

    /// Accept writes but fail every read of the value.
    pub fn unreadable(self) -> Self {
        lock(&self.node).unreadable = true;
        self
    }

    pub fn read_only(self, read_only: bool) -> Self {
        lock(&self.node).read_only = read_only;
        self
    }

    pub fn default_button(self, is_default: bool) -> Self {
        lock(&self.node).default_button = is_default;
        self
    }

    pub fn child(self, child: MemoryElement) -> Self {
        self.push_child(child);
        self
    }

    pub fn push_child(&self, child: MemoryElement) {
        lock(&child.node).parent = Arc::downgrade(&self.node);
        lock(&self.node).children.push(child);
    }

    pub fn set_process_id_recursive(&self, pid: u32) {
        let children = {
            let mut node = lock(&self.node);
            node.process_id = pid;
            node.children.clone()
        };
        for child in children {
            child.set_process_id_recursive(pid);
        }
    }

    pub fn actions(&self) -> Vec<ElementAction> {
        lock(&self.node).actions.clone()
    }

    pub fn current_value(&self) -> String {
        lock(&self.node).value.clone()
    }

    pub fn is_same(&self, other: &MemoryElement) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn to_ui_element(&self) -> UIElement {
        UIElement::new(Box::new(MemoryUIElement {
            element: self.clone(),
        }))
    }

    fn perform(&self, capability: Capability, action: ElementAction) -> Result<(), AutomationError> {
        let mut node = lock(&self.node);
        if !node.capabilities.contains(&capability) {
            return Err(AutomationError::UnsupportedOperation(format!(
                "element does not support {capability:?}"
            )));
        }
        if node.failing.contains(&capability) {
            return Err(AutomationError::PlatformError(format!(
                "{capability:?} failed"
            )));
        }
        node.actions.push(action);
        Ok(())
    }
}

/// `UIElementImpl` over a [`MemoryElement`].
#[derive(Debug, Clone)]
pub struct MemoryUIElement {
    element: MemoryElement,
}

impl MemoryUIElement {
    pub fn element(&self) -> &MemoryElement {
        &self.element
    }
}

impl UIElementImpl for MemoryUIElement {
    fn name(&self) -> Option<String> {
        lock(&self.element.node).name.clone()
    }

    fn automation_id(&self) -> Option<String> {
        lock(&self.element.node).automation_id.clone()
    }

    fn class_name(&self) -> Option<String> {
        lock(&self.element.node).class_name.clone()
    }

    fn control_type(&self) -> String {
        lock(&self.element.node).control_type.clone()
    }

    fn bounds(&self) -> Result<Rect, AutomationError> {
        Ok(lock(&self.element.node).bounds)
    }

    fn process_id(&self) -> Result<u32, AutomationError> {
        Ok(lock(&self.element.node).process_id)
    }

    fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        let children = lock(&self.element.node).children.clone();
        Ok(children.iter().map(MemoryElement::to_ui_element).collect())
    }

    fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        let parent = lock(&self.element.node).parent.upgrade();
        Ok(parent.map(|node| MemoryElement { node }.to_ui_element()))
    }

    fn has_capability(&self, capability: Capability) -> bool {
        lock(&self.element.node).capabilities.contains(&capability)
    }

    fn focus(&self) -> Result<(), AutomationError> {
        lock(&self.element.node).actions.push(ElementAction::Focused);
        Ok(())
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        self.element
            .perform(Capability::Invoke, ElementAction::Invoked)
    }

    fn select(&self) -> Result<(), AutomationError> {
        self.element
            .perform(Capability::SelectItem, ElementAction::Selected)
    }

    fn toggle(&self) -> Result<(), AutomationError> {
        self.element
            .perform(Capability::Toggle, ElementAction::Toggled)
    }

    fn do_default_action(&self) -> Result<(), AutomationError> {
        self.element
            .perform(Capability::LegacyDefaultAction, ElementAction::DefaultAction)
    }

    fn value(&self) -> Result<String, AutomationError> {
        let node = lock(&self.element.node);
        if !node.capabilities.contains(&Capability::SetValue) {
            return Err(AutomationError::UnsupportedOperation(
                "element does not expose a value".to_string(),
            ));
        }
        if node.unreadable {
            return Err(AutomationError::PlatformError("value read failed".to_string()));
        }
        Ok(node.value.clone())
    }

    fn is_read_only(&self) -> Result<bool, AutomationError> {
        Ok(lock(&self.element.node).read_only)
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        if lock(&self.element.node).read_only {
            return Err(AutomationError::ReadOnly(
                self.name().unwrap_or_default(),
            ));
        }
        self.element.perform(
            Capability::SetValue,
            ElementAction::ValueSet(value.to_string()),
        )?;
        lock(&self.element.node).value = value.to_string();
        Ok(())
    }

    fn scroll(&self, direction: ScrollDirection) -> Result<(), AutomationError> {
        self.element
            .perform(Capability::Scroll, ElementAction::Scrolled(direction))
    }

    fn is_default_button(&self) -> bool {
        lock(&self.element.node).default_button
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Application template instantiated when its executable is launched.
#[derive(Clone)]
pub struct MemoryApp {
    title: String,
    bounds: Rect,
    client: Option<Rect>,
    reveal_after: u32,
    build: Arc<dyn Fn() -> MemoryElement + Send + Sync>,
}

impl MemoryApp {
    pub fn new<F>(title: &str, build: F) -> Self
    where
        F: Fn() -> MemoryElement + Send + Sync + 'static,
    {
        Self {
            title: title.to_string(),
            bounds: Rect::new(0, 0, 800, 600),
            client: None,
            reveal_after: 0,
            build: Arc::new(build),
        }
    }

    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn client(mut self, client: Rect) -> Self {
        self.client = Some(client);
        self
    }

    /// Hide the window from the first `polls` enumerations after launch.
    pub fn reveal_after(mut self, polls: u32) -> Self {
        self.reveal_after = polls;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub pid: u32,
    pub path: String,
    pub args: Vec<String>,
    pub desktop: String,
}

struct MemoryWindow {
    handle: WindowHandle,
    pid: u32,
    owner_name: String,
    title: String,
    bounds: Rect,
    client: Rect,
    desktop: Option<String>,
    root: MemoryElement,
    hidden_polls: u32,
}

struct MemoryState {
    next_handle: isize,
    next_pid: u32,
    desktops: HashSet<String>,
    desktops_created: usize,
    open_handles: HashMap<isize, String>,
    thread_desktops: HashMap<ThreadId, DesktopHandle>,
    windows: Vec<MemoryWindow>,
    apps: HashMap<String, MemoryApp>,
    launches: Vec<LaunchRecord>,
    input_log: Vec<(WindowHandle, RawInput)>,
    activations: Vec<WindowHandle>,
    focused: Option<MemoryElement>,
    deny_desktops: bool,
    launch_failure: Option<i32>,
    fail_input: bool,
    fail_input_at: Option<usize>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            next_handle: 0x100,
            next_pid: 4000,
            desktops: HashSet::new(),
            desktops_created: 0,
            open_handles: HashMap::new(),
            thread_desktops: HashMap::new(),
            windows: Vec::new(),
            apps: HashMap::new(),
            launches: Vec::new(),
            input_log: Vec::new(),
            activations: Vec::new(),
            focused: None,
            deny_desktops: false,
            launch_failure: None,
            fail_input: false,
            fail_input_at: None,
        }
    }
}

impl MemoryState {
    fn allocate_handle(&mut self) -> isize {
        self.next_handle += 4;
        self.next_handle
    }

    fn open_handle(&mut self, name: &str) -> DesktopHandle {
        let raw = self.allocate_handle();
        self.open_handles.insert(raw, name.to_string());
        DesktopHandle(raw)
    }

    fn desktop_name(&self, desktop: DesktopHandle) -> Result<String, AutomationError> {
        self.open_handles.get(&desktop.0).cloned().ok_or_else(|| {
            AutomationError::PlatformError(format!("invalid desktop handle {}", desktop.0))
        })
    }

    fn window(&self, handle: WindowHandle) -> Result<&MemoryWindow, AutomationError> {
        self.windows
            .iter()
            .find(|w| w.handle == handle)
            .ok_or_else(|| AutomationError::WindowNotFound(format!("no window {handle}")))
    }
}

/// Shared, cloneable in-memory platform.
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    state: Arc<Mutex<MemoryState>>,
}

impl fmt::Debug for MemoryPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryPlatform")
            .field("desktops", &state.desktops)
            .field("windows", &state.windows.len())
            .finish()
    }
}

fn exe_key(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_lowercase()
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    pub fn register_app(&self, exe: &str, app: MemoryApp) {
        self.state().apps.insert(exe_key(exe), app);
    }

    /// Place a window directly, on the named desktop or the interactive one.
    pub fn add_window(
        &self,
        desktop: Option<&str>,
        pid: u32,
        title: &str,
        bounds: Rect,
        root: MemoryElement,
    ) -> WindowHandle {
        root.set_process_id_recursive(pid);
        let mut state = self.state();
        let handle = WindowHandle(state.allocate_handle());
        state.windows.push(MemoryWindow {
            handle,
            pid,
            owner_name: format!("app{pid}.exe"),
            title: title.to_string(),
            bounds,
            client: bounds,
            desktop: desktop.map(str::to_string),
            root,
            hidden_polls: 0,
        });
        handle
    }

    pub fn set_client_rect(&self, window: WindowHandle, client: Rect) {
        if let Some(w) = self.state().windows.iter_mut().find(|w| w.handle == window) {
            w.client = client;
        }
    }

    pub fn set_focused(&self, element: Option<MemoryElement>) {
        self.state().focused = element;
    }

    pub fn deny_desktop_creation(&self, deny: bool) {
        self.state().deny_desktops = deny;
    }

    pub fn fail_launches(&self, os_code: Option<i32>) {
        self.state().launch_failure = os_code;
    }

    pub fn fail_input(&self, fail: bool) {
        self.state().fail_input = fail;
    }

    /// Fail once, on the post that would become event number `index` of
    /// [`MemoryPlatform::input_events`]; later posts succeed again.
    pub fn fail_input_at(&self, index: usize) {
        self.state().fail_input_at = Some(index);
    }

    pub fn desktop_exists(&self, name: &str) -> bool {
        self.state().desktops.contains(name)
    }

    /// Number of desktop objects ever created (reopens excluded).
    pub fn desktops_created(&self) -> usize {
        self.state().desktops_created
    }

    pub fn open_handle_count(&self) -> usize {
        self.state().open_handles.len()
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.state().launches.clone()
    }

    pub fn input_events(&self) -> Vec<(WindowHandle, RawInput)> {
        self.state().input_log.clone()
    }

    pub fn activations(&self) -> Vec<WindowHandle> {
        self.state().activations.clone()
    }

    pub fn window_root(&self, window: WindowHandle) -> Option<MemoryElement> {
        self.state().window(window).ok().map(|w| w.root.clone())
    }

    /// Handle of the first window owned by `pid`, hidden or not.
    pub fn window_for_pid(&self, pid: u32) -> Option<WindowHandle> {
        self.state()
            .windows
            .iter()
            .find(|w| w.pid == pid)
            .map(|w| w.handle)
    }
}

impl DesktopBackend for MemoryPlatform {
    fn open_desktop(&self, name: &str) -> Result<Option<DesktopHandle>, AutomationError> {
        let mut state = self.state();
        if !state.desktops.contains(name) {
            return Ok(None);
        }
        Ok(Some(state.open_handle(name)))
    }

    fn create_desktop(&self, name: &str) -> Result<DesktopHandle, AutomationError> {
        let mut state = self.state();
        if state.deny_desktops {
            return Err(AutomationError::DesktopUnavailable {
                name: name.to_string(),
                message: "access denied".to_string(),
                os_code: Some(ERROR_ACCESS_DENIED),
            });
        }
        if state.desktops.insert(name.to_string()) {
            state.desktops_created += 1;
            debug!("memory desktop '{}' created", name);
        }
        Ok(state.open_handle(name))
    }

    fn thread_desktop(&self) -> Result<DesktopHandle, AutomationError> {
        let thread = std::thread::current().id();
        Ok(self
            .state()
            .thread_desktops
            .get(&thread)
            .copied()
            .unwrap_or(INTERACTIVE_DESKTOP))
    }

    fn set_thread_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError> {
        let mut state = self.state();
        if desktop != INTERACTIVE_DESKTOP {
            state.desktop_name(desktop)?;
        }
        state
            .thread_desktops
            .insert(std::thread::current().id(), desktop);
        Ok(())
    }

    fn close_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError> {
        if desktop == INTERACTIVE_DESKTOP {
            return Ok(());
        }
        let mut state = self.state();
        state.desktop_name(desktop)?;
        state.open_handles.remove(&desktop.0);
        Ok(())
    }

    fn remove_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError> {
        let mut state = self.state();
        let name = state.desktop_name(desktop)?;
        state.open_handles.retain(|_, n| *n != name);
        state.desktops.remove(&name);
        state
            .windows
            .retain(|w| w.desktop.as_deref() != Some(name.as_str()));
        debug!("memory desktop '{}' removed", name);
        Ok(())
    }

    fn enumerate_windows(
        &self,
        desktop: Option<DesktopHandle>,
    ) -> Result<Vec<WindowRef>, AutomationError> {
        let mut state = self.state();
        let scope = match desktop {
            Some(handle) if handle != INTERACTIVE_DESKTOP => Some(state.desktop_name(handle)?),
            _ => None,
        };
        let mut out = Vec::new();
        for window in state.windows.iter_mut() {
            if window.desktop != scope {
                continue;
            }
            if window.hidden_polls > 0 {
                window.hidden_polls -= 1;
                continue;
            }
            out.push(WindowRef {
                handle: window.handle,
                owner_pid: window.pid,
                owner_name: window.owner_name.clone(),
                title: window.title.clone(),
                bounds: window.bounds,
            });
        }
        Ok(out)
    }

    fn client_rect(&self, window: WindowHandle) -> Result<Rect, AutomationError> {
        Ok(self.state().window(window)?.client)
    }

    fn activate_window(&self, window: WindowHandle) -> Result<(), AutomationError> {
        let mut state = self.state();
        state.window(window)?;
        state.activations.push(window);
        Ok(())
    }

    fn launch_process(
        &self,
        path: &str,
        args: &[String],
        desktop_name: &str,
    ) -> Result<u32, AutomationError> {
        let mut state = self.state();
        if let Some(code) = state.launch_failure {
            return Err(AutomationError::LaunchFailed {
                path: path.to_string(),
                message: "CreateProcess failed".to_string(),
                os_code: Some(code),
            });
        }
        if !state.desktops.contains(desktop_name) {
            return Err(AutomationError::LaunchFailed {
                path: path.to_string(),
                message: format!("desktop '{desktop_name}' does not exist"),
                os_code: Some(ERROR_FILE_NOT_FOUND),
            });
        }

        state.next_pid += 4;
        let pid = state.next_pid;
        state.launches.push(LaunchRecord {
            pid,
            path: path.to_string(),
            args: args.to_vec(),
            desktop: desktop_name.to_string(),
        });

        let key = exe_key(path);
        if let Some(app) = state.apps.get(&key).cloned() {
            let root = (app.build)();
            root.set_process_id_recursive(pid);
            let handle = WindowHandle(state.allocate_handle());
            state.windows.push(MemoryWindow {
                handle,
                pid,
                owner_name: key,
                title: app.title.clone(),
                bounds: app.bounds,
                client: app.client.unwrap_or(app.bounds),
                desktop: Some(desktop_name.to_string()),
                root,
                hidden_polls: app.reveal_after,
            });
        }
        Ok(pid)
    }
}

impl AccessibilityEngine for MemoryPlatform {
    fn element_from_window(&self, window: WindowHandle) -> Result<UIElement, AutomationError> {
        Ok(self.state().window(window)?.root.to_ui_element())
    }

    fn focused_element(&self) -> Result<UIElement, AutomationError> {
        self.state()
            .focused
            .as_ref()
            .map(MemoryElement::to_ui_element)
            .ok_or_else(|| AutomationError::ElementNotFound("nothing has focus".to_string()))
    }
}

impl InputSink for MemoryPlatform {
    fn post(&self, window: WindowHandle, input: RawInput) -> Result<(), AutomationError> {
        let mut state = self.state();
        if state.fail_input || state.fail_input_at == Some(state.input_log.len()) {
            state.fail_input_at = None;
            return Err(AutomationError::PlatformError(
                "PostMessage failed".to_string(),
            ));
        }
        state.window(window)?;
        state.input_log.push((window, input));
        Ok(())
    }
}
