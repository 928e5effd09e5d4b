//! Window discovery and process correlation.

use crate::clock::Clock;
use crate::config::CapabilityFlags;
use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::platforms::{AccessibilityEngine, DesktopBackend};
use crate::types::{DesktopHandle, WindowRef, WindowScope};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct WindowResolver {
    desktops: Arc<dyn DesktopBackend>,
    accessibility: Arc<dyn AccessibilityEngine>,
    clock: Arc<dyn Clock>,
    flags: CapabilityFlags,
    poll_interval: Duration,
    session: Option<DesktopHandle>,
}

impl WindowResolver {
    pub fn new(
        desktops: Arc<dyn DesktopBackend>,
        accessibility: Arc<dyn AccessibilityEngine>,
        clock: Arc<dyn Clock>,
        flags: CapabilityFlags,
        poll_interval: Duration,
    ) -> Self {
        Self {
            desktops,
            accessibility,
            clock,
            flags,
            poll_interval,
            session: None,
        }
    }

    /// Scope `WindowScope::Session` lookups to `desktop`. Without a session
    /// that scope is empty.
    pub fn with_session(mut self, desktop: Option<DesktopHandle>) -> Self {
        self.session = desktop;
        self
    }

    /// Top-level windows in `scope`, optionally narrowed by a case-insensitive
    /// title substring. A scope the flags do not allow yields no windows.
    pub fn enumerate_windows(
        &self,
        scope: WindowScope,
        title_filter: Option<&str>,
    ) -> Result<Vec<WindowRef>, AutomationError> {
        let windows = match scope {
            WindowScope::Session => match self.session {
                Some(desktop) => self.desktops.enumerate_windows(Some(desktop))?,
                None => Vec::new(),
            },
            WindowScope::All => {
                if !self.flags.allow_interactive_fallback {
                    debug!("interactive desktop enumeration not allowed");
                    return Ok(Vec::new());
                }
                self.desktops.enumerate_windows(None)?
            }
        };

        let needle = title_filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);
        Ok(match needle {
            Some(needle) => windows
                .into_iter()
                .filter(|w| w.title.to_lowercase().contains(&needle))
                .collect(),
            None => windows,
        })
    }

    /// A top-level window owned by `pid`, preferring titled windows and the session desktop.
    pub fn find_window_by_pid(&self, pid: u32) -> Result<Option<WindowRef>, AutomationError> {
        let mut scopes = vec![WindowScope::Session];
        if self.flags.allow_interactive_fallback {
            scopes.push(WindowScope::All);
        }
        for scope in scopes {
            let owned: Vec<WindowRef> = self
                .enumerate_windows(scope, None)?
                .into_iter()
                .filter(|w| w.owner_pid == pid)
                .collect();
            let preferred = owned.iter().position(|w| !w.title.is_empty()).unwrap_or(0);
            if let Some(window) = owned.into_iter().nth(preferred) {
                return Ok(Some(window));
            }
        }
        Ok(None)
    }

    /// Poll until `pid` owns a window, never giving up before `timeout` has elapsed.
    #[instrument(level = "debug", skip(self))]
    pub fn wait_for_window_by_pid(
        &self,
        pid: u32,
        timeout: Duration,
    ) -> Result<WindowRef, AutomationError> {
        let deadline = self.clock.now() + timeout;
        loop {
            match self.find_window_by_pid(pid) {
                Ok(Some(window)) => return Ok(window),
                Ok(None) => {}
                Err(e) => warn!("window lookup for pid {} failed: {}", pid, e),
            }
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            self.clock
                .sleep(self.poll_interval.min(deadline.saturating_duration_since(now)));
        }

        if let Some(window) = self.find_window_by_pid(pid)? {
            return Ok(window);
        }
        Err(AutomationError::Timeout(format!(
            "no window for pid {pid} after {}ms",
            timeout.as_millis()
        )))
    }

    /// Start `path` on the named desktop.
    pub fn launch_process(
        &self,
        path: &str,
        args: &[String],
        desktop_name: &str,
    ) -> Result<u32, AutomationError> {
        self.desktops.launch_process(path, args, desktop_name)
    }

    /// The window of `pid` together with its accessibility root.
    pub fn root_for_pid(&self, pid: u32) -> Result<(WindowRef, UIElement), AutomationError> {
        let window = self
            .find_window_by_pid(pid)?
            .ok_or_else(|| AutomationError::WindowNotFound(format!("no window for pid {pid}")))?;
        let root = self.accessibility.element_from_window(window.handle)?;
        Ok((window, root))
    }

    /// Focus the main window of `pid`, falling back to native activation.
    pub fn focus_window(&self, pid: u32) -> Result<WindowRef, AutomationError> {
        let (window, root) = self.root_for_pid(pid)?;
        if let Err(e) = root.focus() {
            debug!("accessibility focus failed ({}), activating natively", e);
            self.desktops.activate_window(window.handle)?;
        }
        Ok(window)
    }
}
