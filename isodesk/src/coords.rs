//! Mapping between caller coordinates, screen space and window-local space.

use crate::config::CoordinateMode;
use crate::errors::AutomationError;
use crate::humanize::Humanizer;
use crate::platforms::DesktopBackend;
use crate::types::{Point, WindowHandle};
use std::sync::Arc;

/// Converts caller-supplied points for a target window.
///
/// In [`CoordinateMode::ScreenRelative`] callers speak screen pixels; in
/// [`CoordinateMode::ClientRelative`] they speak the window's client area.
#[derive(Clone)]
pub struct CoordinateTransform {
    desktops: Arc<dyn DesktopBackend>,
    mode: CoordinateMode,
    humanizer: Arc<Humanizer>,
}

impl CoordinateTransform {
    pub fn new(
        desktops: Arc<dyn DesktopBackend>,
        mode: CoordinateMode,
        humanizer: Arc<Humanizer>,
    ) -> Self {
        Self {
            desktops,
            mode,
            humanizer,
        }
    }

    /// Window-local point for a caller point, optionally jittered.
    pub fn screen_to_target(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
        jitter: bool,
    ) -> Result<Point, AutomationError> {
        let (x, y) = if jitter {
            self.humanizer.jitter_point(x, y)
        } else {
            (x, y)
        };
        match self.mode {
            CoordinateMode::ClientRelative => Ok(Point::new(x, y)),
            CoordinateMode::ScreenRelative => {
                let client = self.desktops.client_rect(window)?;
                Ok(Point::new(
                    x.saturating_sub(client.x),
                    y.saturating_sub(client.y),
                ))
            }
        }
    }

    /// Screen point for a caller point. Element bounds are screen based, so
    /// hit testing always runs on the result of this.
    pub fn target_to_screen(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
    ) -> Result<Point, AutomationError> {
        match self.mode {
            CoordinateMode::ScreenRelative => Ok(Point::new(x, y)),
            CoordinateMode::ClientRelative => {
                let client = self.desktops.client_rect(window)?;
                Ok(Point::new(
                    x.saturating_add(client.x),
                    y.saturating_add(client.y),
                ))
            }
        }
    }
}
