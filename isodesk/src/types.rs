//! Common types shared by the engine components and platform backends

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Degenerate rectangles never contain a point and never win a hit test.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_empty() && x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Opaque native window handle. Only valid within the invocation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque native desktop handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DesktopHandle(pub isize);

/// A top-level window as seen by one enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRef {
    pub handle: WindowHandle,
    pub owner_pid: u32,
    pub owner_name: String,
    pub title: String,
    pub bounds: Rect,
}

/// Which desktop an enumeration runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowScope {
    /// The user's interactive desktop. Requires the interactive-fallback gate.
    All,
    /// The isolated, named desktop session.
    Session,
}

/// Interaction contracts an accessibility element may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Invoke,
    SelectItem,
    Toggle,
    LegacyDefaultAction,
    SetValue,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Content moves towards the start (wheel up).
    Decrement,
    /// Content moves towards the end (wheel down).
    Increment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Low-level input event delivered to a window by the legacy fallback path.
///
/// Pointer coordinates are window-local except for `Wheel`, which carries
/// screen coordinates as the native wheel message does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    MouseMove { x: i32, y: i32 },
    ButtonDown { button: MouseButton, x: i32, y: i32 },
    ButtonUp { button: MouseButton, x: i32, y: i32 },
    Wheel { delta: i32, x: i32, y: i32 },
    KeyDown { vk: u16, system: bool },
    KeyUp { vk: u16, system: bool },
    Char(char),
}

impl RawInput {
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            RawInput::MouseMove { .. }
                | RawInput::ButtonDown { .. }
                | RawInput::ButtonUp { .. }
                | RawInput::Wheel { .. }
        )
    }
}
