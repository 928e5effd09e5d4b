//! Raw window-message input, used only when the accessibility path failed.
//!
//! Every entry point checks its gate before touching the coordinate
//! transform or the input sink, so a closed gate has no side effects.

use crate::clock::Clock;
use crate::config::CapabilityFlags;
use crate::coords::CoordinateTransform;
use crate::errors::AutomationError;
use crate::humanize::Humanizer;
use crate::keys::KeyChord;
use crate::platforms::InputSink;
use crate::types::{MouseButton, Point, RawInput, WindowHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One wheel notch in native units.
pub const WHEEL_DELTA: i32 = 120;
/// Most notches one wheel message can carry in its signed 16-bit delta.
pub const MAX_NOTCHES_PER_WHEEL: i32 = i16::MAX as i32 / WHEEL_DELTA;
/// Upper bound on a single scroll request, in notches.
pub const MAX_SCROLL_NOTCHES: u32 = 10_000;
/// Longest drag, in steps along the major axis.
pub const MAX_DRAG_STEPS: i64 = 100_000;

/// A stop on a pointer path: move there, then wait `delay_ms` plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPoint {
    pub x: i32,
    pub y: i32,
    pub delay_ms: u64,
}

/// `origin + delta * i / steps`, computed without intermediate overflow.
fn interpolate(origin: i32, delta: i64, i: i64, steps: i64) -> Result<i32, AutomationError> {
    let offset = i128::from(delta) * i128::from(i) / i128::from(steps);
    i32::try_from(i128::from(origin) + offset).map_err(|_| {
        AutomationError::InvalidArgument(format!("drag point out of range at step {i}"))
    })
}

/// Split `notches` into same-signed parts of at most [`MAX_NOTCHES_PER_WHEEL`].
fn wheel_chunks(notches: i32) -> Vec<i32> {
    let sign = notches.signum();
    let mut remaining = notches.unsigned_abs();
    let max = MAX_NOTCHES_PER_WHEEL.unsigned_abs();
    let mut chunks = Vec::new();
    while remaining > 0 {
        let part = remaining.min(max);
        chunks.push(sign * part as i32);
        remaining -= part;
    }
    chunks
}

#[derive(Debug, Clone, Copy)]
enum Gate {
    Pointer,
    Text,
    Hotkeys,
}

pub struct LegacyInput {
    input: Arc<dyn InputSink>,
    transform: CoordinateTransform,
    humanizer: Arc<Humanizer>,
    clock: Arc<dyn Clock>,
    flags: CapabilityFlags,
}

impl LegacyInput {
    pub fn new(
        input: Arc<dyn InputSink>,
        transform: CoordinateTransform,
        humanizer: Arc<Humanizer>,
        clock: Arc<dyn Clock>,
        flags: CapabilityFlags,
    ) -> Self {
        Self {
            input,
            transform,
            humanizer,
            clock,
            flags,
        }
    }

    fn check(&self, gate: Gate) -> Result<(), AutomationError> {
        let open = match gate {
            Gate::Pointer => self.flags.allow_legacy_pointer,
            Gate::Text => self.flags.allow_legacy_input,
            Gate::Hotkeys => self.flags.allow_legacy_hotkeys,
        };
        if open {
            Ok(())
        } else {
            debug!("legacy {:?} input is disabled", gate);
            Err(AutomationError::PermissionDenied(format!(
                "legacy {gate:?} input is disabled"
            )))
        }
    }

    fn pause(&self) {
        self.clock.sleep(self.humanizer.delay());
    }

    fn post(&self, window: WindowHandle, input: RawInput) -> Result<(), AutomationError> {
        self.input.post(window, input)
    }

    fn local(&self, window: WindowHandle, x: i32, y: i32, jitter: bool) -> Result<Point, AutomationError> {
        self.transform.screen_to_target(window, x, y, jitter)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn click(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
        button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.check(Gate::Pointer)?;
        let p = self.local(window, x, y, true)?;
        self.post(window, RawInput::MouseMove { x: p.x, y: p.y })?;
        self.pause();
        self.post(window, RawInput::ButtonDown { button, x: p.x, y: p.y })?;
        self.pause();
        self.post(window, RawInput::ButtonUp { button, x: p.x, y: p.y })
    }

    pub fn move_to(&self, window: WindowHandle, x: i32, y: i32) -> Result<(), AutomationError> {
        self.check(Gate::Pointer)?;
        let p = self.local(window, x, y, true)?;
        self.post(window, RawInput::MouseMove { x: p.x, y: p.y })
    }

    /// Press at the start, walk `max(|dx|, |dy|)` jittered steps, release at the end.
    ///
    /// Once the button is down, every failure still attempts a release.
    #[instrument(level = "debug", skip(self))]
    pub fn drag(
        &self,
        window: WindowHandle,
        from: Point,
        to: Point,
    ) -> Result<(), AutomationError> {
        self.check(Gate::Pointer)?;
        let dx = i64::from(to.x) - i64::from(from.x);
        let dy = i64::from(to.y) - i64::from(from.y);
        let steps = dx.abs().max(dy.abs());
        if steps > MAX_DRAG_STEPS {
            return Err(AutomationError::InvalidArgument(format!(
                "drag of {steps} px exceeds {MAX_DRAG_STEPS} px"
            )));
        }

        let start = self.local(window, from.x, from.y, true)?;
        self.post(window, RawInput::MouseMove { x: start.x, y: start.y })?;
        self.post(
            window,
            RawInput::ButtonDown {
                button: MouseButton::Left,
                x: start.x,
                y: start.y,
            },
        )?;

        let mut last = start;
        let walked = (1..=steps).try_for_each(|i| {
            let x = interpolate(from.x, dx, i, steps)?;
            let y = interpolate(from.y, dy, i, steps)?;
            self.pause();
            last = self.local(window, x, y, true)?;
            self.post(window, RawInput::MouseMove { x: last.x, y: last.y })
        });
        if walked.is_ok() {
            self.pause();
        }

        let released = self.post(
            window,
            RawInput::ButtonUp {
                button: MouseButton::Left,
                x: last.x,
                y: last.y,
            },
        );
        if let (Err(_), Err(e)) = (&walked, &released) {
            warn!("button release after failed drag also failed: {}", e);
        }
        walked.and(released)
    }

    pub fn mouse_path(&self, window: WindowHandle, path: &[PathPoint]) -> Result<(), AutomationError> {
        self.check(Gate::Pointer)?;
        for stop in path {
            let p = self.local(window, stop.x, stop.y, true)?;
            self.post(window, RawInput::MouseMove { x: p.x, y: p.y })?;
            self.clock
                .sleep(Duration::from_millis(stop.delay_ms) + self.humanizer.delay());
        }
        Ok(())
    }

    /// `notches` wheel clicks at a caller point; positive scrolls up. Large
    /// amounts are split into several wheel messages that each fit the
    /// native 16-bit delta.
    pub fn wheel(
        &self,
        window: WindowHandle,
        x: i32,
        y: i32,
        notches: i32,
    ) -> Result<(), AutomationError> {
        self.check(Gate::Pointer)?;
        if notches.unsigned_abs() > MAX_SCROLL_NOTCHES {
            return Err(AutomationError::InvalidArgument(format!(
                "{notches} wheel notches exceed {MAX_SCROLL_NOTCHES}"
            )));
        }
        let screen = self.transform.target_to_screen(window, x, y)?;
        let (sx, sy) = self.humanizer.jitter_point(screen.x, screen.y);
        for chunk in wheel_chunks(notches) {
            self.post(
                window,
                RawInput::Wheel {
                    delta: chunk * WHEEL_DELTA,
                    x: sx,
                    y: sy,
                },
            )?;
        }
        Ok(())
    }

    /// One character message per char, `delay_ms` plus jitter apart.
    pub fn type_text(&self, window: WindowHandle, text: &str, delay_ms: u64) -> Result<(), AutomationError> {
        self.check(Gate::Text)?;
        for c in text.chars() {
            self.post(window, RawInput::Char(c))?;
            self.clock
                .sleep(Duration::from_millis(delay_ms) + self.humanizer.delay());
        }
        Ok(())
    }

    /// Modifiers down, key down, then key and modifiers up in reverse. Chords
    /// holding Alt use the system-key messages throughout.
    pub fn hotkeys(&self, window: WindowHandle, chords: &[KeyChord]) -> Result<(), AutomationError> {
        self.check(Gate::Hotkeys)?;
        for chord in chords {
            let system = chord.has_alt();
            for modifier in &chord.modifiers {
                self.post(window, RawInput::KeyDown { vk: modifier.vk(), system })?;
            }
            self.post(window, RawInput::KeyDown { vk: chord.key, system })?;
            self.pause();
            self.post(window, RawInput::KeyUp { vk: chord.key, system })?;
            for modifier in chord.modifiers.iter().rev() {
                self.post(window, RawInput::KeyUp { vk: modifier.vk(), system })?;
            }
            self.pause();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_interpolation_does_not_overflow() {
        let dx = i64::from(i32::MAX) - i64::from(i32::MIN);
        assert_eq!(interpolate(i32::MIN, dx, dx, dx).unwrap(), i32::MAX);
        assert_eq!(interpolate(0, 50_000, 25_000, 50_000).unwrap(), 25_000);
        assert_eq!(interpolate(10, -4, 1, 4).unwrap(), 9);
    }

    #[test]
    fn wheel_chunks_fit_the_native_delta() {
        assert_eq!(wheel_chunks(3), vec![3]);
        assert_eq!(wheel_chunks(-600), vec![-273, -273, -54]);
        assert!(wheel_chunks(0).is_empty());
        for chunk in wheel_chunks(10_000) {
            assert!(i16::try_from(chunk * WHEEL_DELTA).is_ok());
        }
    }
}
