//! Window-message input delivery.
//!
//! Events are posted to the target window's queue rather than injected into
//! the system input stream, so they reach windows on a non-interactive
//! desktop and never move the user's cursor.

use super::utils::{make_lparam, to_hwnd};
use crate::errors::AutomationError;
use crate::platforms::InputSink;
use crate::types::{MouseButton, RawInput, WindowHandle};
use std::sync::{Mutex, PoisonError};
use tracing::trace;
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_VSC};
use windows::Win32::UI::WindowsAndMessaging::{
    PostMessageW, WM_CHAR, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
    WM_MOUSEWHEEL, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

const MK_LBUTTON: usize = 0x0001;
const MK_RBUTTON: usize = 0x0002;

/// Bit 29 of a key message's LPARAM: Alt was held.
const KF_ALTDOWN: isize = 1 << 29;
/// Bits 30 and 31: previous state down, transition up.
const KF_RELEASE: isize = (1 << 30) | (1 << 31);

#[derive(Debug, Default)]
pub struct PostMessageInput {
    /// MK_* mask of buttons currently held, reported with every pointer message.
    buttons: Mutex<usize>,
}

impl PostMessageInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_lparam(vk: u16, system: bool, release: bool) -> isize {
        let scan = unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) } as isize;
        let mut lparam = 1 | ((scan & 0xFF) << 16);
        if system {
            lparam |= KF_ALTDOWN;
        }
        if release {
            lparam |= KF_RELEASE;
        }
        lparam
    }

    fn button_mask(button: MouseButton) -> usize {
        match button {
            MouseButton::Left => MK_LBUTTON,
            MouseButton::Right => MK_RBUTTON,
        }
    }

    /// Native (message, wparam, lparam) triples for one logical event.
    fn encode(&self, input: RawInput) -> Vec<(u32, usize, isize)> {
        let mut held = self.buttons.lock().unwrap_or_else(PoisonError::into_inner);
        match input {
            RawInput::MouseMove { x, y } => vec![(WM_MOUSEMOVE, *held, make_lparam(x, y))],
            RawInput::ButtonDown { button, x, y } => {
                *held |= Self::button_mask(button);
                let msg = match button {
                    MouseButton::Left => WM_LBUTTONDOWN,
                    MouseButton::Right => WM_RBUTTONDOWN,
                };
                vec![(msg, *held, make_lparam(x, y))]
            }
            RawInput::ButtonUp { button, x, y } => {
                *held &= !Self::button_mask(button);
                let msg = match button {
                    MouseButton::Left => WM_LBUTTONUP,
                    MouseButton::Right => WM_RBUTTONUP,
                };
                vec![(msg, *held, make_lparam(x, y))]
            }
            RawInput::Wheel { delta, x, y } => {
                let delta = delta.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                let wparam = ((delta as u16 as usize) << 16) | *held;
                vec![(WM_MOUSEWHEEL, wparam, make_lparam(x, y))]
            }
            RawInput::KeyDown { vk, system } => {
                let msg = if system { WM_SYSKEYDOWN } else { WM_KEYDOWN };
                vec![(msg, vk as usize, Self::key_lparam(vk, system, false))]
            }
            RawInput::KeyUp { vk, system } => {
                let msg = if system { WM_SYSKEYUP } else { WM_KEYUP };
                vec![(msg, vk as usize, Self::key_lparam(vk, system, true))]
            }
            RawInput::Char(c) => {
                let mut units = [0u16; 2];
                c.encode_utf16(&mut units)
                    .iter()
                    .map(|unit| (WM_CHAR, *unit as usize, 1))
                    .collect()
            }
        }
    }
}

impl InputSink for PostMessageInput {
    fn post(&self, window: WindowHandle, input: RawInput) -> Result<(), AutomationError> {
        let hwnd = to_hwnd(window);
        for (msg, wparam, lparam) in self.encode(input) {
            trace!("post {:#06x} {:#x} {:#x} -> {}", msg, wparam, lparam, window);
            unsafe { PostMessageW(Some(hwnd), msg, WPARAM(wparam), LPARAM(lparam)) }.map_err(
                |e| AutomationError::PlatformError(format!("PostMessageW failed: {e}")),
            )?;
        }
        Ok(())
    }
}
