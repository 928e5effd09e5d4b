//! Conversions and COM helpers shared by the Windows backend

use crate::errors::AutomationError;
use crate::types::{Rect, WindowHandle};
use uiautomation::UIAutomation;
use windows::core::HRESULT;
use windows::Win32::Foundation::{GetLastError, HWND, RECT};
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

/// RPC_E_CHANGED_MODE: COM already initialised on this thread with another model.
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

/// Create a UIAutomation client, initialising COM on the calling thread first.
pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(AutomationError::PlatformError(format!(
                "Failed to initialize COM: {hr}"
            )));
        }
    }

    UIAutomation::new_direct().map_err(|e| AutomationError::PlatformError(e.to_string()))
}

/// NUL-terminated UTF-16 copy of `s`.
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub(crate) fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Win32 error code of the last failed call on this thread.
pub(crate) fn last_os_code() -> Option<i32> {
    let code = unsafe { GetLastError() };
    (code.0 != 0).then_some(code.0 as i32)
}

/// Win32 error code carried inside a `windows::core::Error`.
pub(crate) fn os_code_of(error: &windows::core::Error) -> Option<i32> {
    let hr = error.code().0 as u32;
    // HRESULT_FROM_WIN32 values carry the Win32 code in the low word.
    if hr & 0xFFFF_0000 == 0x8007_0000 {
        Some((hr & 0xFFFF) as i32)
    } else {
        last_os_code()
    }
}

pub(crate) fn to_hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut std::ffi::c_void)
}

pub(crate) fn from_hwnd(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as isize)
}

pub(crate) fn rect_from_win(rect: &RECT) -> Rect {
    Rect::new(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
}

/// Pack two 16-bit coordinates into an LPARAM the way `MAKELPARAM` does.
pub(crate) fn make_lparam(x: i32, y: i32) -> isize {
    (((y as u16 as u32) << 16) | (x as u16 as u32)) as i32 as isize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lparam_packs_low_and_high_words() {
        assert_eq!(make_lparam(10, 20), (20 << 16) | 10);
        assert_eq!(make_lparam(-1, 0) & 0xFFFF, 0xFFFF);
    }

    #[test]
    fn wide_round_trip_stops_at_nul() {
        let buf = wide("desk");
        assert_eq!(buf.last(), Some(&0));
        assert_eq!(from_wide(&buf), "desk");
    }
}
