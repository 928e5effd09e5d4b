//! Named desktops, top-level window enumeration and process creation.

use super::types::{from_hdesk, to_hdesk, HandleGuard};
use super::utils::{from_hwnd, from_wide, os_code_of, rect_from_win, to_hwnd, wide};
use crate::errors::AutomationError;
use crate::platforms::DesktopBackend;
use crate::types::{DesktopHandle, Rect, WindowHandle, WindowRef};
use tracing::{debug, instrument, warn};
use windows::core::{BOOL, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HWND, LPARAM, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::StationsAndDesktops::{
    CloseDesktop, CreateDesktopW, EnumDesktopWindows, GetThreadDesktop, OpenDesktopW,
    SetThreadDesktop, DESKTOP_CONTROL_FLAGS, DESKTOP_CREATEWINDOW, DESKTOP_ENUMERATE,
    DESKTOP_READOBJECTS, DESKTOP_WRITEOBJECTS, HDESK,
};
use windows::Win32::System::Threading::{
    CreateProcessW, GetCurrentThreadId, OpenProcess, QueryFullProcessImageNameW,
    PROCESS_CREATION_FLAGS, PROCESS_INFORMATION, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION, STARTUPINFOW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetClientRect, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId, IsIconic,
    IsWindowVisible, PostMessageW, SetForegroundWindow, ShowWindow, SW_RESTORE, WM_CLOSE,
};

const WINDOW_STATION: &str = "WinSta0";
const INTERACTIVE_DESKTOP: &str = "Default";
const ERROR_FILE_NOT_FOUND: i32 = 2;

fn desktop_access() -> u32 {
    (DESKTOP_READOBJECTS | DESKTOP_WRITEOBJECTS | DESKTOP_ENUMERATE | DESKTOP_CREATEWINDOW).0
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<HWND>);
    windows.push(hwnd);
    true.into()
}

fn window_title(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buf[..len as usize])
}

/// Executable file name of `pid`, empty when the process cannot be opened.
fn process_image_name(pid: u32) -> String {
    unsafe {
        let Ok(process) = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) else {
            return String::new();
        };
        let _guard = HandleGuard(process);
        let mut buf = [0u16; 1024];
        let mut size = buf.len() as u32;
        if QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut size)
            .is_err()
        {
            return String::new();
        }
        let full = from_wide(&buf[..size as usize]);
        full.rsplit('\\').next().unwrap_or(&full).to_string()
    }
}

/// Quote one argument so `CommandLineToArgvW` reads it back unchanged.
///
/// Backslashes are literal except in runs directly before a `"`, where they
/// are doubled; that includes the run before the closing quote.
fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '\n', '\u{b}', '"']) {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat('\\').take(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    quoted
}

/// Desktop primitives over the window station of the current process.
#[derive(Debug, Default)]
pub struct WindowsDesktops;

impl WindowsDesktops {
    pub fn new() -> Self {
        Self
    }

    fn open_raw(name: &str) -> Result<HDESK, windows::core::Error> {
        let name = wide(name);
        unsafe {
            OpenDesktopW(
                PCWSTR(name.as_ptr()),
                DESKTOP_CONTROL_FLAGS(0),
                false,
                desktop_access(),
            )
        }
    }

    fn enumerate_raw(desktop: HDESK) -> Result<Vec<HWND>, AutomationError> {
        let mut handles: Vec<HWND> = Vec::new();
        unsafe {
            EnumDesktopWindows(
                Some(desktop),
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<HWND> as isize),
            )
        }
        .map_err(|e| AutomationError::PlatformError(format!("EnumDesktopWindows failed: {e}")))?;
        Ok(handles)
    }

    fn describe(hwnd: HWND) -> Option<WindowRef> {
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() {
                return None;
            }
            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            let mut rect = RECT::default();
            let bounds = if GetWindowRect(hwnd, &mut rect).is_ok() {
                rect_from_win(&rect)
            } else {
                Rect::default()
            };
            Some(WindowRef {
                handle: from_hwnd(hwnd),
                owner_pid: pid,
                owner_name: process_image_name(pid),
                title: window_title(hwnd),
                bounds,
            })
        }
    }
}

impl DesktopBackend for WindowsDesktops {
    #[instrument(level = "debug", skip(self))]
    fn open_desktop(&self, name: &str) -> Result<Option<DesktopHandle>, AutomationError> {
        match Self::open_raw(name) {
            Ok(desk) => Ok(Some(from_hdesk(desk))),
            Err(e) => {
                debug!("OpenDesktopW('{}') failed: {}", name, e);
                Ok(None)
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    fn create_desktop(&self, name: &str) -> Result<DesktopHandle, AutomationError> {
        let wide_name = wide(name);
        // CreateDesktopW opens the existing object when the name is taken.
        let desk = unsafe {
            CreateDesktopW(
                PCWSTR(wide_name.as_ptr()),
                PCWSTR::null(),
                None,
                DESKTOP_CONTROL_FLAGS(0),
                desktop_access(),
                None,
            )
        }
        .map_err(|e| AutomationError::DesktopUnavailable {
            name: name.to_string(),
            message: e.message().to_string(),
            os_code: os_code_of(&e),
        })?;
        Ok(from_hdesk(desk))
    }

    fn thread_desktop(&self) -> Result<DesktopHandle, AutomationError> {
        let desk = unsafe { GetThreadDesktop(GetCurrentThreadId()) }
            .map_err(|e| AutomationError::PlatformError(format!("GetThreadDesktop failed: {e}")))?;
        Ok(from_hdesk(desk))
    }

    fn set_thread_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError> {
        unsafe { SetThreadDesktop(to_hdesk(desktop)) }
            .map_err(|e| AutomationError::PlatformError(format!("SetThreadDesktop failed: {e}")))
    }

    fn close_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError> {
        unsafe { CloseDesktop(to_hdesk(desktop)) }
            .map_err(|e| AutomationError::PlatformError(format!("CloseDesktop failed: {e}")))
    }

    /// Desktops have no delete call: the object dies with its last handle and
    /// last window, so windows still on it are asked to close first.
    fn remove_desktop(&self, desktop: DesktopHandle) -> Result<(), AutomationError> {
        match Self::enumerate_raw(to_hdesk(desktop)) {
            Ok(handles) => {
                for hwnd in handles {
                    if let Err(e) = unsafe { PostMessageW(Some(hwnd), WM_CLOSE, WPARAM(0), LPARAM(0)) } {
                        debug!("WM_CLOSE to {:?} failed: {}", hwnd, e);
                    }
                }
            }
            Err(e) => warn!("could not enumerate windows before removal: {}", e),
        }
        self.close_desktop(desktop)
    }

    fn enumerate_windows(
        &self,
        desktop: Option<DesktopHandle>,
    ) -> Result<Vec<WindowRef>, AutomationError> {
        let handles = match desktop {
            Some(desk) => Self::enumerate_raw(to_hdesk(desk))?,
            None => {
                let desk = Self::open_raw(INTERACTIVE_DESKTOP).map_err(|e| {
                    AutomationError::PermissionDenied(format!(
                        "cannot open interactive desktop: {e}"
                    ))
                })?;
                let result = Self::enumerate_raw(desk);
                let _ = unsafe { CloseDesktop(desk) };
                result?
            }
        };
        Ok(handles.into_iter().filter_map(Self::describe).collect())
    }

    fn client_rect(&self, window: WindowHandle) -> Result<Rect, AutomationError> {
        let hwnd = to_hwnd(window);
        let mut rect = RECT::default();
        unsafe { GetClientRect(hwnd, &mut rect) }
            .map_err(|e| AutomationError::WindowNotFound(format!("GetClientRect failed: {e}")))?;
        let mut origin = POINT { x: 0, y: 0 };
        if !unsafe { ClientToScreen(hwnd, &mut origin) }.as_bool() {
            return Err(AutomationError::WindowNotFound(format!(
                "ClientToScreen failed for window {window}"
            )));
        }
        Ok(Rect::new(
            origin.x,
            origin.y,
            rect.right - rect.left,
            rect.bottom - rect.top,
        ))
    }

    fn activate_window(&self, window: WindowHandle) -> Result<(), AutomationError> {
        let hwnd = to_hwnd(window);
        unsafe {
            if IsIconic(hwnd).as_bool() {
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            if !SetForegroundWindow(hwnd).as_bool() {
                return Err(AutomationError::PlatformError(format!(
                    "SetForegroundWindow refused window {window}"
                )));
            }
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn launch_process(
        &self,
        path: &str,
        args: &[String],
        desktop_name: &str,
    ) -> Result<u32, AutomationError> {
        let launch_error = |message: String, os_code: Option<i32>| AutomationError::LaunchFailed {
            path: path.to_string(),
            message,
            os_code,
        };

        match Self::open_raw(desktop_name) {
            Ok(desk) => unsafe {
                let _ = CloseDesktop(desk);
            },
            Err(_) => {
                return Err(launch_error(
                    format!("desktop '{desktop_name}' does not exist"),
                    Some(ERROR_FILE_NOT_FOUND),
                ))
            }
        }

        let command_line = std::iter::once(path)
            .chain(args.iter().map(String::as_str))
            .map(quote_arg)
            .collect::<Vec<_>>()
            .join(" ");
        let mut command_line = wide(&command_line);
        let mut desktop = wide(&format!("{WINDOW_STATION}\\{desktop_name}"));

        let startup_info = STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOW>() as u32,
            lpDesktop: PWSTR(desktop.as_mut_ptr()),
            ..Default::default()
        };
        let mut process_info = PROCESS_INFORMATION::default();

        unsafe {
            CreateProcessW(
                None,
                Some(PWSTR(command_line.as_mut_ptr())),
                None,
                None,
                false,
                PROCESS_CREATION_FLAGS(0),
                None,
                None,
                &startup_info,
                &mut process_info,
            )
            .map_err(|e| launch_error(e.message().to_string(), os_code_of(&e)))?;

            let _ = CloseHandle(process_info.hThread);
            let _process = HandleGuard(process_info.hProcess);
        }

        debug!(
            "launched '{}' as pid {} on {}",
            path, process_info.dwProcessId, desktop_name
        );
        Ok(process_info.dwProcessId)
    }
}
