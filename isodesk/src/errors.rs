use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Element is read-only: {0}")]
    ReadOnly(String),

    #[error("Desktop '{name}' unavailable: {message}")]
    DesktopUnavailable {
        name: String,
        message: String,
        os_code: Option<i32>,
    },

    #[error("Failed to launch '{path}': {message}")]
    LaunchFailed {
        path: String,
        message: String,
        os_code: Option<i32>,
    },
}

impl AutomationError {
    /// The native error code captured for session and process failures, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            AutomationError::DesktopUnavailable { os_code, .. }
            | AutomationError::LaunchFailed { os_code, .. } => *os_code,
            _ => None,
        }
    }
}
