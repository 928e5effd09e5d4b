//! Command routing and the exit-code contract.
//!
//! One invocation runs one command and produces one exit code and at most
//! one stdout line. Failures never escape as panics or errors: every path
//! ends in a [`CommandOutcome`].

use crate::errors::AutomationError;
use crate::executor::legacy::{PathPoint, MAX_SCROLL_NOTCHES};
use crate::executor::ActionExecutor;
use crate::keys::parse_sequence;
use crate::selector::Query;
use crate::session::SessionHandle;
use crate::types::{Point, WindowRef, WindowScope};
use crate::Engine;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_SESSION_UNAVAILABLE: i32 = 3;
pub const EXIT_TARGET_FAILED: i32 = 10;
pub const EXIT_TYPE_FAILED: i32 = 11;
pub const EXIT_HOTKEY_FAILED: i32 = 12;
pub const EXIT_MOUSE_PATH_FAILED: i32 = 13;
pub const EXIT_DRAG_FAILED: i32 = 14;
pub const EXIT_SCROLL_FAILED: i32 = 15;
pub const EXIT_INTERNAL: i32 = 98;
pub const EXIT_UNKNOWN_COMMAND: i32 = 99;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandInvocation {
    pub fn new<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: Option<String>,
}

impl CommandOutcome {
    pub fn success(stdout: Option<String>) -> Self {
        Self {
            exit_code: EXIT_OK,
            stdout,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_OK
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no command given")]
    NoCommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),

    #[error("invalid argument <{name}>: '{value}'")]
    InvalidArgument { name: &'static str, value: String },

    /// The command ran and failed; `payload` is printed when present.
    #[error("command failed with exit code {code}")]
    Failed { code: i32, payload: Option<String> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::NoCommand => EXIT_FAILURE,
            CommandError::UnknownCommand(_) => EXIT_UNKNOWN_COMMAND,
            CommandError::MissingArgument(_) | CommandError::InvalidArgument { .. } => EXIT_USAGE,
            CommandError::Failed { code, .. } => *code,
            CommandError::Internal(_) => EXIT_INTERNAL,
        }
    }

    fn failed(code: i32) -> Self {
        CommandError::Failed {
            code,
            payload: None,
        }
    }

    /// Failure that reports the native error as a JSON object on stdout.
    fn failed_with_error(code: i32, error: &AutomationError) -> Self {
        CommandError::Failed {
            code,
            payload: Some(error_json(error)),
        }
    }
}

impl From<CommandError> for CommandOutcome {
    fn from(error: CommandError) -> Self {
        let exit_code = error.exit_code();
        let stdout = match error {
            CommandError::Failed { payload, .. } => payload,
            _ => None,
        };
        Self { exit_code, stdout }
    }
}

fn error_json(error: &AutomationError) -> String {
    serde_json::json!({
        "error": error.to_string(),
        "code": error.os_code(),
    })
    .to_string()
}

type CommandResult = Result<Option<String>, CommandError>;
type Handler = fn(&Engine, &[String]) -> CommandResult;

const COMMANDS: &[(&str, Handler)] = &[
    ("createdesktop", create_desktop),
    ("winlist", win_list),
    ("winlistdesk", win_list_desk),
    ("launchondesk", launch_on_desk),
    ("waitforpid", wait_for_pid),
    ("focuspid", focus_pid),
    ("invokepid", invoke_pid),
    ("setvaluepid", set_value_pid),
    ("clickpid", click_pid),
    ("typepid", type_pid),
    ("hotkeypid", hotkey_pid),
    ("mousepathpid", mouse_path_pid),
    ("dragpid", drag_pid),
    ("scrollpid", scroll_pid),
    ("cleanupdesktop", cleanup_desktop),
    ("elementatpid", element_at_pid),
    ("querypid", query_pid),
];

pub fn command_names() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|(name, _)| *name)
}

fn lookup(name: &str) -> Option<Handler> {
    let name = name.to_ascii_lowercase();
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, handler)| *handler)
}

/// Run one command. Panics inside the handler become exit code 98.
pub fn dispatch(engine: &Engine, invocation: &CommandInvocation) -> CommandOutcome {
    let Some(handler) = lookup(&invocation.name) else {
        warn!("unknown command '{}'", invocation.name);
        return CommandError::UnknownCommand(invocation.name.clone()).into();
    };

    debug!("dispatching {} {:?}", invocation.name, invocation.args);
    match catch_unwind(AssertUnwindSafe(|| handler(engine, &invocation.args))) {
        Ok(Ok(stdout)) => CommandOutcome::success(stdout),
        Ok(Err(e)) => {
            info!("{} failed: {}", invocation.name, e);
            e.into()
        }
        Err(_) => {
            error!("{} panicked", invocation.name);
            CommandError::Internal("panic".to_string()).into()
        }
    }
}

/// Split raw positional arguments into a command and dispatch it.
pub fn run(engine: &Engine, argv: &[String]) -> CommandOutcome {
    match argv.split_first() {
        Some((name, args)) => dispatch(engine, &CommandInvocation::new(name, args.iter().cloned())),
        None => CommandError::NoCommand.into(),
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &'static str) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(CommandError::MissingArgument(name))
}

fn parse_arg<T: FromStr>(args: &[String], index: usize, name: &'static str) -> Result<T, CommandError> {
    let raw = arg(args, index, name)?;
    raw.trim().parse().map_err(|_| CommandError::InvalidArgument {
        name,
        value: raw.to_string(),
    })
}

fn succeed_or(ok: bool, code: i32) -> CommandResult {
    if ok {
        Ok(None)
    } else {
        Err(CommandError::failed(code))
    }
}

/// Run `f` against the configured session, switched in for the duration.
/// Without a live session the executor sees no session windows.
fn in_session<T>(engine: &Engine, f: impl FnOnce(&ActionExecutor) -> T) -> T {
    let session: Option<SessionHandle> = engine.enter_session().unwrap_or_else(|e| {
        warn!("session '{}' unavailable: {}", engine.config().desktop_name, e);
        None
    });
    let executor = engine.executor(session.as_ref());
    f(&executor)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct WindowBounds {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowInfo {
    window_number: isize,
    owner_name: String,
    #[serde(rename = "ownerPID")]
    owner_pid: u32,
    name: String,
    layer: i32,
    bounds: WindowBounds,
}

impl From<WindowRef> for WindowInfo {
    fn from(window: WindowRef) -> Self {
        Self {
            window_number: window.handle.0,
            owner_name: window.owner_name,
            owner_pid: window.owner_pid,
            name: window.title,
            layer: 0,
            bounds: WindowBounds {
                x: window.bounds.x,
                y: window.bounds.y,
                width: window.bounds.width,
                height: window.bounds.height,
            },
        }
    }
}

fn window_list_json(windows: Vec<WindowRef>) -> CommandResult {
    let infos: Vec<WindowInfo> = windows.into_iter().map(WindowInfo::from).collect();
    serde_json::to_string(&infos)
        .map(Some)
        .map_err(|e| CommandError::Internal(e.to_string()))
}

fn create_desktop(engine: &Engine, _args: &[String]) -> CommandResult {
    let name = &engine.config().desktop_name;
    engine
        .sessions()
        .ensure(name)
        .map_err(|e| CommandError::failed_with_error(EXIT_FAILURE, &e))?;
    Ok(Some(name.clone()))
}

fn win_list(engine: &Engine, args: &[String]) -> CommandResult {
    let filter = args.first().map(String::as_str);
    let windows = engine
        .resolver(None)
        .enumerate_windows(WindowScope::All, filter)
        .map_err(|e| CommandError::Internal(e.to_string()))?;
    window_list_json(windows)
}

fn win_list_desk(engine: &Engine, args: &[String]) -> CommandResult {
    let filter = args.first().map(String::as_str);
    let session = engine
        .sessions()
        .open_existing(&engine.config().desktop_name)
        .map_err(|e| CommandError::Internal(e.to_string()))?;
    let windows = engine
        .resolver(session.as_ref())
        .enumerate_windows(WindowScope::Session, filter)
        .map_err(|e| CommandError::Internal(e.to_string()))?;
    window_list_json(windows)
}

fn launch_on_desk(engine: &Engine, args: &[String]) -> CommandResult {
    let exe = arg(args, 0, "exe")?;
    if exe.trim().is_empty() {
        return Err(CommandError::MissingArgument("exe"));
    }
    let name = &engine.config().desktop_name;
    engine
        .sessions()
        .ensure(name)
        .map_err(|e| CommandError::failed_with_error(EXIT_SESSION_UNAVAILABLE, &e))?;
    let pid = engine
        .resolver(None)
        .launch_process(exe, &args[1..], name)
        .map_err(|e| CommandError::failed_with_error(EXIT_TARGET_FAILED, &e))?;
    info!("launched {} as pid {} on '{}'", exe, pid, name);
    Ok(Some(pid.to_string()))
}

fn wait_for_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let pid: u32 = parse_arg(args, 0, "pid")?;
    let timeout = match args.get(1) {
        Some(_) => Duration::from_millis(parse_arg(args, 1, "timeoutMs")?),
        None => DEFAULT_WAIT_TIMEOUT,
    };
    let window = in_session(engine, |executor| {
        executor.resolver().wait_for_window_by_pid(pid, timeout)
    })
    .map_err(|e| {
        debug!("{}", e);
        CommandError::failed(EXIT_TARGET_FAILED)
    })?;
    Ok(Some(window.handle.to_string()))
}

fn focus_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let pid: u32 = parse_arg(args, 0, "pid")?;
    succeed_or(in_session(engine, |ex| ex.focus(pid)), EXIT_TARGET_FAILED)
}

fn invoke_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let pid: u32 = parse_arg(args, 0, "pid")?;
    let query = Query::parse(args.get(1).map(String::as_str).unwrap_or(""));
    succeed_or(in_session(engine, |ex| ex.invoke(pid, &query)), EXIT_TARGET_FAILED)
}

fn set_value_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let pid: u32 = parse_arg(args, 0, "pid")?;
    let query = Query::parse(arg(args, 1, "query")?);
    let text = arg(args, 2, "text")?;
    succeed_or(
        in_session(engine, |ex| ex.set_value(pid, &query, text)),
        EXIT_TARGET_FAILED,
    )
}

fn click_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let x: i32 = parse_arg(args, 0, "x")?;
    let y: i32 = parse_arg(args, 1, "y")?;
    let pid: u32 = parse_arg(args, 2, "pid")?;
    succeed_or(in_session(engine, |ex| ex.click(pid, x, y)), EXIT_TARGET_FAILED)
}

fn type_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let text = arg(args, 0, "text")?;
    let delay_ms: u64 = parse_arg(args, 1, "delayMs")?;
    let pid: u32 = parse_arg(args, 2, "pid")?;
    succeed_or(
        in_session(engine, |ex| ex.type_text(pid, text, delay_ms)),
        EXIT_TYPE_FAILED,
    )
}

fn hotkey_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let raw = arg(args, 0, "seq")?;
    let chords = parse_sequence(raw).map_err(|_| CommandError::InvalidArgument {
        name: "seq",
        value: raw.to_string(),
    })?;
    let pid: u32 = parse_arg(args, 1, "pid")?;
    succeed_or(in_session(engine, |ex| ex.hotkey(pid, &chords)), EXIT_HOTKEY_FAILED)
}

/// `x,y,delayMs;x,y,delayMs;...`; a missing delay is zero.
fn parse_segments(raw: &str) -> Option<Vec<PathPoint>> {
    let points = raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut fields = segment.split(',').map(str::trim);
            let x = fields.next()?.parse().ok()?;
            let y = fields.next()?.parse().ok()?;
            let delay_ms = match fields.next() {
                Some(d) => d.parse().ok()?,
                None => 0,
            };
            if fields.next().is_some() {
                return None;
            }
            Some(PathPoint { x, y, delay_ms })
        })
        .collect::<Option<Vec<_>>>()?;
    (!points.is_empty()).then_some(points)
}

fn mouse_path_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let raw = arg(args, 0, "segments")?;
    let path = parse_segments(raw).ok_or_else(|| CommandError::InvalidArgument {
        name: "segments",
        value: raw.to_string(),
    })?;
    let pid: u32 = parse_arg(args, 1, "pid")?;
    succeed_or(
        in_session(engine, |ex| ex.mouse_path(pid, &path)),
        EXIT_MOUSE_PATH_FAILED,
    )
}

fn drag_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let from = Point::new(parse_arg(args, 0, "x1")?, parse_arg(args, 1, "y1")?);
    let to = Point::new(parse_arg(args, 2, "x2")?, parse_arg(args, 3, "y2")?);
    let pid: u32 = parse_arg(args, 4, "pid")?;
    succeed_or(in_session(engine, |ex| ex.drag(pid, from, to)), EXIT_DRAG_FAILED)
}

fn scroll_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let delta: i32 = parse_arg(args, 0, "delta")?;
    if delta == 0 || delta.unsigned_abs() > MAX_SCROLL_NOTCHES {
        return Err(CommandError::InvalidArgument {
            name: "delta",
            value: delta.to_string(),
        });
    }
    let x: i32 = parse_arg(args, 1, "x")?;
    let y: i32 = parse_arg(args, 2, "y")?;
    let pid: u32 = parse_arg(args, 3, "pid")?;
    succeed_or(
        in_session(engine, |ex| ex.scroll(pid, delta, x, y)),
        EXIT_SCROLL_FAILED,
    )
}

fn cleanup_desktop(engine: &Engine, _args: &[String]) -> CommandResult {
    let name = &engine.config().desktop_name;
    let removed = engine.sessions().cleanup(name).map_err(|e| {
        warn!("cleanup of '{}' failed: {}", name, e);
        CommandError::failed(EXIT_FAILURE)
    })?;
    debug!("cleanup of '{}': removed={}", name, removed);
    Ok(None)
}

fn element_json(element: &crate::UIElement) -> CommandResult {
    serde_json::to_string(&element.to_serializable())
        .map(Some)
        .map_err(|e| CommandError::Internal(e.to_string()))
}

fn element_at_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let x: i32 = parse_arg(args, 0, "x")?;
    let y: i32 = parse_arg(args, 1, "y")?;
    let pid: u32 = parse_arg(args, 2, "pid")?;
    let transform = engine.transform();
    let found = in_session(engine, |ex| {
        let (window, root) = ex.resolver().root_for_pid(pid)?;
        let screen = transform.target_to_screen(window.handle, x, y)?;
        ex.locator().find_at_point(&root, screen.x, screen.y)
    });
    match found {
        Ok(Some(element)) => element_json(&element),
        Ok(None) => Err(CommandError::failed(EXIT_TARGET_FAILED)),
        Err(e) => {
            debug!("{}", e);
            Err(CommandError::failed(EXIT_TARGET_FAILED))
        }
    }
}

fn query_pid(engine: &Engine, args: &[String]) -> CommandResult {
    let pid: u32 = parse_arg(args, 0, "pid")?;
    let query = Query::parse(arg(args, 1, "query")?);
    let found = in_session(engine, |ex| {
        let (_, root) = ex.resolver().root_for_pid(pid)?;
        ex.locator().find_by_query(&root, &query)
    });
    match found {
        Ok(Some(element)) => element_json(&element),
        Ok(None) => Err(CommandError::failed(EXIT_TARGET_FAILED)),
        Err(e) => {
            debug!("{}", e);
            Err(CommandError::failed(EXIT_TARGET_FAILED))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_parse_with_optional_delay() {
        let path = parse_segments("10,20,5; 30,40").unwrap();
        assert_eq!(
            path,
            vec![
                PathPoint { x: 10, y: 20, delay_ms: 5 },
                PathPoint { x: 30, y: 40, delay_ms: 0 },
            ]
        );
        assert!(parse_segments("").is_none());
        assert!(parse_segments("1,2,3,4").is_none());
        assert!(parse_segments("a,b").is_none());
    }

    #[test]
    fn every_command_is_routable() {
        for name in command_names() {
            assert!(lookup(name).is_some(), "{name}");
        }
        assert!(lookup("CLICKPID").is_some());
        assert!(lookup("nosuchcommand").is_none());
    }

    #[test]
    fn error_json_carries_os_code() {
        let err = AutomationError::LaunchFailed {
            path: "x.exe".into(),
            message: "nope".into(),
            os_code: Some(2),
        };
        let value: serde_json::Value = serde_json::from_str(&error_json(&err)).unwrap();
        assert_eq!(value["code"], 2);
        assert!(value["error"].as_str().unwrap().contains("x.exe"));
    }
}
