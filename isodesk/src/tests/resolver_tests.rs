//! Window discovery, scope gating and pid polling

use super::{window_root, Harness};
use crate::config::CapabilityFlags;
use crate::errors::AutomationError;
use crate::platforms::memory::{MemoryApp, MemoryElement};
use crate::types::{Rect, WindowScope};
use std::time::Duration;

fn fallback() -> CapabilityFlags {
    CapabilityFlags {
        allow_interactive_fallback: true,
        ..CapabilityFlags::default()
    }
}

#[test]
fn session_scope_is_empty_without_a_session() {
    let h = Harness::new(CapabilityFlags::default());
    h.session_window(4100, "Form", window_root());

    let windows = h
        .engine
        .resolver(None)
        .enumerate_windows(WindowScope::Session, None)
        .unwrap();
    assert!(windows.is_empty());
}

#[test]
fn session_scope_lists_only_session_windows() {
    let h = Harness::new(CapabilityFlags::default());
    h.platform.add_window(None, 77, "Explorer", Rect::new(0, 0, 10, 10), window_root());
    let handle = h.session_window(4100, "Form", window_root());

    let session = h.engine.sessions().open_existing(&h.desktop_name()).unwrap();
    let windows = h
        .engine
        .resolver(session.as_ref())
        .enumerate_windows(WindowScope::Session, None)
        .unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].handle, handle);
    assert_eq!(windows[0].owner_pid, 4100);
}

#[test]
fn interactive_scope_requires_the_fallback_gate() {
    let closed = Harness::new(CapabilityFlags::default());
    closed
        .platform
        .add_window(None, 77, "Explorer", Rect::new(0, 0, 10, 10), window_root());
    assert!(closed
        .engine
        .resolver(None)
        .enumerate_windows(WindowScope::All, None)
        .unwrap()
        .is_empty());

    let open = Harness::new(fallback());
    open.platform
        .add_window(None, 77, "Explorer", Rect::new(0, 0, 10, 10), window_root());
    assert_eq!(
        open.engine
            .resolver(None)
            .enumerate_windows(WindowScope::All, None)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn title_filter_is_case_insensitive_substring() {
    let h = Harness::new(fallback());
    h.platform.add_window(None, 1, "Untitled - Notepad", Rect::new(0, 0, 10, 10), window_root());
    h.platform.add_window(None, 2, "Calculator", Rect::new(0, 0, 10, 10), window_root());

    let resolver = h.engine.resolver(None);
    let hits = resolver.enumerate_windows(WindowScope::All, Some("NOTEPAD")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].owner_pid, 1);

    let all = resolver.enumerate_windows(WindowScope::All, Some("  ")).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn pid_lookup_prefers_titled_windows() {
    let h = Harness::new(CapabilityFlags::default());
    h.session_window(4100, "", window_root());
    let titled = h.session_window(4100, "Main", window_root());

    let session = h.engine.sessions().open_existing(&h.desktop_name()).unwrap();
    let found = h
        .engine
        .resolver(session.as_ref())
        .find_window_by_pid(4100)
        .unwrap()
        .unwrap();
    assert_eq!(found.handle, titled);
}

#[test]
fn pid_lookup_falls_back_to_interactive_only_when_allowed() {
    let closed = Harness::new(CapabilityFlags::default());
    closed
        .platform
        .add_window(None, 77, "Explorer", Rect::new(0, 0, 10, 10), window_root());
    assert!(closed.engine.resolver(None).find_window_by_pid(77).unwrap().is_none());

    let open = Harness::new(fallback());
    open.platform
        .add_window(None, 77, "Explorer", Rect::new(0, 0, 10, 10), window_root());
    assert!(open.engine.resolver(None).find_window_by_pid(77).unwrap().is_some());
}

#[test]
fn wait_returns_once_the_window_appears() {
    let h = Harness::new(CapabilityFlags::default());
    h.platform.register_app(
        "slow.exe",
        MemoryApp::new("Slow", || MemoryElement::new("Window")).reveal_after(3),
    );
    let name = h.desktop_name();
    h.engine.sessions().ensure(&name).unwrap();
    let pid = h
        .engine
        .resolver(None)
        .launch_process("C:\\Tools\\slow.exe", &[], &name)
        .unwrap();

    let session = h.engine.sessions().open_existing(&name).unwrap();
    let window = h
        .engine
        .resolver(session.as_ref())
        .wait_for_window_by_pid(pid, Duration::from_secs(5))
        .unwrap();
    assert_eq!(window.owner_pid, pid);
    assert_eq!(window.title, "Slow");
    assert_eq!(h.clock.sleeps().len(), 3);
}

#[test]
fn wait_never_gives_up_before_the_timeout() {
    let h = Harness::new(CapabilityFlags::default());
    h.engine.sessions().ensure(&h.desktop_name()).unwrap();
    let session = h.engine.sessions().open_existing(&h.desktop_name()).unwrap();
    let timeout = Duration::from_millis(250);

    let err = h
        .engine
        .resolver(session.as_ref())
        .wait_for_window_by_pid(9999, timeout)
        .unwrap_err();

    assert!(matches!(err, AutomationError::Timeout(_)));
    assert!(h.clock.elapsed() >= timeout);
    let poll = h.engine.config().poll_interval;
    assert!(h.clock.sleeps().iter().all(|s| *s <= poll));
}

#[test]
fn focus_window_focuses_the_root() {
    let h = Harness::new(CapabilityFlags::default());
    let root = window_root();
    h.session_window(4100, "Form", root.clone());

    let session = h.engine.sessions().open_existing(&h.desktop_name()).unwrap();
    h.engine
        .resolver(session.as_ref())
        .focus_window(4100)
        .unwrap();
    assert_eq!(root.actions(), vec![crate::platforms::memory::ElementAction::Focused]);
    assert!(h.platform.activations().is_empty());
}

#[test]
fn root_for_unknown_pid_is_window_not_found() {
    let h = Harness::new(CapabilityFlags::default());
    let err = h.engine.resolver(None).root_for_pid(1).unwrap_err();
    assert!(matches!(err, AutomationError::WindowNotFound(_)));
}
