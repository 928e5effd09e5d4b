//! Named desktop session lifecycle

use super::{window_root, Harness};
use crate::config::CapabilityFlags;
use crate::platforms::DesktopBackend;
use crate::types::{DesktopHandle, Rect};

#[test]
fn reopening_does_not_create_a_second_desktop() {
    let h = Harness::new(CapabilityFlags::default());
    let sessions = h.engine.sessions();

    let first = sessions.open_or_create("agent").unwrap();
    let second = sessions.open_or_create("agent").unwrap();
    assert_eq!(h.platform.desktops_created(), 1);
    assert_ne!(first.desktop(), second.desktop());

    drop(first);
    drop(second);
    sessions.ensure("agent").unwrap();
    assert_eq!(h.platform.desktops_created(), 1);
    assert!(h.platform.desktop_exists("agent"));
}

#[test]
fn dropping_a_handle_keeps_the_named_desktop() {
    let h = Harness::new(CapabilityFlags::default());
    let sessions = h.engine.sessions();

    sessions.ensure("agent").unwrap();
    assert_eq!(h.platform.open_handle_count(), 0);
    assert!(h.platform.desktop_exists("agent"));
    assert!(sessions.open_existing("agent").unwrap().is_some());
}

#[test]
fn open_existing_never_creates() {
    let h = Harness::new(CapabilityFlags::default());
    assert!(h.engine.sessions().open_existing("ghost").unwrap().is_none());
    assert_eq!(h.platform.desktops_created(), 0);
}

#[test]
fn switch_in_is_restored_on_drop() {
    let h = Harness::new(CapabilityFlags::default());
    let original = h.platform.thread_desktop().unwrap();

    {
        let mut session = h.engine.sessions().open_or_create("agent").unwrap();
        session.switch_in().unwrap();
        session.switch_in().unwrap();
        assert!(session.is_active());
        assert_eq!(h.platform.thread_desktop().unwrap(), session.desktop());
    }

    assert_eq!(h.platform.thread_desktop().unwrap(), original);
    assert_eq!(h.platform.open_handle_count(), 0);
}

#[test]
fn thread_association_is_per_thread() {
    let h = Harness::new(CapabilityFlags::default());
    let mut session = h.engine.sessions().open_or_create("agent").unwrap();
    session.switch_in().unwrap();

    let platform = h.platform.clone();
    let other = std::thread::spawn(move || platform.thread_desktop().unwrap())
        .join()
        .unwrap();
    assert_eq!(other, DesktopHandle(1));
    assert_eq!(h.platform.thread_desktop().unwrap(), session.desktop());
}

#[test]
fn cleanup_removes_the_desktop_and_its_windows() {
    let h = Harness::new(CapabilityFlags::default());
    let window = h.session_window(4100, "Form", window_root());
    let name = h.desktop_name();

    assert!(h.engine.sessions().cleanup(&name).unwrap());
    assert!(!h.platform.desktop_exists(&name));
    assert!(h.platform.window_root(window).is_none());
    assert_eq!(h.platform.open_handle_count(), 0);

    assert!(!h.engine.sessions().cleanup(&name).unwrap());
}

#[test]
fn cleanup_leaves_interactive_windows_alone() {
    let h = Harness::new(CapabilityFlags::default());
    let desk = h.platform.add_window(None, 77, "Explorer", Rect::new(0, 0, 10, 10), window_root());
    h.session_window(4100, "Form", window_root());

    h.engine.sessions().cleanup(&h.desktop_name()).unwrap();
    assert!(h.platform.window_root(desk).is_some());
}

#[test]
fn creation_failure_carries_the_os_code() {
    let h = Harness::new(CapabilityFlags::default());
    h.platform.deny_desktop_creation(true);

    let err = h.engine.sessions().open_or_create("agent").unwrap_err();
    assert_eq!(err.os_code(), Some(5));
    assert!(!h.platform.desktop_exists("agent"));
}

#[test]
fn enter_session_switches_only_when_the_desktop_exists() {
    let h = Harness::new(CapabilityFlags::default());
    assert!(h.engine.enter_session().unwrap().is_none());
    assert_eq!(h.platform.thread_desktop().unwrap(), DesktopHandle(1));

    h.engine.sessions().ensure(&h.desktop_name()).unwrap();
    let session = h.engine.enter_session().unwrap().unwrap();
    assert!(session.is_active());
    assert_eq!(h.platform.thread_desktop().unwrap(), session.desktop());
}
