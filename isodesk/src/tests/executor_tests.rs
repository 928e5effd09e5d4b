//! Capability dispatch and the gated legacy fallback

use super::{window_root, Harness};
use crate::config::CapabilityFlags;
use crate::executor::legacy::{PathPoint, MAX_DRAG_STEPS, MAX_SCROLL_NOTCHES, WHEEL_DELTA};
use crate::executor::{Action, CapabilityChain};
use crate::keys::{parse_sequence, VK_CONTROL};
use crate::locator::ElementLocator;
use crate::platforms::memory::{ElementAction, MemoryElement};
use crate::selector::Query;
use crate::types::{Capability, MouseButton, Point, RawInput, Rect, ScrollDirection};

const PID: u32 = 4100;

fn legacy_all() -> CapabilityFlags {
    CapabilityFlags {
        allow_legacy_input: true,
        allow_legacy_hotkeys: true,
        allow_legacy_pointer: true,
        ..CapabilityFlags::default()
    }
}

fn events(h: &Harness) -> Vec<RawInput> {
    h.platform.input_events().into_iter().map(|(_, e)| e).collect()
}

fn without_focus(actions: Vec<ElementAction>) -> Vec<ElementAction> {
    actions
        .into_iter()
        .filter(|a| *a != ElementAction::Focused)
        .collect()
}

#[test]
fn standard_chain_order() {
    let chain = CapabilityChain::standard(ElementLocator::new());
    assert_eq!(
        chain.names(),
        vec!["invoke", "select-item", "toggle", "default-action", "set-value", "scroll"]
    );
}

#[test]
fn first_working_capability_wins() {
    let chain = CapabilityChain::standard(ElementLocator::new());

    let both = MemoryElement::new("Button")
        .capability(Capability::Invoke)
        .capability(Capability::Toggle);
    assert_eq!(chain.execute(&both.to_ui_element(), &Action::Activate), Ok("invoke"));
    assert_eq!(without_focus(both.actions()), vec![ElementAction::Invoked]);

    let broken = MemoryElement::new("CheckBox")
        .failing(Capability::Invoke)
        .capability(Capability::Toggle);
    assert_eq!(chain.execute(&broken.to_ui_element(), &Action::Activate), Ok("toggle"));
    assert_eq!(without_focus(broken.actions()), vec![ElementAction::Toggled]);
}

#[test]
fn every_tier_focuses_before_acting() {
    let chain = CapabilityChain::standard(ElementLocator::new());
    let item = MemoryElement::new("ListItem").capability(Capability::SelectItem);

    chain.execute(&item.to_ui_element(), &Action::Activate).unwrap();
    assert_eq!(
        item.actions(),
        vec![ElementAction::Focused, ElementAction::Focused, ElementAction::Selected]
    );
}

#[test]
fn exhausted_chain_reports_each_tier() {
    let chain = CapabilityChain::standard(ElementLocator::new());
    let label = MemoryElement::new("Text");

    let err = chain.execute(&label.to_ui_element(), &Action::Activate).unwrap_err();
    for tier in ["invoke", "select-item", "toggle", "default-action"] {
        assert!(err.0.contains(tier), "{err}");
    }
    assert!(!err.0.contains("set-value"));
}

#[test]
fn read_only_controls_reject_values() {
    let chain = CapabilityChain::standard(ElementLocator::new());
    let locked = MemoryElement::new("Edit")
        .capability(Capability::SetValue)
        .value("fixed")
        .read_only(true);

    let action = Action::SetValue {
        text: "new".to_string(),
        append: false,
    };
    assert!(chain.execute(&locked.to_ui_element(), &action).is_err());
    assert_eq!(locked.current_value(), "fixed");
}

#[test]
fn append_fails_when_the_value_cannot_be_read() {
    let chain = CapabilityChain::standard(ElementLocator::new());
    let field = MemoryElement::new("Edit")
        .capability(Capability::SetValue)
        .value("secret")
        .unreadable();

    let append = Action::SetValue {
        text: "!".to_string(),
        append: true,
    };
    assert!(chain.execute(&field.to_ui_element(), &append).is_err());
    assert_eq!(field.current_value(), "secret");

    let replace = Action::SetValue {
        text: "plain".to_string(),
        append: false,
    };
    assert_eq!(chain.execute(&field.to_ui_element(), &replace), Ok("set-value"));
    assert_eq!(field.current_value(), "plain");
}

#[test]
fn oversized_scroll_is_not_attempted() {
    let chain = CapabilityChain::standard(ElementLocator::new());
    let list = MemoryElement::new("List").capability(Capability::Scroll);

    let action = Action::Scroll {
        direction: ScrollDirection::Increment,
        notches: MAX_SCROLL_NOTCHES + 1,
    };
    assert!(chain.execute(&list.to_ui_element(), &action).is_err());
    assert!(without_focus(list.actions()).is_empty());
}

#[test]
fn invoke_by_query_and_root() {
    let h = Harness::new(CapabilityFlags::default());
    let save = MemoryElement::new("Button")
        .name("Save")
        .capability(Capability::Invoke);
    let root = window_root()
        .capability(Capability::LegacyDefaultAction)
        .child(save.clone());
    h.session_window(PID, "Form", root.clone());

    let session = h.engine.enter_session().unwrap();
    let executor = h.engine.executor(session.as_ref());

    assert!(executor.invoke(PID, &Query::parse("name:Save")));
    assert!(save.actions().contains(&ElementAction::Invoked));

    assert!(executor.invoke(PID, &Query::parse("")));
    assert!(root.actions().contains(&ElementAction::DefaultAction));

    assert!(!executor.invoke(PID, &Query::parse("name:Missing")));
}

#[test]
fn set_value_replaces_and_respects_read_only() {
    let h = Harness::new(CapabilityFlags::default());
    let field = MemoryElement::new("Edit")
        .automation_id("email")
        .capability(Capability::SetValue)
        .value("old");
    let locked = MemoryElement::new("Edit")
        .automation_id("id")
        .capability(Capability::SetValue)
        .value("42")
        .read_only(true);
    h.session_window(PID, "Form", window_root().child(field.clone()).child(locked.clone()));

    let session = h.engine.enter_session().unwrap();
    let executor = h.engine.executor(session.as_ref());

    assert!(executor.set_value(PID, &Query::parse("aid:email"), "a@b.c"));
    assert_eq!(field.current_value(), "a@b.c");

    assert!(!executor.set_value(PID, &Query::parse("aid:id"), "7"));
    assert_eq!(locked.current_value(), "42");
}

#[test]
fn click_prefers_the_element_under_the_point() {
    let h = Harness::new(legacy_all());
    let button = MemoryElement::new("Button")
        .bounds(Rect::new(100, 100, 80, 30))
        .capability(Capability::Invoke);
    h.session_window(PID, "Form", window_root().child(button.clone()));

    let session = h.engine.enter_session().unwrap();
    assert!(h.engine.executor(session.as_ref()).click(PID, 120, 110));
    assert!(button.actions().contains(&ElementAction::Invoked));
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn click_without_element_and_closed_gate_posts_nothing() {
    let h = Harness::new(CapabilityFlags::default());
    h.session_window(PID, "Form", window_root());

    let session = h.engine.enter_session().unwrap();
    assert!(!h.engine.executor(session.as_ref()).click(PID, 100, 100));
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn legacy_click_uses_client_coordinates() {
    let h = Harness::new(legacy_all());
    let window = h.session_window(PID, "Form", window_root());
    h.platform.set_client_rect(window, Rect::new(8, 31, 784, 561));

    let session = h.engine.enter_session().unwrap();
    assert!(h.engine.executor(session.as_ref()).click(PID, 108, 131));

    let events: Vec<RawInput> = h.platform.input_events().into_iter().map(|(_, e)| e).collect();
    assert_eq!(
        events,
        vec![
            RawInput::MouseMove { x: 100, y: 100 },
            RawInput::ButtonDown { button: MouseButton::Left, x: 100, y: 100 },
            RawInput::ButtonUp { button: MouseButton::Left, x: 100, y: 100 },
        ]
    );
}

#[test]
fn typing_appends_to_the_focused_field_first() {
    let h = Harness::new(CapabilityFlags::default());
    let first = MemoryElement::new("Edit")
        .capability(Capability::SetValue)
        .value("one");
    let focused = MemoryElement::new("Edit")
        .capability(Capability::SetValue)
        .value("two");
    h.session_window(PID, "Form", window_root().child(first.clone()).child(focused.clone()));
    h.platform.set_focused(Some(focused.clone()));

    let session = h.engine.enter_session().unwrap();
    assert!(h.engine.executor(session.as_ref()).type_text(PID, "+x", 0));
    assert_eq!(focused.current_value(), "two+x");
    assert_eq!(first.current_value(), "one");
}

#[test]
fn typing_falls_back_to_the_first_editable_field() {
    let h = Harness::new(CapabilityFlags::default());
    let field = MemoryElement::new("Edit")
        .capability(Capability::SetValue)
        .value("abc");
    h.session_window(PID, "Form", window_root().child(field.clone()));
    h.platform.set_focused(Some(MemoryElement::new("Edit").capability(Capability::SetValue)));

    let session = h.engine.enter_session().unwrap();
    assert!(h.engine.executor(session.as_ref()).type_text(PID, "def", 0));
    assert_eq!(field.current_value(), "abcdef");
}

#[test]
fn legacy_typing_is_gated() {
    let closed = Harness::new(CapabilityFlags::default());
    closed.session_window(PID, "Form", window_root());
    let session = closed.engine.enter_session().unwrap();
    assert!(!closed.engine.executor(session.as_ref()).type_text(PID, "hi", 5));
    assert!(closed.platform.input_events().is_empty());
    drop(session);

    let open = Harness::new(legacy_all());
    open.session_window(PID, "Form", window_root());
    let session = open.engine.enter_session().unwrap();
    assert!(open.engine.executor(session.as_ref()).type_text(PID, "hi", 5));
    let chars: Vec<RawInput> = open.platform.input_events().into_iter().map(|(_, e)| e).collect();
    assert_eq!(chars, vec![RawInput::Char('h'), RawInput::Char('i')]);
    assert!(open
        .clock
        .sleeps()
        .iter()
        .all(|d| d.as_millis() == 5));
}

#[test]
fn enter_activates_the_default_button() {
    let h = Harness::new(CapabilityFlags::default());
    let ok = MemoryElement::new("Button")
        .capability(Capability::Invoke)
        .default_button(true);
    h.session_window(PID, "Dialog", window_root().child(ok.clone()));

    let session = h.engine.enter_session().unwrap();
    let chords = parse_sequence("{ENTER}").unwrap();
    assert!(h.engine.executor(session.as_ref()).hotkey(PID, &chords));
    assert!(ok.actions().contains(&ElementAction::Invoked));
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn chords_need_the_hotkey_gate() {
    let chords = parse_sequence("ctrl+a").unwrap();

    let closed = Harness::new(CapabilityFlags::default());
    closed.session_window(PID, "Form", window_root());
    let session = closed.engine.enter_session().unwrap();
    assert!(!closed.engine.executor(session.as_ref()).hotkey(PID, &chords));
    assert!(closed.platform.input_events().is_empty());
    drop(session);

    let open = Harness::new(legacy_all());
    open.session_window(PID, "Form", window_root());
    let session = open.engine.enter_session().unwrap();
    assert!(open.engine.executor(session.as_ref()).hotkey(PID, &chords));
    let keys: Vec<RawInput> = open.platform.input_events().into_iter().map(|(_, e)| e).collect();
    assert_eq!(
        keys,
        vec![
            RawInput::KeyDown { vk: VK_CONTROL, system: false },
            RawInput::KeyDown { vk: 0x41, system: false },
            RawInput::KeyUp { vk: 0x41, system: false },
            RawInput::KeyUp { vk: VK_CONTROL, system: false },
        ]
    );
}

#[test]
fn drag_with_closed_gate_emits_no_moves() {
    let h = Harness::new(CapabilityFlags::default());
    h.session_window(PID, "Canvas", window_root());

    let session = h.engine.enter_session().unwrap();
    let ok = h
        .engine
        .executor(session.as_ref())
        .drag(PID, Point::new(0, 0), Point::new(100, 100));
    assert!(!ok);
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn drag_steps_along_the_longer_axis() {
    let h = Harness::new(legacy_all());
    h.session_window(PID, "Canvas", window_root());

    let session = h.engine.enter_session().unwrap();
    assert!(h
        .engine
        .executor(session.as_ref())
        .drag(PID, Point::new(10, 10), Point::new(14, 12)));

    let events: Vec<RawInput> = h.platform.input_events().into_iter().map(|(_, e)| e).collect();
    assert_eq!(events.len(), 2 + 4 + 1);
    assert_eq!(events[0], RawInput::MouseMove { x: 10, y: 10 });
    assert_eq!(
        events[1],
        RawInput::ButtonDown { button: MouseButton::Left, x: 10, y: 10 }
    );
    assert_eq!(events[5], RawInput::MouseMove { x: 14, y: 12 });
    assert_eq!(
        events[6],
        RawInput::ButtonUp { button: MouseButton::Left, x: 14, y: 12 }
    );
}

#[test]
fn long_drag_walks_every_pixel_and_releases() {
    let h = Harness::new(CapabilityFlags::all());
    h.session_window(PID, "Canvas", window_root());

    let session = h.engine.enter_session().unwrap();
    assert!(h
        .engine
        .executor(session.as_ref())
        .drag(PID, Point::new(0, 0), Point::new(50_000, 0)));

    let events = events(&h);
    assert_eq!(events.len(), 50_000 + 3);
    assert!(events.iter().all(RawInput::is_pointer));
    assert_eq!(
        events.last(),
        Some(&RawInput::ButtonUp { button: MouseButton::Left, x: 50_000, y: 0 })
    );
}

#[test]
fn drag_across_the_coordinate_range_is_rejected_up_front() {
    let h = Harness::new(legacy_all());
    h.session_window(PID, "Canvas", window_root());

    let session = h.engine.enter_session().unwrap();
    let executor = h.engine.executor(session.as_ref());
    assert!(!executor.drag(PID, Point::new(i32::MIN, 0), Point::new(i32::MAX, 0)));
    let far = i32::try_from(MAX_DRAG_STEPS).unwrap() + 1;
    assert!(!executor.drag(PID, Point::new(0, 0), Point::new(0, far)));
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn failed_drag_still_releases_the_button() {
    let h = Harness::new(legacy_all());
    h.session_window(PID, "Canvas", window_root());
    // Move, press, three steps, then the fourth step fails.
    h.platform.fail_input_at(5);

    let session = h.engine.enter_session().unwrap();
    assert!(!h
        .engine
        .executor(session.as_ref())
        .drag(PID, Point::new(10, 10), Point::new(30, 10)));

    let events = events(&h);
    assert_eq!(events.len(), 6);
    assert_eq!(events[4], RawInput::MouseMove { x: 13, y: 10 });
    assert_eq!(
        events[5],
        RawInput::ButtonUp { button: MouseButton::Left, x: 13, y: 10 }
    );
}

#[test]
fn mouse_path_waits_between_stops() {
    let h = Harness::new(legacy_all());
    h.session_window(PID, "Canvas", window_root());

    let session = h.engine.enter_session().unwrap();
    let path = [
        PathPoint { x: 1, y: 2, delay_ms: 30 },
        PathPoint { x: 3, y: 4, delay_ms: 0 },
    ];
    assert!(h.engine.executor(session.as_ref()).mouse_path(PID, &path));
    assert_eq!(h.platform.input_events().len(), 2);
    assert_eq!(h.clock.elapsed().as_millis(), 30);
}

#[test]
fn scroll_uses_the_scrollable_ancestor() {
    let h = Harness::new(CapabilityFlags::default());
    let row = MemoryElement::new("ListItem").bounds(Rect::new(10, 10, 200, 20));
    let list = MemoryElement::new("List")
        .bounds(Rect::new(0, 0, 300, 300))
        .capability(Capability::Scroll)
        .child(row);
    h.session_window(PID, "List", window_root().child(list.clone()));

    let session = h.engine.enter_session().unwrap();
    let executor = h.engine.executor(session.as_ref());
    assert!(executor.scroll(PID, 2, 20, 15));
    assert!(executor.scroll(PID, -1, 20, 15));
    assert_eq!(
        without_focus(list.actions()),
        vec![
            ElementAction::Scrolled(ScrollDirection::Decrement),
            ElementAction::Scrolled(ScrollDirection::Decrement),
            ElementAction::Scrolled(ScrollDirection::Increment),
        ]
    );
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn scroll_falls_back_to_the_wheel_when_allowed() {
    let closed = Harness::new(CapabilityFlags::default());
    closed.session_window(PID, "Static", window_root());
    let session = closed.engine.enter_session().unwrap();
    assert!(!closed.engine.executor(session.as_ref()).scroll(PID, 3, 5, 5));
    assert!(closed.platform.input_events().is_empty());
    drop(session);

    let open = Harness::new(legacy_all());
    open.session_window(PID, "Static", window_root());
    let session = open.engine.enter_session().unwrap();
    assert!(open.engine.executor(session.as_ref()).scroll(PID, -3, 5, 5));
    let events: Vec<RawInput> = open.platform.input_events().into_iter().map(|(_, e)| e).collect();
    assert_eq!(
        events,
        vec![RawInput::Wheel { delta: -3 * WHEEL_DELTA, x: 5, y: 5 }]
    );
}

#[test]
fn large_wheel_deltas_are_split() {
    let h = Harness::new(legacy_all());
    h.session_window(PID, "Static", window_root());

    let session = h.engine.enter_session().unwrap();
    assert!(h.engine.executor(session.as_ref()).scroll(PID, -600, 5, 5));
    let deltas: Vec<i32> = events(&h)
        .into_iter()
        .map(|e| match e {
            RawInput::Wheel { delta, x: 5, y: 5 } => delta,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(
        deltas,
        vec![-273 * WHEEL_DELTA, -273 * WHEEL_DELTA, -54 * WHEEL_DELTA]
    );
    assert!(deltas.iter().all(|d| i16::try_from(*d).is_ok()));
}

#[test]
fn scroll_beyond_the_notch_limit_fails() {
    let h = Harness::new(legacy_all());
    let list = MemoryElement::new("List")
        .bounds(Rect::new(0, 0, 300, 300))
        .capability(Capability::Scroll);
    h.session_window(PID, "List", window_root().child(list.clone()));

    let session = h.engine.enter_session().unwrap();
    assert!(!h.engine.executor(session.as_ref()).scroll(PID, i32::MIN, 20, 15));
    assert!(without_focus(list.actions()).is_empty());
    assert!(h.platform.input_events().is_empty());
}

#[test]
fn focus_reports_missing_windows() {
    let h = Harness::new(CapabilityFlags::default());
    h.session_window(PID, "Form", window_root());

    let session = h.engine.enter_session().unwrap();
    let executor = h.engine.executor(session.as_ref());
    assert!(executor.focus(PID));
    assert!(!executor.focus(PID + 1));
}

#[test]
fn pointer_moves_respect_the_gate() {
    let closed = Harness::new(CapabilityFlags::default());
    let window = closed.session_window(PID, "Canvas", window_root());
    let err = closed.engine.legacy_input().move_to(window, 10, 10).unwrap_err();
    assert!(matches!(err, crate::errors::AutomationError::PermissionDenied(_)));
    assert!(closed.platform.input_events().is_empty());

    let open = Harness::new(legacy_all());
    let window = open.session_window(PID, "Canvas", window_root());
    open.platform.set_client_rect(window, Rect::new(4, 4, 792, 592));
    open.engine.legacy_input().move_to(window, 10, 10).unwrap();
    assert_eq!(
        open.platform.input_events(),
        vec![(window, RawInput::MouseMove { x: 6, y: 6 })]
    );
}
