use std::cell::RefCell;
use std::rc::Rc;

use compose_core::{
    CommandOutcome, FormatCommand, InputEvent, Point, Selection, SettleMode, TextColor,
};
use compose_surface::{
    EditingSurface, EditorProps, MemorySelection, MicrotaskQueue, SurfaceConfig,
};

const RED_HELLO: &str = "<p><span style=\"color: #ff0000\">Hello</span></p>";

struct Harness {
    surface: EditingSurface,
    queue: MicrotaskQueue,
    host: MemorySelection,
    changes: Rc<RefCell<Vec<String>>>,
}

fn mount_with(value: &str, config: SurfaceConfig) -> Harness {
    let queue = MicrotaskQueue::new();
    let host = MemorySelection::new();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    let surface = EditingSurface::builder(EditorProps::new(value), Rc::new(queue.clone()))
        .config(config)
        .selection_provider(host.clone())
        .on_change(move |markup| sink.borrow_mut().push(markup.to_string()))
        .mount();
    Harness {
        surface,
        queue,
        host,
        changes,
    }
}

/// Mounted, focused, with "Hello" selected.
fn selected_hello() -> Harness {
    let h = mount_with("<p>Hello</p>", SurfaceConfig::default());
    h.surface.focus();
    h.host.set(Some(Selection::new(
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 5),
    )));
    h
}

#[test]
fn color_reports_on_the_next_turn() {
    let h = selected_hello();

    let outcome = h
        .surface
        .apply(FormatCommand::SetTextColor(TextColor::Red))
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Applied(SettleMode::Deferred));
    assert!(h.changes.borrow().is_empty());
    assert!(h.surface.has_pending_settle());
    assert_eq!(h.queue.pending(), 1);
    // The document already carries the change.
    assert_eq!(h.surface.view().unwrap().markup, RED_HELLO);

    assert_eq!(h.queue.run_pending(), 1);
    assert_eq!(h.changes.borrow().as_slice(), [RED_HELLO]);
    assert!(!h.surface.has_pending_settle());
}

#[test]
fn next_event_flushes_the_pending_settle_first() {
    let h = selected_hello();
    h.surface
        .apply(FormatCommand::SetTextColor(TextColor::Red))
        .unwrap();

    h.host
        .set(Some(Selection::collapsed(Point::new(vec![0, 0], 5))));
    h.surface
        .input(InputEvent::InsertText("!".to_string()))
        .unwrap();

    assert_eq!(
        h.changes.borrow().as_slice(),
        [
            RED_HELLO,
            "<p><span style=\"color: #ff0000\">Hello!</span></p>"
        ]
    );

    // The queued task finds nothing left to do.
    h.queue.run_pending();
    assert_eq!(h.changes.borrow().len(), 2);
}

#[test]
fn unmount_turns_pending_work_into_a_no_op() {
    let h = selected_hello();
    h.surface
        .apply(FormatCommand::SetTextColor(TextColor::Red))
        .unwrap();

    assert_eq!(h.surface.unmount(), "<p>Hello</p>");
    h.queue.run_pending();

    assert!(h.changes.borrow().is_empty());
    assert_eq!(h.surface.view(), None);
    assert!(
        !h.surface
            .input(InputEvent::InsertText("x".to_string()))
            .unwrap()
    );
}

#[test]
fn dropped_surface_is_not_touched_by_its_task() {
    let Harness {
        surface,
        queue,
        host,
        changes,
    } = selected_hello();
    drop(host);
    surface
        .apply(FormatCommand::SetTextColor(TextColor::Red))
        .unwrap();

    drop(surface);
    assert_eq!(queue.run_pending(), 1);
    assert!(changes.borrow().is_empty());
}

#[test]
fn rehydration_cancels_a_pending_settle() {
    let h = selected_hello();
    h.surface
        .apply(FormatCommand::SetFontSize(compose_core::FontSize::LARGE))
        .unwrap();

    assert!(h.surface.set_value("<p>Other</p>"));
    assert!(!h.surface.has_pending_settle());
    h.queue.run_pending();

    assert!(h.changes.borrow().is_empty());
    assert_eq!(h.surface.view().unwrap().markup, "<p>Other</p>");
}

#[test]
fn synchronous_settle_when_deferral_is_off() {
    let h = mount_with(
        "<p>Hello</p>",
        SurfaceConfig {
            defer_wrap_settle: false,
            ..SurfaceConfig::default()
        },
    );
    h.surface.focus();
    h.host.set(Some(Selection::new(
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 5),
    )));

    h.surface
        .apply(FormatCommand::SetTextColor(TextColor::Red))
        .unwrap();

    assert_eq!(h.changes.borrow().as_slice(), [RED_HELLO]);
    assert_eq!(h.queue.pending(), 0);
}

#[test]
fn reports_raised_inside_on_change_arrive_after_it() {
    let queue = MicrotaskQueue::new();
    let host = MemorySelection::new();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let slot: Rc<RefCell<Option<EditingSurface>>> = Rc::new(RefCell::new(None));

    let sink = changes.clone();
    let reenter = slot.clone();
    let surface = EditingSurface::builder(EditorProps::new("<p>a</p>"), Rc::new(queue.clone()))
        .selection_provider(host.clone())
        .on_change(move |markup| {
            sink.borrow_mut().push(markup.to_string());
            let surface = reenter.borrow_mut().take();
            if let Some(surface) = surface {
                // The owner edits from inside its own callback.
                surface
                    .input(InputEvent::InsertText("c".to_string()))
                    .unwrap();
                surface
                    .apply(FormatCommand::InsertLiteralText("d".to_string()))
                    .unwrap();
            }
        })
        .mount();
    *slot.borrow_mut() = Some(surface.clone());

    surface.focus();
    surface
        .input(InputEvent::InsertText("b".to_string()))
        .unwrap();

    assert_eq!(
        changes.borrow().as_slice(),
        ["<p>ab</p>", "<p>abc</p>", "<p>abcd</p>"]
    );
    assert_eq!(surface.value(), "<p>abcd</p>");
    assert_eq!(changes.borrow().last().unwrap(), &surface.value());
}
