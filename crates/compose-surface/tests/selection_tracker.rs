use std::cell::RefCell;
use std::rc::Rc;

use compose_core::{Document, Editor, EditorConfig, Node, Point, Selection};
use compose_surface::{
    EditingSurface, EditorProps, MemorySelection, MicrotaskQueue, SelectionProvider,
    SelectionTracker, TrackedSelection,
};

fn editor(blocks: &[&str]) -> Editor {
    let doc = Document::new(blocks.iter().map(|text| Node::paragraph(*text)).collect());
    Editor::rich_text(doc, EditorConfig::default())
}

fn range(start: (usize, usize), end: (usize, usize)) -> Selection {
    Selection::new(
        Point::new(vec![start.0, 0], start.1),
        Point::new(vec![end.0, 0], end.1),
    )
}

#[test]
fn capture_is_empty_without_a_host_selection() {
    let editor = editor(&["one"]);
    let host = MemorySelection::new();
    assert_eq!(SelectionTracker::capture(&host, &editor), None);
}

#[test]
fn restoring_nothing_is_a_no_op() {
    let mut editor = editor(&["one", "two"]);
    editor.set_selection(range((0, 1), (0, 2)));
    let mut host = MemorySelection::new();

    SelectionTracker::restore(&mut host, &mut editor, None);

    assert_eq!(editor.selection(), &range((0, 1), (0, 2)));
    assert_eq!(host.get(), None);
}

#[test]
fn valid_selection_round_trips() {
    let mut editor = editor(&["one", "two"]);
    let mut host = MemorySelection::new();
    host.set(Some(range((0, 1), (1, 2))));

    let tracked = SelectionTracker::capture(&host, &editor);
    host.set(None);
    SelectionTracker::restore(&mut host, &mut editor, tracked.as_ref());

    assert_eq!(editor.selection(), &range((0, 1), (1, 2)));
    assert_eq!(host.get(), Some(range((0, 1), (1, 2))));
}

#[test]
fn stale_positions_collapse_to_the_end() {
    let mut editor = editor(&["one", "two"]);
    let mut host = MemorySelection::new();
    let stale = TrackedSelection {
        document: editor.document_id(),
        selection: range((0, 0), (5, 1)),
    };

    SelectionTracker::restore(&mut host, &mut editor, Some(&stale));

    let end = Selection::collapsed(Point::new(vec![1, 0], 3));
    assert_eq!(editor.selection(), &end);
    assert_eq!(host.get(), Some(end));
}

#[test]
fn offsets_inside_a_character_are_stale() {
    let mut editor = editor(&["héllo"]);
    let mut host = MemorySelection::new();
    let split = TrackedSelection {
        document: editor.document_id(),
        selection: Selection::collapsed(Point::new(vec![0, 0], 2)),
    };

    SelectionTracker::restore(&mut host, &mut editor, Some(&split));

    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 0], 6))
    );
}

#[test]
fn selection_from_another_document_is_not_trusted() {
    let source = editor(&["same text"]);
    let mut target = editor(&["same text"]);
    let mut host = MemorySelection::new();
    host.set(Some(range((0, 0), (0, 4))));

    let tracked = SelectionTracker::capture(&host, &source);
    SelectionTracker::restore(&mut host, &mut target, tracked.as_ref());

    let end = Selection::collapsed(Point::new(vec![0, 0], 9));
    assert_eq!(target.selection(), &end);
    assert_eq!(host.get(), Some(end));
}

#[test]
fn memory_selection_clones_share_state() {
    let host = MemorySelection::new();
    let mut other = host.clone();
    other.restore(Some(&range((0, 0), (0, 1))));
    assert_eq!(host.capture(), Some(range((0, 0), (0, 1))));
}

fn mount(value: &str, host: &MemorySelection) -> (EditingSurface, Rc<RefCell<Vec<String>>>) {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    let surface = EditingSurface::builder(EditorProps::new(value), Rc::new(MicrotaskQueue::new()))
        .selection_provider(host.clone())
        .on_change(move |markup| sink.borrow_mut().push(markup.to_string()))
        .mount();
    (surface, changes)
}

#[test]
fn blur_keeps_the_host_selection_around_serialization() {
    let host = MemorySelection::new();
    let (surface, changes) = mount("<p>Hello world</p>", &host);
    surface.focus();
    host.set(Some(range((0, 0), (0, 5))));

    surface.blur();

    assert!(!surface.is_focused());
    assert_eq!(changes.borrow().as_slice(), ["<p>Hello world</p>"]);
    assert_eq!(host.get(), Some(range((0, 0), (0, 5))));
}

#[test]
fn refocus_restores_the_selection_from_blur() {
    let host = MemorySelection::new();
    let (surface, _) = mount("<p>Hello world</p>", &host);
    surface.focus();
    host.set(Some(range((0, 6), (0, 11))));
    surface.blur();
    host.set(None);

    surface.focus();

    assert_eq!(host.get(), Some(range((0, 6), (0, 11))));
    assert_eq!(
        surface.with_editor(|e| e.selection().clone()),
        Some(range((0, 6), (0, 11)))
    );
}

#[test]
fn refocus_after_rehydration_lands_at_the_end() {
    let host = MemorySelection::new();
    let (surface, _) = mount("<p>Hello world</p>", &host);
    surface.focus();
    host.set(Some(range((0, 0), (0, 5))));
    surface.blur();

    assert!(surface.set_value("<p>Bye</p>"));
    assert_eq!(host.get(), None);
    surface.focus();

    let end = Selection::collapsed(Point::new(vec![0, 0], 3));
    assert_eq!(host.get(), Some(end.clone()));
    assert_eq!(surface.view().unwrap().selection, Some(end));
}
