use compose_core::{
    CommandOutcome, Document, Editor, FormatCommand, InlineStyle, InputEvent, Marks, Node,
    PluginRegistry, Point, Selection, SettleMode,
};

fn editor(doc: Document, anchor: Point, focus: Point) -> Editor {
    Editor::new(doc, Selection::new(anchor, focus), PluginRegistry::rich_text())
}

fn bold() -> Marks {
    Marks {
        bold: true,
        ..Marks::default()
    }
}

fn block_children(editor: &Editor, ix: usize) -> Vec<Node> {
    let Node::Element(el) = &editor.doc().children[ix] else {
        panic!("expected element block at {ix}");
    };
    el.children.clone()
}

#[test]
fn toggle_bold_splits_the_run_at_selection_bounds() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("hello world")]),
        Point::new(vec![0, 0], 6),
        Point::new(vec![0, 0], 11),
    );

    let outcome = editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Bold))
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Applied(SettleMode::Immediate));
    assert_eq!(
        block_children(&editor, 0),
        vec![Node::plain("hello "), Node::text("world", bold())]
    );
    assert_eq!(editor.selection().anchor, Point::new(vec![0, 1], 0));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1], 5));
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>hello <strong>world</strong></p>"
    );

    editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Bold))
        .unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello world")]);
}

#[test]
fn toggle_sets_the_mark_unless_every_covered_run_has_it() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph_with(vec![
            Node::text("ab", bold()),
            Node::plain("cd"),
        ])]),
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 1], 2),
    );

    editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Bold))
        .unwrap();
    assert_eq!(block_children(&editor, 0), vec![Node::text("abcd", bold())]);
}

#[test]
fn toggle_spans_multiple_blocks() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("one"), Node::paragraph("two")]),
        Point::new(vec![0, 0], 1),
        Point::new(vec![1, 0], 2),
    );

    editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Italic))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>o<em>ne</em></p><p><em>tw</em>o</p>"
    );
    assert_eq!(editor.doc().visible_text(), "one\ntwo");
}

#[test]
fn collapsed_toggle_inserts_a_marker_run_for_the_next_keystrokes() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("abcd")]),
        Point::new(vec![0, 0], 2),
        Point::new(vec![0, 0], 2),
    );

    editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Bold))
        .unwrap();
    assert_eq!(
        block_children(&editor, 0),
        vec![Node::plain("ab"), Node::text("", bold()), Node::plain("cd")]
    );
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 1], 0))
    );
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>ab<strong>\u{200b}</strong>cd</p>"
    );

    editor
        .handle_input(InputEvent::InsertText("X".to_string()))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>ab<strong>X</strong>cd</p>"
    );
}

#[test]
fn toggling_a_marker_back_off_merges_it_away() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("abcd")]),
        Point::new(vec![0, 0], 2),
        Point::new(vec![0, 0], 2),
    );

    let toggle = FormatCommand::ToggleInlineStyle(InlineStyle::Underline);
    editor.dispatch(toggle.clone()).unwrap();
    editor.dispatch(toggle).unwrap();

    assert_eq!(editor.doc().children, vec![Node::paragraph("abcd")]);
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 0], 2))
    );
}

#[test]
fn active_styles_follow_the_caret_and_require_full_coverage() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph_with(vec![
            Node::text("ab", bold()),
            Node::plain("cd"),
        ])]),
        Point::new(vec![0, 0], 1),
        Point::new(vec![0, 0], 1),
    );
    assert!(editor.active_styles().bold);
    assert!(editor.active_styles().has(InlineStyle::Bold));
    assert!(!editor.active_styles().italic);

    editor.set_selection(Selection::new(
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 1], 2),
    ));
    assert!(!editor.active_styles().bold);
}

#[test]
fn commands_deserialize_from_kind_and_value() {
    let command: FormatCommand = serde_json::from_value(serde_json::json!({
        "kind": "toggle-inline-style",
        "value": "strikethrough",
    }))
    .unwrap();
    assert_eq!(
        command,
        FormatCommand::ToggleInlineStyle(InlineStyle::Strikethrough)
    );

    assert_eq!(
        FormatCommand::from_parts("toggle-inline-style", Some("italic")).unwrap(),
        FormatCommand::ToggleInlineStyle(InlineStyle::Italic)
    );
    assert!(FormatCommand::from_parts("toggle-inline-style", Some("blink")).is_err());
    assert!(FormatCommand::from_parts("format-block", Some("h1")).is_err());
}
