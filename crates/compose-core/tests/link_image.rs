use compose_core::{
    CommandOutcome, Document, Editor, FormatCommand, InputEvent, Marks, Node, PluginRegistry,
    Point, Selection,
};

fn editor(doc: Document, anchor: Point, focus: Point) -> Editor {
    Editor::new(doc, Selection::new(anchor, focus), PluginRegistry::rich_text())
}

fn caret(doc: Document, point: Point) -> Editor {
    editor(doc, point.clone(), point)
}

fn link(url: &str) -> Marks {
    Marks {
        link: Some(url.to_string()),
        ..Marks::default()
    }
}

#[test]
fn link_over_a_range_marks_the_covered_text() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("see docs")]),
        Point::new(vec![0, 0], 4),
        Point::new(vec![0, 0], 8),
    );

    editor
        .dispatch(FormatCommand::InsertLink(" https://docs.test ".to_string()))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>see <a href=\"https://docs.test\">docs</a></p>"
    );
}

#[test]
fn link_at_a_caret_inserts_the_url_and_leaves_the_caret_outside() {
    let mut editor = caret(
        Document::new(vec![Node::paragraph("go ")]),
        Point::new(vec![0, 0], 3),
    );

    editor
        .dispatch(FormatCommand::InsertLink("https://a.test".to_string()))
        .unwrap();
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 2], 0))
    );

    editor
        .handle_input(InputEvent::InsertText("now".to_string()))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>go <a href=\"https://a.test\">https://a.test</a>now</p>"
    );
}

#[test]
fn empty_or_cancelled_urls_change_nothing() {
    let mut editor = caret(
        Document::new(vec![Node::paragraph("text")]),
        Point::new(vec![0, 0], 2),
    );
    let before = editor.doc().clone();

    for command in [
        FormatCommand::InsertLink(String::new()),
        FormatCommand::InsertLink("   ".to_string()),
        FormatCommand::InsertImage(String::new()),
        FormatCommand::from_parts("insert-image", None).unwrap(),
    ] {
        assert_eq!(editor.dispatch(command).unwrap(), CommandOutcome::Unchanged);
    }
    assert_eq!(editor.doc(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn remove_link_at_caret_unlinks_the_whole_run() {
    let mut editor = caret(
        Document::new(vec![Node::paragraph_with(vec![
            Node::plain("see "),
            Node::text("docs", link("https://docs.test")),
        ])]),
        Point::new(vec![0, 1], 1),
    );

    editor.dispatch(FormatCommand::RemoveLink).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("see docs")]);
    assert_eq!(
        editor.dispatch(FormatCommand::RemoveLink).unwrap(),
        CommandOutcome::Unchanged
    );
}

#[test]
fn image_goes_after_the_focused_block_with_a_fresh_paragraph() {
    let mut editor = caret(
        Document::new(vec![Node::paragraph("a"), Node::paragraph("b")]),
        Point::new(vec![0, 0], 1),
    );

    editor
        .dispatch(FormatCommand::InsertImage("https://img.test/x.png".to_string()))
        .unwrap();
    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("a"),
            Node::image("https://img.test/x.png", None),
            Node::paragraph(""),
            Node::paragraph("b"),
        ]
    );
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![2, 0], 0))
    );
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>a</p><img src=\"https://img.test/x.png\"/><p><br/></p><p>b</p>"
    );
}

#[test]
fn image_splits_the_block_at_the_caret() {
    let mut editor = caret(
        Document::new(vec![Node::paragraph("Hello world")]),
        Point::new(vec![0, 0], 5),
    );

    editor
        .dispatch(FormatCommand::InsertImage("x.png".to_string()))
        .unwrap();
    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("Hello"),
            Node::image("x.png", None),
            Node::paragraph(" world"),
        ]
    );
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![2, 0], 0))
    );
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>Hello</p><img src=\"x.png\"/><p> world</p>"
    );
}

#[test]
fn image_replaces_the_selected_text() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("Hello world")]),
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 5),
    );

    editor
        .dispatch(FormatCommand::InsertImage("x.png".to_string()))
        .unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::image("x.png", None), Node::paragraph(" world")]
    );
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![1, 0], 0))
    );
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<img src=\"x.png\"/><p> world</p>"
    );

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("Hello world")]);
}

#[test]
fn image_over_a_range_across_blocks_joins_the_outer_halves() {
    let mut editor = editor(
        Document::new(vec![
            Node::paragraph("one"),
            Node::paragraph("mid"),
            Node::paragraph("two"),
        ]),
        Point::new(vec![0, 0], 2),
        Point::new(vec![2, 0], 1),
    );

    editor
        .dispatch(FormatCommand::InsertImage("x.png".to_string()))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>on</p><img src=\"x.png\"/><p>wo</p>"
    );
}

#[test]
fn image_in_a_list_item_keeps_the_tail_in_the_list() {
    let mut editor = caret(
        Document::new(vec![Node::list_item("bulleted", vec![Node::plain("ab")])]),
        Point::new(vec![0, 0], 1),
    );

    editor
        .dispatch(FormatCommand::InsertImage("x.png".to_string()))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<ul><li>a</li></ul><img src=\"x.png\"/><ul><li>b</li></ul>"
    );
}

#[test]
fn literal_text_lands_at_the_caret_with_the_caret_after_it() {
    let mut editor = caret(
        Document::new(vec![Node::paragraph("ab")]),
        Point::new(vec![0, 0], 1),
    );

    editor
        .dispatch(FormatCommand::InsertLiteralText("😀".to_string()))
        .unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("a😀b")]);
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 0], 1 + "😀".len()))
    );
}

#[test]
fn literal_text_replaces_a_range() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("hello world")]),
        Point::new(vec![0, 0], 5),
        Point::new(vec![0, 0], 0),
    );

    editor
        .dispatch(FormatCommand::InsertLiteralText("bye".to_string()))
        .unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("bye world")]);
    assert_eq!(
        editor.selection(),
        &Selection::collapsed(Point::new(vec![0, 0], 3))
    );

    assert_eq!(
        editor
            .dispatch(FormatCommand::InsertLiteralText(String::new()))
            .unwrap(),
        CommandOutcome::Unchanged
    );
}

#[test]
fn literal_text_inherits_the_caret_run_marks() {
    let bold = Marks {
        bold: true,
        ..Marks::default()
    };
    let mut editor = caret(
        Document::new(vec![Node::paragraph_with(vec![Node::text("ab", bold.clone())])]),
        Point::new(vec![0, 0], 2),
    );

    editor
        .dispatch(FormatCommand::InsertLiteralText("🎉".to_string()))
        .unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph_with(vec![Node::text("ab🎉", bold)])]
    );
}
