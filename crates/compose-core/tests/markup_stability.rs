use compose_core::{
    Alignment, ControlledValue, Editor, FontSize, FormatCommand, InlineStyle, InputEvent,
    ListKind, Node, PluginRegistry, Point, Selection, TextColor, from_html, to_html,
};

fn editor(markup: &str, anchor: Point, focus: Point) -> Editor {
    let doc = ControlledValue::new(markup).to_document().unwrap();
    Editor::new(doc, Selection::new(anchor, focus), PluginRegistry::rich_text())
}

fn caret(markup: &str, point: Point) -> Editor {
    editor(markup, point.clone(), point)
}

fn at(offset: usize) -> Point {
    Point::new(vec![0, 0], offset)
}

/// Serializes the editor and checks that parsing the markup and writing it
/// again gives back the same bytes.
fn assert_stable(editor: &Editor) -> String {
    assert_no_terminators(&editor.doc().children);
    let first = to_html(editor.doc()).unwrap();
    let second = to_html(&from_html(&first).unwrap()).unwrap();
    assert_eq!(second, first, "markup changed after a reload");
    first
}

fn assert_no_terminators(nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(t) => assert!(
                !t.text.contains(['\n', '\r']),
                "text leaf holds a line terminator: {:?}",
                t.text
            ),
            Node::Element(el) => assert_no_terminators(&el.children),
            Node::Void(_) => {}
        }
    }
}

fn commands() -> Vec<FormatCommand> {
    let mut all: Vec<FormatCommand> = Vec::new();
    all.extend(InlineStyle::ALL.map(FormatCommand::ToggleInlineStyle));
    all.extend(Alignment::ALL.map(FormatCommand::SetBlockAlignment));
    all.extend([ListKind::Bulleted, ListKind::Ordered].map(FormatCommand::ToggleList));
    all.extend(FontSize::MENU.map(|(size, _)| FormatCommand::SetFontSize(size)));
    all.extend(TextColor::ALL.map(FormatCommand::SetTextColor));
    all.extend([
        FormatCommand::InsertLink("https://docs.test".to_string()),
        FormatCommand::InsertImage("https://img.test/x.png".to_string()),
        FormatCommand::InsertLiteralText("a\nb".to_string()),
        FormatCommand::InsertLiteralText("😀".to_string()),
        FormatCommand::RemoveLink,
        FormatCommand::ResetTextColor,
    ]);
    all
}

fn inputs() -> Vec<InputEvent> {
    vec![
        InputEvent::InsertText("z".to_string()),
        InputEvent::InsertText("a\nb".to_string()),
        InputEvent::InsertText("a\r\nb\rc".to_string()),
        InputEvent::DeleteBackward,
        InputEvent::DeleteForward,
        InputEvent::InsertParagraph,
        InputEvent::InsertLineBreak,
    ]
}

#[test]
fn every_command_leaves_stable_markup() {
    for command in commands() {
        let mut over_range = editor("<p>Hello world</p>", at(0), at(5));
        over_range.dispatch(command.clone()).unwrap();
        assert_stable(&over_range);

        let mut at_caret = caret("<p>Hello world</p>", at(5));
        at_caret.dispatch(command.clone()).unwrap();
        assert_stable(&at_caret);

        // typing after the command exercises any marker it left behind
        at_caret
            .handle_input(InputEvent::InsertText("x\ny".to_string()))
            .unwrap();
        assert_stable(&at_caret);
    }
}

#[test]
fn every_input_event_leaves_stable_markup() {
    for event in inputs() {
        for point in [at(0), at(3), at(5)] {
            let mut editor = caret("<p><strong>Hello</strong></p>", point);
            editor.handle_input(event.clone()).unwrap();
            assert_stable(&editor);
        }

        let mut over_range = editor("<p>Hello world</p>", at(2), at(8));
        over_range.handle_input(event.clone()).unwrap();
        assert_stable(&over_range);
    }
}

#[test]
fn newline_typed_after_a_bold_marker() {
    let mut editor = caret("<p>x</p>", at(1));
    editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Bold))
        .unwrap();
    editor
        .handle_input(InputEvent::InsertText("a\n".to_string()))
        .unwrap();

    assert_eq!(
        assert_stable(&editor),
        "<p>x<strong>a</strong><br/><br/></p>"
    );
}

#[test]
fn carriage_returns_become_line_breaks() {
    let mut editor = caret("<p>x</p>", at(1));
    editor
        .handle_input(InputEvent::InsertText("a\r\nb".to_string()))
        .unwrap();
    assert_eq!(assert_stable(&editor), "<p>xa<br/>b</p>");

    let mut editor = caret("<p>x</p>", at(1));
    editor
        .dispatch(FormatCommand::InsertLiteralText("a\rb".to_string()))
        .unwrap();
    assert_eq!(assert_stable(&editor), "<p>xa<br/>b</p>");
}

#[test]
fn newlines_inside_formatted_runs() {
    for markup in [
        "<p><strong>bold</strong></p>",
        "<p><a href=\"https://docs.test\">link</a></p>",
        "<p><span style=\"color: #ff0000\">red</span></p>",
        "<p><span style=\"font-size: 24px\"><em>big</em></span></p>",
    ] {
        let mut editor = caret(markup, at(2));
        editor
            .handle_input(InputEvent::InsertText("1\n2".to_string()))
            .unwrap();
        let written = assert_stable(&editor);
        assert!(
            !written.contains("<br/></"),
            "break left inside formatting: {written}"
        );

        let mut editor = caret(markup, at(2));
        editor.handle_input(InputEvent::InsertLineBreak).unwrap();
        editor
            .dispatch(FormatCommand::InsertLiteralText("\n".to_string()))
            .unwrap();
        assert_stable(&editor);
    }
}

#[test]
fn formatted_newline_keeps_marks_on_both_sides() {
    let mut editor = caret("<p><strong>ab</strong></p>", at(1));
    editor
        .handle_input(InputEvent::InsertText("\n".to_string()))
        .unwrap();

    assert_eq!(
        assert_stable(&editor),
        "<p><strong>a</strong><br/><strong>b</strong></p>"
    );
}

#[test]
fn markers_and_images_survive_a_reload() {
    let mut editor = caret("<p>Hello world</p>", at(5));
    editor
        .dispatch(FormatCommand::ToggleInlineStyle(InlineStyle::Italic))
        .unwrap();
    editor
        .dispatch(FormatCommand::SetTextColor(TextColor::Blue))
        .unwrap();
    assert_stable(&editor);

    editor
        .dispatch(FormatCommand::InsertImage("https://img.test/x.png".to_string()))
        .unwrap();
    assert_stable(&editor);

    editor.handle_input(InputEvent::InsertLineBreak).unwrap();
    editor
        .handle_input(InputEvent::InsertText("tail".to_string()))
        .unwrap();
    assert_stable(&editor);

    editor
        .dispatch(FormatCommand::ToggleList(ListKind::Ordered))
        .unwrap();
    editor.handle_input(InputEvent::InsertParagraph).unwrap();
    assert_stable(&editor);
}
