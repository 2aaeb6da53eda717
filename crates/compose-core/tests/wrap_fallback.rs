use compose_core::{
    CommandError, CommandOutcome, ControlledValue, Document, Editor, FontSize, FormatCommand,
    Marks, Node, PluginRegistry, Point, Selection, SettleMode, TextColor, WrapStrategy,
    wrap_strategy,
};

fn editor(doc: Document, anchor: Point, focus: Point) -> Editor {
    Editor::new(doc, Selection::new(anchor, focus), PluginRegistry::rich_text())
}

fn link(url: &str) -> Marks {
    Marks {
        link: Some(url.to_string()),
        ..Marks::default()
    }
}

#[test]
fn strategy_depends_on_whether_the_range_stays_in_one_run() {
    let same = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 3));
    let across = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![0, 1], 1));
    assert_eq!(wrap_strategy(&same), WrapStrategy::Surround);
    assert_eq!(wrap_strategy(&across), WrapStrategy::ExtractReinsert);
}

#[test]
fn color_inside_one_run_surrounds_the_middle() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("hello world")]),
        Point::new(vec![0, 0], 3),
        Point::new(vec![0, 0], 8),
    );

    let outcome = editor
        .dispatch(FormatCommand::SetTextColor(TextColor::Red))
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Applied(SettleMode::Deferred));
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>hel<span style=\"color: #ff0000\">lo wo</span>rld</p>"
    );
    assert_eq!(editor.doc().visible_text(), "hello world");
}

#[test]
fn font_size_across_a_link_boundary_extracts_and_reinserts() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph_with(vec![
            Node::plain("plain "),
            Node::text("here", link("https://x.test")),
            Node::plain(" tail"),
        ])]),
        Point::new(vec![0, 0], 2),
        Point::new(vec![0, 1], 2),
    );

    editor
        .dispatch(FormatCommand::SetFontSize(FontSize::LARGE))
        .unwrap();

    assert_eq!(editor.doc().visible_text(), "plain here tail");
    let markup = editor.value().unwrap();
    assert_eq!(
        markup.as_str(),
        "<p>pl<span style=\"font-size: 24px\">ain </span><a href=\"https://x.test\"><span style=\"font-size: 24px\">he</span></a><a href=\"https://x.test\">re</a> tail</p>"
    );

    let reparsed = ControlledValue::from_document(&markup.to_document().unwrap()).unwrap();
    assert_eq!(reparsed, markup);
}

#[test]
fn fallback_preserves_text_across_blocks() {
    let mut editor = editor(
        Document::new(vec![
            Node::paragraph_with(vec![
                Node::plain("ab"),
                Node::text(
                    "cd",
                    Marks {
                        bold: true,
                        ..Marks::default()
                    },
                ),
            ]),
            Node::paragraph("ef"),
        ]),
        Point::new(vec![0, 1], 1),
        Point::new(vec![1, 0], 1),
    );

    editor
        .dispatch(FormatCommand::SetTextColor(TextColor::Blue))
        .unwrap();
    assert_eq!(editor.doc().visible_text(), "abcd\nef");
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>ab<strong>c</strong><span style=\"color: #0000ff\"><strong>d</strong></span></p><p><span style=\"color: #0000ff\">e</span>f</p>"
    );
}

#[test]
fn collapsed_caret_gets_a_sized_marker() {
    let mut editor = editor(
        Document::new(vec![Node::paragraph("ab")]),
        Point::new(vec![0, 0], 2),
        Point::new(vec![0, 0], 2),
    );

    editor
        .dispatch(FormatCommand::SetFontSize(FontSize::EXTRA_LARGE))
        .unwrap();
    assert_eq!(
        editor.value().unwrap().as_str(),
        "<p>ab<span style=\"font-size: 48px\">\u{200b}</span></p>"
    );
}

#[test]
fn reset_color_clears_only_the_color() {
    let marks = Marks {
        italic: true,
        text_color: Some(TextColor::Green),
        ..Marks::default()
    };
    let mut editor = editor(
        Document::new(vec![Node::paragraph_with(vec![Node::text("go", marks)])]),
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 2),
    );

    editor.dispatch(FormatCommand::ResetTextColor).unwrap();
    assert_eq!(editor.value().unwrap().as_str(), "<p><em>go</em></p>");
}

#[test]
fn values_outside_the_palette_are_rejected() {
    assert!(matches!(
        FormatCommand::from_parts("set-font-size", Some("15px")),
        Err(CommandError::OutsidePalette(_))
    ));
    assert!(matches!(
        FormatCommand::from_parts("set-text-color", Some("#123456")),
        Err(CommandError::OutsidePalette(_))
    ));
    assert_eq!(
        FormatCommand::from_parts("set-font-size", Some("5")).unwrap(),
        FormatCommand::SetFontSize(FontSize::LARGE)
    );
    assert_eq!(
        FormatCommand::from_parts("set-text-color", Some("Red")).unwrap(),
        FormatCommand::SetTextColor(TextColor::Red)
    );
}
