use serde::{Deserialize, Serialize};

use crate::core::{
    ApplyError, AttrPatch, Attrs, Editor, ElementNode, LIST_ITEM, Marks, Node, PARAGRAPH, Point,
    Selection, TextNode, clamp_to_char_boundary,
};
use crate::ops::{Op, Transaction};
use crate::palette::{FontSize, PaletteError, TextColor};
use crate::text::{
    TextBlock, apply_marks_in_block, covered_text_leaves, has_line_break, inline_text_nodes,
    is_point_in_block, locate, pad_voids_with_text, point_for_global_offset, point_global_offset,
    replace_children_ops, slice_inline, split_inline, text_blocks_in_order, total_inline_text_len,
};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command kind: {0}")]
    UnknownKind(String),
    #[error("Command {0} requires a value")]
    MissingValue(&'static str),
    #[error("Invalid value for {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },
    #[error("Value outside the palette: {0}")]
    OutsidePalette(#[from] PaletteError),
    #[error("Invalid selection: {0}")]
    InvalidSelection(&'static str),
    #[error("Failed to apply command: {0}")]
    Apply(#[from] ApplyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineStyle {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}

impl InlineStyle {
    pub const ALL: [InlineStyle; 4] = [
        InlineStyle::Bold,
        InlineStyle::Italic,
        InlineStyle::Underline,
        InlineStyle::Strikethrough,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InlineStyle::Bold => "bold",
            InlineStyle::Italic => "italic",
            InlineStyle::Underline => "underline",
            InlineStyle::Strikethrough => "strikethrough",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn get(self, marks: &Marks) -> bool {
        match self {
            InlineStyle::Bold => marks.bold,
            InlineStyle::Italic => marks.italic,
            InlineStyle::Underline => marks.underline,
            InlineStyle::Strikethrough => marks.strikethrough,
        }
    }

    pub fn set(self, marks: &mut Marks, on: bool) {
        match self {
            InlineStyle::Bold => marks.bold = on,
            InlineStyle::Italic => marks.italic = on,
            InlineStyle::Underline => marks.underline = on,
            InlineStyle::Strikethrough => marks.strikethrough = on,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub const ALL: [Alignment; 4] = [
        Alignment::Left,
        Alignment::Center,
        Alignment::Right,
        Alignment::Justify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|align| align.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// The block attribute value; left alignment is stored as no attribute.
    pub fn attr(self) -> Option<&'static str> {
        match self {
            Alignment::Left => None,
            other => Some(other.as_str()),
        }
    }

    pub fn from_attr(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Bulleted,
    Ordered,
}

impl ListKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::Bulleted => "bulleted",
            ListKind::Ordered => "ordered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bulleted" | "bullet" | "unordered" => Some(ListKind::Bulleted),
            "ordered" | "numbered" => Some(ListKind::Ordered),
            _ => None,
        }
    }

    pub fn of(el: &ElementNode) -> Option<Self> {
        if el.kind != LIST_ITEM {
            return None;
        }
        el.attr_str("list_type").and_then(Self::parse)
    }
}

/// A formatting request, built fresh for each interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum FormatCommand {
    ToggleInlineStyle(InlineStyle),
    SetBlockAlignment(Alignment),
    ToggleList(ListKind),
    SetFontSize(FontSize),
    SetTextColor(TextColor),
    InsertLink(String),
    InsertImage(String),
    InsertLiteralText(String),
    RemoveLink,
    ResetTextColor,
}

/// When the surface should report the document after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleMode {
    Immediate,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied(SettleMode),
    Unchanged,
}

impl CommandOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, CommandOutcome::Applied(_))
    }
}

impl FormatCommand {
    /// Builds a command from its wire kind and raw value.
    pub fn from_parts(kind: &str, value: Option<&str>) -> Result<Self, CommandError> {
        let require = |name: &'static str| value.ok_or(CommandError::MissingValue(name));
        let invalid = |name: &'static str, raw: &str| CommandError::InvalidValue {
            kind: name,
            value: raw.to_string(),
        };

        let command = match kind {
            "toggle-inline-style" => {
                let raw = require("toggle-inline-style")?;
                let style =
                    InlineStyle::parse(raw).ok_or_else(|| invalid("toggle-inline-style", raw))?;
                FormatCommand::ToggleInlineStyle(style)
            }
            "set-block-alignment" => {
                let raw = require("set-block-alignment")?;
                let align =
                    Alignment::parse(raw).ok_or_else(|| invalid("set-block-alignment", raw))?;
                FormatCommand::SetBlockAlignment(align)
            }
            "toggle-list" => {
                let raw = require("toggle-list")?;
                let list = ListKind::parse(raw).ok_or_else(|| invalid("toggle-list", raw))?;
                FormatCommand::ToggleList(list)
            }
            "set-font-size" => {
                let raw = require("set-font-size")?.trim();
                let size = match raw.parse::<u8>() {
                    Ok(level) => FontSize::try_from(level)?,
                    Err(_) => FontSize::from_css(raw)
                        .ok_or_else(|| PaletteError::FontSize(raw.to_string()))?,
                };
                FormatCommand::SetFontSize(size)
            }
            "set-text-color" => {
                let raw = require("set-text-color")?;
                FormatCommand::SetTextColor(TextColor::try_from(raw.to_string())?)
            }
            // A cancelled prompt arrives as no value and dispatches as a no-op.
            "insert-link" => FormatCommand::InsertLink(value.unwrap_or_default().to_string()),
            "insert-image" => FormatCommand::InsertImage(value.unwrap_or_default().to_string()),
            "insert-literal-text" => {
                FormatCommand::InsertLiteralText(require("insert-literal-text")?.to_string())
            }
            "remove-link" => FormatCommand::RemoveLink,
            "reset-text-color" => FormatCommand::ResetTextColor,
            other => return Err(CommandError::UnknownKind(other.to_string())),
        };
        Ok(command)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FormatCommand::ToggleInlineStyle(_) => "toggle-inline-style",
            FormatCommand::SetBlockAlignment(_) => "set-block-alignment",
            FormatCommand::ToggleList(_) => "toggle-list",
            FormatCommand::SetFontSize(_) => "set-font-size",
            FormatCommand::SetTextColor(_) => "set-text-color",
            FormatCommand::InsertLink(_) => "insert-link",
            FormatCommand::InsertImage(_) => "insert-image",
            FormatCommand::InsertLiteralText(_) => "insert-literal-text",
            FormatCommand::RemoveLink => "remove-link",
            FormatCommand::ResetTextColor => "reset-text-color",
        }
    }

    /// Wrap-style commands restyle through a replaced subtree, so the
    /// surface reports them one turn later.
    pub fn settle_mode(&self) -> SettleMode {
        match self {
            FormatCommand::SetFontSize(_)
            | FormatCommand::SetTextColor(_)
            | FormatCommand::ResetTextColor => SettleMode::Deferred,
            _ => SettleMode::Immediate,
        }
    }
}

/// How a range restyle rewrites the affected runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapStrategy {
    /// The range lies in one run: split it into prefix, middle and suffix.
    Surround,
    /// The range crosses run boundaries: lift the covered content out,
    /// restyle it and put it back in place.
    ExtractReinsert,
}

pub fn wrap_strategy(selection: &Selection) -> WrapStrategy {
    if selection.anchor.path == selection.focus.path {
        WrapStrategy::Surround
    } else {
        WrapStrategy::ExtractReinsert
    }
}

/// Styles in effect at the selection, as a toolbar shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActiveStyles {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub link: Option<String>,
    pub font_size: Option<FontSize>,
    pub text_color: Option<TextColor>,
    pub alignment: Alignment,
    pub list: Option<ListKind>,
}

impl ActiveStyles {
    pub fn has(&self, style: InlineStyle) -> bool {
        match style {
            InlineStyle::Bold => self.bold,
            InlineStyle::Italic => self.italic,
            InlineStyle::Underline => self.underline,
            InlineStyle::Strikethrough => self.strikethrough,
        }
    }
}

impl Editor {
    pub fn dispatch(&mut self, command: FormatCommand) -> Result<CommandOutcome, CommandError> {
        tracing::debug!(kind = command.kind(), ?command, "dispatching format command");

        let settle = command.settle_mode();
        let source = format!("command:{}", command.kind());
        let tx = match command {
            FormatCommand::ToggleInlineStyle(style) => toggle_inline_style(self, style)?,
            FormatCommand::SetBlockAlignment(align) => set_block_alignment(self, align)?,
            FormatCommand::ToggleList(list) => toggle_list(self, list)?,
            FormatCommand::SetFontSize(size) => wrap_selection(self, &move |mut marks: Marks| {
                marks.font_size = Some(size);
                marks
            })?,
            FormatCommand::SetTextColor(color) => wrap_selection(self, &move |mut marks: Marks| {
                marks.text_color = Some(color);
                marks
            })?,
            FormatCommand::ResetTextColor => wrap_selection(self, &|mut marks: Marks| {
                marks.text_color = None;
                marks
            })?,
            FormatCommand::InsertLink(url) => insert_link(self, &single_line_url(&url))?,
            FormatCommand::RemoveLink => remove_link(self)?,
            FormatCommand::InsertImage(url) => insert_image(self, &single_line_url(&url))?,
            FormatCommand::InsertLiteralText(text) => insert_literal_text(self, &text)?,
        };

        let Some(tx) = tx.filter(|tx| !tx.is_empty()) else {
            tracing::debug!(%source, "command left the document unchanged");
            return Ok(CommandOutcome::Unchanged);
        };
        self.apply(tx.source(source))?;
        Ok(CommandOutcome::Applied(settle))
    }

    pub fn active_styles(&self) -> ActiveStyles {
        self.active_styles_at(self.selection())
    }

    /// Styles in effect at `sel`. A style counts at a caret when the caret's
    /// run has it, and across a range only when every covered run has it.
    pub fn active_styles_at(&self, sel: &Selection) -> ActiveStyles {
        let mut styles = ActiveStyles::default();

        if let Some((block, _)) = locate(self.doc(), self.registry(), &sel.focus) {
            styles.alignment = Alignment::from_attr(block.el.attr_str("align"));
            styles.list = ListKind::of(block.el);
        }

        let mut leaves: Vec<&TextNode> = Vec::new();
        if !sel.is_collapsed() {
            if let Ok(range) = SelectedRange::resolve(self, sel) {
                for (block, start, end) in range.segments() {
                    leaves.extend(covered_text_leaves(&block.el.children, start, end));
                }
            }
        }
        if leaves.is_empty() {
            if let Some(t) = self.doc().text_at(&sel.focus.path) {
                leaves.push(t);
            }
        }
        let Some(first) = leaves.first() else {
            return styles;
        };

        styles.bold = leaves.iter().all(|t| t.marks.bold);
        styles.italic = leaves.iter().all(|t| t.marks.italic);
        styles.underline = leaves.iter().all(|t| t.marks.underline);
        styles.strikethrough = leaves.iter().all(|t| t.marks.strikethrough);
        styles.font_size = first
            .marks
            .font_size
            .filter(|size| leaves.iter().all(|t| t.marks.font_size == Some(*size)));
        styles.text_color = first
            .marks
            .text_color
            .filter(|color| leaves.iter().all(|t| t.marks.text_color == Some(*color)));
        styles.link = first
            .marks
            .link
            .clone()
            .filter(|link| leaves.iter().all(|t| t.marks.link.as_ref() == Some(link)));
        styles
    }
}

/// The text blocks a selection touches with the global bounds inside the
/// first and last of them.
struct SelectedRange<'a> {
    blocks: Vec<TextBlock<'a>>,
    first: usize,
    last: usize,
    start: usize,
    end: usize,
    start_point: Point,
}

impl<'a> SelectedRange<'a> {
    fn resolve(editor: &'a Editor, sel: &Selection) -> Result<Self, CommandError> {
        let (start, end) = sel.ordered();
        let (start_block, start_global) = locate(editor.doc(), editor.registry(), &start)
            .ok_or(CommandError::InvalidSelection("start is not in a text block"))?;
        let (end_block, end_global) = locate(editor.doc(), editor.registry(), &end)
            .ok_or(CommandError::InvalidSelection("end is not in a text block"))?;

        let blocks = text_blocks_in_order(editor.doc(), editor.registry());
        let position = |block: &TextBlock<'_>| blocks.iter().position(|b| b.path == block.path);
        let first = position(&start_block)
            .ok_or(CommandError::InvalidSelection("start is not in a text block"))?;
        let last = position(&end_block)
            .ok_or(CommandError::InvalidSelection("end is not in a text block"))?;

        Ok(Self {
            blocks,
            first,
            last,
            start: start_global,
            end: end_global,
            start_point: start,
        })
    }

    fn segments(&self) -> Vec<(&TextBlock<'a>, usize, usize)> {
        self.blocks[self.first..=self.last]
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let ix = self.first + i;
                let start = if ix == self.first { self.start } else { 0 };
                let end = if ix == self.last {
                    self.end
                } else {
                    total_inline_text_len(&block.el.children)
                };
                (block, start, end)
            })
            .collect()
    }
}

fn toggle_inline_style(
    editor: &Editor,
    style: InlineStyle,
) -> Result<Option<Transaction>, CommandError> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return marker_at_caret(editor, &|mut marks: Marks| {
            let on = !style.get(&marks);
            style.set(&mut marks, on);
            marks
        });
    }

    let range = SelectedRange::resolve(editor, &sel)?;
    let all_set = range.segments().into_iter().all(|(block, start, end)| {
        covered_text_leaves(&block.el.children, start, end)
            .iter()
            .all(|t| style.get(&t.marks))
    });
    let target = !all_set;
    Ok(restyle_range(
        &sel,
        &range,
        WrapStrategy::Surround,
        &|mut marks: Marks| {
            style.set(&mut marks, target);
            marks
        },
    ))
}

fn wrap_selection(
    editor: &Editor,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<Option<Transaction>, CommandError> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return marker_at_caret(editor, apply);
    }

    let strategy = wrap_strategy(&sel);
    if strategy == WrapStrategy::ExtractReinsert {
        tracing::debug!("selection crosses run boundaries, restyling by extract and reinsert");
    }
    let range = SelectedRange::resolve(editor, &sel)?;
    Ok(restyle_range(&sel, &range, strategy, apply))
}

/// Restyles every covered run, rewriting each touched block's children and
/// mapping the selection onto the new runs.
fn restyle_range(
    sel: &Selection,
    range: &SelectedRange<'_>,
    strategy: WrapStrategy,
    apply: &dyn Fn(Marks) -> Marks,
) -> Option<Transaction> {
    let mut ops: Vec<Op> = Vec::new();
    let mut anchor = sel.anchor.clone();
    let mut focus = sel.focus.clone();

    for (block, start, end) in range.segments() {
        if start >= end {
            continue;
        }
        let children = block.el.children.as_slice();
        let new_children = match strategy {
            WrapStrategy::Surround => apply_marks_in_block(children, start, end, apply),
            WrapStrategy::ExtractReinsert => extract_reinsert(children, start, end, apply),
        };
        if new_children == children {
            continue;
        }

        for point in [&mut anchor, &mut focus] {
            if is_point_in_block(point, &block.path) {
                let child_ix = point.path.last().copied().unwrap_or(0);
                let global = point_global_offset(children, child_ix, point.offset);
                *point = point_for_global_offset(&block.path, &new_children, global);
            }
        }
        ops.extend(replace_children_ops(&block.path, children.len(), new_children));
    }

    if ops.is_empty() {
        return None;
    }
    Some(Transaction::new(ops).selection_after(Selection::new(anchor, focus)))
}

fn extract_reinsert(
    children: &[Node],
    start: usize,
    end: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    let (before, _) = split_inline(children, start);
    let (_, after) = split_inline(children, end);
    let extracted = slice_inline(children, start, end);

    let mut out = before;
    out.extend(extracted.into_iter().map(|node| match node {
        Node::Text(t) => Node::text(t.text, apply(t.marks)),
        other => other,
    }));
    out.extend(after);
    out
}

/// Puts an empty run carrying the new marks at the caret so only text typed
/// there picks up the style.
fn marker_at_caret(
    editor: &Editor,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<Option<Transaction>, CommandError> {
    let focus = editor.selection().focus.clone();
    let (child_ix, block_path) = caret_leaf_position(editor, &focus)?;
    let Some(text) = editor.doc().text_at(&focus.path) else {
        return Err(CommandError::InvalidSelection("caret is not in a text run"));
    };

    let marks_before = text.marks.clone();
    let marks_after = apply(marks_before.clone());
    if marks_after == marks_before {
        return Ok(None);
    }

    if text.text.is_empty() {
        return Ok(Some(
            Transaction::new(vec![Op::SetTextMarks {
                path: focus.path.clone(),
                marks: marks_after,
            }])
            .selection_after(Selection::collapsed(Point::new(focus.path, 0))),
        ));
    }

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let (left, right) = text.text.split_at(cursor);

    let mut replacement: Vec<Node> = Vec::new();
    let mut caret_child_ix = child_ix;
    if !left.is_empty() {
        replacement.push(Node::text(left, marks_before.clone()));
        caret_child_ix += 1;
    }
    replacement.push(Node::text("", marks_after));
    if !right.is_empty() {
        replacement.push(Node::text(right, marks_before));
    }

    let ops = replace_leaf_ops(&focus.path, &block_path, child_ix, replacement);
    let mut caret_path = block_path;
    caret_path.push(caret_child_ix);
    Ok(Some(
        Transaction::new(ops).selection_after(Selection::collapsed(Point::new(caret_path, 0))),
    ))
}

fn caret_leaf_position(
    editor: &Editor,
    point: &Point,
) -> Result<(usize, Vec<usize>), CommandError> {
    let (&child_ix, block_path) = point
        .path
        .split_last()
        .ok_or(CommandError::InvalidSelection("caret is not in a text run"))?;
    match editor.doc().node(block_path) {
        Some(Node::Element(el)) if editor.registry().is_text_block(el) => {
            Ok((child_ix, block_path.to_vec()))
        }
        _ => Err(CommandError::InvalidSelection("caret is not in a text block")),
    }
}

fn replace_leaf_ops(
    leaf_path: &[usize],
    block_path: &[usize],
    child_ix: usize,
    replacement: Vec<Node>,
) -> Vec<Op> {
    let mut ops = vec![Op::RemoveNode {
        path: leaf_path.to_vec(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }
    ops
}

fn set_block_alignment(
    editor: &Editor,
    align: Alignment,
) -> Result<Option<Transaction>, CommandError> {
    let sel = editor.selection().clone();
    let range = SelectedRange::resolve(editor, &sel)?;

    let mut ops: Vec<Op> = Vec::new();
    for (block, _, _) in range.segments() {
        let current = block.el.attr_str("align");
        if current == align.attr() {
            continue;
        }
        let patch = match align.attr() {
            Some(value) => {
                let mut set = Attrs::default();
                set.insert(
                    "align".to_string(),
                    serde_json::Value::String(value.to_string()),
                );
                AttrPatch {
                    set,
                    remove: Vec::new(),
                }
            }
            None => AttrPatch {
                set: Attrs::default(),
                remove: vec!["align".to_string()],
            },
        };
        ops.push(Op::SetNodeAttrs {
            path: block.path.clone(),
            patch,
        });
    }

    Ok((!ops.is_empty()).then(|| Transaction::new(ops).selection_after(sel)))
}

fn toggle_list(editor: &Editor, list: ListKind) -> Result<Option<Transaction>, CommandError> {
    let sel = editor.selection().clone();
    let range = SelectedRange::resolve(editor, &sel)?;
    let segments = range.segments();

    let unwrap = segments
        .iter()
        .all(|(block, _, _)| ListKind::of(block.el) == Some(list));

    let mut ops: Vec<Op> = Vec::new();
    for (block, _, _) in segments {
        let mut attrs = block.el.attrs.clone();
        let kind = if unwrap {
            attrs.remove("list_type");
            PARAGRAPH
        } else {
            if ListKind::of(block.el) == Some(list) {
                continue;
            }
            attrs.insert(
                "list_type".to_string(),
                serde_json::Value::String(list.as_str().to_string()),
            );
            LIST_ITEM
        };
        let next = Node::Element(ElementNode {
            kind: kind.to_string(),
            attrs,
            children: block.el.children.clone(),
        });
        ops.push(Op::RemoveNode {
            path: block.path.clone(),
        });
        ops.push(Op::InsertNode {
            path: block.path.clone(),
            node: next,
        });
    }

    Ok((!ops.is_empty()).then(|| Transaction::new(ops).selection_after(sel)))
}

fn single_line_url(url: &str) -> String {
    url.trim().replace(['\r', '\n'], "")
}

fn insert_link(editor: &Editor, url: &str) -> Result<Option<Transaction>, CommandError> {
    if url.is_empty() {
        return Ok(None);
    }

    let sel = editor.selection().clone();
    if !sel.is_collapsed() {
        let range = SelectedRange::resolve(editor, &sel)?;
        let strategy = wrap_strategy(&sel);
        return Ok(restyle_range(&sel, &range, strategy, &|mut marks: Marks| {
            marks.link = Some(url.to_string());
            marks
        }));
    }

    let focus = sel.focus;
    let (child_ix, block_path) = caret_leaf_position(editor, &focus)?;
    let Some(text) = editor.doc().text_at(&focus.path) else {
        return Err(CommandError::InvalidSelection("caret is not in a text run"));
    };

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let (left, right) = text.text.split_at(cursor);
    let mut link_marks = text.marks.clone();
    link_marks.link = Some(url.to_string());

    let mut replacement: Vec<Node> = Vec::new();
    if !left.is_empty() {
        replacement.push(Node::text(left, text.marks.clone()));
    }
    replacement.push(Node::text(url, link_marks));
    // The caret lands in the run after the link so typing continues unlinked.
    let caret_child_ix = child_ix + replacement.len();
    replacement.push(Node::text(right, text.marks.clone()));

    let ops = replace_leaf_ops(&focus.path, &block_path, child_ix, replacement);
    let mut caret_path = block_path;
    caret_path.push(caret_child_ix);
    Ok(Some(
        Transaction::new(ops).selection_after(Selection::collapsed(Point::new(caret_path, 0))),
    ))
}

fn remove_link(editor: &Editor) -> Result<Option<Transaction>, CommandError> {
    let sel = editor.selection().clone();
    if !sel.is_collapsed() {
        let range = SelectedRange::resolve(editor, &sel)?;
        let strategy = wrap_strategy(&sel);
        return Ok(restyle_range(&sel, &range, strategy, &|mut marks: Marks| {
            marks.link = None;
            marks
        }));
    }

    let focus = &sel.focus;
    let (child_ix, block_path) = caret_leaf_position(editor, focus)?;
    let Some(Node::Element(block)) = editor.doc().node(&block_path) else {
        return Err(CommandError::InvalidSelection("caret is not in a text block"));
    };
    let Some(Node::Text(text)) = block.children.get(child_ix) else {
        return Err(CommandError::InvalidSelection("caret is not in a text run"));
    };
    let Some(url) = text.marks.link.as_deref() else {
        return Ok(None);
    };

    // Unlink the whole contiguous run sharing this URL.
    let same_link =
        |node: &Node| matches!(node, Node::Text(t) if t.marks.link.as_deref() == Some(url));
    let mut first = child_ix;
    while first > 0 && same_link(&block.children[first - 1]) {
        first -= 1;
    }
    let mut last = child_ix;
    while block.children.get(last + 1).is_some_and(same_link) {
        last += 1;
    }

    let ops = block.children[first..=last]
        .iter()
        .enumerate()
        .filter_map(|(i, node)| match node {
            Node::Text(t) => {
                let mut marks = t.marks.clone();
                marks.link = None;
                let mut path = block_path.clone();
                path.push(first + i);
                Some(Op::SetTextMarks { path, marks })
            }
            _ => None,
        })
        .collect();
    Ok(Some(Transaction::new(ops)))
}

/// Splits the caret's block around the image. A selected range is removed
/// first. The caret lands at the start of the tail block.
fn insert_image(editor: &Editor, url: &str) -> Result<Option<Transaction>, CommandError> {
    if url.is_empty() {
        return Ok(None);
    }

    let sel = editor.selection().clone();
    let range = SelectedRange::resolve(editor, &sel)?;
    let first = &range.blocks[range.first];
    let last = &range.blocks[range.last];

    let (head, _) = split_inline(&first.el.children, range.start);
    let (_, mut tail) = split_inline(&last.el.children, range.end);
    if !matches!(tail.first(), Some(Node::Text(_))) {
        tail.insert(0, Node::plain(""));
    }

    let index = first.index();
    let mut ops: Vec<Op> = Vec::new();
    for ix in (index + 1..=last.index()).rev() {
        ops.push(Op::RemoveNode { path: vec![ix] });
    }
    // With nothing before the caret the image takes the block's place.
    let image_at = if total_inline_text_len(&head) > 0 {
        ops.extend(replace_children_ops(
            &first.path,
            first.el.children.len(),
            head,
        ));
        index + 1
    } else {
        ops.push(Op::RemoveNode {
            path: first.path.clone(),
        });
        index
    };
    ops.push(Op::InsertNode {
        path: vec![image_at],
        node: Node::image(url, None),
    });
    ops.push(Op::InsertNode {
        path: vec![image_at + 1],
        node: Node::Element(ElementNode {
            kind: first.el.kind.clone(),
            attrs: first.el.attrs.clone(),
            children: tail,
        }),
    });

    Ok(Some(Transaction::new(ops).selection_after(Selection::collapsed(
        Point::new(vec![image_at + 1, 0], 0),
    ))))
}

fn insert_literal_text(editor: &Editor, text: &str) -> Result<Option<Transaction>, CommandError> {
    if text.is_empty() {
        return Ok(None);
    }

    let sel = editor.selection().clone();
    if !sel.is_collapsed() {
        return replace_range(editor, &sel, Some(text));
    }

    if has_line_break(text) {
        return replace_range(editor, &sel, Some(text));
    }
    if editor.doc().text_at(&sel.focus.path).is_none() {
        return Err(CommandError::InvalidSelection("caret is not in a text run"));
    }
    // The caret rides along with the insertion.
    Ok(Some(Transaction::new(vec![Op::InsertText {
        path: sel.focus.path.clone(),
        offset: sel.focus.offset,
        text: text.to_string(),
    }])))
}

/// Deletes the selected content, optionally replacing it with `insert`, and
/// collapses the caret after the replacement. Blocks after the first one
/// touched are merged into it.
pub(crate) fn replace_range(
    editor: &Editor,
    sel: &Selection,
    insert: Option<&str>,
) -> Result<Option<Transaction>, CommandError> {
    let range = SelectedRange::resolve(editor, sel)?;
    let first = &range.blocks[range.first];
    let last = &range.blocks[range.last];
    if range.first == range.last && range.start >= range.end && insert.is_none() {
        return Ok(None);
    }

    let (mut left, _) = split_inline(&first.el.children, range.start);
    let (_, right) = split_inline(&last.el.children, range.end);

    let mut caret = range.start;
    if let Some(text) = insert {
        let marks = editor
            .doc()
            .text_at(&range.start_point.path)
            .map(|t| t.marks.clone())
            .unwrap_or_default();
        let inserted = inline_text_nodes(text, &marks);
        caret += total_inline_text_len(&inserted);
        for node in inserted {
            if let (Some(Node::Text(prev)), Node::Text(next)) = (left.last_mut(), &node) {
                if prev.marks == next.marks {
                    prev.text.push_str(&next.text);
                    continue;
                }
            }
            left.push(node);
        }
    }

    let mut new_children = left;
    new_children.extend(right);
    pad_voids_with_text(&mut new_children);

    let mut ops: Vec<Op> = Vec::new();
    for ix in (first.index() + 1..=last.index()).rev() {
        ops.push(Op::RemoveNode { path: vec![ix] });
    }
    let caret_point = point_for_global_offset(&first.path, &new_children, caret);
    ops.extend(replace_children_ops(
        &first.path,
        first.el.children.len(),
        new_children,
    ));

    Ok(Some(
        Transaction::new(ops).selection_after(Selection::collapsed(caret_point)),
    ))
}
