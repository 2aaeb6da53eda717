use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ops::{Op, Path, Transaction};
use crate::palette::{FontSize, TextColor};
use crate::plugin::PluginRegistry;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

pub const PARAGRAPH: &str = "paragraph";
pub const LIST_ITEM: &str = "list_item";
pub const IMAGE: &str = "image";
pub const LINE_BREAK: &str = "line_break";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// A document holding one empty, unformatted paragraph.
    pub fn empty() -> Self {
        Self::new(vec![Node::paragraph("")])
    }

    /// True when the document has no content a reader could see.
    pub fn is_blank(&self) -> bool {
        match self.children.as_slice() {
            [] => true,
            [Node::Element(el)] => {
                el.kind == PARAGRAPH
                    && el.attrs.is_empty()
                    && el.children.iter().all(|child| match child {
                        Node::Text(t) => t.text.is_empty() && t.marks == Marks::default(),
                        _ => false,
                    })
            }
            _ => false,
        }
    }

    /// Plain text of the document: blocks joined by `\n`, line breaks as `\n`,
    /// images skipped.
    pub fn visible_text(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();
        for node in &self.children {
            let Node::Element(el) = node else {
                continue;
            };
            let mut text = String::new();
            for child in &el.children {
                match child {
                    Node::Text(t) => text.push_str(&t.text),
                    Node::Void(v) if v.kind == LINE_BREAK => text.push('\n'),
                    _ => {}
                }
            }
            blocks.push(text);
        }
        blocks.join("\n")
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        node_ref(self, path)
    }

    pub fn text_at(&self, path: &[usize]) -> Option<&TextNode> {
        match self.node(path)? {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Whether `point` addresses an existing text run at a char boundary.
    pub fn contains_point(&self, point: &Point) -> bool {
        self.text_at(&point.path)
            .is_some_and(|t| point.offset <= t.text.len() && t.text.is_char_boundary(point.offset))
    }

    /// End of the last text run in the document.
    pub fn end_point(&self) -> Option<Point> {
        fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
            for (ix, node) in children.iter().enumerate().rev() {
                path.push(ix);
                let found = match node {
                    Node::Text(t) => Some(Point::new(path.clone(), t.text.len())),
                    Node::Element(el) => walk(&el.children, path),
                    Node::Void(_) => None,
                };
                path.pop();
                if found.is_some() {
                    return found;
                }
            }
            None
        }

        walk(&self.children, &mut Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::paragraph_with(vec![Node::plain(text)])
    }

    pub fn paragraph_with(children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: PARAGRAPH.to_string(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn list_item(list_type: &str, children: Vec<Node>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert(
            "list_type".to_string(),
            serde_json::Value::String(list_type.to_string()),
        );
        Node::Element(ElementNode {
            kind: LIST_ITEM.to_string(),
            attrs,
            children,
        })
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::text(text, Marks::default())
    }

    pub fn text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn image(src: impl Into<String>, alt: Option<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), serde_json::Value::String(src.into()));
        if let Some(alt) = alt {
            attrs.insert("alt".to_string(), serde_json::Value::String(alt));
        }
        Node::Void(VoidNode {
            kind: IMAGE.to_string(),
            attrs,
        })
    }

    pub fn line_break() -> Self {
        Node::Void(VoidNode {
            kind: LINE_BREAK.to_string(),
            attrs: Attrs::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    /// Width of the void in inline offset space.
    pub fn inline_text_len(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<TextColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Marks {
    pub fn is_plain(&self) -> bool {
        *self == Marks::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in document order.
    pub fn ordered(&self) -> (Point, Point) {
        let mut start = self.anchor.clone();
        let mut end = self.focus.clone();
        if (end.path.as_slice(), end.offset) < (start.path.as_slice(), start.offset) {
            std::mem::swap(&mut start, &mut end);
        }
        (start, end)
    }
}

/// Identity of a document loaded into an editor. Replacing the document
/// wholesale always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 200,
            max_normalize_iterations: 100,
        }
    }
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.max_undo == 0 {
            self.max_undo = defaults.max_undo;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = defaults.max_normalize_iterations;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    document_id: DocumentId,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            document_id: DocumentId::next(),
            selection,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    /// Rich text editor over `doc` with the caret at its end.
    pub fn rich_text(doc: Document, config: EditorConfig) -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        let mut editor = Self::with_config(doc, selection, PluginRegistry::rich_text(), config);
        editor.select_end();
        editor
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    pub fn select_end(&mut self) {
        let end = self
            .doc
            .end_point()
            .unwrap_or_else(|| Point::new(vec![0, 0], 0));
        self.set_selection(Selection::collapsed(end));
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Swaps in a new document. History is dropped, the document gets a new
    /// identity and the caret moves to its end.
    pub fn replace_document(&mut self, doc: Document) {
        self.doc = doc;
        self.document_id = DocumentId::next();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.normalize_in_place();
        self.select_end();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let redo_ops = self.replay(inverse_ops);
        self.selection = selection_before.clone();
        self.normalize_in_place();

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let undo_ops = self.replay(inverse_ops);
        self.selection = selection_after.clone();
        self.normalize_in_place();

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        true
    }

    fn replay(&mut self, ops: Vec<Op>) -> Vec<Op> {
        let mut inverse: Vec<Op> = Vec::new();
        for op in ops {
            match self.apply_op(op) {
                Ok(inv) => inverse.push(inv),
                Err(err) => {
                    tracing::warn!(%err, "history replay stopped early");
                    break;
                }
            }
        }
        inverse.reverse();
        inverse
    }

    /// Applies `tx` atomically: on error every op already applied is rolled
    /// back and the selection restored.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let selection_before = self.selection.clone();
        let source = tx.meta.source.clone();

        let mut inverse_ops: Vec<Op> = Vec::new();
        let result = self.apply_ops(tx, &mut inverse_ops);
        if let Err(err) = result {
            for op in inverse_ops.into_iter().rev() {
                if let Err(rollback) = self.apply_op(op) {
                    tracing::warn!(%rollback, %err, "rollback op failed");
                }
            }
            self.selection = selection_before;
            return Err(err);
        }
        inverse_ops.reverse();

        self.normalize_selection_in_place();
        let selection_after = self.selection.clone();
        tracing::trace!(source = source.as_deref().unwrap_or("-"), "transaction applied");

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }

        Ok(())
    }

    fn apply_ops(&mut self, tx: Transaction, inverse_ops: &mut Vec<Op>) -> Result<(), ApplyError> {
        for op in tx.ops {
            inverse_ops.push(self.apply_op(op)?);
        }
        if let Some(sel) = tx.selection_after {
            self.selection = sel;
        }
        self.normalize_with_inverse_ops(inverse_ops)
    }

    fn normalize_in_place(&mut self) {
        let mut discarded = Vec::new();
        if let Err(err) = self.normalize_with_inverse_ops(&mut discarded) {
            tracing::warn!(%err, "document normalization failed");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_with_inverse_ops(&mut self, inverse_ops: &mut Vec<Op>) -> Result<(), ApplyError> {
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(());
            }
            for op in ops {
                inverse_ops.push(self.apply_op(op)?);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge(
            self.config.max_normalize_iterations,
        ))
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let old = match node_mut(doc, &path)? {
                Node::Element(el) => patch_apply(&mut el.attrs, &patch),
                Node::Void(v) => patch_apply(&mut v.attrs, &patch),
                Node::Text(_) => {
                    return Err(PathError("Text has no attrs".into()).into());
                }
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
        Op::MergeText { path } => {
            let position = merge_text(doc, &path)?;
            transform_selection_merge_text(selection, &path, position.offset);
            Ok(Op::SplitText {
                path: position.left_path,
                offset: position.offset,
                marks: position.right_marks,
            })
        }
        Op::SplitText {
            path,
            offset,
            marks,
        } => {
            let offset = split_text(doc, &path, offset, marks)?;
            transform_selection_split_text(selection, &path, offset);
            let mut right_path = path;
            if let Some(last) = right_path.last_mut() {
                *last += 1;
            }
            Ok(Op::MergeText { path: right_path })
        }
    }
}

struct MergedText {
    left_path: Path,
    offset: usize,
    right_marks: Marks,
}

fn merge_text(doc: &mut Document, path: &[usize]) -> Result<MergedText, PathError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty merge path".into()))?;
    let left_index = index
        .checked_sub(1)
        .ok_or_else(|| PathError("Merge target has no previous sibling".into()))?;

    let children = children_mut(doc, parent_path)?;
    let (Some(Node::Text(_)), Some(Node::Text(_))) = (children.get(left_index), children.get(index))
    else {
        return Err(PathError("Merge requires two adjacent text leaves".into()));
    };
    let Node::Text(right) = children.remove(index) else {
        return Err(PathError("Merge requires two adjacent text leaves".into()));
    };
    let Some(Node::Text(left)) = children.get_mut(left_index) else {
        return Err(PathError("Merge requires two adjacent text leaves".into()));
    };

    let offset = left.text.len();
    left.text.push_str(&right.text);

    let mut left_path = parent_path.to_vec();
    left_path.push(left_index);
    Ok(MergedText {
        left_path,
        offset,
        right_marks: right.marks,
    })
}

fn split_text(
    doc: &mut Document,
    path: &[usize],
    offset: usize,
    marks: Marks,
) -> Result<usize, PathError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty split path".into()))?;

    let children = children_mut(doc, parent_path)?;
    let Some(Node::Text(left)) = children.get_mut(index) else {
        return Err(PathError("Expected Text node".into()));
    };
    let offset = clamp_to_char_boundary(&left.text, offset);
    let tail = left.text.split_off(offset);
    children.insert(
        index + 1,
        Node::Text(TextNode { text: tail, marks }),
    );
    Ok(offset)
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("Normalization did not converge after {0} iterations")]
    NormalizeDidNotConverge(usize),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
        } else if ix == index {
            // Point was inside the removed subtree. Map it to a nearby point.
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

fn transform_selection_merge_text(selection: &mut Selection, path: &[usize], position: usize) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix == index {
            point.path[depth] = index - 1;
            point.offset += position;
        } else if ix > index {
            point.path[depth] = ix - 1;
        }
    }
}

fn transform_selection_split_text(selection: &mut Selection, path: &[usize], position: usize) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix + 1;
        } else if ix == index && point.offset > position {
            point.path[depth] = index + 1;
            point.offset -= position;
        }
    }
}

pub(crate) fn node_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    let mut node = doc.children.get(first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let (&first, rest) = path
        .split_first()
        .ok_or_else(|| PathError("Empty path".into()))?;

    let len = doc.children.len();
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| PathError(format!("Path out of bounds at depth 0: {first} >= {len}")))?;

    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    PathError(format!(
                        "Path out of bounds at depth {}: {ix} >= {len}",
                        depth + 1
                    ))
                })?
            }
            Node::Void(_) | Node::Text(_) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
        };
    }
    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn children_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, PathError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    match node_mut(doc, parent_path)? {
        Node::Element(el) => Ok(&mut el.children),
        Node::Void(_) | Node::Text(_) => Err(PathError("Parent is not a container".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty insert path".into()))?;

    let children = children_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty remove path".into()))?;

    let children = children_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}
