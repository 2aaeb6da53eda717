use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::commands::{CommandError, replace_range};
use crate::core::{ApplyError, Editor, ElementNode, LIST_ITEM, Node, PARAGRAPH, Point, Selection};
use crate::ops::{Op, Transaction};
use crate::text::{
    TextBlock, flat_inline_text, has_line_break, locate, point_for_global_offset,
    replace_children_ops, split_inline, total_inline_text_len,
};

/// Raw editing input as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "kebab-case")]
pub enum InputEvent {
    InsertText(String),
    DeleteBackward,
    DeleteForward,
    /// Enter.
    InsertParagraph,
    /// Shift+Enter.
    InsertLineBreak,
}

impl Editor {
    /// Applies one input event. Returns whether the document changed.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<bool, ApplyError> {
        let source = match &event {
            InputEvent::InsertText(_) => "input:insert-text",
            InputEvent::DeleteBackward => "input:delete-backward",
            InputEvent::DeleteForward => "input:delete-forward",
            InputEvent::InsertParagraph => "input:insert-paragraph",
            InputEvent::InsertLineBreak => "input:insert-line-break",
        };

        let sel = self.selection().clone();
        if !sel.is_collapsed() {
            let text = match &event {
                InputEvent::InsertText(text) if !text.is_empty() => Some(text.as_str()),
                _ => None,
            };
            let changed = self.apply_input(replace_range(self, &sel, text), source)?;
            return match event {
                InputEvent::InsertParagraph | InputEvent::InsertLineBreak => {
                    let structural = self.structural_input(&event);
                    Ok(self.apply_input(structural, source)? || changed)
                }
                _ => Ok(changed),
            };
        }

        let tx = match &event {
            InputEvent::InsertText(text) => insert_text(self, text),
            InputEvent::DeleteBackward => Ok(delete_backward(self)),
            InputEvent::DeleteForward => Ok(delete_forward(self)),
            InputEvent::InsertParagraph | InputEvent::InsertLineBreak => {
                self.structural_input(&event)
            }
        };
        self.apply_input(tx, source)
    }

    fn structural_input(&self, event: &InputEvent) -> Result<Option<Transaction>, CommandError> {
        Ok(match event {
            InputEvent::InsertParagraph => split_block(self),
            InputEvent::InsertLineBreak => insert_line_break(self),
            _ => None,
        })
    }

    fn apply_input(
        &mut self,
        tx: Result<Option<Transaction>, CommandError>,
        source: &'static str,
    ) -> Result<bool, ApplyError> {
        let tx = match tx {
            Ok(Some(tx)) if !tx.is_empty() => tx,
            Ok(_) => return Ok(false),
            Err(CommandError::Apply(err)) => return Err(err),
            Err(err) => {
                tracing::warn!(%err, source, "input ignored");
                return Ok(false);
            }
        };
        self.apply(tx.source(source))?;
        Ok(true)
    }
}

fn caret_block(editor: &Editor) -> Option<(TextBlock<'_>, usize)> {
    locate(editor.doc(), editor.registry(), &editor.selection().focus)
}

fn insert_text(editor: &Editor, text: &str) -> Result<Option<Transaction>, CommandError> {
    if text.is_empty() {
        return Ok(None);
    }
    // Pasted or typed line terminators become line breaks.
    if has_line_break(text) {
        return replace_range(editor, editor.selection(), Some(text));
    }
    let focus = &editor.selection().focus;
    if editor.doc().text_at(&focus.path).is_none() {
        return Ok(None);
    }
    Ok(Some(Transaction::new(vec![Op::InsertText {
        path: focus.path.clone(),
        offset: focus.offset,
        text: text.to_string(),
    }])))
}

/// Removes `[start, end)` of one block's inline content.
fn delete_inline(block: &TextBlock<'_>, start: usize, end: usize) -> Transaction {
    let children = &block.el.children;
    let (mut new_children, _) = split_inline(children, start);
    new_children.extend(split_inline(children, end).1);
    let caret = point_for_global_offset(&block.path, &new_children, start);
    Transaction::new(replace_children_ops(&block.path, children.len(), new_children))
        .selection_after(Selection::collapsed(caret))
}

fn delete_backward(editor: &Editor) -> Option<Transaction> {
    let (block, global) = caret_block(editor)?;

    if global > 0 {
        let flat = flat_inline_text(&block.el.children);
        let start = flat
            .get(..global)?
            .grapheme_indices(true)
            .next_back()
            .map(|(ix, _)| ix)?;
        return Some(delete_inline(&block, start, global));
    }

    if block.el.kind == LIST_ITEM {
        return Some(retype_block(&block, PARAGRAPH, editor.selection()));
    }

    let index = block.index();
    let prev_ix = index.checked_sub(1)?;
    match &editor.doc().children[prev_ix] {
        Node::Element(prev) if editor.registry().is_text_block(prev) => {
            Some(merge_blocks(prev_ix, prev, index, block.el))
        }
        Node::Void(_) => Some(Transaction::new(vec![Op::RemoveNode {
            path: vec![prev_ix],
        }])),
        _ => None,
    }
}

fn delete_forward(editor: &Editor) -> Option<Transaction> {
    let (block, global) = caret_block(editor)?;
    let total = total_inline_text_len(&block.el.children);

    if global < total {
        let flat = flat_inline_text(&block.el.children);
        let len = flat.get(global..)?.graphemes(true).next()?.len();
        return Some(delete_inline(&block, global, global + len));
    }

    let index = block.index();
    let next_ix = index + 1;
    match editor.doc().children.get(next_ix)? {
        Node::Element(next) if editor.registry().is_text_block(next) => {
            Some(merge_blocks(index, block.el, next_ix, next))
        }
        Node::Void(_) => Some(Transaction::new(vec![Op::RemoveNode {
            path: vec![next_ix],
        }])),
        _ => None,
    }
}

/// Appends `next`'s inline content to `prev` and drops `next`. The caret
/// lands at the seam.
fn merge_blocks(
    prev_ix: usize,
    prev: &ElementNode,
    next_ix: usize,
    next: &ElementNode,
) -> Transaction {
    let seam = total_inline_text_len(&prev.children);
    let mut merged = prev.children.clone();
    merged.extend(next.children.iter().cloned());

    let prev_path = vec![prev_ix];
    let caret = point_for_global_offset(&prev_path, &merged, seam);

    let mut ops = vec![Op::RemoveNode {
        path: vec![next_ix],
    }];
    ops.extend(replace_children_ops(&prev_path, prev.children.len(), merged));
    Transaction::new(ops).selection_after(Selection::collapsed(caret))
}

fn retype_block(block: &TextBlock<'_>, kind: &str, selection: &Selection) -> Transaction {
    let mut attrs = block.el.attrs.clone();
    if kind != LIST_ITEM {
        attrs.remove("list_type");
    }
    let next = Node::Element(ElementNode {
        kind: kind.to_string(),
        attrs,
        children: block.el.children.clone(),
    });
    Transaction::new(vec![
        Op::RemoveNode {
            path: block.path.clone(),
        },
        Op::InsertNode {
            path: block.path.clone(),
            node: next,
        },
    ])
    .selection_after(selection.clone())
}

fn split_block(editor: &Editor) -> Option<Transaction> {
    let (block, global) = caret_block(editor)?;

    // Enter on an empty list item leaves the list.
    if block.el.kind == LIST_ITEM && flat_inline_text(&block.el.children).is_empty() {
        return Some(retype_block(&block, PARAGRAPH, editor.selection()));
    }

    let (left, right) = split_inline(&block.el.children, global);
    let new_path = vec![block.index() + 1];
    let caret = point_for_global_offset(&new_path, &right, 0);
    let tail = Node::Element(ElementNode {
        kind: block.el.kind.clone(),
        attrs: block.el.attrs.clone(),
        children: right,
    });

    let mut ops = replace_children_ops(&block.path, block.el.children.len(), left);
    ops.push(Op::InsertNode {
        path: new_path,
        node: tail,
    });
    Some(Transaction::new(ops).selection_after(Selection::collapsed(caret)))
}

fn insert_line_break(editor: &Editor) -> Option<Transaction> {
    let focus = &editor.selection().focus;
    let (&child_ix, block_path) = focus.path.split_last()?;
    let text = editor.doc().text_at(&focus.path)?;

    let offset = crate::core::clamp_to_char_boundary(&text.text, focus.offset);
    let (left, right) = text.text.split_at(offset);

    let mut replacement = Vec::new();
    if !left.is_empty() {
        replacement.push(Node::text(left, text.marks.clone()));
    }
    replacement.push(Node::line_break());
    let caret_ix = child_ix + replacement.len();
    replacement.push(Node::text(right, text.marks.clone()));

    let mut ops = vec![Op::RemoveNode {
        path: focus.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path.to_vec();
    caret_path.push(caret_ix);
    Some(Transaction::new(ops).selection_after(Selection::collapsed(Point::new(caret_path, 0))))
}
