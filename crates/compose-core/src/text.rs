//! Inline offset arithmetic over the children of a text block.
//!
//! A block's inline content is addressed by a "global" offset: the sum of
//! text byte lengths plus one unit per inline void.

use crate::core::{Document, ElementNode, Marks, Node, Point, TextNode, clamp_to_char_boundary};
use crate::ops::{Op, Path};
use crate::plugin::PluginRegistry;

pub(crate) struct TextBlock<'a> {
    pub path: Path,
    pub el: &'a ElementNode,
}

impl TextBlock<'_> {
    pub fn index(&self) -> usize {
        self.path[0]
    }
}

pub(crate) fn text_blocks_in_order<'a>(
    doc: &'a Document,
    registry: &PluginRegistry,
) -> Vec<TextBlock<'a>> {
    doc.children
        .iter()
        .enumerate()
        .filter_map(|(ix, node)| match node {
            Node::Element(el) if registry.is_text_block(el) => Some(TextBlock {
                path: vec![ix],
                el,
            }),
            _ => None,
        })
        .collect()
}

/// The text block containing `point` and the point's global offset in it.
pub(crate) fn locate<'a>(
    doc: &'a Document,
    registry: &PluginRegistry,
    point: &Point,
) -> Option<(TextBlock<'a>, usize)> {
    let (&child_ix, block_path) = point.path.split_last()?;
    let Some(Node::Element(el)) = doc.node(block_path) else {
        return None;
    };
    if !registry.is_text_block(el) || block_path.len() != 1 {
        return None;
    }
    let global = point_global_offset(&el.children, child_ix, point.offset);
    Some((
        TextBlock {
            path: block_path.to_vec(),
            el,
        },
        global,
    ))
}

pub(crate) fn is_point_in_block(point: &Point, block_path: &[usize]) -> bool {
    point.path.len() == block_path.len() + 1 && point.path.starts_with(block_path)
}

pub(crate) fn total_inline_text_len(children: &[Node]) -> usize {
    children
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.text.len(),
            Node::Void(v) => v.inline_text_len(),
            Node::Element(_) => 0,
        })
        .sum()
}

/// Inline content as one string, each void standing in as `\n`.
pub(crate) fn flat_inline_text(children: &[Node]) -> String {
    let mut out = String::new();
    for node in children {
        match node {
            Node::Text(t) => out.push_str(&t.text),
            Node::Void(_) => out.push('\n'),
            Node::Element(_) => {}
        }
    }
    out
}

pub(crate) fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        match node {
            Node::Text(t) => {
                if ix < child_ix {
                    global += t.text.len();
                    continue;
                }
                if ix == child_ix {
                    global += clamp_to_char_boundary(&t.text, offset);
                }
                break;
            }
            Node::Void(v) => {
                if ix < child_ix {
                    global += v.inline_text_len();
                    continue;
                }
                if ix == child_ix {
                    global += offset.min(v.inline_text_len());
                }
                break;
            }
            Node::Element(_) => {}
        }
    }
    global
}

/// Resolves a global offset to a text point. At a boundary between two text
/// leaves the point lands at the start of the right one, which keeps it
/// stable when the leaves are later merged.
pub(crate) fn point_for_global_offset(
    block_path: &[usize],
    children: &[Node],
    global_offset: usize,
) -> Point {
    let at = |child_ix: usize, offset: usize| {
        let mut path = block_path.to_vec();
        path.push(child_ix);
        Point::new(path, offset)
    };

    let mut remaining = global_offset;
    for (child_ix, node) in children.iter().enumerate() {
        match node {
            Node::Text(t) => {
                if remaining < t.text.len() {
                    return at(child_ix, clamp_to_char_boundary(&t.text, remaining));
                }
                if remaining == t.text.len() {
                    if matches!(children.get(child_ix + 1), Some(Node::Text(_))) {
                        return at(child_ix + 1, 0);
                    }
                    return at(child_ix, t.text.len());
                }
                remaining -= t.text.len();
            }
            Node::Void(v) => {
                let len = v.inline_text_len();
                if remaining == 0 {
                    if let Some((ix, t)) = children[..child_ix]
                        .iter()
                        .enumerate()
                        .rev()
                        .find_map(|(ix, n)| match n {
                            Node::Text(t) => Some((ix, t)),
                            _ => None,
                        })
                    {
                        return at(ix, t.text.len());
                    }
                }
                if remaining <= len {
                    if let Some(ix) = children
                        .iter()
                        .enumerate()
                        .skip(child_ix + 1)
                        .find(|(_, n)| matches!(n, Node::Text(_)))
                        .map(|(ix, _)| ix)
                    {
                        return at(ix, 0);
                    }
                    break;
                }
                remaining -= len;
            }
            Node::Element(_) => {}
        }
    }

    // Fallback to end of last text node.
    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            return at(child_ix, t.text.len());
        }
    }
    at(0, 0)
}

/// Splits inline content at a global offset. Empty leaves sitting exactly
/// on the offset stay on the left.
pub(crate) fn split_inline(children: &[Node], at: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        match node {
            Node::Text(t) => {
                let start = cursor;
                let end = cursor + t.text.len();
                cursor = end;
                if end <= at {
                    left.push(node.clone());
                } else if start >= at {
                    right.push(node.clone());
                } else {
                    let split = clamp_to_char_boundary(&t.text, at - start);
                    let (head, tail) = t.text.split_at(split);
                    left.push(Node::text(head, t.marks.clone()));
                    right.push(Node::text(tail, t.marks.clone()));
                }
            }
            Node::Void(v) => {
                let end = cursor + v.inline_text_len();
                if end <= at {
                    left.push(node.clone());
                } else {
                    right.push(node.clone());
                }
                cursor = end;
            }
            Node::Element(_) => {}
        }
    }

    (left, right)
}

/// The inline content between two global offsets.
pub(crate) fn slice_inline(children: &[Node], start: usize, end: usize) -> Vec<Node> {
    let (_, tail) = split_inline(children, start);
    let (middle, _) = split_inline(&tail, end.saturating_sub(start));
    middle
}

pub(crate) fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    if start_global >= end_global {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            if let Node::Void(v) = node {
                cursor += v.inline_text_len();
            }
            out.push(node.clone());
            continue;
        };

        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start_global.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end_global.saturating_sub(node_start));

        if sel_start == 0 && sel_end == t.text.len() {
            out.push(Node::Text(TextNode {
                text: t.text.clone(),
                marks: apply(t.marks.clone()),
            }));
            continue;
        }

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::text(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::text(middle, apply(t.marks.clone())));
        }
        if !suffix.is_empty() {
            out.push(Node::text(suffix, t.marks.clone()));
        }
    }

    if out.is_empty() {
        out.push(Node::plain(""));
    }

    out
}

/// Text leaves overlapping `[start, end)`. Empty leaves count when they sit
/// inside the range.
pub(crate) fn covered_text_leaves(children: &[Node], start: usize, end: usize) -> Vec<&TextNode> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for node in children {
        match node {
            Node::Text(t) => {
                let node_start = cursor;
                let node_end = cursor + t.text.len();
                cursor = node_end;
                let overlaps = if t.text.is_empty() {
                    node_start > start && node_start < end
                } else {
                    node_start < end && node_end > start
                };
                if overlaps {
                    out.push(t);
                }
            }
            Node::Void(v) => cursor += v.inline_text_len(),
            Node::Element(_) => {}
        }
    }
    out
}

pub(crate) fn has_line_break(text: &str) -> bool {
    text.contains(['\n', '\r'])
}

/// `text` as inline content carrying `marks`. Each `\n`, `\r\n` or lone `\r`
/// becomes a `line_break` void, so no text leaf holds a line terminator.
pub(crate) fn inline_text_nodes(text: &str, marks: &Marks) -> Vec<Node> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut nodes = Vec::new();
    for (ix, line) in text.split('\n').enumerate() {
        if ix > 0 {
            nodes.push(Node::line_break());
        }
        if !line.is_empty() {
            nodes.push(Node::text(line, marks.clone()));
        }
    }
    nodes
}

/// Puts an empty text leaf after every inline void that lacks one, so a
/// caret right after a break has a run to sit in.
pub(crate) fn pad_voids_with_text(children: &mut Vec<Node>) {
    let mut ix = 0;
    while ix < children.len() {
        let void = matches!(children[ix], Node::Void(_));
        if void && !matches!(children.get(ix + 1), Some(Node::Text(_))) {
            children.insert(ix + 1, Node::plain(""));
        }
        ix += 1;
    }
}

/// Rewrites a block's children wholesale, the way every structural inline
/// edit is expressed.
pub(crate) fn replace_children_ops(
    block_path: &[usize],
    old_len: usize,
    new_children: Vec<Node>,
) -> Vec<Op> {
    let mut ops: Vec<Op> = Vec::new();
    for child_ix in (0..old_len).rev() {
        let mut path = block_path.to_vec();
        path.push(child_ix);
        ops.push(Op::RemoveNode { path });
    }
    for (child_ix, node) in new_children.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(child_ix);
        ops.push(Op::InsertNode { path, node });
    }
    ops
}
