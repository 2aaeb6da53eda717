use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{
    AttrPatch, Attrs, Document, ElementNode, IMAGE, LINE_BREAK, LIST_ITEM, Marks, Node, PARAGRAPH,
    Point, Selection, TextNode,
};
use crate::ops::Op;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

/// A bundle of node kinds and normalization rules.
pub trait ComposePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate node spec kind: {kind} (plugin {plugin})")]
    DuplicateKind { plugin: &'static str, kind: String },
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn ComposePlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn rich_text() -> Self {
        let plugins: Vec<Box<dyn ComposePlugin>> = vec![
            Box::new(ParagraphPlugin),
            Box::new(ListPlugin),
            Box::new(LineBreakPlugin),
            Box::new(ImagePlugin),
            Box::new(AlignPlugin),
            Box::new(CoreNormalizePlugin),
        ];

        let mut registry = Self::default();
        for plugin in plugins {
            let id = plugin.id();
            if let Err(err) = registry.register_plugin(plugin) {
                tracing::warn!(plugin = id, %err, "skipping plugin");
            }
        }
        registry
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn ComposePlugin>) -> Result<(), RegistryError> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(RegistryError::DuplicateKind {
                    plugin: plugin.id(),
                    kind: spec.kind,
                });
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }
        self.normalize_passes.extend(plugin.normalize_passes());
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    /// Whether `el` holds inline content (text runs and inline voids).
    pub fn is_text_block(&self, el: &ElementNode) -> bool {
        match self.node_specs.get(&el.kind).map(|s| &s.children) {
            Some(ChildConstraint::InlineOnly) => true,
            Some(_) => false,
            None => el
                .children
                .iter()
                .any(|n| matches!(n, Node::Text(_) | Node::Void(_))),
        }
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            let pass_ops = pass.run(doc, self);
            if !pass_ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = pass_ops.len(), "normalize pass");
            }
            ops.extend(pass_ops);
        }
        ops
    }

    /// Maps each point of `selection` onto an existing text run.
    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_descendant(&doc.children, &mut Vec::new())
}

fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point::new(path.clone(), 0)),
            Node::Element(el) => first_text_descendant(&el.children, path),
            Node::Void(_) => None,
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = crate::core::clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(resolved_path, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    match doc.node(&resolved_path)? {
        Node::Text(t) => {
            let offset = crate::core::clamp_to_char_boundary(&t.text, point.offset);
            Some(Point::new(resolved_path, offset))
        }
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Void(_) => {
            // Step to the nearest text run in the same parent.
            let (&ix, parent) = resolved_path.split_last()?;
            let siblings = match parent {
                [] => doc.children.as_slice(),
                _ => match doc.node(parent)? {
                    Node::Element(el) => el.children.as_slice(),
                    _ => return None,
                },
            };
            let next = siblings
                .iter()
                .enumerate()
                .skip(ix + 1)
                .find(|(_, n)| matches!(n, Node::Text(_)))
                .map(|(i, _)| (i, 0));
            let prev = siblings
                .iter()
                .enumerate()
                .take(ix)
                .rev()
                .find_map(|(i, n)| match n {
                    Node::Text(t) => Some((i, t.text.len())),
                    _ => None,
                });
            let (i, offset) = next.or(prev)?;
            let mut path = parent.to_vec();
            path.push(i);
            Some(Point::new(path, offset))
        }
    }
}

struct ParagraphPlugin;

impl ComposePlugin for ParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: PARAGRAPH.to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }
}

struct LineBreakPlugin;

impl ComposePlugin for LineBreakPlugin {
    fn id(&self) -> &'static str {
        "core.line_break"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: LINE_BREAK.to_string(),
            role: NodeRole::Inline,
            is_void: true,
            children: ChildConstraint::None,
        }]
    }
}

struct ImagePlugin;

impl ComposePlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: IMAGE.to_string(),
            role: NodeRole::Block,
            is_void: true,
            children: ChildConstraint::None,
        }]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(RemoveImagesWithoutSource)]
    }
}

struct RemoveImagesWithoutSource;

impl NormalizePass for RemoveImagesWithoutSource {
    fn id(&self) -> &'static str {
        "image.remove_without_source"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        doc.children
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(ix, node)| match node {
                Node::Void(v)
                    if v.kind == IMAGE
                        && !v.attr_str("src").is_some_and(|s| !s.trim().is_empty()) =>
                {
                    Some(Op::RemoveNode { path: vec![ix] })
                }
                _ => None,
            })
            .collect()
    }
}

struct ListPlugin;

impl ComposePlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: LIST_ITEM.to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeListType)]
    }
}

struct NormalizeListType;

impl NormalizePass for NormalizeListType {
    fn id(&self) -> &'static str {
        "list.normalize_list_type"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            let valid = matches!(el.attr_str("list_type"), Some("bulleted" | "ordered"));
            if el.kind == LIST_ITEM && !valid {
                let mut set = Attrs::default();
                set.insert(
                    "list_type".to_string(),
                    serde_json::Value::String("bulleted".to_string()),
                );
                ops.push(Op::SetNodeAttrs {
                    path: vec![ix],
                    patch: AttrPatch {
                        set,
                        remove: Vec::new(),
                    },
                });
            } else if el.kind != LIST_ITEM && el.attrs.contains_key("list_type") {
                ops.push(Op::SetNodeAttrs {
                    path: vec![ix],
                    patch: AttrPatch {
                        set: Attrs::default(),
                        remove: vec!["list_type".to_string()],
                    },
                });
            }
        }
        ops
    }
}

struct AlignPlugin;

impl ComposePlugin for AlignPlugin {
    fn id(&self) -> &'static str {
        "align"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeAlignAttrs)]
    }
}

struct NormalizeAlignAttrs;

impl NormalizePass for NormalizeAlignAttrs {
    fn id(&self) -> &'static str {
        "block.normalize_align_attrs"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            let Some(value) = el.attrs.get("align") else {
                continue;
            };
            let keep = matches!(value.as_str(), Some("center" | "right" | "justify"))
                && registry.is_text_block(el);
            if !keep {
                ops.push(Op::SetNodeAttrs {
                    path: vec![ix],
                    patch: AttrPatch {
                        set: Attrs::default(),
                        remove: vec!["align".to_string()],
                    },
                });
            }
        }
        ops
    }
}

struct CoreNormalizePlugin;

impl ComposePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextBlockHasTextLeaf),
            Box::new(EnsureTextAroundInlineVoids),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc
            .children
            .iter()
            .any(|n| matches!(n, Node::Element(_)))
        {
            return Vec::new();
        }
        // Only voids (or nothing): the caret needs a paragraph to live in.
        vec![Op::InsertNode {
            path: vec![doc.children.len()],
            node: Node::paragraph(""),
        }]
    }
}

fn empty_text_leaf() -> Node {
    Node::Text(TextNode {
        text: String::new(),
        marks: Marks::default(),
    })
}

struct EnsureTextBlockHasTextLeaf;

impl NormalizePass for EnsureTextBlockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_block_has_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if !registry.is_text_block(el) {
                continue;
            }
            if !el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                ops.push(Op::InsertNode {
                    path: vec![ix, 0],
                    node: empty_text_leaf(),
                });
            }
        }
        ops
    }
}

/// Every inline void must sit between two text leaves so a caret can be
/// placed on either side of it.
struct EnsureTextAroundInlineVoids;

impl NormalizePass for EnsureTextAroundInlineVoids {
    fn id(&self) -> &'static str {
        "core.ensure_text_around_inline_voids"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if !registry.is_text_block(el) {
                continue;
            }

            let children = &el.children;
            let missing = children.iter().enumerate().find_map(|(child_ix, child)| {
                if !matches!(child, Node::Void(_)) {
                    return None;
                }
                let before_ok = child_ix
                    .checked_sub(1)
                    .is_some_and(|prev| matches!(children[prev], Node::Text(_)));
                if !before_ok {
                    return Some(child_ix);
                }
                let after_ok = matches!(children.get(child_ix + 1), Some(Node::Text(_)));
                (!after_ok).then_some(child_ix + 1)
            });

            if let Some(insert_at) = missing {
                ops.push(Op::InsertNode {
                    path: vec![ix, insert_at],
                    node: empty_text_leaf(),
                });
            }
        }
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        for (block_ix, node) in doc.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if !registry.is_text_block(el) {
                continue;
            }

            // Right to left, so earlier indices stay valid as leaves merge.
            for ix in (1..el.children.len()).rev() {
                let (Node::Text(left), Node::Text(right)) = (&el.children[ix - 1], &el.children[ix])
                else {
                    continue;
                };
                if left.marks == right.marks {
                    ops.push(Op::MergeText {
                        path: vec![block_ix, ix],
                    });
                }
            }
        }

        ops
    }
}
