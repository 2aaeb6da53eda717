//! Host selection capture and restore.
//!
//! The host owns the live selection (one per editing surface). The tracker
//! reads it before a mutation and writes an equivalent one back afterwards,
//! falling back to a caret at the end of the document whenever the stored
//! positions no longer exist.

use std::cell::RefCell;
use std::rc::Rc;

use compose_core::{ActiveStyles, DocumentId, Editor, Selection};

/// Access to the host's text selection.
pub trait SelectionProvider {
    /// The active selection inside the editable region, if any.
    fn capture(&self) -> Option<Selection>;

    /// Replaces the host selection. `None` clears it.
    fn restore(&mut self, selection: Option<&Selection>);

    /// Styles at the host selection, or at the model selection when the host
    /// has none that resolves in `editor`'s document. Read-only.
    fn query_active_styles(&self, editor: &Editor) -> ActiveStyles {
        match self.capture() {
            Some(selection)
                if editor.doc().contains_point(&selection.anchor)
                    && editor.doc().contains_point(&selection.focus) =>
            {
                editor.active_styles_at(&selection)
            }
            _ => editor.active_styles(),
        }
    }
}

/// In-memory selection for headless hosts and tests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemorySelection {
    current: Rc<RefCell<Option<Selection>>>,
}

impl MemorySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, selection: Option<Selection>) {
        *self.current.borrow_mut() = selection;
    }

    pub fn get(&self) -> Option<Selection> {
        self.current.borrow().clone()
    }
}

impl SelectionProvider for MemorySelection {
    fn capture(&self) -> Option<Selection> {
        self.get()
    }

    fn restore(&mut self, selection: Option<&Selection>) {
        self.set(selection.cloned());
    }
}

/// A selection together with the document it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSelection {
    pub document: DocumentId,
    pub selection: Selection,
}

pub struct SelectionTracker;

impl SelectionTracker {
    pub fn capture(provider: &dyn SelectionProvider, editor: &Editor) -> Option<TrackedSelection> {
        provider.capture().map(|selection| TrackedSelection {
            document: editor.document_id(),
            selection,
        })
    }

    /// Re-establishes `tracked` in both the editor and the host. Stale or
    /// foreign selections collapse to the end of the document. Never fails.
    pub fn restore(
        provider: &mut dyn SelectionProvider,
        editor: &mut Editor,
        tracked: Option<&TrackedSelection>,
    ) {
        let Some(tracked) = tracked else {
            return;
        };

        let same_document = tracked.document == editor.document_id();
        let resolvable = editor.doc().contains_point(&tracked.selection.anchor)
            && editor.doc().contains_point(&tracked.selection.focus);

        if same_document && resolvable {
            editor.set_selection(tracked.selection.clone());
        } else {
            tracing::warn!(
                same_document,
                resolvable,
                "selection no longer resolves, collapsing to document end"
            );
            editor.select_end();
        }
        provider.restore(Some(editor.selection()));
    }
}
