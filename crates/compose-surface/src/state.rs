//! The editing surface: owns the document while mounted and keeps the
//! owner's markup value in step with it.
//!
//! Each event runs to completion. A deferred settle left over from an
//! earlier command is flushed before the next event is handled, so reported
//! values never interleave with newer edits.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use compose_core::{
    ApplyError, CommandError, CommandOutcome, ControlledValue, Document, Editor, FormatCommand,
    InputEvent, Point, Selection, SettleMode,
};

use crate::{
    EditorProps, MemorySelection, Prompt, Scheduler, SelectionProvider, SelectionTracker,
    SurfaceConfig, SurfaceView, ToolbarAction, ToolbarState, TrackedSelection,
};

type OnChange = Box<dyn FnMut(&str)>;

pub struct SurfaceBuilder {
    props: EditorProps,
    config: SurfaceConfig,
    scheduler: Rc<dyn Scheduler>,
    provider: Box<dyn SelectionProvider>,
    on_change: OnChange,
}

impl SurfaceBuilder {
    pub fn config(mut self, config: SurfaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn selection_provider(mut self, provider: impl SelectionProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    pub fn on_change(mut self, on_change: impl FnMut(&str) + 'static) -> Self {
        self.on_change = Box::new(on_change);
        self
    }

    /// Creates the document from the initial value.
    pub fn mount(self) -> EditingSurface {
        let config = self.config.with_props(&self.props);
        let doc = match ControlledValue::from(self.props.value.as_str()).to_document() {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(%err, "initial value did not parse, starting empty");
                Document::empty()
            }
        };
        let editor = Editor::rich_text(doc, config.editor.clone());
        tracing::debug!(document = ?editor.document_id(), "surface mounted");

        EditingSurface {
            inner: Rc::new(SurfaceInner {
                state: RefCell::new(SurfaceState {
                    editor,
                    config,
                    provider: self.provider,
                    focused: false,
                    mounted: true,
                    last_value: self.props.value,
                    pending_settle: None,
                    next_ticket: 0,
                    blur_selection: None,
                }),
                on_change: RefCell::new(self.on_change),
                outbox: RefCell::new(VecDeque::new()),
                scheduler: self.scheduler,
            }),
        }
    }
}

struct SurfaceState {
    editor: Editor,
    config: SurfaceConfig,
    provider: Box<dyn SelectionProvider>,
    focused: bool,
    mounted: bool,
    /// The value last reported to or accepted from the owner.
    last_value: String,
    pending_settle: Option<u64>,
    next_ticket: u64,
    blur_selection: Option<TrackedSelection>,
}

impl SurfaceState {
    /// Adopts the host selection before a mutation.
    fn sync_from_host(&mut self) {
        let tracked = SelectionTracker::capture(self.provider.as_ref(), &self.editor);
        if tracked.is_some() {
            SelectionTracker::restore(self.provider.as_mut(), &mut self.editor, tracked.as_ref());
        }
    }

    fn push_to_host(&mut self) {
        self.provider.restore(Some(self.editor.selection()));
    }

    fn serialize(&mut self, trigger: &'static str) -> Option<String> {
        self.pending_settle = None;
        match self.editor.value() {
            Ok(value) => {
                let markup = value.into_string();
                self.last_value = markup.clone();
                Some(markup)
            }
            Err(err) => {
                tracing::warn!(%err, trigger, "serialization failed, keeping previous value");
                None
            }
        }
    }
}

struct SurfaceInner {
    state: RefCell<SurfaceState>,
    on_change: RefCell<OnChange>,
    outbox: RefCell<VecDeque<String>>,
    scheduler: Rc<dyn Scheduler>,
}

impl SurfaceInner {
    fn with_state<R>(&self, f: impl FnOnce(&mut SurfaceState) -> R) -> Option<R> {
        match self.state.try_borrow_mut() {
            Ok(mut state) if state.mounted => Some(f(&mut state)),
            Ok(_) => {
                tracing::debug!("surface is unmounted, ignoring call");
                None
            }
            Err(_) => {
                tracing::warn!("re-entrant surface call ignored");
                None
            }
        }
    }

    /// Called with no state borrow held. A report raised from inside
    /// `onChange` is queued and delivered once the running callback returns.
    fn emit(&self, markup: &str) {
        self.outbox.borrow_mut().push_back(markup.to_string());
        let Ok(mut on_change) = self.on_change.try_borrow_mut() else {
            tracing::debug!("onChange is running, report queued");
            return;
        };
        loop {
            let next = self.outbox.borrow_mut().pop_front();
            let Some(markup) = next else {
                break;
            };
            (*on_change)(&markup);
        }
    }

    fn settle(&self, trigger: &'static str) {
        let Some(markup) = self.with_state(|state| state.serialize(trigger)).flatten() else {
            return;
        };
        tracing::debug!(trigger, len = markup.len(), "settled");
        self.emit(&markup);
    }

    fn flush_pending(&self) {
        let pending = self
            .with_state(|state| state.pending_settle.is_some())
            .unwrap_or(false);
        if pending {
            self.settle("flush");
        }
    }

    fn run_deferred(&self, ticket: u64) {
        let due = self
            .with_state(|state| state.pending_settle == Some(ticket))
            .unwrap_or(false);
        if due {
            self.settle("deferred");
        } else {
            tracing::trace!(ticket, "deferred settle no longer pending");
        }
    }
}

/// A mounted rich text editing surface.
///
/// Cloning yields another handle to the same surface.
#[derive(Clone)]
pub struct EditingSurface {
    inner: Rc<SurfaceInner>,
}

impl EditingSurface {
    pub fn builder(props: EditorProps, scheduler: Rc<dyn Scheduler>) -> SurfaceBuilder {
        SurfaceBuilder {
            props,
            config: SurfaceConfig::default(),
            scheduler,
            provider: Box::new(MemorySelection::new()),
            on_change: Box::new(|_| {}),
        }
    }

    pub fn focus(&self) {
        self.inner.flush_pending();
        self.inner.with_state(|state| {
            state.focused = true;
            if state.editor.doc().is_blank() {
                // Typing starts inside a real paragraph.
                if state.editor.doc() != &Document::empty() {
                    state.editor.replace_document(Document::empty());
                }
                state
                    .editor
                    .set_selection(Selection::collapsed(Point::new(vec![0, 0], 0)));
                state.push_to_host();
                return;
            }
            // A selection the host set while focusing wins over the one
            // remembered at blur.
            let remembered = state.blur_selection.take();
            let tracked = SelectionTracker::capture(state.provider.as_ref(), &state.editor)
                .or(remembered);
            match tracked {
                Some(tracked) => SelectionTracker::restore(
                    state.provider.as_mut(),
                    &mut state.editor,
                    Some(&tracked),
                ),
                None => state.push_to_host(),
            }
        });
    }

    /// Settles with the host selection captured before and restored after
    /// serialization.
    pub fn blur(&self) {
        self.inner.flush_pending();
        let markup = self
            .inner
            .with_state(|state| {
                let tracked = SelectionTracker::capture(state.provider.as_ref(), &state.editor);
                let markup = state.serialize("blur");
                SelectionTracker::restore(
                    state.provider.as_mut(),
                    &mut state.editor,
                    tracked.as_ref(),
                );
                state.focused = false;
                state.blur_selection = tracked;
                markup
            })
            .flatten();
        if let Some(markup) = markup {
            tracing::debug!(trigger = "blur", len = markup.len(), "settled");
            self.inner.emit(&markup);
        }
    }

    /// Applies raw input. Settles immediately when the document changed.
    pub fn input(&self, event: InputEvent) -> Result<bool, ApplyError> {
        self.inner.flush_pending();
        let changed = self.inner.with_state(|state| {
            state.sync_from_host();
            let changed = state.editor.handle_input(event)?;
            if changed {
                state.push_to_host();
            }
            Ok::<_, ApplyError>(changed)
        });
        let changed = changed.transpose()?.unwrap_or(false);
        if changed {
            self.inner.settle("input");
        }
        Ok(changed)
    }

    pub fn apply(&self, command: FormatCommand) -> Result<CommandOutcome, CommandError> {
        self.inner.flush_pending();
        let result = self.inner.with_state(|state| {
            state.sync_from_host();
            let outcome = state.editor.dispatch(command)?;
            if outcome.is_applied() {
                state.push_to_host();
            }
            Ok::<_, CommandError>((outcome, state.config.defer_wrap_settle))
        });
        let Some((outcome, defer)) = result.transpose()? else {
            return Ok(CommandOutcome::Unchanged);
        };

        match outcome {
            CommandOutcome::Applied(SettleMode::Deferred) if defer => self.schedule_settle(),
            CommandOutcome::Applied(_) => self.inner.settle("command"),
            CommandOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    /// Runs a toolbar action, asking `prompt` first when the action needs
    /// input. A cancelled or empty answer changes nothing.
    pub fn activate(
        &self,
        action: &ToolbarAction,
        prompt: &mut dyn Prompt,
    ) -> Result<CommandOutcome, CommandError> {
        match action {
            ToolbarAction::Undo => return Ok(history_outcome(self.undo())),
            ToolbarAction::Redo => return Ok(history_outcome(self.redo())),
            _ => {}
        }

        let answer = match action.prompt_message() {
            Some(message) => match prompt.ask(message) {
                Some(answer) if !answer.trim().is_empty() => Some(answer),
                _ => {
                    tracing::debug!(action = action.label(), "prompt cancelled");
                    return Ok(CommandOutcome::Unchanged);
                }
            },
            None => None,
        };
        match action.command(answer.as_deref()) {
            Some(command) => self.apply(command),
            None => Ok(CommandOutcome::Unchanged),
        }
    }

    pub fn undo(&self) -> bool {
        self.history(Editor::undo, "undo")
    }

    pub fn redo(&self) -> bool {
        self.history(Editor::redo, "redo")
    }

    fn history(&self, step: fn(&mut Editor) -> bool, trigger: &'static str) -> bool {
        self.inner.flush_pending();
        let changed = self
            .inner
            .with_state(|state| {
                let changed = step(&mut state.editor);
                if changed {
                    state.push_to_host();
                }
                changed
            })
            .unwrap_or(false);
        if changed {
            self.inner.settle(trigger);
        }
        changed
    }

    /// Accepts a value from the owner. Echoes of the surface's own value are
    /// ignored; anything else replaces the document. Returns whether the
    /// document was replaced.
    pub fn set_value(&self, value: impl Into<String>) -> bool {
        let value = value.into();
        self.inner
            .with_state(|state| {
                if value == state.last_value {
                    return false;
                }
                let doc = match ControlledValue::from(value.as_str()).to_document() {
                    Ok(doc) => doc,
                    Err(err) => {
                        tracing::warn!(%err, "incoming value did not parse, keeping document");
                        return false;
                    }
                };

                if let Some(ticket) = state.pending_settle.take() {
                    tracing::debug!(ticket, "re-hydration cancelled a pending settle");
                }
                state.editor.replace_document(doc);
                state.last_value = value;
                tracing::debug!(document = ?state.editor.document_id(), "re-hydrated");

                // The old host selection pointed into nodes that are gone.
                if state.focused {
                    state.push_to_host();
                } else {
                    state.provider.restore(None);
                }
                true
            })
            .unwrap_or(false)
    }

    /// The value last reported to or accepted from the owner.
    pub fn value(&self) -> String {
        self.inner
            .state
            .try_borrow()
            .map(|state| state.last_value.clone())
            .unwrap_or_default()
    }

    pub fn is_focused(&self) -> bool {
        self.inner
            .state
            .try_borrow()
            .map(|state| state.focused)
            .unwrap_or(false)
    }

    pub fn has_pending_settle(&self) -> bool {
        self.inner
            .state
            .try_borrow()
            .map(|state| state.pending_settle.is_some())
            .unwrap_or(false)
    }

    pub fn toolbar(&self) -> ToolbarState {
        self.inner
            .with_state(|state| project_toolbar(state))
            .unwrap_or_else(|| ToolbarState::project(&Default::default(), false, false))
    }

    pub fn view(&self) -> Option<SurfaceView> {
        self.inner.with_state(|state| {
            let markup = match state.editor.value() {
                Ok(value) => value.into_string(),
                Err(err) => {
                    tracing::warn!(%err, "rendering last reported value");
                    state.last_value.clone()
                }
            };
            let blank = state.editor.doc().is_blank();
            SurfaceView {
                markup,
                placeholder: (blank && !state.focused).then(|| state.config.placeholder.clone()),
                min_height: state.config.min_height.clone(),
                focused: state.focused,
                selection: state.focused.then(|| state.editor.selection().clone()),
                toolbar: project_toolbar(state),
            }
        })
    }

    /// Read access to the live editor.
    pub fn with_editor<R>(&self, f: impl FnOnce(&Editor) -> R) -> Option<R> {
        self.inner.with_state(|state| f(&state.editor))
    }

    /// Tears the surface down. Pending deferred work becomes a no-op and the
    /// last reported value is returned.
    pub fn unmount(&self) -> String {
        self.inner
            .with_state(|state| {
                state.mounted = false;
                state.pending_settle = None;
                state.focused = false;
                tracing::debug!(document = ?state.editor.document_id(), "surface unmounted");
                state.last_value.clone()
            })
            .unwrap_or_default()
    }

    fn schedule_settle(&self) {
        let Some(ticket) = self.inner.with_state(|state| {
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.pending_settle = Some(ticket);
            ticket
        }) else {
            return;
        };

        let weak: Weak<SurfaceInner> = Rc::downgrade(&self.inner);
        self.inner.scheduler.schedule(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                tracing::trace!(ticket, "surface dropped before deferred settle");
                return;
            };
            inner.run_deferred(ticket);
        }));
        tracing::trace!(ticket, "settle deferred");
    }
}

fn project_toolbar(state: &SurfaceState) -> ToolbarState {
    let styles = state.provider.query_active_styles(&state.editor);
    ToolbarState::project(&styles, state.editor.can_undo(), state.editor.can_redo())
}

fn history_outcome(changed: bool) -> CommandOutcome {
    if changed {
        CommandOutcome::Applied(SettleMode::Immediate)
    } else {
        CommandOutcome::Unchanged
    }
}
