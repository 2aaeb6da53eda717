//! Scripted host for an editing surface.
//!
//! A story mounts one surface and replays user steps against it, the way a
//! browser host would: the microtask queue is drained after every step and
//! each onChange report is printed as it arrives.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context as _;
use compose_core::{FormatCommand, InputEvent, Point, Selection};
use compose_surface::{
    EditingSurface, EditorProps, MemorySelection, MicrotaskQueue, SurfaceConfig, SurfaceView,
    ToolbarAction,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub props: EditorProps,
    #[serde(default)]
    pub config: Option<SurfaceConfig>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Step {
    Focus,
    Blur,
    /// Moves the host selection. Without `focus` the selection is a caret.
    Select {
        anchor: Point,
        #[serde(default)]
        focus: Option<Point>,
    },
    Input {
        event: InputEvent,
    },
    /// One insert-text event per character.
    Type {
        text: String,
    },
    Command {
        command: FormatCommand,
    },
    /// A toolbar click. `answer` is what the user types into the prompt.
    Action {
        action: ToolbarAction,
        #[serde(default)]
        answer: Option<String>,
    },
    SetValue {
        value: String,
    },
    Undo,
    Redo,
    Toolbar,
    View,
}

pub struct Report {
    pub changes: Vec<String>,
    pub view: Option<SurfaceView>,
}

impl Script {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn run(self) -> anyhow::Result<Report> {
        let queue = MicrotaskQueue::new();
        let host = MemorySelection::new();
        let changes = Rc::new(RefCell::new(Vec::new()));

        let sink = changes.clone();
        let mut builder = EditingSurface::builder(self.props, Rc::new(queue.clone()))
            .selection_provider(host.clone())
            .on_change(move |markup| {
                println!("onChange {markup:?}");
                sink.borrow_mut().push(markup.to_string());
            });
        if let Some(config) = self.config {
            builder = builder.config(config);
        }
        let surface = builder.mount();

        for (ix, step) in self.steps.into_iter().enumerate() {
            tracing::debug!(step = ix, ?step, "running step");
            run_step(&surface, &host, step).with_context(|| format!("step {ix} failed"))?;
            let ran = queue.run_pending();
            if ran > 0 {
                tracing::debug!(step = ix, ran, "drained deferred tasks");
            }
        }

        let view = surface.view();
        surface.unmount();
        let changes = changes.borrow().clone();
        Ok(Report { changes, view })
    }
}

fn run_step(surface: &EditingSurface, host: &MemorySelection, step: Step) -> anyhow::Result<()> {
    match step {
        Step::Focus => surface.focus(),
        Step::Blur => surface.blur(),
        Step::Select { anchor, focus } => {
            let focus = focus.unwrap_or_else(|| anchor.clone());
            host.set(Some(Selection::new(anchor, focus)));
        }
        Step::Input { event } => {
            surface.input(event)?;
        }
        Step::Type { text } => {
            for ch in text.chars() {
                surface.input(InputEvent::InsertText(ch.to_string()))?;
            }
        }
        Step::Command { command } => {
            let outcome = surface.apply(command)?;
            tracing::info!(?outcome, "command");
        }
        Step::Action { action, answer } => {
            let mut prompt = |message: &str| -> Option<String> {
                tracing::info!(message, ?answer, "prompt");
                answer.clone()
            };
            let outcome = surface.activate(&action, &mut prompt)?;
            tracing::info!(action = action.label(), ?outcome, "toolbar action");
        }
        Step::SetValue { value } => {
            let replaced = surface.set_value(value);
            tracing::info!(replaced, "value set by owner");
        }
        Step::Undo => {
            surface.undo();
        }
        Step::Redo => {
            surface.redo();
        }
        Step::Toolbar => {
            let toolbar = surface.toolbar();
            let active: Vec<&str> = toolbar
                .buttons
                .iter()
                .filter(|button| button.active == Some(true))
                .map(|button| button.label)
                .collect();
            println!("toolbar [{}]", active.join(", "));
        }
        Step::View => {
            if let Some(view) = surface.view() {
                println!("{}", serde_json::to_string(&view)?);
            }
        }
    }
    Ok(())
}
