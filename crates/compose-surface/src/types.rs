use compose_core::{EditorConfig, Selection};
use serde::{Deserialize, Serialize};

use crate::ToolbarState;

pub const DEFAULT_PLACEHOLDER: &str = "Write your message here...";
pub const DEFAULT_MIN_HEIGHT: &str = "200px";

/// Inputs the owner passes when mounting a surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorProps {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Layout hint passed through to the view.
    #[serde(default)]
    pub min_height: Option<String>,
}

impl EditorProps {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn min_height(mut self, min_height: impl Into<String>) -> Self {
        self.min_height = Some(min_height.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub editor: EditorConfig,
    pub placeholder: String,
    pub min_height: String,
    /// Report wrap-style commands one scheduler turn later instead of
    /// synchronously.
    pub defer_wrap_settle: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            editor: EditorConfig::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            min_height: DEFAULT_MIN_HEIGHT.to_string(),
            defer_wrap_settle: true,
        }
    }
}

impl SurfaceConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Props win over configured defaults.
    pub(crate) fn with_props(mut self, props: &EditorProps) -> Self {
        if let Some(placeholder) = &props.placeholder {
            self.placeholder = placeholder.clone();
        }
        if let Some(min_height) = &props.min_height {
            self.min_height = min_height.clone();
        }
        self
    }
}

/// Everything a host needs to render the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceView {
    pub markup: String,
    /// Shown instead of content while the document is blank and unfocused.
    pub placeholder: Option<String>,
    pub min_height: String,
    pub focused: bool,
    pub selection: Option<Selection>,
    pub toolbar: ToolbarState,
}

impl SurfaceView {
    pub fn shows_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }
}
