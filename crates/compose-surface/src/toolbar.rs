use compose_core::{
    ActiveStyles, Alignment, EMOJIS, FontSize, FormatCommand, InlineStyle, ListKind, TextColor,
};
use serde::{Deserialize, Serialize};

/// Asks the user for a short string, e.g. a URL. `None` means cancelled.
pub trait Prompt {
    fn ask(&mut self, message: &str) -> Option<String>;
}

impl<F> Prompt for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn ask(&mut self, message: &str) -> Option<String> {
        self(message)
    }
}

/// Something a toolbar control can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "kebab-case")]
pub enum ToolbarAction {
    ToggleStyle(InlineStyle),
    Align(Alignment),
    List(ListKind),
    FontSize(FontSize),
    TextColor(TextColor),
    ResetColor,
    Link,
    Unlink,
    Image,
    Emoji(String),
    Undo,
    Redo,
}

impl ToolbarAction {
    pub fn label(&self) -> &'static str {
        match self {
            ToolbarAction::ToggleStyle(InlineStyle::Bold) => "Bold",
            ToolbarAction::ToggleStyle(InlineStyle::Italic) => "Italic",
            ToolbarAction::ToggleStyle(InlineStyle::Underline) => "Underline",
            ToolbarAction::ToggleStyle(InlineStyle::Strikethrough) => "Strikethrough",
            ToolbarAction::Align(Alignment::Left) => "Align Left",
            ToolbarAction::Align(Alignment::Center) => "Align Center",
            ToolbarAction::Align(Alignment::Right) => "Align Right",
            ToolbarAction::Align(Alignment::Justify) => "Align Justify",
            ToolbarAction::List(ListKind::Bulleted) => "Bullet List",
            ToolbarAction::List(ListKind::Ordered) => "Numbered List",
            ToolbarAction::FontSize(_) => "Font Size",
            ToolbarAction::TextColor(_) => "Text Color",
            ToolbarAction::ResetColor => "Reset Color",
            ToolbarAction::Link => "Insert Link",
            ToolbarAction::Unlink => "Remove Link",
            ToolbarAction::Image => "Insert Image",
            ToolbarAction::Emoji(_) => "Emoji",
            ToolbarAction::Undo => "Undo",
            ToolbarAction::Redo => "Redo",
        }
    }

    /// The question asked before the action runs, for actions that need one.
    pub fn prompt_message(&self) -> Option<&'static str> {
        match self {
            ToolbarAction::Link => Some("Enter link URL:"),
            ToolbarAction::Image => Some("Enter image URL:"),
            _ => None,
        }
    }

    /// The command this action dispatches. `answer` is the prompt result for
    /// actions that ask one; history actions have no command.
    pub fn command(&self, answer: Option<&str>) -> Option<FormatCommand> {
        let command = match self {
            ToolbarAction::ToggleStyle(style) => FormatCommand::ToggleInlineStyle(*style),
            ToolbarAction::Align(align) => FormatCommand::SetBlockAlignment(*align),
            ToolbarAction::List(list) => FormatCommand::ToggleList(*list),
            ToolbarAction::FontSize(size) => FormatCommand::SetFontSize(*size),
            ToolbarAction::TextColor(color) => FormatCommand::SetTextColor(*color),
            ToolbarAction::ResetColor => FormatCommand::ResetTextColor,
            ToolbarAction::Link => {
                FormatCommand::InsertLink(answer.unwrap_or_default().to_string())
            }
            ToolbarAction::Unlink => FormatCommand::RemoveLink,
            ToolbarAction::Image => {
                FormatCommand::InsertImage(answer.unwrap_or_default().to_string())
            }
            ToolbarAction::Emoji(emoji) => FormatCommand::InsertLiteralText(emoji.clone()),
            ToolbarAction::Undo | ToolbarAction::Redo => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolbarButton {
    pub action: ToolbarAction,
    pub label: &'static str,
    /// `None` for buttons with no on/off state.
    pub active: Option<bool>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontSizeOption {
    pub size: FontSize,
    pub label: &'static str,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorSwatch {
    pub color: TextColor,
    pub label: &'static str,
    pub hex: &'static str,
    pub active: bool,
}

/// What the toolbar shows for the current selection. Projection only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolbarState {
    pub buttons: Vec<ToolbarButton>,
    pub font_sizes: Vec<FontSizeOption>,
    pub colors: Vec<ColorSwatch>,
    pub emojis: Vec<&'static str>,
}

impl ToolbarState {
    pub fn project(styles: &ActiveStyles, can_undo: bool, can_redo: bool) -> Self {
        let toggle = |action: ToolbarAction, active: bool| ToolbarButton {
            label: action.label(),
            action,
            active: Some(active),
            enabled: true,
        };
        let plain = |action: ToolbarAction, enabled: bool| ToolbarButton {
            label: action.label(),
            action,
            active: None,
            enabled,
        };

        let mut buttons: Vec<ToolbarButton> = InlineStyle::ALL
            .into_iter()
            .map(|style| toggle(ToolbarAction::ToggleStyle(style), styles.has(style)))
            .collect();
        buttons.extend(
            Alignment::ALL
                .into_iter()
                .map(|align| toggle(ToolbarAction::Align(align), styles.alignment == align)),
        );
        buttons.extend(
            [ListKind::Bulleted, ListKind::Ordered]
                .into_iter()
                .map(|list| toggle(ToolbarAction::List(list), styles.list == Some(list))),
        );
        buttons.push(toggle(ToolbarAction::Link, styles.link.is_some()));
        buttons.push(plain(ToolbarAction::Unlink, styles.link.is_some()));
        buttons.push(plain(ToolbarAction::Image, true));
        buttons.push(plain(ToolbarAction::ResetColor, styles.text_color.is_some()));
        buttons.push(plain(ToolbarAction::Undo, can_undo));
        buttons.push(plain(ToolbarAction::Redo, can_redo));

        let font_sizes = FontSize::MENU
            .into_iter()
            .map(|(size, label)| FontSizeOption {
                size,
                label,
                active: styles.font_size == Some(size),
            })
            .collect();
        let colors = TextColor::ALL
            .into_iter()
            .map(|color| ColorSwatch {
                color,
                label: color.label(),
                hex: color.hex(),
                active: styles.text_color == Some(color),
            })
            .collect();

        Self {
            buttons,
            font_sizes,
            colors,
            emojis: EMOJIS.to_vec(),
        }
    }

    pub fn button(&self, action: &ToolbarAction) -> Option<&ToolbarButton> {
        self.buttons.iter().find(|button| &button.action == action)
    }

    pub fn is_active(&self, action: &ToolbarAction) -> bool {
        self.button(action)
            .and_then(|button| button.active)
            .unwrap_or(false)
    }
}
