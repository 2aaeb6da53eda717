use std::fmt;

use serde::{Deserialize, Serialize};

/// A value outside the fixed font-size levels or color swatches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("Unknown font size level: {0} (expected 1..=7)")]
    FontSize(String),
    #[error("Unknown text color: {0}")]
    Color(String),
}

const FONT_SIZE_PX: [u32; 7] = [10, 13, 16, 18, 24, 32, 48];

/// Legacy font size level (1..=7), each mapped to a fixed pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FontSize(u8);

impl FontSize {
    pub const SMALL: FontSize = FontSize(1);
    pub const NORMAL: FontSize = FontSize(3);
    pub const LARGE: FontSize = FontSize(5);
    pub const EXTRA_LARGE: FontSize = FontSize(7);

    /// Entries of the toolbar's font size menu.
    pub const MENU: [(FontSize, &'static str); 4] = [
        (FontSize::SMALL, "Small"),
        (FontSize::NORMAL, "Normal"),
        (FontSize::LARGE, "Large"),
        (FontSize::EXTRA_LARGE, "Extra Large"),
    ];

    pub fn from_level(level: u8) -> Option<Self> {
        (1..=7).contains(&level).then_some(Self(level))
    }

    pub fn from_px(px: u32) -> Option<Self> {
        FONT_SIZE_PX
            .iter()
            .position(|&candidate| candidate == px)
            .map(|ix| Self(ix as u8 + 1))
    }

    /// Parses a CSS `font-size` value such as `24px`.
    pub fn from_css(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let px = value.strip_suffix("px")?.trim();
        let px: f32 = px.parse().ok()?;
        if px.fract() != 0.0 || px < 0.0 {
            return None;
        }
        Self::from_px(px as u32)
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn px(self) -> u32 {
        FONT_SIZE_PX[usize::from(self.0 - 1)]
    }

    pub fn css(self) -> String {
        format!("{}px", self.px())
    }
}

impl TryFrom<u8> for FontSize {
    type Error = PaletteError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| PaletteError::FontSize(level.to_string()))
    }
}

impl From<FontSize> for u8 {
    fn from(size: FontSize) -> Self {
        size.0
    }
}

/// The fixed color swatch list offered by the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextColor {
    Black,
    DarkGray,
    Gray,
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    White,
}

impl TextColor {
    pub const ALL: [TextColor; 11] = [
        TextColor::Black,
        TextColor::DarkGray,
        TextColor::Gray,
        TextColor::Red,
        TextColor::Orange,
        TextColor::Yellow,
        TextColor::Green,
        TextColor::Cyan,
        TextColor::Blue,
        TextColor::Purple,
        TextColor::White,
    ];

    pub fn hex(self) -> &'static str {
        match self {
            TextColor::Black => "#000000",
            TextColor::DarkGray => "#444444",
            TextColor::Gray => "#888888",
            TextColor::Red => "#ff0000",
            TextColor::Orange => "#ff9900",
            TextColor::Yellow => "#ffff00",
            TextColor::Green => "#00ff00",
            TextColor::Cyan => "#00ffff",
            TextColor::Blue => "#0000ff",
            TextColor::Purple => "#9900ff",
            TextColor::White => "#ffffff",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextColor::Black => "Black",
            TextColor::DarkGray => "Dark Gray",
            TextColor::Gray => "Gray",
            TextColor::Red => "Red",
            TextColor::Orange => "Orange",
            TextColor::Yellow => "Yellow",
            TextColor::Green => "Green",
            TextColor::Cyan => "Cyan",
            TextColor::Blue => "Blue",
            TextColor::Purple => "Purple",
            TextColor::White => "White",
        }
    }

    /// Accepts `#rrggbb`, `#rgb`, `rgb(r, g, b)` or a swatch label.
    /// Anything that does not land on a swatch is rejected.
    pub fn from_css(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let hex = if let Some(short) = value
            .strip_prefix('#')
            .filter(|digits| digits.len() == 3)
        {
            let mut expanded = String::from("#");
            for ch in short.chars() {
                expanded.push(ch);
                expanded.push(ch);
            }
            expanded
        } else if let Some(args) = value
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let channels: Vec<u8> = args
                .split(',')
                .map(|part| part.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .ok()?;
            let [r, g, b] = channels.as_slice() else {
                return None;
            };
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            value.clone()
        };

        Self::ALL.into_iter().find(|color| {
            color.hex() == hex || color.label().eq_ignore_ascii_case(&value)
        })
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hex())
    }
}

impl TryFrom<String> for TextColor {
    type Error = PaletteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_css(&value).ok_or(PaletteError::Color(value))
    }
}

impl From<TextColor> for String {
    fn from(color: TextColor) -> Self {
        color.hex().to_string()
    }
}

/// Emoji offered by the toolbar's emoji grid.
pub const EMOJIS: [&str; 13] = [
    "😊", "👍", "🎉", "❤️", "👏", "🙏", "😂", "🤔", "🔥", "✅", "⭐", "📧", "📝",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_size_levels_map_to_fixed_pixels() {
        let px: Vec<u32> = (1..=7)
            .map(|level| FontSize::from_level(level).unwrap().px())
            .collect();
        assert_eq!(px, vec![10, 13, 16, 18, 24, 32, 48]);
        assert!(FontSize::from_level(0).is_none());
        assert!(FontSize::from_level(8).is_none());
    }

    #[test]
    fn font_size_parses_only_palette_pixels() {
        assert_eq!(FontSize::from_css("24px"), Some(FontSize::LARGE));
        assert_eq!(FontSize::from_css(" 13PX "), FontSize::from_level(2));
        assert_eq!(FontSize::from_css("15px"), None);
        assert_eq!(FontSize::from_css("1.5em"), None);
    }

    #[test]
    fn colors_parse_hex_rgb_and_labels() {
        assert_eq!(TextColor::from_css("#FF0000"), Some(TextColor::Red));
        assert_eq!(TextColor::from_css("#fff"), Some(TextColor::White));
        assert_eq!(TextColor::from_css("rgb(153, 0, 255)"), Some(TextColor::Purple));
        assert_eq!(TextColor::from_css("dark gray"), Some(TextColor::DarkGray));
        assert_eq!(TextColor::from_css("#123456"), None);
    }

    #[test]
    fn palette_values_round_trip_through_serde() {
        let json = serde_json::json!({ "size": 5, "color": "#0000ff" });
        let size: FontSize = serde_json::from_value(json["size"].clone()).unwrap();
        let color: TextColor = serde_json::from_value(json["color"].clone()).unwrap();
        assert_eq!(size, FontSize::LARGE);
        assert_eq!(color, TextColor::Blue);
        assert!(serde_json::from_value::<FontSize>(serde_json::json!(9)).is_err());
        assert!(serde_json::from_value::<TextColor>(serde_json::json!("#abcdef")).is_err());
    }
}
