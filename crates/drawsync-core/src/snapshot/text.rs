//! Text anchored to the chart and static text pinned to the viewport.

use super::{Color, HorizontalAlignment, VerticalAlignment};
use crate::normalize::VerticalMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default font size in points.
pub const DEFAULT_FONT_SIZE: u32 = 12;

/// Text placed at a time/price position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub time: DateTime<Utc>,
    pub y: f64,
    pub text: String,
    pub color: Color,
    pub font_size: u32,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default)]
    pub is_underlined: bool,
    #[serde(default)]
    pub horizontal_alignment: HorizontalAlignment,
    #[serde(default)]
    pub vertical_alignment: VerticalAlignment,
}

impl Text {
    pub fn new(time: DateTime<Utc>, y: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            y,
            text: text.into(),
            color: Color::default(),
            font_size: DEFAULT_FONT_SIZE,
            is_bold: false,
            is_italic: false,
            is_underlined: false,
            horizontal_alignment: HorizontalAlignment::default(),
            vertical_alignment: VerticalAlignment::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.y = map.absolute(self.y);
    }
}

/// Text fixed to a corner or edge of the chart area.
///
/// Its interactivity is managed by the host and never set by sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticText {
    pub text: String,
    pub color: Color,
    pub horizontal_alignment: HorizontalAlignment,
    pub vertical_alignment: VerticalAlignment,
}

impl StaticText {
    pub fn new(
        text: impl Into<String>,
        horizontal_alignment: HorizontalAlignment,
        vertical_alignment: VerticalAlignment,
    ) -> Self {
        Self {
            text: text.into(),
            color: Color::default(),
            horizontal_alignment,
            vertical_alignment,
        }
    }
}
