//! Equidistant channels and Andrews' pitchforks.

use super::{Anchor, ShapeStyle};
use crate::normalize::VerticalMap;
use serde::{Deserialize, Serialize};

/// Two parallel lines: a base line through two anchors and a copy offset by
/// `channel_height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquidistantChannel {
    pub start: Anchor,
    pub end: Anchor,
    /// Vertical offset of the parallel line. A height, not a price.
    pub channel_height: f64,
    pub style: ShapeStyle,
    #[serde(default)]
    pub show_angle: bool,
    #[serde(default)]
    pub extend_to_infinity: bool,
}

impl EquidistantChannel {
    pub fn new(start: Anchor, end: Anchor, channel_height: f64) -> Self {
        Self {
            start,
            end,
            channel_height,
            style: ShapeStyle::default(),
            show_angle: false,
            extend_to_infinity: false,
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.start.remap(map);
        self.end.remap(map);
        self.channel_height = map.delta(self.channel_height);
    }
}

/// Median line with two parallels through three pivots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndrewsPitchfork {
    pub anchors: [Anchor; 3],
    pub style: ShapeStyle,
}

impl AndrewsPitchfork {
    pub fn new(anchors: [Anchor; 3]) -> Self {
        Self {
            anchors,
            style: ShapeStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        for anchor in &mut self.anchors {
            anchor.remap(map);
        }
    }
}
