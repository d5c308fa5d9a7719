//! Trend, horizontal and vertical lines.

use super::{Anchor, LineStroke, ShapeStyle};
use crate::normalize::VerticalMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A line through two anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub start: Anchor,
    pub end: Anchor,
    pub style: ShapeStyle,
    #[serde(default)]
    pub show_angle: bool,
    #[serde(default)]
    pub extend_to_infinity: bool,
}

impl TrendLine {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self {
            start,
            end,
            style: ShapeStyle::default(),
            show_angle: false,
            extend_to_infinity: false,
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.start.remap(map);
        self.end.remap(map);
    }
}

/// A line at a fixed price across the whole chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizontalLine {
    pub y: f64,
    pub stroke: LineStroke,
}

impl HorizontalLine {
    pub fn new(y: f64) -> Self {
        Self {
            y,
            stroke: LineStroke::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.y = map.absolute(self.y);
    }
}

/// A line at a fixed time. Carries no vertical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalLine {
    pub time: DateTime<Utc>,
    pub stroke: LineStroke,
}

impl VerticalLine {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            stroke: LineStroke::default(),
        }
    }
}
