//! Vertical coordinate normalization between sessions.
//!
//! A price drawn on one chart is carried to another chart at the same
//! relative height inside the visible range, unless both charts show the same
//! symbol or the session asks for absolute values.

use crate::config::YAxisType;
use serde::{Deserialize, Serialize};

/// A session's vertical axis at the moment of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub top: f64,
    pub bottom: f64,
    pub symbol: String,
}

impl VisibleRange {
    pub fn new(bottom: f64, top: f64, symbol: impl Into<String>) -> Self {
        Self {
            top,
            bottom,
            symbol: symbol.into(),
        }
    }

    /// Height of the range, `top - bottom`.
    pub fn span(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Whether a value must be copied unchanged between the two ranges.
fn is_identity(source: &VisibleRange, dest: &VisibleRange, axis: YAxisType) -> bool {
    let span = source.span();
    axis == YAxisType::Absolute
        || source.symbol == dest.symbol
        || span == 0.0
        || !span.is_finite()
}

/// Map an absolute price from `source` into `dest`.
pub fn map_absolute(
    value: f64,
    source: &VisibleRange,
    dest: &VisibleRange,
    axis: YAxisType,
) -> f64 {
    if is_identity(source, dest, axis) {
        return value;
    }
    let percent = (value - source.bottom) / source.span();
    dest.bottom + percent * dest.span()
}

/// Map a height or offset from `source` into `dest`. The range baseline is
/// not applied.
pub fn map_delta(
    value: f64,
    source: &VisibleRange,
    dest: &VisibleRange,
    axis: YAxisType,
) -> f64 {
    if is_identity(source, dest, axis) {
        return value;
    }
    let percent = value / source.span();
    percent * dest.span()
}

/// A source/destination pair bound to an axis mode, applied to every
/// vertical field of a drawing.
#[derive(Debug, Clone, Copy)]
pub struct VerticalMap<'a> {
    axis: YAxisType,
    source: &'a VisibleRange,
    dest: &'a VisibleRange,
}

impl<'a> VerticalMap<'a> {
    pub fn new(axis: YAxisType, source: &'a VisibleRange, dest: &'a VisibleRange) -> Self {
        Self { axis, source, dest }
    }

    pub fn absolute(&self, value: f64) -> f64 {
        map_absolute(value, self.source, self.dest, self.axis)
    }

    pub fn delta(&self, value: f64) -> f64 {
        map_delta(value, self.source, self.dest, self.axis)
    }

    /// Whether this map leaves every value unchanged.
    pub fn is_identity(&self) -> bool {
        is_identity(self.source, self.dest, self.axis)
    }
}
