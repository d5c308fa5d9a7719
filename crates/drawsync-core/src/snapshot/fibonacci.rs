//! Fibonacci retracements, fans and expansions.

use super::{Anchor, FibonacciStyle};
use crate::normalize::VerticalMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciRetracement {
    pub start: Anchor,
    pub end: Anchor,
    pub fibonacci: FibonacciStyle,
}

impl FibonacciRetracement {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self {
            start,
            end,
            fibonacci: FibonacciStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.start.remap(map);
        self.end.remap(map);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciFan {
    pub start: Anchor,
    pub end: Anchor,
    pub fibonacci: FibonacciStyle,
}

impl FibonacciFan {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self {
            start,
            end,
            fibonacci: FibonacciStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.start.remap(map);
        self.end.remap(map);
    }
}

/// Projection of a move (first two anchors) from a third anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciExpansion {
    pub anchors: [Anchor; 3],
    pub fibonacci: FibonacciStyle,
}

impl FibonacciExpansion {
    pub fn new(anchors: [Anchor; 3]) -> Self {
        Self {
            anchors,
            fibonacci: FibonacciStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        for anchor in &mut self.anchors {
            anchor.remap(map);
        }
    }
}
