//! Closed shapes: rectangles, triangles and ellipses.

use super::{Anchor, ShapeStyle};
use crate::normalize::VerticalMap;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle between two opposite corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub corner1: Anchor,
    pub corner2: Anchor,
    pub style: ShapeStyle,
}

impl Rectangle {
    pub fn new(corner1: Anchor, corner2: Anchor) -> Self {
        Self {
            corner1,
            corner2,
            style: ShapeStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.corner1.remap(map);
        self.corner2.remap(map);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [Anchor; 3],
    pub style: ShapeStyle,
}

impl Triangle {
    pub fn new(vertices: [Anchor; 3]) -> Self {
        Self {
            vertices,
            style: ShapeStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        for vertex in &mut self.vertices {
            vertex.remap(map);
        }
    }
}

/// Ellipse inscribed in the box spanned by two corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub corner1: Anchor,
    pub corner2: Anchor,
    pub style: ShapeStyle,
}

impl Ellipse {
    pub fn new(corner1: Anchor, corner2: Anchor) -> Self {
        Self {
            corner1,
            corner2,
            style: ShapeStyle::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.corner1.remap(map);
        self.corner2.remap(map);
    }
}
