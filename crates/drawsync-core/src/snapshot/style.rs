//! Style attributes shared by drawing kinds.

use serde::{Deserialize, Serialize};

/// RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Dash pattern of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dots,
    DotsRare,
    DotsVeryRare,
    Lines,
    LinesDots,
}

/// Color, thickness and dash pattern of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStroke {
    pub color: Color,
    pub thickness: u32,
    pub line_style: LineStyle,
}

impl Default for LineStroke {
    fn default() -> Self {
        Self {
            color: Color::default(),
            thickness: 1,
            line_style: LineStyle::default(),
        }
    }
}

/// Style of the shape category (trend lines, channels, pitchforks,
/// rectangles, triangles, ellipses).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub stroke: LineStroke,
    /// Fill the interior. Ignored by open shapes.
    pub is_filled: bool,
}

impl ShapeStyle {
    pub fn new(color: Color, thickness: u32, line_style: LineStyle) -> Self {
        Self {
            stroke: LineStroke {
                color,
                thickness,
                line_style,
            },
            is_filled: false,
        }
    }

    pub fn filled(mut self, is_filled: bool) -> Self {
        self.is_filled = is_filled;
        self
    }
}

/// One level of a Fibonacci tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevel {
    /// Level position in percent (61.8 for the golden ratio level).
    pub percent: f64,
    pub is_visible: bool,
}

impl FibonacciLevel {
    pub fn new(percent: f64, is_visible: bool) -> Self {
        Self { percent, is_visible }
    }
}

/// Standard retracement levels.
pub fn default_fibonacci_levels() -> Vec<FibonacciLevel> {
    [0.0, 23.6, 38.2, 50.0, 61.8, 76.4, 100.0]
        .into_iter()
        .map(|percent| FibonacciLevel::new(percent, true))
        .collect()
}

/// Style of the Fibonacci tool category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciStyle {
    pub levels: Vec<FibonacciLevel>,
    pub display_prices: bool,
    pub stroke: LineStroke,
}

impl Default for FibonacciStyle {
    fn default() -> Self {
        Self {
            levels: default_fibonacci_levels(),
            display_prices: true,
            stroke: LineStroke::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HorizontalAlignment {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VerticalAlignment {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Icon glyphs a chart can place at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IconType {
    #[default]
    UpArrow,
    DownArrow,
    Circle,
    Square,
    Diamond,
    Star,
    UpTriangle,
    DownTriangle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_levels_are_ordered() {
        let levels = default_fibonacci_levels();
        assert_eq!(levels.first().map(|l| l.percent), Some(0.0));
        assert_eq!(levels.last().map(|l| l.percent), Some(100.0));
        assert!(levels.windows(2).all(|w| w[0].percent < w[1].percent));
    }
}
