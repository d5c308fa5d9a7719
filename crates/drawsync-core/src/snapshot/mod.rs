//! Plain-data copies of chart drawings.
//!
//! Live host objects never leave their session. Before anything crosses a
//! session boundary it is captured into a [`Snapshot`]: the object's name,
//! its shared [`ObjectProperties`] and a kind-tagged [`Drawing`].

mod areas;
mod channels;
mod fibonacci;
mod icon;
mod lines;
mod style;
mod text;

pub use areas::{Ellipse, Rectangle, Triangle};
pub use channels::{AndrewsPitchfork, EquidistantChannel};
pub use fibonacci::{FibonacciExpansion, FibonacciFan, FibonacciRetracement};
pub use icon::Icon;
pub use lines::{HorizontalLine, TrendLine, VerticalLine};
pub use style::{
    Color, FibonacciLevel, FibonacciStyle, HorizontalAlignment, IconType, LineStroke, LineStyle,
    ShapeStyle, VerticalAlignment, default_fibonacci_levels,
};
pub use text::{DEFAULT_FONT_SIZE, StaticText, Text};

use crate::error::{SyncError, SyncResult};
use crate::host::ChartObject;
use crate::normalize::VerticalMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the chart: bar time and vertical value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub time: DateTime<Utc>,
    pub y: f64,
}

impl Anchor {
    pub fn new(time: DateTime<Utc>, y: f64) -> Self {
        Self { time, y }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.y = map.absolute(self.y);
    }
}

/// Properties every chart object has regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    #[serde(default)]
    pub comment: String,
    pub is_interactive: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub z_index: i32,
}

impl Default for ObjectProperties {
    fn default() -> Self {
        Self {
            comment: String::new(),
            is_interactive: true,
            is_hidden: false,
            is_locked: false,
            z_index: 0,
        }
    }
}

/// Discriminant of [`Drawing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    TrendLine,
    HorizontalLine,
    VerticalLine,
    EquidistantChannel,
    AndrewsPitchfork,
    Rectangle,
    Triangle,
    Ellipse,
    FibonacciRetracement,
    FibonacciFan,
    FibonacciExpansion,
    Text,
    StaticText,
    Icon,
}

impl ObjectKind {
    /// Whether the kind belongs to the shape category.
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            ObjectKind::TrendLine
                | ObjectKind::EquidistantChannel
                | ObjectKind::AndrewsPitchfork
                | ObjectKind::Rectangle
                | ObjectKind::Triangle
                | ObjectKind::Ellipse
        )
    }

    /// Whether the kind belongs to the Fibonacci tool category.
    pub fn is_fibonacci(&self) -> bool {
        matches!(
            self,
            ObjectKind::FibonacciRetracement
                | ObjectKind::FibonacciFan
                | ObjectKind::FibonacciExpansion
        )
    }
}

/// Kind-specific geometry and style of a drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Drawing {
    TrendLine(TrendLine),
    HorizontalLine(HorizontalLine),
    VerticalLine(VerticalLine),
    EquidistantChannel(EquidistantChannel),
    AndrewsPitchfork(AndrewsPitchfork),
    Rectangle(Rectangle),
    Triangle(Triangle),
    Ellipse(Ellipse),
    FibonacciRetracement(FibonacciRetracement),
    FibonacciFan(FibonacciFan),
    FibonacciExpansion(FibonacciExpansion),
    Text(Text),
    StaticText(StaticText),
    Icon(Icon),
}

impl Drawing {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Drawing::TrendLine(_) => ObjectKind::TrendLine,
            Drawing::HorizontalLine(_) => ObjectKind::HorizontalLine,
            Drawing::VerticalLine(_) => ObjectKind::VerticalLine,
            Drawing::EquidistantChannel(_) => ObjectKind::EquidistantChannel,
            Drawing::AndrewsPitchfork(_) => ObjectKind::AndrewsPitchfork,
            Drawing::Rectangle(_) => ObjectKind::Rectangle,
            Drawing::Triangle(_) => ObjectKind::Triangle,
            Drawing::Ellipse(_) => ObjectKind::Ellipse,
            Drawing::FibonacciRetracement(_) => ObjectKind::FibonacciRetracement,
            Drawing::FibonacciFan(_) => ObjectKind::FibonacciFan,
            Drawing::FibonacciExpansion(_) => ObjectKind::FibonacciExpansion,
            Drawing::Text(_) => ObjectKind::Text,
            Drawing::StaticText(_) => ObjectKind::StaticText,
            Drawing::Icon(_) => ObjectKind::Icon,
        }
    }

    /// Copy of this drawing with every vertical value passed through `map`.
    /// Channel heights use the delta mapping, everything else the absolute one.
    pub fn remapped(&self, map: &VerticalMap<'_>) -> Drawing {
        let mut drawing = self.clone();
        if map.is_identity() {
            return drawing;
        }
        match &mut drawing {
            Drawing::TrendLine(d) => d.remap(map),
            Drawing::HorizontalLine(d) => d.remap(map),
            Drawing::EquidistantChannel(d) => d.remap(map),
            Drawing::AndrewsPitchfork(d) => d.remap(map),
            Drawing::Rectangle(d) => d.remap(map),
            Drawing::Triangle(d) => d.remap(map),
            Drawing::Ellipse(d) => d.remap(map),
            Drawing::FibonacciRetracement(d) => d.remap(map),
            Drawing::FibonacciFan(d) => d.remap(map),
            Drawing::FibonacciExpansion(d) => d.remap(map),
            Drawing::Text(d) => d.remap(map),
            Drawing::Icon(d) => d.remap(map),
            Drawing::VerticalLine(_) | Drawing::StaticText(_) => {}
        }
        drawing
    }
}

/// Immutable copy of one chart object, safe to send to another session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub properties: ObjectProperties,
    pub drawing: Drawing,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, drawing: Drawing) -> Self {
        Self {
            name: name.into(),
            properties: ObjectProperties::default(),
            drawing,
        }
    }

    /// Capture a live object under `name`.
    ///
    /// Fails with [`SyncError::UnsupportedKind`] if the host object is of a
    /// kind this crate does not model.
    pub fn capture(object: &dyn ChartObject, name: String) -> SyncResult<Self> {
        let drawing = object
            .drawing()
            .ok_or_else(|| SyncError::UnsupportedKind { name: name.clone() })?;
        Ok(Self {
            name,
            properties: object.properties(),
            drawing,
        })
    }

    pub fn kind(&self) -> ObjectKind {
        self.drawing.kind()
    }
}
