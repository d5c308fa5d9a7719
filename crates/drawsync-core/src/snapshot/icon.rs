//! Icon shape.

use super::{Color, IconType};
use crate::normalize::VerticalMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    pub icon_type: IconType,
    pub time: DateTime<Utc>,
    pub y: f64,
    pub color: Color,
}

impl Icon {
    pub fn new(icon_type: IconType, time: DateTime<Utc>, y: f64) -> Self {
        Self {
            icon_type,
            time,
            y,
            color: Color::default(),
        }
    }

    pub(crate) fn remap(&mut self, map: &VerticalMap<'_>) {
        self.y = map.absolute(self.y);
    }
}
