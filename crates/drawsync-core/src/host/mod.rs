//! Boundary with the charting host.
//!
//! The host owns the live drawing objects and renders them. The engine only
//! sees them through these traits: it reads objects to capture snapshots and
//! asks the chart to create, patch or delete objects by name.

mod memory;

pub use memory::{MemoryChart, MemoryObject};

use crate::error::HostResult;
use crate::normalize::VisibleRange;
use crate::snapshot::{Drawing, ObjectKind, ObjectProperties};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a chart shows: instrument, bar granularity and chart type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChartIdentity {
    pub symbol: String,
    pub time_frame: String,
    pub chart_type: String,
}

impl ChartIdentity {
    pub fn new(
        symbol: impl Into<String>,
        time_frame: impl Into<String>,
        chart_type: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            time_frame: time_frame.into(),
            chart_type: chart_type.into(),
        }
    }
}

/// Kind of change reported by a chart notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// Property changes applied to an existing object.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub comment: String,
    pub is_hidden: bool,
    pub is_locked: bool,
    pub z_index: i32,
    /// `None` leaves the host's interactivity untouched.
    pub is_interactive: Option<bool>,
}

impl PropertyUpdate {
    /// Build the update for an object of `kind`. Static text interactivity
    /// belongs to the host and is never set.
    pub fn for_kind(properties: &ObjectProperties, kind: ObjectKind) -> Self {
        Self {
            comment: properties.comment.clone(),
            is_hidden: properties.is_hidden,
            is_locked: properties.is_locked,
            z_index: properties.z_index,
            is_interactive: (kind != ObjectKind::StaticText).then_some(properties.is_interactive),
        }
    }
}

/// A live object owned by the host.
pub trait ChartObject {
    /// Host identity of the object, stable for its lifetime.
    fn host_id(&self) -> u64;

    /// The object's name. May be blank.
    fn name(&self) -> &str;

    fn properties(&self) -> ObjectProperties;

    /// Current drawing, or `None` if the object is of a kind this crate does
    /// not model.
    fn drawing(&self) -> Option<Drawing>;
}

/// Receives change notifications from a chart.
///
/// Notifications are delivered synchronously from inside the mutating call.
pub trait ChartListener: Send + Sync {
    fn on_objects_changed(
        &self,
        chart: &dyn Chart,
        change: ChangeKind,
        objects: &[&dyn ChartObject],
    );
}

/// A chart view owned by one session.
///
/// Implementations are used only from the session's own execution context.
pub trait Chart {
    fn identity(&self) -> &ChartIdentity;

    /// Current vertical bounds together with the chart's symbol.
    fn visible_range(&self) -> VisibleRange;

    fn server_time(&self) -> DateTime<Utc>;

    /// All objects currently on the chart.
    fn objects(&self) -> Vec<&dyn ChartObject>;

    /// Find an object by exact, case-sensitive name.
    fn find_object(&self, name: &str) -> Option<&dyn ChartObject> {
        self.objects().into_iter().find(|object| object.name() == name)
    }

    /// Create a new object. Notifies `Added`.
    fn draw(&mut self, name: &str, drawing: &Drawing) -> HostResult<()>;

    /// Replace the drawing of an existing object of the same kind. Notifies
    /// `Updated`.
    fn set_drawing(&mut self, name: &str, drawing: &Drawing) -> HostResult<()>;

    /// Notifies `Updated`.
    fn set_properties(&mut self, name: &str, update: &PropertyUpdate) -> HostResult<()>;

    /// Delete an object by name. Returns false if it did not exist. Notifies
    /// `Removed`.
    fn remove_object(&mut self, name: &str) -> bool;

    fn subscribe(&mut self, listener: Arc<dyn ChartListener>);
}
