//! In-memory chart host.

use super::{ChangeKind, Chart, ChartIdentity, ChartListener, ChartObject, PropertyUpdate};
use crate::error::{HostError, HostResult};
use crate::normalize::VisibleRange;
use crate::snapshot::{Drawing, ObjectProperties};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// An object stored by [`MemoryChart`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryObject {
    id: u64,
    name: String,
    properties: ObjectProperties,
    /// `None` stands for a host kind outside the modelled set.
    drawing: Option<Drawing>,
}

impl ChartObject for MemoryObject {
    fn host_id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> ObjectProperties {
        self.properties.clone()
    }

    fn drawing(&self) -> Option<Drawing> {
        self.drawing.clone()
    }
}

/// In-memory chart for testing, simulation and ephemeral use.
///
/// Mutations notify subscribed listeners synchronously, before returning.
pub struct MemoryChart {
    identity: ChartIdentity,
    top: f64,
    bottom: f64,
    server_time: DateTime<Utc>,
    /// Objects in creation order.
    objects: Vec<MemoryObject>,
    next_id: u64,
    listeners: Vec<Arc<dyn ChartListener>>,
}

impl MemoryChart {
    /// Create an empty chart showing `bottom..top`.
    pub fn new(identity: ChartIdentity, bottom: f64, top: f64) -> Self {
        Self {
            identity,
            top,
            bottom,
            server_time: Utc::now(),
            objects: Vec::new(),
            next_id: 1,
            listeners: Vec::new(),
        }
    }

    pub fn with_server_time(mut self, server_time: DateTime<Utc>) -> Self {
        self.server_time = server_time;
        self
    }

    /// Scroll or zoom the vertical axis.
    pub fn set_visible_range(&mut self, bottom: f64, top: f64) {
        self.bottom = bottom;
        self.top = top;
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.iter().map(|o| o.name.clone()).collect()
    }

    pub fn object(&self, name: &str) -> Option<&MemoryObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Drawing of the object called `name`.
    pub fn drawing_of(&self, name: &str) -> Option<&Drawing> {
        self.object(name).and_then(|o| o.drawing.as_ref())
    }

    pub fn properties_of(&self, name: &str) -> Option<&ObjectProperties> {
        self.object(name).map(|o| &o.properties)
    }

    /// Draw an object the way a user does, with explicit properties.
    /// Returns the host id.
    pub fn draw_with(
        &mut self,
        name: &str,
        drawing: Drawing,
        properties: ObjectProperties,
    ) -> HostResult<u64> {
        self.insert(name, Some(drawing), properties)
    }

    /// Draw an object without a name. Returns the host id.
    pub fn draw_unnamed(&mut self, drawing: Drawing) -> u64 {
        let id = self.allocate_id();
        self.push_and_notify(MemoryObject {
            id,
            name: String::new(),
            properties: ObjectProperties::default(),
            drawing: Some(drawing),
        });
        id
    }

    /// Add an object of a kind the engine does not model.
    pub fn draw_unsupported(&mut self, name: &str) -> HostResult<u64> {
        self.insert(name, None, ObjectProperties::default())
    }

    /// Add several objects reported in a single `Added` notification, the
    /// way a paste or a template load does. `None` stands for a kind the
    /// engine does not model. Returns the host ids.
    pub fn draw_group(&mut self, objects: Vec<(&str, Option<Drawing>)>) -> HostResult<Vec<u64>> {
        for (index, (name, _)) in objects.iter().enumerate() {
            let repeated = objects[..index].iter().any(|(other, _)| other == name);
            if !name.trim().is_empty() && (repeated || self.object(name).is_some()) {
                return Err(HostError::DuplicateName(name.to_string()));
            }
        }

        let first = self.objects.len();
        let mut ids = Vec::with_capacity(objects.len());
        for (name, drawing) in objects {
            let id = self.allocate_id();
            ids.push(id);
            self.objects.push(MemoryObject {
                id,
                name: name.to_string(),
                properties: ObjectProperties::default(),
                drawing,
            });
        }

        let added: Vec<&dyn ChartObject> = self.objects[first..]
            .iter()
            .map(|o| o as &dyn ChartObject)
            .collect();
        self.notify(ChangeKind::Added, &added);
        Ok(ids)
    }

    /// Replace the drawing of the object with host id `id`.
    pub fn set_drawing_by_id(&mut self, id: u64, drawing: Drawing) -> HostResult<()> {
        let index = self
            .objects
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| HostError::NotFound(format!("#{id}")))?;
        self.replace_drawing(index, drawing)
    }

    /// Remove the object with host id `id`.
    pub fn remove_by_id(&mut self, id: u64) -> bool {
        match self.objects.iter().position(|o| o.id == id) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn index_of(&self, name: &str) -> HostResult<usize> {
        self.objects
            .iter()
            .position(|o| o.name == name)
            .ok_or_else(|| HostError::NotFound(name.to_string()))
    }

    fn insert(
        &mut self,
        name: &str,
        drawing: Option<Drawing>,
        properties: ObjectProperties,
    ) -> HostResult<u64> {
        if !name.trim().is_empty() && self.object(name).is_some() {
            return Err(HostError::DuplicateName(name.to_string()));
        }
        let id = self.allocate_id();
        self.push_and_notify(MemoryObject {
            id,
            name: name.to_string(),
            properties,
            drawing,
        });
        Ok(id)
    }

    fn push_and_notify(&mut self, object: MemoryObject) {
        log::trace!("{}: add {:?}", self.identity.symbol, object.name);
        self.objects.push(object);
        if let Some(object) = self.objects.last() {
            let object: &dyn ChartObject = object;
            self.notify(ChangeKind::Added, &[object]);
        }
    }

    fn replace_drawing(&mut self, index: usize, drawing: Drawing) -> HostResult<()> {
        let object = &mut self.objects[index];
        match &object.drawing {
            Some(current) if current.kind() == drawing.kind() => {}
            Some(current) => {
                return Err(HostError::KindMismatch {
                    name: object.name.clone(),
                    expected: drawing.kind(),
                    found: current.kind(),
                });
            }
            None => return Err(HostError::Unsupported(object.name.clone())),
        }
        object.drawing = Some(drawing);
        let object: &dyn ChartObject = &self.objects[index];
        self.notify(ChangeKind::Updated, &[object]);
        Ok(())
    }

    fn remove_at(&mut self, index: usize) {
        let removed = self.objects.remove(index);
        log::trace!("{}: remove {:?}", self.identity.symbol, removed.name);
        let object: &dyn ChartObject = &removed;
        self.notify(ChangeKind::Removed, &[object]);
    }

    fn notify(&self, change: ChangeKind, objects: &[&dyn ChartObject]) {
        for listener in &self.listeners {
            listener.on_objects_changed(self, change, objects);
        }
    }
}

impl Chart for MemoryChart {
    fn identity(&self) -> &ChartIdentity {
        &self.identity
    }

    fn visible_range(&self) -> VisibleRange {
        VisibleRange::new(self.bottom, self.top, self.identity.symbol.clone())
    }

    fn server_time(&self) -> DateTime<Utc> {
        self.server_time
    }

    fn objects(&self) -> Vec<&dyn ChartObject> {
        self.objects.iter().map(|o| o as &dyn ChartObject).collect()
    }

    fn draw(&mut self, name: &str, drawing: &Drawing) -> HostResult<()> {
        self.insert(name, Some(drawing.clone()), ObjectProperties::default())
            .map(|_| ())
    }

    fn set_drawing(&mut self, name: &str, drawing: &Drawing) -> HostResult<()> {
        let index = self.index_of(name)?;
        self.replace_drawing(index, drawing.clone())
    }

    fn set_properties(&mut self, name: &str, update: &PropertyUpdate) -> HostResult<()> {
        let index = self.index_of(name)?;
        let properties = &mut self.objects[index].properties;
        properties.comment = update.comment.clone();
        properties.is_hidden = update.is_hidden;
        properties.is_locked = update.is_locked;
        properties.z_index = update.z_index;
        if let Some(is_interactive) = update.is_interactive {
            properties.is_interactive = is_interactive;
        }
        let object: &dyn ChartObject = &self.objects[index];
        self.notify(ChangeKind::Updated, &[object]);
        Ok(())
    }

    fn remove_object(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Ok(index) => {
                self.remove_at(index);
                true
            }
            Err(_) => false,
        }
    }

    fn subscribe(&mut self, listener: Arc<dyn ChartListener>) {
        self.listeners.push(listener);
    }
}
