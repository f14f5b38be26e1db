//! Identity shared by every logic model entity.
//!
//! Entities compose an [`ObjectInfo`] instead of inheriting from a common
//! base, and expose it through the [`Identifiable`] capability.

use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// Object identifier assigned by the owning collection. `0` is not a valid id.
pub type ObjectId = u64;

pub const INVALID_OBJECT_ID: ObjectId = 0;

/// Id, name and description of a logic model object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub name: String,
    pub description: String,
}

impl ObjectInfo {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Capability: the object has an id, a name and a description.
pub trait Identifiable {
    fn object_info(&self) -> &ObjectInfo;
    fn object_info_mut(&mut self) -> &mut ObjectInfo;

    fn object_id(&self) -> ObjectId {
        self.object_info().id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.object_info_mut().id = id;
    }

    fn has_valid_object_id(&self) -> bool {
        self.object_id() != INVALID_OBJECT_ID
    }

    fn name(&self) -> &str {
        &self.object_info().name
    }

    fn set_name(&mut self, name: &str) {
        self.object_info_mut().name = name.to_string();
    }

    fn has_name(&self) -> bool {
        !self.object_info().name.is_empty()
    }

    fn description(&self) -> &str {
        &self.object_info().description
    }

    fn set_description(&mut self, description: &str) {
        self.object_info_mut().description = description.to_string();
    }
}

/// Capability: the object occupies an axis-aligned region of the die image.
pub trait HasBoundingBox {
    fn bounding_box(&self) -> BoundingBox;
}

/// Indentation prefix for the textual debug dumps.
pub(crate) fn tabs(n: usize) -> String {
    "\t".repeat(n)
}
