//! Identity-preserving deep copies.
//!
//! A [`CloneContext`] maps the object id of every shared entity cloned so far
//! to its copy. When the same original is reached a second time during one
//! copy operation, the existing copy is handed out again, so objects that
//! shared a template before the copy share the cloned template afterwards.
//!
//! Only shareable entities (gate templates and their ports) are registered.
//! Gates and gate ports have a single owner and are reached exactly once.

use std::collections::HashMap;

use crate::object::{ObjectId, INVALID_OBJECT_ID};
use crate::template::{TemplatePortRef, TemplateRef};

/// Entity-level copy operations.
pub trait DeepCopy: Sized {
    /// Copy the scalar attributes only. The result is detached from any
    /// template, port or other related object.
    fn shallow_clone(&self) -> Self;

    /// Copy the object together with everything it owns or shares, reusing
    /// copies already recorded in `ctx`.
    fn deep_clone(&self, ctx: &mut CloneContext) -> Self;
}

/// A copy recorded in a [`CloneContext`].
#[derive(Debug, Clone)]
pub enum ClonedObject {
    Template(TemplateRef),
    TemplatePort(TemplatePortRef),
}

impl ClonedObject {
    pub fn kind(&self) -> CloneKind {
        match self {
            ClonedObject::Template(_) => CloneKind::Template,
            ClonedObject::TemplatePort(_) => CloneKind::TemplatePort,
        }
    }
}

/// Entity kind of a registered copy. Ids are only unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloneKind {
    Template,
    TemplatePort,
}

/// Old-id to new-object map for one deep copy operation.
///
/// The context must not be shared between concurrent copy operations.
#[derive(Debug, Default)]
pub struct CloneContext {
    cloned: HashMap<(CloneKind, ObjectId), ClonedObject>,
}

impl CloneContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cloned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloned.is_empty()
    }

    /// The copy of the template with id `original_id`, if one was made.
    pub fn template(&self, original_id: ObjectId) -> Option<TemplateRef> {
        match self.cloned.get(&(CloneKind::Template, original_id)) {
            Some(ClonedObject::Template(t)) => Some(t.clone()),
            _ => None,
        }
    }

    /// The copy of the template port with id `original_id`, if one was made.
    pub fn template_port(&self, original_id: ObjectId) -> Option<TemplatePortRef> {
        match self.cloned.get(&(CloneKind::TemplatePort, original_id)) {
            Some(ClonedObject::TemplatePort(p)) => Some(p.clone()),
            _ => None,
        }
    }

    /// Record `copy` as the clone of the object with id `original_id`.
    /// Objects without a valid id cannot be shared and are not recorded.
    pub(crate) fn register(&mut self, original_id: ObjectId, copy: ClonedObject) {
        if original_id == INVALID_OBJECT_ID {
            return;
        }
        let kind = copy.kind();
        log::trace!("clone context: registered copy of {:?} {}", kind, original_id);
        self.cloned.insert((kind, original_id), copy);
    }
}
