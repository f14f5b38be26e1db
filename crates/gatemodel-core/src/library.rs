use std::collections::BTreeMap;

use crate::clone::{CloneContext, DeepCopy};
use crate::error::{ModelError, ModelResult, Precondition};
use crate::object::{Identifiable, ObjectId};
use crate::template::TemplateRef;

/// The set of gate templates known to a project.
///
/// The library's own hold on a template is not a gate reference: a template
/// whose reference count is zero is unused and may be removed.
#[derive(Debug, Default)]
pub struct GateLibrary {
    templates: BTreeMap<ObjectId, TemplateRef>,
}

impl GateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&mut self, template: TemplateRef) -> ModelResult<()> {
        let id = template.object_id();
        if !template.borrow().has_valid_object_id() {
            return Err(ModelError::InvalidReference {
                kind: "gate template",
            });
        }
        if self.templates.contains_key(&id) {
            return Err(Precondition::DuplicateObjectId(id).into());
        }
        log::debug!("added template {} ({}) to library", id, template.name());
        self.templates.insert(id, template);
        Ok(())
    }

    pub fn get_template(&self, id: ObjectId) -> ModelResult<TemplateRef> {
        self.templates
            .get(&id)
            .cloned()
            .ok_or_else(|| ModelError::lookup(format!("gate template {id}"), "gate library"))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.templates.contains_key(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<TemplateRef> {
        self.templates
            .values()
            .find(|t| t.borrow().name() == name)
            .cloned()
    }

    /// Remove a template that no gate references any more.
    pub fn remove_template(&mut self, id: ObjectId) -> ModelResult<TemplateRef> {
        let template = self.get_template(id)?;
        if template.is_referenced() {
            return Err(Precondition::TemplateInUse(id).into());
        }
        self.templates.remove(&id);
        Ok(template)
    }

    /// Drop every template with a zero reference count and return them.
    pub fn remove_unreferenced(&mut self) -> Vec<TemplateRef> {
        let unused: Vec<ObjectId> = self
            .templates
            .iter()
            .filter(|(_, t)| !t.is_referenced())
            .map(|(id, _)| *id)
            .collect();

        let removed: Vec<TemplateRef> = unused
            .iter()
            .filter_map(|id| self.templates.remove(id))
            .collect();
        if !removed.is_empty() {
            log::debug!("removed {} unreferenced templates", removed.len());
        }
        removed
    }

    pub fn templates(&self) -> impl Iterator<Item = &TemplateRef> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl DeepCopy for GateLibrary {
    /// An empty library.
    fn shallow_clone(&self) -> Self {
        Self::new()
    }

    fn deep_clone(&self, ctx: &mut CloneContext) -> Self {
        let templates = self
            .templates
            .iter()
            .map(|(id, t)| (*id, t.deep_clone(ctx)))
            .collect();
        Self { templates }
    }
}
