//! Gate templates: the reusable definition of a gate kind.
//!
//! A [`GateTemplate`] is shared by every gate placed from it through a
//! [`TemplateRef`] handle. Gates link to a template with a [`TemplateLink`],
//! and the template's reference count is the number of live links, so it
//! can never drift from the actual linkage.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::clone::{CloneContext, ClonedObject, DeepCopy};
use crate::color::Color;
use crate::error::{ModelError, ModelResult};
use crate::geometry::Point;
use crate::object::{tabs, Identifiable, ObjectId, ObjectInfo};

/// A named connection point in template-local coordinates.
///
/// Template ports are immutable once shared. Moving a port means replacing
/// it in its template; gate ports placed earlier keep their position.
#[derive(Debug, Clone, PartialEq)]
pub struct GateTemplatePort {
    info: ObjectInfo,
    point: Point,
}

pub type TemplatePortRef = Rc<GateTemplatePort>;

impl GateTemplatePort {
    pub fn new(id: ObjectId, x: f64, y: f64) -> Self {
        Self {
            info: ObjectInfo::new(id),
            point: Point::new(x, y),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.set_name(name);
        self
    }

    pub fn x(&self) -> f64 {
        self.point.x
    }

    pub fn y(&self) -> f64 {
        self.point.y
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn into_ref(self) -> TemplatePortRef {
        Rc::new(self)
    }

    pub fn print(&self, out: &mut impl fmt::Write, n_tabs: usize) -> fmt::Result {
        let t = tabs(n_tabs);
        writeln!(out, "{t}Template port name : {}", self.name())?;
        writeln!(out, "{t}Object ID          : {}", self.object_id())?;
        writeln!(out, "{t}Position           : {}, {}", self.point.x, self.point.y)
    }
}

impl Identifiable for GateTemplatePort {
    fn object_info(&self) -> &ObjectInfo {
        &self.info
    }

    fn object_info_mut(&mut self) -> &mut ObjectInfo {
        &mut self.info
    }
}

impl DeepCopy for TemplatePortRef {
    fn shallow_clone(&self) -> Self {
        Rc::new(GateTemplatePort::clone(self))
    }

    fn deep_clone(&self, ctx: &mut CloneContext) -> Self {
        if let Some(existing) = ctx.template_port(self.object_id()) {
            return existing;
        }
        let copy = self.shallow_clone();
        ctx.register(self.object_id(), ClonedObject::TemplatePort(copy.clone()));
        copy
    }
}

/// Shape, colors and port layout of a gate kind.
#[derive(Debug)]
pub struct GateTemplate {
    info: ObjectInfo,
    width: u32,
    height: u32,
    fill_color: Color,
    frame_color: Color,
    ports: BTreeMap<ObjectId, TemplatePortRef>,
}

impl GateTemplate {
    pub fn new(id: ObjectId, width: u32, height: u32) -> Self {
        Self {
            info: ObjectInfo::new(id),
            width,
            height,
            fill_color: Color::UNSET,
            frame_color: Color::UNSET,
            ports: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.set_name(name);
        self
    }

    pub fn with_colors(mut self, fill: Color, frame: Color) -> Self {
        self.fill_color = fill;
        self.frame_color = frame;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resizing does not touch gates already placed from this template.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn fill_color(&self) -> Color {
        self.fill_color
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
    }

    pub fn frame_color(&self) -> Color {
        self.frame_color
    }

    pub fn set_frame_color(&mut self, color: Color) {
        self.frame_color = color;
    }

    /// Add a port definition. A port with the same object id is replaced.
    pub fn add_template_port(&mut self, port: TemplatePortRef) -> ModelResult<()> {
        if !port.has_valid_object_id() {
            return Err(ModelError::InvalidReference {
                kind: "template port",
            });
        }
        self.ports.insert(port.object_id(), port);
        Ok(())
    }

    pub fn remove_template_port(&mut self, id: ObjectId) -> ModelResult<TemplatePortRef> {
        self.ports
            .remove(&id)
            .ok_or_else(|| ModelError::lookup(format!("template port {id}"), "gate template"))
    }

    pub fn template_port(&self, id: ObjectId) -> ModelResult<TemplatePortRef> {
        self.ports
            .get(&id)
            .cloned()
            .ok_or_else(|| ModelError::lookup(format!("template port {id}"), "gate template"))
    }

    pub fn has_template_port(&self, id: ObjectId) -> bool {
        self.ports.contains_key(&id)
    }

    pub fn ports(&self) -> impl Iterator<Item = &TemplatePortRef> {
        self.ports.values()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn into_ref(self) -> TemplateRef {
        TemplateRef::new(self)
    }

    pub fn print(&self, out: &mut impl fmt::Write, n_tabs: usize) -> fmt::Result {
        let t = tabs(n_tabs);
        writeln!(out, "{t}Gate template name        : {}", self.name())?;
        writeln!(out, "{t}Gate template description : {}", self.description())?;
        writeln!(out, "{t}Object ID                 : {}", self.object_id())?;
        writeln!(out, "{t}Size                      : {} x {}", self.width, self.height)?;
        writeln!(out)?;
        for port in self.ports.values() {
            port.print(out, n_tabs + 1)?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Scalar attributes only; the copy has no ports.
    fn copy_scalars(&self) -> Self {
        Self {
            info: self.info.clone(),
            width: self.width,
            height: self.height,
            fill_color: self.fill_color,
            frame_color: self.frame_color,
            ports: BTreeMap::new(),
        }
    }
}

impl Identifiable for GateTemplate {
    fn object_info(&self) -> &ObjectInfo {
        &self.info
    }

    fn object_info_mut(&mut self) -> &mut ObjectInfo {
        &mut self.info
    }
}

#[derive(Debug)]
struct TemplateNode {
    template: RefCell<GateTemplate>,
    gate_links: Cell<usize>,
}

/// Shared handle to a gate template.
///
/// Cloning the handle shares the template; it does not count as a gate
/// reference. Use [`DeepCopy`] to copy the template itself.
#[derive(Clone)]
pub struct TemplateRef(Rc<TemplateNode>);

impl TemplateRef {
    pub fn new(template: GateTemplate) -> Self {
        Self(Rc::new(TemplateNode {
            template: RefCell::new(template),
            gate_links: Cell::new(0),
        }))
    }

    /// # Panics
    /// If the template is currently borrowed mutably.
    pub fn borrow(&self) -> Ref<'_, GateTemplate> {
        self.0.template.borrow()
    }

    /// Like [`TemplateRef::borrow`], but reports a conflicting mutable
    /// borrow as an error.
    pub fn try_borrow(&self) -> ModelResult<Ref<'_, GateTemplate>> {
        self.0.template.try_borrow().map_err(|_| {
            ModelError::Runtime("gate template is currently borrowed mutably".to_string())
        })
    }

    /// # Panics
    /// If the template is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, GateTemplate> {
        self.0.template.borrow_mut()
    }

    pub fn object_id(&self) -> ObjectId {
        self.borrow().object_id()
    }

    pub fn name(&self) -> String {
        self.borrow().name().to_string()
    }

    /// Number of gates currently linked to this template.
    pub fn reference_count(&self) -> usize {
        self.0.gate_links.get()
    }

    pub fn is_referenced(&self) -> bool {
        self.reference_count() > 0
    }

    /// True if both handles point at the same template instance.
    pub fn ptr_eq(&self, other: &TemplateRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn increment_reference_counter(&self) -> usize {
        let count = self.0.gate_links.get() + 1;
        self.0.gate_links.set(count);
        count
    }

    fn decrement_reference_counter(&self) -> usize {
        let current = self.0.gate_links.get();
        debug_assert!(current > 0, "template reference count underflow");
        let count = current.saturating_sub(1);
        self.0.gate_links.set(count);
        count
    }
}

impl fmt::Debug for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("object_id", &self.object_id())
            .field("reference_count", &self.reference_count())
            .finish()
    }
}

impl DeepCopy for TemplateRef {
    /// A fresh, unreferenced template with the same scalar attributes and
    /// no ports.
    fn shallow_clone(&self) -> Self {
        TemplateRef::new(self.borrow().copy_scalars())
    }

    fn deep_clone(&self, ctx: &mut CloneContext) -> Self {
        let id = self.object_id();
        if let Some(existing) = ctx.template(id) {
            log::trace!("clone context: reusing copy of template {}", id);
            return existing;
        }

        let copy = self.shallow_clone();
        ctx.register(id, ClonedObject::Template(copy.clone()));

        let original = self.borrow();
        let mut target = copy.borrow_mut();
        for port in original.ports.values() {
            let port_copy = port.deep_clone(ctx);
            target.ports.insert(port_copy.object_id(), port_copy);
        }
        drop(target);
        copy
    }
}

/// A gate's counted reference to its template.
///
/// Creating a link increments the template's reference count; dropping it
/// decrements the count.
#[derive(Debug)]
pub(crate) struct TemplateLink {
    template: TemplateRef,
}

impl TemplateLink {
    pub(crate) fn acquire(template: &TemplateRef) -> Self {
        let count = template.increment_reference_counter();
        log::debug!(
            "linked gate to template {} (reference count {})",
            template.object_id(),
            count
        );
        Self {
            template: template.clone(),
        }
    }

    pub(crate) fn template(&self) -> &TemplateRef {
        &self.template
    }
}

impl Drop for TemplateLink {
    fn drop(&mut self) {
        let count = self.template.decrement_reference_counter();
        // try_borrow: a drop during a panic must not panic again.
        if let Ok(t) = self.template.0.template.try_borrow() {
            log::debug!(
                "unlinked gate from template {} (reference count {})",
                t.object_id(),
                count
            );
        }
    }
}
