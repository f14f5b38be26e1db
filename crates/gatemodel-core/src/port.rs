use std::fmt;
use std::rc::Rc;

use crate::clone::{CloneContext, DeepCopy};
use crate::geometry::Point;
use crate::object::{tabs, Identifiable, ObjectId, ObjectInfo};
use crate::template::TemplatePortRef;

/// A placed instance of a template port on one gate.
///
/// The absolute position is assigned by the owning gate when the port is
/// added; a port never positions itself.
#[derive(Debug, Clone)]
pub struct GatePort {
    info: ObjectInfo,
    position: Point,
    template_port: Option<TemplatePortRef>,
}

impl GatePort {
    pub fn new(id: ObjectId, template_port: TemplatePortRef) -> Self {
        Self {
            info: ObjectInfo::new(id),
            position: Point::default(),
            template_port: Some(template_port),
        }
    }

    /// A port not yet bound to a template port. It cannot be added to a gate
    /// until [`GatePort::set_template_port`] is called.
    pub fn unbound(id: ObjectId) -> Self {
        Self {
            info: ObjectInfo::new(id),
            position: Point::default(),
            template_port: None,
        }
    }

    pub fn template_port(&self) -> Option<&TemplatePortRef> {
        self.template_port.as_ref()
    }

    pub fn set_template_port(&mut self, template_port: TemplatePortRef) {
        self.template_port = Some(template_port);
    }

    pub fn has_template_port(&self) -> bool {
        self.template_port.is_some()
    }

    /// True if this port instantiates exactly `template_port` (same object,
    /// not just the same id).
    pub fn is_instance_of(&self, template_port: &TemplatePortRef) -> bool {
        self.template_port
            .as_ref()
            .is_some_and(|tp| Rc::ptr_eq(tp, template_port))
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn print(&self, out: &mut impl fmt::Write, n_tabs: usize) -> fmt::Result {
        let t = tabs(n_tabs);
        writeln!(out, "{t}Gate port name : {}", self.name())?;
        writeln!(out, "{t}Object ID      : {}", self.object_id())?;
        writeln!(out, "{t}Position       : {}, {}", self.position.x, self.position.y)?;
        match &self.template_port {
            Some(tp) => writeln!(
                out,
                "{t}Template port  : {} ({})",
                tp.name(),
                tp.object_id()
            ),
            None => writeln!(out, "{t}Template port  : none"),
        }
    }
}

impl Identifiable for GatePort {
    fn object_info(&self) -> &ObjectInfo {
        &self.info
    }

    fn object_info_mut(&mut self) -> &mut ObjectInfo {
        &mut self.info
    }
}

impl DeepCopy for GatePort {
    fn shallow_clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            position: self.position,
            template_port: None,
        }
    }

    fn deep_clone(&self, ctx: &mut CloneContext) -> Self {
        let mut copy = self.shallow_clone();
        copy.template_port = self.template_port.as_ref().map(|tp| tp.deep_clone(ctx));
        copy
    }
}
