//! Placed gates.
//!
//! A [`Gate`] is an instance of a [`GateTemplate`](crate::template::GateTemplate)
//! placed at a bounding box with a mirroring [`Orientation`]. It owns its
//! [`GatePort`]s and holds a counted link to its template.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clone::{CloneContext, DeepCopy};
use crate::color::Color;
use crate::error::{ModelError, ModelResult, Precondition};
use crate::geometry::{BoundingBox, Point};
use crate::object::{tabs, HasBoundingBox, Identifiable, ObjectId, ObjectInfo, INVALID_OBJECT_ID};
use crate::port::GatePort;
use crate::template::{TemplateLink, TemplatePortRef, TemplateRef};

/// Reflection of a gate about its own bounding box. There is no rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Undefined,
    Normal,
    /// Mirrored vertically: template-local y is measured from the bottom edge.
    FlippedUpDown,
    /// Mirrored horizontally: template-local x is measured from the right edge.
    FlippedLeftRight,
    FlippedBoth,
}

impl Orientation {
    pub fn is_defined(&self) -> bool {
        *self != Orientation::Undefined
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::FlippedUpDown => "flipped-up-down",
            Orientation::FlippedLeftRight => "flipped-left-right",
            Orientation::FlippedBoth => "flipped-both",
            Orientation::Undefined => "undefined",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A placed gate.
#[derive(Debug)]
pub struct Gate {
    info: ObjectInfo,
    bbox: BoundingBox,
    orientation: Orientation,
    template_type_id: ObjectId,
    fill_color: Color,
    frame_color: Color,
    ports: BTreeMap<ObjectId, GatePort>,
    template: Option<TemplateLink>,
}

impl Gate {
    /// A template-less gate.
    pub fn new(bbox: BoundingBox, orientation: Orientation) -> Self {
        Self {
            info: ObjectInfo::default(),
            bbox,
            orientation,
            template_type_id: INVALID_OBJECT_ID,
            fill_color: Color::UNSET,
            frame_color: Color::UNSET,
            ports: BTreeMap::new(),
            template: None,
        }
    }

    pub fn from_extents(
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        orientation: Orientation,
    ) -> Self {
        Self::new(BoundingBox::new(min_x, max_x, min_y, max_y), orientation)
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.set_object_id(id);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.set_name(name);
        self
    }

    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn has_orientation(&self) -> bool {
        self.orientation.is_defined()
    }

    /// Object id of the linked template, or 0 when unlinked.
    pub fn template_type_id(&self) -> ObjectId {
        self.template_type_id
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

    // ── Ports ────────────────────────────────────────────────────────

    /// Place `port` on this gate.
    ///
    /// The port's absolute position is derived from its template port and
    /// the gate's orientation. A port with the same object id is replaced.
    pub fn add_port(&mut self, mut port: GatePort) -> ModelResult<()> {
        if !port.has_valid_object_id() {
            return Err(ModelError::InvalidReference { kind: "gate port" });
        }

        let local = match port.template_port() {
            Some(tp) if !tp.has_valid_object_id() => {
                return Err(ModelError::InvalidReference {
                    kind: "template port",
                })
            }
            Some(tp) => tp.point(),
            None => return Err(Precondition::MissingTemplatePort.into()),
        };

        if !self.has_orientation() {
            return Err(Precondition::UndefinedOrientation.into());
        }

        let x = self.bbox.min_x() + self.relative_x_position_within_gate(local.x)?;
        let y = self.bbox.min_y() + self.relative_y_position_within_gate(local.y)?;
        port.set_position(Point::new(x, y));

        self.ports.insert(port.object_id(), port);
        Ok(())
    }

    /// Take the port with id `port_id` out of this gate.
    pub fn remove_port(&mut self, port_id: ObjectId) -> ModelResult<GatePort> {
        self.ports
            .remove(&port_id)
            .ok_or_else(|| ModelError::lookup(format!("gate port {port_id}"), "gate"))
    }

    pub fn port(&self, port_id: ObjectId) -> Option<&GatePort> {
        self.ports.get(&port_id)
    }

    pub fn ports(&self) -> impl Iterator<Item = &GatePort> {
        self.ports.values()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// The port instantiating exactly `template_port`, compared by identity.
    pub fn get_port_by_template_port(
        &self,
        template_port: &TemplatePortRef,
    ) -> ModelResult<&GatePort> {
        self.ports
            .values()
            .find(|p| p.is_instance_of(template_port))
            .ok_or_else(|| {
                ModelError::lookup(
                    format!("port for template port {}", template_port.object_id()),
                    "gate",
                )
            })
    }

    /// Whether any port instantiates a template port with the same object id
    /// as `template_port`.
    ///
    /// The id decides. A port bound to a different template-port object that
    /// carries the same id still counts as a match, and the mismatch is
    /// reported as a warning.
    pub fn has_template_port(&self, template_port: &TemplatePortRef) -> bool {
        let wanted = template_port.object_id();
        let found = self
            .ports
            .values()
            .find(|p| p.template_port().is_some_and(|tp| tp.object_id() == wanted));

        match found {
            Some(port) => {
                if !port.is_instance_of(template_port) {
                    log::warn!(
                        "gate {}: port {} is bound to another template port object with id {}",
                        self.object_id(),
                        port.object_id(),
                        wanted
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Offset of a template-local x coordinate from the gate's left edge.
    pub fn relative_x_position_within_gate(&self, rel_x: f64) -> ModelResult<f64> {
        match self.orientation {
            Orientation::Normal | Orientation::FlippedUpDown => Ok(rel_x),
            Orientation::FlippedLeftRight | Orientation::FlippedBoth => Ok(self.width() - rel_x),
            Orientation::Undefined => Err(undefined_orientation()),
        }
    }

    /// Offset of a template-local y coordinate from the gate's top edge.
    pub fn relative_y_position_within_gate(&self, rel_y: f64) -> ModelResult<f64> {
        match self.orientation {
            Orientation::Normal | Orientation::FlippedLeftRight => Ok(rel_y),
            Orientation::FlippedUpDown | Orientation::FlippedBoth => Ok(self.height() - rel_y),
            Orientation::Undefined => Err(undefined_orientation()),
        }
    }

    // ── Template linkage ─────────────────────────────────────────────

    pub fn gate_template(&self) -> Option<&TemplateRef> {
        self.template.as_ref().map(|link| link.template())
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// Link this gate to `template`.
    ///
    /// The gate adopts the template's colors. If the bounding box size
    /// differs from the template footprint, the max corner is pushed out so
    /// the box covers the footprint; it never shrinks. Linking the template
    /// that is already linked changes nothing.
    ///
    /// Fails with [`ModelError::Runtime`] while the template is mutably
    /// borrowed elsewhere; the gate is left unchanged.
    pub fn set_gate_template(&mut self, template: &TemplateRef) -> ModelResult<()> {
        if self
            .gate_template()
            .is_some_and(|current| current.ptr_eq(template))
        {
            return Ok(());
        }

        let (template_id, width, height, fill, frame) = {
            let t = template.try_borrow()?;
            if !t.has_valid_object_id() {
                return Err(ModelError::InvalidReference {
                    kind: "gate template",
                });
            }
            (
                t.object_id(),
                f64::from(t.width()),
                f64::from(t.height()),
                t.fill_color(),
                t.frame_color(),
            )
        };

        // Release the old link before taking the new one.
        self.template = None;
        self.template = Some(TemplateLink::acquire(template));
        self.template_type_id = template_id;
        self.fill_color = fill;
        self.frame_color = frame;

        if self.width() != width || self.height() != height {
            let max_x = self.bbox.max_x().max(self.bbox.min_x() + width);
            let max_y = self.bbox.max_y().max(self.bbox.min_y() + height);
            self.bbox.set_max_x(max_x);
            self.bbox.set_max_y(max_y);
        }
        Ok(())
    }

    /// Turn the gate back into an unplaced, typeless shell: no ports, no
    /// orientation, no colors and no template.
    pub fn remove_template(&mut self) {
        self.ports.clear();
        self.orientation = Orientation::Undefined;
        self.template_type_id = INVALID_OBJECT_ID;
        self.fill_color = Color::UNSET;
        self.frame_color = Color::UNSET;
        self.template = None;
    }

    // ── Presentation ─────────────────────────────────────────────────

    pub fn object_type_name(&self) -> &'static str {
        "Gate"
    }

    /// Display string combining the gate name, template name and object id.
    pub fn descriptive_identifier(&self) -> String {
        match (self.gate_template(), self.has_name()) {
            (Some(t), true) => format!("{} : {}", self.name(), t.name()),
            (Some(t), false) => format!("{} ({})", t.name(), self.object_id()),
            (None, true) => format!("{} ({})", self.name(), self.object_id()),
            (None, false) => format!("({})", self.object_id()),
        }
    }

    /// Indented debug report of the gate and its ports.
    pub fn print(&self, out: &mut impl fmt::Write, n_tabs: usize) -> fmt::Result {
        let t = tabs(n_tabs);
        writeln!(out, "{t}Gate name        : {}", self.name())?;
        writeln!(out, "{t}Gate description : {}", self.description())?;
        writeln!(out, "{t}Object ID        : {}", self.object_id())?;
        writeln!(out, "{t}Bounding box     : {}", self.bbox)?;
        writeln!(out)?;

        for port in self.ports.values() {
            port.print(out, n_tabs + 1)?;
            writeln!(out)?;
        }
        writeln!(out)
    }

    pub fn summary(&self) -> GateSummary {
        GateSummary {
            object_id: self.object_id(),
            identifier: self.descriptive_identifier(),
            template_id: self.gate_template().map(|t| t.object_id()),
            bounding_box: self.bbox,
            orientation: self.orientation,
            fill_color: self.fill_color,
            frame_color: self.frame_color,
            ports: self
                .ports
                .values()
                .map(|p| PortSummary {
                    object_id: p.object_id(),
                    name: p.name().to_string(),
                    template_port_id: p.template_port().map(|tp| tp.object_id()),
                    position: p.position(),
                })
                .collect(),
        }
    }
}

fn undefined_orientation() -> ModelError {
    ModelError::Runtime("can't calculate a position for an undefined orientation".to_string())
}

impl Identifiable for Gate {
    fn object_info(&self) -> &ObjectInfo {
        &self.info
    }

    fn object_info_mut(&mut self) -> &mut ObjectInfo {
        &mut self.info
    }
}

impl HasBoundingBox for Gate {
    fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}

impl DeepCopy for Gate {
    /// Identity, placement and colors. The copy is unlinked and has no ports.
    fn shallow_clone(&self) -> Self {
        let mut copy = Gate::new(self.bbox, self.orientation);
        copy.info = self.info.clone();
        copy.fill_color = self.fill_color;
        copy.frame_color = self.frame_color;
        copy
    }

    /// Gates sharing a template and copied through the same context end up
    /// sharing one copy of that template, with its reference count rebuilt
    /// from the copied links.
    fn deep_clone(&self, ctx: &mut CloneContext) -> Self {
        let mut copy = self.shallow_clone();

        if let Some(template) = self.gate_template() {
            let template_copy = template.deep_clone(ctx);
            copy.template_type_id = self.template_type_id;
            copy.template = Some(TemplateLink::acquire(&template_copy));
        }

        for port in self.ports.values() {
            let port_copy = port.deep_clone(ctx);
            copy.ports.insert(port_copy.object_id(), port_copy);
        }
        copy
    }
}

/// Serializable snapshot of a gate for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSummary {
    pub object_id: ObjectId,
    pub identifier: String,
    pub template_id: Option<ObjectId>,
    pub bounding_box: BoundingBox,
    pub orientation: Orientation,
    pub fill_color: Color,
    pub frame_color: Color,
    pub ports: Vec<PortSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSummary {
    pub object_id: ObjectId,
    pub name: String,
    pub template_port_id: Option<ObjectId>,
    pub position: Point,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{GateTemplate, GateTemplatePort};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// 10 x 20 inverter with input A at (2, 3) and output Y at (8, 15).
    fn inverter() -> TemplateRef {
        let mut t = GateTemplate::new(1, 10, 20)
            .with_name("inv")
            .with_colors(Color::rgb(0, 160, 0), Color::rgb(0, 80, 0));
        let a = GateTemplatePort::new(2, 2.0, 3.0).with_name("A");
        let y = GateTemplatePort::new(3, 8.0, 15.0).with_name("Y");
        t.add_template_port(a.into_ref()).unwrap();
        t.add_template_port(y.into_ref()).unwrap();
        t.into_ref()
    }

    fn other_template() -> TemplateRef {
        GateTemplate::new(50, 30, 40)
            .with_name("nor2")
            .with_colors(Color::rgb(1, 2, 3), Color::rgb(4, 5, 6))
            .into_ref()
    }

    fn port_a(t: &TemplateRef) -> TemplatePortRef {
        t.borrow().template_port(2).unwrap()
    }

    fn placed_gate(id: ObjectId, orientation: Orientation, t: &TemplateRef) -> Gate {
        let mut gate = Gate::from_extents(0.0, 10.0, 0.0, 20.0, orientation).with_id(id);
        gate.set_gate_template(t).unwrap();
        gate
    }

    #[test]
    fn test_port_position_for_each_orientation() {
        init_logging();
        let t = inverter();
        let cases = [
            (Orientation::Normal, Point::new(102.0, 53.0)),
            (Orientation::FlippedUpDown, Point::new(102.0, 67.0)),
            (Orientation::FlippedLeftRight, Point::new(108.0, 53.0)),
            (Orientation::FlippedBoth, Point::new(108.0, 67.0)),
        ];
        for (orientation, expected) in cases {
            let mut gate = Gate::from_extents(100.0, 110.0, 50.0, 70.0, orientation).with_id(9);
            gate.add_port(GatePort::new(20, port_a(&t))).unwrap();
            assert_eq!(
                gate.port(20).unwrap().position(),
                expected,
                "orientation {orientation}"
            );
        }
    }

    #[test]
    fn test_flipped_left_right_example() {
        let tp = GateTemplatePort::new(7, 2.0, 3.0).into_ref();
        let mut gate = Gate::from_extents(0.0, 10.0, 0.0, 20.0, Orientation::FlippedLeftRight);
        gate.add_port(GatePort::new(8, tp)).unwrap();
        assert_eq!(gate.port(8).unwrap().position(), Point::new(8.0, 3.0));
    }

    #[test]
    fn test_add_port_preconditions() {
        let t = inverter();

        let mut gate = Gate::from_extents(0.0, 10.0, 0.0, 20.0, Orientation::Normal);
        let err = gate.add_port(GatePort::new(0, port_a(&t))).unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference { .. }));

        let err = gate.add_port(GatePort::unbound(20)).unwrap_err();
        assert_eq!(err, ModelError::Precondition(Precondition::MissingTemplatePort));

        gate.set_orientation(Orientation::Undefined);
        let err = gate.add_port(GatePort::new(20, port_a(&t))).unwrap_err();
        assert_eq!(err, ModelError::Precondition(Precondition::UndefinedOrientation));
        assert_eq!(gate.port_count(), 0);
    }

    #[test]
    fn test_undefined_orientation_never_computes_a_position() {
        let gate = Gate::from_extents(0.0, 10.0, 0.0, 20.0, Orientation::Undefined);
        assert!(matches!(
            gate.relative_x_position_within_gate(1.0),
            Err(ModelError::Runtime(_))
        ));
        assert!(matches!(
            gate.relative_y_position_within_gate(1.0),
            Err(ModelError::Runtime(_))
        ));
    }

    #[test]
    fn test_duplicate_port_id_replaces() {
        let t = inverter();
        let y = t.borrow().template_port(3).unwrap();
        let mut gate = placed_gate(9, Orientation::Normal, &t);
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();
        gate.add_port(GatePort::new(20, y.clone())).unwrap();
        assert_eq!(gate.port_count(), 1);
        assert!(gate.port(20).unwrap().is_instance_of(&y));
    }

    #[test]
    fn test_remove_port() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::Normal, &t);
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        let removed = gate.remove_port(20).unwrap();
        assert_eq!(removed.object_id(), 20);
        assert_eq!(gate.port_count(), 0);
        assert!(matches!(gate.remove_port(20), Err(ModelError::Lookup { .. })));
    }

    #[test]
    fn test_port_lookup_by_template_port() {
        let t = inverter();
        let a = port_a(&t);
        let y = t.borrow().template_port(3).unwrap();
        let mut gate = placed_gate(9, Orientation::Normal, &t);
        gate.add_port(GatePort::new(20, a.clone())).unwrap();

        assert_eq!(gate.get_port_by_template_port(&a).unwrap().object_id(), 20);
        assert!(gate.has_template_port(&a));

        assert!(matches!(
            gate.get_port_by_template_port(&y),
            Err(ModelError::Lookup { .. })
        ));
        assert!(!gate.has_template_port(&y));
    }

    #[test]
    fn test_has_template_port_matches_by_id() {
        init_logging();
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::Normal, &t);
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        // Same id, different object: the tolerant check matches, the
        // identity lookup does not.
        let twin = GateTemplatePort::new(2, 2.0, 3.0).into_ref();
        assert!(gate.has_template_port(&twin));
        assert!(gate.get_port_by_template_port(&twin).is_err());
    }

    #[test]
    fn test_linking_adopts_template_state() {
        let t = inverter();
        let gate = placed_gate(9, Orientation::Normal, &t);
        assert_eq!(t.reference_count(), 1);
        assert_eq!(gate.template_type_id(), 1);
        assert_eq!(gate.fill_color(), Color::rgb(0, 160, 0));
        assert_eq!(gate.frame_color(), Color::rgb(0, 80, 0));
        assert!(gate.gate_template().unwrap().ptr_eq(&t));
    }

    #[test]
    fn test_relinking_same_template_is_noop() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::Normal, &t);
        gate.set_fill_color(Color::rgb(9, 9, 9));

        gate.set_gate_template(&t).unwrap();
        assert_eq!(t.reference_count(), 1);
        assert_eq!(gate.fill_color(), Color::rgb(9, 9, 9));
    }

    #[test]
    fn test_switching_templates_moves_the_reference() {
        let t = inverter();
        let u = other_template();
        let mut gate = placed_gate(9, Orientation::Normal, &t);

        gate.set_gate_template(&u).unwrap();
        assert_eq!(t.reference_count(), 0);
        assert_eq!(u.reference_count(), 1);
        assert_eq!(gate.template_type_id(), 50);
        assert_eq!(gate.fill_color(), Color::rgb(1, 2, 3));
    }

    #[test]
    fn test_template_without_id_is_rejected() {
        let t = inverter();
        let bad = GateTemplate::new(0, 10, 20).into_ref();
        let mut gate = placed_gate(9, Orientation::Normal, &t);

        let err = gate.set_gate_template(&bad).unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference { .. }));
        assert_eq!(t.reference_count(), 1);
        assert_eq!(bad.reference_count(), 0);
        assert!(gate.gate_template().unwrap().ptr_eq(&t));
    }

    #[test]
    fn test_bbox_grows_to_template_footprint() {
        let t = inverter();
        let mut small = Gate::from_extents(5.0, 8.0, 5.0, 9.0, Orientation::Normal);
        small.set_gate_template(&t).unwrap();
        assert_eq!(small.bounding_box(), BoundingBox::new(5.0, 15.0, 5.0, 25.0));

        let mut large = Gate::from_extents(0.0, 30.0, 0.0, 40.0, Orientation::Normal);
        large.set_gate_template(&t).unwrap();
        assert_eq!(large.bounding_box(), BoundingBox::new(0.0, 30.0, 0.0, 40.0));

        let mut wide = Gate::from_extents(0.0, 30.0, 0.0, 5.0, Orientation::Normal);
        wide.set_gate_template(&t).unwrap();
        assert_eq!(wide.bounding_box(), BoundingBox::new(0.0, 30.0, 0.0, 20.0));
    }

    #[test]
    fn test_remove_template_resets_gate() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::FlippedBoth, &t);
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        gate.remove_template();
        assert_eq!(t.reference_count(), 0);
        assert_eq!(gate.port_count(), 0);
        assert_eq!(gate.orientation(), Orientation::Undefined);
        assert_eq!(gate.template_type_id(), 0);
        assert_eq!(gate.fill_color(), Color::UNSET);
        assert_eq!(gate.frame_color(), Color::UNSET);
        assert!(!gate.has_template());

        gate.remove_template();
        assert_eq!(t.reference_count(), 0);
        assert!(!gate.has_template());
    }

    #[test]
    fn test_shared_template_reference_count() {
        let t = inverter();
        let mut a = placed_gate(9, Orientation::Normal, &t);
        assert_eq!(t.reference_count(), 1);
        let b = placed_gate(10, Orientation::Normal, &t);
        assert_eq!(t.reference_count(), 2);

        a.remove_template();
        assert_eq!(t.reference_count(), 1);
        assert!(!a.has_template());
        assert!(b.gate_template().unwrap().ptr_eq(&t));
    }

    #[test]
    fn test_count_tracks_linked_gates() {
        let t = inverter();
        let mut gates: Vec<Gate> = (1..=5)
            .map(|id| Gate::from_extents(0.0, 10.0, 0.0, 20.0, Orientation::Normal).with_id(id))
            .collect();

        for (i, gate) in gates.iter_mut().enumerate() {
            gate.set_gate_template(&t).unwrap();
            assert_eq!(t.reference_count(), i + 1);
        }
        for gate in gates.iter_mut().step_by(2) {
            gate.remove_template();
        }
        let linked = gates.iter().filter(|g| g.has_template()).count();
        assert_eq!(t.reference_count(), linked);

        gates.truncate(1);
        let linked = gates.iter().filter(|g| g.has_template()).count();
        assert_eq!(t.reference_count(), linked);
    }

    #[test]
    fn test_dropping_gate_releases_template() {
        let t = inverter();
        let gate = placed_gate(9, Orientation::Normal, &t);
        assert_eq!(t.reference_count(), 1);
        drop(gate);
        assert_eq!(t.reference_count(), 0);
    }

    #[test]
    fn test_deep_clone_single_gate() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::FlippedLeftRight, &t).with_name("U1");
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        let mut ctx = CloneContext::new();
        let copy = gate.deep_clone(&mut ctx);

        let t2 = copy.gate_template().unwrap();
        assert!(!t2.ptr_eq(&t));
        assert_eq!(t2.reference_count(), 1);
        assert_eq!(t.reference_count(), 1);
        assert_eq!(copy.template_type_id(), 1);
        assert_eq!(copy.name(), "U1");
        assert_eq!(copy.object_id(), 9);
        assert_eq!(copy.orientation(), Orientation::FlippedLeftRight);

        let a2 = t2.borrow().template_port(2).unwrap();
        let port = copy.get_port_by_template_port(&a2).unwrap();
        assert_eq!(port.position(), gate.port(20).unwrap().position());
        assert!(copy.get_port_by_template_port(&port_a(&t)).is_err());
    }

    #[test]
    fn test_deep_clone_shares_template_within_context() {
        let t = inverter();
        let a = placed_gate(9, Orientation::Normal, &t);
        let b = placed_gate(10, Orientation::Normal, &t);

        let mut ctx = CloneContext::new();
        let a2 = a.deep_clone(&mut ctx);
        let b2 = b.deep_clone(&mut ctx);

        let ta = a2.gate_template().unwrap();
        let tb = b2.gate_template().unwrap();
        assert!(ta.ptr_eq(tb));
        assert_eq!(ta.reference_count(), 2);
        assert_eq!(t.reference_count(), 2);
    }

    #[test]
    fn test_deep_clone_with_port_id_equal_to_template_id() {
        let mut shared = GateTemplate::new(5, 10, 20).with_name("buf");
        shared
            .add_template_port(GateTemplatePort::new(5, 1.0, 1.0).into_ref())
            .unwrap();
        let t = shared.into_ref();
        let a = placed_gate(1, Orientation::Normal, &t);
        let b = placed_gate(2, Orientation::Normal, &t);

        let mut ctx = CloneContext::new();
        let a2 = a.deep_clone(&mut ctx);
        let b2 = b.deep_clone(&mut ctx);

        let ta = a2.gate_template().unwrap();
        assert!(ta.ptr_eq(b2.gate_template().unwrap()));
        assert_eq!(ta.reference_count(), 2);
        assert!(ta.borrow().has_template_port(5));
    }

    #[test]
    fn test_add_port_rejects_template_port_without_id() {
        let tp = GateTemplatePort::new(0, 1.0, 1.0).into_ref();
        let mut gate = Gate::from_extents(0.0, 10.0, 0.0, 20.0, Orientation::Normal);

        let err = gate.add_port(GatePort::new(10, tp.clone())).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidReference {
                kind: "template port"
            }
        );
        assert!(gate.add_port(GatePort::new(11, tp)).is_err());
        assert_eq!(gate.port_count(), 0);
    }

    #[test]
    fn test_linking_mutably_borrowed_template_fails_cleanly() {
        let t = inverter();
        let u = other_template();
        let mut gate = placed_gate(9, Orientation::Normal, &t);

        let guard = u.borrow_mut();
        let err = gate.set_gate_template(&u).unwrap_err();
        drop(guard);

        assert!(matches!(err, ModelError::Runtime(_)));
        assert!(gate.gate_template().unwrap().ptr_eq(&t));
        assert_eq!(t.reference_count(), 1);
        assert_eq!(u.reference_count(), 0);

        gate.set_gate_template(&u).unwrap();
        assert_eq!(u.reference_count(), 1);
    }

    #[test]
    fn test_shallow_clone_is_unlinked() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::Normal, &t);
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        let copy = gate.shallow_clone();
        assert_eq!(t.reference_count(), 1);
        assert!(!copy.has_template());
        assert_eq!(copy.template_type_id(), 0);
        assert_eq!(copy.port_count(), 0);
        assert_eq!(copy.bounding_box(), gate.bounding_box());
    }

    #[test]
    fn test_descriptive_identifier() {
        let t = inverter();
        let mut gate = Gate::from_extents(0.0, 10.0, 0.0, 20.0, Orientation::Normal).with_id(9);
        assert_eq!(gate.descriptive_identifier(), "(9)");

        gate.set_name("U1");
        assert_eq!(gate.descriptive_identifier(), "U1 (9)");

        gate.set_gate_template(&t).unwrap();
        assert_eq!(gate.descriptive_identifier(), "U1 : inv");

        gate.set_name("");
        assert_eq!(gate.descriptive_identifier(), "inv (9)");
        assert_eq!(gate.object_type_name(), "Gate");
    }

    #[test]
    fn test_print() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::Normal, &t).with_name("U1");
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        let mut out = String::new();
        gate.print(&mut out, 0).unwrap();
        assert!(out.starts_with("Gate name        : U1\n"));
        assert!(out.contains("Object ID        : 9\n"));
        assert!(out.contains("Bounding box     : x = 0..10 / y = 0..20\n"));
        assert!(out.contains("\tGate port name : \n"));
        assert!(out.contains("\tPosition       : 2, 3\n"));
    }

    #[test]
    fn test_summary_serializes() {
        let t = inverter();
        let mut gate = placed_gate(9, Orientation::FlippedUpDown, &t);
        gate.add_port(GatePort::new(20, port_a(&t))).unwrap();

        let summary = gate.summary();
        assert_eq!(summary.template_id, Some(1));
        assert_eq!(summary.ports.len(), 1);
        assert_eq!(summary.ports[0].position, Point::new(2.0, 17.0));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["orientation"], "FlippedUpDown");
        assert_eq!(json["identifier"], "inv (9)");
        assert_eq!(json["ports"][0]["template_port_id"], 2);
    }
}
