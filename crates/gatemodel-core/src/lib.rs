//! # Gatemodel Core
//!
//! Structural object model for integrated circuits reverse engineered from
//! die imagery: placed gates, their ports, and the reusable gate templates
//! that define a gate's shape and port layout.
//!
//! Gates share templates through counted links, and the whole object graph
//! can be deep-copied through a [`CloneContext`] that keeps shared references
//! shared in the copy.

pub mod geometry;
pub mod color;
pub mod object;
pub mod error;
pub mod clone;
pub mod template;
pub mod port;
pub mod gate;
pub mod library;

pub use clone::{CloneContext, ClonedObject, DeepCopy};
pub use color::Color;
pub use error::{ModelError, ModelResult, Precondition};
pub use gate::{Gate, GateSummary, Orientation, PortSummary};
pub use geometry::{BoundingBox, Point};
pub use library::GateLibrary;
pub use object::{HasBoundingBox, Identifiable, ObjectId, ObjectInfo, INVALID_OBJECT_ID};
pub use port::GatePort;
pub use template::{GateTemplate, GateTemplatePort, TemplatePortRef, TemplateRef};
