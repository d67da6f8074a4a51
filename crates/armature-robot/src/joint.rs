//! Joint records: one sum type over the URDF joint kinds, emitted per
//! target format from a single dispatch site.

use crate::element::XmlElement;
use crate::format_number;
use crate::link::{join3, Origin};
use tracing::warn;

/// Position/velocity bounds of an articulated joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
    pub effort: f64,
    pub velocity: f64,
}

/// Viscous damping and Coulomb friction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointDynamics {
    pub damping: f64,
    pub friction: f64,
}

/// A joint slaved to another joint: `q = multiplier * q_driver + offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMimic {
    pub joint: String,
    pub multiplier: f64,
    pub offset: f64,
}

/// The articulation a joint provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Fixed,
    Revolute,
    Continuous,
    Prismatic,
    Floating,
    Planar,
    /// Placeholder for mate types with no simulator counterpart.
    Dummy,
}

impl JointKind {
    /// The URDF `type` attribute.
    pub fn urdf_type(&self) -> &'static str {
        match self {
            JointKind::Fixed => "fixed",
            JointKind::Revolute => "revolute",
            JointKind::Continuous => "continuous",
            JointKind::Prismatic => "prismatic",
            JointKind::Floating => "floating",
            JointKind::Planar => "planar",
            JointKind::Dummy => "dummy",
        }
    }

    /// Parse the URDF `type` attribute.
    pub fn from_urdf_type(s: &str) -> Option<Self> {
        Some(match s {
            "fixed" => JointKind::Fixed,
            "revolute" => JointKind::Revolute,
            "continuous" => JointKind::Continuous,
            "prismatic" => JointKind::Prismatic,
            "floating" => JointKind::Floating,
            "planar" => JointKind::Planar,
            "dummy" => JointKind::Dummy,
            _ => return None,
        })
    }

    /// The MJCF joint type, `None` when the kind emits no joint element.
    pub fn mjcf_type(&self) -> Option<&'static str> {
        match self {
            JointKind::Revolute | JointKind::Continuous => Some("hinge"),
            JointKind::Prismatic | JointKind::Planar => Some("slide"),
            JointKind::Floating => Some("free"),
            JointKind::Fixed | JointKind::Dummy => None,
        }
    }
}

/// A directed connection between two links.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub kind: JointKind,
    pub parent: String,
    pub child: String,
    pub origin: Origin,
    pub axis: Option<[f64; 3]>,
    pub limits: Option<JointLimits>,
    pub dynamics: Option<JointDynamics>,
    pub mimic: Option<JointMimic>,
}

impl Joint {
    /// A fixed joint with no extras.
    pub fn fixed(name: impl Into<String>, parent: impl Into<String>, child: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            kind: JointKind::Fixed,
            parent: parent.into(),
            child: child.into(),
            origin,
            axis: None,
            limits: None,
            dynamics: None,
            mimic: None,
        }
    }

    /// Whether this joint dissolves during MJCF emission.
    pub fn is_fixed(&self) -> bool {
        self.kind == JointKind::Fixed
    }

    /// Emit the MJCF `<joint>` into the child body, with a zero local
    /// origin; the child body pose already carries the joint frame.
    pub fn to_mjcf(&self, body: &mut XmlElement) {
        let Some(mjcf_type) = self.kind.mjcf_type() else {
            if self.kind == JointKind::Dummy {
                warn!(joint = %self.name, "dummy joint emitted as a rigid attachment");
            }
            return;
        };
        let mut joint = XmlElement::new("joint")
            .with("name", self.name.clone())
            .with("type", mjcf_type);
        joint.set("pos", "0 0 0");
        if let Some(axis) = &self.axis {
            joint.set("axis", join3(axis));
        }
        if let Some(limits) = &self.limits {
            joint.set(
                "range",
                format!("{} {}", format_number(limits.lower), format_number(limits.upper)),
            );
        }
        if let Some(dynamics) = &self.dynamics {
            joint.set("damping", format_number(dynamics.damping));
            joint.set("frictionloss", format_number(dynamics.friction));
        }
        body.push(joint);
    }
}
