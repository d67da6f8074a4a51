//! Robot description graph and its two emitters.
//!
//! A [`Robot`] holds links and joints in insertion order plus the mesh
//! assets behind them. [`Robot::to_urdf`] serializes the standard
//! `<robot>/<link>/<joint>` tree; [`Robot::to_mjcf`] emits a `<mujoco>`
//! scene, dissolving fixed joints into their parent bodies along the way.

use thiserror::Error;

pub mod element;
pub mod joint;
pub mod link;
pub mod mjcf;
pub mod robot;
pub mod urdf;

pub use element::XmlElement;
pub use joint::{Joint, JointDynamics, JointKind, JointLimits, JointMimic};
pub use link::{Collision, Geometry, Inertia, Inertial, Link, Material, Origin, Visual};
pub use mjcf::{Actuator, Light, Sensor};
pub use robot::{OutputFormat, Robot};

/// Emitter failures.
#[derive(Error, Debug)]
pub enum RobotError {
    /// A link or joint name collided after uniquification; indicates a
    /// bug in the synthesizer, not bad input.
    #[error("duplicate name after uniquification: {0}")]
    DuplicateName(String),

    /// A joint references a link that is not in the graph.
    #[error("joint {joint} references unknown link {link}")]
    UnknownLink {
        joint: String,
        link: String,
    },

    /// XML (de)serialization failure.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// Filesystem failure while writing artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Asset download failure.
    #[error(transparent)]
    Client(#[from] armature_client::ClientError),
}

/// Result alias for emitter operations.
pub type Result<T> = std::result::Result<T, RobotError>;

/// Format a number to 8 significant figures, `%.8g` style: plain decimal
/// in the mid range, scientific notation for very small or large values,
/// trailing zeros trimmed.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    // Exponent as rendered, immune to log10 edge cases.
    let sci = format!("{value:e}");
    let exp: i32 = sci
        .rsplit_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if !(-4..8).contains(&exp) {
        let mantissa = format!("{value:.7e}");
        let (m, e) = mantissa.rsplit_once('e').unwrap_or((mantissa.as_str(), "0"));
        let m = m.trim_end_matches('0').trim_end_matches('.');
        format!("{m}e{e}")
    } else {
        let decimals = (7 - exp).max(0) as usize;
        let s = format!("{value:.decimals$}");
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_owned()
        } else {
            s
        }
    }
}

/// Escape the five XML special characters for use in attribute values.
pub fn xml_escape(unescaped: &str) -> String {
    let mut out = String::with_capacity(unescaped.len());
    for c in unescaped.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_mid_range() {
        assert_eq!(format_number(0.123456789), "0.12345679");
        assert_eq!(format_number(123456789.0), "1.2345679e8");
        assert_eq!(format_number(1234567.0), "1234567");
        assert_eq!(format_number(-0.0505), "-0.0505");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(1.0), "1");
    }

    #[test]
    fn format_number_extremes() {
        assert_eq!(format_number(0.00001), "1e-5");
        assert_eq!(format_number(0.0001), "0.0001");
        assert_eq!(format_number(2.5e-10), "2.5e-10");
    }

    #[test]
    fn escape_specials() {
        assert_eq!(xml_escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
