//! A small mutable XML element tree for the MJCF emitter.
//!
//! MJCF generation rewrites the tree after building it (fixed-joint
//! dissolution, custom element insertion, attribute overrides), which a
//! streaming serializer cannot do; this tree keeps attributes in
//! insertion order and pretty-prints with a two-space indent.

use crate::xml_escape;

/// One XML element: tag, ordered attributes, children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// An element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, replacing an earlier value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
        self
    }

    /// Builder-style [`XmlElement::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Read an attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `name` attribute, the handle most MJCF lookups use.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// Append a child, returning a handle to it.
    pub fn push(&mut self, child: XmlElement) -> &mut XmlElement {
        self.children.push(child);
        self.children.last_mut().expect("just pushed")
    }

    /// Depth-first search for the first element with `tag`.
    pub fn find_tag_mut(&mut self, tag: &str) -> Option<&mut XmlElement> {
        if self.tag == tag {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_tag_mut(tag))
    }

    /// Depth-first search for the first element whose `name` attribute is
    /// `name`, regardless of tag.
    pub fn find_named_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        if self.name() == Some(name) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_named_mut(name))
    }

    /// Whether a descendant (or self) carries this `name` attribute.
    pub fn contains_named(&self, name: &str) -> bool {
        if self.name() == Some(name) {
            return true;
        }
        self.children.iter().any(|c| c.contains_named(name))
    }

    /// Detach and return the first descendant with this `name` attribute.
    pub fn detach_named(&mut self, name: &str) -> Option<XmlElement> {
        if let Some(index) = self.children.iter().position(|c| c.name() == Some(name)) {
            return Some(self.children.remove(index));
        }
        for child in &mut self.children {
            if let Some(found) = child.detach_named(name) {
                return Some(found);
            }
        }
        None
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&xml_escape(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>\n");
        } else {
            out.push_str(">\n");
            for child in &self.children {
                child.write_into(out, depth + 1);
            }
            out.push_str(&indent);
            out.push_str("</");
            out.push_str(&self.tag);
            out.push_str(">\n");
        }
    }

    /// Pretty-print with a two-space indent, no XML declaration.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlElement {
        let mut root = XmlElement::new("mujoco").with("model", "bot");
        let mut body = XmlElement::new("body").with("name", "base");
        body.push(XmlElement::new("geom").with("name", "base-visual"));
        root.push(body);
        root.push(XmlElement::new("asset"));
        root
    }

    #[test]
    fn set_replaces_in_place() {
        let mut e = XmlElement::new("geom").with("pos", "0 0 0").with("euler", "0 0 0");
        e.set("pos", "1 2 3");
        assert_eq!(e.get("pos"), Some("1 2 3"));
        assert_eq!(e.attrs[0].0, "pos");
    }

    #[test]
    fn find_by_tag_and_name() {
        let mut root = sample();
        assert!(root.find_tag_mut("asset").is_some());
        assert!(root.find_named_mut("base-visual").is_some());
        assert!(root.find_named_mut("missing").is_none());
        assert!(root.contains_named("base"));
    }

    #[test]
    fn detach_removes_subtree() {
        let mut root = sample();
        let body = root.detach_named("base").unwrap();
        assert_eq!(body.children.len(), 1);
        assert!(!root.contains_named("base-visual"));
    }

    #[test]
    fn pretty_print_escapes_attrs() {
        let e = XmlElement::new("mesh").with("file", "a<b>.stl");
        assert_eq!(e.to_pretty_string(), "<mesh file=\"a&lt;b&gt;.stl\"/>\n");
    }

    #[test]
    fn pretty_print_nests() {
        let printed = sample().to_pretty_string();
        assert!(printed.starts_with("<mujoco model=\"bot\">\n"));
        assert!(printed.contains("\n  <body name=\"base\">\n"));
        assert!(printed.contains("\n    <geom name=\"base-visual\"/>\n"));
        assert!(printed.ends_with("</mujoco>\n"));
    }
}
