//! Instance naming: sanitized names, path keys and mate keys.

/// Joiner between path segments of an instance key.
pub const SUBASSEMBLY_JOINER: &str = "-SUB-";

/// Joiner between the parent and child halves of a mate key.
pub const MATE_JOINER: &str = "_to_";

/// Sanitize an instance name: keep `[A-Za-z0-9_-]`, turn spaces into `-`,
/// and collapse runs of the separator.
pub fn sanitize(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect();

    let mut out = String::with_capacity(kept.len());
    let mut prev_sep = false;
    for c in kept.chars() {
        if c == '-' {
            if !prev_sep {
                out.push(c);
            }
            prev_sep = true;
        } else {
            out.push(c);
            prev_sep = false;
        }
    }
    out
}

/// Join already-sanitized path segments into an instance key, optionally
/// below a sub-assembly prefix.
pub fn occurrence_key(segments: &[String], prefix: Option<&str>) -> String {
    let joined = segments.join(SUBASSEMBLY_JOINER);
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}{SUBASSEMBLY_JOINER}{joined}"),
        _ => joined,
    }
}

/// Build the `parent_to_child` key of a mate, both sides under the same
/// optional sub-assembly prefix.
pub fn mate_key(parent: &[String], child: &[String], prefix: Option<&str>) -> String {
    format!(
        "{}{MATE_JOINER}{}",
        occurrence_key(parent, prefix),
        occurrence_key(child, prefix)
    )
}

/// Split a mate key into its `(parent, child)` halves.
pub fn split_mate_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(MATE_JOINER)
}

/// Rename duplicates by appending `-1, -2, …` in insertion order; the first
/// occurrence of a name keeps it unchanged.
pub fn uniquify(names: &[String]) -> Vec<String> {
    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    names
        .iter()
        .map(|name| match seen.get_mut(name.as_str()) {
            None => {
                seen.insert(name.as_str(), 0);
                name.clone()
            }
            Some(count) => {
                *count += 1;
                format!("{name}-{count}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_specials() {
        assert_eq!(sanitize("wheel1 <3>"), "wheel1-3");
        assert_eq!(sanitize("my--robot!!"), "my-robot");
        assert_eq!(sanitize("Part 1 1"), "Part-1-1");
        assert_eq!(sanitize("under_score kept"), "under_score-kept");
    }

    #[test]
    fn keys_compose() {
        let parent = vec!["base".to_owned()];
        let child = vec!["arm".to_owned(), "wrist".to_owned()];
        assert_eq!(occurrence_key(&child, None), "arm-SUB-wrist");
        assert_eq!(occurrence_key(&parent, Some("sub1")), "sub1-SUB-base");
        assert_eq!(
            mate_key(&parent, &child, None),
            "base_to_arm-SUB-wrist"
        );
        assert_eq!(
            split_mate_key("base_to_arm-SUB-wrist"),
            Some(("base", "arm-SUB-wrist"))
        );
    }

    #[test]
    fn uniquify_appends_suffixes() {
        let names: Vec<String> = ["a", "b", "a", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(uniquify(&names), vec!["a", "b", "a-1", "a-2"]);
    }
}
