//! YAML front-matter between leading `---` fences.

use std::collections::BTreeMap;

/// Scalar front-matter fields, stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    pub fields: BTreeMap<String, String>,
    /// Index of the first line after the closing fence (0 when absent)
    pub body_start: usize,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// First present key among `keys`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse leading front-matter. Text without a complete fence pair yields an
/// empty [`Frontmatter`].
pub fn parse_frontmatter(text: &str) -> Frontmatter {
    let lines: Vec<&str> = text.split('\n').collect();
    if !lines.first().is_some_and(|l| l.trim_end() == "---") {
        return Frontmatter::default();
    }
    let Some(close) = lines
        .iter()
        .skip(1)
        .position(|l| l.trim_end() == "---")
        .map(|p| p + 1)
    else {
        return Frontmatter::default();
    };

    let block = lines[1..close].join("\n");
    let fields = parse_yaml_block(&block).unwrap_or_else(|| parse_key_values(&block));

    Frontmatter {
        fields,
        body_start: close + 1,
    }
}

fn parse_yaml_block(block: &str) -> Option<BTreeMap<String, String>> {
    let value: serde_yaml::Value = serde_yaml::from_str(block).ok()?;
    let mapping = value.as_mapping()?;
    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            continue;
        };
        let rendered = match value {
            serde_yaml::Value::Null => String::new(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        };
        fields.insert(key.to_string(), rendered);
    }
    Some(fields)
}

/// Fallback for blocks YAML rejects (unquoted colons, stray tabs).
fn parse_key_values(block: &str) -> BTreeMap<String, String> {
    block
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() || key.starts_with('#') || key.contains(' ') {
                return None;
            }
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_frontmatter() {
        let fm = parse_frontmatter("---\nid: FS-010\ncreated: 2025-01-10\ntotal_tasks: 4\n---\n# Title\n");
        assert_eq!(fm.get("id"), Some("FS-010"));
        assert_eq!(fm.get("created"), Some("2025-01-10"));
        assert_eq!(fm.get("total_tasks"), Some("4"));
        assert_eq!(fm.body_start, 5);
    }

    #[test]
    fn test_invalid_yaml_falls_back_to_lines() {
        let fm = parse_frontmatter("---\ntitle: a: b\n\tbad: [\n---\n");
        assert_eq!(fm.get("title"), Some("a: b"));
    }

    #[test]
    fn test_missing_or_unclosed_fence() {
        assert!(parse_frontmatter("# Just a title").is_empty());
        assert!(parse_frontmatter("---\nid: x\nno close").is_empty());
    }

    #[test]
    fn test_get_any_prefers_first_key() {
        let fm = parse_frontmatter("---\ncreatedAt: 2025-02-01\ncreated: 2025-01-01\n---\n");
        assert_eq!(fm.get_any(&["created", "createdAt"]), Some("2025-01-01"));
    }
}
