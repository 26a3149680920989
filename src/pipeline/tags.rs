//! `<KEY:VALUE>` tag blocks.
//!
//! Footer, header, page and layer descriptors are all stored as a flat run of
//! `<KEY:VALUE>` pairs. A key may repeat (the footer lists one `PAGE…` key per
//! page, some firmwares repeat keys outright), so values are kept as either a
//! single string or an ordered list, and key order follows first appearance.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^:<>]+):([^:<>]*)>").unwrap());

/// One or more values recorded for a tag key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Single(String),
    Multi(Vec<String>),
}

impl TagValue {
    /// First recorded value.
    pub fn first(&self) -> &str {
        match self {
            TagValue::Single(v) => v,
            // Multi is only ever built from two or more values.
            TagValue::Multi(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            TagValue::Single(v) => std::slice::from_ref(v),
            TagValue::Multi(vs) => vs,
        };
        values.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            TagValue::Single(first) => {
                let first = std::mem::take(first);
                *self = TagValue::Multi(vec![first, value]);
            }
            TagValue::Multi(vs) => vs.push(value),
        }
    }
}

/// Parsed tag block, keys in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagBlock {
    entries: IndexMap<String, TagValue>,
}

impl TagBlock {
    /// Extract every `<KEY:VALUE>` occurrence from `content`.
    pub fn parse(content: &str) -> Self {
        let mut entries: IndexMap<String, TagValue> = IndexMap::new();
        for caps in TAG_RE.captures_iter(content) {
            let key = &caps[1];
            let value = caps[2].to_string();
            match entries.get_mut(key) {
                Some(existing) => existing.push(value),
                None => {
                    entries.insert(key.to_string(), TagValue::Single(value));
                }
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, key: &str) -> Option<&TagValue> {
        self.entries.get(key)
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(TagValue::first)
    }

    /// First value for `key`, parsed as an unsigned offset.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// All values whose key starts with `prefix`, flattened, in key order.
    pub fn values_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .flat_map(|(_, value)| value.iter())
            .collect()
    }
}
