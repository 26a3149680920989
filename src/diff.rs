//! Page-level change classification between two conversions.

use crate::metadata::PageHash;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// How much of a document changed since the last conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffKind {
    /// Same pages, same content.
    None,
    /// Same pages in the same order, some content changed.
    ContentOnly,
    /// New pages after the existing ones.
    Append,
    /// Pages removed or reordered.
    Structural,
    /// No previous conversion to compare against.
    Full,
}

impl DiffKind {
    /// Whether every page has to be regenerated.
    pub fn is_full_rebuild(self) -> bool {
        matches!(self, DiffKind::Full | DiffKind::Structural)
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiffKind::None => "none",
            DiffKind::ContentOnly => "content-only",
            DiffKind::Append => "append",
            DiffKind::Structural => "structural",
            DiffKind::Full => "full",
        };
        f.write_str(s)
    }
}

/// Classification plus the ids behind it. The four id lists are disjoint;
/// `added`, `changed` and `unchanged` follow current page order, `removed`
/// follows saved order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDiff {
    pub kind: DiffKind,
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl PageDiff {
    /// Ids whose output must be produced in this run.
    pub fn dirty(&self) -> HashSet<&str> {
        self.added
            .iter()
            .chain(&self.changed)
            .map(String::as_str)
            .collect()
    }
}

/// Compare current page hashes against the saved ones.
pub fn classify(current: &[PageHash], saved: Option<&[PageHash]>) -> PageDiff {
    let Some(saved) = saved else {
        return PageDiff {
            kind: DiffKind::Full,
            added: current.iter().map(|p| p.id.clone()).collect(),
            changed: Vec::new(),
            removed: Vec::new(),
            unchanged: Vec::new(),
        };
    };

    let saved_by_id: HashMap<&str, &str> = saved
        .iter()
        .map(|p| (p.id.as_str(), p.hash.as_str()))
        .collect();
    let current_ids: HashSet<&str> = current.iter().map(|p| p.id.as_str()).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    let mut unchanged = Vec::new();
    for page in current {
        match saved_by_id.get(page.id.as_str()) {
            None => added.push(page.id.clone()),
            Some(&hash) if hash != page.hash => changed.push(page.id.clone()),
            Some(_) => unchanged.push(page.id.clone()),
        }
    }
    let removed: Vec<String> = saved
        .iter()
        .filter(|p| !current_ids.contains(p.id.as_str()))
        .map(|p| p.id.clone())
        .collect();

    let kind = if !removed.is_empty() || !is_prefix(saved, current) {
        DiffKind::Structural
    } else if added.is_empty() && changed.is_empty() {
        DiffKind::None
    } else if !added.is_empty() {
        DiffKind::Append
    } else {
        DiffKind::ContentOnly
    };

    PageDiff {
        kind,
        added,
        changed,
        removed,
        unchanged,
    }
}

/// Saved ids appear, in order, at the start of the current ids.
fn is_prefix(saved: &[PageHash], current: &[PageHash]) -> bool {
    saved.len() <= current.len() && saved.iter().zip(current).all(|(s, c)| s.id == c.id)
}
