// Fallback video catalog: pre-recorded presenter clips served when avatar
// generation cannot deliver. Selection is a pure function of the question id
// so the same question always maps to the same clip.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category reserved for the last-resort clip. It never participates in the
/// per-question rotation.
pub const DEFAULT_CATEGORY: &str = "default";

/// Static catalog of fallback clips keyed by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackCatalog {
    entries: BTreeMap<String, String>,
}

impl FallbackCatalog {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.entries.get(category).map(String::as_str)
    }

    /// Deterministically pick a clip for a question.
    ///
    /// The byte sum of the question id indexes into the non-default
    /// categories in sorted order. The `default` clip is used only when that
    /// rotation is empty, and `None` means the catalog has nothing at all.
    pub fn select(&self, question_id: &str) -> Option<&str> {
        let rotation: Vec<&String> = self
            .entries
            .keys()
            .filter(|k| k.as_str() != DEFAULT_CATEGORY)
            .collect();
        if rotation.is_empty() {
            return self.get(DEFAULT_CATEGORY);
        }
        let sum: u64 = question_id.bytes().map(u64::from).sum();
        let category = rotation[(sum % rotation.len() as u64) as usize];
        self.entries.get(category).map(String::as_str)
    }
}

impl Default for FallbackCatalog {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "default".to_string(),
            "/videos/fallback/anna-welcome.mp4".to_string(),
        );
        entries.insert(
            "intro".to_string(),
            "/videos/fallback/anna-intro.mp4".to_string(),
        );
        entries.insert(
            "question".to_string(),
            "/videos/fallback/anna-discussion.mp4".to_string(),
        );
        entries.insert(
            "closing".to_string(),
            "/videos/fallback/anna-closing.mp4".to_string(),
        );
        Self { entries }
    }
}
