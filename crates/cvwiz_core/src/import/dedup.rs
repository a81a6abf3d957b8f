//! Case-insensitive skill name deduplication.

use std::collections::HashSet;

/// Names seen so far for one user, keyed trimmed and lower-cased.
#[derive(Debug, Clone, Default)]
pub struct SkillDedupSet {
    seen: HashSet<String>,
}

impl SkillDedupSet {
    /// Seeds the set, typically with the user's persisted skill names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            seen: names.into_iter().map(|name| dedup_key(name.as_ref())).collect(),
        }
    }

    /// Returns `true` and remembers `name` when it was not seen before.
    pub fn admit(&mut self, name: &str) -> bool {
        self.seen.insert(dedup_key(name))
    }
}

fn dedup_key(name: &str) -> String {
    name.trim().to_lowercase()
}
