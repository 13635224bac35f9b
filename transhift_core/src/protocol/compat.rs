use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::constants::APP_VERSION;

/// Which peer versions each local version is willing to talk to.
///
/// Built once and shared read-only; the negotiator borrows it per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompatibilityTable {
    entries: HashMap<String, HashSet<String>>,
}

impl CompatibilityTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Build a table from `(version, accepted versions)` pairs
    pub fn from_pairs<I, V, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (V, A)>,
        V: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let mut table = Self::empty();
        for (version, accepted) in pairs {
            table
                .entries
                .entry(version.into())
                .or_default()
                .extend(accepted.into_iter().map(Into::into));
        }
        table
    }

    /// Whether `local` lists `remote` as compatible
    pub fn accepts(&self, local: &str, remote: &str) -> bool {
        self.entries
            .get(local)
            .is_some_and(|accepted| accepted.contains(remote))
    }

    /// Versions known to the table
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::from_pairs([(APP_VERSION, [APP_VERSION])])
    }
}
