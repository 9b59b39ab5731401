//! The identity keys a version row can be linked by, strongest first.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    /// `(nature, num)`, both populated.
    NatureNum,
    /// 12-character normalized identifier.
    Nor,
    /// Slugified full title, the last resort.
    TitrefullS,
}

/// Keys stored in a single `textes` column, usable to merge duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKey {
    TitrefullS,
}

impl IdentityKey {
    pub fn label(self) -> &'static str {
        match self {
            IdentityKey::NatureNum => "(nature, num)",
            IdentityKey::Nor => "nor",
            IdentityKey::TitrefullS => "titrefull_s",
        }
    }
}

impl From<MergeKey> for IdentityKey {
    fn from(key: MergeKey) -> Self {
        match key {
            MergeKey::TitrefullS => IdentityKey::TitrefullS,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(IdentityKey::from(*self).label())
    }
}
