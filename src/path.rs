//! Classified install paths, as consumed by layout policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Any,
    Exe,
    Symlink,
    Special,
}

const PATH_KINDS: &[(PathKind, &str)] = &[
    (PathKind::Any,     "any"),
    (PathKind::Exe,     "exe"),
    (PathKind::Symlink, "symlink"),
    (PathKind::Special, "special"),
];

impl PathKind {
    pub fn name(self) -> &'static str {
        PATH_KINDS
            .iter()
            .find(|&&(k, _)| k == self)
            .map_or("any", |&(_, n)| n)
    }
}

impl FromStr for PathKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PATH_KINDS
            .iter()
            .find(|&&(_, n)| n == s)
            .map(|&(k, _)| k)
            .ok_or_else(|| format!("unknown path kind '{s}'"))
    }
}

/// A path plus its classification.  Ordered by path, then kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathDefinition {
    pub path: String,
    pub kind: PathKind,
}

impl PathDefinition {
    pub fn new(path: impl Into<String>, kind: PathKind) -> Self {
        Self { path: path.into(), kind }
    }
}

impl fmt::Display for PathDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.kind.name())
    }
}
