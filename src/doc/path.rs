use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute, `/`-separated address of a prim inside a layer, e.g.
/// `/World/Props/crate_01`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrimPath(String);

impl PrimPath {
    pub fn parse(s: &str) -> SyncResult<Self> {
        if !s.starts_with('/') {
            return Err(SyncError::path(format!("prim path must be absolute: {s:?}")));
        }
        if s.len() > 1 && (s.ends_with('/') || s[1..].split('/').any(str::is_empty)) {
            return Err(SyncError::path(format!("empty component in prim path: {s:?}")));
        }
        if s == "/" {
            return Err(SyncError::path("the pseudo-root is not addressable"));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// Parent path, or `None` for a top-level prim.
    pub fn parent(&self) -> Option<Self> {
        let i = self.0.rfind('/')?;
        if i == 0 {
            return None;
        }
        Some(Self(self.0[..i].to_owned()))
    }

    pub fn append(&self, name: &str) -> SyncResult<Self> {
        if name.is_empty() || name.contains('/') {
            return Err(SyncError::path(format!("invalid prim name: {name:?}")));
        }
        Ok(Self(format!("{}/{name}", self.0)))
    }

    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }

    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// Walk from the top-level ancestor down to `self`, inclusive.
    pub fn ancestors_and_self(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(p) = cur {
            cur = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }
}

impl TryFrom<String> for PrimPath {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PrimPath> for String {
    fn from(value: PrimPath) -> Self {
        value.0
    }
}

impl fmt::Display for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimPath({})", self.0)
    }
}
