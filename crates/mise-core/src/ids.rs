use std::fmt;

use serde::{Deserialize, Serialize};

const LOCAL_PREFIX: &str = "local-";

/// Identifier of a timer or converter.
///
/// Either assigned by the store, or a locally generated placeholder
/// (`local-…`) for entities that have not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh, unique placeholder for an entity that only exists locally.
    pub fn local() -> Self {
        Self(format!("{LOCAL_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_unique_and_marked() {
        let a = EntityId::local();
        let b = EntityId::local();
        assert_ne!(a, b);
        assert!(a.is_local());
        assert!(!EntityId::new("65f0c2a9e1").is_local());
    }
}
