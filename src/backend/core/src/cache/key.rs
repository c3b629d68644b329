//! Cache key generation.
//!
//! Keys are shared with other services reading the same cache, so their
//! textual form is fixed: `good:<id>`.

use std::fmt;

/// Cache key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// A single good by id
    Good,
}

impl KeyType {
    /// Get the key type prefix for namespacing.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Good => "good",
        }
    }
}

/// A typed cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key_type: KeyType,
    id: String,
}

impl CacheKey {
    pub fn new(key_type: KeyType, id: impl fmt::Display) -> Self {
        Self {
            key_type,
            id: id.to_string(),
        }
    }

    /// Key of a good's cached row.
    pub fn good(id: i64) -> Self {
        Self::new(KeyType::Good, id)
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_type.prefix(), self.id)
    }
}
