//! Roles and role sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque role identifier assigned by the credential store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(u64);

impl RoleId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named role.  Names are unique and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// The set of role names held by a subject.
///
/// Backed by a `BTreeSet` so duplicates collapse and serialization order is
/// stable; callers must not rely on any particular order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` is in the set (exact, case-sensitive match).
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Adds `name`; returns `false` if it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_set_collapses_duplicates() {
        // Arrange / Act
        let set: RoleSet = ["user", "admin", "user"].into_iter().collect();

        // Assert
        assert_eq!(set.len(), 2);
        assert!(set.contains("user"));
        assert!(set.contains("admin"));
    }

    #[test]
    fn test_role_set_contains_is_case_sensitive() {
        let set: RoleSet = ["admin"].into_iter().collect();
        assert!(!set.contains("Admin"));
    }

    #[test]
    fn test_role_set_insert_reports_new_membership() {
        let mut set = RoleSet::new();
        assert!(set.insert("user"));
        assert!(!set.insert("user"));
    }

    #[test]
    fn test_role_set_equality_ignores_insertion_order() {
        let a: RoleSet = ["a", "b"].into_iter().collect();
        let b: RoleSet = ["b", "a"].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_role_set_serializes_as_json_array() {
        // Arrange
        let set: RoleSet = ["user", "admin"].into_iter().collect();

        // Act
        let value = serde_json::to_value(&set).unwrap();

        // Assert
        assert_eq!(value, serde_json::json!(["admin", "user"]));
    }

    #[test]
    fn test_role_set_from_role_records() {
        let roles = [
            Role { id: RoleId::new(1), name: "admin".to_string() },
            Role { id: RoleId::new(2), name: "user".to_string() },
        ];
        let set: RoleSet = roles.iter().map(|r| r.name.as_str()).collect();
        assert!(set.contains("admin") && set.contains("user"));
    }
}
