//! Snapshot of the assignments a run may still revoke.

use std::collections::{HashMap, HashSet};

use rolesync_core::{AssignmentKey, RoleId, UserId};

/// Current assignments of the synced roles, keyed by user.
///
/// Built once per run. Source rows that confirm an assignment claim it,
/// which removes it; whatever is left after the stream is exhausted was not
/// confirmed and is a revocation candidate.
#[derive(Debug, Clone, Default)]
pub struct CurrentAssignmentIndex {
    by_user: HashMap<UserId, HashSet<RoleId>>,
}

impl CurrentAssignmentIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from a list of assignment keys.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = AssignmentKey>) -> Self {
        let mut index = Self::new();
        for key in keys {
            index.insert(key);
        }
        index
    }

    pub fn insert(&mut self, key: AssignmentKey) -> bool {
        self.by_user.entry(key.user_id).or_default().insert(key.role_id)
    }

    #[must_use]
    pub fn contains(&self, key: AssignmentKey) -> bool {
        self.by_user
            .get(&key.user_id)
            .is_some_and(|roles| roles.contains(&key.role_id))
    }

    /// Remove `key` if present. Returns whether it was present.
    pub fn claim(&mut self, key: AssignmentKey) -> bool {
        let Some(roles) = self.by_user.get_mut(&key.user_id) else {
            return false;
        };
        let claimed = roles.remove(&key.role_id);
        if roles.is_empty() {
            self.by_user.remove(&key.user_id);
        }
        claimed
    }

    /// Unclaimed assignments, each exactly once, in key order.
    #[must_use]
    pub fn remaining(&self) -> Vec<AssignmentKey> {
        let mut keys: Vec<AssignmentKey> = self
            .by_user
            .iter()
            .flat_map(|(user_id, roles)| {
                roles
                    .iter()
                    .map(move |role_id| AssignmentKey::new(*user_id, *role_id))
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_user.values().map(HashSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}
