//! In-memory target system.
//!
//! Holds users, roles and assignments in process memory. Backs the engine
//! tests and any embedding that wants to reconcile without a database.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::error::{TargetError, TargetResult};
use crate::ids::{ContextId, RoleId, UserId};
use crate::traits::{AssignmentStore, RoleCatalog, UserCatalog};
use crate::types::{AssignmentKey, LocalUserField, MutationOutcome, UserMatch};

/// A local user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub idnumber: String,
}

impl LocalUser {
    /// Create a user whose username, email and idnumber are derived from `username`.
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: UserId::from_i64(id),
            email: format!("{username}@example.com"),
            idnumber: username.clone(),
            username,
        }
    }

    /// Override the idnumber.
    #[must_use]
    pub fn with_idnumber(mut self, idnumber: impl Into<String>) -> Self {
        self.idnumber = idnumber.into();
        self
    }

    /// Override the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    fn field(&self, field: LocalUserField) -> String {
        match field {
            LocalUserField::Id => self.id.to_string(),
            LocalUserField::Username => self.username.clone(),
            LocalUserField::Email => self.email.clone(),
            LocalUserField::IdNumber => self.idnumber.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    roles: HashMap<String, RoleId>,
    users: Vec<LocalUser>,
    assignments: BTreeSet<(ContextId, AssignmentKey)>,
}

/// In-memory implementation of every target-side trait.
#[derive(Debug)]
pub struct InMemoryTarget {
    context: Option<ContextId>,
    state: RwLock<MemoryState>,
    failing_users: HashSet<UserId>,
    grant_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
}

impl Default for InMemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTarget {
    /// Id of the system context in a fresh in-memory target.
    pub const SYSTEM_CONTEXT: ContextId = ContextId::from_i64(1);

    /// Create an empty target with a provisioned system context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: Some(Self::SYSTEM_CONTEXT),
            state: RwLock::new(MemoryState::default()),
            failing_users: HashSet::new(),
            grant_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
        }
    }

    /// Remove the system context so `system_context()` fails.
    #[must_use]
    pub fn without_context(mut self) -> Self {
        self.context = None;
        self
    }

    /// Register a role.
    #[must_use]
    pub fn with_role(mut self, id: i64, shortname: impl Into<String>) -> Self {
        self.state
            .get_mut()
            .roles
            .insert(shortname.into(), RoleId::from_i64(id));
        self
    }

    /// Register a user.
    #[must_use]
    pub fn with_user(mut self, user: LocalUser) -> Self {
        self.state.get_mut().users.push(user);
        self
    }

    /// Seed an existing assignment in the system context.
    #[must_use]
    pub fn with_assignment(mut self, user_id: i64, role_id: i64) -> Self {
        let key = AssignmentKey::new(UserId::from_i64(user_id), RoleId::from_i64(role_id));
        self.state
            .get_mut()
            .assignments
            .insert((Self::SYSTEM_CONTEXT, key));
        self
    }

    /// Make every grant and revoke for `user_id` fail with a database error.
    #[must_use]
    pub fn with_failing_user(mut self, user_id: i64) -> Self {
        self.failing_users.insert(UserId::from_i64(user_id));
        self
    }

    /// Seed assignments in bulk.
    pub async fn seed_assignments(
        &self,
        context: ContextId,
        keys: impl IntoIterator<Item = AssignmentKey>,
    ) {
        let mut state = self.state.write().await;
        state
            .assignments
            .extend(keys.into_iter().map(|key| (context, key)));
    }

    /// Current assignments in the system context.
    pub async fn assignments(&self) -> BTreeSet<AssignmentKey> {
        let state = self.state.read().await;
        state
            .assignments
            .iter()
            .filter(|(ctx, _)| Some(*ctx) == self.context)
            .map(|(_, key)| *key)
            .collect()
    }

    /// Number of grant calls received, successful or not.
    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    /// Number of revoke calls received, successful or not.
    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self, key: AssignmentKey) -> TargetResult<()> {
        if self.failing_users.contains(&key.user_id) {
            return Err(TargetError::database(format!(
                "simulated failure for user {}",
                key.user_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleCatalog for InMemoryTarget {
    async fn resolve_role(&self, shortname: &str) -> TargetResult<Option<RoleId>> {
        let state = self.state.read().await;
        Ok(state.roles.get(shortname).copied())
    }
}

#[async_trait]
impl UserCatalog for InMemoryTarget {
    async fn resolve_user(&self, field: LocalUserField, value: &str) -> TargetResult<UserMatch> {
        let state = self.state.read().await;
        let candidates = state
            .users
            .iter()
            .filter(|user| user.field(field) == value)
            .map(|user| user.id)
            .collect();
        Ok(UserMatch::from_candidates(candidates))
    }
}

#[async_trait]
impl AssignmentStore for InMemoryTarget {
    async fn system_context(&self) -> TargetResult<ContextId> {
        self.context.ok_or(TargetError::ContextMissing)
    }

    async fn list_assignments(
        &self,
        context: ContextId,
        roles: &BTreeSet<RoleId>,
    ) -> TargetResult<Vec<AssignmentKey>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|(ctx, key)| *ctx == context && roles.contains(&key.role_id))
            .map(|(_, key)| *key)
            .collect())
    }

    async fn grant(
        &self,
        key: AssignmentKey,
        context: ContextId,
    ) -> TargetResult<MutationOutcome> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(key)?;
        let mut state = self.state.write().await;
        if state.assignments.insert((context, key)) {
            Ok(MutationOutcome::Applied)
        } else {
            Ok(MutationOutcome::AlreadyExists)
        }
    }

    async fn revoke(
        &self,
        key: AssignmentKey,
        context: ContextId,
    ) -> TargetResult<MutationOutcome> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(key)?;
        let mut state = self.state.write().await;
        if state.assignments.remove(&(context, key)) {
            Ok(MutationOutcome::Applied)
        } else {
            Ok(MutationOutcome::NotFound)
        }
    }
}
