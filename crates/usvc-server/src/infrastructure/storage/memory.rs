//! In-memory credential store.
//!
//! All tables live behind a single `tokio::sync::RwLock`.  Every mutation
//! (including its uniqueness check) happens under one write guard, so two
//! concurrent registrations with the same email cannot both succeed.
//!
//! Contents are lost when the process exits.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use usvc_core::{token::unix_now, Role, RoleId, User, UserId};

use super::{CredentialStore, NewUser, StoreError, UserChanges};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    users_by_email: BTreeMap<String, UserId>,
    roles: BTreeMap<RoleId, Role>,
    roles_by_name: BTreeMap<String, RoleId>,
    memberships: BTreeSet<(UserId, RoleId)>,
    last_user_id: u64,
    last_role_id: u64,
}

/// Process-local [`CredentialStore`].  Identifiers start at 1.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.write().await;
        if t.users_by_email.contains_key(&new_user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                new_user.email
            )));
        }

        t.last_user_id += 1;
        let id = UserId::new(t.last_user_id);
        let now = unix_now();
        let user = User {
            id,
            email: new_user.email,
            full_name: new_user.full_name,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
        };
        t.users_by_email.insert(user.email.clone(), id);
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let t = self.tables.read().await;
        t.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let t = self.tables.read().await;
        t.users_by_email
            .get(email)
            .and_then(|id| t.users.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError> {
        let mut t = self.tables.write().await;
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = unix_now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let user = t.users.remove(&id).ok_or(StoreError::NotFound)?;
        t.users_by_email.remove(&user.email);
        t.memberships.retain(|(uid, _)| *uid != id);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users.values().cloned().collect())
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        let mut t = self.tables.write().await;
        if t.roles_by_name.contains_key(name) {
            return Err(StoreError::Conflict(format!("role {name} already exists")));
        }

        t.last_role_id += 1;
        let role = Role {
            id: RoleId::new(t.last_role_id),
            name: name.to_string(),
        };
        t.roles_by_name.insert(role.name.clone(), role.id);
        t.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Role, StoreError> {
        let t = self.tables.read().await;
        t.roles_by_name
            .get(name)
            .and_then(|id| t.roles.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn assign_role_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user_id) || !t.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound);
        }
        t.memberships.insert((user_id, role_id));
        Ok(())
    }

    async fn get_user_roles(&self, user_id: UserId) -> Result<Vec<Role>, StoreError> {
        let t = self.tables.read().await;
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        Ok(t.memberships
            .range((user_id, RoleId::new(0))..=(user_id, RoleId::new(u64::MAX)))
            .filter_map(|(_, role_id)| t.roles.get(role_id).cloned())
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
