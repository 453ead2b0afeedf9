//! Credential storage and configuration persistence.
//!
//! - [`CredentialStore`] is the persistence seam for users, roles, and the
//!   user↔role membership relation.  The account use cases only ever see
//!   this trait.
//! - [`sqlite::SqliteStore`] persists to a SQLite file and backs the binary.
//! - [`memory::InMemoryStore`] keeps everything in process; tests use it.
//! - [`config`] loads `ServerConfig` from TOML.

pub mod config;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use usvc_core::{PasswordHash, Role, RoleId, User, UserId};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Error type for credential store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested user or role does not exist.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint would be violated (duplicate email or role name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend failed for a reason unrelated to the request.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Fields required to create a user.  The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: PasswordHash,
}

/// Partial update of a user record.  `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub password_hash: Option<PasswordHash>,
}

/// Persistence for users, roles, and role memberships.
///
/// Implementations must be safe to share across request tasks.  Lookups of
/// absent records return [`StoreError::NotFound`], never an empty success.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a user.  Fails with [`StoreError::Conflict`] if the email is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn get_user_by_id(&self, id: UserId) -> Result<User, StoreError>;

    /// Looks up a user by exact email.
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Applies `changes` and bumps `updated_at`.
    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError>;

    /// Removes the user together with all of their role memberships.
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;

    /// All users, ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Inserts a role.  Fails with [`StoreError::Conflict`] if the name is taken.
    async fn create_role(&self, name: &str) -> Result<Role, StoreError>;

    async fn get_role_by_name(&self, name: &str) -> Result<Role, StoreError>;

    /// Adds the membership.  Assigning a role the user already holds succeeds
    /// without change.
    async fn assign_role_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;

    /// Roles held by the user, ordered by role id.
    async fn get_user_roles(&self, user_id: UserId) -> Result<Vec<Role>, StoreError>;
}
