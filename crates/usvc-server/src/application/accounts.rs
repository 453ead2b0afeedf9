//! Account use cases: registration, login, the user directory, and roles.
//!
//! Every operation that touches another subject's data takes the caller's
//! [`Claims`] explicitly and checks the access policy *before* looking the
//! target up, so a forbidden caller learns nothing about which ids exist.
//!
//! Password hashing and verification are CPU-bound and run on the blocking
//! thread pool via `tokio::task::spawn_blocking`.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use usvc_core::{
    require_admin, require_self_or_admin, AccessDenied, Claims, PasswordHash, Role, RoleSet,
    TokenAuthority, User, UserId, ADMIN_ROLE,
};

use crate::infrastructure::storage::{CredentialStore, NewUser, StoreError, UserChanges};

/// Role granted to every self-registered account.
pub const DEFAULT_ROLE: &str = "user";

/// Error type for account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Unknown email or wrong password.  Callers cannot tell which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("forbidden: {0}")]
    Forbidden(#[from] AccessDenied),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Storage, hashing, or signing failed.  The detail is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccountError {
    fn from_store(err: StoreError, what: &'static str) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(what),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

/// A user record as shown to callers: the password hash is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub roles: RoleSet,
    pub created_at: u64,
    pub updated_at: u64,
}

impl UserView {
    fn new(user: User, roles: RoleSet) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserView,
}

/// Requested changes to a user.  Absent or empty fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub password: Option<String>,
}

/// Orchestrates the credential store, password hashing, and token issuance.
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenAuthority>,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenAuthority>) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenAuthority> {
        &self.tokens
    }

    /// Creates an account holding the [`DEFAULT_ROLE`].
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<UserView, AccountError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AccountError::Validation(
                "email and password required".to_string(),
            ));
        }

        let password_hash = hash_password(password.to_string()).await?;
        let user = self
            .store
            .create_user(NewUser {
                email: email.to_string(),
                full_name: full_name.trim().to_string(),
                password_hash,
            })
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;

        let role = self.ensure_role(DEFAULT_ROLE).await?;
        self.store
            .assign_role_to_user(user.id, role.id)
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        let roles = RoleSet::from_iter([role.name]);
        Ok(UserView::new(user, roles))
    }

    /// Verifies the password and issues a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        let email = email.trim();
        let user = match self.store.get_user_by_email(email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                info!(email = %email, "login rejected: unknown email");
                return Err(AccountError::InvalidCredentials);
            }
            Err(e) => return Err(AccountError::from_store(e, "user")),
        };

        if !verify_password(user.password_hash.clone(), password.to_string()).await? {
            info!(user_id = %user.id, "login rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let roles = self.roles_of(user.id).await?;
        let token = self
            .tokens
            .issue(user.id, &user.email, &roles)
            .map_err(|e| AccountError::Internal(e.to_string()))?;

        info!(user_id = %user.id, "login succeeded");
        Ok(Session {
            token,
            user: UserView::new(user, roles),
        })
    }

    /// Lists every account.  Admin only.
    pub async fn list_users(&self, caller: &Claims) -> Result<Vec<UserView>, AccountError> {
        require_admin(caller)?;
        let users = self
            .store
            .list_users()
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;

        let mut views = Vec::with_capacity(users.len());
        for user in users {
            let roles = self.roles_of(user.id).await?;
            views.push(UserView::new(user, roles));
        }
        Ok(views)
    }

    /// Fetches one account.  The subject itself or an admin.
    pub async fn get_user(&self, caller: &Claims, id: UserId) -> Result<UserView, AccountError> {
        require_self_or_admin(caller, id)?;
        let user = self
            .store
            .get_user_by_id(id)
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;
        let roles = self.roles_of(id).await?;
        Ok(UserView::new(user, roles))
    }

    /// Updates display name and/or password.  The subject itself or an admin.
    pub async fn update_user(
        &self,
        caller: &Claims,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserView, AccountError> {
        require_self_or_admin(caller, id)?;

        let full_name = update
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let password_hash = match update.password.filter(|p| !p.is_empty()) {
            Some(raw) => Some(hash_password(raw).await?),
            None => None,
        };
        let password_changed = password_hash.is_some();

        let user = self
            .store
            .update_user(
                id,
                UserChanges {
                    full_name,
                    password_hash,
                },
            )
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;

        info!(user_id = %caller.user_id, target = %id, password_changed, "user updated");
        let roles = self.roles_of(id).await?;
        Ok(UserView::new(user, roles))
    }

    /// Deletes an account and its role memberships.  Admin only.
    pub async fn delete_user(&self, caller: &Claims, id: UserId) -> Result<(), AccountError> {
        require_admin(caller)?;
        self.store
            .delete_user(id)
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;
        info!(user_id = %caller.user_id, target = %id, "user deleted");
        Ok(())
    }

    /// Creates a role.  Admin only.
    pub async fn create_role(&self, caller: &Claims, name: &str) -> Result<Role, AccountError> {
        require_admin(caller)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AccountError::Validation("role name required".to_string()));
        }
        let role = self
            .store
            .create_role(name)
            .await
            .map_err(|e| AccountError::from_store(e, "role"))?;
        info!(user_id = %caller.user_id, role = %role.name, "role created");
        Ok(role)
    }

    /// Grants an existing role to an existing user.  Admin only.
    ///
    /// The change is visible in tokens issued afterwards; tokens already
    /// held by the target keep their old role set until they expire.
    pub async fn assign_role(
        &self,
        caller: &Claims,
        id: UserId,
        role_name: &str,
    ) -> Result<(), AccountError> {
        require_admin(caller)?;
        let role = self
            .store
            .get_role_by_name(role_name.trim())
            .await
            .map_err(|e| AccountError::from_store(e, "role"))?;
        self.store
            .assign_role_to_user(id, role.id)
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;
        info!(user_id = %caller.user_id, target = %id, role = %role.name, "role assigned");
        Ok(())
    }

    /// Creates the bootstrap admin account unless `email` is already taken.
    ///
    /// Returns `true` if the account was created.
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<bool, AccountError> {
        match self.store.get_user_by_email(email).await {
            Ok(_) => return Ok(false),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(AccountError::from_store(e, "user")),
        }

        let password_hash = hash_password(password.to_string()).await?;
        let user = self
            .store
            .create_user(NewUser {
                email: email.to_string(),
                full_name: full_name.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;
        let role = self.ensure_role(ADMIN_ROLE).await?;
        self.store
            .assign_role_to_user(user.id, role.id)
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;

        info!(user_id = %user.id, email = %user.email, "admin account created");
        Ok(true)
    }

    async fn roles_of(&self, id: UserId) -> Result<RoleSet, AccountError> {
        let roles = self
            .store
            .get_user_roles(id)
            .await
            .map_err(|e| AccountError::from_store(e, "user"))?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    /// Returns the role named `name`, creating it if needed.
    async fn ensure_role(&self, name: &str) -> Result<Role, AccountError> {
        match self.store.get_role_by_name(name).await {
            Ok(role) => return Ok(role),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(AccountError::from_store(e, "role")),
        }
        match self.store.create_role(name).await {
            Ok(role) => Ok(role),
            // Lost a creation race; the winner's row is what we want.
            Err(StoreError::Conflict(_)) => self
                .store
                .get_role_by_name(name)
                .await
                .map_err(|e| AccountError::from_store(e, "role")),
            Err(e) => Err(AccountError::from_store(e, "role")),
        }
    }
}

async fn hash_password(raw: String) -> Result<PasswordHash, AccountError> {
    tokio::task::spawn_blocking(move || PasswordHash::generate(&raw))
        .await
        .map_err(|e| AccountError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AccountError::Internal(e.to_string()))
}

async fn verify_password(hash: PasswordHash, raw: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || hash.verify(&raw))
        .await
        .map_err(|e| {
            warn!("password verification task failed: {e}");
            AccountError::Internal(format!("verification task failed: {e}"))
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
