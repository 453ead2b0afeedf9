//! SQLite credential store (sqlx).
//!
//! Three tables: `users`, `roles`, and the `user_roles` join table.  Email and
//! role-name uniqueness are `UNIQUE` constraints, so concurrent duplicates are
//! settled by the database.  Ids come from `AUTOINCREMENT` and are never
//! reused after a delete.
//!
//! Memberships cascade with their user.  Foreign keys are enabled on every
//! pooled connection.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;
use usvc_core::{token::unix_now, PasswordHash, Role, RoleId, User, UserId};

use super::{CredentialStore, NewUser, StoreError, UserChanges};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        email         TEXT    NOT NULL UNIQUE,
        full_name     TEXT    NOT NULL,
        password_hash TEXT    NOT NULL,
        created_at    INTEGER NOT NULL,
        updated_at    INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT    NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
];

const USER_COLUMNS: &str = "id, email, full_name, password_hash, created_at, updated_at";

/// [`CredentialStore`] persisted in a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the directory, the file, or the
    /// schema cannot be created.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("open", e))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }

        info!("credential database ready at {}", path.display());
        Ok(Self { pool })
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let now = to_db(unix_now());
        let row = sqlx::query(&format!(
            "INSERT INTO users (email, full_name, password_hash, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(new_user.password_hash.as_phc())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("email {} already registered", new_user.email))
            } else {
                map_sqlx_error("create_user", e)
            }
        })?;
        user_from_row(&row)
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let Some(id) = id_to_db(id.get()) else {
            return Err(StoreError::NotFound);
        };
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user_by_id", e))?
            .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user_by_email", e))?
            .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError> {
        let Some(id) = id_to_db(id.get()) else {
            return Err(StoreError::NotFound);
        };
        let row = sqlx::query(&format!(
            "UPDATE users SET \
                 full_name = COALESCE(?1, full_name), \
                 password_hash = COALESCE(?2, password_hash), \
                 updated_at = ?3 \
             WHERE id = ?4 RETURNING {USER_COLUMNS}"
        ))
        .bind(changes.full_name)
        .bind(changes.password_hash.map(|h| h.as_phc().to_string()))
        .bind(to_db(unix_now()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?
        .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let Some(id) = id_to_db(id.get()) else {
            return Err(StoreError::NotFound);
        };
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        let row = sqlx::query("INSERT INTO roles (name) VALUES (?1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("role {name} already exists"))
                } else {
                    map_sqlx_error("create_role", e)
                }
            })?;
        role_from_row(&row)
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Role, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role_by_name", e))?
            .ok_or(StoreError::NotFound)?;
        role_from_row(&row)
    }

    async fn assign_role_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let (Some(user_id), Some(role_id)) = (id_to_db(user_id.get()), id_to_db(role_id.get()))
        else {
            return Err(StoreError::NotFound);
        };
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2) \
             ON CONFLICT (user_id, role_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound
            } else {
                map_sqlx_error("assign_role_to_user", e)
            }
        })?;
        Ok(())
    }

    async fn get_user_roles(&self, user_id: UserId) -> Result<Vec<Role>, StoreError> {
        let Some(user_id) = id_to_db(user_id.get()) else {
            return Err(StoreError::NotFound);
        };
        let exists = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user_roles", e))?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        let rows = sqlx::query(
            "SELECT roles.id, roles.name FROM roles \
             JOIN user_roles ON user_roles.role_id = roles.id \
             WHERE user_roles.user_id = ?1 ORDER BY roles.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user_roles", e))?;
        rows.iter().map(role_from_row).collect()
    }
}

// ── Row mapping ───────────────────────────────────────────────────────────────

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::new(from_db(column(row, "id")?)),
        email: column(row, "email")?,
        full_name: column(row, "full_name")?,
        password_hash: PasswordHash::from_phc(column::<String>(row, "password_hash")?),
        created_at: from_db(column(row, "created_at")?),
        updated_at: from_db(column(row, "updated_at")?),
    })
}

fn role_from_row(row: &SqliteRow) -> Result<Role, StoreError> {
    Ok(Role {
        id: RoleId::new(from_db(column(row, "id")?)),
        name: column(row, "name")?,
    })
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Backend(format!("failed to read column {name}: {e}")))
}

/// SQLite integers are signed; ids above `i64::MAX` cannot exist in the table.
fn id_to_db(raw: u64) -> Option<i64> {
    i64::try_from(raw).ok()
}

fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

// ── Error mapping ─────────────────────────────────────────────────────────────

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
