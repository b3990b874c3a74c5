//! User account, permission, reset-code, and auth-audit operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{ResetCode, Role, ScreenPermission, UserAccount};

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, role, is_active, activation_token, last_login, created_at";

/// Intermediate row struct for database mapping.
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    full_name: String,
    role: String,
    is_active: i64,
    activation_token: Option<String>,
    last_login: Option<String>,
    created_at: String,
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get(3)?,
        role: row.get(4)?,
        is_active: row.get(5)?,
        activation_token: row.get(6)?,
        last_login: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl TryFrom<UserRow> for UserAccount {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", row.role)))?;
        Ok(UserAccount {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role,
            is_active: row.is_active != 0,
            activation_token: row.activation_token,
            last_login: row.last_login,
            created_at: row.created_at,
        })
    }
}

/// Insert a user account.
pub fn insert_user(conn: &Connection, user: &UserAccount) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO users (
            id, email, password_hash, full_name, role, is_active,
            activation_token, last_login, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            user.id,
            user.email,
            user.password_hash,
            user.full_name,
            user.role.as_str(),
            user.is_active as i64,
            user.activation_token,
            user.last_login,
            user.created_at,
        ],
    )?;
    Ok(())
}

/// Get a user by id.
pub fn get_user(conn: &Connection, id: &str) -> DbResult<Option<UserAccount>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
        [id],
        map_user_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Get a user by email.
pub fn get_user_by_email(conn: &Connection, email: &str) -> DbResult<Option<UserAccount>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
        [email],
        map_user_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Flip a user active. Returns whether a row changed.
pub fn set_user_active(conn: &Connection, id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute("UPDATE users SET is_active = 1 WHERE id = ?", [id])?;
    Ok(rows_affected > 0)
}

/// Delete a user account (registration rejection).
pub fn delete_user(conn: &Connection, id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute("DELETE FROM users WHERE id = ?", [id])?;
    Ok(rows_affected > 0)
}

/// Stamp `last_login`.
pub fn update_last_login(conn: &Connection, id: &str, at: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        params![id, at],
    )?;
    Ok(rows_affected > 0)
}

/// Update a user's role.
pub fn update_user_role(conn: &Connection, id: &str, role: Role) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE users SET role = ?2 WHERE id = ?1",
        params![id, role.as_str()],
    )?;
    Ok(rows_affected > 0)
}

/// Update a user's password hash by email.
pub fn update_password_hash(conn: &Connection, email: &str, hash: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE email = ?1",
        params![email, hash],
    )?;
    Ok(rows_affected > 0)
}

/// Recreate a user's permission set from scratch.
///
/// Old rows are deleted, never patched; role changes regenerate wholesale.
pub fn replace_permissions(
    conn: &Connection,
    user_id: &str,
    permissions: &[ScreenPermission],
) -> DbResult<()> {
    conn.execute("DELETE FROM user_permissions WHERE user_id = ?", [user_id])?;
    for p in permissions {
        conn.execute(
            r#"
            INSERT INTO user_permissions (
                user_id, screen, can_view, can_create, can_edit, can_delete, is_visible
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user_id,
                p.screen,
                p.can_view as i64,
                p.can_create as i64,
                p.can_edit as i64,
                p.can_delete as i64,
                p.is_visible as i64,
            ],
        )?;
    }
    Ok(())
}

/// List a user's permission flags.
pub fn list_permissions(conn: &Connection, user_id: &str) -> DbResult<Vec<ScreenPermission>> {
    let mut stmt = conn.prepare(
        "SELECT screen, can_view, can_create, can_edit, can_delete, is_visible
         FROM user_permissions WHERE user_id = ? ORDER BY screen",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(ScreenPermission {
            screen: row.get(0)?,
            can_view: row.get::<_, i64>(1)? != 0,
            can_create: row.get::<_, i64>(2)? != 0,
            can_edit: row.get::<_, i64>(3)? != 0,
            can_delete: row.get::<_, i64>(4)? != 0,
            is_visible: row.get::<_, i64>(5)? != 0,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ============================================================================
// Password reset codes
// ============================================================================

/// Insert a reset code.
pub fn insert_reset_code(conn: &Connection, code: &ResetCode) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO password_reset_codes (id, email, code, expires_at, used, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            code.id,
            code.email,
            code.code,
            code.expires_at,
            code.used as i64,
            code.created_at,
        ],
    )?;
    Ok(())
}

/// Get the unused reset code matching an email + code pair, if any.
pub fn get_unused_reset_code(
    conn: &Connection,
    email: &str,
    code: &str,
) -> DbResult<Option<ResetCode>> {
    conn.query_row(
        "SELECT id, email, code, expires_at, used, created_at
         FROM password_reset_codes
         WHERE email = ?1 AND code = ?2 AND used = 0
         ORDER BY created_at DESC LIMIT 1",
        params![email, code],
        |row| {
            Ok(ResetCode {
                id: row.get(0)?,
                email: row.get(1)?,
                code: row.get(2)?,
                expires_at: row.get(3)?,
                used: row.get::<_, i64>(4)? != 0,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Mark a reset code consumed.
pub fn mark_reset_code_used(conn: &Connection, id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE password_reset_codes SET used = 1 WHERE id = ?",
        [id],
    )?;
    Ok(rows_affected > 0)
}

// ============================================================================
// Auth audit
// ============================================================================

/// Append a login/logout event.
pub fn append_auth_event(conn: &Connection, user_id: &str, event: &str) -> DbResult<()> {
    conn.execute(
        "INSERT INTO auth_audit_log (user_id, event) VALUES (?1, ?2)",
        params![user_id, event],
    )?;
    Ok(())
}

impl Database {
    /// List login/logout events for a user, oldest first.
    pub fn list_auth_events(&self, user_id: &str) -> DbResult<Vec<(String, String)>> {
        let mut stmt = self.conn().prepare(
            "SELECT event, occurred_at FROM auth_audit_log WHERE user_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all user accounts.
    pub fn list_users(&self) -> DbResult<Vec<UserAccount>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS))?;
        let rows = stmt.query_map([], map_user_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.try_into()?);
        }
        Ok(users)
    }
}
