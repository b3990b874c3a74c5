//! Access control: accounts, activation, login audit, password reset, and
//! per-screen permissions.
//!
//! State-conflict transitions (activating an active account, re-running a
//! settled change) are uniform no-op successes whose return values name the
//! outcome, so callers can still distinguish them.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::db::{self, Database, DbError};
use crate::models::{ResetCode, Role, ScreenPermission, UserAccount};

/// Minutes a password reset code stays valid.
const RESET_CODE_TTL_MINUTES: i64 = 15;

/// Minimum password length accepted at registration and reset.
const MIN_PASSWORD_LEN: usize = 8;

/// Access control errors.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Reset code is invalid")]
    InvalidResetCode,

    #[error("Reset code has expired")]
    ResetCodeExpired,
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Outcome of an activation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated,
    AlreadyActive,
}

/// Access-control workflow over the center database.
pub struct AccessControl<'a> {
    db: &'a mut Database,
}

impl<'a> AccessControl<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Register an inactive account with a fresh activation token and the
    /// role's default permission set.
    pub fn register(
        &mut self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> AccessResult<UserAccount> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AccessError::Validation {
                field: "email",
                reason: "a valid email address is required".into(),
            });
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AccessError::Validation {
                field: "password",
                reason: format!("must be at least {} characters", MIN_PASSWORD_LEN),
            });
        }
        if full_name.trim().is_empty() {
            return Err(AccessError::Validation {
                field: "full_name",
                reason: "full name is required".into(),
            });
        }
        if db::users::get_user_by_email(self.db.conn(), email)?.is_some() {
            return Err(AccessError::Validation {
                field: "email",
                reason: "email is already registered".into(),
            });
        }

        let user = UserAccount::new(
            email.to_string(),
            hash_password(password),
            full_name.trim().to_string(),
            role,
        );
        let tx = self.db.transaction()?;
        db::users::insert_user(&tx, &user)?;
        db::users::replace_permissions(&tx, &user.id, &role.default_permissions())?;
        tx.commit().map_err(DbError::from)?;

        info!(user_id = %user.id, role = role.as_str(), "account registered, awaiting activation");
        Ok(user)
    }

    /// Admin activation. Activating an already-active account is a no-op
    /// success distinguished by the outcome value.
    pub fn activate(&mut self, user_id: &str) -> AccessResult<ActivationOutcome> {
        let user = db::users::get_user(self.db.conn(), user_id)?
            .ok_or_else(|| AccessError::NotFound(user_id.to_string()))?;
        if user.is_active {
            return Ok(ActivationOutcome::AlreadyActive);
        }
        db::users::set_user_active(self.db.conn(), user_id)?;
        info!(user_id = %user_id, "account activated");
        Ok(ActivationOutcome::Activated)
    }

    /// Admin rejection of a registration: the row is deleted.
    pub fn reject(&mut self, user_id: &str) -> AccessResult<()> {
        let deleted = db::users::delete_user(self.db.conn(), user_id)?;
        if !deleted {
            return Err(AccessError::NotFound(user_id.to_string()));
        }
        info!(user_id = %user_id, "registration rejected");
        Ok(())
    }

    /// Login: requires an active account and a matching password. Stamps
    /// `last_login` and appends a login audit row.
    pub fn login(&mut self, email: &str, password: &str) -> AccessResult<UserAccount> {
        let user = db::users::get_user_by_email(self.db.conn(), email.trim())?
            .ok_or(AccessError::InvalidCredentials)?;
        if !user.is_active {
            return Err(AccessError::AccountInactive);
        }
        if !verify_password(password, &user.password_hash) {
            return Err(AccessError::InvalidCredentials);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.db.transaction()?;
        db::users::update_last_login(&tx, &user.id, &now)?;
        db::users::append_auth_event(&tx, &user.id, "login")?;
        tx.commit().map_err(DbError::from)?;

        db::users::get_user(self.db.conn(), &user.id)?
            .ok_or_else(|| AccessError::NotFound(user.id.clone()))
    }

    /// Logout: appends the matching audit row.
    pub fn logout(&mut self, user_id: &str) -> AccessResult<()> {
        db::users::get_user(self.db.conn(), user_id)?
            .ok_or_else(|| AccessError::NotFound(user_id.to_string()))?;
        db::users::append_auth_event(self.db.conn(), user_id, "logout")?;
        Ok(())
    }

    /// Issue a password reset code for an email on file.
    pub fn request_password_reset(&mut self, email: &str) -> AccessResult<ResetCode> {
        let email = email.trim();
        db::users::get_user_by_email(self.db.conn(), email)?
            .ok_or_else(|| AccessError::NotFound(email.to_string()))?;

        let now = Utc::now();
        let code = ResetCode {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            code: derive_reset_code(),
            expires_at: (now + Duration::minutes(RESET_CODE_TTL_MINUTES)).to_rfc3339(),
            used: false,
            created_at: now.to_rfc3339(),
        };
        db::users::insert_reset_code(self.db.conn(), &code)?;
        Ok(code)
    }

    /// Consume a reset code and set the new password. Codes are scoped by
    /// email, single-use, and expire after fifteen minutes.
    pub fn reset_password(
        &mut self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AccessResult<()> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AccessError::Validation {
                field: "password",
                reason: format!("must be at least {} characters", MIN_PASSWORD_LEN),
            });
        }

        let email = email.trim();
        let reset = db::users::get_unused_reset_code(self.db.conn(), email, code)?
            .ok_or(AccessError::InvalidResetCode)?;

        let expires: chrono::DateTime<Utc> = reset
            .expires_at
            .parse()
            .map_err(|_| AccessError::InvalidResetCode)?;
        if Utc::now() > expires {
            return Err(AccessError::ResetCodeExpired);
        }

        let tx = self.db.transaction()?;
        db::users::mark_reset_code_used(&tx, &reset.id)?;
        db::users::update_password_hash(&tx, email, &hash_password(new_password))?;
        tx.commit().map_err(DbError::from)?;

        info!(email = %email, "password reset completed");
        Ok(())
    }

    /// Change a user's role, recreating the permission set from the new
    /// role's template. A same-role change is a no-op success.
    pub fn change_role(&mut self, user_id: &str, role: Role) -> AccessResult<UserAccount> {
        let user = db::users::get_user(self.db.conn(), user_id)?
            .ok_or_else(|| AccessError::NotFound(user_id.to_string()))?;
        if user.role == role {
            return Ok(user);
        }

        let tx = self.db.transaction()?;
        db::users::update_user_role(&tx, user_id, role)?;
        db::users::replace_permissions(&tx, user_id, &role.default_permissions())?;
        tx.commit().map_err(DbError::from)?;

        info!(user_id = %user_id, role = role.as_str(), "role changed, permissions regenerated");
        db::users::get_user(self.db.conn(), user_id)?
            .ok_or_else(|| AccessError::NotFound(user_id.to_string()))
    }

    /// A user's current permission flags.
    pub fn permissions(&self, user_id: &str) -> AccessResult<Vec<ScreenPermission>> {
        Ok(db::users::list_permissions(self.db.conn(), user_id)?)
    }
}

/// Hash a password with a fresh random salt: `salt$hexdigest`.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

/// Check a password against a stored `salt$hexdigest` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => digest(salt, password) == hash,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive a 6-digit numeric code from random bytes.
fn derive_reset_code() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    let n = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    format!("{:06}", n % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse battery");
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong", &hash));

        // Fresh salt every time
        assert_ne!(hash, hash_password("correct horse battery"));
    }

    #[test]
    fn test_reset_code_shape() {
        for _ in 0..20 {
            let code = derive_reset_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_register_then_login_requires_activation() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);

        let user = access
            .register("staff@center.example", "hunter2hunter2", "Staff", Role::InventoryStaff)
            .unwrap();
        assert!(!user.is_active);

        let err = access
            .login("staff@center.example", "hunter2hunter2")
            .unwrap_err();
        assert!(matches!(err, AccessError::AccountInactive));

        assert_eq!(access.activate(&user.id).unwrap(), ActivationOutcome::Activated);
        assert_eq!(
            access.activate(&user.id).unwrap(),
            ActivationOutcome::AlreadyActive
        );

        let logged_in = access
            .login("staff@center.example", "hunter2hunter2")
            .unwrap();
        assert!(logged_in.last_login.is_some());
    }

    #[test]
    fn test_login_audit_rows() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);
        let user = access
            .register("a@center.example", "hunter2hunter2", "A", Role::Admin)
            .unwrap();
        access.activate(&user.id).unwrap();
        access.login("a@center.example", "hunter2hunter2").unwrap();
        access.logout(&user.id).unwrap();

        let events = db.list_auth_events(&user.id).unwrap();
        let kinds: Vec<&str> = events.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(kinds, vec!["login", "logout"]);
    }

    #[test]
    fn test_wrong_password_and_unknown_email_look_identical() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);
        let user = access
            .register("a@center.example", "hunter2hunter2", "A", Role::Admin)
            .unwrap();
        access.activate(&user.id).unwrap();

        let wrong = access.login("a@center.example", "nope-nope").unwrap_err();
        let unknown = access.login("b@center.example", "whatever-pw").unwrap_err();
        assert!(matches!(wrong, AccessError::InvalidCredentials));
        assert!(matches!(unknown, AccessError::InvalidCredentials));
    }

    #[test]
    fn test_reset_code_single_use() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);
        let user = access
            .register("a@center.example", "hunter2hunter2", "A", Role::Admin)
            .unwrap();
        access.activate(&user.id).unwrap();

        let code = access.request_password_reset("a@center.example").unwrap();
        access
            .reset_password("a@center.example", &code.code, "new-password-1")
            .unwrap();

        // Old password no longer works; new one does
        assert!(access.login("a@center.example", "hunter2hunter2").is_err());
        access.login("a@center.example", "new-password-1").unwrap();

        // Second use of the same code fails
        let err = access
            .reset_password("a@center.example", &code.code, "another-pass-2")
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidResetCode));
    }

    #[test]
    fn test_expired_reset_code() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);
        let user = access
            .register("a@center.example", "hunter2hunter2", "A", Role::Admin)
            .unwrap();
        access.activate(&user.id).unwrap();

        let expired = ResetCode {
            id: "rc-old".into(),
            email: "a@center.example".into(),
            code: "111222".into(),
            expires_at: (Utc::now() - Duration::minutes(1)).to_rfc3339(),
            used: false,
            created_at: (Utc::now() - Duration::minutes(16)).to_rfc3339(),
        };
        db::users::insert_reset_code(access.db.conn(), &expired).unwrap();

        let err = access
            .reset_password("a@center.example", "111222", "new-password-1")
            .unwrap_err();
        assert!(matches!(err, AccessError::ResetCodeExpired));
    }

    #[test]
    fn test_change_role_regenerates_permissions() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);
        let user = access
            .register("a@center.example", "hunter2hunter2", "A", Role::Scheduler)
            .unwrap();

        let perms = access.permissions(&user.id).unwrap();
        assert!(perms.iter().find(|p| p.screen == "partnerships").unwrap().can_create);

        let updated = access.change_role(&user.id, Role::NonConformingStaff).unwrap();
        assert_eq!(updated.role, Role::NonConformingStaff);

        let perms = access.permissions(&user.id).unwrap();
        assert!(!perms.iter().find(|p| p.screen == "partnerships").unwrap().is_visible);
        assert!(perms.iter().find(|p| p.screen == "non_conforming").unwrap().can_delete);
    }

    #[test]
    fn test_duplicate_email_rejected_at_validation() {
        let mut db = setup_db();
        let mut access = AccessControl::new(&mut db);
        access
            .register("a@center.example", "hunter2hunter2", "A", Role::Admin)
            .unwrap();

        let err = access
            .register("a@center.example", "hunter2hunter2", "B", Role::Scheduler)
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation { field: "email", .. }));
    }
}
