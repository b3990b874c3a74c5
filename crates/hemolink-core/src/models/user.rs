//! User accounts, roles, and per-screen permission templates.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Fixed role enumeration. A user has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    NonConformingStaff,
    InventoryStaff,
    Scheduler,
}

/// Screens permission flags are tracked against.
pub const SCREENS: &[&str] = &[
    "dashboard",
    "blood_stock",
    "non_conforming",
    "releasing",
    "discarding",
    "donors",
    "sync_review",
    "partnerships",
    "notifications",
    "reports",
    "user_management",
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::NonConformingStaff => "Non-Conforming Staff",
            Role::InventoryStaff => "Inventory Staff",
            Role::Scheduler => "Scheduler",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Admin" => Some(Role::Admin),
            "Non-Conforming Staff" => Some(Role::NonConformingStaff),
            "Inventory Staff" => Some(Role::InventoryStaff),
            "Scheduler" => Some(Role::Scheduler),
            _ => None,
        }
    }

    /// The default permission template for this role, covering every screen.
    ///
    /// Role changes recreate the whole set from this template; existing rows
    /// are never patched incrementally.
    pub fn default_permissions(&self) -> Vec<ScreenPermission> {
        SCREENS
            .iter()
            .map(|&screen| {
                let grant = match self {
                    Role::Admin => ScreenGrant::Full,
                    Role::NonConformingStaff => match screen {
                        "dashboard" | "notifications" => ScreenGrant::ViewOnly,
                        "non_conforming" => ScreenGrant::Full,
                        "discarding" => ScreenGrant::Operate,
                        _ => ScreenGrant::Hidden,
                    },
                    Role::InventoryStaff => match screen {
                        "dashboard" | "notifications" | "reports" => ScreenGrant::ViewOnly,
                        "blood_stock" | "releasing" | "discarding" | "donors" => {
                            ScreenGrant::Operate
                        }
                        _ => ScreenGrant::Hidden,
                    },
                    Role::Scheduler => match screen {
                        "dashboard" | "notifications" => ScreenGrant::ViewOnly,
                        "partnerships" => ScreenGrant::Full,
                        _ => ScreenGrant::Hidden,
                    },
                };
                ScreenPermission::from_grant(screen, grant)
            })
            .collect()
    }
}

/// Grant tiers used by the role templates.
enum ScreenGrant {
    Full,
    Operate,
    ViewOnly,
    Hidden,
}

/// Per-user, per-screen permission flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenPermission {
    pub screen: String,
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_visible: bool,
}

impl ScreenPermission {
    fn from_grant(screen: &str, grant: ScreenGrant) -> Self {
        let (view, create, edit, delete, visible) = match grant {
            ScreenGrant::Full => (true, true, true, true, true),
            ScreenGrant::Operate => (true, true, true, false, true),
            ScreenGrant::ViewOnly => (true, false, false, false, true),
            ScreenGrant::Hidden => (false, false, false, false, false),
        };
        Self {
            screen: screen.to_string(),
            can_view: view,
            can_create: create,
            can_edit: edit,
            can_delete: delete,
            is_visible: visible,
        }
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    /// `salt$hexdigest` (SHA-256).
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub activation_token: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl UserAccount {
    /// Create an inactive account with a fresh activation token.
    pub fn new(email: String, password_hash: String, full_name: String, role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash,
            full_name,
            role,
            is_active: false,
            activation_token: Some(uuid::Uuid::new_v4().to_string()),
            last_login: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A 6-digit password reset code, single-use, 15-minute expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetCode {
    pub id: String,
    pub email: String,
    pub code: String,
    pub expires_at: String,
    pub used: bool,
    pub created_at: String,
}
