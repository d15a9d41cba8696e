use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    PlaceOrders,
    ViewLedger,
    RegisterClients,
    ManageCatalog,

    ManageEvents,
    DeleteOrders,
    SettleLedger,
    RegisterUsers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Role {
    Staff,
    Manager,
}

static STAFF_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::PlaceOrders);
    permissions.insert(Permission::ViewLedger);
    permissions.insert(Permission::RegisterClients);
    permissions.insert(Permission::ManageCatalog);

    permissions
});

static MANAGER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(STAFF_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageEvents);
    permissions.insert(Permission::DeleteOrders);
    permissions.insert(Permission::SettleLedger);
    permissions.insert(Permission::RegisterUsers);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Staff => &STAFF_PERMISSIONS,
            Role::Manager => &MANAGER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
