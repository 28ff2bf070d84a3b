//! Access policy: who is calling and what they may do with a group.
//!
//! The caller is always passed in explicitly as a [`Caller`] value; nothing in
//! the catalog reads identity from ambient state.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::model::ArtGroup;

/// Global role of a caller, independent of any particular group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Anonymous,
    Designer,
    Admin,
}

/// Identity of whoever issued the current call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Option<String>,
    pub role: Role,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { id: None, role: Role::Anonymous }
    }

    pub fn designer(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), role: Role::Designer }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A caller's relationship to one specific group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Admin,
    Owner,
    Designer,
    Anonymous,
}

/// Resolves `roleOf(callerId)`
pub trait RoleDirectory: Send + Sync {
    fn role_of(&self, caller_id: &str) -> Role;
}

/// Role directory backed by a fixed set of admin ids
///
/// Every other authenticated id is treated as a designer.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
    admins: HashSet<String>,
}

impl StaticRoleDirectory {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { admins: admins.into_iter().map(Into::into).collect() }
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn role_of(&self, caller_id: &str) -> Role {
        if self.admins.contains(caller_id) {
            Role::Admin
        } else {
            Role::Designer
        }
    }
}

/// Builds a caller from an optional forwarded id
pub fn resolve_caller(directory: &dyn RoleDirectory, caller_id: Option<&str>) -> Caller {
    match caller_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => Caller { id: Some(id.to_string()), role: directory.role_of(id) },
        None => Caller::anonymous(),
    }
}

pub fn relation(caller: &Caller, group: &ArtGroup) -> Relation {
    match caller.role {
        Role::Admin => Relation::Admin,
        Role::Anonymous => Relation::Anonymous,
        Role::Designer if caller.id.as_deref() == Some(group.designer_id.as_str()) => Relation::Owner,
        Role::Designer => Relation::Designer,
    }
}

/// Hidden groups exist only for their owner and admins
pub fn can_view(caller: &Caller, group: &ArtGroup) -> bool {
    group.is_visible || matches!(relation(caller, group), Relation::Admin | Relation::Owner)
}

pub fn can_modify(caller: &Caller, group: &ArtGroup) -> bool {
    matches!(relation(caller, group), Relation::Admin | Relation::Owner)
}

/// Checks owner-or-admin rights on a group.
///
/// Callers that may not even see the group get `NotFound` so hidden content
/// never leaks through a mutation endpoint.
pub fn ensure_can_modify(caller: &Caller, group: &ArtGroup) -> Result<()> {
    if !can_view(caller, group) {
        return Err(AppError::NotFound(format!("group {}", group.id)));
    }
    if !can_modify(caller, group) {
        return Err(AppError::PermissionDenied(format!(
            "only the owner or an admin may modify group {}",
            group.id
        )));
    }
    Ok(())
}

pub fn ensure_admin(caller: &Caller, action: &str) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!("{action} requires an admin")))
    }
}

/// Returns the authenticated id, rejecting anonymous callers
pub fn ensure_authenticated(caller: &Caller) -> Result<&str> {
    match (&caller.id, caller.role) {
        (Some(id), Role::Designer | Role::Admin) => Ok(id.as_str()),
        _ => Err(AppError::PermissionDenied("sign in required".to_string())),
    }
}
