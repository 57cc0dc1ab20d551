// SPDX-License-Identifier: MIT

//! Permission levels gating which JSON-RPC methods an agent may invoke.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
    Admin,
}

crate::simple_display! {
    Permission {
        Read => "read",
        Write => "write",
        Admin => "admin",
    }
}

/// The set of permissions a connection is currently allowed to exercise.
#[derive(Debug, Clone)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn all() -> Self {
        Self([Permission::Read, Permission::Write, Permission::Admin].into_iter().collect())
    }

    pub fn none() -> Self {
        Self(HashSet::new())
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
