use std::collections::BTreeMap;

use globset::{Glob, GlobSet, GlobSetBuilder};

pub const UPDATE_OWN: &str = "applications.update_own";
pub const UPDATE_ALL: &str = "applications.update_all";

/// Permission probe the coordinator consults before lifecycle
/// transitions. Role lookup and caching live behind this seam.
pub trait PermissionCheck {
    fn has_permission(&self, subject: &str, permission: &str) -> bool;
}

/// Grants everything; offline and single-user tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn has_permission(&self, _subject: &str, _permission: &str) -> bool {
        true
    }
}

#[derive(Debug)]
struct GrantSet {
    allow: GlobSet,
    deny: GlobSet,
}

/// Role-based grants: each role carries allow and deny permission
/// patterns, deny winning; each subject maps to one role.
#[derive(Debug, Default)]
pub struct RoleGrants {
    roles: BTreeMap<String, GrantSet>,
    assignments: BTreeMap<String, String>,
}

impl RoleGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a role with allow/deny permission glob patterns.
    pub fn role(
        mut self,
        name: impl Into<String>,
        allow: &[&str],
        deny: &[&str],
    ) -> Result<Self, globset::Error> {
        let grants = GrantSet {
            allow: build_set(allow)?,
            deny: build_set(deny)?,
        };
        self.roles.insert(name.into(), grants);
        Ok(self)
    }

    /// Assigns a subject to a declared role.
    pub fn assign(mut self, subject: impl Into<String>, role: impl Into<String>) -> Self {
        self.assignments.insert(subject.into(), role.into());
        self
    }
}

impl PermissionCheck for RoleGrants {
    fn has_permission(&self, subject: &str, permission: &str) -> bool {
        let Some(role) = self.assignments.get(subject) else {
            return false;
        };
        let Some(grants) = self.roles.get(role) else {
            return false;
        };
        if grants.deny.is_match(permission) {
            return false;
        }
        grants.allow.is_match(permission)
    }
}

impl<P: PermissionCheck + ?Sized> PermissionCheck for &P {
    fn has_permission(&self, subject: &str, permission: &str) -> bool {
        (**self).has_permission(subject, permission)
    }
}

fn build_set(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
