use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Roles a user can hold. The set is closed; custom roles are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    Contributor,
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Moderator, Role::Contributor, Role::User];

    /// Display priority, 1 is highest.
    pub fn priority(self) -> u8 {
        match self {
            Role::Admin => 1,
            Role::Moderator => 2,
            Role::Contributor => 3,
            Role::User => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Contributor => "contributor",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "contributor" => Ok(Role::Contributor),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Reduce a role set to the rank of its highest-priority member.
/// A set with no elevated role ranks as a plain user.
pub fn resolve_rank(roles: &[Role]) -> u8 {
    if roles.contains(&Role::Admin) {
        Role::Admin.priority()
    } else if roles.contains(&Role::Moderator) {
        Role::Moderator.priority()
    } else if roles.contains(&Role::Contributor) {
        Role::Contributor.priority()
    } else {
        Role::User.priority()
    }
}

/// Anything carrying a role set can be ordered by role priority.
pub trait HasRoles {
    fn roles(&self) -> &[Role];
}

/// Sort ascending by resolved rank. `sort_by_key` is stable, so users with
/// the same rank keep their input order.
pub fn sort_by_role_priority<T: HasRoles>(items: &mut [T]) {
    items.sort_by_key(|item| resolve_rank(item.roles()));
}
