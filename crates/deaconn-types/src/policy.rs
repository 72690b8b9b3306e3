//! Authorization policy.
//!
//! Every access decision lives here. Handlers call these predicates to
//! enforce mutations and to report `Capabilities` for the UI, so the two
//! paths can never disagree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RequestStatus;
use crate::roles::Role;

/// The authenticated caller of a request, loaded fresh from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub roles: Vec<Role>,
    pub is_root: bool,
    pub is_restricted: bool,
}

/// Affordances the caller may use on a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_delete: bool,
}

pub fn has_role(session: Option<&Session>, role: Role) -> bool {
    session.is_some_and(|s| s.roles.contains(&role))
}

pub fn is_owner(owner_id: Uuid, current_id: Uuid) -> bool {
    owner_id == current_id
}

fn owns(session: Option<&Session>, owner_id: Uuid) -> bool {
    session.is_some_and(|s| is_owner(owner_id, s.user_id))
}

/// Root users hold every administrative capability.
pub fn is_admin(session: Option<&Session>) -> bool {
    session.is_some_and(|s| s.is_root) || has_role(session, Role::Admin)
}

pub fn is_staff(session: Option<&Session>) -> bool {
    is_admin(session) || has_role(session, Role::Moderator)
}

fn unrestricted(session: Option<&Session>) -> bool {
    session.is_some_and(|s| !s.is_restricted)
}

// -- Articles --

pub fn can_create_article(session: Option<&Session>) -> bool {
    unrestricted(session) && (is_staff(session) || has_role(session, Role::Contributor))
}

pub fn can_edit_article(session: Option<&Session>, author_id: Uuid) -> bool {
    owns(session, author_id) || is_staff(session)
}

pub fn article_capabilities(session: Option<&Session>, author_id: Uuid) -> Capabilities {
    let allowed = can_edit_article(session, author_id);
    Capabilities { can_edit: allowed, can_delete: allowed }
}

// -- Admin-managed content: services, partners, categories, logs --

pub fn can_manage_site(session: Option<&Session>) -> bool {
    is_admin(session)
}

pub fn site_capabilities(session: Option<&Session>) -> Capabilities {
    let allowed = can_manage_site(session);
    Capabilities { can_edit: allowed, can_delete: allowed }
}

// -- Requests --

pub fn can_create_request(session: Option<&Session>) -> bool {
    unrestricted(session)
}

pub fn can_view_request(session: Option<&Session>, owner_id: Uuid) -> bool {
    owns(session, owner_id) || is_staff(session)
}

pub fn can_list_all_requests(session: Option<&Session>) -> bool {
    is_staff(session)
}

pub fn can_reply_to_request(session: Option<&Session>, owner_id: Uuid, status: RequestStatus) -> bool {
    unrestricted(session)
        && can_view_request(session, owner_id)
        && (status != RequestStatus::Completed || is_staff(session))
}

/// Owners may edit the title and content of their own request.
pub fn can_edit_request(session: Option<&Session>, owner_id: Uuid) -> bool {
    (owns(session, owner_id) && unrestricted(session)) || is_staff(session)
}

/// Status and acceptance are decided by staff only.
pub fn can_moderate_request(session: Option<&Session>) -> bool {
    is_staff(session)
}

pub fn can_delete_request(session: Option<&Session>, owner_id: Uuid) -> bool {
    owns(session, owner_id) || is_admin(session)
}

pub fn can_delete_reply(session: Option<&Session>, author_id: Uuid) -> bool {
    owns(session, author_id) || is_staff(session)
}

pub fn request_capabilities(session: Option<&Session>, owner_id: Uuid) -> Capabilities {
    Capabilities {
        can_edit: can_edit_request(session, owner_id),
        can_delete: can_delete_request(session, owner_id),
    }
}

// -- Profiles --

/// Profile fields and experience/skill/project records. A root user's
/// profile is editable only by that user and other root users.
pub fn can_edit_profile(session: Option<&Session>, user_id: Uuid, target_is_root: bool) -> bool {
    if owns(session, user_id) {
        return true;
    }
    if target_is_root {
        session.is_some_and(|s| s.is_root)
    } else {
        is_staff(session)
    }
}

pub fn profile_capabilities(session: Option<&Session>, user_id: Uuid, target_is_root: bool) -> Capabilities {
    let allowed = can_edit_profile(session, user_id, target_is_root);
    Capabilities { can_edit: allowed, can_delete: allowed }
}

pub fn can_list_users(session: Option<&Session>) -> bool {
    is_admin(session)
}

/// Role and flag changes. Root users can only be changed by root users.
pub fn can_manage_user(session: Option<&Session>, target_is_root: bool) -> bool {
    if target_is_root {
        session.is_some_and(|s| s.is_root)
    } else {
        is_admin(session)
    }
}

// -- Files --

pub fn can_upload(session: Option<&Session>) -> bool {
    unrestricted(session)
}
