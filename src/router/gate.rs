//! Access gate.
//!
//! Checks run in a fixed order and stop at the first failure:
//! inactive, private-only, group-only, developer-only, admin-only. The admin
//! lookup is the only remote call and only runs when a route asks for it.

use std::fmt;

use tracing::{debug, warn};

use super::collab::RoleLookup;
use super::descriptor::Access;
use super::event::{ActorContext, ChatKind};

/// Why a route was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Disabled,
    WrongChatKind,
    NotAuthorized,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::WrongChatKind => f.write_str("wrong chat kind"),
            Self::NotAuthorized => f.write_str("not authorized"),
        }
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Evaluate `access` for `actor`.
///
/// Never fails: an admin lookup error counts as a denial.
pub async fn authorize(access: &Access, actor: &ActorContext, roles: &dyn RoleLookup) -> Decision {
    if access.inactive {
        return Decision::Deny(DenyReason::Disabled);
    }

    if access.private_only && actor.chat_kind != ChatKind::Private {
        return Decision::Deny(DenyReason::WrongChatKind);
    }

    if access.group_only && !actor.chat_kind.is_group_like() {
        return Decision::Deny(DenyReason::WrongChatKind);
    }

    if access.dev_only && !roles.developer_set().contains(&actor.actor_id) {
        return Decision::Deny(DenyReason::NotAuthorized);
    }

    if access.admin_only {
        match roles.is_chat_admin(actor.chat_id, actor.actor_id).await {
            Ok(true) => {}
            Ok(false) => return Decision::Deny(DenyReason::NotAuthorized),
            Err(e) => {
                warn!(
                    "Admin lookup failed for user {} in chat {}: {}",
                    actor.actor_id, actor.chat_id, e
                );
                return Decision::Deny(DenyReason::NotAuthorized);
            }
        }
    }

    debug!("Access granted to user {} in chat {}", actor.actor_id, actor.chat_id);
    Decision::Allow
}
