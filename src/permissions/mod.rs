//! Permission system for checking user roles.
//!
//! Provides the [`RoleLookup`](crate::router::RoleLookup) the access gate
//! consults for developer-only and admin-only routes.
//!
//! ## Features
//!
//! - Cached admin lookups (reduces API hits)
//! - Developer bypass

mod checker;

pub use checker::Permissions;
