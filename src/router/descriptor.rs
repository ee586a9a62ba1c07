//! Routing metadata.
//!
//! A [`Route`] is what a plugin declares; the registry turns each active
//! route into an immutable [`HandlerDescriptor`] it owns for the lifetime
//! of the process.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::handler::{
    EntryPoint, HandlerResult, Invocation, JobEntryPoint, entry_point, job_entry_point,
};

/// How a handler wants to be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// Exact `/trigger`, case-insensitive.
    Command,
    /// First-match-wins regex over free text.
    TextPattern,
    /// Callback data equal to the prefix or starting with `prefix:`.
    CallbackPrefix,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("command"),
            Self::TextPattern => f.write_str("text pattern"),
            Self::CallbackPrefix => f.write_str("callback prefix"),
        }
    }
}

/// The compiled key a descriptor is matched by.
#[derive(Debug, Clone)]
pub enum MatchKey {
    Literal(String),
    Pattern(Regex),
    Prefix(String),
}

impl MatchKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Prefix(s) => s,
            Self::Pattern(re) => re.as_str(),
        }
    }
}

/// Access flags. Independent and combinable.
///
/// `admin_only + group_only` means "group admins only, never in private".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    pub admin_only: bool,
    pub dev_only: bool,
    pub private_only: bool,
    pub group_only: bool,
    pub inactive: bool,
}

impl Access {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    #[must_use]
    pub fn dev_only(mut self) -> Self {
        self.dev_only = true;
        self
    }

    #[must_use]
    pub fn private_only(mut self) -> Self {
        self.private_only = true;
        self
    }

    #[must_use]
    pub fn group_only(mut self) -> Self {
        self.group_only = true;
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }
}

/// Immutable routing record for one handler.
pub struct HandlerDescriptor<S> {
    pub kind: RouteKind,
    pub key: MatchKey,
    pub access: Access,
    pub description: String,
    /// Fully qualified name of the handler function.
    pub entry_name: &'static str,
    pub entry: EntryPoint<S>,
}

impl<S> fmt::Debug for HandlerDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("kind", &self.kind)
            .field("key", &self.key.as_str())
            .field("access", &self.access)
            .field("entry_name", &self.entry_name)
            .finish()
    }
}

/// A route declaration, consumed by [`RegistryBuilder::add`](super::RegistryBuilder::add).
pub struct Route<S> {
    pub(crate) kind: RouteKind,
    pub(crate) key: String,
    pub(crate) access: Access,
    pub(crate) description: String,
    pub(crate) entry_name: &'static str,
    pub(crate) entry: EntryPoint<S>,
}

impl<S: 'static> Route<S> {
    fn new<F, Fut>(kind: RouteKind, key: &str, f: F) -> Self
    where
        F: Fn(Invocation<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            kind,
            key: key.to_string(),
            access: Access::default(),
            description: String::new(),
            entry_name: std::any::type_name::<F>(),
            entry: entry_point(f),
        }
    }

    /// Route `/trigger` to `f`.
    pub fn command<F, Fut>(trigger: &str, f: F) -> Self
    where
        F: Fn(Invocation<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new(RouteKind::Command, trigger, f)
    }

    /// Route text matching `pattern` to `f`.
    pub fn pattern<F, Fut>(pattern: &str, f: F) -> Self
    where
        F: Fn(Invocation<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new(RouteKind::TextPattern, pattern, f)
    }

    /// Route callback data `prefix` / `prefix:...` to `f`.
    pub fn callback<F, Fut>(prefix: &str, f: F) -> Self
    where
        F: Fn(Invocation<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new(RouteKind::CallbackPrefix, prefix, f)
    }
}

impl<S> Route<S> {
    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    #[must_use]
    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn admin_only(mut self) -> Self {
        self.access = self.access.admin_only();
        self
    }

    #[must_use]
    pub fn dev_only(mut self) -> Self {
        self.access = self.access.dev_only();
        self
    }

    #[must_use]
    pub fn private_only(mut self) -> Self {
        self.access = self.access.private_only();
        self
    }

    #[must_use]
    pub fn group_only(mut self) -> Self {
        self.access = self.access.group_only();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.access = self.access.inactive();
        self
    }
}

/// Metadata handed to the scheduler for one periodic job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub name: String,
    pub group: String,
    pub interval: Duration,
    pub description: String,
    pub inactive: bool,
}

/// A job declaration: descriptor plus body.
pub struct Job<S> {
    pub descriptor: JobDescriptor,
    pub(crate) body: JobEntryPoint<S>,
}

impl<S: 'static> Job<S> {
    pub fn new<F, Fut>(name: &str, group: &str, interval: Duration, f: F) -> Self
    where
        F: Fn(S, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            descriptor: JobDescriptor {
                name: name.to_string(),
                group: group.to_string(),
                interval,
                description: String::new(),
                inactive: false,
            },
            body: job_entry_point(f),
        }
    }
}

impl<S> Job<S> {
    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.descriptor.description = description.to_string();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.descriptor.inactive = true;
        self
    }
}
