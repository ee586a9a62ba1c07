//! Declarative event router.
//!
//! Plugins declare [`Route`]s; the [`Registry`] indexes them once at startup;
//! the [`Dispatcher`] resolves each incoming event to at most one handler,
//! checks its access flags and runs it in isolation.
//!
//! ## Flow
//!
//! ```text
//! Transport::pull -> IncomingEvent -> Registry::resolve -> gate::authorize -> Dispatcher::dispatch
//! ```

pub mod collab;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gate;
pub mod handler;
pub mod matcher;
pub mod registry;

pub use collab::{ErrorReporter, RoleLookup, Scheduler, SendOptions, Transport, TransportError};
pub use descriptor::{Access, HandlerDescriptor, Job, JobDescriptor, MatchKey, Route, RouteKind};
pub use dispatcher::{DenialPolicy, Dispatcher, Outcome};
pub use error::{BuildError, Conflict};
pub use event::{ActorContext, ChatKind, IncomingEvent};
pub use gate::{Decision, DenyReason};
pub use handler::{HandlerResult, Invocation, JobBody};
pub use registry::{Registry, RegistryBuilder};
