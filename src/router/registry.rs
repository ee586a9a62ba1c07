//! Handler registry.
//!
//! Built once at startup from an explicit, ordered list of routes and never
//! mutated afterward, so concurrent dispatches read it without locking.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut builder = Registry::builder();
//! builder
//!     .add(Route::command("ping", ping::ping_command).describe("Check latency"))
//!     .add(Route::callback("fortune", fortune::fortune_callback));
//! let registry = builder.build()?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, info};

use super::collab::Scheduler;
use super::descriptor::{HandlerDescriptor, Job, JobDescriptor, MatchKey, Route, RouteKind};
use super::error::{BuildError, Conflict};
use super::handler::JobBody;

/// Read-only routing tables.
pub struct Registry<S> {
    pub(super) exact_triggers: HashMap<String, HandlerDescriptor<S>>,
    /// Command triggers in registration order, for help and menus.
    pub(super) command_order: Vec<String>,
    /// Registration order is match priority.
    pub(super) text_patterns: Vec<HandlerDescriptor<S>>,
    pub(super) callback_prefixes: HashMap<String, HandlerDescriptor<S>>,
    pub(super) jobs: Vec<Job<S>>,
}

/// Collects routes and jobs in caller-controlled order.
pub struct RegistryBuilder<S> {
    routes: Vec<Route<S>>,
    jobs: Vec<Job<S>>,
}

impl<S> Default for RegistryBuilder<S> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

impl<S> RegistryBuilder<S> {
    pub fn add(&mut self, route: Route<S>) -> &mut Self {
        self.routes.push(route);
        self
    }

    pub fn add_job(&mut self, job: Job<S>) -> &mut Self {
        self.jobs.push(job);
        self
    }

    /// Build the routing tables.
    ///
    /// Inactive routes and jobs are dropped first. Every remaining conflict
    /// is logged and returned together; no winner is picked.
    pub fn build(self) -> Result<Registry<S>, BuildError> {
        let mut conflicts = Vec::new();

        let mut exact_triggers: HashMap<String, HandlerDescriptor<S>> = HashMap::new();
        let mut command_order = Vec::new();
        let mut text_patterns: Vec<HandlerDescriptor<S>> = Vec::new();
        let mut callback_prefixes: HashMap<String, HandlerDescriptor<S>> = HashMap::new();
        let mut prefix_order: Vec<String> = Vec::new();

        for route in self.routes {
            if route.access.inactive {
                debug!(
                    "Skipping inactive {} `{}` ({})",
                    route.kind, route.key, route.entry_name
                );
                continue;
            }

            let key = match route.kind {
                RouteKind::Command => route.key.trim().trim_start_matches('/').to_lowercase(),
                RouteKind::TextPattern => route.key.clone(),
                RouteKind::CallbackPrefix => route.key.trim().to_string(),
            };

            if key.is_empty() {
                conflicts.push(Conflict::EmptyKey {
                    kind: route.kind,
                    entry: route.entry_name,
                });
                continue;
            }

            if route.kind == RouteKind::Command {
                if let Some(reason) = unreachable_command(&key) {
                    conflicts.push(Conflict::InvalidKey {
                        key,
                        entry: route.entry_name,
                        reason,
                    });
                    continue;
                }
            }

            match route.kind {
                RouteKind::Command => {
                    if let Some(first) = exact_triggers.get(&key) {
                        conflicts.push(Conflict::Duplicate {
                            kind: route.kind,
                            key: key.clone(),
                            first: first.entry_name,
                            second: route.entry_name,
                        });
                    } else {
                        command_order.push(key.clone());
                    }
                    exact_triggers.insert(key.clone(), descriptor(route, MatchKey::Literal(key)));
                }
                RouteKind::TextPattern => {
                    let regex = match Regex::new(&key) {
                        Ok(regex) => regex,
                        Err(e) => {
                            conflicts.push(Conflict::InvalidPattern {
                                pattern: key,
                                entry: route.entry_name,
                                reason: e.to_string(),
                            });
                            continue;
                        }
                    };
                    if let Some(first) = text_patterns.iter().find(|d| d.key.as_str() == key) {
                        conflicts.push(Conflict::Duplicate {
                            kind: route.kind,
                            key: key.clone(),
                            first: first.entry_name,
                            second: route.entry_name,
                        });
                        continue;
                    }
                    text_patterns.push(descriptor(route, MatchKey::Pattern(regex)));
                }
                RouteKind::CallbackPrefix => {
                    if let Some(first) = callback_prefixes.get(&key) {
                        conflicts.push(Conflict::Duplicate {
                            kind: route.kind,
                            key: key.clone(),
                            first: first.entry_name,
                            second: route.entry_name,
                        });
                    } else {
                        prefix_order.push(key.clone());
                    }
                    callback_prefixes.insert(key.clone(), descriptor(route, MatchKey::Prefix(key)));
                }
            }
        }

        // One prefix being a literal prefix of another makes `data` ambiguous
        // for some inputs ("foo" vs "foo:bar"), so both are rejected.
        for (i, a) in prefix_order.iter().enumerate() {
            for b in &prefix_order[i + 1..] {
                let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
                if longer.starts_with(shorter.as_str()) {
                    conflicts.push(Conflict::AmbiguousPrefix {
                        shorter: shorter.clone(),
                        shorter_entry: callback_prefixes[shorter].entry_name,
                        longer: longer.clone(),
                        longer_entry: callback_prefixes[longer].entry_name,
                    });
                }
            }
        }

        let mut jobs: Vec<Job<S>> = Vec::new();
        for job in self.jobs {
            if job.descriptor.inactive {
                debug!("Skipping inactive job `{}`", job.descriptor.name);
                continue;
            }
            if jobs.iter().any(|j| j.descriptor.name == job.descriptor.name) {
                conflicts.push(Conflict::DuplicateJob {
                    name: job.descriptor.name.clone(),
                });
                continue;
            }
            jobs.push(job);
        }

        if !conflicts.is_empty() {
            for conflict in &conflicts {
                error!("Routing conflict: {}", conflict);
            }
            return Err(BuildError::Conflicts(conflicts));
        }

        info!(
            commands = exact_triggers.len(),
            patterns = text_patterns.len(),
            callbacks = callback_prefixes.len(),
            jobs = jobs.len(),
            "Registry built"
        );

        Ok(Registry {
            exact_triggers,
            command_order,
            text_patterns,
            callback_prefixes,
            jobs,
        })
    }
}

fn descriptor<S>(route: Route<S>, key: MatchKey) -> HandlerDescriptor<S> {
    HandlerDescriptor {
        kind: route.kind,
        key,
        access: route.access,
        description: route.description,
        entry_name: route.entry_name,
        entry: route.entry,
    }
}

/// Incoming triggers lose any `@bot` suffix and end at whitespace, so such
/// keys could never be resolved.
fn unreachable_command(key: &str) -> Option<&'static str> {
    if key.contains('@') {
        Some("`@` suffixes are stripped from incoming triggers")
    } else if key.contains(char::is_whitespace) {
        Some("triggers end at the first whitespace")
    } else {
        None
    }
}

impl<S> Registry<S> {
    pub fn builder() -> RegistryBuilder<S> {
        RegistryBuilder::default()
    }

    /// Active commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &HandlerDescriptor<S>> {
        self.command_order
            .iter()
            .filter_map(|trigger| self.exact_triggers.get(trigger))
    }

    pub fn command_count(&self) -> usize {
        self.exact_triggers.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.text_patterns.len()
    }

    pub fn callback_count(&self) -> usize {
        self.callback_prefixes.len()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobDescriptor> {
        self.jobs.iter().map(|job| &job.descriptor)
    }
}

impl<S: Clone + Send + Sync + 'static> Registry<S> {
    /// Hand every job to `scheduler`, bound to `state`.
    ///
    /// The registry never runs the clock; it only registers.
    pub fn schedule_jobs(&self, scheduler: &dyn Scheduler, state: S) {
        for job in &self.jobs {
            let body = Arc::clone(&job.body);
            let state = state.clone();
            let bound: JobBody = Arc::new(move |cancel| body(state.clone(), cancel));
            scheduler.register(job.descriptor.clone(), bound);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::router::handler::{HandlerResult, Invocation};

    async fn first(_: Invocation<()>) -> HandlerResult {
        Ok(())
    }

    async fn second(_: Invocation<()>) -> HandlerResult {
        Ok(())
    }

    async fn tick(_: (), _: CancellationToken) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_build_indexes_by_kind() {
        let mut builder = Registry::builder();
        builder
            .add(Route::command("/Ping", first))
            .add(Route::pattern("^hi", first))
            .add(Route::callback("fortune", first));
        let registry = builder.build().unwrap();

        assert_eq!(registry.command_count(), 1);
        assert_eq!(registry.pattern_count(), 1);
        assert_eq!(registry.callback_count(), 1);
        assert!(registry.exact_triggers.contains_key("ping"));
    }

    #[test]
    fn test_duplicate_command_is_rejected() {
        let mut builder = Registry::builder();
        builder
            .add(Route::command("start", first))
            .add(Route::command("START", second));

        let err = builder.build().err().unwrap();
        assert_eq!(err.conflicts().len(), 1);
        match &err.conflicts()[0] {
            Conflict::Duplicate { kind, key, first, second } => {
                assert_eq!(*kind, RouteKind::Command);
                assert_eq!(key, "start");
                assert!(first.ends_with("first"));
                assert!(second.ends_with("second"));
            }
            other => panic!("unexpected conflict: {other:?}"),
        }
    }

    #[test]
    fn test_inactive_route_does_not_conflict() {
        let mut builder = Registry::builder();
        builder
            .add(Route::command("stats", first).inactive())
            .add(Route::command("stats", second));
        let registry = builder.build().unwrap();

        let descriptor = registry.commands().next().unwrap();
        assert!(descriptor.entry_name.ends_with("second"));
    }

    #[test]
    fn test_ambiguous_prefixes_are_rejected() {
        let mut builder = Registry::builder();
        builder
            .add(Route::callback("foo", first))
            .add(Route::callback("foobar", second));

        let err = builder.build().err().unwrap();
        assert!(matches!(
            &err.conflicts()[0],
            Conflict::AmbiguousPrefix { shorter, longer, .. } if shorter == "foo" && longer == "foobar"
        ));
    }

    #[test]
    fn test_unreachable_command_keys_are_rejected() {
        let mut builder = Registry::builder();
        builder
            .add(Route::command("ping@waypoint_bot", first))
            .add(Route::command("/say hello", second))
            .add(Route::command("/Ping", second));

        let err = builder.build().err().unwrap();
        assert_eq!(err.conflicts().len(), 2);
        assert!(matches!(
            &err.conflicts()[0],
            Conflict::InvalidKey { key, entry, .. } if key == "ping@waypoint_bot" && entry.ends_with("first")
        ));
        assert!(matches!(
            &err.conflicts()[1],
            Conflict::InvalidKey { key, .. } if key == "say hello"
        ));
    }

    #[test]
    fn test_invalid_pattern_and_empty_key_are_collected() {
        let mut builder = Registry::builder();
        builder
            .add(Route::pattern("(unclosed", first))
            .add(Route::command("  ", second))
            .add(Route::pattern("^ok$", second));

        let err = builder.build().err().unwrap();
        assert_eq!(err.conflicts().len(), 2);
        assert!(err.to_string().contains("2 conflict(s)"));
    }

    #[test]
    fn test_duplicate_pattern_is_rejected() {
        let mut builder = Registry::builder();
        builder
            .add(Route::pattern("^hi", first))
            .add(Route::pattern("^hi", second));
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_commands_keep_registration_order() {
        let mut builder = Registry::builder();
        for trigger in ["start", "help", "ping", "id"] {
            builder.add(Route::command(trigger, first));
        }
        let registry = builder.build().unwrap();

        let order: Vec<&str> = registry.commands().map(|d| d.key.as_str()).collect();
        assert_eq!(order, ["start", "help", "ping", "id"]);
    }

    #[test]
    fn test_jobs_skip_inactive_and_reject_duplicates() {
        let mut builder = Registry::<()>::builder();
        builder
            .add_job(Job::new("heartbeat", "ops", Duration::from_secs(60), tick))
            .add_job(Job::new("cleanup", "ops", Duration::from_secs(60), tick).inactive());
        let registry = builder.build().unwrap();
        let names: Vec<&str> = registry.jobs().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["heartbeat"]);

        let mut builder = Registry::<()>::builder();
        builder
            .add_job(Job::new("heartbeat", "ops", Duration::from_secs(60), tick))
            .add_job(Job::new("heartbeat", "ops", Duration::from_secs(30), tick));
        assert!(builder.build().is_err());
    }

    #[derive(Default)]
    struct RecordingScheduler {
        registered: Mutex<Vec<JobDescriptor>>,
    }

    impl Scheduler for RecordingScheduler {
        fn register(&self, descriptor: JobDescriptor, _body: JobBody) {
            self.registered.lock().push(descriptor);
        }
    }

    #[test]
    fn test_schedule_jobs_registers_descriptors() {
        let mut builder = Registry::<()>::builder();
        builder.add_job(
            Job::new("heartbeat", "ops", Duration::from_secs(60), tick).describe("Log status"),
        );
        let registry = builder.build().unwrap();

        let scheduler = RecordingScheduler::default();
        registry.schedule_jobs(&scheduler, ());

        let registered = scheduler.registered.lock();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name, "heartbeat");
        assert_eq!(registered[0].description, "Log status");
    }
}
