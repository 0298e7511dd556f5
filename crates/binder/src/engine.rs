//! Binder engine: rule loading and per-worker resolution

use crate::{
    BinderConfig, BindStats, Rule, RuleBuilder, RuleSet, RuleStore, StatsSnapshot, WorkerStats,
};
use binder_common::params::{BINDER_PARAMS, BIND_HELP};
use binder_common::{BindResult, ConfigEvent, Parameter, TrafficDescriptor};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Traffic binder
///
/// Owns the active rule set and one counter slot per worker. Loading is
/// expected from a single control thread; resolution runs concurrently on
/// any number of [`Worker`]s without taking locks.
#[derive(Debug)]
pub struct Binder {
    store: RuleStore,
    stats: BindStats,
}

impl Binder {
    /// Create binder with an empty rule set and `workers` counter slots
    pub fn new(workers: usize) -> Self {
        Self {
            store: RuleStore::new(),
            stats: BindStats::new(workers),
        }
    }

    /// Create binder and load the configured bindings
    pub fn from_config(config: &BinderConfig) -> BindResult<Self> {
        let binder = Self::new(config.workers);
        binder.load_config(config)?;
        Ok(binder)
    }

    /// Publish already-built rules; returns the new version
    pub fn load_rules(&self, rules: Vec<Rule>) -> u64 {
        self.store.publish(rules)
    }

    /// Build rules from an event stream and publish them
    ///
    /// On error the active rule set is left untouched.
    pub fn load_events<I>(&self, events: I) -> BindResult<u64>
    where
        I: IntoIterator<Item = ConfigEvent>,
    {
        match RuleBuilder::build(events) {
            Ok(rules) => Ok(self.load_rules(rules)),
            Err(e) => {
                warn!(error = %e, version = self.version(), "binder config rejected");
                Err(e)
            }
        }
    }

    /// Build rules from a builder and publish them
    pub fn load_builder(&self, builder: RuleBuilder) -> BindResult<u64> {
        match builder.finish() {
            Ok(rules) => Ok(self.load_rules(rules)),
            Err(e) => {
                warn!(error = %e, version = self.version(), "binder config rejected");
                Err(e)
            }
        }
    }

    /// Build and publish the bindings of a structured configuration
    pub fn load_config(&self, config: &BinderConfig) -> BindResult<u64> {
        self.load_events(config.events())
    }

    /// Resolution context for worker `id`
    pub fn worker(&self, id: usize) -> Option<Worker<'_>> {
        let stats = self.stats.worker(id)?;
        Some(Worker { store: &self.store, stats })
    }

    /// Number of worker slots
    pub fn workers(&self) -> usize {
        self.stats.len()
    }

    /// Owned handle to the active rule set
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.store.snapshot()
    }

    /// Version of the active rule set
    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Counters summed across workers
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.total()
    }

    /// Accepted configuration parameters
    pub fn parameters() -> &'static [Parameter] {
        BINDER_PARAMS
    }

    /// One-line module description
    pub fn help() -> &'static str {
        BIND_HELP
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new(BinderConfig::default().workers)
    }
}

/// Per-worker resolution context
///
/// Holds the worker's own counter slot; cheap to copy into worker threads.
#[derive(Debug, Clone, Copy)]
pub struct Worker<'a> {
    store: &'a RuleStore,
    stats: &'a WorkerStats,
}

impl Worker<'_> {
    /// Resolve descriptor against the active rule set
    ///
    /// This is the hot path: one pointer load, a linear scan, and two
    /// uncontended counter increments.
    #[inline]
    pub fn resolve(&self, desc: &TrafficDescriptor) -> Arc<Rule> {
        let set = self.store.load();
        let rule = Arc::clone(set.resolve(desc));
        self.stats.record(rule.action());
        rule
    }

    /// Resolve against a rule set the caller already holds
    #[inline]
    pub fn resolve_in<'s>(&self, set: &'s RuleSet, desc: &TrafficDescriptor) -> &'s Arc<Rule> {
        let rule = set.resolve(desc);
        self.stats.record(rule.action());
        rule
    }

    /// Resolve with elapsed time in nanoseconds
    pub fn resolve_timed(&self, desc: &TrafficDescriptor) -> (Arc<Rule>, u64) {
        let start = Instant::now();
        let rule = self.resolve(desc);
        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        (rule, elapsed)
    }

    /// Owned handle to the active rule set, for resolving a batch against
    /// one version
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.store.snapshot()
    }

    /// This worker's counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, ProtoBits, Protocol};
    use binder_common::{BindError, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    fn desc() -> TrafficDescriptor {
        TrafficDescriptor::new(
            "192.168.1.5".parse().unwrap(),
            "8.8.8.8".parse().unwrap(),
            Protocol::Tcp,
            443,
        )
    }

    fn rule(action: Action) -> Rule {
        let mut rule = Rule::default();
        rule.target.action = action;
        rule
    }

    #[test]
    fn test_default_is_inspect() {
        let binder = Binder::new(1);
        let worker = binder.worker(0).unwrap();
        let resolved = worker.resolve(&desc());
        assert_eq!(resolved.action(), Action::Inspect);
        assert_eq!(worker.stats().inspects, 1);
    }

    #[test]
    fn test_priority_block_before_allow() {
        let binder = Binder::new(1);
        binder.load_rules(vec![rule(Action::Block), rule(Action::Allow)]);
        let resolved = binder.worker(0).unwrap().resolve(&desc());
        assert_eq!(resolved.action(), Action::Block);
    }

    #[test]
    fn test_counters() {
        let binder = Binder::new(2);
        binder.load_rules(vec![rule(Action::Allow)]);

        let worker = binder.worker(1).unwrap();
        for _ in 0..25 {
            worker.resolve(&desc());
        }

        let stats = binder.stats();
        assert_eq!(stats.packets, 25);
        assert_eq!(stats.allows, 25);
        assert_eq!(stats.blocks, 0);
        assert_eq!(stats.inspects, 0);
        assert_eq!(binder.worker(0).unwrap().stats().packets, 0);
        assert!(binder.worker(2).is_none());
    }

    #[test]
    fn test_rejected_load_keeps_active_set() {
        let binder = Binder::new(1);
        let v1 = binder.load_rules(vec![rule(Action::Block)]);

        let events = vec![
            ConfigEvent::begin("binder", 1),
            ConfigEvent::set("binder.when.ports", Value::Bits(vec![65536])),
            ConfigEvent::end("binder", 1),
        ];
        assert!(matches!(binder.load_events(events), Err(BindError::OutOfRange { .. })));

        let unclosed = vec![ConfigEvent::begin("binder", 1)];
        assert!(matches!(binder.load_events(unclosed), Err(BindError::UnclosedGroup { .. })));

        assert_eq!(binder.version(), v1);
        assert_eq!(binder.worker(0).unwrap().resolve(&desc()).action(), Action::Block);
    }

    #[test]
    fn test_load_builder_with_shortcuts() {
        let binder = Binder::new(1);
        let mut builder = RuleBuilder::new();
        builder.bind_protocol(ProtoBits::UDP, "stream_udp");
        builder.bind_service("http", "http_inspect");
        assert_eq!(binder.load_builder(builder).unwrap(), 1);

        let worker = binder.worker(0).unwrap();
        let resolved = worker.resolve(&desc().with_service("http"));
        assert_eq!(resolved.name(), Some("http_inspect"));
    }

    #[test]
    fn test_from_config() {
        let config = BinderConfig::from_json(
            r#"{ "workers": 3, "bindings": [ { "when": { "ports": [443] }, "use": { "action": "allow" } } ] }"#,
        )
        .unwrap();
        let binder = Binder::from_config(&config).unwrap();
        assert_eq!(binder.workers(), 3);
        assert_eq!(binder.version(), 1);

        let worker = binder.worker(2).unwrap();
        assert_eq!(worker.resolve(&desc()).action(), Action::Allow);
        let mut other = desc();
        other.port = 80;
        assert_eq!(worker.resolve(&other).action(), Action::Inspect);
    }

    #[test]
    fn test_resolve_in_snapshot_across_reload() {
        let binder = Binder::new(1);
        binder.load_rules(vec![rule(Action::Block)]);
        let worker = binder.worker(0).unwrap();

        let v1 = binder.snapshot();
        binder.load_rules(vec![rule(Action::Allow)]);

        // in-flight resolution keeps seeing v1
        assert_eq!(worker.resolve_in(&v1, &desc()).action(), Action::Block);
        assert_eq!(worker.resolve(&desc()).action(), Action::Allow);
        assert_eq!(v1.version() + 1, binder.version());
    }

    #[test]
    fn test_concurrent_workers_and_reload() {
        let binder = Binder::new(4);
        binder.load_rules(vec![rule(Action::Allow)]);

        let started = Barrier::new(5);
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            for id in 0..4 {
                let worker = binder.worker(id).unwrap();
                let started = &started;
                let done = &done;
                s.spawn(move || {
                    started.wait();
                    let held = worker.snapshot();
                    let first = held.resolve(&desc()).action();
                    while !done.load(Ordering::Acquire) {
                        let action = worker.resolve_in(&held, &desc()).action();
                        assert_eq!(action, first);
                        let live = worker.resolve(&desc()).action();
                        assert!(live == Action::Allow || live == Action::Block);
                    }
                });
            }

            started.wait();
            for i in 0..50 {
                let action = if i % 2 == 0 { Action::Block } else { Action::Allow };
                binder.load_rules(vec![rule(action)]);
            }
            done.store(true, Ordering::Release);
        });

        let stats = binder.stats();
        assert_eq!(stats.packets, stats.allows + stats.blocks);
        assert_eq!(stats.inspects, 0);
        assert_eq!(binder.version(), 51);
    }

    #[test]
    fn test_resolve_timed() {
        let binder = Binder::new(1);
        let (rule, _nanos) = binder.worker(0).unwrap().resolve_timed(&desc());
        assert_eq!(rule.action(), Action::Inspect);
        assert_eq!(binder.stats().packets, 1);
    }

    #[test]
    fn test_parameters_exposed() {
        let names: Vec<_> = Binder::parameters().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["when", "use"]);
        assert!(Binder::help().contains("CIDRs"));
    }
}
