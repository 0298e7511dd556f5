//! Lock-free rule store with hot-swapping
//!
//! A [`RuleSet`] is never mutated once published. Reload builds a new set
//! and swaps the pointer; resolutions already holding the old set keep it
//! alive until they drop their reference.

use crate::{Rule, TrafficDescriptor};
use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Immutable, priority-ordered rules
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Arc<Rule>>,
    fallback: Arc<Rule>,
    version: u64,
}

impl RuleSet {
    /// Create set; declaration order is priority order
    pub fn new(rules: Vec<Rule>, version: u64) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
            fallback: Arc::new(Rule::fallback()),
            version,
        }
    }

    /// Empty set at version 0
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Resolve descriptor: first matching rule, else the inspect fallback
    ///
    /// Linear in the number of rules; never fails.
    #[inline]
    pub fn resolve(&self, desc: &TrafficDescriptor) -> &Arc<Rule> {
        self.position(desc)
            .map_or(&self.fallback, |idx| &self.rules[idx])
    }

    /// Index of the first matching rule
    #[inline]
    pub fn position(&self, desc: &TrafficDescriptor) -> Option<usize> {
        self.rules.iter().position(|rule| rule.matches(desc))
    }

    /// Rule returned when nothing matches
    pub fn fallback(&self) -> &Arc<Rule> {
        &self.fallback
    }

    /// Version of this set
    #[inline(always)]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in priority order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Holder of the active rule set
pub struct RuleStore {
    /// Current rule set (atomically swappable)
    current: ArcSwap<RuleSet>,
    /// Serializes publishers so versions stay monotonic
    publish: Mutex<()>,
}

impl RuleStore {
    /// Create store with an empty set
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet::empty()),
            publish: Mutex::new(()),
        }
    }

    /// Create with initial rules at version 1
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet::new(rules, 1)),
            publish: Mutex::new(()),
        }
    }

    /// Borrow the active set for one resolution (hot path)
    #[inline(always)]
    pub fn load(&self) -> Guard<Arc<RuleSet>> {
        self.current.load()
    }

    /// Owned handle to the active set
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Get current version
    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// Atomically replace the active set; returns the new version
    pub fn publish(&self, rules: Vec<Rule>) -> u64 {
        let _guard = self.publish.lock();
        let version = self.current.load().version() + 1;
        let count = rules.len();
        self.current.store(Arc::new(RuleSet::new(rules, version)));
        info!(rules = count, version, "binder rules published");
        version
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.load();
        f.debug_struct("RuleStore")
            .field("version", &current.version())
            .field("rules", &current.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, ProtoBits, Protocol};

    fn blocking(mut rule: Rule) -> Rule {
        rule.target.action = Action::Block;
        rule
    }

    #[test]
    fn test_store_publish() {
        let store = RuleStore::new();
        assert_eq!(store.version(), 0);
        assert!(store.load().is_empty());

        let v = store.publish(vec![Rule::default(), Rule::fallback()]);
        assert_eq!(v, 1);
        assert_eq!(store.version(), 1);
        assert_eq!(store.load().len(), 2);

        assert_eq!(store.publish(Vec::new()), 2);
    }

    #[test]
    fn test_empty_set_falls_back_to_inspect() {
        let set = RuleSet::empty();
        let desc = TrafficDescriptor::default();
        assert_eq!(set.resolve(&desc).action(), Action::Inspect);
        assert!(Arc::ptr_eq(set.resolve(&desc), set.fallback()));
        assert_eq!(set.position(&desc), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mut allow = Rule::for_protocol(ProtoBits::TCP, "stream_tcp");
        allow.target.action = Action::Allow;
        let set = RuleSet::new(vec![blocking(Rule::default()), allow], 1);

        let desc = TrafficDescriptor::default();
        assert_eq!(set.position(&desc), Some(0));
        assert_eq!(set.resolve(&desc).action(), Action::Block);
    }

    #[test]
    fn test_skips_non_matching() {
        let tcp_block = blocking(Rule::for_protocol(ProtoBits::TCP, "stream_tcp"));
        let udp = Rule::for_protocol(ProtoBits::UDP, "stream_udp");
        let set = RuleSet::new(vec![tcp_block, udp], 1);

        let mut desc = TrafficDescriptor::default();
        desc.protocol = Protocol::Udp;
        assert_eq!(set.position(&desc), Some(1));
        assert_eq!(set.resolve(&desc).name(), Some("stream_udp"));

        desc.protocol = Protocol::Icmp;
        assert_eq!(set.resolve(&desc).action(), Action::Inspect);
        assert!(set.resolve(&desc).name().is_none());
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let store = RuleStore::with_rules(vec![blocking(Rule::default())]);
        let v1 = store.snapshot();

        store.publish(Vec::new());

        let desc = TrafficDescriptor::default();
        assert_eq!(v1.version(), 1);
        assert_eq!(v1.resolve(&desc).action(), Action::Block);
        assert_eq!(store.load().resolve(&desc).action(), Action::Inspect);
    }
}
