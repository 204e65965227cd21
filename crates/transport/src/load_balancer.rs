//! The load balancer: picks one worker node for a `deploy`/`send` call
//! (§4.5). `select_permanent` is stable across calls with the same key
//! (for workers holding persistent state); `select_transient` round-robins
//! over whichever workers are alive right now.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::node_id::NodeId;

/// Picks a worker node from a live membership list.
///
/// Holds no connection state of its own; [`LoadBalancer::set_workers`] is
/// called by the membership subsystem whenever the worker set changes
/// (join/leave), keeping selection decisions consistent with current
/// cluster state without the balancer polling membership itself.
pub struct LoadBalancer {
    workers: RwLock<Vec<NodeId>>,
    round_robin: AtomicUsize,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
            round_robin: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancer {
    /// Build an empty balancer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a balancer pre-seeded with a set of currently-alive workers.
    #[must_use]
    pub fn with_workers(workers: Vec<NodeId>) -> Self {
        Self {
            workers: RwLock::new(workers),
            round_robin: AtomicUsize::new(0),
        }
    }

    /// Replace the current set of alive workers, in a stable order (callers
    /// should sort before calling, so `select_permanent` stays consistent
    /// across calls that pass the same set).
    pub fn set_workers(&self, workers: Vec<NodeId>) {
        *self.workers.write() = workers;
    }

    /// A snapshot of the current worker set.
    #[must_use]
    pub fn workers(&self) -> Vec<NodeId> {
        self.workers.read().clone()
    }

    /// Pick a worker by consistent hashing of `key` over the current
    /// (sorted) worker set: the same key always maps to the same worker as
    /// long as the set is unchanged, and only a fraction of keys move when
    /// the set does. Returns `None` if there are no workers.
    #[must_use]
    pub fn select_permanent(&self, key: &str) -> Option<NodeId> {
        let workers = self.workers.read();
        if workers.is_empty() {
            return None;
        }
        let mut sorted: Vec<&NodeId> = workers.iter().collect();
        sorted.sort();
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % sorted.len();
        Some(sorted[index].clone())
    }

    /// Pick a worker round-robin over the currently alive set. Returns
    /// `None` if there are no workers.
    #[must_use]
    pub fn select_transient(&self) -> Option<NodeId> {
        let workers = self.workers.read();
        if workers.is_empty() {
            return None;
        }
        let index = self.round_robin.fetch_add(1, Ordering::Relaxed) % workers.len();
        Some(workers[index].clone())
    }
}

/// A shared handle, matching how the membership subsystem and router both
/// need to observe the same balancer.
pub type SharedLoadBalancer = Arc<LoadBalancer>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workers(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new(format!("w{i}"), "h")).collect()
    }

    #[test]
    fn select_on_empty_set_is_none() {
        let lb = LoadBalancer::new();
        assert!(lb.select_permanent("key").is_none());
        assert!(lb.select_transient().is_none());
    }

    #[test]
    fn select_permanent_is_stable_for_the_same_key_and_set() {
        let lb = LoadBalancer::with_workers(workers(5));
        let first = lb.select_permanent("order-42").unwrap();
        for _ in 0..10 {
            assert_eq!(lb.select_permanent("order-42").unwrap(), first);
        }
    }

    #[test]
    fn select_permanent_can_differ_across_keys() {
        let lb = LoadBalancer::with_workers(workers(8));
        let picks: std::collections::HashSet<NodeId> = (0..20)
            .map(|i| lb.select_permanent(&format!("key-{i}")).unwrap())
            .collect();
        assert!(picks.len() > 1, "expected keys to spread across more than one worker");
    }

    #[test]
    fn select_transient_round_robins() {
        let lb = LoadBalancer::with_workers(workers(3));
        let picks: Vec<NodeId> = (0..6).map(|_| lb.select_transient().unwrap()).collect();
        assert_eq!(picks[0], picks[3]);
        assert_eq!(picks[1], picks[4]);
        assert_eq!(picks[2], picks[5]);
        assert_ne!(picks[0], picks[1]);
    }

    #[test]
    fn set_workers_replaces_the_live_set() {
        let lb = LoadBalancer::with_workers(workers(2));
        lb.set_workers(workers(5));
        assert_eq!(lb.workers().len(), 5);
    }
}
