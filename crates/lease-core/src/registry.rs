//! Process-wide record of the nodes whose plans are being executed.
//!
//! At most one executor runs per node. A node is claimed with
//! [`NodeRegistry::try_claim`] and stays claimed until the returned
//! [`NodeLease`] is dropped, whichever way the executor task ends.

use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    active: Mutex<HashSet<String>>,
    idle: Notify,
}

/// Set of active node ids, shared by the monitor and its executors.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    inner: Arc<Inner>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `node_id` if no executor holds it.
    ///
    /// The check and the insert happen under one lock, so two callers racing
    /// for the same node never both succeed.
    pub fn try_claim(&self, node_id: &str) -> Option<NodeLease> {
        let mut active = self.inner.active.lock();
        if !active.insert(node_id.to_string()) {
            return None;
        }
        Some(NodeLease {
            registry: Arc::clone(&self.inner),
            node_id: node_id.to_string(),
        })
    }

    pub fn is_active(&self, node_id: &str) -> bool {
        self.inner.active.lock().contains(node_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Sorted snapshot of the active node ids.
    pub fn active_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.inner.active.lock().iter().cloned().collect();
        nodes.sort();
        nodes
    }

    /// Resolves once no node is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();
            if self.inner.active.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Claim on one node; releases it when dropped.
#[derive(Debug)]
pub struct NodeLease {
    registry: Arc<Inner>,
    node_id: String,
}

impl NodeLease {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

impl Drop for NodeLease {
    fn drop(&mut self) {
        let mut active = self.registry.active.lock();
        active.remove(&self.node_id);
        if active.is_empty() {
            self.registry.idle.notify_waiters();
        }
    }
}
