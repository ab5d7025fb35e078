//! Joining several nodes into a composite
//!
//! [`join`] builds a composite [`Node`] that is cancelled the moment any
//! of its parents is done, recording which parent fired and why. The
//! returned [`Dismiss`] ends the composite cleanly, without a cause.

use crate::config::{DuplicatePolicy, JoinConfig};
use crate::error::{Cause, JoinError, ScopeError};
use crate::node::Node;
use crate::scope::{CancelScope, Scope};
use std::collections::HashSet;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Clean shutdown for a composite scope
///
/// Dismissing cancels without a cause, so consumers can tell "finished
/// because the owner said so" (`cause()` is `None`) from "finished because a
/// dependency died" (`cause()` is `Some`). Calling it more than once, or
/// after a parent already fired, changes nothing.
///
/// Dropping a `Dismiss` does not cancel anything.
#[derive(Debug)]
#[must_use = "dismiss the composite once done with it to release its watchers"]
pub struct Dismiss {
    scope: CancelScope,
    spawned: usize,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dismiss {
    pub(crate) fn new(scope: CancelScope, watchers: Vec<JoinHandle<()>>) -> Self {
        Self {
            scope,
            spawned: watchers.len(),
            watchers: Mutex::new(watchers),
        }
    }

    /// Cancel the composite without a cause
    ///
    /// Returns `true` if this call ended the composite.
    #[allow(clippy::must_use_candidate)]
    pub fn dismiss(&self) -> bool {
        let dismissed = self.scope.cancel();
        if dismissed {
            tracing::debug!("composite dismissed");
        }
        dismissed
    }

    /// Number of watcher tasks spawned for the composite
    #[inline]
    #[must_use]
    pub fn watchers(&self) -> usize {
        self.spawned
    }

    /// Wait until every watcher task has exited
    ///
    /// Watchers exit once the composite is done, so this resolves after a
    /// dismiss or a propagated cancellation. Concurrent callers queue on
    /// the same handles and all resolve only once every watcher is gone.
    pub async fn settled(&self) {
        let mut watchers = self.watchers.lock().await;
        // Pop only after a handle completes, so a cancelled wait never
        // leaves a finished handle behind to be polled again
        while let Some(handle) = watchers.last_mut() {
            let result = handle.await;
            watchers.pop();
            if let Err(e) = result {
                tracing::warn!("watcher task failed: {}", e);
            }
        }
    }
}

/// Join `nodes` into a composite named `name` with default configuration
///
/// # Errors
/// - `JoinError::TooFewParents` for fewer than two nodes
/// - `JoinError::NoRuntime` outside a tokio runtime
pub fn join(name: impl Into<String>, nodes: &[Node]) -> Result<(Node, Dismiss), JoinError> {
    join_with(&JoinConfig::default(), name, nodes)
}

/// Join `nodes` into a composite named `name`
///
/// Parents are registered in the order given, which is the order value
/// lookup walks them. One watcher task per parent waits for either that
/// parent or the composite to finish; a parent finishing first cancels
/// the composite with a cause of `"<parent id>: <parent cause>"`.
///
/// Nothing is spawned or registered when an error is returned.
///
/// # Errors
/// - `JoinError::TooFewParents` for fewer than two nodes
/// - `JoinError::DuplicateParent` when ids repeat under `DuplicatePolicy::Reject`
/// - `JoinError::NoRuntime` outside a tokio runtime
pub fn join_with(
    config: &JoinConfig,
    name: impl Into<String>,
    nodes: &[Node],
) -> Result<(Node, Dismiss), JoinError> {
    if nodes.len() < 2 {
        return Err(JoinError::TooFewParents { got: nodes.len() });
    }

    if config.duplicate_policy == DuplicatePolicy::Reject {
        let mut seen = HashSet::with_capacity(nodes.len());
        for node in nodes {
            if !seen.insert(node.id()) {
                return Err(JoinError::DuplicateParent(node.id().to_string()));
            }
        }
    }

    let runtime = Handle::try_current().map_err(|_| JoinError::NoRuntime)?;

    let scope = CancelScope::new();
    let composite = Node::new(name, scope.clone());
    composite.register_parents(nodes);

    let watchers = nodes
        .iter()
        .map(|parent| {
            runtime.spawn(watch_parent(
                composite.id().to_string(),
                parent.clone(),
                scope.clone(),
            ))
        })
        .collect();

    tracing::debug!(
        composite = %composite.id(),
        parents = nodes.len(),
        "joined scopes"
    );

    Ok((composite, Dismiss::new(scope, watchers)))
}

/// Forward `parent`'s completion to `composite`, at most once
async fn watch_parent(name: String, parent: Node, composite: CancelScope) {
    tokio::select! {
        () = parent.done() => {
            let cause = Cause::parent(parent.id(), completion_cause(&parent));
            tracing::debug!(
                composite = %name,
                parent = %parent.id(),
                cause = %cause,
                "parent finished"
            );
            if !composite.cancel_with_cause(cause) {
                tracing::trace!(composite = %name, parent = %parent.id(), "composite already done");
            }
        }
        () = composite.done() => {
            tracing::trace!(composite = %name, parent = %parent.id(), "watcher retired");
        }
    }
}

/// What finished a done scope: its cause, else its error
pub(crate) fn completion_cause(scope: &impl Scope) -> Cause {
    scope
        .cause()
        .unwrap_or_else(|| Cause::Scope(scope.err().unwrap_or(ScopeError::Cancelled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn leaf(id: &str) -> Node {
        Node::new(id, CancelScope::new())
    }

    #[test]
    fn join_needs_a_runtime() {
        let result = join("c", &[leaf("a"), leaf("b")]);
        assert!(matches!(result, Err(JoinError::NoRuntime)));
    }

    #[test]
    fn too_few_parents_checked_before_runtime() {
        assert!(matches!(
            join("c", &[leaf("a")]),
            Err(JoinError::TooFewParents { got: 1 })
        ));
        assert!(matches!(
            join("c", &[]),
            Err(JoinError::TooFewParents { got: 0 })
        ));
    }

    #[test]
    fn completion_cause_prefers_recorded_cause() {
        let scope = CancelScope::new();
        scope.cancel_with_cause(Cause::msg("boom"));
        assert_eq!(completion_cause(&scope).to_string(), "boom");

        let clean = CancelScope::new();
        clean.cancel();
        assert_eq!(completion_cause(&clean).to_string(), "scope cancelled");
    }

    #[tokio::test]
    async fn concurrent_settled_waits_for_watchers() {
        let (_composite, dismiss) = join("c", &[leaf("a"), leaf("b")]).unwrap();
        let dismiss = std::sync::Arc::new(dismiss);

        let first = tokio::spawn({
            let dismiss = dismiss.clone();
            async move { dismiss.settled().await }
        });
        tokio::task::yield_now().await;

        let early = tokio::time::timeout(Duration::from_millis(50), dismiss.settled()).await;
        assert!(early.is_err(), "settled returned while watchers were live");

        dismiss.dismiss();
        first.await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), dismiss.settled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn spawns_one_watcher_per_parent() {
        let (composite, dismiss) = join("c", &[leaf("a"), leaf("b"), leaf("c")]).unwrap();
        assert_eq!(dismiss.watchers(), 3);
        assert!(!composite.is_done());

        assert!(dismiss.dismiss());
        assert!(!dismiss.dismiss());
        dismiss.settled().await;
        assert!(composite.is_done());
        assert!(composite.cause().is_none());
    }
}
