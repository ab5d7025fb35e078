//! Cancellation union of two plain scopes
//!
//! Unlike [`join`](crate::join), [`merge`] works on any two [`Scope`]s,
//! not just nodes, and yields a bare [`CancelScope`] with no parent
//! introspection. Causes are labelled from each input's `name` value.

use crate::config::MergeConfig;
use crate::error::{Cause, JoinError};
use crate::join::{completion_cause, Dismiss};
use crate::scope::{CancelScope, Scope};
use tokio::runtime::Handle;

/// Merge `a` and `b` with default configuration
///
/// # Errors
/// `JoinError::NoRuntime` outside a tokio runtime
pub fn merge<A, B>(a: A, b: B) -> Result<(CancelScope, Dismiss), JoinError>
where
    A: Scope + 'static,
    B: Scope + 'static,
{
    merge_with(&MergeConfig::default(), a, b)
}

/// Merge `a` and `b` into a scope cancelled when either is done
///
/// The cause is the finished input's cause wrapped with its label: the
/// string stored under `config.name_key`, or the positional fallback
/// label. A single forwarding task acts at most once and exits as soon as
/// either input or the merged scope is done.
///
/// # Errors
/// `JoinError::NoRuntime` outside a tokio runtime
pub fn merge_with<A, B>(config: &MergeConfig, a: A, b: B) -> Result<(CancelScope, Dismiss), JoinError>
where
    A: Scope + 'static,
    B: Scope + 'static,
{
    let runtime = Handle::try_current().map_err(|_| JoinError::NoRuntime)?;

    let a_label = label(&a, &config.name_key, &config.first_label);
    let b_label = label(&b, &config.name_key, &config.second_label);
    tracing::debug!(first = %a_label, second = %b_label, "merged scopes");

    let merged = CancelScope::new();
    let task = runtime.spawn(forward(
        Labelled { label: a_label, scope: a },
        Labelled { label: b_label, scope: b },
        merged.clone(),
    ));

    Ok((merged.clone(), Dismiss::new(merged, vec![task])))
}

struct Labelled<S> {
    label: String,
    scope: S,
}

impl<S: Scope> Labelled<S> {
    fn fire(&self, merged: &CancelScope) {
        let cause = Cause::parent(self.label.clone(), completion_cause(&self.scope));
        tracing::debug!(input = %self.label, cause = %cause, "merged input finished");
        merged.cancel_with_cause(cause);
    }
}

async fn forward<A: Scope, B: Scope>(a: Labelled<A>, b: Labelled<B>, merged: CancelScope) {
    tokio::select! {
        () = a.scope.done() => a.fire(&merged),
        () = b.scope.done() => b.fire(&merged),
        () = merged.done() => {
            tracing::trace!("merged scope done; forwarder retired");
        }
    }
}

fn label(scope: &impl Scope, key: &str, fallback: &str) -> String {
    scope
        .value(key)
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| fallback.to_string())
}
