//! Testing utilities for the scopejoin workspace
//!
//! Shared fixtures, waits and tracing setup.

#![allow(missing_docs)]

use scopejoin::{CancelScope, Node, Scope, Value};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Upper bound for any wait in tests
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a fmt subscriber honouring `RUST_LOG`; safe to call from every test
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Leaf node plus the scope that controls it
pub fn controlled(id: &str) -> (Node, CancelScope) {
    controlled_with(id, &[])
}

/// Leaf node with values, plus the scope that controls it
pub fn controlled_with(id: &str, values: &[(&str, Value)]) -> (Node, CancelScope) {
    let scope = values
        .iter()
        .fold(CancelScope::builder(), |builder, (key, value)| {
            builder.with_value(*key, value.clone())
        })
        .build();
    (Node::new(id, scope.clone()), scope)
}

/// Leaf node nobody holds the scope of
pub fn leaf(id: &str) -> Node {
    controlled(id).0
}

/// Leaf node with a single string value
pub fn leaf_with(id: &str, key: &str, value: &str) -> Node {
    controlled_with(id, &[(key, Value::from(value))]).0
}

/// Await `scope.done()`, panicking after [`TEST_TIMEOUT`]
pub async fn wait_done(scope: &impl Scope) {
    tokio::time::timeout(TEST_TIMEOUT, scope.done())
        .await
        .expect("scope did not finish in time");
}

/// Ids of `nodes`, in order
pub fn ids(nodes: impl IntoIterator<Item = Node>) -> Vec<String> {
    nodes.into_iter().map(|n| n.id().to_string()).collect()
}
