//! scopejoin - Joinable cancellation scopes
//!
//! A tree of named execution contexts where:
//! - Every node wraps a cancellable [`Scope`]
//! - [`join`] combines two or more nodes into a composite that is cancelled
//!   as soon as any parent is done, recording which parent fired and why
//! - Value lookup falls back breadth-first through the ancestor graph
//! - [`merge`] unions the lifetimes of two plain scopes
//!
//! # Example
//!
//! ```rust,ignore
//! use scopejoin::prelude::*;
//!
//! # async fn example() -> Result<(), JoinError> {
//! let db = CancelScope::builder().with_value("say", "hello").build();
//! let cache = CancelScope::new();
//!
//! let (derived, dismiss) = join(
//!     "derived",
//!     &[Node::new("db", db.clone()), Node::new("cache", cache)],
//! )?;
//!
//! db.cancel_with_cause(Cause::msg("connection reset"));
//! derived.done().await;
//! assert_eq!(derived.cause().unwrap().to_string(), "db: connection reset");
//!
//! dismiss.dismiss();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod join;
pub mod merge;
pub mod node;
pub mod scope;

// Re-exports
pub use config::{DuplicatePolicy, JoinConfig, MergeConfig};
pub use error::{Cause, JoinError, ScopeError};
pub use join::{join, join_with, Dismiss};
pub use merge::{merge, merge_with};
pub use node::{Ancestors, Node};
pub use scope::{CancelScope, Scope, ScopeBuilder, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with scopejoin
    pub use crate::{
        join, merge, Cause, CancelScope, Dismiss, JoinError, Node, Scope, ScopeError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
