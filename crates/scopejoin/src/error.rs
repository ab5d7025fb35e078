//! Error types for scopejoin
//!
//! Three families:
//! - [`ScopeError`]: why a scope is done
//! - [`Cause`]: the recorded reason a scope was cancelled, chained through joins
//! - [`JoinError`]: construction failures for [`join`](crate::join) and [`merge`](crate::merge)

use std::sync::Arc;

/// Why a scope reports itself done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ScopeError {
    /// Cancelled explicitly, with or without a cause
    #[error("scope cancelled")]
    Cancelled,

    /// A deadline or timeout elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Recorded cause of a cancellation
///
/// Causes propagated by a join nest: each composite wraps the failing
/// parent's cause in a [`Cause::Parent`] frame, so the display text reads
/// outermost parent first, e.g. `"db: pool: connection reset"`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Cause {
    /// Free-form reason supplied by the caller
    #[error("{0}")]
    Message(String),

    /// A scope's own completion error, used when it carried no cause
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// A parent finished; `source` is what finished it
    #[error("{id}: {source}")]
    Parent {
        /// Id (or label) of the parent that fired first
        id: String,
        /// The parent's own cause
        #[source]
        source: Box<Cause>,
    },

    /// Any other error
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl Cause {
    /// Create a message cause
    #[inline]
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error
    #[inline]
    #[must_use]
    pub fn other(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Arc::new(error))
    }

    /// Wrap `source` in a parent frame tagged with `id`
    #[inline]
    #[must_use]
    pub fn parent(id: impl Into<String>, source: Cause) -> Self {
        Self::Parent {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Id of the outermost parent frame, if this cause was propagated
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::Parent { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Parent ids from outermost to innermost
    #[must_use]
    pub fn chain(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut current = self;
        while let Self::Parent { id, source } = current {
            ids.push(id.as_str());
            current = source;
        }
        ids
    }

    /// Innermost cause below every parent frame
    #[must_use]
    pub fn root(&self) -> &Cause {
        let mut current = self;
        while let Self::Parent { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Construction errors for joins and merges
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// Join needs at least two parents
    #[error("join requires at least two parents, got {got}")]
    TooFewParents {
        /// Number of parents supplied
        got: usize,
    },

    /// Two parents share an id and the config rejects duplicates
    #[error("duplicate parent id: {0}")]
    DuplicateParent(String),

    /// Watchers need a tokio runtime to run on
    #[error("no tokio runtime available to spawn watchers")]
    NoRuntime,
}
