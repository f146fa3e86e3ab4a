//! Stream contract types shared by stores and the stream dispatcher.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::document::RetrievedDoc;
use crate::result::AppResult;

/// Notified when a stream delivers a write-like event.
pub type StreamWriteFn = Arc<dyn Fn(&RetrievedDoc) + Send + Sync>;

/// Notified when a stream delivers a deletion, with the document id.
pub type StreamDeleteFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Cancels one store's stream. Calling it more than once is harmless.
pub type StopFn = Arc<dyn Fn() + Send + Sync>;

/// Hooks contributed by stores during stream setup.
///
/// Stores receive this table in execution order. A store may register
/// callbacks for itself and may snapshot the callbacks registered by the
/// stores before it, to invoke them whenever its own stream delivers data.
#[derive(Clone, Default)]
pub struct NextStoresStream {
    /// Invoked for documents that were added.
    pub inserted: Vec<StreamWriteFn>,
    /// Invoked for documents that were deep-merged.
    pub merged: Vec<StreamWriteFn>,
    /// Invoked for documents that were assigned.
    pub assigned: Vec<StreamWriteFn>,
    /// Invoked for documents that were replaced.
    pub replaced: Vec<StreamWriteFn>,
    /// Invoked for documents that were deleted.
    pub deleted: Vec<StreamDeleteFn>,
}

impl NextStoresStream {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of registered callbacks.
    pub fn len(&self) -> usize {
        self.inserted.len()
            + self.merged.len()
            + self.assigned.len()
            + self.replaced.len()
            + self.deleted.len()
    }

    /// Returns `true` if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every `inserted` callback.
    pub fn notify_inserted(&self, doc: &RetrievedDoc) {
        for f in &self.inserted {
            f(doc);
        }
    }

    /// Invokes every `merged` callback.
    pub fn notify_merged(&self, doc: &RetrievedDoc) {
        for f in &self.merged {
            f(doc);
        }
    }

    /// Invokes every `assigned` callback.
    pub fn notify_assigned(&self, doc: &RetrievedDoc) {
        for f in &self.assigned {
            f(doc);
        }
    }

    /// Invokes every `replaced` callback.
    pub fn notify_replaced(&self, doc: &RetrievedDoc) {
        for f in &self.replaced {
            f(doc);
        }
    }

    /// Invokes every `deleted` callback.
    pub fn notify_deleted(&self, id: &str) {
        for f in &self.deleted {
            f(id);
        }
    }
}

impl fmt::Debug for NextStoresStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextStoresStream")
            .field("inserted", &self.inserted.len())
            .field("merged", &self.merged.len())
            .field("assigned", &self.assigned.len())
            .field("replaced", &self.replaced.len())
            .field("deleted", &self.deleted.len())
            .finish()
    }
}

/// A live subscription opened by one store.
pub struct StoreStream {
    /// Resolves when the stream ends (normally after `stop`), rejects if the
    /// subscription fails.
    pub streaming: BoxFuture<'static, AppResult<()>>,
    /// Cancels the subscription.
    pub stop: StopFn,
}

impl fmt::Debug for StoreStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreStream").finish_non_exhaustive()
    }
}
