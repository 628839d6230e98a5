//! Request-id filter for at-most-once dispatch.
//!
//! Every id is remembered the first time it is seen. Unbounded by default,
//! which holds the guarantee for the lifetime of the process at the cost of
//! memory that grows with the number of distinct ids. A capacity bounds the
//! memory by forgetting the least recently seen ids; a forgotten id can be
//! dispatched again.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Tracks request ids that have already been dispatched.
#[derive(Debug)]
pub struct AtMostOnceFilter {
    seen: Mutex<LruCache<i64, ()>>,
}

impl AtMostOnceFilter {
    /// A filter that never forgets an id.
    pub fn unbounded() -> Self {
        Self {
            seen: Mutex::new(LruCache::unbounded()),
        }
    }

    /// A filter that remembers at most `capacity` ids.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Mark `id` as seen.
    ///
    /// Returns `true` only for the first caller to present `id`; concurrent
    /// callers racing on the same id cannot both get `true`.
    pub fn check_and_mark(&self, id: i64) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.put(id, ()).is_none()
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AtMostOnceFilter {
    fn default() -> Self {
        Self::unbounded()
    }
}
