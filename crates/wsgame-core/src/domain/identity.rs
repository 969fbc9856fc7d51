//! Connection identities.
//!
//! # Why integers? (for beginners)
//!
//! Every accepted WebSocket gets a small integer id the moment it is accepted.
//! Components that need to talk about a connection (the broadcast bus, the
//! shutdown coordinator, log lines) carry this id instead of a pointer to the
//! connection itself.  Only the server's registry owns the connection; anyone
//! else looks it up by id.  That keeps ownership a simple tree with no cycles.
//!
//! # Thread safety
//!
//! [`ConnectionIdAllocator`] uses an `AtomicU64`, so any number of accept
//! tasks can request ids concurrently without a lock and without two of them
//! ever receiving the same value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Stable identity of one accepted connection.
///
/// Displays as the bare integer so log lines read `connection 7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw integer id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Lock-free, monotonically increasing source of [`ConnectionId`]s.
///
/// The first id handed out is `1`.  The counter wraps from `u64::MAX` back to
/// `0` without panicking, which no real process will ever reach.
///
/// # Examples
///
/// ```rust
/// use wsgame_core::ConnectionIdAllocator;
///
/// let ids = ConnectionIdAllocator::new();
/// assert_eq!(ids.next().get(), 1);
/// assert_eq!(ids.next().get(), 2);
/// ```
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    /// Creates an allocator whose first id is `1`.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id and atomically advances the counter.
    ///
    /// `Ordering::Relaxed` is enough: uniqueness comes from the atomic
    /// read-modify-write itself, and ids carry no memory-ordering meaning.
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the id the next call to [`next`](Self::next) will produce.
    pub fn peek(&self) -> ConnectionId {
        ConnectionId(self.next.load(Ordering::Relaxed))
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_allocator_starts_at_one() {
        // Arrange
        let ids = ConnectionIdAllocator::new();

        // Act
        let first = ids.next();

        // Assert
        assert_eq!(first, ConnectionId::new(1));
    }

    #[test]
    fn test_allocator_increments_monotonically() {
        let ids = ConnectionIdAllocator::new();

        let values: Vec<ConnectionId> = (0..100).map(|_| ids.next()).collect();

        for window in values.windows(2) {
            assert!(window[1] > window[0], "ids must be strictly increasing");
        }
    }

    #[test]
    fn test_allocator_wraps_at_u64_max() {
        // Arrange – start one step before overflow
        let ids = ConnectionIdAllocator {
            next: AtomicU64::new(u64::MAX),
        };

        // Act
        let before_wrap = ids.next();
        let after_wrap = ids.next();

        // Assert
        assert_eq!(before_wrap.get(), u64::MAX);
        assert_eq!(after_wrap.get(), 0);
    }

    #[test]
    fn test_allocator_is_unique_across_threads() {
        // Arrange
        let ids = Arc::new(ConnectionIdAllocator::new());
        let thread_count = 8;
        let per_thread = 1000;

        // Act – allocate from many threads at once
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..per_thread).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let all: HashSet<ConnectionId> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert – no id was handed out twice
        assert_eq!(all.len(), thread_count * per_thread);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let ids = ConnectionIdAllocator::new();
        ids.next();

        let peeked = ids.peek();
        let next = ids.next();

        assert_eq!(peeked, ConnectionId::new(2));
        assert_eq!(next, ConnectionId::new(2));
    }

    #[test]
    fn test_connection_id_displays_as_bare_integer() {
        assert_eq!(ConnectionId::new(42).to_string(), "42");
    }

    #[test]
    fn test_connection_id_serializes_transparently() {
        let json = serde_json::to_string(&ConnectionId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
