//! Cache entry with expiry bookkeeping.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: Instant,
    /// `None` when the TTL reaches past what `Instant` can represent.
    pub expires_at: Option<Instant>,
    ttl: Duration,
    pub last_accessed_at: Instant,
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            key: key.into(),
            value,
            created_at: now,
            expires_at: now.checked_add(ttl),
            ttl,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        match self.expires_at {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_accessed_at = Instant::now();
        self.access_count = self.access_count.saturating_add(1);
    }
}
