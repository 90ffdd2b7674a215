//! Token cache
//!
//! Every issued access token is stored here, keyed by the token text, with
//! the user projection it was issued for as value. A token that is no longer
//! in the cache is treated as logged out or expired, regardless of its own
//! `exp` claim.
//!
//! Tokens are also tracked per owning user id so that every live session of
//! an account can be dropped at once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::{future::Cache, policy::EvictionPolicy};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Entry lifetime out of range: {0:?}")]
    TtlOutOfRange(Duration),
}

/// Key/value store for issued tokens with per-entry expiry
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the value stored under `key`, if it has not expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove `key`, returning whether an entry was present
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Record `key` as owned by `owner` for `ttl`
    async fn track(&self, owner: &str, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove and return every key tracked for `owner`
    async fn take_tracked(&self, owner: &str) -> Result<Vec<String>, CacheError>;
}

fn expires_at(ttl: Duration) -> Result<Instant, CacheError> {
    Instant::now()
        .checked_add(ttl)
        .ok_or(CacheError::TtlOutOfRange(ttl))
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Keys owned by one user, each with its own deadline
#[derive(Clone, Default)]
struct OwnedKeys {
    keys: Vec<(String, Instant)>,
}

impl OwnedKeys {
    fn expires_at(&self) -> Option<Instant> {
        self.keys.iter().map(|(_, at)| *at).max()
    }
}

struct TokenExpiry;

impl moka::Expiry<String, CachedToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedToken,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedToken,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

impl moka::Expiry<String, OwnedKeys> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &OwnedKeys,
        created_at: Instant,
    ) -> Option<Duration> {
        value
            .expires_at()
            .map(|at| at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &OwnedKeys,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value
            .expires_at()
            .map(|at| at.saturating_duration_since(updated_at))
    }
}

/// In-process token cache backed by a [`moka::future::Cache`]
///
/// Entries expire individually; the capacity bound evicts least recently
/// used tokens first.
pub struct InMemoryTokenCache {
    entries: Cache<String, CachedToken>,
    owners: Cache<String, OwnedKeys>,
}

impl InMemoryTokenCache {
    pub fn new(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(TokenExpiry)
            .build();
        let owners = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(TokenExpiry)
            .build();
        Self { entries, owners }
    }

    /// Number of live entries (approximate until pending tasks run)
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = CachedToken {
            value,
            expires_at: expires_at(ttl)?,
        };
        self.entries.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn track(&self, owner: &str, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = expires_at(ttl)?;
        let key = key.to_owned();

        self.owners
            .entry(owner.to_owned())
            .and_upsert_with(|current| async move {
                let now = Instant::now();
                let mut owned = current.map(|e| e.into_value()).unwrap_or_default();
                owned.keys.retain(|(_, at)| *at > now);
                owned.keys.push((key, deadline));
                owned
            })
            .await;
        Ok(())
    }

    async fn take_tracked(&self, owner: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .owners
            .remove(owner)
            .await
            .map(|owned| {
                owned
                    .keys
                    .into_iter()
                    .filter(|(_, at)| *at > now)
                    .map(|(key, _)| key)
                    .collect()
            })
            .unwrap_or_default())
    }
}
