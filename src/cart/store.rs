use super::StoredCart;
use crate::errors::ServiceError;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::debug;

/// Session-scoped persistence for carts. Every mutation in the cart service
/// writes through immediately; the store is the only persistence boundary
/// for cart state.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Loads the cart for a session, or an empty cart if none is stored.
    async fn fetch(&self, session_id: &str) -> Result<StoredCart, ServiceError>;

    /// Persists the full cart for a session.
    async fn save(&self, session_id: &str, cart: &StoredCart) -> Result<(), ServiceError>;

    /// Drops the session's cart entirely.
    async fn clear(&self, session_id: &str) -> Result<(), ServiceError>;
}

/// Redis-backed store: one JSON document per session key with a TTL, so
/// abandoned carts expire with their sessions.
pub struct RedisCartStore {
    client: Arc<redis::Client>,
    ttl_secs: u64,
}

impl RedisCartStore {
    pub fn new(client: Arc<redis::Client>, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    fn key(session_id: &str) -> String {
        format!("cart:{}", session_id)
    }
}

#[async_trait]
impl CartStore for RedisCartStore {
    async fn fetch(&self, session_id: &str) -> Result<StoredCart, ServiceError> {
        let mut conn = self.client.get_async_connection().await?;
        let raw: Option<String> = conn.get(Self::key(session_id)).await?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(StoredCart::default()),
        }
    }

    async fn save(&self, session_id: &str, cart: &StoredCart) -> Result<(), ServiceError> {
        let mut conn = self.client.get_async_connection().await?;
        let json = serde_json::to_string(cart)?;
        let _: () = conn
            .set_ex(Self::key(session_id), json, self.ttl_secs as usize)
            .await?;
        debug!(session_id, "cart saved");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), ServiceError> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.del(Self::key(session_id)).await?;
        Ok(())
    }
}

/// In-memory store used by tests and local development. No TTL semantics;
/// entries live for the process lifetime.
#[derive(Default)]
pub struct InMemoryCartStore {
    carts: DashMap<String, StoredCart>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn fetch(&self, session_id: &str) -> Result<StoredCart, ServiceError> {
        Ok(self
            .carts
            .get(session_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &str, cart: &StoredCart) -> Result<(), ServiceError> {
        self.carts.insert(session_id.to_string(), cart.clone());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), ServiceError> {
        self.carts.remove(session_id);
        Ok(())
    }
}
