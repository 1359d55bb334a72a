use std::collections::HashMap;

use anyhow::Context as _;
use chrono::Utc;
use deadpool_redis::Pool;
use deadpool_redis::redis::{self, AsyncCommands};

use crate::domain::repository::{
    CooldownRecord, CounterRecord, RateLimitSnapshot, RateLimitStore,
};
use crate::error::SequencerError;

/// Rate-limit counters and cooldowns as Redis hashes.
///
/// `ratelimit:{scope}:{id}` holds `count`, `last_updated`, `limit`;
/// `cooldown:contact:{id}` holds `remaining_ms`, `set_at`.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    pub pool: Pool,
}

fn field<T: std::str::FromStr>(hash: &HashMap<String, String>, name: &str) -> Option<T> {
    hash.get(name).and_then(|v| v.parse().ok())
}

fn counter_from_hash(hash: HashMap<String, String>) -> Option<CounterRecord> {
    if hash.is_empty() {
        return None;
    }
    Some(CounterRecord {
        count: field(&hash, "count").unwrap_or(0),
        last_updated: field(&hash, "last_updated").unwrap_or(0),
        limit: field(&hash, "limit").unwrap_or(0),
    })
}

fn cooldown_from_hash(hash: HashMap<String, String>) -> Option<CooldownRecord> {
    if hash.is_empty() {
        return None;
    }
    Some(CooldownRecord {
        remaining_ms: field(&hash, "remaining_ms").unwrap_or(0),
        set_at: field(&hash, "set_at").unwrap_or(0),
    })
}

impl RedisRateLimitStore {
    async fn conn(&self) -> Result<deadpool_redis::Connection, SequencerError> {
        self.pool
            .get()
            .await
            .map_err(|e| SequencerError::Storage(e.into()))
    }
}

impl RateLimitStore for RedisRateLimitStore {
    async fn fetch(
        &self,
        counter_keys: &[String],
        cooldown_key: Option<&str>,
    ) -> Result<RateLimitSnapshot, SequencerError> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        for key in counter_keys {
            pipe.hgetall(key);
        }
        if let Some(key) = cooldown_key {
            pipe.hgetall(key);
        }
        let mut hashes: Vec<HashMap<String, String>> = pipe
            .query_async(&mut conn)
            .await
            .context("fetch rate limit state")?;

        let cooldown = match cooldown_key {
            Some(_) => hashes.pop().and_then(cooldown_from_hash),
            None => None,
        };
        Ok(RateLimitSnapshot {
            counters: hashes.into_iter().map(counter_from_hash).collect(),
            cooldown,
        })
    }

    async fn increment(
        &self,
        counter_keys: &[String],
        limit: u64,
        ttl_secs: u64,
    ) -> Result<(), SequencerError> {
        if counter_keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp_millis();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in counter_keys {
            pipe.hincr(key, "count", 1)
                .ignore()
                .hset(key, "last_updated", now)
                .ignore()
                .hset(key, "limit", limit)
                .ignore()
                .expire(key, ttl_secs as i64)
                .ignore();
        }
        let (): () = pipe
            .query_async(&mut conn)
            .await
            .context("increment rate limit counters")?;
        Ok(())
    }

    async fn set_cooldown(
        &self,
        key: &str,
        duration_ms: u64,
        set_at: i64,
    ) -> Result<(), SequencerError> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(
                key,
                &[("remaining_ms", duration_ms as i64), ("set_at", set_at)],
            )
            .ignore()
            .pexpire(key, duration_ms as i64)
            .ignore();
        let (): () = pipe
            .query_async(&mut conn)
            .await
            .context("set contact cooldown")?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), SequencerError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let (): () = conn.del(keys).await.context("delete rate limit keys")?;
        Ok(())
    }
}
