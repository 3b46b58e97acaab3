use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, AppResult};

/// Keys for values cached in Redis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// TMDB movie details (with credits) by TMDB id
    MovieDetails(i64),
    /// Composed daily recommendation view by date
    RecommendationView(chrono::NaiveDate),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::MovieDetails(id) => write!(f, "watchclub:tmdb:movie:{}", id),
            CacheKey::RecommendationView(date) => {
                write!(f, "watchclub:recommendation:{}", date.format("%Y-%m-%d"))
            }
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

struct PendingWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Read-through cache with write-behind persistence
///
/// Reads go straight to Redis. Writes are queued to a background task so a
/// slow Redis never delays the caller.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    write_tx: mpsc::UnboundedSender<PendingWrite>,
}

/// Stops the write-behind task after draining queued writes
pub struct CacheWriterHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Connects to Redis and spawns the write-behind task
    pub async fn connect(client: Client) -> AppResult<(Self, CacheWriterHandle)> {
        let conn = ConnectionManager::new(client).await?;
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(Self::drain_writes(conn.clone(), write_rx, shutdown_rx));

        Ok((
            Self { conn, write_tx },
            CacheWriterHandle { shutdown_tx, task },
        ))
    }

    async fn drain_writes(
        mut conn: ConnectionManager,
        mut write_rx: mpsc::UnboundedReceiver<PendingWrite>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                Some(write) = write_rx.recv() => {
                    Self::apply(&mut conn, write).await;
                }
                _ = &mut shutdown_rx => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(write) = write_rx.recv().await {
                        Self::apply(&mut conn, write).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed, "Cache writer stopped");
                    break;
                }
            }
        }
    }

    async fn apply(conn: &mut ConnectionManager, write: PendingWrite) {
        let result: redis::RedisResult<()> = conn.set_ex(&write.key, write.value, write.ttl).await;
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %write.key, "Cache write failed");
        }
    }

    /// Returns the cached value for `key`, or `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })
            })
            .transpose()
    }

    /// Queues a write; returns immediately
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            value,
            ttl,
        };
        if self.write_tx.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer gone, dropping write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_movie_details() {
        assert_eq!(
            CacheKey::MovieDetails(603).to_string(),
            "watchclub:tmdb:movie:603"
        );
    }

    #[test]
    fn test_cache_key_recommendation_view() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(
            CacheKey::RecommendationView(date).to_string(),
            "watchclub:recommendation:2025-03-14"
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_write_behind_flushes_on_shutdown() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::connect(client).await.unwrap();

        let key = CacheKey::MovieDetails(-1);
        cache.set_in_background(&key, &vec!["flushed"], 60);
        handle.shutdown().await;

        let stored: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(stored, Some(vec!["flushed".to_string()]));
    }
}
