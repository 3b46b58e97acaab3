//! Change transport backed by Postgres LISTEN/NOTIFY
//!
//! One [`PgChangeTransport`] holds a single listener connection for the whole
//! process. Every relay opens a logical channel on it and receives the raw
//! change notifications plus connection status transitions.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use sqlx::{postgres::PgListener, PgPool};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, warn};

use crate::{error::AppResult, models::RawChange};

/// Postgres channel the change triggers notify on
pub const CHANGE_CHANNEL: &str = "watchclub_changes";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection-level status reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

#[derive(Debug, Clone)]
pub enum TransportMessage {
    Status(ChannelStatus),
    Change(RawChange),
}

/// Shared realtime connection relays subscribe through
#[async_trait::async_trait]
pub trait ChangeTransport: Send + Sync {
    /// Opens a named logical channel on the shared connection
    async fn open(&self, channel: &str) -> AppResult<broadcast::Receiver<TransportMessage>>;

    fn is_connected(&self) -> bool;
}

/// Linear reconnect delay: one second per failed attempt, capped
pub fn backoff_delay(attempt: u32, max: Duration) -> Duration {
    Duration::from_secs(attempt.max(1) as u64).min(max)
}

pub struct PgChangeTransport {
    message_tx: broadcast::Sender<TransportMessage>,
    shutdown_tx: broadcast::Sender<()>,
    connected: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PgChangeTransport {
    /// Spawns the listener loop; the connection is established in the background
    pub fn connect(pool: PgPool, max_backoff: Duration) -> Self {
        let (message_tx, _) = broadcast::channel(1024);
        let (shutdown_tx, _) = broadcast::channel(1);
        let connected = Arc::new(AtomicBool::new(false));

        let listener = ListenLoop {
            pool,
            max_backoff,
            message_tx: message_tx.clone(),
            shutdown_rx: shutdown_tx.subscribe(),
            connected: connected.clone(),
        };
        let task = tokio::spawn(listener.run());

        Self {
            message_tx,
            shutdown_tx,
            connected,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops the listener loop and waits for it to exit
    pub async fn disconnect(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Change listener task failed: {}", e);
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ChangeTransport for PgChangeTransport {
    async fn open(&self, channel: &str) -> AppResult<broadcast::Receiver<TransportMessage>> {
        debug!(channel, "Opening change channel");
        Ok(self.message_tx.subscribe())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

struct ListenLoop {
    pool: PgPool,
    max_backoff: Duration,
    message_tx: broadcast::Sender<TransportMessage>,
    shutdown_rx: broadcast::Receiver<()>,
    connected: Arc<AtomicBool>,
}

enum Disconnect {
    Shutdown,
    Lost(ChannelStatus),
}

impl ListenLoop {
    async fn run(mut self) {
        let mut attempt = 0u32;

        loop {
            match self.listen().await {
                Disconnect::Shutdown => break,
                Disconnect::Lost(status) => {
                    self.connected.store(false, Ordering::SeqCst);
                    self.publish(TransportMessage::Status(status));
                }
            }

            attempt += 1;
            let delay = backoff_delay(attempt, self.max_backoff);
            info!("Reconnecting change listener in {:?} (attempt {})", delay, attempt);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown_rx.recv() => break,
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        self.publish(TransportMessage::Status(ChannelStatus::Closed));
        info!("Change listener stopped");
    }

    async fn listen(&mut self) -> Disconnect {
        let connect = tokio::time::timeout(CONNECT_TIMEOUT, PgListener::connect_with(&self.pool));
        let mut listener = tokio::select! {
            _ = self.shutdown_rx.recv() => return Disconnect::Shutdown,
            result = connect => match result {
                Ok(Ok(listener)) => listener,
                Ok(Err(e)) => {
                    error!("Change listener connect failed: {}", e);
                    return Disconnect::Lost(ChannelStatus::ChannelError);
                }
                Err(_) => {
                    warn!("Change listener connect timed out after {:?}", CONNECT_TIMEOUT);
                    return Disconnect::Lost(ChannelStatus::TimedOut);
                }
            },
        };

        if let Err(e) = listener.listen(CHANGE_CHANNEL).await {
            error!("LISTEN {} failed: {}", CHANGE_CHANNEL, e);
            return Disconnect::Lost(ChannelStatus::ChannelError);
        }

        self.connected.store(true, Ordering::SeqCst);
        self.publish(TransportMessage::Status(ChannelStatus::Subscribed));
        info!("Listening for changes on {}", CHANGE_CHANNEL);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => return Disconnect::Shutdown,
                received = listener.try_recv() => match received {
                    Ok(Some(notification)) => {
                        match serde_json::from_str::<RawChange>(notification.payload()) {
                            Ok(change) => self.publish(TransportMessage::Change(change)),
                            Err(e) => warn!("Ignoring malformed change payload: {}", e),
                        }
                    }
                    Ok(None) => {
                        warn!("Change listener connection lost");
                        return Disconnect::Lost(ChannelStatus::ChannelError);
                    }
                    Err(e) => {
                        error!("Change listener error: {}", e);
                        return Disconnect::Lost(ChannelStatus::ChannelError);
                    }
                },
            }
        }
    }

    fn publish(&self, message: TransportMessage) {
        // No open channels is fine
        let _ = self.message_tx.send(message);
    }
}

/// Lazily creates the process-wide transport and tears it down on demand
pub struct TransportFactory {
    pool: PgPool,
    max_backoff: Duration,
    transport: Mutex<Option<Arc<PgChangeTransport>>>,
}

impl TransportFactory {
    pub fn new(pool: PgPool, max_backoff: Duration) -> Self {
        Self {
            pool,
            max_backoff,
            transport: Mutex::new(None),
        }
    }

    /// Returns the memoized transport, connecting on first use
    pub async fn get_or_connect(&self) -> Arc<PgChangeTransport> {
        let mut slot = self.transport.lock().await;
        match slot.as_ref() {
            Some(transport) => transport.clone(),
            None => {
                let transport = Arc::new(PgChangeTransport::connect(
                    self.pool.clone(),
                    self.max_backoff,
                ));
                *slot = Some(transport.clone());
                transport
            }
        }
    }

    /// Disconnects and forgets the transport; the next call reconnects
    pub async fn teardown(&self) {
        let transport = self.transport.lock().await.take();
        if let Some(transport) = transport {
            transport.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn unreachable_pool() -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://watchclub@127.0.0.1:9/watchclub")
            .unwrap()
    }

    #[test]
    fn test_backoff_is_linear_and_capped() {
        let max = Duration::from_secs(10);
        assert_eq!(backoff_delay(1, max), Duration::from_secs(1));
        assert_eq!(backoff_delay(4, max), Duration::from_secs(4));
        assert_eq!(backoff_delay(10, max), Duration::from_secs(10));
        assert_eq!(backoff_delay(25, max), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_factory_memoizes_until_teardown() {
        let factory = TransportFactory::new(unreachable_pool(), Duration::from_secs(1));

        let first = factory.get_or_connect().await;
        let second = factory.get_or_connect().await;
        assert!(Arc::ptr_eq(&first, &second));

        factory.teardown().await;
        assert!(!first.is_connected());

        let third = factory.get_or_connect().await;
        assert!(!Arc::ptr_eq(&first, &third));
        factory.teardown().await;
    }

    #[tokio::test]
    async fn test_teardown_without_connection_is_noop() {
        let factory = TransportFactory::new(unreachable_pool(), Duration::from_secs(1));
        factory.teardown().await;
        factory.teardown().await;
    }
}
