use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::Mutex;
use tracing::info;

use super::{
    feed::{ChangeFeedRelay, SubscriptionSpec},
    filter::ChangeFilter,
    transport::ChangeTransport,
};
use crate::{
    db::{BoardSource, ResultsSource},
    error::AppResult,
    models::WatchedCollection,
};

/// One relay per logical channel, shared by every stream that needs it
pub struct RelayHub {
    transport: Arc<dyn ChangeTransport>,
    board: Arc<dyn BoardSource>,
    results: Arc<dyn ResultsSource>,
    enabled: AtomicBool,
    relays: Mutex<HashMap<String, Arc<ChangeFeedRelay>>>,
}

impl RelayHub {
    pub fn new(
        transport: Arc<dyn ChangeTransport>,
        board: Arc<dyn BoardSource>,
        results: Arc<dyn ResultsSource>,
        enabled: bool,
    ) -> Self {
        Self {
            transport,
            board,
            results,
            enabled: AtomicBool::new(enabled),
            relays: Mutex::new(HashMap::new()),
        }
    }

    /// Shared board feed
    pub async fn board(&self) -> AppResult<Arc<ChangeFeedRelay>> {
        self.relay_for(SubscriptionSpec {
            channel: "board".to_string(),
            collections: vec![WatchedCollection::BoardPosts],
            filter: None,
        })
        .await
    }

    /// Results feed scoped to one edition
    pub async fn oscar_results(&self, edition_id: i64) -> AppResult<Arc<ChangeFeedRelay>> {
        self.relay_for(SubscriptionSpec {
            channel: format!("oscar-results:{}", edition_id),
            collections: vec![WatchedCollection::OscarResults],
            filter: Some(ChangeFilter::eq("edition_id", edition_id)),
        })
        .await
    }

    async fn relay_for(&self, spec: SubscriptionSpec) -> AppResult<Arc<ChangeFeedRelay>> {
        let mut relays = self.relays.lock().await;
        if let Some(relay) = relays.get(&spec.channel) {
            return Ok(relay.clone());
        }

        let relay = Arc::new(ChangeFeedRelay::new(
            self.transport.clone(),
            self.board.clone(),
            self.results.clone(),
            self.is_enabled(),
        ));
        relay.subscribe(spec.clone()).await?;
        relays.insert(spec.channel, relay.clone());

        Ok(relay)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flips every relay, current and future, without recreating any
    pub async fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        self.enabled.store(enabled, Ordering::SeqCst);
        let relays = self.relays.lock().await;
        for relay in relays.values() {
            relay.set_enabled(enabled).await?;
        }
        info!(enabled, relays = relays.len(), "Change relays toggled");
        Ok(())
    }

    /// Unsubscribes and drops every relay
    pub async fn shutdown(&self) {
        let mut relays = self.relays.lock().await;
        for relay in relays.values() {
            relay.unsubscribe();
        }
        relays.clear();
    }
}
