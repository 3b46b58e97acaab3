use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

use super::{
    filter::ChangeFilter,
    transport::{ChangeTransport, ChannelStatus, TransportMessage},
};
use crate::{
    db::{BoardSource, ResultsSource},
    error::{AppError, AppResult},
    models::{ChangeEvent, ChangeOp, RawChange, WatchedCollection},
};

/// Connection state of one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Disconnected,
    Connecting,
    Subscribed,
}

/// What a relay listens to
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    pub channel: String,
    pub collections: Vec<WatchedCollection>,
    pub filter: Option<ChangeFilter>,
}

impl SubscriptionSpec {
    pub fn accepts(&self, raw: &RawChange) -> bool {
        let watched = WatchedCollection::from_table(&raw.table)
            .is_some_and(|c| self.collections.contains(&c));
        watched && self.filter.as_ref().map_or(true, |f| f.matches(raw))
    }
}

/// Re-fetch side of a relay, shared with its pump and in-flight lookups
#[derive(Clone)]
struct RelayContext {
    board: Arc<dyn BoardSource>,
    results: Arc<dyn ResultsSource>,
    events_tx: broadcast::Sender<ChangeEvent>,
    status_tx: Arc<watch::Sender<RelayStatus>>,
}

impl RelayContext {
    fn on_status(&self, channel: &str, status: ChannelStatus) {
        match status {
            ChannelStatus::Subscribed => {
                info!(channel, "Relay subscribed");
                self.status_tx.send_replace(RelayStatus::Subscribed);
            }
            other => {
                warn!(channel, status = ?other, "Relay lost its channel");
                self.status_tx.send_replace(RelayStatus::Disconnected);
            }
        }
    }

    /// Turns a raw change into application events by re-reading the
    /// authoritative, joined state
    async fn resolve(&self, raw: RawChange) -> AppResult<Vec<ChangeEvent>> {
        let collection = WatchedCollection::from_table(&raw.table)
            .ok_or_else(|| AppError::RelayTransport(format!("Unwatched table {}", raw.table)))?;
        let id = raw
            .row_id()
            .ok_or_else(|| AppError::RelayTransport(format!("Change on {} without id", raw.table)))?;

        let events = match (collection, raw.op) {
            (WatchedCollection::BoardPosts, ChangeOp::Delete) => {
                vec![ChangeEvent::BoardPostDeleted { id }]
            }
            // A row deleted before the lookup yields nothing; its delete follows
            (WatchedCollection::BoardPosts, _) => self
                .board
                .board_post(id)
                .await?
                .map(|post| ChangeEvent::BoardPostUpserted { post })
                .into_iter()
                .collect(),
            // Removing a result changes the standings, so the edition's
            // leaderboard is re-read after the bare delete
            (WatchedCollection::OscarResults, ChangeOp::Delete) => {
                let edition_id = edition_of(&raw);
                let mut events = vec![ChangeEvent::OscarResultDeleted { id, edition_id }];
                if let Some(edition_id) = edition_id {
                    match self.refreshed(edition_id).await {
                        Ok(event) => events.push(event),
                        Err(e) => warn!(edition_id, error = %e, "Leaderboard refresh after delete failed"),
                    }
                }
                events
            }
            (WatchedCollection::OscarResults, _) => {
                let edition_id = edition_of(&raw).ok_or_else(|| {
                    AppError::RelayTransport(format!("Result {} without edition", id))
                })?;
                vec![self.refreshed(edition_id).await?]
            }
        };

        Ok(events)
    }

    async fn refreshed(&self, edition_id: i64) -> AppResult<ChangeEvent> {
        let leaderboard = self.results.leaderboard(edition_id).await?;
        Ok(ChangeEvent::OscarResultsRefreshed {
            edition_id,
            leaderboard,
        })
    }

    async fn relay(self, raw: RawChange) {
        let table = raw.table.clone();
        match self.resolve(raw).await {
            Ok(events) => {
                for event in events {
                    debug!(event = event.name(), "Relaying change");
                    let _ = self.events_tx.send(event);
                }
            }
            Err(e) => warn!(table = %table, error = %e, "Dropping change"),
        }
    }
}

fn edition_of(raw: &RawChange) -> Option<i64> {
    raw.column("edition_id").and_then(|v| v.parse().ok())
}

#[derive(Default)]
struct RelayState {
    enabled: bool,
    spec: Option<SubscriptionSpec>,
    pump: Option<JoinHandle<()>>,
}

/// Subscribes to one logical channel and republishes its changes as
/// application events
///
/// Changes on the channel are resolved concurrently: each insert or update
/// triggers its own re-fetch and events are published in completion order.
/// Consumers reconcile by key (see [`super::reconcile::LiveCollection`]).
pub struct ChangeFeedRelay {
    transport: Arc<dyn ChangeTransport>,
    context: RelayContext,
    state: Mutex<RelayState>,
}

impl ChangeFeedRelay {
    pub fn new(
        transport: Arc<dyn ChangeTransport>,
        board: Arc<dyn BoardSource>,
        results: Arc<dyn ResultsSource>,
        enabled: bool,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let (status_tx, _) = watch::channel(RelayStatus::Disconnected);

        Self {
            transport,
            context: RelayContext {
                board,
                results,
                events_tx,
                status_tx: Arc::new(status_tx),
            },
            state: Mutex::new(RelayState {
                enabled,
                ..Default::default()
            }),
        }
    }

    /// Starts (or replaces) the subscription; a disabled relay only records it
    pub async fn subscribe(&self, spec: SubscriptionSpec) -> AppResult<()> {
        let enabled = {
            let mut state = self.lock_state();
            if let Some(pump) = state.pump.take() {
                pump.abort();
            }
            state.spec = Some(spec.clone());
            state.enabled
        };

        if !enabled {
            debug!(channel = %spec.channel, "Relay disabled, subscription deferred");
            self.context.status_tx.send_replace(RelayStatus::Disconnected);
            return Ok(());
        }

        self.context.status_tx.send_replace(RelayStatus::Connecting);
        let messages = match self.transport.open(&spec.channel).await {
            Ok(messages) => messages,
            Err(e) => {
                self.context.status_tx.send_replace(RelayStatus::Disconnected);
                return Err(e);
            }
        };

        // The lock was released while opening: a toggle, an unsubscribe or a
        // newer subscribe may have landed in the meantime
        let mut state = self.lock_state();
        if !state.enabled || state.spec.as_ref() != Some(&spec) {
            if !state.enabled || state.spec.is_none() {
                self.context.status_tx.send_replace(RelayStatus::Disconnected);
            }
            debug!(channel = %spec.channel, "Subscription superseded while opening");
            return Ok(());
        }

        if self.transport.is_connected() {
            self.context.status_tx.send_replace(RelayStatus::Subscribed);
        }

        let channel = spec.channel.clone();
        let pump = tokio::spawn(run_pump(self.context.clone(), spec, messages));
        if let Some(previous) = state.pump.replace(pump) {
            previous.abort();
        }
        info!(channel = %channel, "Relay subscription started");
        Ok(())
    }

    /// Stops delivery and forgets the subscription; safe to call repeatedly
    pub fn unsubscribe(&self) {
        let mut state = self.lock_state();
        state.spec = None;
        Self::stop(&mut state, &self.context);
    }

    /// Toggles delivery without dropping the relay; re-enabling resubscribes
    pub async fn set_enabled(&self, enabled: bool) -> AppResult<()> {
        let resubscribe = {
            let mut state = self.lock_state();
            if state.enabled == enabled {
                return Ok(());
            }
            state.enabled = enabled;
            if !enabled {
                Self::stop(&mut state, &self.context);
                None
            } else {
                state.spec.clone()
            }
        };

        match resubscribe {
            Some(spec) => self.subscribe(spec).await,
            None => Ok(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lock_state().enabled
    }

    pub fn status(&self) -> RelayStatus {
        *self.context.status_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == RelayStatus::Subscribed
    }

    pub fn watch_status(&self) -> watch::Receiver<RelayStatus> {
        self.context.status_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.context.events_tx.subscribe()
    }

    fn stop(state: &mut RelayState, context: &RelayContext) {
        if let Some(pump) = state.pump.take() {
            pump.abort();
            info!("Relay subscription stopped");
        }
        context.status_tx.send_replace(RelayStatus::Disconnected);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ChangeFeedRelay {
    fn drop(&mut self) {
        if let Some(pump) = self.lock_state().pump.take() {
            pump.abort();
        }
    }
}

/// Reads the channel until it closes, resolving each accepted change in its
/// own task. Aborting the pump drops the set and cancels in-flight lookups.
async fn run_pump(
    context: RelayContext,
    spec: SubscriptionSpec,
    mut messages: broadcast::Receiver<TransportMessage>,
) {
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            received = messages.recv() => match received {
                Ok(TransportMessage::Status(status)) => context.on_status(&spec.channel, status),
                Ok(TransportMessage::Change(raw)) => {
                    if spec.accepts(&raw) {
                        inflight.spawn(context.clone().relay(raw));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %spec.channel, skipped, "Relay fell behind the transport");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    context.status_tx.send_replace(RelayStatus::Disconnected);
                    break;
                }
            },
            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
        }
    }

    while inflight.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoardPost, LeaderboardEntry, ResultsStats};
    use crate::relay::reconcile::LiveCollection;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeTransport {
        tx: broadcast::Sender<TransportMessage>,
        connected: AtomicBool,
        opened: AtomicUsize,
    }

    impl FakeTransport {
        fn new(connected: bool) -> Arc<Self> {
            let (tx, _) = broadcast::channel(64);
            Arc::new(Self {
                tx,
                connected: AtomicBool::new(connected),
                opened: AtomicUsize::new(0),
            })
        }

        fn emit(&self, message: TransportMessage) {
            self.tx.send(message).unwrap();
        }

        fn change(&self, payload: serde_json::Value) {
            self.emit(TransportMessage::Change(serde_json::from_value(payload).unwrap()));
        }
    }

    #[async_trait::async_trait]
    impl ChangeTransport for FakeTransport {
        async fn open(&self, _channel: &str) -> AppResult<broadcast::Receiver<TransportMessage>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(self.tx.subscribe())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    /// Board whose first lookup reads the row, then stalls before answering
    struct SlowBoard {
        row: Mutex<BoardPost>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl BoardSource for SlowBoard {
        async fn board_post(&self, _id: i64) -> AppResult<Option<BoardPost>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let post = self.row.lock().unwrap().clone();
            if call == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(Some(post))
        }
    }

    struct FixedResults;

    #[async_trait::async_trait]
    impl ResultsSource for FixedResults {
        async fn leaderboard(&self, edition_id: i64) -> AppResult<Vec<LeaderboardEntry>> {
            Ok(vec![LeaderboardEntry {
                participant_id: edition_id * 10,
                display_name: "Marta".to_string(),
                image: None,
                correct: 3,
                total: 5,
                rank: 1,
            }])
        }

        async fn stats(&self, _edition_id: i64) -> AppResult<ResultsStats> {
            Ok(ResultsStats::default())
        }
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, minute, 0).unwrap()
    }

    fn post(content: &str, updated_at: DateTime<Utc>) -> BoardPost {
        BoardPost {
            id: 7,
            author_id: 1,
            author_name: "Marta".to_string(),
            author_image: None,
            content: content.to_string(),
            created_at: ts(0),
            updated_at,
        }
    }

    fn board() -> Arc<SlowBoard> {
        Arc::new(SlowBoard {
            row: Mutex::new(post("first draft", ts(0))),
            calls: AtomicUsize::new(0),
        })
    }

    fn board_spec() -> SubscriptionSpec {
        SubscriptionSpec {
            channel: "board".to_string(),
            collections: vec![WatchedCollection::BoardPosts],
            filter: None,
        }
    }

    fn results_spec(edition_id: i64) -> SubscriptionSpec {
        SubscriptionSpec {
            channel: format!("oscar-results:{}", edition_id),
            collections: vec![WatchedCollection::OscarResults],
            filter: Some(ChangeFilter::eq("edition_id", edition_id)),
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<ChangeEvent>) -> ChangeEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event relayed")
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_refetches_converge_to_latest() {
        let transport = FakeTransport::new(true);
        let board = board();
        let relay = ChangeFeedRelay::new(transport.clone(), board.clone(), Arc::new(FixedResults), true);
        relay.subscribe(board_spec()).await.unwrap();
        let mut events = relay.events();

        transport.change(json!({ "table": "board_posts", "op": "INSERT", "record": { "id": 7 } }));
        while board.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        *board.row.lock().unwrap() = post("edited", ts(5));
        transport.change(json!({ "table": "board_posts", "op": "UPDATE", "record": { "id": 7 } }));

        let mut live: LiveCollection<BoardPost> = LiveCollection::default();
        let first = next_event(&mut events).await;
        let second = next_event(&mut events).await;

        // The update's lookup finishes first; the stale insert lookup lands last
        assert!(matches!(&first, ChangeEvent::BoardPostUpserted { post } if post.content == "edited"));
        assert!(matches!(&second, ChangeEvent::BoardPostUpserted { post } if post.content == "first draft"));

        live.apply(&first);
        live.apply(&second);
        assert_eq!(live.len(), 1);
        assert_eq!(live.get(&7).unwrap().content, "edited");
        assert_eq!(live.get(&7).unwrap().updated_at, ts(0) + ChronoDuration::minutes(5));
    }

    #[tokio::test]
    async fn test_delete_is_relayed_without_lookup() {
        let transport = FakeTransport::new(true);
        let board = board();
        let relay = ChangeFeedRelay::new(transport.clone(), board.clone(), Arc::new(FixedResults), true);
        relay.subscribe(board_spec()).await.unwrap();
        let mut events = relay.events();

        transport.change(json!({ "table": "board_posts", "op": "DELETE", "old_record": { "id": 7 } }));

        assert_eq!(next_event(&mut events).await, ChangeEvent::BoardPostDeleted { id: 7 });
        assert_eq!(board.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_result_delete_refreshes_leaderboard() {
        let transport = FakeTransport::new(true);
        let relay = ChangeFeedRelay::new(transport.clone(), board(), Arc::new(FixedResults), true);
        relay.subscribe(results_spec(3)).await.unwrap();
        let mut events = relay.events();

        let mut standings: LiveCollection<LeaderboardEntry> = LiveCollection::default();
        standings.upsert(LeaderboardEntry {
            participant_id: 99,
            display_name: "Stale".to_string(),
            image: None,
            correct: 4,
            total: 5,
            rank: 1,
        });

        transport.change(json!({
            "table": "oscar_results",
            "op": "DELETE",
            "old_record": { "id": 12, "edition_id": 3 }
        }));

        let deleted = next_event(&mut events).await;
        assert_eq!(
            deleted,
            ChangeEvent::OscarResultDeleted {
                id: 12,
                edition_id: Some(3)
            }
        );
        let refreshed = next_event(&mut events).await;
        assert!(matches!(refreshed, ChangeEvent::OscarResultsRefreshed { edition_id: 3, .. }));

        standings.apply(3, &deleted);
        standings.apply(3, &refreshed);
        let ids: Vec<i64> = standings.standings().iter().map(|e| e.participant_id).collect();
        assert_eq!(ids, vec![30]);
    }

    #[tokio::test]
    async fn test_results_filter_drops_other_editions() {
        let transport = FakeTransport::new(true);
        let relay = ChangeFeedRelay::new(transport.clone(), board(), Arc::new(FixedResults), true);
        relay.subscribe(results_spec(3)).await.unwrap();
        let mut events = relay.events();

        transport.change(json!({ "table": "board_posts", "op": "INSERT", "record": { "id": 1 } }));
        transport.change(json!({ "table": "oscar_results", "op": "UPDATE", "record": { "id": 8, "edition_id": 4 } }));
        transport.change(json!({ "table": "oscar_results", "op": "UPDATE", "record": { "id": 9, "edition_id": 3 } }));

        match next_event(&mut events).await {
            ChangeEvent::OscarResultsRefreshed { edition_id, leaderboard } => {
                assert_eq!(edition_id, 3);
                assert_eq!(leaderboard[0].participant_id, 30);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_status_follows_transport() {
        let transport = FakeTransport::new(false);
        let relay = ChangeFeedRelay::new(transport.clone(), board(), Arc::new(FixedResults), true);
        assert_eq!(relay.status(), RelayStatus::Disconnected);

        relay.subscribe(board_spec()).await.unwrap();
        assert_eq!(relay.status(), RelayStatus::Connecting);

        let mut status = relay.watch_status();
        transport.emit(TransportMessage::Status(ChannelStatus::Subscribed));
        status.wait_for(|s| *s == RelayStatus::Subscribed).await.unwrap();
        assert!(relay.is_connected());

        transport.emit(TransportMessage::Status(ChannelStatus::TimedOut));
        status.wait_for(|s| *s == RelayStatus::Disconnected).await.unwrap();
        assert!(!relay.is_connected());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let transport = FakeTransport::new(true);
        let relay = ChangeFeedRelay::new(transport.clone(), board(), Arc::new(FixedResults), true);

        relay.unsubscribe();
        relay.subscribe(board_spec()).await.unwrap();
        assert!(relay.is_connected());

        relay.unsubscribe();
        relay.unsubscribe();
        assert_eq!(relay.status(), RelayStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_toggle_enabled_resubscribes() {
        let transport = FakeTransport::new(true);
        let relay = ChangeFeedRelay::new(transport.clone(), board(), Arc::new(FixedResults), true);
        relay.subscribe(board_spec()).await.unwrap();
        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);

        relay.set_enabled(false).await.unwrap();
        assert!(!relay.is_enabled());
        assert_eq!(relay.status(), RelayStatus::Disconnected);

        relay.set_enabled(false).await.unwrap();
        relay.set_enabled(true).await.unwrap();
        assert!(relay.is_connected());
        assert_eq!(transport.opened.load(Ordering::SeqCst), 2);
    }

    /// Transport whose `open` parks until released
    struct GatedTransport {
        inner: Arc<FakeTransport>,
        gate: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl ChangeTransport for GatedTransport {
        async fn open(&self, channel: &str) -> AppResult<broadcast::Receiver<TransportMessage>> {
            let messages = self.inner.open(channel).await;
            self.gate.notified().await;
            messages
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }
    }

    #[tokio::test]
    async fn test_disable_while_opening_wins() {
        let inner = FakeTransport::new(true);
        let transport = Arc::new(GatedTransport {
            inner: inner.clone(),
            gate: tokio::sync::Notify::new(),
        });
        let relay = Arc::new(ChangeFeedRelay::new(
            transport.clone(),
            board(),
            Arc::new(FixedResults),
            true,
        ));

        let opening = tokio::spawn({
            let relay = relay.clone();
            async move { relay.subscribe(board_spec()).await }
        });
        while inner.opened.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        relay.set_enabled(false).await.unwrap();
        transport.gate.notify_one();
        opening.await.unwrap().unwrap();

        assert_eq!(relay.status(), RelayStatus::Disconnected);

        // No pump was installed, so transport messages go unheard
        let mut events = relay.events();
        inner.change(json!({ "table": "board_posts", "op": "DELETE", "old_record": { "id": 7 } }));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(events.try_recv().is_err());
        assert_eq!(relay.status(), RelayStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_unsubscribe_while_opening_wins() {
        let inner = FakeTransport::new(true);
        let transport = Arc::new(GatedTransport {
            inner: inner.clone(),
            gate: tokio::sync::Notify::new(),
        });
        let relay = Arc::new(ChangeFeedRelay::new(
            transport.clone(),
            board(),
            Arc::new(FixedResults),
            true,
        ));

        let opening = tokio::spawn({
            let relay = relay.clone();
            async move { relay.subscribe(board_spec()).await }
        });
        while inner.opened.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        relay.unsubscribe();
        transport.gate.notify_one();
        opening.await.unwrap().unwrap();

        assert_eq!(relay.status(), RelayStatus::Disconnected);

        // Re-enabling has nothing to resubscribe to
        relay.set_enabled(false).await.unwrap();
        relay.set_enabled(true).await.unwrap();
        assert_eq!(inner.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_relay_defers_subscription() {
        let transport = FakeTransport::new(true);
        let relay = ChangeFeedRelay::new(transport.clone(), board(), Arc::new(FixedResults), false);

        relay.subscribe(board_spec()).await.unwrap();
        assert_eq!(relay.status(), RelayStatus::Disconnected);
        assert_eq!(transport.opened.load(Ordering::SeqCst), 0);

        relay.set_enabled(true).await.unwrap();
        assert!(relay.is_connected());
    }
}
