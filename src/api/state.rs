use std::sync::Arc;

use crate::{
    db::{
        Cache, CandidateSource, EventSource, PgStore, RecommendationStore,
        ResultsSource, SessionValidator,
    },
    relay::RelayHub,
    services::{EventNotifierJob, MovieMetadata, Notifier, RecommendationJob},
};

/// Shared application state
///
/// Every collaborator sits behind a trait object so handlers can be exercised
/// against in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub recommendations: Arc<dyn RecommendationStore>,
    pub candidates: Arc<dyn CandidateSource>,
    pub events: Arc<dyn EventSource>,
    pub results: Arc<dyn ResultsSource>,
    pub sessions: Arc<dyn SessionValidator>,
    pub notifier: Arc<dyn Notifier>,
    pub metadata: Option<Arc<dyn MovieMetadata>>,
    pub cache: Option<Cache>,
    pub relays: Arc<RelayHub>,
    pub cron_secret: Arc<str>,
}

impl AppState {
    /// Wires every store seam to the same Postgres-backed store
    pub fn from_store(
        store: Arc<PgStore>,
        notifier: Arc<dyn Notifier>,
        metadata: Option<Arc<dyn MovieMetadata>>,
        cache: Option<Cache>,
        relays: Arc<RelayHub>,
        cron_secret: &str,
    ) -> Self {
        Self {
            recommendations: store.clone(),
            candidates: store.clone(),
            events: store.clone(),
            results: store.clone(),
            sessions: store,
            notifier,
            metadata,
            cache,
            relays,
            cron_secret: Arc::from(cron_secret),
        }
    }

    pub fn recommendation_job(&self) -> RecommendationJob {
        RecommendationJob::new(
            self.recommendations.clone(),
            self.candidates.clone(),
            self.metadata.clone(),
        )
    }

    pub fn event_notifier_job(&self) -> EventNotifierJob {
        EventNotifierJob::new(self.events.clone(), self.notifier.clone())
    }
}

/// Relay hub wired to the store's board and results reads
pub fn relay_hub(
    transport: Arc<dyn crate::relay::ChangeTransport>,
    store: Arc<PgStore>,
    enabled: bool,
) -> RelayHub {
    RelayHub::new(transport, store.clone(), store, enabled)
}
