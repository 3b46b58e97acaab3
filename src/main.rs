use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use watchclub_api::{
    api::{create_router, relay_hub, AppState},
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, PgStore},
    relay::TransportFactory,
    services::{MovieMetadata, Notifier, TelegramNotifier, TmdbClient, UnconfiguredNotifier},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchclub_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool.clone()));

    let (cache, cache_writer) = match connect_cache(&config.redis_url).await {
        Ok((cache, writer)) => (Some(cache), Some(writer)),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, running without cache");
            (None, None)
        }
    };

    let metadata: Option<Arc<dyn MovieMetadata>> = match &config.tmdb_api_key {
        Some(key) => Some(Arc::new(TmdbClient::new(
            key.clone(),
            config.tmdb_api_url.clone(),
            config.metadata_rate_per_second,
            cache.clone(),
        ))),
        None => {
            tracing::warn!("TMDB_API_KEY not set, movie recommendations won't be enriched");
            None
        }
    };

    let notifier: Arc<dyn Notifier> = match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            Arc::new(TelegramNotifier::new(token.clone(), chat_id.clone()))
        }
        _ => {
            tracing::warn!("Telegram not configured, event digests will fail");
            Arc::new(UnconfiguredNotifier)
        }
    };

    let transports = TransportFactory::new(
        pool.clone(),
        Duration::from_secs(config.relay_max_backoff_secs),
    );
    let transport = transports.get_or_connect().await;
    let relays = Arc::new(relay_hub(transport, store.clone(), config.relay_enabled));
    tracing::info!(enabled = config.relay_enabled, "Change relays ready");

    let state = AppState::from_store(
        store,
        notifier,
        metadata,
        cache,
        relays.clone(),
        &config.cron_secret,
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    tracing::info!("Server running on http://{}", config.bind_addr());

    // Open SSE streams only end once their relays are dropped
    let draining = relays.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            draining.shutdown().await;
        })
        .await?;

    transports.teardown().await;
    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn connect_cache(
    redis_url: &str,
) -> anyhow::Result<(Cache, watchclub_api::db::CacheWriterHandle)> {
    let client = create_redis_client(redis_url)?;
    let connected = Cache::connect(client).await?;
    Ok(connected)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
