pub mod board;
pub mod candidates;
pub mod events;
pub mod oscar;
pub mod postgres;
pub mod recommendations;
pub mod redis;
pub mod sessions;

pub use board::BoardSource;
pub use candidates::CandidateSource;
pub use events::EventSource;
pub use oscar::ResultsSource;
pub use postgres::{create_pool, run_migrations, PgStore};
pub use recommendations::RecommendationStore;
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use sessions::SessionValidator;
