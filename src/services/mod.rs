pub mod cron;
pub mod daily_recommendation;
pub mod event_notifier;
pub mod metadata;
pub mod notifier;
pub mod oscar_results;
pub mod selector;

pub use daily_recommendation::{JobOutcome, RecommendationJob};
pub use event_notifier::{EventNotifierJob, NotifierOutcome, NotifyWindow};
pub use metadata::{MovieMetadata, TmdbClient};
pub use notifier::{Notifier, TelegramNotifier, UnconfiguredNotifier};
