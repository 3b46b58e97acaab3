pub mod board;
pub mod candidate;
pub mod change;
pub mod event;
pub mod oscar;
pub mod recommendation;

pub use board::BoardPost;
pub use candidate::{ListCandidate, MovieCandidate, ParticipantCandidate};
pub use change::{ChangeEvent, ChangeOp, RawChange, WatchedCollection};
pub use event::UpcomingEvent;
pub use oscar::{LeaderboardEntry, ResultsSnapshot, ResultsStats};
pub use recommendation::{
    NewRecommendation, Recommendation, RecommendationType, RecommendationView,
};
