//! Change-feed relay
//!
//! Watches database changes for the board and the prediction-game results,
//! re-reads the authoritative joined rows and fans the resulting
//! application events out to connected clients.

pub mod feed;
pub mod filter;
pub mod hub;
pub mod reconcile;
pub mod transport;

pub use feed::{ChangeFeedRelay, RelayStatus, SubscriptionSpec};
pub use filter::ChangeFilter;
pub use hub::RelayHub;
pub use reconcile::{Keyed, LiveCollection};
pub use transport::{
    backoff_delay, ChangeTransport, ChannelStatus, PgChangeTransport, TransportFactory,
    TransportMessage,
};
