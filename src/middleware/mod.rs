pub mod cron_auth;
pub mod request_id;

pub use cron_auth::require_cron_secret;
pub use request_id::{make_span_with_request_id, request_id_middleware, RequestId};
