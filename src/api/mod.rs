mod routes;
mod session;
mod state;

pub use routes::create_router;
pub use session::{Session, SESSION_COOKIE};
pub use state::{relay_hub, AppState};
