mod config;
mod errors;
mod session;
mod types;

pub use config::SESSION_COOKIE_NAME;
pub use errors::SessionError;
pub use session::{get_session_id_from_headers, get_user_from_session, prepare_logout_response};
pub use types::SessionUser;

pub(crate) use session::create_session;
