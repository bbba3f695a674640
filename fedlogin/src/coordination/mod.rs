//! Orchestration of ceremony, user and session operations into the flows
//! exposed to the web layer.

mod errors;
mod idp;
mod passkey;
mod user;

pub use errors::CoordinationError;
pub use idp::handle_idp_callback_core;
pub use passkey::{
    handle_finish_authentication_core, handle_finish_registration_core,
    handle_start_authentication_core, handle_start_registration_core,
};
