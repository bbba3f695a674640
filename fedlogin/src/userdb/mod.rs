mod errors;
mod store;
mod types;

pub use errors::UserError;
pub use types::User;

pub(crate) use store::UserStore;

pub(crate) async fn init() -> Result<(), UserError> {
    UserStore::init().await
}
