pub mod software_authenticator;
pub mod test_setup;

pub use software_authenticator::{SoftwareAuthenticator, challenge_of};
pub use test_setup::init_test_environment;
