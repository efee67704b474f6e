pub mod redirect;
pub mod secret;
pub mod token;
pub mod validation;

pub use secret::{hash_client_secret, verify_client_secret, ClientSecret, ClientSecretHash};
pub use token::{generate_client_id, generate_secure_token};
pub use validation::ValidatedJson;
