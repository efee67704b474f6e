pub mod auth_code;
pub mod client;
pub mod profile;
pub mod session;
pub mod token;
pub mod user;

pub use auth_code::{AuthCode, AuthCodeState};
pub use client::ClientApp;
pub use profile::Profile;
pub use session::Session;
pub use token::{Token, TokenType};
pub use user::{IdentityUpdate, User};
