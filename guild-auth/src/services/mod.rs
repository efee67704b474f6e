//! Services layer for guild-auth.
//!
//! Business logic for the Discord login handshake, sessions, the client
//! registry and the OAuth2 authorization server.

pub mod auth;
pub mod client;
pub mod discord;
#[cfg(any(test, feature = "test-util"))]
pub mod discord_mock;
pub mod error;
pub mod jwt;
pub mod members;
pub mod metrics;
pub mod oauth2;
pub mod reaper;
pub mod session;

pub use auth::{AuthService, LoginOutcome};
pub use client::{ClientService, ClientUpdate, NewClient};
pub use discord::{DiscordClient, DiscordError, DiscordGateway};
#[cfg(any(test, feature = "test-util"))]
pub use discord_mock::{MockAccount, MockDiscordGateway, MockFailure};
pub use error::ServiceError;
pub use jwt::{JwtClaims, JwtService};
pub use members::{Member, MemberService};
pub use oauth2::{AuthorizeRequest, AuthorizeResult, OAuth2Service, TokenRequest, TokenResult};
pub use reaper::{SessionReaper, SweepReport};
pub use session::SessionService;
