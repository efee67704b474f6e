pub mod bearer;
pub mod jwt;
pub mod session;

pub use bearer::{bearer_auth_middleware, BearerUser};
pub use jwt::{jwt_auth_middleware, JwtUser};
pub use session::{session_auth_middleware, SessionUser};
