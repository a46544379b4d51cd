pub mod auth;
pub mod error;

pub use auth::{AuthUser, JwtClaims, JwtHeader, Role, TokenPair, TokenUse};
pub use error::AppError;
