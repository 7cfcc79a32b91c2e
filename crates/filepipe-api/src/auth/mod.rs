//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued elsewhere; the `sub` claim is the owner id that
//! scopes every file operation.

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtVerifier;
pub use middleware::auth_middleware;
pub use models::{JwtClaims, OwnerContext};
