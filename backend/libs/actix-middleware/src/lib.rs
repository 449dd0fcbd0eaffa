//! # Actix Middleware Library
//!
//! Shared middleware components for Pilk Chat Actix services
//!
//! ## Modules
//! - `jwt_auth`: session token authentication middleware

pub mod jwt_auth;

pub use jwt_auth::{JwtAuthMiddleware, SessionClaims, SessionError, SessionKeys, UserId};
