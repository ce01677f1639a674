//! Authentication primitives
//!
//! PKCE challenge generation (RFC 7636) used by the authorization-code flow.

pub mod pkce;

pub use pkce::PkceChallenge;
