//! Google authentication
//!
//! OAuth sign-in, token verification and the extractors handlers use to
//! require a Bearer token.

pub mod extractor;
pub mod oauth;
pub mod token;

pub use extractor::{BearerToken, VerifiedToken};
pub use oauth::{GoogleOAuthClient, TokenResponse, SCOPES};
pub use token::{TokenInfo, TokenVerifier};
