mod auth_guard;
mod auth_service_impl;
mod credential_hasher;
mod refresh_coordinator;
mod session_revocation;
mod session_whitelist;
mod token_codec_jwt;
mod token_issuer;

pub use auth_guard::*;
pub use auth_service_impl::*;
pub use credential_hasher::*;
pub use refresh_coordinator::*;
pub use session_revocation::*;
pub use session_whitelist::*;
pub use token_codec_jwt::*;
pub use token_issuer::*;
