//! Authentication: credentials, session tokens and the request middleware.
//!
//! Every protected route runs behind [`middleware::require_auth`], which
//! accepts two strategies on the `Authorization` header:
//!
//! - **Basic**: `base64(email:password)` checked against the stored Argon2id hash.
//! - **Bearer**: an HS256 token issued by `/v1/auth/login` (or mailed in a
//!   reset/activation link) carrying `{exp, id, email, isSuper}`.
//!
//! The resolved [`Principal`] is attached to the request's extensions and read
//! by handlers through its extractor. Failures are terminal for the request.
//!
//! ## Token Secret
//!
//! Tokens are signed with a single process-wide secret supplied at startup.
//!
//! > **Warning:** Rotating the secret invalidates all existing tokens,
//! > including outstanding reset and activation links.
//!
//! Reset and activation links carry ordinary session tokens minted with the
//! reset or activation TTL. There is no purpose claim, so until it expires a
//! mailed token is accepted as a Bearer credential on every protected route,
//! not only `/v1/auth/set-password`. Keep those TTLs short and treat the links
//! as secrets.

pub(crate) mod credentials;
pub(crate) mod error;
pub(crate) mod login;
pub(crate) mod middleware;
pub(crate) mod password;
pub(crate) mod principal;
mod state;
pub(crate) mod storage;
pub(crate) mod strategy;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use credentials::{Credentials, hash_password, verify_password};
pub use error::AuthError;
pub use principal::{CredentialRecord, Principal};
pub use state::{AuthConfig, AuthState, Clock, MAX_TTL_SECONDS, SystemClock};
pub use storage::{CredentialStore, PgCredentialStore, SuperUserOutcome, upsert_super_user};
pub use token::{TokenCodec, TokenError};
