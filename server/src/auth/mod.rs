mod crypto;
mod db;
mod extractor;

pub use crypto::{hash_password, verify_password};
pub use db::{create_session, delete_session};
pub use extractor::{AuthError, AuthUser, MaybeAuthUser, SessionToken};
