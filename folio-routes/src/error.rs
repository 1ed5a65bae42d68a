//! Error types for short-link administration.

use folio_sync::SyncError;
use thiserror::Error;

/// Result type for redirect operations.
pub type RedirectResult<T> = Result<T, RedirectError>;

/// Errors returned by [`crate::RedirectBook`] and slug validation.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// Nothing is left of the slug after normalization.
    #[error("slug is empty")]
    EmptySlug,

    /// The slug would shadow one of the site's own routes.
    #[error("slug {0:?} is reserved")]
    ReservedSlug(String),

    /// The target url is empty.
    #[error("redirect url is empty")]
    EmptyUrl,

    /// The target url contains control characters.
    #[error("redirect url {0:?} contains control characters")]
    InvalidUrl(String),

    /// The backing store refused the operation.
    #[error(transparent)]
    Sync(#[from] SyncError),
}
