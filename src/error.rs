use thiserror::Error;

/// Failures surfaced by identity resolution.
///
/// A missing-primary matched set is not represented here: the resolver
/// falls back to the oldest contact and logs it instead of failing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("At least one of email or phoneNumber is required")]
    MissingIdentifier,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
