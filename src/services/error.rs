use thiserror::Error;

/// Client-visible failures of the write and lookup paths.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Not authorized")]
    Forbidden,
    #[error("{0}")]
    Conflict(String),
}

pub(crate) fn invalid(msg: impl Into<String>) -> anyhow::Error {
    ContentError::Validation(msg.into()).into()
}
