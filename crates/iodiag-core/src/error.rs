use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal errors that end a diagnostic run.
///
/// Timeouts are not errors; they are reported through the sampler and
/// detector results.
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("controller transport error: {0}")]
    Transport(#[source] BoxError),
    #[error("operator console error: {0}")]
    Console(#[from] std::io::Error),
}

impl DiagError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Transport(err.into())
    }
}
