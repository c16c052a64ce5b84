use thiserror::Error;

/// Errors surfaced synchronously at construction time.
///
/// Runtime capture failures never appear here: the capture loop absorbs them
/// into the `None` read channel instead of throwing across the thread
/// boundary.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying device node could not be opened or configured.
    #[error("failed to open capture source {path}: {source}")]
    SourceOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The source opened but could not produce an initial frame.
    #[error("capture source produced no initial frame")]
    InvalidSource,
}
