use std::io;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the public API
///
/// Engine-side failures are converted exactly once, at the public-call
/// boundary, so callers see a small set of domain kinds regardless of which
/// internal step failed. The original cause is kept as the error source for
/// diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid caller arguments, detected before any engine interaction
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A MIME string that is not in "type/subtype" form
    #[error("invalid MIME type: {0}. Type must be in the form 'type/subtype', like 'text/plain'")]
    InvalidMimeType(String),

    /// The input file or directory does not exist
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// I/O failure in the stream bridge or while persisting output
    #[error("stream I/O failure")]
    Io(#[from] io::Error),

    /// Any other failure inside the external engine
    #[error("document engine failure: {0}")]
    Engine(#[source] anyhow::Error),
}

impl Error {
    pub(crate) fn file_not_found(path: &std::path::Path) -> Self {
        Error::FileNotFound(path.display().to_string())
    }

    /// Convert a failure that crossed the engine seam into a domain error.
    ///
    /// "Not found"-class failures are distinguished from generic processing
    /// failures by walking the cause chain for an `io::Error` with
    /// `ErrorKind::NotFound`.
    pub(crate) fn from_engine(err: anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                if io_err.kind() == io::ErrorKind::NotFound {
                    return Error::FileNotFound(io_err.to_string());
                }
            }
        }
        Error::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_not_found_maps_to_file_not_found() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = Error::from_engine(anyhow::Error::new(io_err).context("parse failed"));
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_engine_other_maps_to_engine() {
        let err = Error::from_engine(anyhow::anyhow!("corrupt stream"));
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn test_error_display_includes_cause() {
        let err = Error::Engine(anyhow::anyhow!("bad zip header"));
        assert!(err.to_string().contains("bad zip header"));
    }
}
