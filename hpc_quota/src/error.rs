use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while looking up quota.
///
/// All of these are fatal for the lookup in progress. A path or identity
/// that simply has no quota entry is not an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration.
    #[error("{0}")]
    Config(String),

    /// Unknown filesystem type, or a query the filesystem cannot answer.
    #[error("{0}")]
    UnsupportedFilesystem(String),

    /// An external command could not be run or exited non-zero.
    #[error("command `{command}` failed: {message}")]
    Execution { command: String, message: String },

    /// Command output did not have the expected shape.
    #[error("unexpected output: {0}")]
    BackendFormat(String),

    /// A number or size could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// User or group database lookup failed.
    #[error("{0}")]
    Identity(String),

    /// The subject of a query does not exist.
    #[error("{0}")]
    NotFound(String),
}
