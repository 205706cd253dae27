/// Core error type shared by every crate in the workspace.
///
/// Adapter crates map their driver/transport errors into this type so the
/// service layer and the transports can decide between a descriptive
/// rejection (caller-input errors) and a generic failure message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid update: no fields to update")]
    InvalidUpdate,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("decode error in column {column}: {reason}")]
    Decode { column: usize, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Errors caused by the caller's input rather than by a collaborator.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidId(_) | Error::InvalidUpdate | Error::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
