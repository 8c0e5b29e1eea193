use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature declared twice: {0}")]
    DuplicateSignature(String),

    #[error("Incompatible host build, unresolved signatures: {}", .0.join(", "))]
    UnresolvedSignatures(Vec<String>),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Failed to install hook {name} at {address:#x}: {message}")]
    HookInstallFailed {
        name: String,
        address: u64,
        message: String,
    },

    #[error("Invalid module image: {0}")]
    InvalidImage(String),

    #[error("Invalid trigger profile: {0}")]
    InvalidProfile(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Whether the error means the host build does not match the signature set
    pub fn is_incompatible_host(&self) -> bool {
        matches!(self, Error::UnresolvedSignatures(_))
    }
}
