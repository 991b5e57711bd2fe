use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForkstrapError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("github error: {0}")]
    GitHub(String),

    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a git repository: {0}")]
    NotARepo(String),
}

pub type Result<T> = std::result::Result<T, ForkstrapError>;
