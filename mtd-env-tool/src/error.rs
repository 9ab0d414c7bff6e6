use thiserror::Error;

/// Errors that can occur while generating or parsing environment images.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("environment error: {0}")]
    EnvError(#[from] mtd_env::error::Error),

    #[error("invalid image size {0}: must be larger than the {1} byte header")]
    InvalidImageSize(usize, usize),

    #[error("image is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}
