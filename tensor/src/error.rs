use digit_layout::DigitLayout;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported data type: {0:?}")]
    UnsupportedType(DigitLayout),

    #[error("data type mismatch: expected {expected:?}, found {actual:?}")]
    TypeMismatch {
        expected: DigitLayout,
        actual: DigitLayout,
    },
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
