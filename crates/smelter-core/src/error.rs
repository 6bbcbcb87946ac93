//! Error types for smelter

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmelterError {
    #[error("Song structure is empty: add at least one section")]
    EmptyStructure,
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u32, denominator: u32 },
    #[error("Track body of {0} bytes does not fit a chunk length field")]
    TrackTooLong(usize),
    #[error("Delta time {0} exceeds the variable-length limit")]
    DeltaOverflow(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SmelterError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name, reason: reason.into() }
    }

    /// True for errors caused by the caller's song setup rather than I/O
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, SmelterError>;
