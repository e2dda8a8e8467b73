use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The classifier handed back something the control loop cannot trust.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not enough space in {what}: required {required}, available {available}")]
    CapacityExceeded {
        what: &'static str,
        required: usize,
        available: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}
