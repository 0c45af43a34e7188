use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("{field}: `{raw}` is not a number")]
    Numeric { field: String, raw: String },

    #[error("{field}: `{raw}` does not match date format `{format}`")]
    Date {
        field: String,
        raw: String,
        format: String,
    },

    #[error("chart calibration element missing: `{0}`")]
    Calibration(String),

    #[error("unrecognised relative time `{0}`")]
    TimeAgo(String),

    #[error("bad page url: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
