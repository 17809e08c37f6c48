use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing and resolving a VAST response
#[derive(Error, Debug)]
pub enum VastError {
    #[error("Failed to parse XML: {0}")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid VAST version: {0}")]
    InvalidVersion(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Unsupported VAST feature: {0}")]
    UnsupportedFeature(String),

    #[error("No ads available")]
    NoAds,

    #[error("Unknown error: {0}")]
    Other(String),
}

impl VastError {
    /// The VAST error code reported for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            VastError::XmlParseError(_) => ErrorCode::XmlParse,
            VastError::InvalidVersion(_) => ErrorCode::UnsupportedVersion,
            VastError::MissingField(_) => ErrorCode::XmlParse,
            VastError::NoAds => ErrorCode::NoAds,
            VastError::UnsupportedFeature(_) => ErrorCode::NoSupportedMedia,
            _ => ErrorCode::Undefined,
        }
    }
}

pub type Result<T> = std::result::Result<T, VastError>;

/// Errors raised by the playback driver when it is driven out of order
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DriverError {
    #[error("A request is already pending: {0}")]
    RequestPending(u64),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No active playback session")]
    NoActiveSession,

    #[error("No ad break is scheduled")]
    NothingScheduled,

    #[error("The current ad is not skippable")]
    NotSkippable,
}

/// VAST error codes substituted into `[ERRORCODE]` tracking macros
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    XmlParse,
    UnsupportedVersion,
    Linearity,
    Timeout,
    NoAds,
    NoSupportedMedia,
    MediaUnplayable,
    Undefined,
    VpaidError,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::XmlParse => 100,
            ErrorCode::UnsupportedVersion => 102,
            ErrorCode::Linearity => 202,
            ErrorCode::Timeout => 301,
            ErrorCode::NoAds => 303,
            ErrorCode::NoSupportedMedia => 403,
            ErrorCode::MediaUnplayable => 405,
            ErrorCode::Undefined => 900,
            ErrorCode::VpaidError => 901,
        }
    }
}
