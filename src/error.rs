// SPDX-License-Identifier: MPL-2.0
use std::fmt;

/// Crate-wide error type.
///
/// Streaming and decode failures are normally absorbed into cache state
/// (see [`crate::tiles`]); only preconditions the caller must have
/// prevented surface through this type.
#[derive(Debug, Clone)]
pub enum Error {
    /// Network-level failure: tile URL batch, section page or frame fetch.
    Transport(String),

    /// Fetched bytes could not be decoded into an image.
    Decode(String),

    /// Configuration file or engine configuration problem.
    Config(String),

    /// An operation was invoked on an item kind that does not support it,
    /// e.g. running the frames loader against a tiled image.
    Item(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "Transport Error: {}", e),
            Error::Decode(e) => write!(f, "Decode Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Item(e) => write!(f, "Item Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<image_rs::ImageError> for Error {
    fn from(err: image_rs::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_transport_error() {
        let err = Error::Transport("connection reset".to_string());
        assert_eq!(format!("{}", err), "Transport Error: connection reset");
    }

    #[test]
    fn display_formats_item_error() {
        let err = Error::Item("frames loader on tiled image".to_string());
        assert_eq!(
            format!("{}", err),
            "Item Error: frames loader on tiled image"
        );
    }

    #[test]
    fn from_io_error_produces_config_variant() {
        let io_error = std::io::Error::other("boom");
        let err: Error = io_error.into();
        match err {
            Error::Config(message) => assert!(message.contains("boom")),
            _ => panic!("expected Config variant"),
        }
    }
}
