//! Error types for the Adsterra statistics bot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid API key format")]
    InvalidApiKey,

    #[error("API key rejected with status {0}")]
    AuthProbe(u16),

    /// Display text is shown to the user verbatim.
    #[error("{0}")]
    Network(String),

    #[error("No date range remembered for this conversation")]
    MissingSession,

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl Error {
    /// Errors the user can fix by sending another message; everything else is
    /// reported as a generic failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidApiKey | Error::AuthProbe(_) | Error::Network(_) | Error::MissingSession
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_displays_message_verbatim() {
        let err = Error::Network("Failed to retrieve data".to_string());
        assert_eq!(err.to_string(), "Failed to retrieve data");
    }

    #[test]
    fn auth_probe_mentions_status() {
        let err = Error::AuthProbe(401);
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn missing_session_display() {
        let err = Error::MissingSession;
        assert!(err.to_string().contains("No date range"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn recoverable_errors_are_user_facing() {
        assert!(Error::InvalidApiKey.is_recoverable());
        assert!(Error::AuthProbe(403).is_recoverable());
        assert!(Error::Network("timeout".into()).is_recoverable());
        assert!(Error::MissingSession.is_recoverable());
        assert!(!Error::Storage("disk full".into()).is_recoverable());
        assert!(!Error::TelegramError("flood wait".into()).is_recoverable());
    }

    #[test]
    fn test_error_all_variants_debug() {
        let variants: Vec<Error> = vec![
            Error::InvalidApiKey,
            Error::AuthProbe(500),
            Error::Network("net".to_string()),
            Error::MissingSession,
            Error::Storage("store".to_string()),
            Error::TelegramError("telegram".to_string()),
            Error::SerializationError("serial".to_string()),
            Error::Config("config".to_string()),
            Error::InvalidArgument("arg".to_string()),
        ];

        for err in variants {
            let debug_str = format!("{:?}", err);
            assert!(!debug_str.is_empty());
        }
    }
}
