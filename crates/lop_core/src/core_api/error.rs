use std::io;

use thiserror::Error;

use crate::settings::SettingsError;
use crate::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Parse,
    Json,
    UnsupportedOperation,
    NotFound,
    InvalidValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => CoreErrorCode::NotFound,
            io::ErrorKind::InvalidInput => CoreErrorCode::InvalidValue,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => CoreErrorCode::Parse,
            io::ErrorKind::Unsupported => CoreErrorCode::UnsupportedOperation,
            _ => CoreErrorCode::Io,
        };
        Self::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(CoreErrorCode::Json, err.to_string())
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        let code = match &err {
            StorageError::Io { .. } => CoreErrorCode::Io,
            StorageError::Json { .. } => CoreErrorCode::Json,
            StorageError::Parse { .. } | StorageError::Encode { .. } => CoreErrorCode::Parse,
        };
        Self::new(code, err.to_string())
    }
}

impl From<SettingsError> for CoreError {
    fn from(err: SettingsError) -> Self {
        let code = match &err {
            SettingsError::Io { .. } => CoreErrorCode::Io,
            SettingsError::Json { .. } => CoreErrorCode::Json,
        };
        Self::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_codes() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "QuestSaveData_0 not found in save");
        assert_eq!(CoreError::from(not_found).code, CoreErrorCode::NotFound);
        let bad = io::Error::new(io::ErrorKind::InvalidInput, "line must be 1 or 2");
        let err = CoreError::from(bad);
        assert_eq!(err.code, CoreErrorCode::InvalidValue);
        assert_eq!(err.to_string(), "InvalidValue: line must be 1 or 2");
    }
}
