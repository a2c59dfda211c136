use serde::{Deserialize, Serialize};

/// Stored value, or its absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::None => None,
            Value::Bytes(bytes) => Some(bytes),
        }
    }
}

impl From<Option<Vec<u8>>> for Value {
    fn from(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(bytes) => Value::Bytes(bytes),
            None => Value::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValueOperation {
    Get { key: String },
    Set { key: String, value: Vec<u8> },
    Delete { key: String },
    Exists { key: String },
    /// Page through keys starting with `prefix`. A zero cursor starts at the
    /// first page.
    ListKeys { prefix: String, cursor: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValueResponse {
    Get { value: Value },
    Set { previous: Value },
    Delete { previous: Value },
    Exists { is_present: bool },
    /// `next_cursor` is zero when there are no more pages.
    ListKeys { keys: Vec<String>, next_cursor: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum KeyValueError {
    #[error("Storage I/O error: {message}")]
    Io { message: String },

    #[error("Cursor not found")]
    CursorNotFound,

    #[error("Storage error: {message}")]
    Other { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValueResult {
    Ok { response: KeyValueResponse },
    Err { error: KeyValueError },
}

impl From<Result<KeyValueResponse, KeyValueError>> for KeyValueResult {
    fn from(result: Result<KeyValueResponse, KeyValueError>) -> Self {
        match result {
            Ok(response) => KeyValueResult::Ok { response },
            Err(error) => KeyValueResult::Err { error },
        }
    }
}
