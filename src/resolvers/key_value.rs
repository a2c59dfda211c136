use crate::protocol::{KeyValueError, KeyValueOperation, KeyValueResponse, KeyValueResult};
use crate::store::{KeyValueStore, StoreError};

/// Runs key-value operations against a store; every operation yields exactly
/// one result, store failures included.
pub struct KeyValueResolver {
    store: Box<dyn KeyValueStore>,
    page_size: usize,
}

impl KeyValueResolver {
    pub fn new(store: Box<dyn KeyValueStore>, page_size: u32) -> Self {
        Self {
            store,
            page_size: page_size.max(1) as usize,
        }
    }

    pub fn resolve(&self, operation: KeyValueOperation) -> KeyValueResult {
        let result = self.apply(operation);
        if let Err(error) = &result {
            tracing::warn!(error = %error, "key-value operation failed");
        }
        result.into()
    }

    fn apply(&self, operation: KeyValueOperation) -> Result<KeyValueResponse, KeyValueError> {
        match operation {
            KeyValueOperation::Get { key } => Ok(KeyValueResponse::Get {
                value: self.store.get(&key)?.into(),
            }),
            KeyValueOperation::Set { key, value } => Ok(KeyValueResponse::Set {
                previous: self.store.set(&key, value)?.into(),
            }),
            KeyValueOperation::Delete { key } => Ok(KeyValueResponse::Delete {
                previous: self.store.delete(&key)?.into(),
            }),
            KeyValueOperation::Exists { key } => Ok(KeyValueResponse::Exists {
                is_present: self.store.exists(&key)?,
            }),
            KeyValueOperation::ListKeys { prefix, cursor } => self.list_keys(&prefix, cursor),
        }
    }

    fn list_keys(&self, prefix: &str, cursor: u64) -> Result<KeyValueResponse, KeyValueError> {
        let keys = self.store.keys(prefix)?;
        let start = usize::try_from(cursor).map_err(|_| KeyValueError::CursorNotFound)?;
        if start > keys.len() {
            return Err(KeyValueError::CursorNotFound);
        }

        let end = (start + self.page_size).min(keys.len());
        let next_cursor = if end < keys.len() { end as u64 } else { 0 };

        Ok(KeyValueResponse::ListKeys {
            keys: keys[start..end].to_vec(),
            next_cursor,
        })
    }
}

impl From<StoreError> for KeyValueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io { .. } | StoreError::Locked { .. } => KeyValueError::Io {
                message: err.to_string(),
            },
            StoreError::Corrupt { .. } => KeyValueError::Other {
                message: err.to_string(),
            },
        }
    }
}
