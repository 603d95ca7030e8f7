use thiserror::Error;

/// Failures at the store boundary. None of them are fatal to the caller: the
/// pipeline keeps running with a degraded or empty store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be opened or migrated.
    #[error("failed to initialize sample store: {0}")]
    InitFailed(String),

    /// A sample could not be written.
    #[error("failed to write sample: {0}")]
    WriteFailed(String),

    /// Persisted data could not be read back.
    #[error("failed to read samples: {0}")]
    ReadFailed(String),

    /// Persisted data could not be destroyed.
    #[error("failed to destroy sample store: {0}")]
    DestroyFailed(String),
}

impl StoreError {
    pub(crate) fn init(err: anyhow::Error) -> Self {
        StoreError::InitFailed(format!("{err:#}"))
    }

    pub(crate) fn write(err: anyhow::Error) -> Self {
        StoreError::WriteFailed(format!("{err:#}"))
    }

    pub(crate) fn read(err: anyhow::Error) -> Self {
        StoreError::ReadFailed(format!("{err:#}"))
    }

    pub(crate) fn destroy(err: anyhow::Error) -> Self {
        StoreError::DestroyFailed(format!("{err:#}"))
    }
}
