//! The commit service's `SQLite` persistence collaborator.

use std::sync::{Arc, Mutex};

use crate::commit::EnrollmentSink;
use crate::error::{Error, Result};
use crate::record::{NewEnrollment, StoredEnrollment};

use super::Storage;

/// Writes enrollments to a [`Storage`] on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteSink {
    /// Wrap an open storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Shared handle to the underlying storage, for reads.
    #[must_use]
    pub fn storage(&self) -> Arc<Mutex<Storage>> {
        Arc::clone(&self.storage)
    }
}

#[async_trait::async_trait]
impl EnrollmentSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn create_enrollment(&self, record: &NewEnrollment) -> Result<StoredEnrollment> {
        let storage = Arc::clone(&self.storage);
        let record = record.clone();

        tokio::task::spawn_blocking(move || {
            let mut storage = storage
                .lock()
                .map_err(|_| Error::internal("storage lock poisoned"))?;
            storage.insert_enrollment(&record)
        })
        .await
        .map_err(|err| Error::internal(format!("storage task failed: {err}")))?
    }
}
