use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::student_service::StudentService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    students: Arc<StudentService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, applying migrations.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over the in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let students = Arc::new(StudentService::new(clock, Arc::clone(&storage.students)));
        Self { students }
    }

    #[must_use]
    pub fn students(&self) -> Arc<StudentService> {
        Arc::clone(&self.students)
    }
}
