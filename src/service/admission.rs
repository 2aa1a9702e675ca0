//! Course admissions.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::{Admission, AdmissionStatus, NewAdmission, RollNamespace};
use crate::error::{AppError, Result};
use crate::service::allocator::{RollNumberAllocator, RollRecord};
use crate::storage::{Collection, Storage};

impl RollRecord for Admission {
    fn roll_number(&self) -> &str {
        &self.roll_number
    }
}

/// Service for admissions.
pub struct AdmissionService {
    admissions: Collection<Admission>,
    allocator: Arc<RollNumberAllocator>,
    namespace: RollNamespace,
}

impl AdmissionService {
    /// Create a new admission service.
    pub fn new(
        storage: Arc<dyn Storage>,
        allocator: Arc<RollNumberAllocator>,
        namespace: RollNamespace,
    ) -> Self {
        Self {
            admissions: Collection::new(storage),
            allocator,
            namespace,
        }
    }

    /// Validate and store an admission under a new roll number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a bad form, `AppError::Conflict`
    /// when roll allocation keeps colliding, or a storage error.
    pub async fn submit(&self, form: NewAdmission) -> Result<Admission> {
        let draft = form.validate().map_err(AppError::Validation)?;

        let admission = self
            .allocator
            .allocate(&self.namespace, &self.admissions, |roll_number| {
                draft.with_roll_number(roll_number)
            })
            .await?;

        info!(id = %admission.id, roll_number = %admission.roll_number, "Admission created");
        Ok(admission)
    }

    /// All admissions, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn list(&self) -> Result<Vec<Admission>> {
        Ok(self.admissions.list().await?)
    }

    /// Get an admission by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no such admission exists.
    pub async fn get(&self, id: &str) -> Result<Admission> {
        self.admissions
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Admission".to_string()))
    }

    /// Set the review status of an admission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown status and
    /// `AppError::NotFound` for an unknown admission.
    pub async fn update_status(&self, id: &str, status: &str) -> Result<Admission> {
        let status: AdmissionStatus = status.parse().map_err(AppError::BadRequest)?;

        let mut admission = self.get(id).await?;
        admission.status = status;
        admission.updated_at = Utc::now();
        self.admissions.replace(&admission).await?;

        info!(id, ?status, "Admission status updated");
        Ok(admission)
    }
}
