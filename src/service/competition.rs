//! Competition application intake.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::CompetitionConfig;
use crate::domain::{
    CompetitionApplication, NewCompetitionApplication, PaymentStatus, RollNamespace, parse_date,
};
use crate::error::{AppError, Result};
use crate::service::allocator::{RollNumberAllocator, RollRecord};
use crate::storage::{Collection, Storage};

impl RollRecord for CompetitionApplication {
    fn roll_number(&self) -> &str {
        &self.roll_number
    }
}

/// Service for competition applications.
pub struct CompetitionService {
    applications: Collection<CompetitionApplication>,
    allocator: Arc<RollNumberAllocator>,
    namespace: RollNamespace,
    rules: CompetitionConfig,
}

impl CompetitionService {
    /// Create a new competition service.
    pub fn new(
        storage: Arc<dyn Storage>,
        allocator: Arc<RollNumberAllocator>,
        namespace: RollNamespace,
        rules: CompetitionConfig,
    ) -> Self {
        Self {
            applications: Collection::new(storage),
            allocator,
            namespace,
            rules,
        }
    }

    /// Validate an intake form and store it under a freshly allocated roll number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a bad form, `AppError::Conflict`
    /// when roll allocation keeps colliding, or a storage error.
    pub async fn submit(&self, form: NewCompetitionApplication) -> Result<CompetitionApplication> {
        let draft = form
            .validate(&self.rules, Utc::now().date_naive())
            .map_err(AppError::Validation)?;

        let application = self
            .allocator
            .allocate(&self.namespace, &self.applications, |roll_number| {
                draft.with_roll_number(roll_number)
            })
            .await?;

        info!(
            id = %application.id,
            roll_number = %application.roll_number,
            "Competition application created"
        );
        Ok(application)
    }

    /// All applications, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn list(&self) -> Result<Vec<CompetitionApplication>> {
        Ok(self.applications.list().await?)
    }

    /// Get an application by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no such application exists.
    pub async fn get(&self, id: &str) -> Result<CompetitionApplication> {
        self.applications
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application".to_string()))
    }

    /// Look up an application by roll number, checking the date of birth
    /// when one is supplied.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown roll number and
    /// `AppError::Forbidden` when the date of birth does not match.
    pub async fn find_by_roll(
        &self,
        roll_number: &str,
        dob: Option<&str>,
    ) -> Result<CompetitionApplication> {
        let application = self
            .applications
            .find_by_key(roll_number.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Application".to_string()))?;

        if let Some(dob) = dob.map(str::trim).filter(|d| !d.is_empty()) {
            if parse_date(dob) != Some(application.date_of_birth) {
                return Err(AppError::Forbidden("DOB does not match".to_string()));
            }
        }
        Ok(application)
    }

    /// Set the payment status of an application.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown status and
    /// `AppError::NotFound` for an unknown application.
    pub async fn update_payment(&self, id: &str, status: &str) -> Result<CompetitionApplication> {
        let status: PaymentStatus = status.parse().map_err(AppError::BadRequest)?;

        let mut application = self.get(id).await?;
        application.payment_status = status;
        application.updated_at = Utc::now();
        self.applications.replace(&application).await?;

        info!(id, roll_number = %application.roll_number, ?status, "Payment status updated");
        Ok(application)
    }

    /// Delete an application.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no such application exists.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.applications.delete(id).await? {
            return Err(AppError::NotFound("Application".to_string()));
        }
        info!(id, "Competition application deleted");
        Ok(())
    }

    /// Namespace applications are numbered in.
    #[must_use]
    pub const fn namespace(&self) -> &RollNamespace {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;
    use crate::storage::file::FileStorage;
    use tempfile::TempDir;

    fn create_service() -> (CompetitionService, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            FileStorage::new(&FileStorageConfig {
                data_dir: temp.path().to_path_buf(),
            })
            .unwrap(),
        );
        let allocator = Arc::new(RollNumberAllocator::new(storage.clone(), 10));
        let service = CompetitionService::new(
            storage,
            allocator,
            RollNamespace::competition(),
            CompetitionConfig::default(),
        );
        (service, temp)
    }

    fn form() -> NewCompetitionApplication {
        let dob = Utc::now().date_naive() - chrono::Duration::days(16 * 365);
        NewCompetitionApplication {
            name: Some("Asha Verma".to_string()),
            father_name: Some("Ramesh Verma".to_string()),
            mother_name: Some("Sunita Verma".to_string()),
            phone: Some("9876543210".to_string()),
            aadhaar: Some("123412341234".to_string()),
            date_of_birth: Some(dob.format("%Y-%m-%d").to_string()),
            school: Some("City Inter College".to_string()),
            class_passed: Some("10th".to_string()),
            address: Some("Semri, Jaunpur".to_string()),
            image: Some("/api/images/abc".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_allocates_sequential_rolls() {
        let (service, _temp) = create_service();

        let first = service.submit(form()).await.unwrap();
        let second = service.submit(form()).await.unwrap();
        assert_eq!(first.roll_number, "1001");
        assert_eq!(second.roll_number, "1002");

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_form_consumes_no_roll() {
        let (service, _temp) = create_service();

        let mut bad = form();
        bad.aadhaar = Some("1234".to_string());
        assert!(matches!(
            service.submit(bad).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let app = service.submit(form()).await.unwrap();
        assert_eq!(app.roll_number, "1001");
    }

    #[tokio::test]
    async fn test_find_by_roll_checks_dob() {
        let (service, _temp) = create_service();
        let app = service.submit(form()).await.unwrap();
        let dob = app.date_of_birth.format("%Y-%m-%d").to_string();

        let found = service.find_by_roll("1001", Some(&dob)).await.unwrap();
        assert_eq!(found.id, app.id);
        assert!(service.find_by_roll("1001", None).await.is_ok());

        let err = service
            .find_by_roll("1001", Some("1999-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service.find_by_roll("4444", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_payment_and_delete() {
        let (service, _temp) = create_service();
        let app = service.submit(form()).await.unwrap();

        let updated = service.update_payment(&app.id, "verified").await.unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Verified);
        assert!(matches!(
            service.update_payment(&app.id, "paid").await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        service.delete(&app.id).await.unwrap();
        assert!(matches!(
            service.delete(&app.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
