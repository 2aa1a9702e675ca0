//! Exam result publishing and search.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::ResultsConfig;
use crate::domain::{
    BulkCreateResponse, BulkError, ExamResult, PublishRequest, RecalculateResponse, ResultInput,
    ResultStats, Subject, SubjectStats, TopPerformer, normalize_roll_number,
};
use crate::error::{AppError, Result};
use crate::service::ranking;
use crate::storage::{Collection, Storage};

/// Outcome of a public result search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A published result matched.
    Found(Box<ExamResult>),
    /// Nothing has been published yet; carries the announcement.
    NotPublished(String),
    /// Results are out but this roll number has none.
    Missing(String),
}

/// Service for exam results.
pub struct ResultService {
    results: Collection<ExamResult>,
    config: ResultsConfig,
}

impl ResultService {
    /// Create a new result service.
    pub fn new(storage: Arc<dyn Storage>, config: ResultsConfig) -> Self {
        Self {
            results: Collection::new(storage),
            config,
        }
    }

    /// Result settings in use.
    #[must_use]
    pub const fn config(&self) -> &ResultsConfig {
        &self.config
    }

    /// Normalize a roll number typed into the public search.
    ///
    /// Legacy prefixes are rewritten to the canonical prefix and a bare
    /// number gets the canonical prefix.
    #[must_use]
    pub fn normalize_search(&self, roll_number: &str) -> String {
        let roll = normalize_roll_number(roll_number);
        let canonical = self.config.canonical_prefix.to_uppercase();

        for legacy in &self.config.legacy_prefixes {
            if let Some(rest) = roll.strip_prefix(legacy.to_uppercase().as_str()) {
                return format!("{canonical}{rest}");
            }
        }
        if roll.starts_with(|c: char| c.is_ascii_digit()) {
            return format!("{canonical}{roll}");
        }
        roll
    }

    /// Look up a published result by roll number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty roll number or a storage
    /// error if the lookup fails.
    pub async fn search(&self, roll_number: &str) -> Result<SearchOutcome> {
        if roll_number.trim().is_empty() {
            return Err(AppError::BadRequest("Roll number is required".to_string()));
        }

        let roll = self.normalize_search(roll_number);
        if let Some(result) = self.results.find_by_key(&roll).await? {
            if result.is_published {
                return Ok(SearchOutcome::Found(Box::new(result)));
            }
        }

        let any_published = self.results.list().await?.iter().any(|r| r.is_published);
        if any_published {
            Ok(SearchOutcome::Missing(format!(
                "No result for roll number {roll}. Please check your roll number and try again."
            )))
        } else {
            Ok(SearchOutcome::NotPublished(self.config.announcement.clone()))
        }
    }

    /// Every stored result, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn all(&self) -> Result<Vec<ExamResult>> {
        Ok(self.results.list().await?)
    }

    /// Published results ordered by rank, then subject.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn published(&self) -> Result<Vec<ExamResult>> {
        let mut results = self.published_unordered().await?;
        results.sort_by(|a, b| a.rank.cmp(&b.rank).then(a.subject.cmp(&b.subject)));
        Ok(results)
    }

    /// Published results for one subject, ordered by rank.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown subject.
    pub async fn by_subject(&self, subject: &str) -> Result<Vec<ExamResult>> {
        let subject: Subject = subject.parse().map_err(AppError::BadRequest)?;
        let mut results: Vec<ExamResult> = self
            .published_unordered()
            .await?
            .into_iter()
            .filter(|r| r.subject == subject)
            .collect();
        results.sort_by_key(|r| r.rank);
        Ok(results)
    }

    /// Best published results by rank. A limit of zero means the default.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn top(&self, limit: Option<usize>) -> Result<Vec<ExamResult>> {
        let limit = limit
            .filter(|n| *n > 0)
            .unwrap_or(self.config.default_top_limit);
        let mut results = self.published_unordered().await?;
        results.sort_by_key(|r| r.rank);
        results.truncate(limit);
        Ok(results)
    }

    /// Leaderboard of the three best published results.
    ///
    /// An unknown or absent subject means `Computer`; `Both` covers every
    /// subject.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn top3(&self, subject: Option<&str>) -> Result<Vec<TopPerformer>> {
        let subject = subject
            .and_then(|s| s.parse::<Subject>().ok())
            .unwrap_or(Subject::Computer);

        let mut results: Vec<ExamResult> = self
            .published_unordered()
            .await?
            .into_iter()
            .filter(|r| subject == Subject::Both || r.subject == subject)
            .collect();
        results.sort_by_key(|r| r.rank);
        Ok(results.iter().take(3).map(TopPerformer::from).collect())
    }

    /// Create a result, or update the one stored under the same roll number.
    ///
    /// Returns the stored result and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a missing or invalid field, or a
    /// storage error.
    pub async fn upsert(&self, input: ResultInput) -> Result<(ExamResult, bool)> {
        let roll = input
            .normalized_roll_number()
            .ok_or_else(|| AppError::Validation("rollNumber is required".to_string()))?;

        if let Some(existing) = self.results.find_by_key(&roll).await? {
            let updated = self.update_existing(existing, input).await?;
            return Ok((updated, false));
        }

        let result = input.clone().into_new_result().map_err(AppError::Validation)?;
        match self.results.insert(&result).await {
            Ok(()) => {
                info!(roll_number = %result.roll_number, "Result created");
                Ok((result, true))
            }
            Err(e) => {
                let e = AppError::from(e);
                if !e.is_duplicate_key() {
                    return Err(e);
                }
                // Lost a race with a concurrent create of the same roll number.
                let existing = self
                    .results
                    .find_by_key(&roll)
                    .await?
                    .ok_or(e)?;
                let updated = self.update_existing(existing, input).await?;
                Ok((updated, false))
            }
        }
    }

    async fn update_existing(
        &self,
        mut existing: ExamResult,
        input: ResultInput,
    ) -> Result<ExamResult> {
        input
            .apply_to(&mut existing)
            .map_err(AppError::Validation)?;
        self.results.replace(&existing).await?;
        info!(roll_number = %existing.roll_number, "Result updated");
        Ok(existing)
    }

    /// Upsert each input independently, collecting per-item failures.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when `inputs` is empty.
    pub async fn bulk_upsert(&self, inputs: Vec<ResultInput>) -> Result<BulkCreateResponse> {
        if inputs.is_empty() {
            return Err(AppError::BadRequest("Results array is required".to_string()));
        }

        let mut response = BulkCreateResponse::default();
        for (index, input) in inputs.into_iter().enumerate() {
            let roll_number = input.normalized_roll_number();
            match self.upsert(input).await {
                Ok((_, true)) => response.created += 1,
                Ok((_, false)) => response.updated += 1,
                Err(e) => {
                    warn!(index, roll_number = ?roll_number, error = %e, "Bulk result rejected");
                    response.failed += 1;
                    response.errors.push(BulkError {
                        index,
                        roll_number,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = response.created,
            updated = response.updated,
            failed = response.failed,
            "Bulk result upsert finished"
        );
        Ok(response)
    }

    /// Publish every result or the listed roll numbers.
    ///
    /// Returns the number of results matched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when the request names nothing.
    pub async fn publish(&self, request: PublishRequest) -> Result<usize> {
        if !request.publish_all && request.roll_numbers.is_empty() {
            return Err(AppError::BadRequest(
                "Either publishAll=true or rollNumbers array is required".to_string(),
            ));
        }

        let wanted: HashSet<String> = request
            .roll_numbers
            .iter()
            .map(|r| normalize_roll_number(r))
            .collect();
        let now = Utc::now();

        let mut matched = 0;
        for mut result in self.results.list().await? {
            if !request.publish_all && !wanted.contains(&result.roll_number) {
                continue;
            }
            result.is_published = true;
            result.published_at = Some(now);
            result.updated_at = now;
            self.results.replace(&result).await?;
            matched += 1;
        }

        metrics::counter!("admitdesk_results_published_total")
            .increment(u64::try_from(matched).unwrap_or(u64::MAX));
        info!(matched, publish_all = request.publish_all, "Results published");
        Ok(matched)
    }

    /// Publish every stored result.
    ///
    /// # Errors
    ///
    /// Returns a storage error if an update fails.
    pub async fn publish_all(&self) -> Result<usize> {
        self.publish(PublishRequest {
            publish_all: true,
            roll_numbers: Vec::new(),
        })
        .await
    }

    /// Delete a result by roll number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no result has that roll number.
    pub async fn delete(&self, roll_number: &str) -> Result<ExamResult> {
        let roll = normalize_roll_number(roll_number);
        let result = self
            .results
            .find_by_key(&roll)
            .await?
            .ok_or_else(|| AppError::NotFound("Result".to_string()))?;
        self.results.delete(&result.id).await?;
        info!(roll_number = %roll, "Result deleted");
        Ok(result)
    }

    /// Delete a batch of stored results by id.
    ///
    /// Returns how many were actually removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a delete fails.
    pub async fn delete_many(&self, results: &[ExamResult]) -> Result<usize> {
        let mut deleted = 0;
        for result in results {
            if self.results.delete(&result.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Per-subject aggregates over every stored result.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn stats(&self) -> Result<ResultStats> {
        let results = self.results.list().await?;
        let published = results.iter().filter(|r| r.is_published).count();

        let mut by_subject: BTreeMap<Subject, Vec<&ExamResult>> = BTreeMap::new();
        for result in &results {
            by_subject.entry(result.subject).or_default().push(result);
        }

        let subjects = by_subject
            .into_iter()
            .map(|(subject, group)| {
                let total = group.len();
                let sum: f64 = group.iter().map(|r| r.marks).sum();
                #[allow(clippy::cast_precision_loss)]
                let average = sum / total as f64;
                SubjectStats {
                    subject,
                    total,
                    average,
                    highest: group.iter().map(|r| r.marks).fold(f64::MIN, f64::max),
                    lowest: group.iter().map(|r| r.marks).fold(f64::MAX, f64::min),
                    passed: group
                        .iter()
                        .filter(|r| r.status == crate::domain::ResultStatus::Passed)
                        .count(),
                }
            })
            .collect();

        Ok(ResultStats {
            total: results.len(),
            published,
            unpublished: results.len() - published,
            subjects,
        })
    }

    /// Re-rank results by marks, writing only the ranks that moved.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read or write fails.
    pub async fn recalculate_ranks(&self, published_only: bool) -> Result<RecalculateResponse> {
        let mut results: Vec<ExamResult> = self
            .results
            .list()
            .await?
            .into_iter()
            .filter(|r| !published_only || r.is_published)
            .collect();

        ranking::order_by_marks(&mut results);
        let changes = ranking::assign_ranks(&mut results);

        let moved: HashSet<&str> = changes.iter().map(|c| c.roll_number.as_str()).collect();
        let now = Utc::now();
        for result in results.iter_mut().filter(|r| moved.contains(r.roll_number.as_str())) {
            result.updated_at = now;
            self.results.replace(result).await?;
        }

        info!(
            total = results.len(),
            changed = changes.len(),
            published_only,
            "Ranks recalculated"
        );
        Ok(RecalculateResponse {
            total: results.len(),
            changes,
        })
    }

    async fn published_unordered(&self) -> Result<Vec<ExamResult>> {
        Ok(self
            .results
            .list()
            .await?
            .into_iter()
            .filter(|r| r.is_published)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;
    use crate::domain::Grade;
    use crate::storage::file::FileStorage;
    use tempfile::TempDir;

    fn create_service() -> (ResultService, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            FileStorage::new(&FileStorageConfig {
                data_dir: temp.path().to_path_buf(),
            })
            .unwrap(),
        );
        (ResultService::new(storage, ResultsConfig::default()), temp)
    }

    fn input(roll: &str, subject: &str, marks: f64, rank: i64) -> ResultInput {
        ResultInput {
            roll_number: Some(roll.to_string()),
            name: Some(format!("Student {roll}")),
            father_name: Some("Father".to_string()),
            subject: Some(subject.to_string()),
            marks: Some(marks),
            rank: Some(rank),
            exam_date: Some("2024-10-20".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_search() {
        let (service, _temp) = create_service();
        assert_eq!(service.normalize_search(" gk1158 "), "SK1158");
        assert_eq!(service.normalize_search("1158"), "SK1158");
        assert_eq!(service.normalize_search("sk1158"), "SK1158");
    }

    #[tokio::test]
    async fn test_search_lifecycle() {
        let (service, _temp) = create_service();

        assert!(matches!(
            service.search("  ").await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        service.upsert(input("SK1158", "GK", 91.0, 1)).await.unwrap();
        let outcome = service.search("GK1158").await.unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::NotPublished(ResultsConfig::default().announcement)
        );

        service.publish_all().await.unwrap();
        match service.search("gk1158").await.unwrap() {
            SearchOutcome::Found(result) => {
                assert_eq!(result.roll_number, "SK1158");
                assert_eq!(result.grade, Some(Grade::APlus));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert!(matches!(
            service.search("SK9999").await.unwrap(),
            SearchOutcome::Missing(_)
        ));
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let (service, _temp) = create_service();

        let (created, is_new) = service.upsert(input("sk1001", "GK", 40.0, 2)).await.unwrap();
        assert!(is_new);
        assert_eq!(created.roll_number, "SK1001");

        let (updated, is_new) = service.upsert(input("SK1001", "GK", 75.0, 1)).await.unwrap();
        assert!(!is_new);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.marks, 75.0);
        assert_eq!(updated.grade, Some(Grade::BPlus));
        assert_eq!(service.all().await.unwrap().len(), 1);

        let err = service
            .upsert(input("SK1002", "GK", 120.0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bulk_upsert_collects_errors() {
        let (service, _temp) = create_service();

        assert!(matches!(
            service.bulk_upsert(Vec::new()).await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        let mut missing_name = input("SK1003", "GK", 50.0, 3);
        missing_name.name = None;
        let report = service
            .bulk_upsert(vec![
                input("SK1001", "GK", 80.0, 1),
                input("SK1001", "GK", 82.0, 1),
                missing_name,
            ])
            .await
            .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].index, 2);
        assert_eq!(report.errors[0].roll_number.as_deref(), Some("SK1003"));
        assert_eq!(report.errors[0].error, "name is required");
    }

    #[tokio::test]
    async fn test_publish_selected_and_listings() {
        let (service, _temp) = create_service();
        service.upsert(input("SK1001", "Computer", 90.0, 1)).await.unwrap();
        service.upsert(input("SK1002", "GK", 85.0, 2)).await.unwrap();
        service.upsert(input("SK1003", "Computer", 70.0, 3)).await.unwrap();

        assert!(matches!(
            service.publish(PublishRequest::default()).await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        let matched = service
            .publish(PublishRequest {
                publish_all: false,
                roll_numbers: vec!["sk1001".to_string(), "SK1003".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(matched, 2);

        let published = service.published().await.unwrap();
        let rolls: Vec<&str> = published.iter().map(|r| r.roll_number.as_str()).collect();
        assert_eq!(rolls, vec!["SK1001", "SK1003"]);

        assert_eq!(service.by_subject("GK").await.unwrap().len(), 0);
        assert!(matches!(
            service.by_subject("Maths").await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        assert_eq!(service.top(Some(1)).await.unwrap().len(), 1);
        assert_eq!(service.top(Some(0)).await.unwrap().len(), 2);
        assert_eq!(service.top(None).await.unwrap().len(), 2);
        let top3 = service.top3(None).await.unwrap();
        assert_eq!(top3.len(), 2);
        assert_eq!(top3[0].roll_number, "SK1001");
        assert_eq!(service.top3(Some("Both")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let (service, _temp) = create_service();
        service.upsert(input("SK1001", "GK", 90.0, 1)).await.unwrap();
        let mut failed = input("SK1002", "GK", 20.0, 2);
        failed.status = Some("Failed".to_string());
        service.upsert(failed).await.unwrap();
        service.upsert(input("SK1003", "Computer", 60.0, 1)).await.unwrap();
        service
            .publish(PublishRequest {
                publish_all: false,
                roll_numbers: vec!["SK1001".to_string()],
            })
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.unpublished, 2);
        let gk = stats.subjects.iter().find(|s| s.subject == Subject::Gk).unwrap();
        assert_eq!(gk.total, 2);
        assert_eq!(gk.average, 55.0);
        assert_eq!(gk.highest, 90.0);
        assert_eq!(gk.lowest, 20.0);
        assert_eq!(gk.passed, 1);

        service.delete("sk1003").await.unwrap();
        assert!(matches!(
            service.delete("SK1003").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_recalculate_ranks() {
        let (service, _temp) = create_service();
        service.upsert(input("SK1001", "GK", 50.0, 1)).await.unwrap();
        service.upsert(input("SK1002", "GK", 95.0, 2)).await.unwrap();
        service.upsert(input("SK1003", "GK", 10.0, 3)).await.unwrap();

        let report = service.recalculate_ranks(false).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.changes.len(), 2);

        let top = service.all().await.unwrap();
        let rank_of = |roll: &str| top.iter().find(|r| r.roll_number == roll).unwrap().rank;
        assert_eq!(rank_of("SK1002"), 1);
        assert_eq!(rank_of("SK1001"), 2);
        assert_eq!(rank_of("SK1003"), 3);

        assert!(service.recalculate_ranks(false).await.unwrap().changes.is_empty());
        assert_eq!(service.recalculate_ranks(true).await.unwrap().total, 0);
    }
}
