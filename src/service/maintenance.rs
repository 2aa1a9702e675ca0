//! Operator maintenance over stored results and counters.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::AllocationConfig;
use crate::domain::{Admission, CompetitionApplication, ExamResult, RankChange, RollNamespace};
use crate::error::Result;
use crate::service::allocator::ApplicationStore;
use crate::service::ranking::{self, RankVerification};
use crate::service::results::ResultService;
use crate::storage::{Collection, Storage};

/// Outcome of a duplicate sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupeReport {
    /// Roll numbers of the removed entries.
    pub removed: Vec<String>,
    /// Ranks that moved in the follow-up recalculation.
    pub rank_changes: Vec<RankChange>,
}

/// Counter value written by a reseed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReseedOutcome {
    pub namespace: String,
    pub max_roll_number: i64,
    pub seq: i64,
}

/// Maintenance operations used by the operator CLI.
pub struct MaintenanceService {
    storage: Arc<dyn Storage>,
    results: Arc<ResultService>,
    allocation: AllocationConfig,
}

impl MaintenanceService {
    /// Create a maintenance service.
    pub fn new(
        storage: Arc<dyn Storage>,
        results: Arc<ResultService>,
        allocation: AllocationConfig,
    ) -> Self {
        Self {
            storage,
            results,
            allocation,
        }
    }

    /// Prefixes stripped when comparing result roll numbers.
    fn known_prefixes(&self) -> Vec<String> {
        let config = self.results.config();
        let mut prefixes = config.legacy_prefixes.clone();
        prefixes.push(config.canonical_prefix.clone());
        prefixes
    }

    /// Remove published results that share a base roll number, keeping the
    /// newest of each group, then re-rank what is published.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read or delete fails.
    pub async fn dedupe(&self) -> Result<DedupeReport> {
        let published: Vec<ExamResult> = self
            .results
            .all()
            .await?
            .into_iter()
            .filter(|r| r.is_published)
            .collect();

        let (_, duplicates) = ranking::split_duplicates(published, &self.known_prefixes());
        self.results.delete_many(&duplicates).await?;
        let removed: Vec<String> = duplicates.into_iter().map(|r| r.roll_number).collect();
        info!(removed = removed.len(), "Duplicate results removed");

        let rank_changes = self.results.recalculate_ranks(true).await?.changes;
        Ok(DedupeReport {
            removed,
            rank_changes,
        })
    }

    /// Delete every result whose roll number starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read or delete fails.
    pub async fn purge_prefix(&self, prefix: &str) -> Result<usize> {
        let prefix = prefix.trim().to_uppercase();
        let matching: Vec<ExamResult> = self
            .results
            .all()
            .await?
            .into_iter()
            .filter(|r| r.roll_number.starts_with(&prefix))
            .collect();

        let deleted = self.results.delete_many(&matching).await?;
        info!(prefix = %prefix, deleted, "Purged results by prefix");
        Ok(deleted)
    }

    /// Compare the stored ranks of the `top` best results with their marks.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn verify_ranks(&self, top: usize) -> Result<RankVerification> {
        Ok(ranking::verify(self.results.all().await?, top))
    }

    /// Raise every namespace counter to at least the highest roll number on
    /// record. Counters are never lowered, so deleted roll numbers stay
    /// retired.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a scan or counter write fails.
    pub async fn reseed_counters(&self) -> Result<Vec<ReseedOutcome>> {
        let applications: Collection<CompetitionApplication> =
            Collection::new(self.storage.clone());
        let admissions: Collection<Admission> = Collection::new(self.storage.clone());

        let competition = self
            .reseed::<CompetitionApplication, _>(&self.allocation.competition, &applications)
            .await?;
        let admission = self
            .reseed::<Admission, _>(&self.allocation.admission, &admissions)
            .await?;
        Ok(vec![competition, admission])
    }

    async fn reseed<R, S>(&self, namespace: &RollNamespace, store: &S) -> Result<ReseedOutcome>
    where
        S: ApplicationStore<R>,
    {
        let max_roll_number = store.find_max_roll_number(namespace).await?;
        let floor = namespace.seed_for(max_roll_number);
        let seq = self.storage.raise_floor(&namespace.name, floor).await?;

        info!(namespace = %namespace.name, max_roll_number, floor, seq, "Counter reseeded");
        Ok(ReseedOutcome {
            namespace: namespace.name.clone(),
            max_roll_number,
            seq,
        })
    }
}
