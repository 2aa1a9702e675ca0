//! Roll-number allocation.
//!
//! Counter state lives in the shared store; the allocator only remembers
//! which namespaces it has already seeded in this process.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::domain::{Record, RollNamespace};
use crate::error::{AppError, Result};
use crate::service::retry::{AttemptError, attempt};
use crate::storage::{Collection, Storage};

/// A record that carries an allocated roll number.
pub trait RollRecord: Record {
    /// The allocated roll number.
    fn roll_number(&self) -> &str;
}

/// Persistence for records keyed by roll number.
#[async_trait]
pub trait ApplicationStore<R>: Send + Sync {
    /// Insert a record. Fails with a duplicate-key storage error if its
    /// roll number is taken.
    async fn create(&self, record: R) -> Result<R>;

    /// Highest numeric roll number stored for `namespace`, or its baseline
    /// when none exist.
    async fn find_max_roll_number(&self, namespace: &RollNamespace) -> Result<i64>;
}

#[async_trait]
impl<T: RollRecord + 'static> ApplicationStore<T> for Collection<T> {
    async fn create(&self, record: T) -> Result<T> {
        self.insert(&record).await?;
        Ok(record)
    }

    async fn find_max_roll_number(&self, namespace: &RollNamespace) -> Result<i64> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter_map(|record| namespace.parse(record.roll_number()))
            .fold(namespace.baseline, i64::max))
    }
}

/// Hands out unique, increasing roll numbers.
pub struct RollNumberAllocator {
    counters: Arc<dyn Storage>,
    seeded: DashMap<String, Arc<OnceCell<i64>>>,
    max_attempts: u32,
}

impl RollNumberAllocator {
    /// Create an allocator over the shared counter store.
    pub fn new(counters: Arc<dyn Storage>, max_attempts: u32) -> Self {
        Self {
            counters,
            seeded: DashMap::new(),
            max_attempts,
        }
    }

    /// Seed the namespace counter from existing records if it does not exist.
    ///
    /// Runs at most once per namespace for the life of the allocator. The
    /// seed only ever raises the counter, so racing initializers settle on
    /// the larger of their observations.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the counter or the store cannot be read.
    pub async fn initialize<R, S>(&self, namespace: &RollNamespace, store: &S) -> Result<()>
    where
        S: ApplicationStore<R> + ?Sized,
    {
        let cell = self
            .seeded
            .entry(namespace.name.clone())
            .or_default()
            .clone();

        cell.get_or_try_init(|| async {
            if let Some(state) = self.counters.get_counter(&namespace.name).await? {
                return Ok::<_, AppError>(state.seq);
            }

            let max_issued = store.find_max_roll_number(namespace).await?;
            let seq = self
                .counters
                .raise_floor(&namespace.name, namespace.seed_for(max_issued))
                .await?;
            info!(
                namespace = %namespace.name,
                max_issued,
                seq,
                "Seeded roll counter"
            );
            Ok(seq)
        })
        .await?;

        Ok(())
    }

    /// Atomically advance the namespace counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the increment fails.
    pub async fn next_value(&self, namespace: &RollNamespace) -> Result<i64> {
        Ok(self.counters.increment(&namespace.name).await?)
    }

    /// Draw the next formatted roll number for the namespace.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the increment fails.
    pub async fn next_roll_number(&self, namespace: &RollNamespace) -> Result<String> {
        let value = self.next_value(namespace).await?;
        Ok(namespace.format(namespace.baseline + value))
    }

    /// Allocate a roll number and persist the record `build` makes from it.
    ///
    /// A duplicate-key failure draws a fresh number and tries again, up to
    /// the configured number of attempts. Failed attempts leave gaps.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when every attempt collided. Any other
    /// error from the store is returned unchanged.
    pub async fn allocate<R, S, B>(&self, namespace: &RollNamespace, store: &S, build: B) -> Result<R>
    where
        R: Send,
        S: ApplicationStore<R> + ?Sized,
        B: Fn(String) -> R + Sync,
    {
        self.initialize(namespace, store).await?;

        let build = &build;
        let outcome = attempt(
            |n| async move {
                let roll_number = self.next_roll_number(namespace).await?;
                match store.create(build(roll_number.clone())).await {
                    Err(e) if e.is_duplicate_key() => {
                        metrics::counter!(
                            "admitdesk_roll_collisions_total",
                            "namespace" => namespace.name.clone()
                        )
                        .increment(1);
                        warn!(
                            namespace = %namespace.name,
                            roll_number = %roll_number,
                            attempt = n,
                            "Roll number collision, retrying"
                        );
                        Err(e)
                    }
                    other => other,
                }
            },
            self.max_attempts,
            AppError::is_duplicate_key,
        )
        .await;

        match outcome {
            Ok(record) => {
                metrics::counter!(
                    "admitdesk_roll_allocations_total",
                    "namespace" => namespace.name.clone()
                )
                .increment(1);
                Ok(record)
            }
            Err(AttemptError::Exhausted { attempts, .. }) => {
                metrics::counter!(
                    "admitdesk_roll_conflicts_total",
                    "namespace" => namespace.name.clone()
                )
                .increment(1);
                warn!(namespace = %namespace.name, attempts, "Roll number allocation exhausted");
                Err(AppError::Conflict(namespace.name.clone()))
            }
            Err(AttemptError::Aborted(e)) => Err(e),
        }
    }
}
