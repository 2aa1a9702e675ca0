//! Copying data between admitdesk instances over their HTTP API.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::domain::{
    Admission, ApiResponse, BulkCreateRequest, BulkCreateResponse, CompetitionApplication,
    ExamResult, ListResponse, PublishRequest, PublishResponse, Record, ResultInput,
};
use crate::service::maintenance::{MaintenanceService, ReseedOutcome};
use crate::service::results::ResultService;
use crate::storage::{Collection, Storage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A collection that can be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SyncTarget {
    Competition,
    Results,
    Admissions,
}

impl SyncTarget {
    const ALL: [Self; 3] = [Self::Competition, Self::Results, Self::Admissions];

    const fn path(self) -> &'static str {
        match self {
            Self::Competition => "/api/competition-applications",
            Self::Results => "/api/results/all",
            Self::Admissions => "/api/admissions",
        }
    }
}

/// Per-collection sync outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSync {
    pub collection: &'static str,
    pub fetched: usize,
    pub imported: usize,
    pub failed: usize,
}

/// Outcome of a full sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Backup written before local data was replaced.
    pub backup: PathBuf,
    pub collections: Vec<CollectionSync>,
    pub counters: Vec<ReseedOutcome>,
}

/// Outcome of pushing results to another instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub pushed: usize,
    pub upsert: BulkCreateResponse,
    pub published: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Backup {
    taken_at: DateTime<Utc>,
    competition_applications: Vec<CompetitionApplication>,
    results: Vec<ExamResult>,
    admissions: Vec<Admission>,
}

/// HTTP client for another admitdesk instance.
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    /// Create a client for the instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Vec<T>> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let list: ListResponse<T> = read_envelope(response).await?;
        Ok(list.items)
    }

    async fn bulk_create(&self, results: Vec<ResultInput>) -> anyhow::Result<BulkCreateResponse> {
        let url = self.url("/api/results/bulk-create");
        let response = self
            .client
            .post(&url)
            .json(&BulkCreateRequest { results })
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        read_envelope(response).await
    }

    async fn publish_all(&self) -> anyhow::Result<PublishResponse> {
        let url = self.url("/api/results/publish");
        let response = self
            .client
            .patch(&url)
            .json(&PublishRequest {
                publish_all: true,
                roll_numbers: Vec::new(),
            })
            .send()
            .await
            .with_context(|| format!("PATCH {url} failed"))?;
        read_envelope(response).await
    }
}

/// Unwrap the `{code, message, data}` envelope of a response.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    let status = response.status();
    let url = response.url().to_string();
    let body: ApiResponse<T> = response
        .json()
        .await
        .with_context(|| format!("Invalid response body from {url}"))?;

    if !status.is_success() || body.code != 0 {
        bail!("{url} returned {status}: {}", body.message);
    }
    body.data.with_context(|| format!("{url} returned no data"))
}

/// Copies collections between this store and a remote instance.
pub struct Syncer {
    storage: Arc<dyn Storage>,
    results: Arc<ResultService>,
    maintenance: Arc<MaintenanceService>,
}

impl Syncer {
    /// Create a syncer over the local store.
    pub fn new(
        storage: Arc<dyn Storage>,
        results: Arc<ResultService>,
        maintenance: Arc<MaintenanceService>,
    ) -> Self {
        Self {
            storage,
            results,
            maintenance,
        }
    }

    /// Replace local collections with a remote instance's records.
    ///
    /// A JSON backup of the local data is written to `backup_dir` first.
    /// Counters are raised to cover the imported roll numbers afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup cannot be written, the remote cannot
    /// be read, or local storage fails. Records that fail to insert are
    /// counted, not fatal.
    pub async fn sync_from(
        &self,
        remote: &RemoteClient,
        only: Option<SyncTarget>,
        backup_dir: &Path,
    ) -> anyhow::Result<SyncReport> {
        let backup = self.write_backup(backup_dir).await?;
        info!(path = %backup.display(), "Local data backed up");

        let targets: Vec<SyncTarget> = only.map_or_else(|| SyncTarget::ALL.to_vec(), |t| vec![t]);
        let mut collections = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = match target {
                SyncTarget::Competition => {
                    self.replace::<CompetitionApplication>(remote, target).await?
                }
                SyncTarget::Results => self.replace::<ExamResult>(remote, target).await?,
                SyncTarget::Admissions => self.replace::<Admission>(remote, target).await?,
            };
            collections.push(outcome);
        }

        let counters = self.maintenance.reseed_counters().await?;
        Ok(SyncReport {
            backup,
            collections,
            counters,
        })
    }

    async fn replace<T: Record>(
        &self,
        remote: &RemoteClient,
        target: SyncTarget,
    ) -> anyhow::Result<CollectionSync> {
        let records: Vec<T> = remote.list(target.path()).await?;
        let collection: Collection<T> = Collection::new(self.storage.clone());

        let cleared = collection.delete_all().await?;
        info!(
            collection = T::COLLECTION,
            cleared,
            fetched = records.len(),
            "Replacing collection"
        );

        let mut imported = 0;
        let mut failed = 0;
        for record in &records {
            match collection.insert(record).await {
                Ok(()) => imported += 1,
                Err(e) => {
                    warn!(
                        collection = T::COLLECTION,
                        id = record.id(),
                        error = %e,
                        "Record not imported"
                    );
                    failed += 1;
                }
            }
        }

        Ok(CollectionSync {
            collection: T::COLLECTION,
            fetched: records.len(),
            imported,
            failed,
        })
    }

    async fn write_backup(&self, backup_dir: &Path) -> anyhow::Result<PathBuf> {
        let taken_at = Utc::now();
        let backup = Backup {
            taken_at,
            competition_applications: Collection::new(self.storage.clone()).list().await?,
            results: Collection::new(self.storage.clone()).list().await?,
            admissions: Collection::new(self.storage.clone()).list().await?,
        };

        tokio::fs::create_dir_all(backup_dir)
            .await
            .with_context(|| format!("Failed to create {}", backup_dir.display()))?;
        let path = backup_dir.join(format!(
            "admitdesk-backup-{}.json",
            taken_at.format("%Y%m%dT%H%M%S%.3f")
        ));
        let json = serde_json::to_vec_pretty(&backup)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Send every local published result to a remote instance and publish
    /// them there.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails or the remote rejects a
    /// request.
    pub async fn push_results(&self, remote: &RemoteClient) -> anyhow::Result<PushReport> {
        let inputs: Vec<ResultInput> = self
            .results
            .published()
            .await?
            .iter()
            .map(ResultInput::from)
            .collect();
        if inputs.is_empty() {
            info!("No published results to push");
            return Ok(PushReport::default());
        }

        let pushed = inputs.len();
        let upsert = remote.bulk_create(inputs).await?;
        info!(
            pushed,
            created = upsert.created,
            updated = upsert.updated,
            failed = upsert.failed,
            "Results pushed"
        );

        let published = remote.publish_all().await?.modified_count;
        info!(published, "Results published on remote");

        Ok(PushReport {
            pushed,
            upsert,
            published,
        })
    }
}
