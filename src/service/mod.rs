//! Service layer module.
//!
//! Contains business logic for roll-number allocation, intake, results and
//! operator maintenance.

pub mod admission;
pub mod allocator;
pub mod competition;
pub mod image;
pub mod import;
pub mod maintenance;
pub mod ranking;
pub mod results;
pub mod retry;
pub mod sync;

pub use admission::AdmissionService;
pub use allocator::{ApplicationStore, RollNumberAllocator, RollRecord};
pub use competition::CompetitionService;
pub use image::ImageService;
pub use import::{ImportOptions, ImportReport, import_sheet};
pub use maintenance::{DedupeReport, MaintenanceService, ReseedOutcome};
pub use ranking::RankVerification;
pub use results::{ResultService, SearchOutcome};
pub use sync::{PushReport, RemoteClient, SyncReport, SyncTarget, Syncer};
