//! Domain models for admitdesk.
//!
//! Records persisted in the document store, roll-number namespaces,
//! counters, and the API contracts built on them.

pub mod admission;
pub mod application;
pub mod counter;
pub mod document;
pub mod dto;
pub mod image;
pub mod result;
pub mod roll;

pub use admission::{Admission, AdmissionStatus, NewAdmission};
pub use application::{
    CompetitionApplication, NewCompetitionApplication, PaymentStatus, parse_date,
};
pub use counter::CounterState;
pub use document::{Document, Record, new_id};
pub use dto::{
    ApiResponse, BulkCreateRequest, BulkCreateResponse, BulkError, DeleteResponse,
    HealthResponse, ListResponse, PublishRequest, PublishResponse, RankChange,
    ReadyComponents, ReadyResponse, RecalculateRequest, RecalculateResponse, ResultStats,
    RollLookupQuery, SearchMiss, StatusUpdate, SubjectStats, TopPerformer, UploadResponse,
};
pub use image::Image;
pub use result::{ExamResult, Grade, ResultInput, ResultStatus, Subject, normalize_roll_number};
pub use roll::RollNamespace;
