pub mod clock;
pub mod config;
pub mod error;
pub mod lease;
pub mod memory;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod testutil;
pub mod traits;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QueueConfig, WorkerConfig};
pub use error::AppError;
pub use memory::MemoryStore;
pub use models::{
    ClaimedItem, ItemError, ItemErrorReason, ItemId, ItemPayload, ItemResult, ItemResults,
    LeaseState, QueueStats, RowOutcome, SubmitReport, SubmitStatus, WorkItem,
};
pub use service::QueueService;
pub use store::ItemStore;
pub use traits::{Analyzer, QueueApi};
