//! Remote and local feedback datasets.
//!
//! - `remote`: the server-backed dataset facade
//! - `records`: its filtered, sorted, paginated records view
//! - `local`: the in-memory dataset a remote one is pulled into
//! - `validation`, `unification`, `training`, `export`: helpers the two share

mod export;
mod local;
mod records;
mod remote;
mod training;
mod unification;
mod validation;

pub use export::{DirectoryExporter, HubExporter};
pub use local::FeedbackDataset;
pub use records::{FetchedPage, RecordsCursor, RecordsOverrides, RemoteFeedbackRecords};
pub use remote::RemoteFeedbackDataset;
pub use training::{TextClassificationExample, TrainingData, TrainingTask};
pub use unification::{LabelStrategy, RatingStrategy, UnificationStrategy, unify_records};
pub use validation::{
    RecordInput, RecordSchema, RecordsInput, parse_and_validate_records, validate_metadata,
};
