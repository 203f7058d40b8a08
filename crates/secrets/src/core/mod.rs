//! Core types: records, labels, errors

mod error;
pub mod labels;
mod record;

pub use error::{CleanupFailure, SecretsError, SecretsResult, StoreError, StoreResult};
pub use labels::RecordLabels;
pub use record::{CredentialRecord, GenerationClass, RecordData, RecordVersion};
