pub mod schema;
pub mod validator;

pub use validator::{validate_batch, ElementWarning, NormalizedBatch, ProjectedWrites, WarningKind};
