pub mod memory;
pub mod records;
pub mod snapshot;

pub use memory::{CommitApplied, StoreState, TrackingStore};
pub use records::{Attempt, Enrollment, LegacyBookmark};
