mod blob;
mod repository;

pub use blob::LocalBlobStore;
pub use repository::{CaseDocumentRecord, CaseRecord, CaseStore, DeadLetterRecord, StorageConfig};
