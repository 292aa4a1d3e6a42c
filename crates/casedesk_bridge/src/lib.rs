pub mod bridge;
pub mod memory;

pub use bridge::{
    BlobStore, BridgeError, DraftStore, GeolocationProvider, Identity, IdentityProvider,
    RecordService, StoredObject,
};
pub use memory::{
    FixedGeolocation, InMemoryBlobStore, InMemoryDraftStore, InMemoryRecordService,
    StaticIdentity, StoredCase,
};
