//! Workspace backend clients: identity (sessions), object storage (panel
//! images), and the document store holding defect and analysis records.

mod client;
mod error;

pub mod identity;
pub mod objects;
pub mod records;

pub use client::BackendClient;
pub use error::StoreError;
pub use identity::{IdentityClient, Session, User};
pub use objects::{IMAGE_BUCKET, ObjectStore};
pub use records::{
    AnalysisStore, DEFECTS_COLLECTION, HISTORY_COLLECTION, HISTORY_PAGE_LIMIT, RecordMeta,
    RecordStore,
};
