//! Document-processing backend
//!
//! The editing engine talks to the backend only through [`DocumentBackend`].
//! [`HttpBackend`] is the REST client. The in-memory `MockBackend` used by
//! tests is compiled in only under `cfg(test)` or the `testing` feature.

pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod traits;
pub mod types;

pub use http::HttpBackend;
#[cfg(any(test, feature = "testing"))]
pub use mock::MockBackend;
pub use traits::{BackendResult, DocumentBackend};
pub use types::{
    ApplyEditsReport, BackendError, DocumentDescriptor, DocumentList, TaskStatusReport, UploadReceipt,
};
