//! Document ingestion
//!
//! Tracks an upload through asynchronous server-side extraction:
//!
//! 1. The file is validated locally (name and `%PDF` header)
//! 2. Upload returns a document id and a task id
//! 3. The task is polled every interval until it succeeds or fails
//! 4. On success the document record is fetched and the state becomes ready
//!
//! Polling stops on the first transport error and after a hard ceiling.

pub mod cancel;
pub mod machine;
pub mod types;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use machine::{poll_until_ready, validate_upload, IngestionController, PollSettings};
pub use types::{
    FailureReason, IngestionError, IngestionState, IngestionTask, TaskStatus, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_TIMEOUT,
};
