//! PDF Overlay Editor Library
//!
//! Edits the extracted text of a PDF as an overlay on top of the rendered
//! page and sends only the changes back to the document service.
//!
//! # Modules
//!
//! - `coords`: document space ↔ display space mapping and zoom
//! - `model`: extracted text tree, free text and the editable overlay state
//! - `selection`: hit-testing, selection and drag handling
//! - `history`: snapshot-based undo/redo
//! - `diff`: reduction of the overlay to a save payload
//! - `ingestion`: upload → processing → ready state machine
//! - `backend`: document service contract and REST client
//! - `render`: page rasterization adapter and cache
//! - `session`: one open document being edited
//! - `cli`: command-line front end used by the binary

pub mod backend;
pub mod cli;
pub mod config;
pub mod coords;
pub mod diff;
pub mod error;
pub mod history;
pub mod ingestion;
pub mod model;
pub mod render;
pub mod selection;
pub mod session;

pub use config::Config;
pub use error::{EditorError, Result};
pub use session::{EditorSession, SessionError, SessionOptions};
