//! Staging loaders.
//!
//! A loader pulls one run's raw records into a staging relation. It reads
//! every source file before touching the relation, so a failed load leaves
//! staging in its pre-run state.

pub mod discovery;
pub mod error;
pub mod frames;
pub mod loader;

pub use discovery::{list_csv_files, resolve_sources};
pub use error::{IngestError, Result};
pub use frames::{normalize_header, read_csv_frame, stack_frames};
pub use loader::{FileStagingLoader, LoadSummary, StagingLoader};
